//! Bible reference parsing
//!
//! Scans free text for reference patterns ("John 3:16", "1 Cor 13:4-7",
//! "Psalm 23") and parses single candidates into a structured reference
//! with a canonical `book.chapter.verse` identifier. Candidates that fail
//! to parse are excluded from scan results, never surfaced as errors.

use berean_common::books::{self, Book};
use once_cell::sync::Lazy;
use regex::Regex;
use std::ops::Range;
use thiserror::Error;

/// Reference pattern: optional ordinal ("1 "), book word(s) with optional
/// trailing period, chapter, optional `:verse` or `.verse`, optional
/// range ending (hyphen or en dash). Book validity is checked against the
/// canonical table after the textual match.
static REFERENCE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?x)
        \b
        ([1-3]\s?)?                  # ordinal prefix (1 John, 2 Cor)
        ([A-Za-z]+(?:\s+of\s+[A-Za-z]+)?)  # book word, 'Song of Solomon'
        \.?                          # abbreviation period
        \s+
        (\d{1,3})                    # chapter
        (?:
            [:.]
            (\d{1,3})                # verse start
            (?:
                \s?[-\x{2013}]\s?
                (\d{1,3})            # verse end (range)
            )?
        )?
        ",
    )
    .expect("reference pattern must compile")
});

/// Parse failure for a single candidate string
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("Unparseable reference: {0}")]
    Unparseable(String),
}

/// A structured, resolved Bible reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedReference {
    pub book_id: u8,
    pub book_name: &'static str,
    pub chapter: u32,
    pub verse_start: u32,
    pub verse_end: u32,
}

impl ParsedReference {
    /// Canonical `book.chapter.verse` identifier (verse range start)
    pub fn canonical_id(&self) -> String {
        format!("{}.{}.{}", self.book_id, self.chapter, self.verse_start)
    }

    /// Display form using the canonical book name
    pub fn display(&self) -> String {
        if self.verse_end > self.verse_start {
            format!(
                "{} {}:{}-{}",
                self.book_name, self.chapter, self.verse_start, self.verse_end
            )
        } else {
            format!("{} {}:{}", self.book_name, self.chapter, self.verse_start)
        }
    }
}

/// A reference found in free text
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceMatch {
    /// Byte range of the matched text
    pub range: Range<usize>,
    pub reference: ParsedReference,
}

/// Scan arbitrary text for reference patterns.
///
/// Candidates whose book word does not resolve against the canonical
/// table are skipped.
pub fn scan(text: &str) -> Vec<ReferenceMatch> {
    REFERENCE_PATTERN
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let reference = reference_from_captures(&caps)?;
            Some(ReferenceMatch {
                range: whole.start()..whole.end(),
                reference,
            })
        })
        .collect()
}

/// Parse a single candidate string into a structured reference
pub fn parse(candidate: &str) -> Result<ParsedReference, ParseError> {
    let trimmed = candidate.trim();
    let caps = REFERENCE_PATTERN
        .captures(trimmed)
        .ok_or_else(|| ParseError::Unparseable(candidate.to_string()))?;

    // The pattern must consume the entire candidate, not a substring
    if caps.get(0).map(|m| m.as_str().len()) != Some(trimmed.len()) {
        return Err(ParseError::Unparseable(candidate.to_string()));
    }

    reference_from_captures(&caps).ok_or_else(|| ParseError::Unparseable(candidate.to_string()))
}

/// Resolve regex captures to a reference, or None when the book word is
/// not a real book or the verse numbers are degenerate
fn reference_from_captures(caps: &regex::Captures) -> Option<ParsedReference> {
    let ordinal = caps.get(1).map(|m| m.as_str().trim()).unwrap_or("");
    let book_word = caps.get(2)?.as_str();
    let book_query = if ordinal.is_empty() {
        book_word.to_string()
    } else {
        format!("{} {}", ordinal, book_word)
    };
    let book: &Book = books::book_by_name(&book_query)?;

    let chapter: u32 = caps.get(3)?.as_str().parse().ok()?;
    if chapter == 0 {
        return None;
    }

    // Chapter-only form resolves to verse 1
    let verse_start: u32 = match caps.get(4) {
        Some(m) => m.as_str().parse().ok()?,
        None => 1,
    };
    if verse_start == 0 {
        return None;
    }

    let verse_end: u32 = match caps.get(5) {
        Some(m) => {
            let end: u32 = m.as_str().parse().ok()?;
            if end < verse_start {
                return None;
            }
            end
        }
        None => verse_start,
    };

    Some(ParsedReference {
        book_id: book.id,
        book_name: book.name,
        chapter,
        verse_start,
        verse_end,
    })
}
