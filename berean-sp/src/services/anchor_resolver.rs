//! Anchor-text timestamp resolution
//!
//! Generated outline sections, quotes, and insights carry a verbatim
//! transcript excerpt but no timestamp. This module locates each excerpt
//! in the timestamped word sequence by approximate token matching and
//! assigns the matched window's end timestamp plus a confidence score.
//!
//! Anchors are processed in narrative order with a moving floor: each
//! anchor only considers windows at or after the previous resolution, so
//! resolved timestamps never decrease across sequentially-presented
//! content. An excerpt that matches nowhere above the similarity
//! threshold is left unresolved (null timestamp), which is not an error.

use crate::models::study_guide::StudyGuide;
use crate::models::transcript::WordTiming;
use strsim::jaro_winkler;

/// Default minimum mean token similarity for a window to count as a match.
///
/// Matching is tolerant of token-level transcription variance
/// (substituted or misspelled words); 0.80 mean Jaro-Winkler over the
/// window keeps coincidental matches out while surviving one or two
/// garbled tokens in a typical 8-25 word excerpt.
pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.80;

/// A successfully resolved anchor
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedAnchor {
    /// Timestamp assigned to the anchored content: end of the matched
    /// window
    pub end_seconds: f64,
    /// Match quality (threshold..=1.0)
    pub confidence: f64,
    /// First word index of the matched window
    pub window_start: usize,
    /// Last word index of the matched window
    pub window_end: usize,
}

/// Normalize a token for comparison: lowercase, alphanumerics only
fn normalize_token(token: &str) -> String {
    token
        .chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(|c| c.to_lowercase())
        .collect()
}

fn tokenize(text: &str) -> Vec<String> {
    text.split_whitespace()
        .map(normalize_token)
        .filter(|t| !t.is_empty())
        .collect()
}

/// Mean pairwise token similarity of an aligned window
fn window_score(anchor: &[String], window: &[String]) -> f64 {
    debug_assert_eq!(anchor.len(), window.len());
    let total: f64 = anchor
        .iter()
        .zip(window.iter())
        .map(|(a, w)| jaro_winkler(a, w))
        .sum();
    total / anchor.len() as f64
}

/// Resolver state: the moving floor across one guide's anchors
pub struct AnchorResolver<'a> {
    words: &'a [WordTiming],
    tokens: Vec<String>,
    threshold: f64,
    /// Earliest window start the next anchor may use
    floor_index: usize,
    /// Timestamps must never decrease across resolutions
    last_end_seconds: f64,
}

impl<'a> AnchorResolver<'a> {
    pub fn new(words: &'a [WordTiming], threshold: f64) -> Self {
        let tokens = words.iter().map(|w| normalize_token(&w.word)).collect();
        Self {
            words,
            tokens,
            threshold,
            floor_index: 0,
            last_end_seconds: 0.0,
        }
    }

    /// Resolve one anchor, advancing the floor on success.
    ///
    /// Selection rule: among windows starting at or after the floor whose
    /// score clears the threshold and whose end timestamp does not
    /// precede the previous resolution, take the earliest of the
    /// best-scoring windows.
    pub fn resolve(&mut self, anchor_text: &str) -> Option<ResolvedAnchor> {
        let anchor = tokenize(anchor_text);
        if anchor.is_empty() || anchor.len() > self.tokens.len() {
            return None;
        }

        let last_start = self.tokens.len() - anchor.len();
        if self.floor_index > last_start {
            return None;
        }

        let mut best: Option<(f64, usize)> = None;
        for start in self.floor_index..=last_start {
            let end = start + anchor.len() - 1;
            if self.words[end].end_seconds < self.last_end_seconds {
                continue;
            }
            let score = window_score(&anchor, &self.tokens[start..=end]);
            if score < self.threshold {
                continue;
            }
            match best {
                // Strictly better score wins; an equal score keeps the
                // earlier window
                Some((best_score, _)) if score <= best_score + 1e-9 => {}
                _ => best = Some((score, start)),
            }
        }

        let (confidence, window_start) = best?;
        let window_end = window_start + anchor.len() - 1;
        let end_seconds = self.words[window_end].end_seconds;

        self.floor_index = window_start;
        self.last_end_seconds = end_seconds;

        Some(ResolvedAnchor {
            end_seconds,
            confidence,
            window_start,
            window_end,
        })
    }
}

/// Resolve every anchored element of a study guide in narrative order:
/// outline sections, then quotes, then insights. Unresolved anchors keep
/// null timestamps and confidence.
pub fn apply_anchor_timestamps(guide: &mut StudyGuide, words: &[WordTiming], threshold: f64) {
    let mut resolver = AnchorResolver::new(words, threshold);

    for section in &mut guide.outline {
        if let Some(anchor_text) = section.anchor_text.clone() {
            if let Some(resolved) = resolver.resolve(&anchor_text) {
                section.timestamp_seconds = Some(resolved.end_seconds);
                section.match_confidence = Some(resolved.confidence);
            }
        }
    }

    for quote in &mut guide.quotes {
        if let Some(resolved) = resolver.resolve(&quote.text) {
            quote.timestamp_seconds = Some(resolved.end_seconds);
            quote.match_confidence = Some(resolved.confidence);
        }
    }

    for insight in &mut guide.insights {
        if let Some(resolved) = resolver.resolve(&insight.supporting_quote) {
            insight.timestamp_seconds = Some(resolved.end_seconds);
            insight.match_confidence = Some(resolved.confidence);
        }
    }
}
