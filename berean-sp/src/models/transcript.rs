//! Transcript model: word-level timestamps, correction overlays, and the
//! derived display segment type
//!
//! The stored transcript is never mutated by corrections; overlays are
//! applied at read time. The display segment sequence is a pure function
//! of (word timestamps, text) and is cached by the segmenter keyed on
//! `content_hash`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// One word with its timestamps
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordTiming {
    pub word: String,
    pub start_seconds: f64,
    pub end_seconds: f64,
}

/// A read-time replacement of a word-index range.
///
/// Overlays are non-overlapping and stored in ascending start_word order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrectionOverlay {
    /// First word index replaced (inclusive)
    pub start_word: usize,
    /// Last word index replaced (inclusive)
    pub end_word: usize,
    /// Replacement text for the whole range
    pub replacement: String,
}

/// Derived display unit: a run of words grouped for on-screen captioning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplaySegment {
    pub text: String,
    pub start_seconds: f64,
    pub end_seconds: f64,
    /// First word index in this segment (inclusive)
    pub start_word: usize,
    /// Last word index in this segment (inclusive)
    pub end_word: usize,
}

/// Timestamped transcript of one sermon
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transcript {
    pub id: Uuid,
    pub sermon_id: Uuid,

    /// Full transcript text
    pub full_text: String,

    /// Ordered word-level timestamps
    pub words: Vec<WordTiming>,

    /// Ordered, non-overlapping correction overlays
    pub corrections: Vec<CorrectionOverlay>,

    /// Identity hash of (words, text); drives segment cache invalidation
    pub content_hash: String,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Transcript {
    /// Build a transcript from assembled job output
    pub fn new(sermon_id: Uuid, full_text: String, words: Vec<WordTiming>) -> Self {
        let now = Utc::now();
        let content_hash = compute_content_hash(&full_text, &words);
        Self {
            id: Uuid::new_v4(),
            sermon_id,
            full_text,
            words,
            corrections: Vec::new(),
            content_hash,
            created_at: now,
            updated_at: now,
        }
    }

    /// Add a correction overlay, keeping the list sorted by range start.
    ///
    /// The overlay must not overlap an existing one and must lie within
    /// the word sequence.
    pub fn add_correction(&mut self, overlay: CorrectionOverlay) -> Result<(), String> {
        if overlay.start_word > overlay.end_word {
            return Err("overlay range is inverted".to_string());
        }
        if overlay.end_word >= self.words.len() {
            return Err(format!(
                "overlay end {} exceeds word count {}",
                overlay.end_word,
                self.words.len()
            ));
        }
        for existing in &self.corrections {
            if overlay.start_word <= existing.end_word && existing.start_word <= overlay.end_word {
                return Err(format!(
                    "overlay {}..={} overlaps existing {}..={}",
                    overlay.start_word, overlay.end_word, existing.start_word, existing.end_word
                ));
            }
        }
        self.corrections.push(overlay);
        self.corrections.sort_by_key(|o| o.start_word);
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Corrected full text: overlays applied in index order, stored words
    /// untouched
    pub fn corrected_text(&self) -> String {
        let mut parts: Vec<&str> = Vec::with_capacity(self.words.len());
        let mut i = 0;
        let mut overlays = self.corrections.iter().peekable();
        while i < self.words.len() {
            match overlays.peek() {
                Some(overlay) if overlay.start_word == i => {
                    parts.push(overlay.replacement.as_str());
                    i = overlay.end_word + 1;
                    overlays.next();
                }
                _ => {
                    parts.push(self.words[i].word.as_str());
                    i += 1;
                }
            }
        }
        parts.join(" ")
    }
}

/// Hash of the segmentation input. Recomputed whenever words or text are
/// replaced wholesale (corrections do not participate: they are read-time
/// only).
pub fn compute_content_hash(full_text: &str, words: &[WordTiming]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(full_text.as_bytes());
    for w in words {
        hasher.update(w.word.as_bytes());
        hasher.update(w.start_seconds.to_le_bytes());
        hasher.update(w.end_seconds.to_le_bytes());
    }
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(text: &str) -> Vec<WordTiming> {
        text.split_whitespace()
            .enumerate()
            .map(|(i, w)| WordTiming {
                word: w.to_string(),
                start_seconds: i as f64,
                end_seconds: i as f64 + 0.8,
            })
            .collect()
    }

    #[test]
    fn test_content_hash_stable_and_sensitive() {
        let w = words("in the beginning was the Word");
        let a = compute_content_hash("in the beginning was the Word", &w);
        let b = compute_content_hash("in the beginning was the Word", &w);
        assert_eq!(a, b);
        let c = compute_content_hash("in the beginning was the word", &w);
        assert_ne!(a, c);
    }

    #[test]
    fn test_corrected_text_applies_overlays_in_order() {
        let mut t = Transcript::new(
            Uuid::new_v4(),
            "he red from the book of palms".to_string(),
            words("he red from the book of palms"),
        );
        t.add_correction(CorrectionOverlay {
            start_word: 1,
            end_word: 1,
            replacement: "read".to_string(),
        })
        .unwrap();
        t.add_correction(CorrectionOverlay {
            start_word: 6,
            end_word: 6,
            replacement: "Psalms".to_string(),
        })
        .unwrap();
        assert_eq!(t.corrected_text(), "he read from the book of Psalms");
        // Stored words unchanged
        assert_eq!(t.words[1].word, "red");
    }

    #[test]
    fn test_overlapping_overlay_rejected() {
        let mut t = Transcript::new(
            Uuid::new_v4(),
            "a b c d".to_string(),
            words("a b c d"),
        );
        t.add_correction(CorrectionOverlay {
            start_word: 1,
            end_word: 2,
            replacement: "x".to_string(),
        })
        .unwrap();
        let err = t.add_correction(CorrectionOverlay {
            start_word: 2,
            end_word: 3,
            replacement: "y".to_string(),
        });
        assert!(err.is_err());
    }

    #[test]
    fn test_out_of_range_overlay_rejected() {
        let mut t = Transcript::new(Uuid::new_v4(), "a b".to_string(), words("a b"));
        assert!(t
            .add_correction(CorrectionOverlay {
                start_word: 1,
                end_word: 5,
                replacement: "x".to_string(),
            })
            .is_err());
    }

    #[test]
    fn test_range_replacement_collapses_words() {
        let mut t = Transcript::new(
            Uuid::new_v4(),
            "turn to first Corinthians thirteen".to_string(),
            words("turn to first Corinthians thirteen"),
        );
        t.add_correction(CorrectionOverlay {
            start_word: 2,
            end_word: 4,
            replacement: "1 Corinthians 13".to_string(),
        })
        .unwrap();
        assert_eq!(t.corrected_text(), "turn to 1 Corinthians 13");
    }
}
