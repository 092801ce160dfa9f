//! Transcript display segmentation and segment cache
//!
//! Groups word-level timestamps into display segments: a segment closes
//! when it reaches the target duration, or earlier at a sentence boundary
//! once the minimum duration has elapsed. Segments partition the word
//! sequence exactly; segment text is the space-joined words of its range.
//!
//! The derived segment list is cached in a memoization table keyed on the
//! transcript content hash. A full value is computed and swapped in
//! atomically, so concurrent readers never observe a partially-built
//! list. No render-thread affinity is required.

use crate::models::transcript::{DisplaySegment, Transcript, WordTiming};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Default target segment duration (seconds)
pub const DEFAULT_TARGET_SECONDS: f64 = 12.0;

/// Default minimum duration before a sentence break may close a segment
/// (seconds)
pub const DEFAULT_MIN_BREAK_SECONDS: f64 = 5.0;

/// Whether a word ends a sentence (trailing terminal punctuation)
fn ends_sentence(word: &str) -> bool {
    matches!(word.chars().last(), Some('.') | Some('!') | Some('?'))
}

/// Group word timestamps into display segments.
///
/// Every word belongs to exactly one segment, in original order; a final
/// segment is always emitted for remaining words.
pub fn segment_words(
    words: &[WordTiming],
    target_seconds: f64,
    min_break_seconds: f64,
) -> Vec<DisplaySegment> {
    let mut segments = Vec::new();
    if words.is_empty() {
        return segments;
    }

    let mut segment_start_index = 0;
    let mut segment_start_time = words[0].start_seconds;

    for (i, word) in words.iter().enumerate() {
        let elapsed = word.end_seconds - segment_start_time;
        let duration_reached = elapsed >= target_seconds;
        let sentence_break = ends_sentence(&word.word) && elapsed >= min_break_seconds;

        if duration_reached || sentence_break {
            segments.push(build_segment(words, segment_start_index, i));
            if i + 1 < words.len() {
                segment_start_index = i + 1;
                segment_start_time = words[i + 1].start_seconds;
            } else {
                return segments;
            }
        }
    }

    // Remaining words form the final (possibly short) segment
    segments.push(build_segment(words, segment_start_index, words.len() - 1));
    segments
}

fn build_segment(words: &[WordTiming], start: usize, end: usize) -> DisplaySegment {
    let text = words[start..=end]
        .iter()
        .map(|w| w.word.as_str())
        .collect::<Vec<_>>()
        .join(" ");
    DisplaySegment {
        text,
        start_seconds: words[start].start_seconds,
        end_seconds: words[end].end_seconds,
        start_word: start,
        end_word: end,
    }
}

/// Segment text with correction overlays applied at read time.
///
/// Words covered by an overlay are replaced by the overlay text at the
/// overlay's first word; an overlay spanning into a later segment
/// contributes its replacement once, in the segment where it starts.
pub fn corrected_segment_text(transcript: &Transcript, segment: &DisplaySegment) -> String {
    let mut parts: Vec<&str> = Vec::new();
    let mut i = segment.start_word;
    while i <= segment.end_word {
        match transcript
            .corrections
            .iter()
            .find(|o| o.start_word <= i && i <= o.end_word)
        {
            Some(overlay) => {
                if overlay.start_word >= segment.start_word {
                    parts.push(overlay.replacement.as_str());
                }
                i = overlay.end_word + 1;
            }
            None => {
                parts.push(transcript.words[i].word.as_str());
                i += 1;
            }
        }
    }
    parts.join(" ")
}

/// Memoization table for derived segment lists.
///
/// Keyed on the transcript content hash: recomputation happens exactly
/// when the underlying word-timestamp/text identity changes, never per
/// render.
pub struct SegmentCache {
    target_seconds: f64,
    min_break_seconds: f64,
    entries: RwLock<HashMap<String, Arc<Vec<DisplaySegment>>>>,
}

impl SegmentCache {
    pub fn new(target_seconds: f64, min_break_seconds: f64) -> Self {
        Self {
            target_seconds,
            min_break_seconds,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Segments for a transcript, computed at most once per content hash
    pub fn segments_for(&self, transcript: &Transcript) -> Arc<Vec<DisplaySegment>> {
        if let Some(cached) = self
            .entries
            .read()
            .expect("segment cache lock poisoned")
            .get(&transcript.content_hash)
        {
            return Arc::clone(cached);
        }

        let computed = Arc::new(segment_words(
            &transcript.words,
            self.target_seconds,
            self.min_break_seconds,
        ));

        let mut entries = self.entries.write().expect("segment cache lock poisoned");
        // A racing writer may have inserted first; keep the existing value
        // so all readers share one Arc
        let entry = entries
            .entry(transcript.content_hash.clone())
            .or_insert(computed);
        Arc::clone(entry)
    }

    /// Drop the cached value for a superseded content hash
    pub fn invalidate(&self, content_hash: &str) {
        self.entries
            .write()
            .expect("segment cache lock poisoned")
            .remove(content_hash);
    }

    /// Number of cached segment lists
    pub fn len(&self) -> usize {
        self.entries.read().expect("segment cache lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for SegmentCache {
    fn default() -> Self {
        Self::new(DEFAULT_TARGET_SECONDS, DEFAULT_MIN_BREAK_SECONDS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::transcript::CorrectionOverlay;
    use uuid::Uuid;

    /// One word per second, 0.9s long each
    fn steady_words(text: &str) -> Vec<WordTiming> {
        text.split_whitespace()
            .enumerate()
            .map(|(i, w)| WordTiming {
                word: w.to_string(),
                start_seconds: i as f64,
                end_seconds: i as f64 + 0.9,
            })
            .collect()
    }

    fn assert_exact_partition(words: &[WordTiming], segments: &[DisplaySegment]) {
        let mut next = 0;
        for segment in segments {
            assert_eq!(segment.start_word, next);
            assert!(segment.end_word >= segment.start_word);
            let expected: Vec<&str> = words[segment.start_word..=segment.end_word]
                .iter()
                .map(|w| w.word.as_str())
                .collect();
            assert_eq!(segment.text, expected.join(" "));
            next = segment.end_word + 1;
        }
        assert_eq!(next, words.len());
    }

    #[test]
    fn test_empty_input() {
        assert!(segment_words(&[], 12.0, 5.0).is_empty());
    }

    #[test]
    fn test_duration_break() {
        // 30 words at one per second, no punctuation: breaks on target
        // duration only
        let words = steady_words(&"word ".repeat(30));
        let segments = segment_words(&words, 12.0, 5.0);
        assert!(segments.len() > 1);
        assert_exact_partition(&words, &segments);
        for segment in &segments[..segments.len() - 1] {
            let elapsed = segment.end_seconds - segment.start_seconds;
            assert!(elapsed >= 12.0, "non-final segment closed early: {elapsed}");
        }
    }

    #[test]
    fn test_sentence_break_after_minimum() {
        // Sentence ends at word 7 (elapsed ~7.9s >= 5s minimum)
        let words = steady_words("the grass withers and the flowers fall away. but the word endures forever");
        let segments = segment_words(&words, 12.0, 5.0);
        assert_eq!(segments[0].end_word, 7);
        assert!(segments[0].text.ends_with("away."));
        assert_exact_partition(&words, &segments);
    }

    #[test]
    fn test_early_punctuation_does_not_break() {
        // Sentence ends at word 1 (elapsed ~1.9s < 5s minimum): no break
        let words = steady_words("Amen. now let us consider what this means for us today");
        let segments = segment_words(&words, 12.0, 5.0);
        assert!(segments[0].end_word > 1);
        assert_exact_partition(&words, &segments);
    }

    #[test]
    fn test_final_partial_segment_emitted() {
        let words = steady_words("just three words");
        let segments = segment_words(&words, 12.0, 5.0);
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].text, "just three words");
        assert_exact_partition(&words, &segments);
    }

    #[test]
    fn test_cache_computes_once_per_hash() {
        let transcript = Transcript::new(
            Uuid::new_v4(),
            "a b c".to_string(),
            steady_words("a b c"),
        );
        let cache = SegmentCache::default();
        let first = cache.segments_for(&transcript);
        let second = cache.segments_for(&transcript);
        // Same Arc: not recomputed
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_cache_invalidation_on_content_change() {
        let mut transcript = Transcript::new(
            Uuid::new_v4(),
            "a b c".to_string(),
            steady_words("a b c"),
        );
        let cache = SegmentCache::default();
        let first = cache.segments_for(&transcript);

        // Replace the words wholesale: new content identity
        let old_hash = transcript.content_hash.clone();
        transcript.words = steady_words("x y z w");
        transcript.full_text = "x y z w".to_string();
        transcript.content_hash =
            crate::models::transcript::compute_content_hash(&transcript.full_text, &transcript.words);
        cache.invalidate(&old_hash);

        let second = cache.segments_for(&transcript);
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].text, "x y z w");
    }

    #[test]
    fn test_corrected_segment_text() {
        let mut transcript = Transcript::new(
            Uuid::new_v4(),
            "he red the psalm".to_string(),
            steady_words("he red the psalm"),
        );
        transcript
            .add_correction(CorrectionOverlay {
                start_word: 1,
                end_word: 1,
                replacement: "read".to_string(),
            })
            .unwrap();
        let segments = segment_words(&transcript.words, 12.0, 5.0);
        assert_eq!(segments.len(), 1);
        assert_eq!(
            corrected_segment_text(&transcript, &segments[0]),
            "he read the psalm"
        );
        // Stored segment text is the uncorrected words
        assert_eq!(segments[0].text, "he red the psalm");
    }
}
