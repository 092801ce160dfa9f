//! Live caption reference detection
//!
//! During an active recording, each finalized caption update is scanned
//! for Bible references. A per-session seen-set of canonical identifiers
//! ensures each reference is announced once per recording session; the
//! set is owned by the session value and discarded with it at recording
//! end. It is never process-wide state and never persisted.

use crate::services::reference_parser::{self, ReferenceMatch};
use berean_common::events::{BereanEvent, EventBus};
use std::collections::HashSet;
use uuid::Uuid;

/// A reference newly detected in the caption stream
#[derive(Debug, Clone, PartialEq)]
pub struct DetectedReference {
    /// Canonical `book.chapter.verse` identifier
    pub canonical_id: String,
    /// Canonical display form ("John 3:16")
    pub display_text: String,
}

/// Ephemeral caption session for one active recording.
///
/// Dropped when the recording ends; nothing here touches storage.
pub struct CaptionSession {
    sermon_id: Uuid,
    /// Canonical ids already announced this session
    seen: HashSet<String>,
    /// Latest non-final (volatile) caption text
    pub volatile_text: String,
    /// Accumulated finalized caption text
    pub finalized_text: String,
}

impl CaptionSession {
    pub fn new(sermon_id: Uuid) -> Self {
        Self {
            sermon_id,
            seen: HashSet::new(),
            volatile_text: String::new(),
            finalized_text: String::new(),
        }
    }

    pub fn sermon_id(&self) -> Uuid {
        self.sermon_id
    }

    /// Replace the volatile caption text (not scanned for detection;
    /// volatile text may still be revised by the recognizer)
    pub fn update_volatile(&mut self, text: &str) {
        self.volatile_text = text.to_string();
    }

    /// Append finalized text and scan it for references not yet seen this
    /// session.
    ///
    /// Each emitted identifier enters the seen-set immediately, so
    /// re-scanning identical or superset text emits nothing further for
    /// it. One pass over the new text only; cheap enough to run on every
    /// recognizer update.
    pub fn scan_finalized(&mut self, new_text: &str) -> Vec<DetectedReference> {
        if !self.finalized_text.is_empty() {
            self.finalized_text.push(' ');
        }
        self.finalized_text.push_str(new_text);
        self.volatile_text.clear();

        let mut detected = Vec::new();
        for m in reference_parser::scan(new_text) {
            let canonical_id = m.reference.canonical_id();
            if self.seen.insert(canonical_id.clone()) {
                detected.push(DetectedReference {
                    canonical_id,
                    display_text: m.reference.display(),
                });
            }
        }
        detected
    }

    /// Scan and broadcast each new detection on the event bus
    pub fn scan_and_emit(&mut self, new_text: &str, event_bus: &EventBus) -> Vec<DetectedReference> {
        let detected = self.scan_finalized(new_text);
        for d in &detected {
            event_bus.emit_lossy(BereanEvent::CaptionReferenceDetected {
                sermon_id: self.sermon_id,
                canonical_id: d.canonical_id.clone(),
                display_text: d.display_text.clone(),
                timestamp: chrono::Utc::now(),
            });
        }
        detected
    }

    /// Number of distinct references seen this session
    pub fn seen_count(&self) -> usize {
        self.seen.len()
    }
}

/// Every parseable reference span in the given text, for UI highlighting.
///
/// Pure: does not consult or mutate any session state, so rendering can
/// call it on volatile and finalized text alike.
pub fn highlight_ranges(text: &str) -> Vec<ReferenceMatch> {
    reference_parser::scan(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_scan_emits_once() {
        let mut session = CaptionSession::new(Uuid::new_v4());
        let detected = session.scan_finalized("Turn to John 3:16 friends");
        assert_eq!(detected.len(), 1);
        assert_eq!(detected[0].canonical_id, "43.3.16");
        assert_eq!(detected[0].display_text, "John 3:16");
    }

    #[test]
    fn test_rescan_is_idempotent() {
        let mut session = CaptionSession::new(Uuid::new_v4());
        assert_eq!(session.scan_finalized("Turn to John 3:16 friends").len(), 1);
        // Identical text again
        assert_eq!(session.scan_finalized("Turn to John 3:16 friends").len(), 0);
        // Superset text containing the same reference
        assert_eq!(
            session.scan_finalized("as John 3:16 reminds us, God so loved").len(),
            0
        );
        assert_eq!(session.seen_count(), 1);
    }

    #[test]
    fn test_distinct_references_each_emit() {
        let mut session = CaptionSession::new(Uuid::new_v4());
        let first = session.scan_finalized("John 3:16 and Romans 5:8");
        assert_eq!(first.len(), 2);
        let second = session.scan_finalized("now Romans 5:8 again, then Romans 8:28");
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].canonical_id, "45.8.28");
    }

    #[test]
    fn test_sessions_are_independent() {
        let mut a = CaptionSession::new(Uuid::new_v4());
        let mut b = CaptionSession::new(Uuid::new_v4());
        assert_eq!(a.scan_finalized("John 3:16").len(), 1);
        // A fresh session has its own seen-set
        assert_eq!(b.scan_finalized("John 3:16").len(), 1);
    }

    #[test]
    fn test_highlight_ranges_pure() {
        let mut session = CaptionSession::new(Uuid::new_v4());
        session.scan_finalized("John 3:16");

        let text = "John 3:16 and Romans 5:8";
        let ranges = highlight_ranges(text);
        // Both spans returned even though John 3:16 was already seen
        assert_eq!(ranges.len(), 2);
        assert_eq!(&text[ranges[0].range.clone()], "John 3:16");
        // And the seen-set was not consulted or modified
        assert_eq!(session.seen_count(), 1);
    }

    #[tokio::test]
    async fn test_scan_and_emit_broadcasts() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();
        let mut session = CaptionSession::new(Uuid::new_v4());

        session.scan_and_emit("Turn to John 3:16", &bus);
        match rx.recv().await.unwrap() {
            BereanEvent::CaptionReferenceDetected { canonical_id, .. } => {
                assert_eq!(canonical_id, "43.3.16")
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }
}
