//! Event types for the Berean event system
//!
//! Provides shared event definitions and the EventBus used by the sermon
//! processing pipeline to report progress to subscribers (UI layers,
//! sync, diagnostics) without coupling to them.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Berean event types
///
/// Events are broadcast via EventBus and can be serialized for
/// transmission to display layers. All events use this central enum for
/// type safety and exhaustive matching.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum BereanEvent {
    /// Recording session started, chunked capture in progress
    RecordingStarted {
        sermon_id: Uuid,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// New audio chunk registered for a sermon
    ChunkRegistered {
        sermon_id: Uuid,
        chunk_id: Uuid,
        chunk_index: i64,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Chunk upload progress update
    ChunkUploadProgress {
        chunk_id: Uuid,
        /// Fraction complete (0.0 - 1.0)
        progress: f64,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Chunk upload finished
    ChunkUploadCompleted {
        chunk_id: Uuid,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Chunk upload failed (independently retryable)
    ChunkUploadFailed {
        chunk_id: Uuid,
        error_message: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Per-chunk transcription finished
    ChunkTranscriptionCompleted {
        chunk_id: Uuid,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Per-chunk transcription failed (independently retryable)
    ChunkTranscriptionFailed {
        chunk_id: Uuid,
        error_message: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Sermon-level transcription job dispatched
    TranscriptionStarted {
        sermon_id: Uuid,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Sermon-level transcription succeeded, transcript persisted
    TranscriptionCompleted {
        sermon_id: Uuid,
        word_count: usize,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Sermon-level transcription failed
    TranscriptionFailed {
        sermon_id: Uuid,
        error_message: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Study guide generation job dispatched
    StudyGuideStarted {
        sermon_id: Uuid,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Study guide generated, enriched, and persisted
    StudyGuideCompleted {
        sermon_id: Uuid,
        suggested_reference_count: usize,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Study guide generation failed (sermon may remain viewable in
    /// degraded mode if transcription succeeded)
    StudyGuideFailed {
        sermon_id: Uuid,
        error_message: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Sermon soft-deleted (tombstoned, pending sync)
    SermonDeleted {
        sermon_id: Uuid,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Live caption scan detected a reference not yet seen this session
    CaptionReferenceDetected {
        sermon_id: Uuid,
        /// Canonical `book.chapter.verse` identifier
        canonical_id: String,
        display_text: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

// ========================================
// EventBus Implementation
// ========================================

/// Central event distribution bus for application-wide events
///
/// The EventBus uses tokio::broadcast internally, providing:
/// - Non-blocking publish (slow subscribers don't block producers)
/// - Multiple concurrent subscribers
/// - Automatic cleanup when subscribers drop
/// - Lagged message detection for slow subscribers
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<BereanEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// Recommended values: 1000 for desktop, 10-100 for tests.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Returns a receiver that will receive all events emitted after
    /// subscription. Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<BereanEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists,
    /// `Err` if no subscribers are listening.
    pub fn emit(&self, event: BereanEvent) -> Result<usize, broadcast::error::SendError<BereanEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring the no-subscriber case
    ///
    /// Progress events are advisory; the pipeline must not fail or log
    /// noise just because nobody is listening yet.
    pub fn emit_lossy(&self, event: BereanEvent) {
        let _ = self.tx.send(event);
    }

    /// Configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_emit_and_receive() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        let sermon_id = Uuid::new_v4();
        bus.emit(BereanEvent::RecordingStarted {
            sermon_id,
            timestamp: chrono::Utc::now(),
        })
        .unwrap();

        match rx.recv().await.unwrap() {
            BereanEvent::RecordingStarted { sermon_id: id, .. } => assert_eq!(id, sermon_id),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_emit_lossy_without_subscribers() {
        let bus = EventBus::new(16);
        // Must not panic or error with zero subscribers
        bus.emit_lossy(BereanEvent::SermonDeleted {
            sermon_id: Uuid::new_v4(),
            timestamp: chrono::Utc::now(),
        });
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn test_event_serialization_tag() {
        let event = BereanEvent::CaptionReferenceDetected {
            sermon_id: Uuid::new_v4(),
            canonical_id: "43.3.16".to_string(),
            display_text: "John 3:16".to_string(),
            timestamp: chrono::Utc::now(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "CaptionReferenceDetected");
        assert_eq!(json["canonical_id"], "43.3.16");
    }
}
