//! Audio chunk model
//!
//! A recording is captured as a sequence of contiguous chunks. Each chunk
//! tracks two independent state machines: upload to remote storage and
//! per-chunk transcription. One chunk failing never blocks its siblings.

use crate::models::sermon::TrackStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Tolerance when checking chunk offset contiguity (seconds)
pub const CHUNK_CONTIGUITY_TOLERANCE: f64 = 0.050;

/// Upload state of one chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadStatus {
    Pending,
    Uploading,
    Succeeded,
    Failed,
}

impl UploadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UploadStatus::Pending => "pending",
            UploadStatus::Uploading => "uploading",
            UploadStatus::Succeeded => "succeeded",
            UploadStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(UploadStatus::Pending),
            "uploading" => Some(UploadStatus::Uploading),
            "succeeded" => Some(UploadStatus::Succeeded),
            "failed" => Some(UploadStatus::Failed),
            _ => None,
        }
    }
}

/// One contiguous slice of a recording
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioChunk {
    pub id: Uuid,
    pub sermon_id: Uuid,

    /// Monotonic position within the sermon (0-based)
    pub chunk_index: i64,

    /// Offset of this chunk from the start of the recording (seconds)
    pub start_seconds: f64,

    /// Chunk duration (seconds)
    pub duration_seconds: f64,

    /// SHA-256 of the chunk payload; re-uploading the same content is
    /// idempotent on the remote side
    pub content_hash: String,

    pub upload_status: UploadStatus,
    /// Fraction complete (0.0 - 1.0) while uploading
    pub upload_progress: f64,
    pub upload_error: Option<String>,

    pub transcription_status: TrackStatus,
    /// Per-chunk transcript text once transcription succeeds
    pub transcript_fragment: Option<String>,
    pub transcription_error: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AudioChunk {
    /// Register a freshly captured chunk
    pub fn new(
        sermon_id: Uuid,
        chunk_index: i64,
        start_seconds: f64,
        duration_seconds: f64,
        content_hash: String,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            sermon_id,
            chunk_index,
            start_seconds,
            duration_seconds,
            content_hash,
            upload_status: UploadStatus::Pending,
            upload_progress: 0.0,
            upload_error: None,
            transcription_status: TrackStatus::Pending,
            transcript_fragment: None,
            transcription_error: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// End offset of this chunk (seconds)
    pub fn end_seconds(&self) -> f64 {
        self.start_seconds + self.duration_seconds
    }

    /// Either axis failed
    pub fn has_failure(&self) -> bool {
        self.upload_status == UploadStatus::Failed
            || self.transcription_status == TrackStatus::Failed
    }
}

/// Validate that a chunk sequence is well-formed: indices are monotonic
/// from zero and offsets are contiguous and non-overlapping within
/// tolerance. Chunks must be supplied in index order.
pub fn validate_chunk_sequence(chunks: &[AudioChunk]) -> Result<(), String> {
    let mut expected_start = 0.0_f64;
    for (i, chunk) in chunks.iter().enumerate() {
        if chunk.chunk_index != i as i64 {
            return Err(format!(
                "chunk at position {} has index {} (expected {})",
                i, chunk.chunk_index, i
            ));
        }
        if chunk.duration_seconds <= 0.0 {
            return Err(format!(
                "chunk {} has non-positive duration {}",
                chunk.chunk_index, chunk.duration_seconds
            ));
        }
        if (chunk.start_seconds - expected_start).abs() > CHUNK_CONTIGUITY_TOLERANCE {
            return Err(format!(
                "chunk {} starts at {:.3}s, expected {:.3}s",
                chunk.chunk_index, chunk.start_seconds, expected_start
            ));
        }
        expected_start = chunk.end_seconds();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(index: i64, start: f64, duration: f64) -> AudioChunk {
        AudioChunk::new(Uuid::new_v4(), index, start, duration, format!("hash-{index}"))
    }

    #[test]
    fn test_valid_sequence() {
        let chunks = vec![chunk(0, 0.0, 30.0), chunk(1, 30.0, 30.0), chunk(2, 60.0, 12.5)];
        assert!(validate_chunk_sequence(&chunks).is_ok());
    }

    #[test]
    fn test_gap_rejected() {
        let chunks = vec![chunk(0, 0.0, 30.0), chunk(1, 31.0, 30.0)];
        assert!(validate_chunk_sequence(&chunks).is_err());
    }

    #[test]
    fn test_overlap_rejected() {
        let chunks = vec![chunk(0, 0.0, 30.0), chunk(1, 29.0, 30.0)];
        assert!(validate_chunk_sequence(&chunks).is_err());
    }

    #[test]
    fn test_index_gap_rejected() {
        let chunks = vec![chunk(0, 0.0, 30.0), chunk(2, 30.0, 30.0)];
        assert!(validate_chunk_sequence(&chunks).is_err());
    }

    #[test]
    fn test_tolerance_accepted() {
        // 20ms drift from encoder frame boundaries is within tolerance
        let chunks = vec![chunk(0, 0.0, 30.0), chunk(1, 30.02, 30.0)];
        assert!(validate_chunk_sequence(&chunks).is_ok());
    }
}
