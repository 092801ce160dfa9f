//! Sermon model and per-track processing state machine
//!
//! Each sermon carries two independent processing tracks (transcription,
//! study guide generation). Track status progresses
//! PENDING → RUNNING → {SUCCEEDED | FAILED}; the tracks never gate each
//! other except through the derived view properties.

use crate::error::{ProcessingError, ProcessingResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Processing status of one track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackStatus {
    /// Not yet dispatched
    Pending,
    /// Remote job in flight
    Running,
    /// Job completed with valid output
    Succeeded,
    /// Job error or timeout (error message on the sermon)
    Failed,
}

impl TrackStatus {
    /// String form stored in the database
    pub fn as_str(&self) -> &'static str {
        match self {
            TrackStatus::Pending => "pending",
            TrackStatus::Running => "running",
            TrackStatus::Succeeded => "succeeded",
            TrackStatus::Failed => "failed",
        }
    }

    /// Parse the database string form
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(TrackStatus::Pending),
            "running" => Some(TrackStatus::Running),
            "succeeded" => Some(TrackStatus::Succeeded),
            "failed" => Some(TrackStatus::Failed),
            _ => None,
        }
    }
}

/// The two independent processing tracks of a sermon
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingTrack {
    Transcription,
    StudyGuide,
}

/// Sermon record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sermon {
    /// Unique sermon identifier
    pub id: Uuid,

    /// User-visible title
    pub title: String,

    /// When the recording started (or the import was initiated)
    pub recorded_at: DateTime<Utc>,

    /// Total audio duration in seconds, once known
    pub duration_seconds: Option<f64>,

    /// Local path of the assembled audio (or import source)
    pub audio_path: Option<String>,

    /// Remote audio location after upload
    pub remote_audio_url: Option<String>,

    /// SHA-256 of the audio content, set after capture/import completes
    pub content_hash: Option<String>,

    /// Transcription track status
    pub transcription_status: TrackStatus,
    /// Error message when the transcription track failed
    pub transcription_error: Option<String>,

    /// Study guide track status
    pub study_guide_status: TrackStatus,
    /// Error message when the study guide track failed
    pub study_guide_error: Option<String>,

    /// Dirty flag consumed by the sync layer
    pub needs_sync: bool,

    /// Tombstone timestamp; soft-deleted sermons are retained locally
    /// until the deletion has synced
    pub deleted_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Sermon {
    /// Create a new sermon at recording/import start
    pub fn new(title: String, recorded_at: DateTime<Utc>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            title,
            recorded_at,
            duration_seconds: None,
            audio_path: None,
            remote_audio_url: None,
            content_hash: None,
            transcription_status: TrackStatus::Pending,
            transcription_error: None,
            study_guide_status: TrackStatus::Pending,
            study_guide_error: None,
            needs_sync: true,
            deleted_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Status of the given track
    pub fn track_status(&self, track: ProcessingTrack) -> TrackStatus {
        match track {
            ProcessingTrack::Transcription => self.transcription_status,
            ProcessingTrack::StudyGuide => self.study_guide_status,
        }
    }

    /// Both tracks succeeded
    pub fn is_complete(&self) -> bool {
        self.transcription_status == TrackStatus::Succeeded
            && self.study_guide_status == TrackStatus::Succeeded
    }

    /// Transcript-only viewing: transcription succeeded but the study
    /// guide failed. Derived, never stored.
    pub fn can_view_in_degraded_mode(&self) -> bool {
        self.transcription_status == TrackStatus::Succeeded
            && self.study_guide_status == TrackStatus::Failed
    }

    /// Either track currently running
    pub fn is_processing(&self) -> bool {
        self.transcription_status == TrackStatus::Running
            || self.study_guide_status == TrackStatus::Running
    }

    /// Mark a track as dispatched
    pub fn mark_running(&mut self, track: ProcessingTrack) {
        match track {
            ProcessingTrack::Transcription => self.transcription_status = TrackStatus::Running,
            ProcessingTrack::StudyGuide => self.study_guide_status = TrackStatus::Running,
        }
        self.touch();
    }

    /// Mark a track as succeeded, clearing any prior error
    pub fn mark_succeeded(&mut self, track: ProcessingTrack) {
        match track {
            ProcessingTrack::Transcription => {
                self.transcription_status = TrackStatus::Succeeded;
                self.transcription_error = None;
            }
            ProcessingTrack::StudyGuide => {
                self.study_guide_status = TrackStatus::Succeeded;
                self.study_guide_error = None;
            }
        }
        self.touch();
    }

    /// Mark a track as failed with its error message
    pub fn mark_failed(&mut self, track: ProcessingTrack, error: &str) {
        match track {
            ProcessingTrack::Transcription => {
                self.transcription_status = TrackStatus::Failed;
                self.transcription_error = Some(error.to_string());
            }
            ProcessingTrack::StudyGuide => {
                self.study_guide_status = TrackStatus::Failed;
                self.study_guide_error = Some(error.to_string());
            }
        }
        self.touch();
    }

    /// Reset a failed track to pending for retry.
    ///
    /// Only the failed axis is reset; an already-succeeded sibling track
    /// is never touched.
    pub fn reset_for_retry(&mut self, track: ProcessingTrack) -> ProcessingResult<()> {
        match track {
            ProcessingTrack::Transcription => {
                if self.transcription_status != TrackStatus::Failed {
                    return Err(ProcessingError::InvalidTransition(format!(
                        "transcription track of sermon {} is not failed",
                        self.id
                    )));
                }
                self.transcription_status = TrackStatus::Pending;
                self.transcription_error = None;
            }
            ProcessingTrack::StudyGuide => {
                if self.study_guide_status != TrackStatus::Failed {
                    return Err(ProcessingError::InvalidTransition(format!(
                        "study guide track of sermon {} is not failed",
                        self.id
                    )));
                }
                self.study_guide_status = TrackStatus::Pending;
                self.study_guide_error = None;
            }
        }
        self.touch();
        Ok(())
    }

    /// Soft-delete the sermon.
    ///
    /// Refused while either track is running; the caller must surface the
    /// condition instead of silently queueing the delete.
    pub fn mark_deleted(&mut self) -> ProcessingResult<()> {
        if self.is_processing() {
            return Err(ProcessingError::DeletionWhileProcessing);
        }
        self.deleted_at = Some(Utc::now());
        self.touch();
        Ok(())
    }

    /// Record a local mutation: bump updated_at and set the dirty flag
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
        self.needs_sync = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_track_status_round_trip() {
        for status in [
            TrackStatus::Pending,
            TrackStatus::Running,
            TrackStatus::Succeeded,
            TrackStatus::Failed,
        ] {
            assert_eq!(TrackStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(TrackStatus::parse("bogus"), None);
    }

    #[test]
    fn test_new_sermon_starts_pending_and_dirty() {
        let sermon = Sermon::new("Test".into(), Utc::now());
        assert_eq!(sermon.transcription_status, TrackStatus::Pending);
        assert_eq!(sermon.study_guide_status, TrackStatus::Pending);
        assert!(sermon.needs_sync);
        assert!(!sermon.is_complete());
        assert!(!sermon.can_view_in_degraded_mode());
    }
}
