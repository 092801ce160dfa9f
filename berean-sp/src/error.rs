//! Error types for berean-sp
//!
//! Errors are grouped by where they surface: capture/import errors are
//! returned synchronously to the initiating action, processing errors are
//! recorded as terminal state plus message on the affected status field,
//! network and storage errors are retryable without re-capturing data.

use thiserror::Error;

/// Sermon processing error type
#[derive(Debug, Error)]
pub enum ProcessingError {
    // --- Capture / import (surfaced synchronously, never swallowed) ---
    /// Microphone or file access permission denied or restricted
    #[error("Recording permission denied: {0}")]
    PermissionDenied(String),

    /// Imported audio is in a format the pipeline cannot accept
    #[error("Unsupported audio format: {0}")]
    UnsupportedFormat(String),

    /// Recording ended below the minimum usable duration
    #[error("Recording too short: {0:.1}s")]
    RecordingTooShort(f64),

    /// Referenced audio file does not exist
    #[error("Audio not found: {0}")]
    AudioNotFound(String),

    /// Imported audio exceeds the maximum accepted size
    #[error("Audio too large: {0} bytes")]
    AudioTooLarge(u64),

    // --- Processing (recorded as terminal state, never thrown across the job boundary) ---
    /// Remote transcription job reported failure
    #[error("Transcription failed: {0}")]
    TranscriptionFailed(String),

    /// Remote study guide generation job reported failure
    #[error("Study guide generation failed: {0}")]
    StudyGuideFailed(String),

    /// Remote job exceeded its deadline
    #[error("Processing job timed out after {0}s")]
    JobTimeout(u64),

    /// Remote service flagged the content and declined to process it
    #[error("Content flagged by moderation: {0}")]
    ContentModerated(String),

    // --- Network / sync (retryable, entity queued rather than action failed) ---
    /// Network unavailable or request failed
    #[error("Network error: {0}")]
    Network(String),

    /// Chunk upload failed
    #[error("Upload failed: {0}")]
    Upload(String),

    /// Sync push/pull failed
    #[error("Sync failed: {0}")]
    Sync(String),

    // --- Storage / persistence ---
    /// Local storage full, corrupted, or cache write failed
    #[error("Storage error: {0}")]
    Storage(String),

    /// Database operation error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    // --- Guards ---
    /// Deletion refused while a processing track is running
    #[error("Cannot delete sermon while processing is in progress")]
    DeletionWhileProcessing,

    /// Requested state transition is not legal from the current state
    #[error("Invalid state transition: {0}")]
    InvalidTransition(String),

    /// Requested entity does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// berean-common error
    #[error("Common error: {0}")]
    Common(#[from] berean_common::Error),
}

impl ProcessingError {
    /// Whether a retry can succeed without re-capturing any data.
    ///
    /// Retryable errors drive automatic or user-triggered retry: an
    /// already-recorded chunk is never re-recorded, only re-uploaded or
    /// re-transcribed.
    pub fn is_retryable(&self) -> bool {
        match self {
            ProcessingError::TranscriptionFailed(_)
            | ProcessingError::StudyGuideFailed(_)
            | ProcessingError::JobTimeout(_)
            | ProcessingError::Network(_)
            | ProcessingError::Upload(_)
            | ProcessingError::Sync(_)
            | ProcessingError::Storage(_)
            | ProcessingError::Database(_)
            | ProcessingError::Io(_) => true,

            ProcessingError::PermissionDenied(_)
            | ProcessingError::UnsupportedFormat(_)
            | ProcessingError::RecordingTooShort(_)
            | ProcessingError::AudioNotFound(_)
            | ProcessingError::AudioTooLarge(_)
            | ProcessingError::ContentModerated(_)
            | ProcessingError::DeletionWhileProcessing
            | ProcessingError::InvalidTransition(_)
            | ProcessingError::NotFound(_)
            | ProcessingError::Common(_) => false,
        }
    }
}

/// Result type for sermon processing operations
pub type ProcessingResult<T> = Result<T, ProcessingError>;
