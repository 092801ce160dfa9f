//! Chunk lifecycle tracking
//!
//! Tracks per-chunk upload and transcription state as the external
//! transport and transcription workers report back. The tracker performs
//! no network I/O itself. Chunk uploads run as one logical task per chunk
//! with no ordering dependency; a failed chunk is retried independently
//! and never blocks its siblings.

use crate::db;
use crate::error::{ProcessingError, ProcessingResult};
use crate::models::chunk::{AudioChunk, UploadStatus};
use crate::models::sermon::TrackStatus;
use berean_common::events::{BereanEvent, EventBus};
use chrono::Utc;
use sha2::{Digest, Sha256};
use sqlx::SqlitePool;
use uuid::Uuid;

/// Aggregate chunk progress the orchestrator reads to decide sermon-level
/// state
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ChunkSummary {
    pub total: usize,
    pub uploaded: usize,
    pub upload_failed: usize,
    pub transcribed: usize,
    pub transcription_failed: usize,
}

impl ChunkSummary {
    /// Every chunk uploaded
    pub fn all_uploaded(&self) -> bool {
        self.total > 0 && self.uploaded == self.total
    }
}

/// Per-chunk state machine service
pub struct ChunkTracker {
    db: SqlitePool,
    event_bus: EventBus,
}

impl ChunkTracker {
    pub fn new(db: SqlitePool, event_bus: EventBus) -> Self {
        Self { db, event_bus }
    }

    /// Register a captured chunk, hashing its payload for idempotent
    /// re-registration: the same content registered twice returns the
    /// existing chunk instead of creating a duplicate.
    pub async fn register_chunk(
        &self,
        sermon_id: Uuid,
        chunk_index: i64,
        start_seconds: f64,
        duration_seconds: f64,
        payload: &[u8],
    ) -> ProcessingResult<AudioChunk> {
        let content_hash = format!("{:x}", Sha256::digest(payload));

        if let Some(existing) = db::chunks::load_chunk_by_hash(&self.db, sermon_id, &content_hash)
            .await
            .map_err(internal)?
        {
            tracing::debug!(
                sermon_id = %sermon_id,
                chunk_id = %existing.id,
                "Chunk content already registered, reusing"
            );
            return Ok(existing);
        }

        let chunk = AudioChunk::new(
            sermon_id,
            chunk_index,
            start_seconds,
            duration_seconds,
            content_hash,
        );
        db::chunks::save_chunk(&self.db, &chunk).await.map_err(internal)?;

        tracing::info!(
            sermon_id = %sermon_id,
            chunk_id = %chunk.id,
            chunk_index,
            duration_seconds,
            "Chunk registered"
        );
        self.event_bus.emit_lossy(BereanEvent::ChunkRegistered {
            sermon_id,
            chunk_id: chunk.id,
            chunk_index,
            timestamp: Utc::now(),
        });

        Ok(chunk)
    }

    /// Upload transport reports the upload started
    pub async fn begin_upload(&self, chunk_id: Uuid) -> ProcessingResult<()> {
        self.update_chunk(chunk_id, |chunk| {
            chunk.upload_status = UploadStatus::Uploading;
            chunk.upload_progress = 0.0;
            chunk.upload_error = None;
        })
        .await?;
        Ok(())
    }

    /// Upload transport reports progress
    pub async fn update_upload_progress(
        &self,
        chunk_id: Uuid,
        progress: f64,
    ) -> ProcessingResult<()> {
        let progress = progress.clamp(0.0, 1.0);
        self.update_chunk(chunk_id, |chunk| {
            chunk.upload_status = UploadStatus::Uploading;
            chunk.upload_progress = progress;
        })
        .await?;
        self.event_bus.emit_lossy(BereanEvent::ChunkUploadProgress {
            chunk_id,
            progress,
            timestamp: Utc::now(),
        });
        Ok(())
    }

    /// Upload transport reports completion
    pub async fn complete_upload(&self, chunk_id: Uuid) -> ProcessingResult<()> {
        self.update_chunk(chunk_id, |chunk| {
            chunk.upload_status = UploadStatus::Succeeded;
            chunk.upload_progress = 1.0;
            chunk.upload_error = None;
        })
        .await?;
        self.event_bus.emit_lossy(BereanEvent::ChunkUploadCompleted {
            chunk_id,
            timestamp: Utc::now(),
        });
        Ok(())
    }

    /// Upload transport reports failure; the chunk stays retryable
    pub async fn fail_upload(&self, chunk_id: Uuid, error: &str) -> ProcessingResult<()> {
        self.update_chunk(chunk_id, |chunk| {
            chunk.upload_status = UploadStatus::Failed;
            chunk.upload_error = Some(error.to_string());
        })
        .await?;
        tracing::warn!(chunk_id = %chunk_id, error, "Chunk upload failed");
        self.event_bus.emit_lossy(BereanEvent::ChunkUploadFailed {
            chunk_id,
            error_message: error.to_string(),
            timestamp: Utc::now(),
        });
        Ok(())
    }

    /// Transcription worker picked up the chunk
    pub async fn begin_transcription(&self, chunk_id: Uuid) -> ProcessingResult<()> {
        self.update_chunk(chunk_id, |chunk| {
            chunk.transcription_status = TrackStatus::Running;
            chunk.transcription_error = None;
        })
        .await?;
        Ok(())
    }

    /// Transcription worker returned the chunk's fragment
    pub async fn complete_transcription(
        &self,
        chunk_id: Uuid,
        fragment: Option<String>,
    ) -> ProcessingResult<()> {
        self.update_chunk(chunk_id, |chunk| {
            chunk.transcription_status = TrackStatus::Succeeded;
            chunk.transcript_fragment = fragment.clone();
            chunk.transcription_error = None;
        })
        .await?;
        self.event_bus.emit_lossy(BereanEvent::ChunkTranscriptionCompleted {
            chunk_id,
            timestamp: Utc::now(),
        });
        Ok(())
    }

    /// Transcription worker reported failure; the chunk stays retryable
    pub async fn fail_transcription(&self, chunk_id: Uuid, error: &str) -> ProcessingResult<()> {
        self.update_chunk(chunk_id, |chunk| {
            chunk.transcription_status = TrackStatus::Failed;
            chunk.transcription_error = Some(error.to_string());
        })
        .await?;
        tracing::warn!(chunk_id = %chunk_id, error, "Chunk transcription failed");
        self.event_bus.emit_lossy(BereanEvent::ChunkTranscriptionFailed {
            chunk_id,
            error_message: error.to_string(),
            timestamp: Utc::now(),
        });
        Ok(())
    }

    /// Reset the failed axes of one chunk back to pending.
    ///
    /// The recorded audio is kept: retry re-uploads or re-transcribes,
    /// never re-records. Sibling chunks are untouched.
    pub async fn retry_chunk(&self, chunk_id: Uuid) -> ProcessingResult<AudioChunk> {
        self.update_chunk(chunk_id, |chunk| {
            if chunk.upload_status == UploadStatus::Failed {
                chunk.upload_status = UploadStatus::Pending;
                chunk.upload_progress = 0.0;
                chunk.upload_error = None;
            }
            if chunk.transcription_status == TrackStatus::Failed {
                chunk.transcription_status = TrackStatus::Pending;
                chunk.transcription_error = None;
            }
        })
        .await
    }

    /// Aggregate progress across a sermon's chunks
    pub async fn sermon_summary(&self, sermon_id: Uuid) -> ProcessingResult<ChunkSummary> {
        let chunks = db::chunks::load_chunks_for_sermon(&self.db, sermon_id)
            .await
            .map_err(internal)?;

        let mut summary = ChunkSummary {
            total: chunks.len(),
            ..ChunkSummary::default()
        };
        for chunk in &chunks {
            match chunk.upload_status {
                UploadStatus::Succeeded => summary.uploaded += 1,
                UploadStatus::Failed => summary.upload_failed += 1,
                _ => {}
            }
            match chunk.transcription_status {
                TrackStatus::Succeeded => summary.transcribed += 1,
                TrackStatus::Failed => summary.transcription_failed += 1,
                _ => {}
            }
        }
        Ok(summary)
    }

    /// Load, mutate, persist one chunk
    async fn update_chunk<F>(&self, chunk_id: Uuid, mutate: F) -> ProcessingResult<AudioChunk>
    where
        F: FnOnce(&mut AudioChunk),
    {
        let mut chunk = db::chunks::load_chunk(&self.db, chunk_id)
            .await
            .map_err(internal)?
            .ok_or_else(|| ProcessingError::NotFound(format!("chunk {}", chunk_id)))?;

        mutate(&mut chunk);
        chunk.updated_at = Utc::now();
        db::chunks::save_chunk(&self.db, &chunk).await.map_err(internal)?;
        Ok(chunk)
    }
}

fn internal(e: anyhow::Error) -> ProcessingError {
    ProcessingError::Storage(e.to_string())
}
