//! Sermon processing orchestration
//!
//! Owns the two sermon-level job tracks. Each track moves
//! PENDING → RUNNING on dispatch, then RUNNING → SUCCEEDED on valid
//! output or RUNNING → FAILED on job error or timeout; failures land as
//! an error string on the affected track and are never thrown across the
//! job boundary. The study guide track post-processes generation output
//! (anchor timestamps, reference verification) before it counts as
//! succeeded.

use crate::db;
use crate::error::{ProcessingError, ProcessingResult};
use crate::models::sermon::{ProcessingTrack, Sermon, TrackStatus};
use crate::models::transcript::Transcript;
use crate::services::anchor_resolver;
use crate::services::chunk_tracker::ChunkTracker;
use crate::services::verification::VerificationEngine;
use crate::types::{GenerationRequest, StudyGuideService, TranscriptionRequest, TranscriptionService};
use berean_common::events::{BereanEvent, EventBus};
use chrono::Utc;
use sha2::{Digest, Sha256};
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Audio container formats accepted for import
const SUPPORTED_EXTENSIONS: &[&str] = &["m4a", "mp3", "wav", "aac", "flac"];

/// Imports above this size are rejected outright (2 GiB)
const MAX_IMPORT_BYTES: u64 = 2 * 1024 * 1024 * 1024;

/// Recordings shorter than this are not worth processing
const MIN_DURATION_SECONDS: f64 = 10.0;

/// Sermon processing orchestrator
pub struct SermonProcessor {
    db: SqlitePool,
    event_bus: EventBus,
    chunk_tracker: ChunkTracker,
    transcriber: Arc<dyn TranscriptionService>,
    generator: Arc<dyn StudyGuideService>,
    verifier: VerificationEngine,
    job_timeout: Duration,
    anchor_threshold: f64,
}

impl SermonProcessor {
    pub fn new(
        db: SqlitePool,
        event_bus: EventBus,
        transcriber: Arc<dyn TranscriptionService>,
        generator: Arc<dyn StudyGuideService>,
        verifier: VerificationEngine,
        job_timeout: Duration,
        anchor_threshold: f64,
    ) -> Self {
        let chunk_tracker = ChunkTracker::new(db.clone(), event_bus.clone());
        Self {
            db,
            event_bus,
            chunk_tracker,
            transcriber,
            generator,
            verifier,
            job_timeout,
            anchor_threshold,
        }
    }

    /// The chunk tracker sharing this processor's database and event bus
    pub fn chunk_tracker(&self) -> &ChunkTracker {
        &self.chunk_tracker
    }

    /// Create a sermon record at recording start. Chunks arrive through
    /// the chunk tracker as capture proceeds.
    pub async fn create_sermon(&self, title: String) -> ProcessingResult<Sermon> {
        let sermon = Sermon::new(title, Utc::now());
        self.save(&sermon).await?;

        tracing::info!(sermon_id = %sermon.id, "Sermon created, recording started");
        self.event_bus.emit_lossy(BereanEvent::RecordingStarted {
            sermon_id: sermon.id,
            timestamp: Utc::now(),
        });
        Ok(sermon)
    }

    /// Import an existing audio file as a sermon.
    ///
    /// Capture/import failures (missing file, permission, format, size,
    /// duration) surface synchronously from this call; nothing is
    /// swallowed into a background state.
    pub async fn import_sermon(
        &self,
        title: String,
        audio_path: &std::path::Path,
        duration_seconds: f64,
    ) -> ProcessingResult<Sermon> {
        let metadata = std::fs::metadata(audio_path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => {
                ProcessingError::AudioNotFound(audio_path.display().to_string())
            }
            std::io::ErrorKind::PermissionDenied => {
                ProcessingError::PermissionDenied(audio_path.display().to_string())
            }
            _ => ProcessingError::Io(e),
        })?;

        if metadata.len() > MAX_IMPORT_BYTES {
            return Err(ProcessingError::AudioTooLarge(metadata.len()));
        }

        let extension = audio_path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();
        if !SUPPORTED_EXTENSIONS.contains(&extension.as_str()) {
            return Err(ProcessingError::UnsupportedFormat(extension));
        }

        if duration_seconds < MIN_DURATION_SECONDS {
            return Err(ProcessingError::RecordingTooShort(duration_seconds));
        }

        let contents = std::fs::read(audio_path)?;
        let content_hash = format!("{:x}", Sha256::digest(&contents));

        let mut sermon = Sermon::new(title, Utc::now());
        sermon.audio_path = Some(audio_path.display().to_string());
        sermon.duration_seconds = Some(duration_seconds);
        sermon.content_hash = Some(content_hash);
        self.save(&sermon).await?;

        tracing::info!(
            sermon_id = %sermon.id,
            path = %audio_path.display(),
            duration_seconds,
            "Sermon imported"
        );
        self.event_bus.emit_lossy(BereanEvent::RecordingStarted {
            sermon_id: sermon.id,
            timestamp: Utc::now(),
        });
        Ok(sermon)
    }

    /// Run both pending tracks of a sermon to their terminal states.
    ///
    /// The transcription track runs first; the study guide track needs
    /// its output. A failed track never blocks the other direction:
    /// transcription success with study-guide failure leaves the sermon
    /// viewable in degraded mode.
    pub async fn process_sermon(
        &self,
        sermon_id: Uuid,
        cancel_token: &CancellationToken,
    ) -> ProcessingResult<Sermon> {
        let mut sermon = self.load(sermon_id).await?;
        if sermon.deleted_at.is_some() {
            return Err(ProcessingError::NotFound(format!("sermon {} is deleted", sermon_id)));
        }

        if sermon.transcription_status == TrackStatus::Pending {
            self.run_transcription_track(&mut sermon).await?;
        }
        if cancel_token.is_cancelled() {
            return Ok(sermon);
        }

        if sermon.study_guide_status == TrackStatus::Pending
            && sermon.transcription_status == TrackStatus::Succeeded
        {
            self.run_study_guide_track(&mut sermon).await?;
        }

        Ok(sermon)
    }

    /// Reset a failed track and run it again. The sibling track keeps its
    /// state.
    pub async fn retry_failed_track(
        &self,
        sermon_id: Uuid,
        track: ProcessingTrack,
    ) -> ProcessingResult<Sermon> {
        let mut sermon = self.load(sermon_id).await?;
        sermon.reset_for_retry(track)?;
        self.save(&sermon).await?;

        match track {
            ProcessingTrack::Transcription => self.run_transcription_track(&mut sermon).await?,
            ProcessingTrack::StudyGuide => {
                if sermon.transcription_status == TrackStatus::Succeeded {
                    self.run_study_guide_track(&mut sermon).await?;
                }
            }
        }
        Ok(sermon)
    }

    /// Soft-delete a sermon.
    ///
    /// Refused with `DeletionWhileProcessing` while either track is
    /// running; the condition is surfaced to the caller, never silently
    /// queued.
    pub async fn delete_sermon(&self, sermon_id: Uuid) -> ProcessingResult<()> {
        let mut sermon = self.load(sermon_id).await?;
        sermon.mark_deleted()?;
        self.save(&sermon).await?;

        tracing::info!(sermon_id = %sermon_id, "Sermon soft-deleted");
        self.event_bus.emit_lossy(BereanEvent::SermonDeleted {
            sermon_id,
            timestamp: Utc::now(),
        });
        Ok(())
    }

    /// Transcription track: dispatch the remote job against the uploaded
    /// chunks and persist the assembled transcript
    async fn run_transcription_track(&self, sermon: &mut Sermon) -> ProcessingResult<()> {
        let chunks = db::chunks::load_chunks_for_sermon(&self.db, sermon.id)
            .await
            .map_err(|e| ProcessingError::Storage(e.to_string()))?;

        // Chunked recordings wait until every chunk has landed; the
        // track stays pending and the next processing pass picks it up
        if !chunks.is_empty() {
            let summary = self.chunk_tracker.sermon_summary(sermon.id).await?;
            if !summary.all_uploaded() {
                tracing::debug!(
                    sermon_id = %sermon.id,
                    uploaded = summary.uploaded,
                    total = summary.total,
                    "Transcription deferred until all chunks uploaded"
                );
                return Ok(());
            }
        }

        sermon.mark_running(ProcessingTrack::Transcription);
        self.save(sermon).await?;
        tracing::info!(sermon_id = %sermon.id, "Transcription track dispatched");
        self.event_bus.emit_lossy(BereanEvent::TranscriptionStarted {
            sermon_id: sermon.id,
            timestamp: Utc::now(),
        });

        // Remote chunk storage is content-addressed; an un-uploaded
        // import falls back to its remote audio URL
        let chunk_urls: Vec<String> = if chunks.is_empty() {
            sermon.remote_audio_url.iter().cloned().collect()
        } else {
            let base = sermon
                .remote_audio_url
                .as_deref()
                .unwrap_or("")
                .trim_end_matches('/')
                .to_string();
            chunks
                .iter()
                .map(|c| {
                    if base.is_empty() {
                        c.content_hash.clone()
                    } else {
                        format!("{}/{}", base, c.content_hash)
                    }
                })
                .collect()
        };

        let request = TranscriptionRequest {
            sermon_id: sermon.id,
            chunk_urls,
        };

        let outcome = tokio::time::timeout(self.job_timeout, self.transcriber.transcribe(request)).await;

        match outcome {
            Ok(Ok(payload)) => {
                let word_count = payload.words.len();
                let transcript = Transcript::new(sermon.id, payload.text, payload.words);
                db::transcripts::save_transcript(&self.db, &transcript)
                    .await
                    .map_err(|e| ProcessingError::Storage(e.to_string()))?;

                if sermon.duration_seconds.is_none() {
                    sermon.duration_seconds =
                        transcript.words.last().map(|w| w.end_seconds);
                }
                sermon.mark_succeeded(ProcessingTrack::Transcription);
                self.save(sermon).await?;

                tracing::info!(sermon_id = %sermon.id, word_count, "Transcription track succeeded");
                self.event_bus.emit_lossy(BereanEvent::TranscriptionCompleted {
                    sermon_id: sermon.id,
                    word_count,
                    timestamp: Utc::now(),
                });
            }
            Ok(Err(e)) => self.fail_track(sermon, ProcessingTrack::Transcription, &e).await?,
            Err(_) => {
                let e = ProcessingError::JobTimeout(self.job_timeout.as_secs());
                self.fail_track(sermon, ProcessingTrack::Transcription, &e).await?;
            }
        }

        Ok(())
    }

    /// Study guide track: dispatch generation, then post-process the
    /// output (anchor timestamps, reference verification) before
    /// persisting
    async fn run_study_guide_track(&self, sermon: &mut Sermon) -> ProcessingResult<()> {
        let transcript = db::transcripts::load_transcript_for_sermon(&self.db, sermon.id)
            .await
            .map_err(|e| ProcessingError::Storage(e.to_string()))?
            .ok_or_else(|| {
                ProcessingError::NotFound(format!("transcript for sermon {}", sermon.id))
            })?;

        sermon.mark_running(ProcessingTrack::StudyGuide);
        self.save(sermon).await?;
        tracing::info!(sermon_id = %sermon.id, "Study guide track dispatched");
        self.event_bus.emit_lossy(BereanEvent::StudyGuideStarted {
            sermon_id: sermon.id,
            timestamp: Utc::now(),
        });

        let request = GenerationRequest {
            sermon_id: sermon.id,
            transcript_text: transcript.corrected_text(),
        };

        let outcome = tokio::time::timeout(self.job_timeout, self.generator.generate(request)).await;

        match outcome {
            Ok(Ok(wire)) => {
                let mut guide = wire.migrate(sermon.id);
                anchor_resolver::apply_anchor_timestamps(
                    &mut guide,
                    &transcript.words,
                    self.anchor_threshold,
                );
                self.verifier.verify_guide(&mut guide).await;

                db::study_guides::save_study_guide(&self.db, &guide)
                    .await
                    .map_err(|e| ProcessingError::Storage(e.to_string()))?;

                sermon.mark_succeeded(ProcessingTrack::StudyGuide);
                self.save(sermon).await?;

                tracing::info!(
                    sermon_id = %sermon.id,
                    suggested = guide.suggested_references.len(),
                    insights = guide.insights.len(),
                    "Study guide track succeeded"
                );
                self.event_bus.emit_lossy(BereanEvent::StudyGuideCompleted {
                    sermon_id: sermon.id,
                    suggested_reference_count: guide.suggested_references.len(),
                    timestamp: Utc::now(),
                });
            }
            Ok(Err(e)) => self.fail_track(sermon, ProcessingTrack::StudyGuide, &e).await?,
            Err(_) => {
                let e = ProcessingError::JobTimeout(self.job_timeout.as_secs());
                self.fail_track(sermon, ProcessingTrack::StudyGuide, &e).await?;
            }
        }

        Ok(())
    }

    /// Record a job failure as the track's terminal state
    async fn fail_track(
        &self,
        sermon: &mut Sermon,
        track: ProcessingTrack,
        error: &ProcessingError,
    ) -> ProcessingResult<()> {
        let message = error.to_string();
        sermon.mark_failed(track, &message);
        self.save(sermon).await?;

        tracing::warn!(
            sermon_id = %sermon.id,
            track = ?track,
            retryable = error.is_retryable(),
            error = %message,
            "Processing track failed"
        );

        let timestamp = Utc::now();
        let event = match track {
            ProcessingTrack::Transcription => BereanEvent::TranscriptionFailed {
                sermon_id: sermon.id,
                error_message: message,
                timestamp,
            },
            ProcessingTrack::StudyGuide => BereanEvent::StudyGuideFailed {
                sermon_id: sermon.id,
                error_message: message,
                timestamp,
            },
        };
        self.event_bus.emit_lossy(event);
        Ok(())
    }

    async fn load(&self, sermon_id: Uuid) -> ProcessingResult<Sermon> {
        db::sermons::load_sermon(&self.db, sermon_id)
            .await
            .map_err(|e| ProcessingError::Storage(e.to_string()))?
            .ok_or_else(|| ProcessingError::NotFound(format!("sermon {}", sermon_id)))
    }

    async fn save(&self, sermon: &Sermon) -> ProcessingResult<()> {
        db::sermons::save_sermon(&self.db, sermon)
            .await
            .map_err(|e| ProcessingError::Storage(e.to_string()))
    }
}
