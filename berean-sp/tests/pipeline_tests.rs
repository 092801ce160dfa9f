//! End-to-end pipeline tests over in-memory SQLite with mock remote jobs
//! Test File: pipeline_tests.rs

use async_trait::async_trait;
use berean_common::events::EventBus;
use berean_sp::db;
use berean_sp::models::study_guide::{StudyGuideWire, VerificationStatus};
use berean_sp::models::{ProcessingTrack, Sermon, TrackStatus};
use berean_sp::services::{SermonProcessor, VerificationEngine};
use berean_sp::types::{
    CrossRefEdge, CrossRefLookup, GenerationRequest, InsightSummary, LookupError,
    StudyGuideService, TranscriptPayload, TranscriptionRequest, TranscriptionService,
};
use berean_sp::ProcessingError;
use chrono::Utc;
use serde_json::json;
use sqlx::SqlitePool;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const SERMON_TEXT: &str = "turn with me to John 3:16 where we read that God so loved \
    the world and friends my grace is sufficient for you is the promise Paul carried";

fn word_timings(text: &str) -> Vec<berean_sp::models::WordTiming> {
    text.split_whitespace()
        .enumerate()
        .map(|(i, w)| berean_sp::models::WordTiming {
            word: w.to_string(),
            start_seconds: i as f64,
            end_seconds: i as f64 + 0.9,
        })
        .collect()
}

// ----------------------------------------------------------------------------
// Mock collaborators
// ----------------------------------------------------------------------------

/// Transcriber returning a fixed payload, optionally after a delay
struct MockTranscriber {
    delay: Duration,
}

#[async_trait]
impl TranscriptionService for MockTranscriber {
    async fn transcribe(
        &self,
        _request: TranscriptionRequest,
    ) -> Result<TranscriptPayload, ProcessingError> {
        tokio::time::sleep(self.delay).await;
        Ok(TranscriptPayload {
            text: SERMON_TEXT.to_string(),
            words: word_timings(SERMON_TEXT),
        })
    }
}

/// Generator failing the first `failures` calls, then succeeding
struct MockGenerator {
    failures: usize,
    calls: AtomicUsize,
}

impl MockGenerator {
    fn failing(failures: usize) -> Self {
        Self {
            failures,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl StudyGuideService for MockGenerator {
    async fn generate(&self, _request: GenerationRequest) -> Result<StudyGuideWire, ProcessingError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures {
            return Err(ProcessingError::StudyGuideFailed("model overloaded".to_string()));
        }
        let wire = StudyGuideWire::from_json(&json!({
            "summary": "Grace and the love of God",
            "key_themes": ["grace"],
            "outline": [{
                "title": "The promise",
                "body": "Paul's assurance",
                "anchor_text": "my grace is sufficient for you"
            }],
            "mentioned_references": ["John 3:16"],
            "suggested_references": ["Romans 5:8", "Romans 5:8", "Hezekiah 1:1"],
            "insights": [{
                "title": "Sufficiency",
                "insight": "Grace meets every need",
                "supporting_quote": "my grace is sufficient for you"
            }]
        }))
        .expect("mock payload must decode");
        Ok(wire)
    }
}

/// Fixed lookup snapshot: John 3:16 → Romans 5:8 is curated
struct FixedLookup;

#[async_trait]
impl CrossRefLookup for FixedLookup {
    async fn verse_exists(&self, b: u8, c: u32, v: u32) -> Result<bool, LookupError> {
        Ok(matches!((b, c, v), (43, 3, 16) | (45, 5, 8)))
    }

    async fn outgoing_refs(&self, b: u8, c: u32, v: u32) -> Result<Vec<CrossRefEdge>, LookupError> {
        if (b, c, v) == (43, 3, 16) {
            Ok(vec![CrossRefEdge {
                target_book_id: 45,
                target_chapter: 5,
                target_verse_start: 8,
                target_verse_end: 8,
                weight: 42.0,
            }])
        } else {
            Ok(Vec::new())
        }
    }

    async fn has_incoming_ref(&self, _b: u8, _c: u32, _v: u32) -> Result<bool, LookupError> {
        Ok(false)
    }

    async fn insight_summaries(
        &self,
        _b: u8,
        _c: u32,
        _v: u32,
    ) -> Result<Vec<InsightSummary>, LookupError> {
        Ok(Vec::new())
    }
}

// ----------------------------------------------------------------------------
// Harness
// ----------------------------------------------------------------------------

async fn processor(
    pool: SqlitePool,
    transcriber_delay: Duration,
    generator_failures: usize,
    job_timeout: Duration,
) -> SermonProcessor {
    SermonProcessor::new(
        pool,
        EventBus::new(256),
        Arc::new(MockTranscriber { delay: transcriber_delay }),
        Arc::new(MockGenerator::failing(generator_failures)),
        VerificationEngine::new(Arc::new(FixedLookup)),
        job_timeout,
        0.80,
    )
}

async fn imported_sermon(pool: &SqlitePool) -> Sermon {
    let mut sermon = Sermon::new("Sunday morning".to_string(), Utc::now());
    sermon.remote_audio_url = Some("https://store.example/audio/abc".to_string());
    db::sermons::save_sermon(pool, &sermon).await.unwrap();
    sermon
}

// ----------------------------------------------------------------------------
// Scenarios
// ----------------------------------------------------------------------------

/// TC-PL-001: Happy path runs both tracks, persists transcript and an
/// enriched study guide
#[tokio::test]
async fn tc_pl_001_full_pipeline_success() {
    let pool = db::init_memory_pool().await.unwrap();
    let sermon = imported_sermon(&pool).await;
    let processor = processor(pool.clone(), Duration::ZERO, 0, Duration::from_secs(30)).await;

    let processed = processor
        .process_sermon(sermon.id, &CancellationToken::new())
        .await
        .unwrap();

    assert!(processed.is_complete());
    assert!(processed.duration_seconds.is_some());

    let transcript = db::transcripts::load_transcript_for_sermon(&pool, sermon.id)
        .await
        .unwrap()
        .expect("transcript persisted");
    assert!(!transcript.words.is_empty());

    let guide = db::study_guides::load_study_guide_for_sermon(&pool, sermon.id)
        .await
        .unwrap()
        .expect("study guide persisted");

    // Anchors resolved against the transcript
    assert!(guide.outline[0].timestamp_seconds.is_some());
    assert!(guide.outline[0].match_confidence.unwrap() >= 0.80);
    assert!(guide.insights[0].timestamp_seconds.is_some());

    // Suggested references deduplicated and classified
    assert_eq!(guide.suggested_references.len(), 2);
    let romans = guide
        .suggested_references
        .iter()
        .find(|r| r.raw_text.starts_with("Romans"))
        .unwrap();
    assert_eq!(romans.verification, Some(VerificationStatus::Verified));
    assert_eq!(romans.verified_by, vec!["43.3.16".to_string()]);
    let bogus = guide
        .suggested_references
        .iter()
        .find(|r| r.raw_text.starts_with("Hezekiah"))
        .unwrap();
    assert_eq!(bogus.verification, Some(VerificationStatus::Unverified));
}

/// TC-PL-002: Study guide failure leaves a degraded-viewable sermon
#[tokio::test]
async fn tc_pl_002_degraded_mode_on_generation_failure() {
    let pool = db::init_memory_pool().await.unwrap();
    let sermon = imported_sermon(&pool).await;
    // Generator never succeeds within this test
    let processor = processor(pool.clone(), Duration::ZERO, 99, Duration::from_secs(30)).await;

    let processed = processor
        .process_sermon(sermon.id, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(processed.transcription_status, TrackStatus::Succeeded);
    assert_eq!(processed.study_guide_status, TrackStatus::Failed);
    assert!(processed.study_guide_error.as_deref().unwrap().contains("model overloaded"));
    assert!(processed.can_view_in_degraded_mode());
    assert!(!processed.is_complete());

    // The transcript survives the failed sibling track
    assert!(db::transcripts::load_transcript_for_sermon(&pool, sermon.id)
        .await
        .unwrap()
        .is_some());
}

/// TC-PL-003: Job timeout lands as a failed, retryable track state
#[tokio::test]
async fn tc_pl_003_timeout_is_terminal_and_retryable() {
    let pool = db::init_memory_pool().await.unwrap();
    let sermon = imported_sermon(&pool).await;
    // Transcriber takes far longer than the job deadline
    let processor = processor(
        pool.clone(),
        Duration::from_secs(60),
        0,
        Duration::from_millis(50),
    )
    .await;

    let processed = processor
        .process_sermon(sermon.id, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(processed.transcription_status, TrackStatus::Failed);
    assert!(processed
        .transcription_error
        .as_deref()
        .unwrap()
        .contains("timed out"));
    // Timeout is a retryable error kind
    assert!(ProcessingError::JobTimeout(1).is_retryable());
    // The dependent track never started
    assert_eq!(processed.study_guide_status, TrackStatus::Pending);
}

/// TC-PL-004: Retrying the failed track re-runs it without touching the
/// succeeded sibling
#[tokio::test]
async fn tc_pl_004_retry_failed_track() {
    let pool = db::init_memory_pool().await.unwrap();
    let sermon = imported_sermon(&pool).await;
    // First generation call fails, second succeeds
    let processor = processor(pool.clone(), Duration::ZERO, 1, Duration::from_secs(30)).await;

    let processed = processor
        .process_sermon(sermon.id, &CancellationToken::new())
        .await
        .unwrap();
    assert!(processed.can_view_in_degraded_mode());

    let retried = processor
        .retry_failed_track(sermon.id, ProcessingTrack::StudyGuide)
        .await
        .unwrap();

    assert!(retried.is_complete());
    assert!(retried.study_guide_error.is_none());
    assert_eq!(retried.transcription_status, TrackStatus::Succeeded);
}

/// TC-PL-005: Deletion refused mid-processing, surfaced as its own error
#[tokio::test]
async fn tc_pl_005_delete_guard_during_processing() {
    let pool = db::init_memory_pool().await.unwrap();
    let mut sermon = imported_sermon(&pool).await;
    sermon.mark_running(ProcessingTrack::Transcription);
    db::sermons::save_sermon(&pool, &sermon).await.unwrap();

    let processor = processor(pool.clone(), Duration::ZERO, 0, Duration::from_secs(30)).await;
    let err = processor.delete_sermon(sermon.id).await.unwrap_err();
    assert!(matches!(err, ProcessingError::DeletionWhileProcessing));

    // After the track settles, deletion tombstones the sermon
    sermon.mark_failed(ProcessingTrack::Transcription, "x");
    db::sermons::save_sermon(&pool, &sermon).await.unwrap();
    processor.delete_sermon(sermon.id).await.unwrap();
    let loaded = db::sermons::load_sermon(&pool, sermon.id).await.unwrap().unwrap();
    assert!(loaded.deleted_at.is_some());
}

/// TC-PL-006: A chunked recording defers transcription until every chunk
/// has uploaded
#[tokio::test]
async fn tc_pl_006_transcription_waits_for_chunks() {
    let pool = db::init_memory_pool().await.unwrap();
    let processor = processor(pool.clone(), Duration::ZERO, 0, Duration::from_secs(30)).await;
    // Recording flow: sermon created at capture start, chunks follow
    let sermon = processor
        .create_sermon("Wednesday evening".to_string())
        .await
        .unwrap();

    let a = processor
        .chunk_tracker()
        .register_chunk(sermon.id, 0, 0.0, 30.0, b"first")
        .await
        .unwrap();
    let b = processor
        .chunk_tracker()
        .register_chunk(sermon.id, 1, 30.0, 30.0, b"second")
        .await
        .unwrap();
    processor.chunk_tracker().complete_upload(a.id).await.unwrap();

    // One chunk still pending: the track stays pending
    let deferred = processor
        .process_sermon(sermon.id, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(deferred.transcription_status, TrackStatus::Pending);

    // Last chunk lands; the next pass runs the job
    processor.chunk_tracker().complete_upload(b.id).await.unwrap();
    let processed = processor
        .process_sermon(sermon.id, &CancellationToken::new())
        .await
        .unwrap();
    assert!(processed.is_complete());
}

/// TC-PL-007: Import validation surfaces capture errors synchronously
#[tokio::test]
async fn tc_pl_007_import_validation() {
    let pool = db::init_memory_pool().await.unwrap();
    let processor = processor(pool.clone(), Duration::ZERO, 0, Duration::from_secs(30)).await;
    let dir = tempfile::tempdir().unwrap();

    // Missing file
    let err = processor
        .import_sermon("x".into(), &dir.path().join("missing.m4a"), 600.0)
        .await
        .unwrap_err();
    assert!(matches!(err, ProcessingError::AudioNotFound(_)));
    assert!(!err.is_retryable());

    // Unsupported container
    let bad_format = dir.path().join("sermon.txt");
    std::fs::write(&bad_format, b"not audio").unwrap();
    let err = processor
        .import_sermon("x".into(), &bad_format, 600.0)
        .await
        .unwrap_err();
    assert!(matches!(err, ProcessingError::UnsupportedFormat(_)));

    // Too short to process
    let short = dir.path().join("clip.m4a");
    std::fs::write(&short, b"audio bytes").unwrap();
    let err = processor
        .import_sermon("x".into(), &short, 3.0)
        .await
        .unwrap_err();
    assert!(matches!(err, ProcessingError::RecordingTooShort(_)));

    // Valid import creates a pending sermon
    let ok = dir.path().join("sunday.m4a");
    std::fs::write(&ok, b"audio bytes").unwrap();
    let sermon = processor
        .import_sermon("Sunday".into(), &ok, 1800.0)
        .await
        .unwrap();
    assert_eq!(sermon.transcription_status, TrackStatus::Pending);
    assert_eq!(sermon.duration_seconds, Some(1800.0));
    assert!(sermon.content_hash.is_some());
    assert!(db::sermons::load_sermon(&pool, sermon.id).await.unwrap().is_some());
}

/// TC-PL-008: Verification output is stable across repeated processing of
/// identical input
#[tokio::test]
async fn tc_pl_008_reprocessing_is_deterministic() {
    let pool = db::init_memory_pool().await.unwrap();
    let first_sermon = imported_sermon(&pool).await;
    let second_sermon = imported_sermon(&pool).await;
    let processor = processor(pool.clone(), Duration::ZERO, 0, Duration::from_secs(30)).await;

    processor
        .process_sermon(first_sermon.id, &CancellationToken::new())
        .await
        .unwrap();
    processor
        .process_sermon(second_sermon.id, &CancellationToken::new())
        .await
        .unwrap();

    let first = db::study_guides::load_study_guide_for_sermon(&pool, first_sermon.id)
        .await
        .unwrap()
        .unwrap();
    let second = db::study_guides::load_study_guide_for_sermon(&pool, second_sermon.id)
        .await
        .unwrap()
        .unwrap();

    for (a, b) in first
        .suggested_references
        .iter()
        .zip(second.suggested_references.iter())
    {
        assert_eq!(a.verification, b.verification);
        assert_eq!(a.enrichment_sources, b.enrichment_sources);
        assert_eq!(a.verified_by, b.verified_by);
    }
    assert_eq!(
        first.outline[0].timestamp_seconds,
        second.outline[0].timestamp_seconds
    );
}
