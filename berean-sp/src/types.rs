//! Collaborator traits and wire types for berean-sp
//!
//! The remote transcription and study-guide generation services are
//! opaque asynchronous jobs; the cross-reference/insight database is a
//! read-only lookup. Each seam is a trait so the orchestrator and
//! verification engine can run against HTTP clients in production and
//! in-memory fakes in tests.

use crate::error::ProcessingError;
use crate::models::study_guide::StudyGuideWire;
use crate::models::transcript::WordTiming;
use serde::{Deserialize, Serialize};

// ============================================================================
// Remote job payloads
// ============================================================================

/// Structured transcription job output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptPayload {
    /// Full transcript text
    pub text: String,
    /// Ordered word-level timestamps
    pub words: Vec<WordTiming>,
}

/// Input handed to the transcription job: the uploaded chunk locations in
/// index order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionRequest {
    pub sermon_id: uuid::Uuid,
    pub chunk_urls: Vec<String>,
}

/// Input handed to the study guide generation job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub sermon_id: uuid::Uuid,
    /// Corrected transcript text
    pub transcript_text: String,
}

// ============================================================================
// Remote job traits
// ============================================================================

/// Remote transcription job collaborator
#[async_trait::async_trait]
pub trait TranscriptionService: Send + Sync {
    /// Run transcription to completion and return the structured output.
    ///
    /// Implementations own their polling; the caller wraps the whole call
    /// in its job timeout.
    async fn transcribe(&self, request: TranscriptionRequest)
        -> Result<TranscriptPayload, ProcessingError>;
}

/// Remote study guide generation job collaborator
#[async_trait::async_trait]
pub trait StudyGuideService: Send + Sync {
    /// Run generation to completion and return the wire payload.
    async fn generate(&self, request: GenerationRequest)
        -> Result<StudyGuideWire, ProcessingError>;
}

// ============================================================================
// Cross-reference / insight lookup
// ============================================================================

/// A directed cross-reference edge from the curated database
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrossRefEdge {
    pub target_book_id: u8,
    pub target_chapter: u32,
    pub target_verse_start: u32,
    pub target_verse_end: u32,
    /// Relevance weight (higher is stronger)
    pub weight: f64,
}

/// Insight summary: identifier and title only; full content is fetched on
/// demand elsewhere
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsightSummary {
    pub insight_id: String,
    pub title: String,
}

/// Lookup failure. Distinct from "no rows": a failed lookup yields the
/// `Unknown` verification status, never `Unverified`.
#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    #[error("Lookup database error: {0}")]
    Database(String),
    #[error("Lookup timed out")]
    Timeout,
}

/// Read-only cross-reference and insight lookup collaborator.
///
/// Implementations must be deterministic for unchanged content: the
/// verification engine's classification is a pure function of
/// (reference, lookup content).
#[async_trait::async_trait]
pub trait CrossRefLookup: Send + Sync {
    /// Whether the verse exists in the canon data
    async fn verse_exists(&self, book_id: u8, chapter: u32, verse: u32)
        -> Result<bool, LookupError>;

    /// Outgoing cross-references from a verse, ordered by weight
    /// descending with deterministic tie-breaking
    async fn outgoing_refs(&self, book_id: u8, chapter: u32, verse: u32)
        -> Result<Vec<CrossRefEdge>, LookupError>;

    /// Whether any cross-reference points *into* the given verse
    async fn has_incoming_ref(&self, book_id: u8, chapter: u32, verse: u32)
        -> Result<bool, LookupError>;

    /// Insight summaries for a verse (identifier + title only)
    async fn insight_summaries(&self, book_id: u8, chapter: u32, verse: u32)
        -> Result<Vec<InsightSummary>, LookupError>;
}
