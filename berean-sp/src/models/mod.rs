//! Domain models for sermon processing

pub mod chunk;
pub mod engagement;
pub mod sermon;
pub mod study_guide;
pub mod transcript;

pub use chunk::{validate_chunk_sequence, AudioChunk, UploadStatus};
pub use engagement::EngagementRecord;
pub use sermon::{ProcessingTrack, Sermon, TrackStatus};
pub use study_guide::{
    AnchoredInsight, EnrichmentSource, GuideQuote, OutlineSection, StudyGuide, StudyGuideWire,
    VerificationStatus, VerseReference,
};
pub use transcript::{CorrectionOverlay, DisplaySegment, Transcript, WordTiming};
