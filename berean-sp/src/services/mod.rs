//! Service modules for the sermon processing pipeline

pub mod anchor_resolver;
pub mod caption_detector;
pub mod chunk_tracker;
pub mod orchestrator;
pub mod reference_parser;
pub mod segmenter;
pub mod study_guide_client;
pub mod transcription_client;
pub mod verification;

pub use anchor_resolver::{AnchorResolver, ResolvedAnchor, DEFAULT_SIMILARITY_THRESHOLD};
pub use caption_detector::{highlight_ranges, CaptionSession, DetectedReference};
pub use chunk_tracker::{ChunkSummary, ChunkTracker};
pub use orchestrator::SermonProcessor;
pub use reference_parser::{ParseError, ParsedReference, ReferenceMatch};
pub use segmenter::{segment_words, SegmentCache};
pub use study_guide_client::{GenerationClientError, StudyGuideClient};
pub use transcription_client::{TranscriptionClient, TranscriptionClientError};
pub use verification::VerificationEngine;
