//! Transcript ingestion
//!
//! - [`KnowledgeExtractor`]: transcript text to knowledge entry drafts
//! - [`TopicNormalizer`]: suggested topics to the owner's vocabulary
//! - [`KnowledgePipeline`]: the full extract, tag, embed, store path

mod extractor;
mod normalizer;
mod pipeline;

pub use extractor::{
    DEFAULT_MAX_TRANSCRIPT_CHARS, ExtractionResult, KnowledgeExtractor, MIN_QUALITY_SIGNALS,
    QualitySignals, SpeakerInfo, SpeakerMap, SpeakerRole, TRUNCATION_MARKER, Transcript,
    TranscriptType, attribute_speaker, truncate_transcript,
};
pub use normalizer::{MAX_TOPICS_PER_ENTRY, TopicNormalizer, VOCABULARY_SIZE, fallback_candidates};
pub use pipeline::KnowledgePipeline;
