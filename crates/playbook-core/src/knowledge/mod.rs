//! Knowledge data model
//!
//! Entries extracted from transcripts, the per-owner topic vocabulary, and
//! the template library used for matching.

mod entry;
mod template;
mod topic;

pub use entry::{
    Actionability, Category, HIGH_QUALITY, KnowledgeEntry, KnowledgeType, MAX_QUALITY,
    MIN_QUALITY, Speaker, clamp_quality,
};
pub use template::{Template, TemplateMatch};
pub use topic::{Topic, TopicCandidate, display_name_from_slug, is_valid_slug, slugify};
