//! Playbook Core Library
//!
//! This crate provides the knowledge pipeline behind Playbook, including:
//! - Extraction of typed knowledge entries from call transcripts
//! - Topic normalization against an owner's vocabulary
//! - Content briefs, template matching and readiness assessment
//! - Same-day collision detection for scheduled posts
//! - Playbook SOP synchronization (classify, merge, create)
//! - Knowledge storage (SQLite + in-memory)
//! - LLM integration (OpenRouter API) and prompt registry

pub mod batch;
pub mod collision;
pub mod config;
pub mod error;
pub mod extraction;
pub mod knowledge;
pub mod llm;
pub mod playbook;
pub mod prompts;
pub mod retrieval;
pub mod store;
pub mod usage;

pub use error::{Error, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::error::{Error, Result};
    pub use crate::knowledge::{KnowledgeEntry, KnowledgeType, Template, Topic};
    pub use crate::llm::{CompletionProvider, EmbeddingProvider};
    pub use crate::store::KnowledgeStore;
}
