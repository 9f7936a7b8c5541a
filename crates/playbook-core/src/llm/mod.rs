//! LLM integration
//!
//! This module provides:
//! - OpenRouter HTTP client for chat completions and embeddings
//! - Provider traits the pipeline depends on instead of the client itself
//! - Tolerant JSON parsing applied once at the provider boundary

mod client;
pub mod json;
mod provider;
mod types;

pub use client::{LlmClient, LlmClientBuilder};
pub use json::parse_json_response;
pub use provider::{
    CompletionProvider, CompletionRequest, DisabledProvider, EmbeddingProvider, complete_json,
    embed_checked,
};
pub use types::{FinishReason, LlmResponse, Message, MessageRole};
