//! Provider seams used by every pipeline component
//!
//! The pipeline never talks to an HTTP API directly. Completion and embedding
//! calls go through these traits so the client can be swapped, disabled, or
//! scripted in tests.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::{Error, Result};
use crate::prompts::PromptId;

use super::json::parse_json_response;

/// A fully resolved completion call
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    /// Prompt the request was built from (used for logging and routing)
    pub prompt_id: PromptId,
    /// Concrete model identifier
    pub model: String,
    /// Output token budget
    pub max_tokens: usize,
    /// Optional system prompt
    pub system: Option<String>,
    /// Interpolated user prompt
    pub prompt: String,
}

/// Executes prompts against an LLM and returns raw text
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<String>;
}

/// Turns text into fixed-length vectors
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Whether the provider can serve requests at all
    fn is_configured(&self) -> bool;

    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// Run a completion and parse its text as JSON
///
/// This is the only place raw provider text is turned into typed values.
pub async fn complete_json<T, P>(provider: &P, request: &CompletionRequest) -> Result<T>
where
    T: DeserializeOwned,
    P: CompletionProvider + ?Sized,
{
    let text = provider.complete(request).await?;
    debug!(
        prompt_id = %request.prompt_id,
        response_chars = text.len(),
        "Parsing structured completion"
    );
    parse_json_response(&text)
}

/// Embed text, failing fast when the provider is not configured
pub async fn embed_checked<P>(provider: &P, text: &str) -> Result<Vec<f32>>
where
    P: EmbeddingProvider + ?Sized,
{
    if !provider.is_configured() {
        return Err(Error::EmbeddingUnavailable);
    }
    let vector = provider.embed(text).await?;
    if vector.is_empty() {
        return Err(Error::EmbeddingFailed("Provider returned an empty vector".into()));
    }
    Ok(vector)
}

/// Stand-in used when no API key is available
///
/// Every call fails, so advisory features degrade to their defaults and
/// primary paths report a clear error.
#[derive(Debug, Clone, Default)]
pub struct DisabledProvider;

#[async_trait]
impl CompletionProvider for DisabledProvider {
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        Err(Error::LLMError(format!(
            "No completion provider configured for prompt '{}'",
            request.prompt_id
        )))
    }
}

#[async_trait]
impl EmbeddingProvider for DisabledProvider {
    fn is_configured(&self) -> bool {
        false
    }

    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Err(Error::EmbeddingUnavailable)
    }
}
