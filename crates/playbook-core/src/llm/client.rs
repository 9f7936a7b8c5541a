//! OpenRouter LLM client implementation
//!
//! Async HTTP client for OpenAI-compatible chat completion and embedding
//! endpoints, with rate limit handling via exponential backoff. Implements
//! both provider traits used by the pipeline.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client as HttpClient;
use tracing::{debug, warn};

use crate::config::{Config, LlmConfig};
use crate::error::{Error, Result};

use super::provider::{CompletionProvider, CompletionRequest, EmbeddingProvider};
use super::types::{
    ChatRequest, ChatResponse, EmbeddingRequest, EmbeddingResponse, FinishReason, LlmResponse,
    Message,
};

/// Maximum number of attempts for rate-limited requests
const MAX_RETRY_ATTEMPTS: u32 = 3;

/// Base delay for exponential backoff (in milliseconds)
const BACKOFF_BASE_MS: u64 = 1000;

/// Upper bound on a single backoff sleep
const MAX_BACKOFF_MS: u64 = 30_000;

/// OpenRouter LLM client
///
/// Cheap to clone; the underlying HTTP client shares its connection pool.
#[derive(Clone)]
pub struct LlmClient {
    http_client: HttpClient,
    config: LlmConfig,
    api_key: String,
    embedding_model: String,
}

impl std::fmt::Debug for LlmClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmClient")
            .field("base_url", &self.config.base_url)
            .field("embedding_model", &self.embedding_model)
            .finish()
    }
}

/// Builder for creating an LlmClient
#[derive(Default)]
pub struct LlmClientBuilder {
    config: Option<LlmConfig>,
    api_key: Option<String>,
    embedding_model: Option<String>,
    timeout_secs: Option<u64>,
}

impl LlmClientBuilder {
    pub fn config(mut self, config: LlmConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Model used by [`EmbeddingProvider::embed`]; an empty name disables embeddings
    pub fn embedding_model(mut self, model: impl Into<String>) -> Self {
        self.embedding_model = Some(model.into());
        self
    }

    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    pub fn build(self) -> Result<LlmClient> {
        let config = self.config.unwrap_or_default();
        let api_key = self
            .api_key
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| Error::LLMError("API key is required".to_string()))?;

        let timeout_secs = self.timeout_secs.unwrap_or(config.timeout_secs);

        let http_client = HttpClient::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(Error::NetworkError)?;

        Ok(LlmClient {
            http_client,
            config,
            api_key,
            embedding_model: self.embedding_model.unwrap_or_default(),
        })
    }
}

impl LlmClient {
    pub fn builder() -> LlmClientBuilder {
        LlmClientBuilder::default()
    }

    /// Build a client from configuration, resolving the API key from the environment
    ///
    /// Returns `Ok(None)` when no key is set so callers can fall back to a
    /// disabled provider.
    pub fn from_config(config: &Config) -> Result<Option<Self>> {
        let api_key = config
            .llm
            .resolved_api_key()
            .map_err(|e| Error::ConfigError(e.to_string()))?;

        match api_key {
            Some(key) => Self::builder()
                .config(config.llm.clone())
                .api_key(key)
                .embedding_model(config.models.embedding.clone())
                .build()
                .map(Some),
            None => Ok(None),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    /// Send a chat completion, retrying on rate limits
    pub async fn chat(
        &self,
        model: &str,
        messages: Vec<Message>,
        max_tokens: usize,
    ) -> Result<LlmResponse> {
        let request = ChatRequest::new(model, messages)
            .with_temperature(self.config.temperature)
            .with_max_tokens(max_tokens);

        retry_rate_limited(&request.model, || self.send_chat(&request)).await
    }

    async fn send_chat(&self, request: &ChatRequest) -> Result<LlmResponse> {
        let url = format!("{}/chat/completions", self.config.base_url);

        debug!(
            model = %request.model,
            messages = request.messages.len(),
            "Sending chat completion request"
        );

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&self.api_key)
            .header("X-Title", "Playbook")
            .json(request)
            .send()
            .await
            .map_err(Error::NetworkError)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(map_error_status(status.as_u16(), &body));
        }

        let chat_response: ChatResponse = response
            .json()
            .await
            .map_err(|e| Error::LLMError(format!("Failed to parse response: {}", e)))?;

        LlmResponse::from_chat_response(chat_response)
            .ok_or_else(|| Error::LLMError("Empty response from API".to_string()))
    }

    async fn send_embedding(&self, text: &str) -> Result<Vec<f32>> {
        let url = format!("{}/embeddings", self.config.base_url);
        let request = EmbeddingRequest {
            model: self.embedding_model.clone(),
            input: text.to_string(),
        };

        debug!(model = %request.model, chars = text.len(), "Sending embedding request");

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&self.api_key)
            .header("X-Title", "Playbook")
            .json(&request)
            .send()
            .await
            .map_err(Error::NetworkError)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(match map_error_status(status.as_u16(), &body) {
                Error::LLMError(msg) => Error::EmbeddingFailed(msg),
                other => other,
            });
        }

        let embedding_response: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| Error::EmbeddingFailed(format!("Failed to parse response: {}", e)))?;

        embedding_response
            .data
            .into_iter()
            .min_by_key(|d| d.index)
            .map(|d| d.embedding)
            .ok_or_else(|| Error::EmbeddingFailed("Empty embedding response".to_string()))
    }
}

#[async_trait]
impl CompletionProvider for LlmClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = &request.system {
            messages.push(Message::system(system.as_str()));
        }
        messages.push(Message::user(request.prompt.as_str()));

        let response = self
            .chat(&request.model, messages, request.max_tokens)
            .await?;

        if response.finish_reason == FinishReason::Length {
            warn!(
                prompt_id = %request.prompt_id,
                max_tokens = request.max_tokens,
                "Completion hit the token budget; output may be truncated"
            );
        }
        debug!(
            prompt_id = %request.prompt_id,
            model = %response.model,
            input_tokens = response.input_tokens,
            output_tokens = response.output_tokens,
            "Completion finished"
        );

        Ok(response.content)
    }
}

#[async_trait]
impl EmbeddingProvider for LlmClient {
    fn is_configured(&self) -> bool {
        !self.embedding_model.trim().is_empty()
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if !self.is_configured() {
            return Err(Error::EmbeddingUnavailable);
        }

        retry_rate_limited(&self.embedding_model, || self.send_embedding(text)).await
    }
}

/// Translate an HTTP error status into a typed error
fn map_error_status(status: u16, body: &str) -> Error {
    match status {
        401 => Error::LLMError(
            "Unauthorized: Invalid API key. Set PLAYBOOK_API_KEY or OPENROUTER_API_KEY environment variable."
                .to_string(),
        ),
        429 => Error::RateLimited(extract_retry_after(body).unwrap_or(60)),
        400 => Error::LLMError(format!("Bad request: {}", body)),
        402 => Error::LLMError("Payment required: Insufficient credits".to_string()),
        404 => Error::LLMError(format!("Model not found or endpoint unavailable: {}", body)),
        500..=599 => Error::LLMError(format!("Server error ({}): {}", status, body)),
        _ => Error::LLMError(format!("HTTP error {}: {}", status, body)),
    }
}

/// Run `send` until it succeeds, fails with anything but a rate limit, or
/// runs out of attempts
async fn retry_rate_limited<T, F, Fut>(model: &str, mut send: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempts = 0;
    loop {
        attempts += 1;
        match send().await {
            Err(Error::RateLimited(wait_secs)) if attempts < MAX_RETRY_ATTEMPTS => {
                let backoff = calculate_backoff(attempts, wait_secs);
                warn!(
                    attempt = attempts,
                    wait_ms = backoff,
                    model = %model,
                    "Rate limited, retrying after backoff"
                );
                tokio::time::sleep(Duration::from_millis(backoff)).await;
            }
            other => return other,
        }
    }
}

/// Exponential backoff honoring a server-suggested wait, capped
fn calculate_backoff(attempt: u32, suggested_wait_secs: u64) -> u64 {
    let base = BACKOFF_BASE_MS * 2u64.pow(attempt.saturating_sub(1));
    base.max(suggested_wait_secs * 1000).min(MAX_BACKOFF_MS)
}

/// Extract retry-after value from an error body
fn extract_retry_after(body: &str) -> Option<u64> {
    let json = serde_json::from_str::<serde_json::Value>(body).ok()?;
    json.get("retry_after")
        .or_else(|| json.get("error").and_then(|e| e.get("retry_after")))
        .and_then(|v| v.as_u64())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn client(embedding_model: &str) -> LlmClient {
        LlmClient::builder()
            .config(LlmConfig::default())
            .api_key("test-key")
            .embedding_model(embedding_model)
            .build()
            .unwrap()
    }

    #[test]
    fn test_builder_requires_api_key() {
        assert!(LlmClient::builder().build().is_err());
        assert!(LlmClient::builder().api_key("   ").build().is_err());
    }

    #[test]
    fn test_is_configured_depends_on_embedding_model() {
        assert!(EmbeddingProvider::is_configured(&client("openai/text-embedding-3-small")));
        assert!(!EmbeddingProvider::is_configured(&client("")));
    }

    #[test]
    fn test_debug_hides_api_key() {
        let debug = format!("{:?}", client("m"));
        assert!(debug.contains("LlmClient"));
        assert!(!debug.contains("test-key"));
    }

    #[test]
    fn test_client_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<LlmClient>();
    }

    #[test]
    fn test_map_error_status() {
        assert!(matches!(map_error_status(429, "{\"retry_after\": 7}"), Error::RateLimited(7)));
        assert!(matches!(map_error_status(429, "slow down"), Error::RateLimited(60)));
        assert!(matches!(map_error_status(401, ""), Error::LLMError(_)));
        assert!(matches!(map_error_status(503, "down"), Error::LLMError(_)));
    }

    #[test]
    fn test_calculate_backoff() {
        assert_eq!(calculate_backoff(1, 0), BACKOFF_BASE_MS);
        assert_eq!(calculate_backoff(2, 0), BACKOFF_BASE_MS * 2);
        assert_eq!(calculate_backoff(1, 5), 5000);
        assert_eq!(calculate_backoff(1, 600), MAX_BACKOFF_MS);
    }

    #[test]
    fn test_extract_retry_after() {
        assert_eq!(extract_retry_after(r#"{"retry_after": 30}"#), Some(30));
        assert_eq!(extract_retry_after(r#"{"error": {"retry_after": 60}}"#), Some(60));
        assert_eq!(extract_retry_after(r#"{"message": "rate limited"}"#), None);
        assert_eq!(extract_retry_after("plain text"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limited_requests_are_retried() {
        let counter = AtomicU32::new(0);
        let attempts = &counter;
        let result = retry_rate_limited("openai/text-embedding-3-small", || async move {
            if attempts.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(Error::RateLimited(1))
            } else {
                Ok(vec![0.5f32])
            }
        })
        .await;

        assert_eq!(result.unwrap(), vec![0.5]);
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_stop_at_max_attempts() {
        let counter = AtomicU32::new(0);
        let attempts = &counter;
        let result: Result<()> = retry_rate_limited("m", || async move {
            attempts.fetch_add(1, Ordering::SeqCst);
            Err(Error::RateLimited(0))
        })
        .await;

        assert!(matches!(result, Err(Error::RateLimited(0))));
        assert_eq!(counter.load(Ordering::SeqCst), MAX_RETRY_ATTEMPTS);
    }

    #[tokio::test(start_paused = true)]
    async fn test_other_errors_are_not_retried() {
        let counter = AtomicU32::new(0);
        let attempts = &counter;
        let result: Result<()> = retry_rate_limited("m", || async move {
            attempts.fetch_add(1, Ordering::SeqCst);
            Err(Error::EmbeddingFailed("bad input".into()))
        })
        .await;

        assert!(matches!(result, Err(Error::EmbeddingFailed(_))));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_embed_without_model_is_unavailable() {
        let result = client("").embed("hello").await;
        assert!(matches!(result, Err(Error::EmbeddingUnavailable)));
    }
}
