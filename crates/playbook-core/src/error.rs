//! Error types for Playbook

use thiserror::Error;

/// Result type alias using Playbook's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Maximum number of provider characters carried inside an error message
const RESPONSE_EXCERPT_CHARS: usize = 400;

/// Playbook error types with helpful messages and suggestions
#[derive(Error, Debug)]
pub enum Error {
    // Entity errors (E001-E099)
    #[error("Knowledge entry '{0}' not found.")]
    EntryNotFound(String),

    #[error("Template '{0}' not found.")]
    TemplateNotFound(String),

    // Network errors (E100-E199)
    #[error("Network error: {0}. Check your internet connection.")]
    NetworkError(#[from] reqwest::Error),

    #[error("LLM API error: {0}. Check your API key with `playbook config get llm.api_key`.")]
    LLMError(String),

    #[error("Rate limited. Waiting {0} seconds before retry.")]
    RateLimited(u64),

    // Provider response errors (E200-E299)
    #[error("Invalid provider response: {reason}. Response excerpt: {excerpt}")]
    InvalidResponse { reason: String, excerpt: String },

    #[error("Knowledge extraction failed: {0}")]
    ExtractionFailed(String),

    // Document edit errors (E300-E399)
    #[error("Anchor not found in document '{0}'")]
    AnchorNotFound(String),

    #[error("Anchor matches {1} locations in document '{0}'; an insertion anchor must be unique")]
    AmbiguousAnchor(String, usize),

    // Database errors (E400-E499)
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    // Prompt errors (E500-E599)
    #[error("Prompt '{0}' is not registered")]
    PromptNotFound(String),

    // Config errors (E600-E699)
    #[error("Configuration error: {0}")]
    ConfigError(String),

    // Input errors (E800-E899)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // Embedding errors (E1200-E1299)
    #[error("Embedding generation failed: {0}")]
    EmbeddingFailed(String),

    #[error("Embedding provider is not configured")]
    EmbeddingUnavailable,

    // Generic errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Build an `InvalidResponse` carrying a bounded excerpt of the provider text
    pub fn invalid_response(reason: impl Into<String>, response: &str) -> Self {
        let excerpt: String = response.chars().take(RESPONSE_EXCERPT_CHARS).collect();
        let excerpt = if excerpt.len() < response.len() {
            format!("{}...", excerpt)
        } else {
            excerpt
        };
        Self::InvalidResponse {
            reason: reason.into(),
            excerpt,
        }
    }

    /// Get error code for this error type
    pub fn code(&self) -> &'static str {
        match self {
            Self::EntryNotFound(_) => "E001",
            Self::TemplateNotFound(_) => "E002",
            Self::NetworkError(_) => "E100",
            Self::LLMError(_) => "E101",
            Self::RateLimited(_) => "E102",
            Self::InvalidResponse { .. } => "E200",
            Self::ExtractionFailed(_) => "E201",
            Self::AnchorNotFound(_) => "E300",
            Self::AmbiguousAnchor(..) => "E301",
            Self::DatabaseError(_) => "E400",
            Self::MigrationFailed(_) => "E401",
            Self::PromptNotFound(_) => "E500",
            Self::ConfigError(_) => "E600",
            Self::InvalidInput(_) => "E800",
            Self::EmbeddingFailed(_) => "E1200",
            Self::EmbeddingUnavailable => "E1201",
            Self::Serialization(_) | Self::Other(_) | Self::Io(_) => "E9999",
        }
    }

    /// Get suggestion for how to fix this error
    pub fn suggestion(&self) -> Option<String> {
        match self {
            Self::NetworkError(_) => Some("Check internet connection".to_string()),
            Self::LLMError(_) => Some("playbook config get llm.api_key".to_string()),
            Self::RateLimited(secs) => Some(format!("Retry in {} seconds", secs)),
            Self::EmbeddingUnavailable => Some(
                "Set PLAYBOOK_API_KEY and `playbook config set models.embedding <model>`".to_string(),
            ),
            Self::MigrationFailed(_) => Some("playbook doctor".to_string()),
            Self::ConfigError(_) => Some("playbook config list".to_string()),
            _ => None,
        }
    }

    /// Whether the failure came from an external provider rather than local state
    pub fn is_provider_failure(&self) -> bool {
        matches!(
            self,
            Self::NetworkError(_)
                | Self::LLMError(_)
                | Self::RateLimited(_)
                | Self::InvalidResponse { .. }
                | Self::EmbeddingFailed(_)
                | Self::EmbeddingUnavailable
        )
    }
}
