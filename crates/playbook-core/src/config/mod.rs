//! Configuration management with file persistence

use anyhow::{Context, anyhow};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::PathBuf;

use crate::prompts::ModelTier;

/// Playbook configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub llm: LlmConfig,
    pub models: ModelConfig,
    pub retrieval: RetrievalConfig,
    pub batch: BatchConfig,
    pub store: StoreConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    #[serde(skip)]
    pub api_key: Option<String>,
    pub base_url: String,
    pub temperature: f32,
    pub max_tokens: usize,
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://openrouter.ai/api/v1".to_string(),
            temperature: 0.3,
            max_tokens: 4096,
            timeout_secs: 120,
        }
    }
}

/// Concrete model identifiers for each tier, plus the embedding model
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub fast: String,
    pub balanced: String,
    pub strong: String,
    pub embedding: String,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            fast: "anthropic/claude-3-5-haiku-latest".to_string(),
            balanced: "anthropic/claude-sonnet-4-20250514".to_string(),
            strong: "anthropic/claude-opus-4-20250514".to_string(),
            embedding: "openai/text-embedding-3-small".to_string(),
        }
    }
}

impl ModelConfig {
    /// Resolve a tier to the configured model identifier
    pub fn model_for(&self, tier: ModelTier) -> &str {
        match tier {
            ModelTier::Fast => &self.fast,
            ModelTier::Balanced => &self.balanced,
            ModelTier::Strong => &self.strong,
        }
    }
}

/// Product-tuned retrieval and scoring constants
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Minimum cosine similarity for knowledge search
    pub similarity_threshold: f32,
    /// Minimum quality score (1-5) for knowledge search
    pub min_quality: u8,
    /// Maximum entries pulled into a content brief
    pub max_brief_entries: usize,
    /// Entries rendered per knowledge type in compiled context
    pub entries_per_type: usize,
    /// Readiness weight for entry volume
    pub volume_weight: f64,
    /// Readiness weight for knowledge type diversity
    pub diversity_weight: f64,
    /// Readiness weight for average quality
    pub quality_weight: f64,
    /// Entry count that saturates the volume component
    pub volume_target: usize,
    /// Distinct type count that saturates the diversity component
    pub diversity_target: usize,
    /// Default number of templates returned by the matcher
    pub template_count: usize,
    /// Default minimum similarity for template matches
    pub template_min_similarity: f32,
    /// Entries retrieved for readiness assessment
    pub readiness_sample_size: usize,
    /// Character window applied to transcripts before extraction
    pub transcript_max_chars: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.5,
            min_quality: 2,
            max_brief_entries: 15,
            entries_per_type: 8,
            volume_weight: 0.5,
            diversity_weight: 0.3,
            quality_weight: 0.2,
            volume_target: 15,
            diversity_target: 5,
            template_count: 5,
            template_min_similarity: 0.3,
            readiness_sample_size: 50,
            transcript_max_chars: 25_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Number of items processed concurrently per batch
    pub batch_size: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self { batch_size: 3 }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// SQLite database path; defaults to `<config_dir>/playbook.db`
    pub database_path: Option<PathBuf>,
}

impl LlmConfig {
    pub fn resolved_api_key(&self) -> anyhow::Result<Option<String>> {
        self.enforce_env_only()?;

        Ok(env::var("PLAYBOOK_API_KEY")
            .or_else(|_| env::var("OPENROUTER_API_KEY"))
            .ok())
    }

    pub fn redacted_api_key(&self) -> anyhow::Result<Option<String>> {
        self.resolved_api_key().map(|opt| opt.map(|key| redact(&key)))
    }

    pub fn enforce_env_only(&self) -> anyhow::Result<()> {
        if self.api_key.is_some() {
            return Err(anyhow!(
                "LLM API keys must be provided via environment variables, not stored in configuration"
            ));
        }
        Ok(())
    }
}

fn redact(key: &str) -> String {
    if key.len() <= 4 {
        "***".to_string()
    } else {
        format!("***{}", &key[key.len() - 4..])
    }
}

impl Config {
    /// Get the config directory path
    pub fn config_dir() -> anyhow::Result<PathBuf> {
        let dir = if let Ok(custom_dir) = env::var("PLAYBOOK_CONFIG_DIR") {
            PathBuf::from(custom_dir)
        } else {
            dirs::config_dir()
                .ok_or_else(|| anyhow!("Could not determine config directory"))?
                .join("playbook")
        };
        Ok(dir)
    }

    /// Get the config file path
    pub fn config_path() -> anyhow::Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Path of the optional prompt override file
    pub fn prompts_path() -> anyhow::Result<PathBuf> {
        Ok(Self::config_dir()?.join("prompts.toml"))
    }

    /// Resolved database path (configured value or the default under the config dir)
    pub fn database_path(&self) -> anyhow::Result<PathBuf> {
        match &self.store.database_path {
            Some(path) => Ok(path.clone()),
            None => Ok(Self::config_dir()?.join("playbook.db")),
        }
    }

    /// Load configuration from file, or create default if it doesn't exist
    pub fn load() -> anyhow::Result<Self> {
        let path = Self::config_path()?;

        if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            Self::from_toml(&contents)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))
        } else {
            Ok(Config::default())
        }
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml(contents: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self) -> anyhow::Result<()> {
        self.validate()?;

        let dir = Self::config_dir()?;
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create config directory: {}", dir.display()))?;

        let path = Self::config_path()?;
        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(&path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        self.llm.enforce_env_only()?;

        let r = &self.retrieval;
        for (name, value) in [
            ("retrieval.similarity_threshold", r.similarity_threshold),
            ("retrieval.template_min_similarity", r.template_min_similarity),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(anyhow!("{} must be between 0.0 and 1.0", name));
            }
        }
        for (name, value) in [
            ("retrieval.volume_weight", r.volume_weight),
            ("retrieval.diversity_weight", r.diversity_weight),
            ("retrieval.quality_weight", r.quality_weight),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(anyhow!("{} must be between 0.0 and 1.0", name));
            }
        }
        if !(1..=5).contains(&r.min_quality) {
            return Err(anyhow!("retrieval.min_quality must be between 1 and 5"));
        }
        if r.volume_target == 0 || r.diversity_target == 0 {
            return Err(anyhow!("Readiness targets must be greater than zero"));
        }
        if self.batch.batch_size == 0 {
            return Err(anyhow!("batch.batch_size must be at least 1"));
        }
        Ok(())
    }

    /// Get a configuration value by key
    pub fn get(&self, key: &str) -> anyhow::Result<String> {
        let r = &self.retrieval;
        match key {
            // LLM settings
            "llm.base_url" => Ok(self.llm.base_url.clone()),
            "llm.temperature" => Ok(self.llm.temperature.to_string()),
            "llm.max_tokens" => Ok(self.llm.max_tokens.to_string()),
            "llm.timeout_secs" => Ok(self.llm.timeout_secs.to_string()),

            // Model tiers
            "models.fast" => Ok(self.models.fast.clone()),
            "models.balanced" => Ok(self.models.balanced.clone()),
            "models.strong" => Ok(self.models.strong.clone()),
            "models.embedding" => Ok(self.models.embedding.clone()),

            // Retrieval tuning
            "retrieval.similarity_threshold" => Ok(r.similarity_threshold.to_string()),
            "retrieval.min_quality" => Ok(r.min_quality.to_string()),
            "retrieval.max_brief_entries" => Ok(r.max_brief_entries.to_string()),
            "retrieval.entries_per_type" => Ok(r.entries_per_type.to_string()),
            "retrieval.volume_weight" => Ok(r.volume_weight.to_string()),
            "retrieval.diversity_weight" => Ok(r.diversity_weight.to_string()),
            "retrieval.quality_weight" => Ok(r.quality_weight.to_string()),
            "retrieval.template_count" => Ok(r.template_count.to_string()),
            "retrieval.template_min_similarity" => Ok(r.template_min_similarity.to_string()),
            "retrieval.readiness_sample_size" => Ok(r.readiness_sample_size.to_string()),
            "retrieval.transcript_max_chars" => Ok(r.transcript_max_chars.to_string()),

            "batch.batch_size" => Ok(self.batch.batch_size.to_string()),

            "store.database_path" => Ok(self.database_path()?.display().to_string()),

            // API key (special handling - show redacted)
            "llm.api_key" | "api_key" => match self.llm.redacted_api_key()? {
                Some(redacted) => Ok(redacted),
                None => Ok(
                    "(not set - use PLAYBOOK_API_KEY or OPENROUTER_API_KEY env var)".to_string(),
                ),
            },

            _ => Err(anyhow!(
                "Unknown configuration key: {}. Use `playbook config list` to see available keys.",
                key
            )),
        }
    }

    /// Set a configuration value by key
    pub fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        match key {
            "llm.base_url" => self.llm.base_url = value.trim_end_matches('/').to_string(),
            "llm.temperature" => {
                let temp: f32 = parse_value(key, value)?;
                if !(0.0..=2.0).contains(&temp) {
                    return Err(anyhow!("Temperature must be between 0.0 and 2.0"));
                }
                self.llm.temperature = temp;
            }
            "llm.max_tokens" => self.llm.max_tokens = parse_value(key, value)?,
            "llm.timeout_secs" => self.llm.timeout_secs = parse_value(key, value)?,

            "models.fast" => self.models.fast = value.to_string(),
            "models.balanced" => self.models.balanced = value.to_string(),
            "models.strong" => self.models.strong = value.to_string(),
            "models.embedding" => self.models.embedding = value.to_string(),

            "retrieval.similarity_threshold" => {
                self.retrieval.similarity_threshold = parse_value(key, value)?
            }
            "retrieval.min_quality" => self.retrieval.min_quality = parse_value(key, value)?,
            "retrieval.max_brief_entries" => {
                self.retrieval.max_brief_entries = parse_value(key, value)?
            }
            "retrieval.entries_per_type" => {
                self.retrieval.entries_per_type = parse_value(key, value)?
            }
            "retrieval.volume_weight" => self.retrieval.volume_weight = parse_value(key, value)?,
            "retrieval.diversity_weight" => {
                self.retrieval.diversity_weight = parse_value(key, value)?
            }
            "retrieval.quality_weight" => self.retrieval.quality_weight = parse_value(key, value)?,
            "retrieval.template_count" => self.retrieval.template_count = parse_value(key, value)?,
            "retrieval.template_min_similarity" => {
                self.retrieval.template_min_similarity = parse_value(key, value)?
            }
            "retrieval.readiness_sample_size" => {
                self.retrieval.readiness_sample_size = parse_value(key, value)?
            }
            "retrieval.transcript_max_chars" => {
                self.retrieval.transcript_max_chars = parse_value(key, value)?
            }

            "batch.batch_size" => self.batch.batch_size = parse_value(key, value)?,

            "store.database_path" => self.store.database_path = Some(PathBuf::from(value)),

            // API key cannot be set via config
            "llm.api_key" | "api_key" => {
                return Err(anyhow!(
                    "API keys cannot be stored in configuration for security. \
                     Set the PLAYBOOK_API_KEY or OPENROUTER_API_KEY environment variable instead."
                ));
            }

            _ => {
                return Err(anyhow!(
                    "Unknown configuration key: {}. Use `playbook config list` to see available keys.",
                    key
                ));
            }
        }

        self.validate()
    }

    /// List all configuration keys and their values
    pub fn list(&self) -> anyhow::Result<Vec<(String, String)>> {
        CONFIG_KEYS
            .iter()
            .map(|key| Ok((key.to_string(), self.get(key)?)))
            .collect()
    }

    /// Reset configuration to defaults
    pub fn reset() -> anyhow::Result<()> {
        let path = Self::config_path()?;
        if path.exists() {
            fs::remove_file(&path)
                .with_context(|| format!("Failed to remove config file: {}", path.display()))?;
        }
        Ok(())
    }
}

const CONFIG_KEYS: &[&str] = &[
    "llm.base_url",
    "llm.temperature",
    "llm.max_tokens",
    "llm.timeout_secs",
    "llm.api_key",
    "models.fast",
    "models.balanced",
    "models.strong",
    "models.embedding",
    "retrieval.similarity_threshold",
    "retrieval.min_quality",
    "retrieval.max_brief_entries",
    "retrieval.entries_per_type",
    "retrieval.volume_weight",
    "retrieval.diversity_weight",
    "retrieval.quality_weight",
    "retrieval.template_count",
    "retrieval.template_min_similarity",
    "retrieval.readiness_sample_size",
    "retrieval.transcript_max_chars",
    "batch.batch_size",
    "store.database_path",
];

fn parse_value<T>(key: &str, value: &str) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .parse()
        .with_context(|| format!("Invalid {} value: {}", key, value))
}
