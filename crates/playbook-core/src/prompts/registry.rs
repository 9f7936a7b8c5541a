//! Prompt registry
//!
//! Resolves a [`PromptId`] to a concrete model, token budget and template.
//! Model choice is expressed as a [`ModelTier`] on each prompt and mapped to
//! an identifier through `config.models`, so call sites never name a model.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::{Config, ModelConfig};
use crate::error::{Error, Result};
use crate::llm::CompletionRequest;

use super::builtin::builtin_prompts;

/// Relative model strength requested by a prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelTier {
    /// Cheap model for classification and normalization
    Fast,
    Balanced,
    /// Strongest model for extraction and document generation
    Strong,
}

impl ModelTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fast => "fast",
            Self::Balanced => "balanced",
            Self::Strong => "strong",
        }
    }
}

impl fmt::Display for ModelTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Every prompt the pipeline issues
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptId {
    ExtractKnowledge,
    NormalizeTopics,
    SuggestAngles,
    DetectCollisions,
    AssessReadiness,
    ClassifySop,
    GenerateSopEdit,
    FormatReference,
    FormatFaq,
    ClusterOrphans,
    GenerateSop,
}

impl PromptId {
    pub const ALL: [PromptId; 11] = [
        Self::ExtractKnowledge,
        Self::NormalizeTopics,
        Self::SuggestAngles,
        Self::DetectCollisions,
        Self::AssessReadiness,
        Self::ClassifySop,
        Self::GenerateSopEdit,
        Self::FormatReference,
        Self::FormatFaq,
        Self::ClusterOrphans,
        Self::GenerateSop,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ExtractKnowledge => "extract_knowledge",
            Self::NormalizeTopics => "normalize_topics",
            Self::SuggestAngles => "suggest_angles",
            Self::DetectCollisions => "detect_collisions",
            Self::AssessReadiness => "assess_readiness",
            Self::ClassifySop => "classify_sop",
            Self::GenerateSopEdit => "generate_sop_edit",
            Self::FormatReference => "format_reference",
            Self::FormatFaq => "format_faq",
            Self::ClusterOrphans => "cluster_orphans",
            Self::GenerateSop => "generate_sop",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|id| id.as_str() == s)
    }
}

impl fmt::Display for PromptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stored definition of one prompt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptSpec {
    pub tier: ModelTier,
    pub max_tokens: usize,
    #[serde(default)]
    pub system: Option<String>,
    pub template: String,
}

/// Partial prompt definition read from `prompts.toml`
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct PromptOverride {
    tier: Option<ModelTier>,
    max_tokens: Option<usize>,
    system: Option<String>,
    template: Option<String>,
}

/// A prompt resolved against the configured models
#[derive(Debug, Clone)]
pub struct ResolvedPrompt {
    pub id: PromptId,
    pub model: String,
    pub max_tokens: usize,
    pub system: Option<String>,
    pub template: String,
}

impl ResolvedPrompt {
    /// Interpolate variables into the template and build a provider request
    pub fn request(&self, vars: &[(&str, &str)]) -> CompletionRequest {
        CompletionRequest {
            prompt_id: self.id,
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            system: self.system.clone(),
            prompt: interpolate(&self.template, vars),
        }
    }
}

/// Registry of prompt definitions
#[derive(Debug, Clone)]
pub struct PromptRegistry {
    models: ModelConfig,
    prompts: HashMap<PromptId, PromptSpec>,
}

impl Default for PromptRegistry {
    fn default() -> Self {
        Self::new(ModelConfig::default())
    }
}

impl PromptRegistry {
    /// Registry holding the built-in prompts
    pub fn new(models: ModelConfig) -> Self {
        Self {
            models,
            prompts: builtin_prompts().into_iter().collect(),
        }
    }

    /// Built-in prompts plus any overrides found in `prompts.toml`
    pub fn from_config(config: &Config) -> Result<Self> {
        let mut registry = Self::new(config.models.clone());
        let path = Config::prompts_path().map_err(|e| Error::ConfigError(e.to_string()))?;
        if path.exists() {
            registry.load_overrides(&path)?;
        }
        Ok(registry)
    }

    /// Apply overrides from a TOML file, returning the number of prompts changed
    pub fn load_overrides(&mut self, path: &Path) -> Result<usize> {
        let contents = std::fs::read_to_string(path)?;
        let applied = self.apply_overrides(&contents)?;
        info!(path = %path.display(), applied, "Loaded prompt overrides");
        Ok(applied)
    }

    /// Apply overrides from TOML text keyed by prompt id
    pub fn apply_overrides(&mut self, contents: &str) -> Result<usize> {
        let overrides: HashMap<String, PromptOverride> = toml::from_str(contents)
            .map_err(|e| Error::ConfigError(format!("Invalid prompts file: {}", e)))?;

        let mut applied = 0;
        for (key, o) in overrides {
            let id = PromptId::parse(&key).ok_or_else(|| Error::PromptNotFound(key.clone()))?;
            let spec = self
                .prompts
                .get_mut(&id)
                .ok_or_else(|| Error::PromptNotFound(key.clone()))?;

            if let Some(tier) = o.tier {
                spec.tier = tier;
            }
            if let Some(max_tokens) = o.max_tokens {
                if max_tokens == 0 {
                    return Err(Error::ConfigError(format!(
                        "Prompt '{}' must have a positive max_tokens",
                        key
                    )));
                }
                spec.max_tokens = max_tokens;
            }
            if let Some(system) = o.system {
                spec.system = Some(system).filter(|s| !s.trim().is_empty());
            }
            if let Some(template) = o.template {
                spec.template = template;
            }
            debug!(prompt_id = %id, "Prompt overridden");
            applied += 1;
        }
        Ok(applied)
    }

    /// Raw definition of a prompt
    pub fn spec(&self, id: PromptId) -> Option<&PromptSpec> {
        self.prompts.get(&id)
    }

    /// Resolve a prompt to its model, budget and template
    pub fn get_prompt(&self, id: PromptId) -> Result<ResolvedPrompt> {
        let spec = self
            .prompts
            .get(&id)
            .ok_or_else(|| Error::PromptNotFound(id.to_string()))?;

        Ok(ResolvedPrompt {
            id,
            model: self.models.model_for(spec.tier).to_string(),
            max_tokens: spec.max_tokens,
            system: spec.system.clone(),
            template: spec.template.clone(),
        })
    }
}

/// Substitute `{{name}}` placeholders in a single pass
///
/// Substituted values are never scanned again, so a value containing `{{x}}`
/// is emitted literally. Placeholders with no matching variable are kept.
pub fn interpolate(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after_open = &rest[start + 2..];
        match after_open.find("}}") {
            Some(end) => {
                let name = after_open[..end].trim();
                match vars.iter().find(|(key, _)| *key == name) {
                    Some((_, value)) => out.push_str(value),
                    None => out.push_str(&rest[start..start + 2 + end + 2]),
                }
                rest = &after_open[end + 2..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_prompt_has_a_builtin() {
        let registry = PromptRegistry::default();
        for id in PromptId::ALL {
            let prompt = registry.get_prompt(id).unwrap();
            assert!(!prompt.template.is_empty(), "{} has no template", id);
            assert!(prompt.max_tokens > 0);
        }
    }

    #[test]
    fn test_tier_resolves_through_config() {
        let models = ModelConfig {
            fast: "test/fast".into(),
            balanced: "test/balanced".into(),
            strong: "test/strong".into(),
            embedding: "test/embed".into(),
        };
        let registry = PromptRegistry::new(models);
        let classify = registry.get_prompt(PromptId::ClassifySop).unwrap();
        assert_eq!(classify.model, "test/fast");
        let extract = registry.get_prompt(PromptId::ExtractKnowledge).unwrap();
        assert_eq!(extract.model, "test/strong");
    }

    #[test]
    fn test_prompt_id_round_trip() {
        for id in PromptId::ALL {
            assert_eq!(PromptId::parse(id.as_str()), Some(id));
            let json = serde_json::to_string(&id).unwrap();
            assert_eq!(json, format!("\"{}\"", id));
        }
        assert_eq!(PromptId::parse("missing"), None);
    }

    #[test]
    fn test_interpolate_basic() {
        let out = interpolate("Topic: {{topic}} / {{ goal }}", &[("topic", "cold email"), ("goal", "sop")]);
        assert_eq!(out, "Topic: cold email / sop");
    }

    #[test]
    fn test_interpolate_is_single_pass() {
        let out = interpolate("A {{a}} B", &[("a", "{{b}}"), ("b", "nope")]);
        assert_eq!(out, "A {{b}} B");
    }

    #[test]
    fn test_interpolate_keeps_unknown_and_unterminated() {
        assert_eq!(interpolate("x {{unknown}} y", &[]), "x {{unknown}} y");
        assert_eq!(interpolate("x {{open", &[("open", "v")]), "x {{open");
        assert_eq!(interpolate("{{a}}{{a}}", &[("a", "1")]), "11");
    }

    #[test]
    fn test_overrides() {
        let mut registry = PromptRegistry::default();
        let applied = registry
            .apply_overrides(
                r#"
                [suggest_angles]
                tier = "strong"
                max_tokens = 1234
                template = "Angles for {{topic}}"
                "#,
            )
            .unwrap();
        assert_eq!(applied, 1);

        let prompt = registry.get_prompt(PromptId::SuggestAngles).unwrap();
        assert_eq!(prompt.max_tokens, 1234);
        assert_eq!(prompt.model, ModelConfig::default().strong);
        let request = prompt.request(&[("topic", "pricing")]);
        assert_eq!(request.prompt, "Angles for pricing");
        assert_eq!(request.prompt_id, PromptId::SuggestAngles);
    }

    #[test]
    fn test_override_unknown_prompt_is_rejected() {
        let mut registry = PromptRegistry::default();
        let err = registry
            .apply_overrides("[not_a_prompt]\nmax_tokens = 10\n")
            .unwrap_err();
        assert!(matches!(err, Error::PromptNotFound(_)));
        assert!(registry.apply_overrides("[format_faq]\nmax_tokens = 0\n").is_err());
    }
}
