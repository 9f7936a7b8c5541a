//! Briefing retriever
//!
//! Semantic search, quality ordering and compilation of a [`ContentBrief`]
//! for downstream content generators.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::RetrievalConfig;
use crate::error::Result;
use crate::knowledge::{Category, KnowledgeEntry, KnowledgeType, MAX_QUALITY};
use crate::llm::{CompletionProvider, EmbeddingProvider, complete_json, embed_checked};
use crate::prompts::{PromptId, PromptRegistry};
use crate::store::{EntryQuery, KnowledgeStore};

/// Entry count below which angle suggestions are skipped
pub const MIN_ENTRIES_FOR_ANGLES: usize = 3;

/// Number of knowledge types reported as the topic's strongest
const TOP_TYPES: usize = 3;

/// Weights of the readiness blend
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReadinessWeights {
    pub volume_weight: f64,
    pub diversity_weight: f64,
    pub quality_weight: f64,
    /// Entry count that saturates the volume term
    pub volume_target: usize,
    /// Distinct type count that saturates the diversity term
    pub diversity_target: usize,
}

impl Default for ReadinessWeights {
    fn default() -> Self {
        Self::from(&RetrievalConfig::default())
    }
}

impl From<&RetrievalConfig> for ReadinessWeights {
    fn from(config: &RetrievalConfig) -> Self {
        Self {
            volume_weight: config.volume_weight,
            diversity_weight: config.diversity_weight,
            quality_weight: config.quality_weight,
            volume_target: config.volume_target,
            diversity_target: config.diversity_target,
        }
    }
}

/// Weighted blend of volume, diversity and quality, clamped to `[0, 1]`
pub fn topic_readiness(
    entry_count: usize,
    distinct_types: usize,
    avg_quality: f64,
    weights: &ReadinessWeights,
) -> f64 {
    let volume = entry_count as f64 / weights.volume_target.max(1) as f64;
    let diversity = distinct_types as f64 / weights.diversity_target.max(1) as f64;
    let quality = avg_quality.max(0.0) / MAX_QUALITY as f64;

    let score = volume * weights.volume_weight
        + diversity * weights.diversity_weight
        + quality * weights.quality_weight;
    score.clamp(0.0, 1.0)
}

/// Options for [`BriefingRetriever::build_content_brief`]
#[derive(Debug, Clone, Default)]
pub struct BriefOptions {
    /// Overrides the configured entry cap
    pub max_entries: Option<usize>,
    pub team_id: Option<String>,
    pub profile_id: Option<String>,
    /// Author voice notes passed along to angle suggestion
    pub voice_style: Option<String>,
}

/// Knowledge compiled for one topic
#[derive(Debug, Clone, Serialize)]
pub struct ContentBrief {
    pub topic: String,
    /// All matched entries, highest quality first
    pub entries: Vec<KnowledgeEntry>,
    pub insights: Vec<KnowledgeEntry>,
    pub questions: Vec<KnowledgeEntry>,
    pub product_intel: Vec<KnowledgeEntry>,
    pub by_type: BTreeMap<KnowledgeType, Vec<KnowledgeEntry>>,
    pub compiled_context: String,
    pub suggested_angles: Vec<String>,
    pub topic_readiness: f64,
    pub top_knowledge_types: Vec<KnowledgeType>,
}

impl ContentBrief {
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    pub fn avg_quality(&self) -> f64 {
        average_quality(&self.entries)
    }
}

#[derive(Debug, Deserialize)]
struct AnglesOutput {
    angles: Vec<String>,
}

/// Builds content briefs from the knowledge store
#[derive(Clone)]
pub struct BriefingRetriever {
    store: Arc<dyn KnowledgeStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    provider: Arc<dyn CompletionProvider>,
    prompts: Arc<PromptRegistry>,
    config: RetrievalConfig,
}

impl BriefingRetriever {
    pub fn new(
        store: Arc<dyn KnowledgeStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        provider: Arc<dyn CompletionProvider>,
        prompts: Arc<PromptRegistry>,
    ) -> Self {
        Self {
            store,
            embedder,
            provider,
            prompts,
            config: RetrievalConfig::default(),
        }
    }

    pub fn with_config(mut self, config: RetrievalConfig) -> Self {
        self.config = config;
        self
    }

    /// Build a brief for `topic`
    ///
    /// Embedding and search failures are returned; angle suggestion failures
    /// only leave `suggested_angles` empty.
    pub async fn build_content_brief(
        &self,
        owner_id: &str,
        topic: &str,
        options: &BriefOptions,
    ) -> Result<ContentBrief> {
        let embedding = embed_checked(self.embedder.as_ref(), topic).await?;
        let query = EntryQuery::new(owner_id, embedding)
            .with_limit(options.max_entries.unwrap_or(self.config.max_brief_entries))
            .with_threshold(self.config.similarity_threshold)
            .with_min_quality(self.config.min_quality)
            .with_team(options.team_id.clone())
            .with_profile(options.profile_id.clone());

        let mut entries = self.store.search(&query).await?;
        entries.sort_by(|a, b| b.quality_score.cmp(&a.quality_score));

        let mut insights = Vec::new();
        let mut questions = Vec::new();
        let mut product_intel = Vec::new();
        let mut by_type: BTreeMap<KnowledgeType, Vec<KnowledgeEntry>> = BTreeMap::new();
        for entry in &entries {
            match entry.category {
                Category::Insight => insights.push(entry.clone()),
                Category::Question => questions.push(entry.clone()),
                Category::ProductIntel => product_intel.push(entry.clone()),
            }
            by_type
                .entry(entry.knowledge_type)
                .or_default()
                .push(entry.clone());
        }

        let compiled_context = compile_context(&by_type, self.config.entries_per_type);
        let readiness = topic_readiness(
            entries.len(),
            by_type.len(),
            average_quality(&entries),
            &ReadinessWeights::from(&self.config),
        );

        let suggested_angles = if entries.len() >= MIN_ENTRIES_FOR_ANGLES {
            self.suggest_angles(topic, &compiled_context, options.voice_style.as_deref())
                .await
        } else {
            debug!(topic = %topic, entry_count = entries.len(), "Too few entries for angle suggestions");
            Vec::new()
        };

        info!(
            owner_id = %owner_id,
            topic = %topic,
            entry_count = entries.len(),
            readiness,
            "Content brief built"
        );

        Ok(ContentBrief {
            topic: topic.to_string(),
            top_knowledge_types: top_knowledge_types(&entries, TOP_TYPES),
            entries,
            insights,
            questions,
            product_intel,
            by_type,
            compiled_context,
            suggested_angles,
            topic_readiness: readiness,
        })
    }

    async fn suggest_angles(&self, topic: &str, context: &str, voice_style: Option<&str>) -> Vec<String> {
        let voice_section = match voice_style.map(str::trim).filter(|s| !s.is_empty()) {
            Some(style) => format!("\n## Author voice\nWrite the angles so they fit this voice:\n{}\n", style),
            None => String::new(),
        };

        let request = match self.prompts.get_prompt(PromptId::SuggestAngles) {
            Ok(prompt) => prompt.request(&[
                ("topic", topic),
                ("context", context),
                ("voice_section", voice_section.as_str()),
            ]),
            Err(e) => {
                warn!(error = %e, "Angle prompt unavailable");
                return Vec::new();
            }
        };

        match complete_json::<AnglesOutput, _>(self.provider.as_ref(), &request).await {
            Ok(output) => output
                .angles
                .into_iter()
                .map(|a| a.trim().to_string())
                .filter(|a| !a.is_empty())
                .collect(),
            Err(e) => {
                warn!(topic = %topic, error = %e, "Angle suggestion failed");
                Vec::new()
            }
        }
    }
}

/// Render grouped entries as labeled sections, at most `per_type` each
pub fn compile_context(
    by_type: &BTreeMap<KnowledgeType, Vec<KnowledgeEntry>>,
    per_type: usize,
) -> String {
    let mut sections = Vec::with_capacity(by_type.len());
    for (knowledge_type, entries) in by_type {
        let mut section = format!("## {}\n", knowledge_type.label());
        for entry in entries.iter().take(per_type) {
            section.push_str("- ");
            if entry.is_high_quality() {
                section.push_str("[HIGH QUALITY] ");
            }
            section.push_str(entry.content.trim());
            if !entry.context.trim().is_empty() {
                section.push_str(&format!(" (Context: {})", entry.context.trim()));
            }
            section.push('\n');
        }
        sections.push(section);
    }
    sections.join("\n")
}

pub fn average_quality(entries: &[KnowledgeEntry]) -> f64 {
    if entries.is_empty() {
        return 0.0;
    }
    entries.iter().map(|e| e.quality_score as f64).sum::<f64>() / entries.len() as f64
}

/// Most frequent knowledge types, ties broken by type order
pub fn top_knowledge_types(entries: &[KnowledgeEntry], limit: usize) -> Vec<KnowledgeType> {
    let mut counts: HashMap<KnowledgeType, usize> = HashMap::new();
    for entry in entries {
        *counts.entry(entry.knowledge_type).or_default() += 1;
    }
    let mut ranked: Vec<(KnowledgeType, usize)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked.into_iter().take(limit).map(|(t, _)| t).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(knowledge_type: KnowledgeType, quality: i64, content: &str) -> KnowledgeEntry {
        KnowledgeEntry::new("owner", knowledge_type, content).with_quality(quality)
    }

    #[test]
    fn test_readiness_reference_value() {
        let score = topic_readiness(10, 4, 4.0, &ReadinessWeights::default());
        assert!((score - 0.7333).abs() < 1e-3, "got {}", score);
    }

    #[test]
    fn test_readiness_is_bounded() {
        let weights = ReadinessWeights::default();
        assert_eq!(topic_readiness(0, 0, 0.0, &weights), 0.0);
        assert_eq!(topic_readiness(100, 8, 5.0, &weights), 1.0);
        for n in 0..40 {
            for t in 0..9 {
                let score = topic_readiness(n, t, 3.0, &weights);
                assert!((0.0..=1.0).contains(&score));
            }
        }
    }

    #[test]
    fn test_readiness_is_monotonic() {
        let weights = ReadinessWeights::default();
        let mut previous = 0.0;
        for n in 0..30 {
            let score = topic_readiness(n, 2, 3.0, &weights);
            assert!(score >= previous);
            previous = score;
        }

        let mut previous = 0.0;
        for t in 0..9 {
            let score = topic_readiness(5, t, 3.0, &weights);
            assert!(score >= previous);
            previous = score;
        }

        let mut previous = 0.0;
        for q in 1..=5 {
            let score = topic_readiness(5, 2, q as f64, &weights);
            assert!(score >= previous);
            previous = score;
        }
    }

    #[test]
    fn test_compile_context_caps_and_tags() {
        let mut by_type = BTreeMap::new();
        by_type.insert(
            KnowledgeType::HowTo,
            (0..10)
                .map(|i| entry(KnowledgeType::HowTo, if i < 2 { 5 } else { 3 }, &format!("step {}", i)))
                .collect::<Vec<_>>(),
        );
        by_type.insert(
            KnowledgeType::Question,
            vec![entry(KnowledgeType::Question, 2, "How long should a cold email be?")
                .with_context("Asked twice")],
        );

        let context = compile_context(&by_type, 8);
        assert!(context.starts_with("## How-To\n- [HIGH QUALITY] step 0\n"));
        assert!(context.contains("- step 7\n"));
        assert!(!context.contains("step 8"));
        assert_eq!(context.matches("[HIGH QUALITY]").count(), 2);
        assert!(context.contains("## Questions\n- How long should a cold email be? (Context: Asked twice)"));
    }

    #[test]
    fn test_top_knowledge_types() {
        let entries = vec![
            entry(KnowledgeType::Story, 3, "a"),
            entry(KnowledgeType::Story, 3, "b"),
            entry(KnowledgeType::HowTo, 3, "c"),
            entry(KnowledgeType::Mistake, 3, "d"),
            entry(KnowledgeType::Insight, 3, "e"),
            entry(KnowledgeType::Insight, 3, "f"),
        ];
        assert_eq!(
            top_knowledge_types(&entries, 3),
            vec![KnowledgeType::Insight, KnowledgeType::Story, KnowledgeType::HowTo]
        );
    }

    #[test]
    fn test_average_quality() {
        assert_eq!(average_quality(&[]), 0.0);
        let entries = vec![entry(KnowledgeType::Story, 3, "a"), entry(KnowledgeType::Story, 5, "b")];
        assert_eq!(average_quality(&entries), 4.0);
    }
}
