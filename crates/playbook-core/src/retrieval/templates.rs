//! Template matcher
//!
//! Advisory: every failure path yields an empty match list.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::RetrievalConfig;
use crate::knowledge::{Template, TemplateMatch};
use crate::llm::{EmbeddingProvider, embed_checked};
use crate::store::KnowledgeStore;
use crate::usage::UsageRecorder;

/// Candidates considered when picking a single best template
const BEST_TEMPLATE_CANDIDATES: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TemplateOptions {
    pub count: usize,
    pub min_similarity: f32,
}

impl Default for TemplateOptions {
    fn default() -> Self {
        Self::from(&RetrievalConfig::default())
    }
}

impl From<&RetrievalConfig> for TemplateOptions {
    fn from(config: &RetrievalConfig) -> Self {
        Self {
            count: config.template_count,
            min_similarity: config.template_min_similarity,
        }
    }
}

#[derive(Clone)]
pub struct TemplateMatcher {
    store: Arc<dyn KnowledgeStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    usage: UsageRecorder,
}

impl TemplateMatcher {
    pub fn new(store: Arc<dyn KnowledgeStore>, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            usage: UsageRecorder::new(Arc::clone(&store)),
            store,
            embedder,
        }
    }

    /// Templates visible to `owner_id` most similar to `topic`
    pub async fn match_templates(
        &self,
        topic: &str,
        owner_id: &str,
        options: &TemplateOptions,
    ) -> Vec<TemplateMatch> {
        if !self.embedder.is_configured() {
            debug!(topic = %topic, "Embeddings not configured, skipping template match");
            return Vec::new();
        }

        let embedding = match embed_checked(self.embedder.as_ref(), topic).await {
            Ok(embedding) => embedding,
            Err(e) => {
                warn!(topic = %topic, error = %e, "Template match embedding failed");
                return Vec::new();
            }
        };

        let mut matches = match self
            .store
            .match_templates(owner_id, &embedding, options.count, options.min_similarity)
            .await
        {
            Ok(matches) => matches,
            Err(e) => {
                warn!(topic = %topic, error = %e, "Template search failed");
                return Vec::new();
            }
        };

        // Stores are trusted for ranking but not for the contract
        matches.retain(|m| m.similarity >= options.min_similarity && m.template.visible_to(owner_id));
        matches.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
        matches.truncate(options.count);

        debug!(topic = %topic, matched = matches.len(), "Templates matched");
        matches
    }

    /// The single most similar template, recording its use
    pub async fn find_best_template(&self, topic: &str, owner_id: &str) -> Option<TemplateMatch> {
        let options = TemplateOptions {
            count: BEST_TEMPLATE_CANDIDATES,
            ..TemplateOptions::default()
        };
        let best = self
            .match_templates(topic, owner_id, &options)
            .await
            .into_iter()
            .max_by(|a, b| a.similarity.total_cmp(&b.similarity))?;

        self.usage.record_template_use(&best.template.id);
        Some(best)
    }
}

/// Prompt guidance describing how to use a template
pub fn build_template_guidance(template: &Template) -> String {
    let purpose = template
        .use_cases
        .first()
        .map(String::as_str)
        .unwrap_or(template.category.as_str());

    let mut guidance = format!(
        "## Suggested structure: {}\nCategory: {}\nPurpose: {}\n\n### Structure\n{}\n",
        template.name,
        template.category,
        purpose,
        template.structure.trim()
    );

    if let Some(example) = template.example_posts.first() {
        guidance.push_str("\n### Example\n");
        guidance.push_str(example.trim());
        guidance.push('\n');
    }

    guidance.push_str(
        "\nTreat placeholders as structural inspiration. Do not copy the wording; \
         fill the shape with the knowledge provided.\n",
    );
    guidance
}
