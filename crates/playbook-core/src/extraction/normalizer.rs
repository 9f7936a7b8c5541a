//! Topic normalizer
//!
//! Maps free-text topic suggestions onto an owner's controlled vocabulary.
//! Normalization is advisory: provider failures fall back to a deterministic
//! slug so ingestion never stalls here.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::knowledge::{Topic, TopicCandidate, display_name_from_slug, slugify};
use crate::llm::{CompletionProvider, complete_json};
use crate::prompts::{PromptId, PromptRegistry};
use crate::store::KnowledgeStore;

/// Maximum topics assigned to one entry
pub const MAX_TOPICS_PER_ENTRY: usize = 3;

/// Number of most-used topics shown to the model
pub const VOCABULARY_SIZE: usize = 100;

/// Entry content shown to the model for disambiguation
const CONTENT_PREVIEW_CHARS: usize = 600;

#[derive(Debug, Deserialize)]
struct NormalizationOutput {
    topics: Vec<RawTopic>,
}

#[derive(Debug, Deserialize)]
struct RawTopic {
    slug: String,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

/// Normalizes suggested topics against the owner's vocabulary
#[derive(Clone)]
pub struct TopicNormalizer {
    provider: Arc<dyn CompletionProvider>,
    store: Arc<dyn KnowledgeStore>,
    prompts: Arc<PromptRegistry>,
}

impl TopicNormalizer {
    pub fn new(
        provider: Arc<dyn CompletionProvider>,
        store: Arc<dyn KnowledgeStore>,
        prompts: Arc<PromptRegistry>,
    ) -> Self {
        Self {
            provider,
            store,
            prompts,
        }
    }

    /// Map suggestions to at most three topic candidates
    ///
    /// Never fails: vocabulary or provider errors degrade to slugified
    /// suggestions.
    pub async fn normalize_topics(
        &self,
        owner_id: &str,
        suggestions: &[String],
        entry_content: &str,
    ) -> Vec<TopicCandidate> {
        let suggestions: Vec<&str> = suggestions
            .iter()
            .map(|s| s.trim())
            .filter(|s| !slugify(s).is_empty())
            .collect();
        if suggestions.is_empty() {
            return Vec::new();
        }

        let vocabulary = match self.store.list_topics(owner_id, VOCABULARY_SIZE).await {
            Ok(topics) => topics,
            Err(e) => {
                warn!(owner_id = %owner_id, error = %e, "Could not load topic vocabulary");
                Vec::new()
            }
        };
        let known: HashMap<&str, &Topic> = vocabulary.iter().map(|t| (t.slug.as_str(), t)).collect();

        // Every suggestion already names an existing topic
        let direct: Vec<String> = suggestions.iter().map(|s| slugify(s)).collect();
        if direct.iter().all(|slug| known.contains_key(slug.as_str())) {
            debug!(owner_id = %owner_id, "All suggested topics already in vocabulary");
            return dedupe_candidates(direct.iter().map(|slug| {
                TopicCandidate::existing(known[slug.as_str()])
            }));
        }

        match self.ask_provider(&suggestions, entry_content, &vocabulary, &known).await {
            Ok(candidates) if !candidates.is_empty() => candidates,
            Ok(_) => {
                warn!(owner_id = %owner_id, "Topic normalization returned no usable topics");
                fallback_candidates(&suggestions, &known)
            }
            Err(e) => {
                warn!(owner_id = %owner_id, error = %e, "Topic normalization failed, using slug fallback");
                fallback_candidates(&suggestions, &known)
            }
        }
    }

    /// Persist newly minted topics with a zero entry count
    ///
    /// Returns the number of topics created.
    pub async fn upsert_topics(&self, owner_id: &str, topics: &[TopicCandidate]) -> Result<usize> {
        let mut minted = 0;
        for candidate in topics.iter().filter(|c| c.is_new) {
            self.store
                .upsert_topic(&Topic::from_candidate(owner_id, candidate))
                .await?;
            minted += 1;
        }
        if minted > 0 {
            info!(owner_id = %owner_id, minted, "New topics added to vocabulary");
        }
        Ok(minted)
    }

    async fn ask_provider(
        &self,
        suggestions: &[&str],
        entry_content: &str,
        vocabulary: &[Topic],
        known: &HashMap<&str, &Topic>,
    ) -> Result<Vec<TopicCandidate>> {
        let vocabulary_text = if vocabulary.is_empty() {
            "(no topics yet)".to_string()
        } else {
            vocabulary
                .iter()
                .map(|t| format!("- {}: {}", t.slug, t.display_name))
                .collect::<Vec<_>>()
                .join("\n")
        };
        let suggestions_text = suggestions
            .iter()
            .map(|s| format!("- {}", s))
            .collect::<Vec<_>>()
            .join("\n");
        let content: String = entry_content.chars().take(CONTENT_PREVIEW_CHARS).collect();

        let request = self.prompts.get_prompt(PromptId::NormalizeTopics)?.request(&[
            ("vocabulary", vocabulary_text.as_str()),
            ("suggestions", suggestions_text.as_str()),
            ("content", content.as_str()),
        ]);

        let output: NormalizationOutput = complete_json(self.provider.as_ref(), &request).await?;

        Ok(dedupe_candidates(output.topics.into_iter().filter_map(|raw| {
            let slug = slugify(&raw.slug);
            if slug.is_empty() {
                return None;
            }
            // The model's is_new flag is not trusted; membership decides
            Some(match known.get(slug.as_str()) {
                Some(existing) => TopicCandidate::existing(existing),
                None => TopicCandidate {
                    display_name: raw
                        .display_name
                        .map(|n| n.trim().to_string())
                        .filter(|n| !n.is_empty())
                        .unwrap_or_else(|| display_name_from_slug(&slug)),
                    description: raw.description.unwrap_or_default().trim().to_string(),
                    slug,
                    is_new: true,
                },
            })
        })))
    }
}

/// Deterministic normalization used when the provider is unavailable
pub fn fallback_candidates(
    suggestions: &[&str],
    known: &HashMap<&str, &Topic>,
) -> Vec<TopicCandidate> {
    dedupe_candidates(suggestions.iter().filter_map(|s| {
        let slug = slugify(s);
        if slug.is_empty() {
            return None;
        }
        Some(match known.get(slug.as_str()) {
            Some(existing) => TopicCandidate::existing(existing),
            None => TopicCandidate::minted(slug),
        })
    }))
}

fn dedupe_candidates(candidates: impl IntoIterator<Item = TopicCandidate>) -> Vec<TopicCandidate> {
    let mut out: Vec<TopicCandidate> = Vec::with_capacity(MAX_TOPICS_PER_ENTRY);
    for candidate in candidates {
        if out.len() == MAX_TOPICS_PER_ENTRY {
            break;
        }
        if !out.iter().any(|c| c.slug == candidate.slug) {
            out.push(candidate);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_maps_known_and_mints_new() {
        let existing = Topic::new("owner", "cold-email");
        let known: HashMap<&str, &Topic> = [("cold-email", &existing)].into_iter().collect();

        let candidates = fallback_candidates(&["Cold Email", "Pricing Pages!", "cold email"], &known);
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].slug, "cold-email");
        assert!(!candidates[0].is_new);
        assert_eq!(candidates[1].slug, "pricing-pages");
        assert!(candidates[1].is_new);
    }

    #[test]
    fn test_dedupe_caps_at_three() {
        let candidates = dedupe_candidates(
            ["a", "b", "a", "c", "d"]
                .into_iter()
                .map(TopicCandidate::minted),
        );
        let slugs: Vec<&str> = candidates.iter().map(|c| c.slug.as_str()).collect();
        assert_eq!(slugs, vec!["a", "b", "c"]);
    }
}
