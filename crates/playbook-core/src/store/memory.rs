//! In-memory knowledge store

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::{Error, Result};
use crate::knowledge::{KnowledgeEntry, Template, TemplateMatch, Topic};

use super::vector::{cosine_similarity, rank_by_similarity};
use super::{EntryQuery, KnowledgeStore, require_entry_embedding, require_template_embedding};

/// Store backed by process memory
///
/// Used by tests and by callers that index a small corpus on the fly.
#[derive(Debug, Default)]
pub struct InMemoryKnowledgeStore {
    entries: RwLock<HashMap<String, KnowledgeEntry>>,
    /// Keyed by (owner_id, slug)
    topics: RwLock<HashMap<(String, String), Topic>>,
    templates: RwLock<HashMap<String, Template>>,
}

impl InMemoryKnowledgeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn entry_count(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn get_topic(&self, owner_id: &str, slug: &str) -> Option<Topic> {
        self.topics
            .read()
            .await
            .get(&(owner_id.to_string(), slug.to_string()))
            .cloned()
    }

    pub async fn get_template(&self, id: &str) -> Option<Template> {
        self.templates.read().await.get(id).cloned()
    }
}

#[async_trait]
impl KnowledgeStore for InMemoryKnowledgeStore {
    async fn save_entry(&self, entry: &KnowledgeEntry) -> Result<()> {
        require_entry_embedding(entry)?;
        self.entries
            .write()
            .await
            .insert(entry.id.clone(), entry.clone());
        Ok(())
    }

    async fn get_entry(&self, id: &str) -> Result<Option<KnowledgeEntry>> {
        Ok(self.entries.read().await.get(id).cloned())
    }

    async fn search(&self, query: &EntryQuery) -> Result<Vec<KnowledgeEntry>> {
        let entries = self.entries.read().await;
        let scored = entries
            .values()
            .filter(|entry| query.admits(entry))
            .filter_map(|entry| {
                let embedding = entry.embedding.as_deref()?;
                Some((entry.clone(), cosine_similarity(&query.embedding, embedding)))
            })
            .collect();

        Ok(rank_by_similarity(scored, query.similarity_threshold, query.limit)
            .into_iter()
            .map(|(entry, _)| entry)
            .collect())
    }

    async fn list_topics(&self, owner_id: &str, limit: usize) -> Result<Vec<Topic>> {
        let topics = self.topics.read().await;
        let mut owned: Vec<Topic> = topics
            .values()
            .filter(|t| t.owner_id == owner_id)
            .cloned()
            .collect();
        owned.sort_by(|a, b| {
            b.entry_count
                .cmp(&a.entry_count)
                .then_with(|| a.slug.cmp(&b.slug))
        });
        owned.truncate(limit);
        Ok(owned)
    }

    async fn upsert_topic(&self, topic: &Topic) -> Result<()> {
        let mut topics = self.topics.write().await;
        let key = (topic.owner_id.clone(), topic.slug.clone());
        match topics.get_mut(&key) {
            Some(existing) => {
                existing.display_name = topic.display_name.clone();
                if !topic.description.is_empty() {
                    existing.description = topic.description.clone();
                }
            }
            None => {
                topics.insert(key, topic.clone());
            }
        }
        Ok(())
    }

    async fn increment_topic_count(&self, owner_id: &str, slug: &str) -> Result<()> {
        let mut topics = self.topics.write().await;
        topics
            .entry((owner_id.to_string(), slug.to_string()))
            .or_insert_with(|| Topic::new(owner_id, slug))
            .entry_count += 1;
        Ok(())
    }

    async fn save_template(&self, template: &Template) -> Result<()> {
        require_template_embedding(template)?;
        self.templates
            .write()
            .await
            .insert(template.id.clone(), template.clone());
        Ok(())
    }

    async fn match_templates(
        &self,
        owner_id: &str,
        embedding: &[f32],
        count: usize,
        min_similarity: f32,
    ) -> Result<Vec<TemplateMatch>> {
        let templates = self.templates.read().await;
        let scored = templates
            .values()
            .filter(|t| t.visible_to(owner_id))
            .filter_map(|t| {
                let stored = t.embedding.as_deref()?;
                Some((t.clone(), cosine_similarity(embedding, stored)))
            })
            .collect();

        Ok(rank_by_similarity(scored, min_similarity, count)
            .into_iter()
            .map(|(template, similarity)| TemplateMatch {
                template,
                similarity,
            })
            .collect())
    }

    async fn increment_template_usage(&self, id: &str) -> Result<()> {
        let mut templates = self.templates.write().await;
        let template = templates
            .get_mut(id)
            .ok_or_else(|| Error::TemplateNotFound(id.to_string()))?;
        template.usage_count += 1;
        tracing::debug!(template_id = %id, usage_count = template.usage_count, "Template usage recorded");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::KnowledgeType;

    fn entry(owner: &str, quality: i64, embedding: Vec<f32>) -> KnowledgeEntry {
        KnowledgeEntry::new(owner, KnowledgeType::Insight, "content")
            .with_quality(quality)
            .with_embedding(embedding)
    }

    #[tokio::test]
    async fn test_save_requires_embedding() {
        let store = InMemoryKnowledgeStore::new();
        let bare = KnowledgeEntry::new("owner", KnowledgeType::Insight, "x");
        assert!(store.save_entry(&bare).await.is_err());
        assert_eq!(store.entry_count().await, 0);
    }

    #[tokio::test]
    async fn test_search_filters_and_orders() {
        let store = InMemoryKnowledgeStore::new();
        let close = entry("owner", 3, vec![1.0, 0.1]);
        let closer = entry("owner", 2, vec![1.0, 0.0]);
        let far = entry("owner", 5, vec![0.0, 1.0]);
        let low_quality = entry("owner", 1, vec![1.0, 0.0]);
        let foreign = entry("other", 5, vec![1.0, 0.0]);
        for e in [&close, &closer, &far, &low_quality, &foreign] {
            store.save_entry(e).await.unwrap();
        }

        let results = store
            .search(&EntryQuery::new("owner", vec![1.0, 0.0]))
            .await
            .unwrap();
        let ids: Vec<&str> = results.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec![closer.id.as_str(), close.id.as_str()]);
    }

    #[tokio::test]
    async fn test_search_respects_limit() {
        let store = InMemoryKnowledgeStore::new();
        for _ in 0..5 {
            store.save_entry(&entry("owner", 3, vec![1.0, 0.0])).await.unwrap();
        }
        let results = store
            .search(&EntryQuery::new("owner", vec![1.0, 0.0]).with_limit(3))
            .await
            .unwrap();
        assert_eq!(results.len(), 3);
    }

    #[tokio::test]
    async fn test_topic_upsert_keeps_count() {
        let store = InMemoryKnowledgeStore::new();
        store.upsert_topic(&Topic::new("owner", "cold-email")).await.unwrap();
        store.increment_topic_count("owner", "cold-email").await.unwrap();
        store.increment_topic_count("owner", "cold-email").await.unwrap();

        let mut renamed = Topic::new("owner", "cold-email");
        renamed.display_name = "Cold Emailing".into();
        store.upsert_topic(&renamed).await.unwrap();

        let topic = store.get_topic("owner", "cold-email").await.unwrap();
        assert_eq!(topic.entry_count, 2);
        assert_eq!(topic.display_name, "Cold Emailing");
    }

    #[tokio::test]
    async fn test_list_topics_most_used_first() {
        let store = InMemoryKnowledgeStore::new();
        for slug in ["a", "b", "c"] {
            store.upsert_topic(&Topic::new("owner", slug)).await.unwrap();
        }
        store.increment_topic_count("owner", "c").await.unwrap();
        store.upsert_topic(&Topic::new("other", "z")).await.unwrap();

        let topics = store.list_topics("owner", 2).await.unwrap();
        let slugs: Vec<&str> = topics.iter().map(|t| t.slug.as_str()).collect();
        assert_eq!(slugs, vec!["c", "a"]);
    }

    #[tokio::test]
    async fn test_template_matching_and_usage() {
        let store = InMemoryKnowledgeStore::new();
        let shared = Template::new("Shared", "story", "s").with_embedding(vec![1.0, 0.0]);
        let private = Template::new("Private", "story", "p")
            .with_owner("other")
            .with_embedding(vec![1.0, 0.0]);
        store.save_template(&shared).await.unwrap();
        store.save_template(&private).await.unwrap();

        let matches = store
            .match_templates("owner", &[1.0, 0.0], 5, 0.3)
            .await
            .unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].template.id, shared.id);

        store.increment_template_usage(&shared.id).await.unwrap();
        assert_eq!(store.get_template(&shared.id).await.unwrap().usage_count, 1);
        assert!(store.increment_template_usage("missing").await.is_err());
    }
}
