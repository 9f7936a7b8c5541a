//! Knowledge store
//!
//! The [`KnowledgeStore`] trait abstracts over persistence backends. Every
//! write is a single upsert; concurrent minting of the same topic slug is
//! resolved by the backend rather than by application locks.

mod memory;
pub mod migrations;
mod sqlite;
pub mod vector;

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::knowledge::{KnowledgeEntry, Template, TemplateMatch, Topic};

pub use memory::InMemoryKnowledgeStore;
pub use sqlite::SqliteKnowledgeStore;

/// Parameters for a semantic search over one owner's entries
#[derive(Debug, Clone)]
pub struct EntryQuery {
    pub owner_id: String,
    pub embedding: Vec<f32>,
    pub limit: usize,
    pub similarity_threshold: f32,
    pub min_quality: u8,
    /// Also include entries shared with this team
    pub team_id: Option<String>,
    /// Restrict to entries captured for this profile
    pub profile_id: Option<String>,
}

impl EntryQuery {
    pub fn new(owner_id: impl Into<String>, embedding: Vec<f32>) -> Self {
        Self {
            owner_id: owner_id.into(),
            embedding,
            limit: 15,
            similarity_threshold: 0.5,
            min_quality: 2,
            team_id: None,
            profile_id: None,
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_threshold(mut self, similarity_threshold: f32) -> Self {
        self.similarity_threshold = similarity_threshold;
        self
    }

    pub fn with_min_quality(mut self, min_quality: u8) -> Self {
        self.min_quality = min_quality;
        self
    }

    pub fn with_team(mut self, team_id: Option<String>) -> Self {
        self.team_id = team_id;
        self
    }

    pub fn with_profile(mut self, profile_id: Option<String>) -> Self {
        self.profile_id = profile_id;
        self
    }

    /// Non-vector filters: ownership, team sharing, profile and quality
    pub fn admits(&self, entry: &KnowledgeEntry) -> bool {
        let owned = entry.owner_id == self.owner_id
            || (self.team_id.is_some() && entry.team_id == self.team_id);
        let profile_ok = self.profile_id.is_none() || entry.profile_id == self.profile_id;
        owned && profile_ok && entry.quality_score >= self.min_quality
    }
}

/// Persistence for entries, topics and templates
#[async_trait]
pub trait KnowledgeStore: Send + Sync {
    /// Insert or replace an entry; entries without an embedding are rejected
    async fn save_entry(&self, entry: &KnowledgeEntry) -> Result<()>;

    async fn get_entry(&self, id: &str) -> Result<Option<KnowledgeEntry>>;

    /// Entries most similar to the query, most similar first
    async fn search(&self, query: &EntryQuery) -> Result<Vec<KnowledgeEntry>>;

    /// An owner's topics, most used first
    async fn list_topics(&self, owner_id: &str, limit: usize) -> Result<Vec<Topic>>;

    /// Insert a topic, or refresh its display fields if the slug exists
    ///
    /// `entry_count` of an existing topic is never changed here.
    async fn upsert_topic(&self, topic: &Topic) -> Result<()>;

    /// Bump a topic's entry count, creating the topic when missing
    async fn increment_topic_count(&self, owner_id: &str, slug: &str) -> Result<()>;

    async fn save_template(&self, template: &Template) -> Result<()>;

    /// Templates visible to the owner, most similar first
    async fn match_templates(
        &self,
        owner_id: &str,
        embedding: &[f32],
        count: usize,
        min_similarity: f32,
    ) -> Result<Vec<TemplateMatch>>;

    async fn increment_template_usage(&self, id: &str) -> Result<()>;
}

/// Embedding of an entry about to be stored
fn require_entry_embedding(entry: &KnowledgeEntry) -> Result<&[f32]> {
    if entry.owner_id.trim().is_empty() {
        return Err(Error::InvalidInput(format!(
            "Entry '{}' has no owner",
            entry.id
        )));
    }
    match entry.embedding.as_deref() {
        Some(embedding) if !embedding.is_empty() => Ok(embedding),
        _ => Err(Error::InvalidInput(format!(
            "Entry '{}' cannot be stored without an embedding",
            entry.id
        ))),
    }
}

fn require_template_embedding(template: &Template) -> Result<&[f32]> {
    match template.embedding.as_deref() {
        Some(embedding) if !embedding.is_empty() => Ok(embedding),
        _ => Err(Error::InvalidInput(format!(
            "Template '{}' cannot be stored without an embedding",
            template.id
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::KnowledgeType;

    #[test]
    fn test_query_admits_owner_and_quality() {
        let query = EntryQuery::new("owner", vec![1.0]).with_min_quality(3);
        let entry = KnowledgeEntry::new("owner", KnowledgeType::Insight, "x").with_quality(3);
        assert!(query.admits(&entry));
        assert!(!query.admits(&entry.clone().with_quality(2)));

        let other = KnowledgeEntry::new("someone-else", KnowledgeType::Insight, "x").with_quality(5);
        assert!(!query.admits(&other));
    }

    #[test]
    fn test_query_team_and_profile() {
        let shared = KnowledgeEntry::new("teammate", KnowledgeType::Insight, "x")
            .with_quality(4)
            .with_team("team-1");
        let query = EntryQuery::new("owner", vec![1.0]);
        assert!(!query.admits(&shared));
        assert!(query.clone().with_team(Some("team-1".into())).admits(&shared));

        let profiled = KnowledgeEntry::new("owner", KnowledgeType::Insight, "x")
            .with_quality(4)
            .with_profile("p1");
        assert!(query.clone().with_profile(Some("p1".into())).admits(&profiled));
        assert!(!query.with_profile(Some("p2".into())).admits(&profiled));
    }

    #[test]
    fn test_embedding_required() {
        let entry = KnowledgeEntry::new("owner", KnowledgeType::Insight, "x");
        assert!(require_entry_embedding(&entry).is_err());
        assert!(require_entry_embedding(&entry.clone().with_embedding(vec![])).is_err());
        assert!(require_entry_embedding(&entry.with_embedding(vec![0.1])).is_ok());

        let ownerless = KnowledgeEntry::new(" ", KnowledgeType::Insight, "x").with_embedding(vec![1.0]);
        assert!(require_entry_embedding(&ownerless).is_err());
    }
}
