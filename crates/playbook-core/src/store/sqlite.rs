//! SQLite implementation of the knowledge store
//!
//! Embeddings are stored as little-endian f32 BLOBs; similarity is computed in
//! Rust over the rows that pass the SQL filters.

use std::path::Path;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{FromRow, SqlitePool};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::knowledge::{
    Actionability, Category, KnowledgeEntry, KnowledgeType, Speaker, Template, TemplateMatch,
    Topic, clamp_quality, display_name_from_slug,
};

use super::migrations::{self, MigrationStatus};
use super::vector::{blob_to_vec, cosine_similarity, rank_by_similarity, vec_to_blob};
use super::{EntryQuery, KnowledgeStore, require_entry_embedding, require_template_embedding};

/// Default maximum connections in the pool
const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// SQLite-backed knowledge store
#[derive(Debug, Clone)]
pub struct SqliteKnowledgeStore {
    pool: SqlitePool,
}

impl SqliteKnowledgeStore {
    /// Wrap an existing pool; migrations are not run
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open (creating if needed) a database file and migrate it
    pub async fn connect(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))?
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(DEFAULT_MAX_CONNECTIONS)
            .connect_with(options)
            .await?;

        let store = Self::new(pool);
        store.migrate().await?;
        info!(path = %path.display(), "Knowledge store opened");
        Ok(store)
    }

    /// Single-connection in-memory database, migrated
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        let store = Self::new(pool);
        store.migrate().await?;
        Ok(store)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn migrate(&self) -> Result<()> {
        migrations::run_migrations(&self.pool).await
    }

    pub async fn migration_status(&self) -> Result<MigrationStatus> {
        migrations::migration_status(&self.pool).await
    }

    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1").fetch_one(&self.pool).await?;
        Ok(())
    }

    /// Total number of stored entries for an owner
    pub async fn count_entries(&self, owner_id: &str) -> Result<u64> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM knowledge_entries WHERE owner_id = ?")
                .bind(owner_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(count as u64)
    }

    pub async fn get_template(&self, id: &str) -> Result<Option<Template>> {
        let row: Option<TemplateRow> = sqlx::query_as("SELECT * FROM templates WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| r.into_template()).transpose()
    }
}

#[async_trait]
impl KnowledgeStore for SqliteKnowledgeStore {
    async fn save_entry(&self, entry: &KnowledgeEntry) -> Result<()> {
        let embedding = require_entry_embedding(entry)?;

        sqlx::query(
            r#"
            INSERT INTO knowledge_entries (
                id, owner_id, team_id, profile_id,
                category, knowledge_type, speaker, speaker_name,
                content, context, tags, suggested_topics, topics,
                quality_score, specificity, actionability,
                embedding, dimensions, source_transcript_id, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                team_id = excluded.team_id,
                profile_id = excluded.profile_id,
                category = excluded.category,
                knowledge_type = excluded.knowledge_type,
                speaker = excluded.speaker,
                speaker_name = excluded.speaker_name,
                content = excluded.content,
                context = excluded.context,
                tags = excluded.tags,
                suggested_topics = excluded.suggested_topics,
                topics = excluded.topics,
                quality_score = excluded.quality_score,
                specificity = excluded.specificity,
                actionability = excluded.actionability,
                embedding = excluded.embedding,
                dimensions = excluded.dimensions
            "#,
        )
        .bind(&entry.id)
        .bind(&entry.owner_id)
        .bind(&entry.team_id)
        .bind(&entry.profile_id)
        .bind(entry.category.as_str())
        .bind(entry.knowledge_type.as_str())
        .bind(entry.speaker.as_str())
        .bind(&entry.speaker_name)
        .bind(&entry.content)
        .bind(&entry.context)
        .bind(serde_json::to_string(&entry.tags)?)
        .bind(serde_json::to_string(&entry.suggested_topics)?)
        .bind(serde_json::to_string(&entry.topics)?)
        .bind(entry.quality_score as i64)
        .bind(entry.specificity)
        .bind(entry.actionability.as_str())
        .bind(vec_to_blob(embedding))
        .bind(embedding.len() as i64)
        .bind(&entry.source_transcript_id)
        .bind(entry.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        debug!(entry_id = %entry.id, owner_id = %entry.owner_id, "Knowledge entry saved");
        Ok(())
    }

    async fn get_entry(&self, id: &str) -> Result<Option<KnowledgeEntry>> {
        let row: Option<EntryRow> = sqlx::query_as("SELECT * FROM knowledge_entries WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| r.into_entry()).transpose()
    }

    async fn search(&self, query: &EntryQuery) -> Result<Vec<KnowledgeEntry>> {
        let rows: Vec<EntryRow> = sqlx::query_as(
            r#"
            SELECT * FROM knowledge_entries
            WHERE (owner_id = ? OR (? IS NOT NULL AND team_id = ?))
              AND (? IS NULL OR profile_id = ?)
              AND quality_score >= ?
              AND dimensions = ?
            "#,
        )
        .bind(&query.owner_id)
        .bind(&query.team_id)
        .bind(&query.team_id)
        .bind(&query.profile_id)
        .bind(&query.profile_id)
        .bind(query.min_quality as i64)
        .bind(query.embedding.len() as i64)
        .fetch_all(&self.pool)
        .await?;

        let candidates = rows.len();
        let scored = rows
            .into_iter()
            .map(|row| {
                let similarity = cosine_similarity(&query.embedding, &blob_to_vec(&row.embedding));
                row.into_entry().map(|entry| (entry, similarity))
            })
            .collect::<Result<Vec<_>>>()?;

        let ranked = rank_by_similarity(scored, query.similarity_threshold, query.limit);
        debug!(
            owner_id = %query.owner_id,
            candidates,
            matched = ranked.len(),
            "Knowledge search completed"
        );
        Ok(ranked.into_iter().map(|(entry, _)| entry).collect())
    }

    async fn list_topics(&self, owner_id: &str, limit: usize) -> Result<Vec<Topic>> {
        let rows: Vec<TopicRow> = sqlx::query_as(
            r#"
            SELECT * FROM topics
            WHERE owner_id = ?
            ORDER BY entry_count DESC, slug ASC
            LIMIT ?
            "#,
        )
        .bind(owner_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(TopicRow::into_topic).collect())
    }

    async fn upsert_topic(&self, topic: &Topic) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            r#"
            INSERT INTO topics (owner_id, slug, display_name, description, entry_count, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(owner_id, slug) DO UPDATE SET
                display_name = excluded.display_name,
                description = CASE
                    WHEN excluded.description != '' THEN excluded.description
                    ELSE topics.description
                END,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&topic.owner_id)
        .bind(&topic.slug)
        .bind(&topic.display_name)
        .bind(&topic.description)
        .bind(topic.entry_count as i64)
        .bind(topic.created_at.to_rfc3339())
        .bind(&now)
        .execute(&self.pool)
        .await?;

        debug!(owner_id = %topic.owner_id, slug = %topic.slug, "Topic upserted");
        Ok(())
    }

    async fn increment_topic_count(&self, owner_id: &str, slug: &str) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            r#"
            INSERT INTO topics (owner_id, slug, display_name, description, entry_count, created_at, updated_at)
            VALUES (?, ?, ?, '', 1, ?, ?)
            ON CONFLICT(owner_id, slug) DO UPDATE SET
                entry_count = topics.entry_count + 1,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(owner_id)
        .bind(slug)
        .bind(display_name_from_slug(slug))
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn save_template(&self, template: &Template) -> Result<()> {
        let embedding = require_template_embedding(template)?;

        sqlx::query(
            r#"
            INSERT INTO templates (
                id, owner_id, name, category, structure,
                example_posts, use_cases, tags,
                usage_count, avg_engagement_score, embedding, dimensions, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                owner_id = excluded.owner_id,
                name = excluded.name,
                category = excluded.category,
                structure = excluded.structure,
                example_posts = excluded.example_posts,
                use_cases = excluded.use_cases,
                tags = excluded.tags,
                avg_engagement_score = excluded.avg_engagement_score,
                embedding = excluded.embedding,
                dimensions = excluded.dimensions
            "#,
        )
        .bind(&template.id)
        .bind(&template.owner_id)
        .bind(&template.name)
        .bind(&template.category)
        .bind(&template.structure)
        .bind(serde_json::to_string(&template.example_posts)?)
        .bind(serde_json::to_string(&template.use_cases)?)
        .bind(serde_json::to_string(&template.tags)?)
        .bind(template.usage_count as i64)
        .bind(template.avg_engagement_score)
        .bind(vec_to_blob(embedding))
        .bind(embedding.len() as i64)
        .bind(template.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        info!(template_id = %template.id, name = %template.name, "Template saved");
        Ok(())
    }

    async fn match_templates(
        &self,
        owner_id: &str,
        embedding: &[f32],
        count: usize,
        min_similarity: f32,
    ) -> Result<Vec<TemplateMatch>> {
        let rows: Vec<TemplateRow> = sqlx::query_as(
            r#"
            SELECT * FROM templates
            WHERE (owner_id IS NULL OR owner_id = ?)
              AND dimensions = ?
            "#,
        )
        .bind(owner_id)
        .bind(embedding.len() as i64)
        .fetch_all(&self.pool)
        .await?;

        let scored = rows
            .into_iter()
            .map(|row| {
                let similarity = cosine_similarity(embedding, &blob_to_vec(&row.embedding));
                row.into_template().map(|template| (template, similarity))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(rank_by_similarity(scored, min_similarity, count)
            .into_iter()
            .map(|(template, similarity)| TemplateMatch {
                template,
                similarity,
            })
            .collect())
    }

    async fn increment_template_usage(&self, id: &str) -> Result<()> {
        let result = sqlx::query("UPDATE templates SET usage_count = usage_count + 1 WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(Error::TemplateNotFound(id.to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, FromRow)]
struct EntryRow {
    id: String,
    owner_id: String,
    team_id: Option<String>,
    profile_id: Option<String>,
    category: String,
    knowledge_type: String,
    speaker: String,
    speaker_name: Option<String>,
    content: String,
    context: String,
    tags: String,
    suggested_topics: String,
    topics: String,
    quality_score: i64,
    specificity: bool,
    actionability: String,
    embedding: Vec<u8>,
    source_transcript_id: Option<String>,
    created_at: String,
}

impl EntryRow {
    fn into_entry(self) -> Result<KnowledgeEntry> {
        let knowledge_type = KnowledgeType::parse(&self.knowledge_type).ok_or_else(|| {
            Error::Other(format!("Invalid knowledge type: {}", self.knowledge_type))
        })?;
        let category = Category::parse(&self.category)
            .ok_or_else(|| Error::Other(format!("Invalid category: {}", self.category)))?;
        let speaker = Speaker::parse(&self.speaker)
            .ok_or_else(|| Error::Other(format!("Invalid speaker: {}", self.speaker)))?;

        Ok(KnowledgeEntry {
            id: self.id,
            owner_id: self.owner_id,
            team_id: self.team_id,
            profile_id: self.profile_id,
            category,
            knowledge_type,
            speaker,
            speaker_name: self.speaker_name,
            content: self.content,
            context: self.context,
            tags: serde_json::from_str(&self.tags).unwrap_or_default(),
            suggested_topics: serde_json::from_str(&self.suggested_topics).unwrap_or_default(),
            topics: serde_json::from_str(&self.topics).unwrap_or_default(),
            quality_score: clamp_quality(self.quality_score),
            specificity: self.specificity,
            actionability: Actionability::parse(&self.actionability).unwrap_or_default(),
            embedding: Some(blob_to_vec(&self.embedding)),
            source_transcript_id: self.source_transcript_id,
            created_at: parse_timestamp(&self.created_at),
        })
    }
}

#[derive(Debug, FromRow)]
struct TopicRow {
    owner_id: String,
    slug: String,
    display_name: String,
    description: String,
    entry_count: i64,
    created_at: String,
}

impl TopicRow {
    fn into_topic(self) -> Topic {
        Topic {
            owner_id: self.owner_id,
            slug: self.slug,
            display_name: self.display_name,
            description: self.description,
            entry_count: self.entry_count.max(0) as u32,
            created_at: parse_timestamp(&self.created_at),
        }
    }
}

#[derive(Debug, FromRow)]
struct TemplateRow {
    id: String,
    owner_id: Option<String>,
    name: String,
    category: String,
    structure: String,
    example_posts: String,
    use_cases: String,
    tags: String,
    usage_count: i64,
    avg_engagement_score: Option<f64>,
    embedding: Vec<u8>,
    created_at: String,
}

impl TemplateRow {
    fn into_template(self) -> Result<Template> {
        Ok(Template {
            id: self.id,
            owner_id: self.owner_id,
            name: self.name,
            category: self.category,
            structure: self.structure,
            example_posts: serde_json::from_str(&self.example_posts)?,
            use_cases: serde_json::from_str(&self.use_cases)?,
            tags: serde_json::from_str(&self.tags)?,
            usage_count: self.usage_count.max(0) as u32,
            avg_engagement_score: self.avg_engagement_score,
            embedding: Some(blob_to_vec(&self.embedding)),
            created_at: parse_timestamp(&self.created_at),
        })
    }
}

fn parse_timestamp(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn store() -> SqliteKnowledgeStore {
        SqliteKnowledgeStore::in_memory().await.unwrap()
    }

    fn entry(owner: &str, quality: i64, embedding: Vec<f32>) -> KnowledgeEntry {
        KnowledgeEntry::new(owner, KnowledgeType::HowTo, "Lead with the prospect's trigger event")
            .with_quality(quality)
            .with_context("Cold email coaching")
            .with_tags(vec!["cold-email".into()])
            .with_embedding(embedding)
    }

    #[tokio::test]
    async fn test_save_and_get_round_trip() {
        let store = store().await;
        let saved = entry("owner", 4, vec![0.5, 0.25, -1.0]).with_speaker(Speaker::Participant);
        store.save_entry(&saved).await.unwrap();

        let loaded = store.get_entry(&saved.id).await.unwrap().unwrap();
        assert_eq!(loaded.content, saved.content);
        assert_eq!(loaded.speaker, Speaker::Participant);
        assert_eq!(loaded.tags, saved.tags);
        assert_eq!(loaded.embedding, saved.embedding);
        assert_eq!(loaded.category, Category::Insight);
        assert_eq!(store.count_entries("owner").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_save_rejects_missing_embedding() {
        let store = store().await;
        let bare = KnowledgeEntry::new("owner", KnowledgeType::Insight, "x");
        assert!(matches!(store.save_entry(&bare).await, Err(Error::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_search_threshold_quality_and_order() {
        let store = store().await;
        let best = entry("owner", 2, vec![1.0, 0.0]);
        let good = entry("owner", 5, vec![0.8, 0.6]);
        let unrelated = entry("owner", 5, vec![0.0, 1.0]);
        let weak = entry("owner", 1, vec![1.0, 0.0]);
        for e in [&best, &good, &unrelated, &weak] {
            store.save_entry(e).await.unwrap();
        }

        let results = store
            .search(&EntryQuery::new("owner", vec![1.0, 0.0]))
            .await
            .unwrap();
        let ids: Vec<&str> = results.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec![best.id.as_str(), good.id.as_str()]);
    }

    #[tokio::test]
    async fn test_search_includes_team_entries_on_request() {
        let store = store().await;
        let shared = entry("teammate", 4, vec![1.0, 0.0]).with_team("team-1");
        store.save_entry(&shared).await.unwrap();

        let own_only = store
            .search(&EntryQuery::new("owner", vec![1.0, 0.0]))
            .await
            .unwrap();
        assert!(own_only.is_empty());

        let with_team = store
            .search(&EntryQuery::new("owner", vec![1.0, 0.0]).with_team(Some("team-1".into())))
            .await
            .unwrap();
        assert_eq!(with_team.len(), 1);
    }

    #[tokio::test]
    async fn test_topic_upsert_on_conflict() {
        let store = store().await;
        store.upsert_topic(&Topic::new("owner", "cold-email")).await.unwrap();
        store.increment_topic_count("owner", "cold-email").await.unwrap();
        store.increment_topic_count("owner", "pricing").await.unwrap();
        store.increment_topic_count("owner", "pricing").await.unwrap();

        // Re-minting the same slug must not reset its count
        store.upsert_topic(&Topic::new("owner", "pricing")).await.unwrap();

        let topics = store.list_topics("owner", 100).await.unwrap();
        let summary: Vec<(&str, u32)> = topics
            .iter()
            .map(|t| (t.slug.as_str(), t.entry_count))
            .collect();
        assert_eq!(summary, vec![("pricing", 2), ("cold-email", 1)]);
    }

    #[tokio::test]
    async fn test_templates_shared_and_private() {
        let store = store().await;
        let shared = Template::new("Contrarian Take", "opinion", "{claim}\n{proof}")
            .with_example("Everyone says X. They're wrong.")
            .with_embedding(vec![1.0, 0.0]);
        let mine = Template::new("My Listicle", "educational", "{n} ways")
            .with_owner("owner")
            .with_embedding(vec![0.9, 0.1]);
        let theirs = Template::new("Their Story", "story", "{story}")
            .with_owner("other")
            .with_embedding(vec![1.0, 0.0]);
        for t in [&shared, &mine, &theirs] {
            store.save_template(t).await.unwrap();
        }

        let matches = store
            .match_templates("owner", &[1.0, 0.0], 5, 0.3)
            .await
            .unwrap();
        let names: Vec<&str> = matches.iter().map(|m| m.template.name.as_str()).collect();
        assert_eq!(names, vec!["Contrarian Take", "My Listicle"]);
        assert_eq!(matches[0].template.example_posts.len(), 1);

        store.increment_template_usage(&shared.id).await.unwrap();
        let reloaded = store.get_template(&shared.id).await.unwrap().unwrap();
        assert_eq!(reloaded.usage_count, 1);
        assert!(matches!(
            store.increment_template_usage("missing").await,
            Err(Error::TemplateNotFound(_))
        ));
    }
}
