//! Database migrations
//!
//! Migrations are versioned in a `_migrations` table and applied in order on
//! connection.

use sqlx::SqlitePool;

use crate::error::{Error, Result};

/// Current schema version
pub const CURRENT_VERSION: i32 = 2;

const CREATE_MIGRATIONS_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS _migrations (
        version INTEGER PRIMARY KEY NOT NULL,
        applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
    );
"#;

/// Migration 1: knowledge entries and topic vocabulary
const MIGRATION_V1: &str = r#"
    CREATE TABLE IF NOT EXISTS knowledge_entries (
        id TEXT PRIMARY KEY NOT NULL,
        owner_id TEXT NOT NULL,
        team_id TEXT,
        profile_id TEXT,
        category TEXT NOT NULL CHECK (category IN ('insight', 'question', 'product_intel')),
        knowledge_type TEXT NOT NULL,
        speaker TEXT NOT NULL CHECK (speaker IN ('host', 'participant')),
        speaker_name TEXT,
        content TEXT NOT NULL,
        context TEXT NOT NULL DEFAULT '',
        tags TEXT NOT NULL DEFAULT '[]',
        suggested_topics TEXT NOT NULL DEFAULT '[]',
        topics TEXT NOT NULL DEFAULT '[]',
        quality_score INTEGER NOT NULL CHECK (quality_score BETWEEN 1 AND 5),
        specificity INTEGER NOT NULL DEFAULT 0,
        actionability TEXT NOT NULL DEFAULT 'contextual',
        embedding BLOB NOT NULL,
        dimensions INTEGER NOT NULL,
        source_transcript_id TEXT,
        created_at TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_entries_owner ON knowledge_entries(owner_id, quality_score);
    CREATE INDEX IF NOT EXISTS idx_entries_team ON knowledge_entries(team_id);
    CREATE INDEX IF NOT EXISTS idx_entries_source ON knowledge_entries(source_transcript_id);

    CREATE TABLE IF NOT EXISTS topics (
        owner_id TEXT NOT NULL,
        slug TEXT NOT NULL,
        display_name TEXT NOT NULL,
        description TEXT NOT NULL DEFAULT '',
        entry_count INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        PRIMARY KEY (owner_id, slug)
    );

    CREATE INDEX IF NOT EXISTS idx_topics_usage ON topics(owner_id, entry_count DESC);
"#;

/// Migration 2: template library
const MIGRATION_V2: &str = r#"
    CREATE TABLE IF NOT EXISTS templates (
        id TEXT PRIMARY KEY NOT NULL,
        owner_id TEXT,
        name TEXT NOT NULL,
        category TEXT NOT NULL,
        structure TEXT NOT NULL,
        example_posts TEXT NOT NULL DEFAULT '[]',
        use_cases TEXT NOT NULL DEFAULT '[]',
        tags TEXT NOT NULL DEFAULT '[]',
        usage_count INTEGER NOT NULL DEFAULT 0,
        avg_engagement_score REAL,
        embedding BLOB NOT NULL,
        dimensions INTEGER NOT NULL,
        created_at TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_templates_owner ON templates(owner_id);
"#;

async fn get_current_version(pool: &SqlitePool) -> Result<i32> {
    sqlx::raw_sql(CREATE_MIGRATIONS_TABLE).execute(pool).await?;

    let row: Option<(Option<i32>,)> = sqlx::query_as("SELECT MAX(version) FROM _migrations")
        .fetch_optional(pool)
        .await?;

    Ok(row.and_then(|(v,)| v).unwrap_or(0))
}

async fn apply(pool: &SqlitePool, version: i32, sql: &str) -> Result<()> {
    sqlx::raw_sql(sql)
        .execute(pool)
        .await
        .map_err(|e| Error::MigrationFailed(format!("v{}: {}", version, e)))?;
    sqlx::query("INSERT INTO _migrations (version) VALUES (?)")
        .bind(version)
        .execute(pool)
        .await?;
    Ok(())
}

/// Run all pending migrations
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    let current_version = get_current_version(pool).await?;

    tracing::info!(
        current_version = current_version,
        target_version = CURRENT_VERSION,
        "Checking database migrations"
    );

    if current_version >= CURRENT_VERSION {
        tracing::debug!("Database is up to date");
        return Ok(());
    }

    if current_version < 1 {
        tracing::info!("Applying migration v1: Knowledge entries and topics");
        apply(pool, 1, MIGRATION_V1).await?;
    }

    if current_version < 2 {
        tracing::info!("Applying migration v2: Template library");
        apply(pool, 2, MIGRATION_V2).await?;
    }

    tracing::info!("Database migrations completed");
    Ok(())
}

/// Migration status information
#[derive(Debug, Clone)]
pub struct MigrationStatus {
    pub current_version: i32,
    pub target_version: i32,
    pub needs_migration: bool,
}

pub async fn migration_status(pool: &SqlitePool) -> Result<MigrationStatus> {
    let current_version = get_current_version(pool).await?;
    Ok(MigrationStatus {
        current_version,
        target_version: CURRENT_VERSION,
        needs_migration: current_version < CURRENT_VERSION,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn create_test_pool() -> SqlitePool {
        SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("Failed to create test pool")
    }

    #[tokio::test]
    async fn test_run_migrations() {
        let pool = create_test_pool().await;

        let status = migration_status(&pool).await.unwrap();
        assert_eq!(status.current_version, 0);
        assert!(status.needs_migration);

        run_migrations(&pool).await.unwrap();

        let status = migration_status(&pool).await.unwrap();
        assert_eq!(status.current_version, CURRENT_VERSION);
        assert!(!status.needs_migration);
    }

    #[tokio::test]
    async fn test_migrations_idempotent() {
        let pool = create_test_pool().await;
        run_migrations(&pool).await.unwrap();
        run_migrations(&pool).await.unwrap();

        let status = migration_status(&pool).await.unwrap();
        assert_eq!(status.current_version, CURRENT_VERSION);
    }

    #[tokio::test]
    async fn test_tables_created() {
        let pool = create_test_pool().await;
        run_migrations(&pool).await.unwrap();

        for table in ["knowledge_entries", "topics", "templates"] {
            let result: (i32,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM {}", table))
                .fetch_one(&pool)
                .await
                .unwrap_or_else(|_| panic!("Table {} should exist", table));
            assert_eq!(result.0, 0, "Table {} should be empty", table);
        }
    }
}
