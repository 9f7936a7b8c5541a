//! Ingestion pipeline: transcript -> entries -> topics -> store

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{info, warn};

use crate::batch::run_batched;
use crate::error::Result;
use crate::knowledge::KnowledgeEntry;
use crate::llm::{EmbeddingProvider, embed_checked};
use crate::store::KnowledgeStore;

use super::extractor::{KnowledgeExtractor, Transcript};
use super::normalizer::TopicNormalizer;

/// Runs a transcript through extraction, normalization, embedding and storage
#[derive(Clone)]
pub struct KnowledgePipeline {
    extractor: KnowledgeExtractor,
    normalizer: TopicNormalizer,
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn KnowledgeStore>,
    batch_size: usize,
}

impl KnowledgePipeline {
    pub fn new(
        extractor: KnowledgeExtractor,
        normalizer: TopicNormalizer,
        embedder: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn KnowledgeStore>,
    ) -> Self {
        Self {
            extractor,
            normalizer,
            embedder,
            store,
            batch_size: 3,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Extract, tag, embed and store one transcript's knowledge
    ///
    /// Extraction and embedding failures abort the transcript; entries are
    /// only written once every entry has an embedding.
    pub async fn ingest_transcript(&self, transcript: &Transcript) -> Result<Vec<KnowledgeEntry>> {
        let extraction = self.extractor.extract(transcript).await?;
        let owner_id = transcript.owner_id.as_str();

        let mut entries = Vec::with_capacity(extraction.entries.len());
        for mut entry in extraction.entries {
            let topics = self
                .normalizer
                .normalize_topics(owner_id, &entry.suggested_topics, &entry.content)
                .await;
            if let Err(e) = self.normalizer.upsert_topics(owner_id, &topics).await {
                warn!(owner_id = %owner_id, error = %e, "Failed to record new topics");
            }
            entry.topics = topics.into_iter().map(|t| t.slug).collect();

            let embedding = embed_checked(self.embedder.as_ref(), &entry.embedding_text()).await?;
            entries.push(entry.with_embedding(embedding));
        }

        for entry in &entries {
            self.store.save_entry(entry).await?;
            for slug in &entry.topics {
                if let Err(e) = self.store.increment_topic_count(owner_id, slug).await {
                    warn!(owner_id = %owner_id, slug = %slug, error = %e, "Failed to bump topic count");
                }
            }
        }

        info!(
            transcript_id = %transcript.id,
            owner_id = %owner_id,
            stored = entries.len(),
            "Transcript ingested"
        );
        Ok(entries)
    }

    /// Ingest many transcripts in bounded batches
    pub async fn ingest_batch(
        &self,
        transcripts: &[Transcript],
    ) -> HashMap<String, Result<Vec<KnowledgeEntry>>> {
        run_batched(
            transcripts,
            self.batch_size,
            |t| t.id.clone(),
            |t| self.ingest_transcript(t),
        )
        .await
    }
}
