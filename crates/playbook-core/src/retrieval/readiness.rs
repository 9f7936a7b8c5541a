//! Readiness assessor
//!
//! Judges whether enough knowledge exists on a topic for a content goal. The
//! model gives the nuanced answer; local thresholds answer when it cannot.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::RetrievalConfig;
use crate::error::{Error, Result};
use crate::knowledge::{KnowledgeEntry, KnowledgeType};
use crate::llm::{CompletionProvider, EmbeddingProvider, complete_json, embed_checked};
use crate::prompts::{PromptId, PromptRegistry};
use crate::store::{EntryQuery, KnowledgeStore};

use super::brief::average_quality;

/// Entries shown to the model as examples
pub const READINESS_SAMPLES: usize = 5;

const READY_CONFIDENCE: f64 = 0.7;
const NOT_READY_CONFIDENCE: f64 = 0.4;

/// What the owner wants to produce
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentGoal {
    LeadMagnet,
    BlogPost,
    Course,
    Sop,
    ContentWeek,
}

impl ContentGoal {
    pub const ALL: [ContentGoal; 5] = [
        Self::LeadMagnet,
        Self::BlogPost,
        Self::Course,
        Self::Sop,
        Self::ContentWeek,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LeadMagnet => "lead_magnet",
            Self::BlogPost => "blog_post",
            Self::Course => "course",
            Self::Sop => "sop",
            Self::ContentWeek => "content_week",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        let normalized = s.trim().to_lowercase().replace(['-', ' '], "_");
        Self::ALL.into_iter().find(|g| g.as_str() == normalized)
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::LeadMagnet => "a downloadable lead magnet that solves one narrow problem",
            Self::BlogPost => "a single long-form blog post",
            Self::Course => "a multi-module course",
            Self::Sop => "a standard operating procedure",
            Self::ContentWeek => "a week of daily social posts",
        }
    }

    pub fn thresholds(&self) -> ReadinessThresholds {
        let (min_entries, min_types, min_avg_quality) = match self {
            Self::LeadMagnet => (8, 3, 3.5),
            Self::BlogPost => (5, 2, 3.0),
            Self::Course => (20, 5, 3.5),
            Self::Sop => (6, 2, 3.5),
            Self::ContentWeek => (12, 3, 3.0),
        };
        ReadinessThresholds {
            min_entries,
            min_types,
            min_avg_quality,
        }
    }

    /// Content shapes that usually work for this goal
    pub fn archetypes(&self) -> &'static [&'static str] {
        match self {
            Self::LeadMagnet => &["checklist", "framework guide", "swipe file"],
            Self::BlogPost => &["how-to guide", "listicle", "case study"],
            Self::Course => &["module-based curriculum", "cohort workshop"],
            Self::Sop => &["step-by-step procedure", "decision checklist"],
            Self::ContentWeek => &["daily tips series", "story plus lesson posts", "myth-busting thread"],
        }
    }
}

impl fmt::Display for ContentGoal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Minimums a topic must meet for a goal
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ReadinessThresholds {
    pub min_entries: usize,
    pub min_types: usize,
    pub min_avg_quality: f64,
}

impl ReadinessThresholds {
    pub fn evaluate(&self, stats: &KnowledgeStats) -> bool {
        stats.entry_count >= self.min_entries
            && stats.distinct_types >= self.min_types
            && stats.avg_quality >= self.min_avg_quality
    }

    /// Human-readable shortfalls, empty when every threshold is met
    pub fn gaps(&self, stats: &KnowledgeStats) -> Vec<String> {
        let mut gaps = Vec::new();
        if stats.entry_count < self.min_entries {
            gaps.push(format!(
                "{} more entries (have {}, need {})",
                self.min_entries - stats.entry_count,
                stats.entry_count,
                self.min_entries
            ));
        }
        if stats.distinct_types < self.min_types {
            gaps.push(format!(
                "{} more knowledge types (have {}, need {})",
                self.min_types - stats.distinct_types,
                stats.distinct_types,
                self.min_types
            ));
        }
        if stats.avg_quality < self.min_avg_quality {
            gaps.push(format!(
                "higher quality entries (average {:.1}, need {:.1})",
                stats.avg_quality, self.min_avg_quality
            ));
        }
        gaps
    }

    fn describe(&self) -> String {
        format!(
            "minimum {} entries, {} distinct knowledge types, average quality {:.1}",
            self.min_entries, self.min_types, self.min_avg_quality
        )
    }
}

/// Locally computed statistics over a topic's entries
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct KnowledgeStats {
    pub entry_count: usize,
    pub distinct_types: usize,
    pub avg_quality: f64,
    pub high_quality_count: usize,
    pub coverage: BTreeMap<KnowledgeType, usize>,
}

impl KnowledgeStats {
    pub fn from_entries(entries: &[KnowledgeEntry]) -> Self {
        let mut coverage = BTreeMap::new();
        for entry in entries {
            *coverage.entry(entry.knowledge_type).or_insert(0) += 1;
        }
        Self {
            entry_count: entries.len(),
            distinct_types: coverage.len(),
            avg_quality: average_quality(entries),
            high_quality_count: entries.iter().filter(|e| e.is_high_quality()).count(),
            coverage,
        }
    }

    fn describe(&self) -> String {
        let coverage = if self.coverage.is_empty() {
            "none".to_string()
        } else {
            self.coverage
                .iter()
                .map(|(t, n)| format!("{}: {}", t, n))
                .collect::<Vec<_>>()
                .join(", ")
        };
        format!(
            "Entries: {}\nDistinct knowledge types: {}\nAverage quality: {:.2}\nHigh quality entries: {}\nCoverage: {}",
            self.entry_count, self.distinct_types, self.avg_quality, self.high_quality_count, coverage
        )
    }
}

/// Which path produced an assessment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AssessmentSource {
    Model,
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReadinessAssessment {
    pub ready: bool,
    pub confidence: f64,
    pub reasoning: String,
    pub gaps_that_would_improve: Vec<String>,
    pub suggested_archetypes: Vec<String>,
    /// Always computed locally
    pub topic_coverage: BTreeMap<KnowledgeType, usize>,
    pub source: AssessmentSource,
}

#[derive(Debug, Deserialize)]
struct ModelAssessment {
    ready: bool,
    confidence: f64,
    #[serde(default)]
    reasoning: String,
    #[serde(default)]
    gaps_that_would_improve: Vec<String>,
    #[serde(default)]
    suggested_archetypes: Vec<String>,
}

/// Deterministic assessment used when the model cannot answer
pub fn fallback_assessment(
    topic: &str,
    goal: ContentGoal,
    stats: &KnowledgeStats,
) -> ReadinessAssessment {
    let thresholds = goal.thresholds();
    let ready = thresholds.evaluate(stats);
    let reasoning = if ready {
        format!(
            "'{}' has {} entries across {} knowledge types with average quality {:.1}, which meets the {} threshold ({}).",
            topic,
            stats.entry_count,
            stats.distinct_types,
            stats.avg_quality,
            goal,
            thresholds.describe()
        )
    } else {
        format!(
            "'{}' has {} entries across {} knowledge types with average quality {:.1}, below the {} threshold ({}).",
            topic,
            stats.entry_count,
            stats.distinct_types,
            stats.avg_quality,
            goal,
            thresholds.describe()
        )
    };

    ReadinessAssessment {
        ready,
        confidence: if ready { READY_CONFIDENCE } else { NOT_READY_CONFIDENCE },
        reasoning,
        gaps_that_would_improve: thresholds.gaps(stats),
        suggested_archetypes: goal.archetypes().iter().map(|a| a.to_string()).collect(),
        topic_coverage: stats.coverage.clone(),
        source: AssessmentSource::Fallback,
    }
}

#[derive(Clone)]
pub struct ReadinessAssessor {
    store: Arc<dyn KnowledgeStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    provider: Arc<dyn CompletionProvider>,
    prompts: Arc<PromptRegistry>,
    config: RetrievalConfig,
}

impl ReadinessAssessor {
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

    /// Assess a topic against a goal
    ///
    /// Retrieval failures are returned. The model judgment is advisory and
    /// falls back to the goal's thresholds.
    pub async fn assess_readiness(
        &self,
        owner_id: &str,
        topic: &str,
        goal: ContentGoal,
    ) -> Result<ReadinessAssessment> {
        let embedding = embed_checked(self.embedder.as_ref(), topic).await?;
        let query = EntryQuery::new(owner_id, embedding)
            .with_limit(self.config.readiness_sample_size)
            .with_threshold(self.config.similarity_threshold)
            .with_min_quality(self.config.min_quality);
        let mut entries = self.store.search(&query).await?;
        entries.sort_by(|a, b| b.quality_score.cmp(&a.quality_score));

        let stats = KnowledgeStats::from_entries(&entries);

        let assessment = if entries.is_empty() {
            fallback_assessment(topic, goal, &stats)
        } else {
            match self.ask_model(topic, goal, &stats, &entries).await {
                Ok(assessment) => assessment,
                Err(e) => {
                    warn!(topic = %topic, goal = %goal, error = %e, "Readiness judgment failed, using thresholds");
                    fallback_assessment(topic, goal, &stats)
                }
            }
        };

        info!(
            owner_id = %owner_id,
            topic = %topic,
            goal = %goal,
            ready = assessment.ready,
            source = ?assessment.source,
            "Readiness assessed"
        );
        Ok(assessment)
    }

    async fn ask_model(
        &self,
        topic: &str,
        goal: ContentGoal,
        stats: &KnowledgeStats,
        entries: &[KnowledgeEntry],
    ) -> Result<ReadinessAssessment> {
        let samples = entries
            .iter()
            .take(READINESS_SAMPLES)
            .map(|e| format!("- [{}, quality {}] {}", e.knowledge_type, e.quality_score, e.content.trim()))
            .collect::<Vec<_>>()
            .join("\n");
        let thresholds = goal.thresholds().describe();
        let stats_text = stats.describe();

        let request = self.prompts.get_prompt(PromptId::AssessReadiness)?.request(&[
            ("topic", topic),
            ("goal", goal.as_str()),
            ("goal_description", goal.description()),
            ("thresholds", thresholds.as_str()),
            ("stats", stats_text.as_str()),
            ("samples", samples.as_str()),
        ]);

        let output: ModelAssessment = complete_json(self.provider.as_ref(), &request).await?;
        if !output.confidence.is_finite() {
            return Err(Error::invalid_response("confidence is not a number", ""));
        }

        let mut archetypes = output.suggested_archetypes;
        if archetypes.is_empty() {
            archetypes = goal.archetypes().iter().map(|a| a.to_string()).collect();
        }

        Ok(ReadinessAssessment {
            ready: output.ready,
            confidence: output.confidence.clamp(0.0, 1.0),
            reasoning: output.reasoning.trim().to_string(),
            gaps_that_would_improve: output.gaps_that_would_improve,
            suggested_archetypes: archetypes,
            topic_coverage: stats.coverage.clone(),
            source: AssessmentSource::Model,
        })
    }
}
