//! Knowledge entries distilled from transcripts

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Highest quality score an entry can carry
pub const MAX_QUALITY: u8 = 5;

/// Lowest quality score an entry can carry
pub const MIN_QUALITY: u8 = 1;

/// Quality at or above which an entry is tagged as high quality
pub const HIGH_QUALITY: u8 = 4;

/// Fine-grained kind of knowledge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KnowledgeType {
    HowTo,
    Insight,
    Story,
    Question,
    Objection,
    Mistake,
    Decision,
    MarketIntel,
}

impl KnowledgeType {
    pub const ALL: [KnowledgeType; 8] = [
        Self::HowTo,
        Self::Insight,
        Self::Story,
        Self::Question,
        Self::Objection,
        Self::Mistake,
        Self::Decision,
        Self::MarketIntel,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HowTo => "how_to",
            Self::Insight => "insight",
            Self::Story => "story",
            Self::Question => "question",
            Self::Objection => "objection",
            Self::Mistake => "mistake",
            Self::Decision => "decision",
            Self::MarketIntel => "market_intel",
        }
    }

    /// Parse a type name, accepting hyphens, spaces and mixed case
    pub fn parse(s: &str) -> Option<Self> {
        let normalized = s.trim().to_lowercase().replace(['-', ' '], "_");
        Self::ALL.into_iter().find(|t| t.as_str() == normalized)
    }

    /// Section header used when compiling context
    pub fn label(&self) -> &'static str {
        match self {
            Self::HowTo => "How-To",
            Self::Insight => "Insights",
            Self::Story => "Stories",
            Self::Question => "Questions",
            Self::Objection => "Objections",
            Self::Mistake => "Mistakes",
            Self::Decision => "Decisions",
            Self::MarketIntel => "Market Intel",
        }
    }

    /// Coarse category kept for older consumers
    pub fn category(&self) -> Category {
        match self {
            Self::Question => Category::Question,
            Self::Objection | Self::MarketIntel => Category::ProductIntel,
            Self::HowTo | Self::Insight | Self::Story | Self::Mistake | Self::Decision => {
                Category::Insight
            }
        }
    }
}

impl std::fmt::Display for KnowledgeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Insight,
    Question,
    ProductIntel,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Insight => "insight",
            Self::Question => "question",
            Self::ProductIntel => "product_intel",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "insight" => Some(Self::Insight),
            "question" => Some(Self::Question),
            "product_intel" => Some(Self::ProductIntel),
            _ => None,
        }
    }
}

/// Who actually said it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Speaker {
    #[default]
    Host,
    Participant,
}

impl Speaker {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Host => "host",
            Self::Participant => "participant",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "host" => Some(Self::Host),
            "participant" | "client" | "guest" => Some(Self::Participant),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Actionability {
    ImmediatelyActionable,
    #[default]
    Contextual,
    Theoretical,
}

impl Actionability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ImmediatelyActionable => "immediately_actionable",
            Self::Contextual => "contextual",
            Self::Theoretical => "theoretical",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().replace(['-', ' '], "_").as_str() {
            "immediately_actionable" => Some(Self::ImmediatelyActionable),
            "contextual" => Some(Self::Contextual),
            "theoretical" => Some(Self::Theoretical),
            _ => None,
        }
    }
}

/// One atomic fact, story or question distilled from a transcript
///
/// An entry may exist without an embedding between extraction and storage;
/// stores refuse to persist it in that state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeEntry {
    pub id: String,
    pub owner_id: String,
    #[serde(default)]
    pub team_id: Option<String>,
    #[serde(default)]
    pub profile_id: Option<String>,
    pub category: Category,
    pub knowledge_type: KnowledgeType,
    pub speaker: Speaker,
    /// Name of the person who said it, when known
    #[serde(default)]
    pub speaker_name: Option<String>,
    pub content: String,
    #[serde(default)]
    pub context: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub suggested_topics: Vec<String>,
    /// Canonical topic slugs assigned by normalization
    #[serde(default)]
    pub topics: Vec<String>,
    pub quality_score: u8,
    #[serde(default)]
    pub specificity: bool,
    #[serde(default)]
    pub actionability: Actionability,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    #[serde(default)]
    pub source_transcript_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl KnowledgeEntry {
    pub fn new(
        owner_id: impl Into<String>,
        knowledge_type: KnowledgeType,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            owner_id: owner_id.into(),
            team_id: None,
            profile_id: None,
            category: knowledge_type.category(),
            knowledge_type,
            speaker: Speaker::Host,
            speaker_name: None,
            content: content.into(),
            context: String::new(),
            tags: Vec::new(),
            suggested_topics: Vec::new(),
            topics: Vec::new(),
            quality_score: 3,
            specificity: false,
            actionability: Actionability::default(),
            embedding: None,
            source_transcript_id: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_quality(mut self, score: i64) -> Self {
        self.quality_score = clamp_quality(score);
        self
    }

    pub fn with_speaker(mut self, speaker: Speaker) -> Self {
        self.speaker = speaker;
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = context.into();
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_suggested_topics(mut self, topics: Vec<String>) -> Self {
        self.suggested_topics = topics;
        self
    }

    pub fn with_topics(mut self, topics: Vec<String>) -> Self {
        self.topics = topics;
        self
    }

    pub fn with_team(mut self, team_id: impl Into<String>) -> Self {
        self.team_id = Some(team_id.into());
        self
    }

    pub fn with_profile(mut self, profile_id: impl Into<String>) -> Self {
        self.profile_id = Some(profile_id.into());
        self
    }

    pub fn with_source(mut self, transcript_id: impl Into<String>) -> Self {
        self.source_transcript_id = Some(transcript_id.into());
        self
    }

    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    pub fn is_high_quality(&self) -> bool {
        self.quality_score >= HIGH_QUALITY
    }

    /// Text sent to the embedding provider
    pub fn embedding_text(&self) -> String {
        if self.context.trim().is_empty() {
            self.content.clone()
        } else {
            format!("{}\n\n{}", self.content, self.context)
        }
    }
}

/// Clamp an arbitrary score into the valid quality range
pub fn clamp_quality(score: i64) -> u8 {
    score.clamp(MIN_QUALITY as i64, MAX_QUALITY as i64) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_parse_is_lenient() {
        assert_eq!(KnowledgeType::parse("how-to"), Some(KnowledgeType::HowTo));
        assert_eq!(KnowledgeType::parse("Market Intel"), Some(KnowledgeType::MarketIntel));
        assert_eq!(KnowledgeType::parse("opinion"), None);
        for t in KnowledgeType::ALL {
            assert_eq!(KnowledgeType::parse(t.as_str()), Some(t));
        }
    }

    #[test]
    fn test_category_follows_type() {
        assert_eq!(KnowledgeType::Question.category(), Category::Question);
        assert_eq!(KnowledgeType::MarketIntel.category(), Category::ProductIntel);
        assert_eq!(KnowledgeType::Story.category(), Category::Insight);

        let entry = KnowledgeEntry::new("owner", KnowledgeType::Objection, "Too expensive");
        assert_eq!(entry.category, Category::ProductIntel);
    }

    #[test]
    fn test_quality_is_clamped() {
        assert_eq!(clamp_quality(0), 1);
        assert_eq!(clamp_quality(9), 5);
        assert_eq!(clamp_quality(3), 3);

        let entry = KnowledgeEntry::new("o", KnowledgeType::Insight, "x").with_quality(-2);
        assert_eq!(entry.quality_score, 1);
        assert!(!entry.is_high_quality());
        assert!(entry.with_quality(4).is_high_quality());
    }

    #[test]
    fn test_speaker_aliases() {
        assert_eq!(Speaker::parse("Client"), Some(Speaker::Participant));
        assert_eq!(Speaker::parse("host"), Some(Speaker::Host));
        assert_eq!(Speaker::parse("narrator"), None);
    }

    #[test]
    fn test_serde_round_trip_omits_missing_embedding() {
        let entry = KnowledgeEntry::new("o", KnowledgeType::HowTo, "Send the follow-up within 24h")
            .with_context("Discussing cold outreach");
        let json = serde_json::to_string(&entry).unwrap();
        assert!(!json.contains("embedding"));
        assert!(json.contains("\"knowledge_type\":\"how_to\""));

        let parsed: KnowledgeEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, entry);
    }

    #[test]
    fn test_embedding_text() {
        let bare = KnowledgeEntry::new("o", KnowledgeType::Insight, "Content");
        assert_eq!(bare.embedding_text(), "Content");
        let with_context = bare.with_context("Context");
        assert_eq!(with_context.embedding_text(), "Content\n\nContext");
    }
}
