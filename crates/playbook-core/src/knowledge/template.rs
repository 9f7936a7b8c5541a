//! Reusable post templates

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Reusable post structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    pub id: String,
    /// `None` for the shared library visible to every owner
    #[serde(default)]
    pub owner_id: Option<String>,
    pub name: String,
    pub category: String,
    /// Text with structural placeholders
    pub structure: String,
    #[serde(default)]
    pub example_posts: Vec<String>,
    #[serde(default)]
    pub use_cases: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub usage_count: u32,
    #[serde(default)]
    pub avg_engagement_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    pub created_at: DateTime<Utc>,
}

impl Template {
    pub fn new(
        name: impl Into<String>,
        category: impl Into<String>,
        structure: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            owner_id: None,
            name: name.into(),
            category: category.into(),
            structure: structure.into(),
            example_posts: Vec::new(),
            use_cases: Vec::new(),
            tags: Vec::new(),
            usage_count: 0,
            avg_engagement_score: None,
            embedding: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_owner(mut self, owner_id: impl Into<String>) -> Self {
        self.owner_id = Some(owner_id.into());
        self
    }

    pub fn with_example(mut self, post: impl Into<String>) -> Self {
        self.example_posts.push(post.into());
        self
    }

    pub fn with_use_case(mut self, use_case: impl Into<String>) -> Self {
        self.use_cases.push(use_case.into());
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    /// Text embedded for similarity matching
    pub fn embedding_text(&self) -> String {
        let mut text = format!("{} ({})", self.name, self.category);
        if !self.use_cases.is_empty() {
            text.push_str("\nUse cases: ");
            text.push_str(&self.use_cases.join("; "));
        }
        if !self.tags.is_empty() {
            text.push_str("\nTags: ");
            text.push_str(&self.tags.join(", "));
        }
        text
    }

    /// Whether an owner may see this template
    pub fn visible_to(&self, owner_id: &str) -> bool {
        self.owner_id.as_deref().is_none_or(|owner| owner == owner_id)
    }
}

/// A template paired with its similarity to a query
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TemplateMatch {
    pub template: Template,
    pub similarity: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_visibility() {
        let shared = Template::new("Hook-Story-Lesson", "story", "{hook}\n{story}\n{lesson}");
        assert!(shared.visible_to("anyone"));

        let private = shared.clone().with_owner("owner-a");
        assert!(private.visible_to("owner-a"));
        assert!(!private.visible_to("owner-b"));
    }

    #[test]
    fn test_embedding_text_includes_use_cases() {
        let template = Template::new("Listicle", "educational", "{n} ways to {goal}")
            .with_use_case("Teaching a process")
            .with_tags(vec!["howto".into()]);
        let text = template.embedding_text();
        assert!(text.starts_with("Listicle (educational)"));
        assert!(text.contains("Teaching a process"));
        assert!(text.contains("howto"));
    }
}
