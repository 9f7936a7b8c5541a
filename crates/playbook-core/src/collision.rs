//! Same-day topical collision detection for scheduled posts
//!
//! A soft nudge: every failure resolves to "no collision".

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use chrono::NaiveDate;
use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::llm::{CompletionProvider, parse_json_response};
use crate::prompts::{PromptId, PromptRegistry};

/// Characters of each post shown to the model
pub const PREVIEW_CHARS: usize = 300;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledPost {
    pub id: String,
    pub author: String,
    pub content: String,
    pub scheduled_date: NaiveDate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    High,
    Medium,
    Low,
}

impl Severity {
    /// Unknown values read as medium
    pub fn parse_lenient(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "high" => Self::High,
            "low" => Self::Low,
            _ => Self::Medium,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Collision {
    pub post_a_id: String,
    pub post_b_id: String,
    pub scheduled_date: NaiveDate,
    pub overlap_description: String,
    pub severity: Severity,
    pub suggestion: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CollisionReport {
    pub has_collision: bool,
    pub collisions: Vec<Collision>,
}

impl CollisionReport {
    pub fn none() -> Self {
        Self {
            has_collision: false,
            collisions: Vec::new(),
        }
    }

    fn from_collisions(collisions: Vec<Collision>) -> Self {
        Self {
            has_collision: !collisions.is_empty(),
            collisions,
        }
    }
}

/// Dates with at least two posts from at least two different authors
pub fn group_candidates(posts: &[ScheduledPost]) -> BTreeMap<NaiveDate, Vec<&ScheduledPost>> {
    let mut groups: BTreeMap<NaiveDate, Vec<&ScheduledPost>> = BTreeMap::new();
    for post in posts {
        groups.entry(post.scheduled_date).or_default().push(post);
    }
    groups.retain(|_, group| {
        let authors: HashSet<&str> = group.iter().map(|p| p.author.as_str()).collect();
        group.len() >= 2 && authors.len() >= 2
    });
    groups
}

#[derive(Clone)]
pub struct CollisionDetector {
    provider: Arc<dyn CompletionProvider>,
    prompts: Arc<PromptRegistry>,
}

impl CollisionDetector {
    pub fn new(provider: Arc<dyn CompletionProvider>, prompts: Arc<PromptRegistry>) -> Self {
        Self { provider, prompts }
    }

    /// Flag same-day overlap between different authors' posts
    pub async fn detect_collisions(&self, posts: &[ScheduledPost]) -> CollisionReport {
        if posts.len() < 2 {
            return CollisionReport::none();
        }

        let groups = group_candidates(posts);
        if groups.is_empty() {
            debug!(posts = posts.len(), "No dates with posts from multiple authors");
            return CollisionReport::none();
        }

        let checks = groups
            .iter()
            .map(|(date, group)| self.check_date(*date, group));
        let collisions: Vec<Collision> = join_all(checks).await.into_iter().flatten().collect();

        if !collisions.is_empty() {
            info!(collisions = collisions.len(), "Scheduled post collisions found");
        }
        CollisionReport::from_collisions(collisions)
    }

    async fn check_date(&self, date: NaiveDate, group: &[&ScheduledPost]) -> Vec<Collision> {
        match self.ask_provider(date, group).await {
            Ok(collisions) => collisions,
            Err(e) => {
                warn!(date = %date, error = %e, "Collision check failed, assuming none");
                Vec::new()
            }
        }
    }

    async fn ask_provider(&self, date: NaiveDate, group: &[&ScheduledPost]) -> Result<Vec<Collision>> {
        let posts_text = group
            .iter()
            .map(|p| {
                let preview: String = p.content.chars().take(PREVIEW_CHARS).collect();
                format!("[{}] by {}:\n{}", p.id, p.author, preview.trim())
            })
            .collect::<Vec<_>>()
            .join("\n\n");
        let date_text = date.to_string();

        let request = self.prompts.get_prompt(PromptId::DetectCollisions)?.request(&[
            ("date", date_text.as_str()),
            ("posts", posts_text.as_str()),
        ]);
        let text = self.provider.complete(&request).await?;
        let value: Value = parse_json_response(&text)?;
        validate_collisions(&value, date, group, &text)
    }
}

/// Check the reported shape and keep only pairs of known, distinct authors
fn validate_collisions(
    value: &Value,
    date: NaiveDate,
    group: &[&ScheduledPost],
    raw: &str,
) -> Result<Vec<Collision>> {
    let has_collision = value
        .get("has_collision")
        .and_then(Value::as_bool)
        .ok_or_else(|| Error::invalid_response("has_collision must be a boolean", raw))?;
    let items = value
        .get("collisions")
        .and_then(Value::as_array)
        .ok_or_else(|| Error::invalid_response("collisions must be an array", raw))?;

    if !has_collision {
        return Ok(Vec::new());
    }

    let authors: HashMap<&str, &str> = group
        .iter()
        .map(|p| (p.id.as_str(), p.author.as_str()))
        .collect();
    let mut seen: HashSet<(String, String)> = HashSet::new();
    let mut collisions = Vec::new();

    for item in items {
        let field = |name: &str| item.get(name).and_then(Value::as_str).map(str::trim);
        let (Some(a), Some(b)) = (field("post_a_id"), field("post_b_id")) else {
            return Err(Error::invalid_response("collision is missing post ids", raw));
        };

        let (Some(author_a), Some(author_b)) = (authors.get(a), authors.get(b)) else {
            debug!(post_a = %a, post_b = %b, "Collision names an unknown post");
            continue;
        };
        if author_a == author_b {
            continue;
        }

        let key = if a < b {
            (a.to_string(), b.to_string())
        } else {
            (b.to_string(), a.to_string())
        };
        if !seen.insert(key) {
            continue;
        }

        collisions.push(Collision {
            post_a_id: a.to_string(),
            post_b_id: b.to_string(),
            scheduled_date: date,
            overlap_description: field("overlap_description").unwrap_or_default().to_string(),
            severity: Severity::parse_lenient(field("severity").unwrap_or_default()),
            suggestion: field("suggestion").unwrap_or_default().to_string(),
        });
    }

    Ok(collisions)
}
