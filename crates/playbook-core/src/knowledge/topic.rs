//! Controlled topic vocabulary

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Canonical vocabulary entry scoping retrieval
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Topic {
    pub owner_id: String,
    /// Unique per owner
    pub slug: String,
    pub display_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub entry_count: u32,
    pub created_at: DateTime<Utc>,
}

impl Topic {
    pub fn new(owner_id: impl Into<String>, slug: impl Into<String>) -> Self {
        let slug = slug.into();
        Self {
            owner_id: owner_id.into(),
            display_name: display_name_from_slug(&slug),
            slug,
            description: String::new(),
            entry_count: 0,
            created_at: Utc::now(),
        }
    }

    /// Fresh topic minted from a normalization candidate
    pub fn from_candidate(owner_id: impl Into<String>, candidate: &TopicCandidate) -> Self {
        Self {
            owner_id: owner_id.into(),
            slug: candidate.slug.clone(),
            display_name: candidate.display_name.clone(),
            description: candidate.description.clone(),
            entry_count: 0,
            created_at: Utc::now(),
        }
    }
}

/// A normalized topic proposed for an entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicCandidate {
    pub slug: String,
    pub display_name: String,
    #[serde(default)]
    pub description: String,
    /// True when the slug is not yet in the owner's vocabulary
    pub is_new: bool,
}

impl TopicCandidate {
    pub fn existing(topic: &Topic) -> Self {
        Self {
            slug: topic.slug.clone(),
            display_name: topic.display_name.clone(),
            description: topic.description.clone(),
            is_new: false,
        }
    }

    pub fn minted(slug: impl Into<String>) -> Self {
        let slug = slug.into();
        Self {
            display_name: display_name_from_slug(&slug),
            slug,
            description: String::new(),
            is_new: true,
        }
    }
}

/// Lowercase, replace runs of non-alphanumerics with one hyphen, trim hyphens
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_hyphen = false;

    for c in text.chars().flat_map(char::to_lowercase) {
        if c.is_alphanumeric() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(c);
        } else {
            pending_hyphen = true;
        }
    }
    slug
}

/// "cold-email" -> "Cold Email"
pub fn display_name_from_slug(slug: &str) -> String {
    slug.split('-')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Whether a string is already in canonical slug form
pub fn is_valid_slug(slug: &str) -> bool {
    !slug.is_empty() && slugify(slug) == slug
}
