//! Decides what one knowledge entry means for one SOP document

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::knowledge::KnowledgeEntry;
use crate::llm::{CompletionProvider, parse_json_response};
use crate::prompts::{PromptId, PromptRegistry};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SopAction {
    /// Adds new value to a named section
    Enrich,
    /// Already covered by the document
    Redundant,
    /// Only a semantic near-miss
    Tangential,
}

impl SopAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Enrich => "enrich",
            Self::Redundant => "redundant",
            Self::Tangential => "tangential",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "enrich" => Some(Self::Enrich),
            "redundant" => Some(Self::Redundant),
            "tangential" => Some(Self::Tangential),
            _ => None,
        }
    }
}

impl fmt::Display for SopAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SopClassification {
    pub action: SopAction,
    pub reasoning: String,
    /// Set only when `action` is [`SopAction::Enrich`]
    pub target_section: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawClassification {
    action: String,
    #[serde(default)]
    reasoning: String,
    #[serde(default)]
    target_section: Option<String>,
}

#[derive(Clone)]
pub struct SopClassifier {
    provider: Arc<dyn CompletionProvider>,
    prompts: Arc<PromptRegistry>,
}

impl SopClassifier {
    pub fn new(provider: Arc<dyn CompletionProvider>, prompts: Arc<PromptRegistry>) -> Self {
        Self { provider, prompts }
    }

    /// Classify `entry` against the full text of one document
    ///
    /// Provider and contract failures are returned to the caller.
    pub async fn classify_for_document(
        &self,
        entry: &KnowledgeEntry,
        doc_text: &str,
        doc_title: &str,
    ) -> Result<SopClassification> {
        let request = self.prompts.get_prompt(PromptId::ClassifySop)?.request(&[
            ("doc_title", doc_title),
            ("knowledge_type", entry.knowledge_type.as_str()),
            ("content", entry.content.as_str()),
            ("context", entry.context.as_str()),
            ("document", doc_text),
        ]);

        let text = self.provider.complete(&request).await?;
        let classification = parse_classification(&text)?;

        debug!(
            entry_id = %entry.id,
            doc_title = %doc_title,
            action = %classification.action,
            "Entry classified"
        );
        Ok(classification)
    }
}

/// Parse and enforce the classification contract
pub fn parse_classification(text: &str) -> Result<SopClassification> {
    let raw: RawClassification = parse_json_response(text)?;
    let action = SopAction::parse(&raw.action)
        .ok_or_else(|| Error::invalid_response(format!("unknown action '{}'", raw.action), text))?;

    let target_section = match action {
        SopAction::Enrich => {
            let section = raw
                .target_section
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .ok_or_else(|| Error::invalid_response("enrich requires a target_section", text))?;
            Some(section)
        }
        SopAction::Redundant | SopAction::Tangential => None,
    };

    Ok(SopClassification {
        action,
        reasoning: raw.reasoning.trim().to_string(),
        target_section,
    })
}
