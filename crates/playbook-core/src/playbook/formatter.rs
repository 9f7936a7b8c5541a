//! Reference and FAQ block formatting
//!
//! Product-intel and question entries are merged into plain markdown blocks
//! rather than anchored edits.

use std::sync::Arc;

use serde::Deserialize;
use tracing::debug;

use crate::error::{Error, Result};
use crate::knowledge::KnowledgeEntry;
use crate::llm::{CompletionProvider, parse_json_response};
use crate::prompts::{PromptId, PromptRegistry};

use super::editor::{escape_template_syntax, format_entries};

#[derive(Debug, Deserialize)]
struct Wrapped {
    content: String,
}

#[derive(Clone)]
pub struct KnowledgeFormatter {
    provider: Arc<dyn CompletionProvider>,
    prompts: Arc<PromptRegistry>,
}

impl KnowledgeFormatter {
    pub fn new(provider: Arc<dyn CompletionProvider>, prompts: Arc<PromptRegistry>) -> Self {
        Self { provider, prompts }
    }

    /// Merge product-intel entries into a reference block
    pub async fn format_reference(
        &self,
        entries: &[KnowledgeEntry],
        doc_title: &str,
        section: &str,
    ) -> Result<String> {
        self.format(PromptId::FormatReference, entries, doc_title, section)
            .await
    }

    /// Merge question entries into FAQ pairs, one per distinct question
    pub async fn format_faq(
        &self,
        entries: &[KnowledgeEntry],
        doc_title: &str,
        section: &str,
    ) -> Result<String> {
        self.format(PromptId::FormatFaq, entries, doc_title, section)
            .await
    }

    async fn format(
        &self,
        prompt_id: PromptId,
        entries: &[KnowledgeEntry],
        doc_title: &str,
        section: &str,
    ) -> Result<String> {
        if entries.is_empty() {
            return Err(Error::InvalidInput("No entries to format".into()));
        }

        let entries_text = format_entries(entries);
        let request = self.prompts.get_prompt(prompt_id)?.request(&[
            ("section", section),
            ("doc_title", doc_title),
            ("entries", entries_text.as_str()),
        ]);
        let text = self.provider.complete(&request).await?;

        let block = clean_markdown_block(&text, section);
        if block.is_empty() {
            return Err(Error::invalid_response("formatted block is empty", &text));
        }
        debug!(prompt_id = %prompt_id, doc_title = %doc_title, chars = block.len(), "Block formatted");
        Ok(escape_template_syntax(&block))
    }
}

/// Normalize model output into a bare markdown block
///
/// Unwraps a `{"content": ...}` envelope or a code fence, and drops a leading
/// heading that repeats the section name.
pub fn clean_markdown_block(text: &str, section: &str) -> String {
    let mut body = text.trim().to_string();

    if body.starts_with('{') {
        if let Ok(wrapped) = parse_json_response::<Wrapped>(&body) {
            body = wrapped.content.trim().to_string();
        }
    }

    if body.starts_with("```") {
        let inner = body
            .split_once('\n')
            .map(|(_, rest)| rest)
            .unwrap_or_default();
        let inner = inner.trim_end().strip_suffix("```").unwrap_or(inner);
        body = inner.trim().to_string();
    }

    let first_line = body.lines().next().unwrap_or_default();
    if is_heading_for(first_line, section) {
        body = body[first_line.len()..].trim_start().to_string();
    }

    body.trim().to_string()
}

fn is_heading_for(line: &str, section: &str) -> bool {
    let heading = line.trim();
    if !heading.starts_with('#') {
        return false;
    }
    let wanted = section.trim().trim_start_matches('#').trim();
    heading.trim_start_matches('#').trim().eq_ignore_ascii_case(wanted)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_fence_and_duplicate_heading() {
        let text = "```markdown\n## Pricing Questions\n**Q: Do you offer annual plans?**\nA: Yes.\n```";
        assert_eq!(
            clean_markdown_block(text, "## Pricing Questions"),
            "**Q: Do you offer annual plans?**\nA: Yes."
        );
    }

    #[test]
    fn test_unwraps_json_envelope() {
        let text = r#"{"content": "- Competitor X raised prices by 20%"}"#;
        assert_eq!(
            clean_markdown_block(text, "Market Notes"),
            "- Competitor X raised prices by 20%"
        );
    }

    #[test]
    fn test_keeps_other_headings() {
        let text = "### Integrations\n- Works with HubSpot";
        assert_eq!(clean_markdown_block(text, "Pricing"), text);
    }
}
