//! Insert-only SOP edits
//!
//! An edit names an anchor that must occur exactly once in the current
//! document. Applying it inserts new content directly after the anchor and
//! leaves every existing byte in place.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::knowledge::KnowledgeEntry;
use crate::llm::{CompletionProvider, parse_json_response};
use crate::prompts::{PromptId, PromptRegistry};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SopEdit {
    /// Exact substring of the document the content goes after
    pub insert_after: String,
    pub new_content: String,
    pub summary: String,
}

impl SopEdit {
    /// Byte offset just past the anchor, if it occurs exactly once
    pub fn locate(&self, document: &str, doc_title: &str) -> Result<usize> {
        if self.insert_after.is_empty() {
            return Err(Error::AnchorNotFound(doc_title.to_string()));
        }
        match count_occurrences(document, &self.insert_after) {
            0 => Err(Error::AnchorNotFound(doc_title.to_string())),
            1 => document
                .find(&self.insert_after)
                .map(|start| start + self.insert_after.len())
                .ok_or_else(|| Error::AnchorNotFound(doc_title.to_string())),
            n => Err(Error::AmbiguousAnchor(doc_title.to_string(), n)),
        }
    }

    /// The document with `new_content` inserted after the anchor
    pub fn apply(&self, document: &str, doc_title: &str) -> Result<String> {
        let at = self.locate(document, doc_title)?;
        let mut updated = String::with_capacity(document.len() + self.new_content.len());
        updated.push_str(&document[..at]);
        updated.push_str(&self.new_content);
        updated.push_str(&document[at..]);
        Ok(updated)
    }
}

/// Occurrences of `needle` in `haystack`, overlapping matches included
pub fn count_occurrences(haystack: &str, needle: &str) -> usize {
    if needle.is_empty() {
        return 0;
    }
    let mut count = 0;
    let mut from = 0;
    while let Some(pos) = haystack[from..].find(needle) {
        count += 1;
        let start = from + pos;
        // Advance one character so overlapping anchors are counted
        from = start + haystack[start..].chars().next().map_or(1, char::len_utf8);
    }
    count
}

/// Escape templating delimiters so downstream engines render them literally
pub fn escape_template_syntax(text: &str) -> String {
    text.replace("{{", "&#123;&#123;")
        .replace("}}", "&#125;&#125;")
        .replace("{%", "&#123;%")
        .replace("%}", "%&#125;")
}

/// Render entries as a numbered list for merge prompts
pub(crate) fn format_entries(entries: &[KnowledgeEntry]) -> String {
    entries
        .iter()
        .enumerate()
        .map(|(i, e)| {
            let mut line = format!("{}. [{}] {}", i + 1, e.knowledge_type, e.content.trim());
            if !e.context.trim().is_empty() {
                line.push_str(&format!("\n   Context: {}", e.context.trim()));
            }
            line
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[derive(Debug, Deserialize)]
struct RawEdit {
    insert_after: String,
    new_content: String,
    #[serde(default)]
    summary: String,
}

#[derive(Clone)]
pub struct SopEditGenerator {
    provider: Arc<dyn CompletionProvider>,
    prompts: Arc<PromptRegistry>,
}

impl SopEditGenerator {
    pub fn new(provider: Arc<dyn CompletionProvider>, prompts: Arc<PromptRegistry>) -> Self {
        Self { provider, prompts }
    }

    /// Merge entries for one section into a single insertion
    ///
    /// The returned edit is guaranteed to apply cleanly to `doc_text`.
    pub async fn generate_edit(
        &self,
        entries: &[KnowledgeEntry],
        doc_text: &str,
        doc_title: &str,
        section: &str,
    ) -> Result<SopEdit> {
        if entries.is_empty() {
            return Err(Error::InvalidInput("No entries to merge".into()));
        }

        let entries_text = format_entries(entries);
        let request = self.prompts.get_prompt(PromptId::GenerateSopEdit)?.request(&[
            ("section", section),
            ("doc_title", doc_title),
            ("entries", entries_text.as_str()),
            ("document", doc_text),
        ]);

        let text = self.provider.complete(&request).await?;
        let raw: RawEdit = parse_json_response(&text)?;

        let mut new_content = escape_template_syntax(raw.new_content.trim_end());
        if new_content.trim().is_empty() {
            return Err(Error::invalid_response("new_content is empty", &text));
        }
        if !new_content.starts_with('\n') {
            new_content.insert(0, '\n');
        }

        let edit = SopEdit {
            insert_after: raw.insert_after,
            new_content,
            summary: raw.summary.trim().to_string(),
        };
        edit.locate(doc_text, doc_title)?;

        debug!(doc_title = %doc_title, section = %section, "Anchor located");
        info!(
            doc_title = %doc_title,
            section = %section,
            merged_entries = entries.len(),
            "SOP edit generated"
        );
        Ok(edit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = "# Discovery Calls\n\n## Steps\n1. Open with the agenda.\n2. Ask about budget.\n\n## Notes\nKeep it short.\n";

    fn edit(anchor: &str, content: &str) -> SopEdit {
        SopEdit {
            insert_after: anchor.to_string(),
            new_content: content.to_string(),
            summary: String::new(),
        }
    }

    #[test]
    fn test_apply_inserts_without_touching_existing_text() {
        let anchor = "2. Ask about budget.";
        let e = edit(anchor, "\n3. Confirm the decision maker.");
        let updated = e.apply(DOC, "Discovery Calls").unwrap();

        assert_eq!(
            updated,
            DOC.replacen(anchor, &format!("{}{}", anchor, e.new_content), 1)
        );
        let at = DOC.find(anchor).unwrap() + anchor.len();
        assert!(updated.starts_with(&DOC[..at]));
        assert!(updated.ends_with(&DOC[at..]));
        assert_eq!(updated.len(), DOC.len() + e.new_content.len());
    }

    #[test]
    fn test_missing_anchor() {
        let err = edit("3. Close.", "\nx").apply(DOC, "Discovery Calls").unwrap_err();
        assert!(matches!(err, Error::AnchorNotFound(_)));
        assert!(matches!(
            edit("", "\nx").apply(DOC, "Discovery Calls").unwrap_err(),
            Error::AnchorNotFound(_)
        ));
    }

    #[test]
    fn test_ambiguous_anchor() {
        let err = edit("## ", "\nx").apply(DOC, "Discovery Calls").unwrap_err();
        assert!(matches!(err, Error::AmbiguousAnchor(_, 2)));
    }

    #[test]
    fn test_overlapping_occurrences_count() {
        assert_eq!(count_occurrences("aaa", "aa"), 2);
        assert_eq!(count_occurrences("abc", "d"), 0);
        assert_eq!(count_occurrences("héhé", "hé"), 2);
    }

    #[test]
    fn test_escape_template_syntax() {
        assert_eq!(
            escape_template_syntax("Hi {{name}}, {% if x %}ok{% endif %}"),
            "Hi &#123;&#123;name&#125;&#125;, &#123;% if x %&#125;ok&#123;% endif %&#125;"
        );
        assert_eq!(escape_template_syntax("plain {single}"), "plain {single}");
    }
}
