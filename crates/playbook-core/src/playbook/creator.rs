//! New SOPs from orphan entries
//!
//! Orphans are entries that did not classify into any existing document.
//! Coherent groups of them become new documents inside existing modules.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::knowledge::{KnowledgeEntry, slugify};
use crate::llm::{CompletionProvider, complete_json};
use crate::prompts::{PromptId, PromptRegistry};

use super::editor::{escape_template_syntax, format_entries};

/// Smallest group worth its own document
pub const MIN_CLUSTER_SIZE: usize = 3;

/// An existing playbook module
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaybookModule {
    pub number: u32,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrphanCluster {
    pub entries: Vec<KnowledgeEntry>,
    pub suggested_module: u32,
    pub suggested_title: String,
    pub rationale: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewSopDocument {
    /// `"{module}.{sequence}"`
    pub id: String,
    pub filename: String,
    pub module: u32,
    pub sequence: u32,
    pub title: String,
    pub content: String,
}

#[derive(Debug, Deserialize)]
struct ClusterOutput {
    #[serde(default)]
    clusters: Vec<RawCluster>,
}

#[derive(Debug, Deserialize)]
struct RawCluster {
    entry_ids: Vec<String>,
    module_number: u32,
    title: String,
    #[serde(default)]
    rationale: String,
}

#[derive(Debug, Deserialize)]
struct SopOutput {
    #[serde(default)]
    title: String,
    overview: String,
    steps: Vec<String>,
    #[serde(default)]
    key_lessons: Vec<String>,
    #[serde(default)]
    common_mistakes: Vec<String>,
}

#[derive(Clone)]
pub struct SopCreator {
    provider: Arc<dyn CompletionProvider>,
    prompts: Arc<PromptRegistry>,
}

impl SopCreator {
    pub fn new(provider: Arc<dyn CompletionProvider>, prompts: Arc<PromptRegistry>) -> Self {
        Self { provider, prompts }
    }

    /// Group orphans into clusters of at least three entries
    ///
    /// Proposed clusters that name unknown entries or modules are discarded;
    /// each entry lands in at most one cluster.
    pub async fn cluster_orphans(
        &self,
        entries: &[KnowledgeEntry],
        modules: &[PlaybookModule],
    ) -> Result<Vec<OrphanCluster>> {
        if entries.len() < MIN_CLUSTER_SIZE {
            debug!(orphans = entries.len(), "Too few orphans to cluster");
            return Ok(Vec::new());
        }
        if modules.is_empty() {
            return Err(Error::InvalidInput("No playbook modules to assign clusters to".into()));
        }

        let modules_text = modules
            .iter()
            .map(|m| format!("{}. {}", m.number, m.name))
            .collect::<Vec<_>>()
            .join("\n");
        let entries_text = entries
            .iter()
            .map(|e| format!("[{}] ({}) {}", e.id, e.knowledge_type, e.content.trim()))
            .collect::<Vec<_>>()
            .join("\n");

        let request = self.prompts.get_prompt(PromptId::ClusterOrphans)?.request(&[
            ("modules", modules_text.as_str()),
            ("entries", entries_text.as_str()),
        ]);
        let output: ClusterOutput = complete_json(self.provider.as_ref(), &request).await?;

        let clusters = accept_clusters(output.clusters, entries, modules);
        info!(
            orphans = entries.len(),
            clusters = clusters.len(),
            "Orphan entries clustered"
        );
        Ok(clusters)
    }

    /// Write a complete SOP for one cluster
    pub async fn generate_new_document(
        &self,
        cluster: &OrphanCluster,
        existing_ids: &[String],
        next_number: u32,
    ) -> Result<NewSopDocument> {
        if cluster.entries.is_empty() {
            return Err(Error::InvalidInput("Cluster has no entries".into()));
        }

        let module_text = cluster.suggested_module.to_string();
        let entries_text = format_entries(&cluster.entries);
        let request = self.prompts.get_prompt(PromptId::GenerateSop)?.request(&[
            ("title", cluster.suggested_title.as_str()),
            ("module", module_text.as_str()),
            ("entries", entries_text.as_str()),
        ]);
        let output: SopOutput = complete_json(self.provider.as_ref(), &request).await?;

        if output.overview.trim().is_empty() || output.steps.iter().all(|s| s.trim().is_empty()) {
            return Err(Error::invalid_response(
                format!("SOP '{}' has no overview or steps", cluster.suggested_title),
                "",
            ));
        }

        let title = Some(output.title.trim())
            .filter(|t| !t.is_empty())
            .unwrap_or(cluster.suggested_title.trim())
            .to_string();
        let module = cluster.suggested_module;
        let sequence = next_sequence(module, existing_ids, next_number);
        let id = format!("{}.{}", module, sequence);
        let filename = sop_filename(module, sequence, &title);
        let content = render_sop(&id, &title, &output);

        info!(sop_id = %id, filename = %filename, entries = cluster.entries.len(), "New SOP generated");
        Ok(NewSopDocument {
            id,
            filename,
            module,
            sequence,
            title,
            content,
        })
    }
}

fn accept_clusters(
    raw: Vec<RawCluster>,
    entries: &[KnowledgeEntry],
    modules: &[PlaybookModule],
) -> Vec<OrphanCluster> {
    let by_id: HashMap<&str, &KnowledgeEntry> = entries.iter().map(|e| (e.id.as_str(), e)).collect();
    let module_numbers: HashSet<u32> = modules.iter().map(|m| m.number).collect();
    let mut claimed: HashSet<&str> = HashSet::new();
    let mut clusters = Vec::new();

    for cluster in raw {
        if !module_numbers.contains(&cluster.module_number) {
            warn!(module = cluster.module_number, title = %cluster.title, "Cluster names an unknown module");
            continue;
        }
        if cluster.title.trim().is_empty() {
            continue;
        }

        let mut members = Vec::new();
        for id in &cluster.entry_ids {
            if let Some((key, entry)) = by_id.get_key_value(id.trim()) {
                if claimed.insert(*key) {
                    members.push((*entry).clone());
                }
            }
        }

        if members.len() < MIN_CLUSTER_SIZE {
            debug!(title = %cluster.title, members = members.len(), "Cluster too small after validation");
            for entry in &members {
                claimed.remove(entry.id.as_str());
            }
            continue;
        }

        clusters.push(OrphanCluster {
            entries: members,
            suggested_module: cluster.module_number,
            suggested_title: cluster.title.trim().to_string(),
            rationale: cluster.rationale.trim().to_string(),
        });
    }
    clusters
}

/// Next free sequence number within a module
pub fn next_sequence(module: u32, existing_ids: &[String], next_number: u32) -> u32 {
    let highest = existing_ids
        .iter()
        .filter_map(|id| {
            let (m, s) = id.trim().split_once('.')?;
            (m.parse::<u32>().ok()? == module).then(|| s.parse::<u32>().ok())?
        })
        .max();
    match highest {
        Some(highest) => next_number.max(highest.saturating_add(1)),
        None => next_number.max(1),
    }
}

pub fn sop_filename(module: u32, sequence: u32, title: &str) -> String {
    let slug = slugify(title);
    let slug = if slug.is_empty() { "untitled".to_string() } else { slug };
    format!("sop-{:02}-{:02}-{}.md", module, sequence, slug)
}

fn render_sop(id: &str, title: &str, output: &SopOutput) -> String {
    let mut doc = format!("# {}\n\n**SOP ID:** {}\n\n## Overview\n\n{}\n\n## Steps\n\n", title, id, output.overview.trim());

    for (i, step) in output.steps.iter().map(|s| s.trim()).filter(|s| !s.is_empty()).enumerate() {
        doc.push_str(&format!("{}. {}\n", i + 1, step));
    }

    for (heading, items) in [
        ("Key Lessons", &output.key_lessons),
        ("Common Mistakes", &output.common_mistakes),
    ] {
        doc.push_str(&format!("\n## {}\n\n", heading));
        let items: Vec<&str> = items.iter().map(|s| s.trim()).filter(|s| !s.is_empty()).collect();
        if items.is_empty() {
            doc.push_str("- None recorded yet.\n");
        }
        for item in items {
            doc.push_str(&format!("- {}\n", item));
        }
    }

    escape_template_syntax(&doc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::KnowledgeType;

    fn orphans(n: usize) -> Vec<KnowledgeEntry> {
        (0..n)
            .map(|i| KnowledgeEntry::new("owner", KnowledgeType::HowTo, format!("tip {}", i)))
            .collect()
    }

    fn modules() -> Vec<PlaybookModule> {
        vec![
            PlaybookModule { number: 1, name: "Prospecting".into() },
            PlaybookModule { number: 2, name: "Onboarding".into() },
        ]
    }

    fn raw(ids: Vec<&str>, module_number: u32) -> RawCluster {
        RawCluster {
            entry_ids: ids.into_iter().map(String::from).collect(),
            module_number,
            title: "Referral Asks".into(),
            rationale: String::new(),
        }
    }

    #[test]
    fn test_accept_clusters_validates() {
        let entries = orphans(7);
        let ids: Vec<&str> = entries.iter().map(|e| e.id.as_str()).collect();

        let clusters = accept_clusters(
            vec![
                raw(vec![ids[0], ids[1], ids[2]], 1),
                // Overlaps the first cluster, leaving only two new members
                raw(vec![ids[2], ids[3], ids[4]], 2),
                raw(vec![ids[3], ids[4], ids[5]], 9),
                raw(vec![ids[3], ids[4], "ghost", ids[6]], 2),
            ],
            &entries,
            &modules(),
        );

        assert_eq!(clusters.len(), 2);
        assert_eq!(clusters[0].suggested_module, 1);
        assert_eq!(clusters[1].entries.len(), 3);
        let all: HashSet<&str> = clusters
            .iter()
            .flat_map(|c| c.entries.iter().map(|e| e.id.as_str()))
            .collect();
        assert_eq!(all.len(), 6);
    }

    #[test]
    fn test_next_sequence() {
        let existing = vec!["1.1".to_string(), "1.4".to_string(), "2.9".to_string(), "junk".to_string()];
        assert_eq!(next_sequence(1, &existing, 2), 5);
        assert_eq!(next_sequence(1, &existing, 7), 7);
        assert_eq!(next_sequence(3, &existing, 1), 1);
    }

    #[test]
    fn test_next_sequence_saturates_at_max() {
        let existing = vec![format!("4.{}", u32::MAX)];
        assert_eq!(next_sequence(4, &existing, 1), u32::MAX);
    }

    #[test]
    fn test_filename() {
        assert_eq!(sop_filename(1, 5, "Asking for Referrals"), "sop-01-05-asking-for-referrals.md");
        assert_eq!(sop_filename(12, 3, "!!!"), "sop-12-03-untitled.md");
    }

    #[test]
    fn test_render_has_fixed_sections() {
        let output = SopOutput {
            title: "Referral Asks".into(),
            overview: "When and how to ask for referrals.".into(),
            steps: vec!["Wait for a win".into(), " ".into(), "Ask for one name".into()],
            key_lessons: vec!["Timing beats phrasing".into()],
            common_mistakes: vec![],
        };
        let doc = render_sop("1.5", "Referral Asks", &output);
        assert!(doc.starts_with("# Referral Asks\n\n**SOP ID:** 1.5\n"));
        assert!(doc.contains("## Overview\n"));
        assert!(doc.contains("1. Wait for a win\n2. Ask for one name\n"));
        assert!(doc.contains("## Key Lessons\n\n- Timing beats phrasing\n"));
        assert!(doc.contains("## Common Mistakes\n\n- None recorded yet.\n"));
    }
}
