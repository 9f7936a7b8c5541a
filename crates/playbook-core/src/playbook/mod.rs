//! Playbook synchronization
//!
//! - [`SopClassifier`]: enrich, redundant or tangential for one document
//! - [`SopEditGenerator`]: merged insert-only edits for one section
//! - [`KnowledgeFormatter`]: reference and FAQ blocks
//! - [`SopCreator`]: new documents from orphan clusters

mod classifier;
mod creator;
mod editor;
mod formatter;

pub use classifier::{SopAction, SopClassification, SopClassifier, parse_classification};
pub use creator::{
    MIN_CLUSTER_SIZE, NewSopDocument, OrphanCluster, PlaybookModule, SopCreator, next_sequence,
    sop_filename,
};
pub use editor::{SopEdit, SopEditGenerator, count_occurrences, escape_template_syntax};
pub use formatter::{KnowledgeFormatter, clean_markdown_block};
