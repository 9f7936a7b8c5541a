//! Best-effort usage counters
//!
//! Increments are spawned onto the runtime and never awaited by the caller.
//! A lost increment is acceptable; a failed one is logged and dropped.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::store::KnowledgeStore;

#[derive(Clone)]
pub struct UsageRecorder {
    store: Arc<dyn KnowledgeStore>,
}

impl UsageRecorder {
    pub fn new(store: Arc<dyn KnowledgeStore>) -> Self {
        Self { store }
    }

    /// Queue a template usage increment
    ///
    /// Returns the spawned task handle, or `None` when no runtime is running.
    pub fn record_template_use(&self, template_id: &str) -> Option<JoinHandle<()>> {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!(template_id = %template_id, "No runtime available, template usage not recorded");
            return None;
        };

        let store = Arc::clone(&self.store);
        let template_id = template_id.to_string();
        Some(handle.spawn(async move {
            match store.increment_template_usage(&template_id).await {
                Ok(()) => debug!(template_id = %template_id, "Template usage incremented"),
                Err(e) => warn!(template_id = %template_id, error = %e, "Template usage increment failed"),
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::Template;
    use crate::store::InMemoryKnowledgeStore;

    #[tokio::test]
    async fn test_increment_is_applied() {
        let store = Arc::new(InMemoryKnowledgeStore::new());
        let template = Template::new("T", "c", "s").with_embedding(vec![1.0]);
        store.save_template(&template).await.unwrap();

        let recorder = UsageRecorder::new(store.clone());
        recorder.record_template_use(&template.id).unwrap().await.unwrap();

        assert_eq!(store.get_template(&template.id).await.unwrap().usage_count, 1);
    }

    #[tokio::test]
    async fn test_failed_increment_is_swallowed() {
        let recorder = UsageRecorder::new(Arc::new(InMemoryKnowledgeStore::new()));
        let handle = recorder.record_template_use("missing").unwrap();
        assert!(handle.await.is_ok());
    }

    #[test]
    fn test_no_runtime_is_tolerated() {
        let recorder = UsageRecorder::new(Arc::new(InMemoryKnowledgeStore::new()));
        assert!(recorder.record_template_use("any").is_none());
    }
}
