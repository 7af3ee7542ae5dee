//! # Dependency Propagator
//!
//! Refreshes view documents when a collection they depend on changes.
//!
//! ```text
//! authors.update("A1", {name: "author 1 NEW"})
//!      │
//!      ▼
//! DependencyPropagator (identifier "POSTS")
//!      │  refresh_ids(author, previous, user) ──► ["P1", "P7"]
//!      │  validate shape
//!      ▼
//! for each id: posts.find_one(id) ──► update path ──► posts_view
//! ```
//!
//! The source collection's own listeners never run; nothing is written to it.

use std::sync::Arc;

use async_trait::async_trait;
use denorm_core::{
    validate_refresh_ids, ChangeListener, DependencyBinding, Document, SyncError, SyncResult,
    SyncSpec,
};
use tracing::debug;

use crate::refresh::refresh_documents;
use crate::scheduler::WriteScheduler;

/// Listener installed on a binding's related collection.
pub struct DependencyPropagator {
    spec: Arc<SyncSpec>,
    binding: Arc<DependencyBinding>,
    scheduler: Arc<WriteScheduler>,
}

impl DependencyPropagator {
    pub fn new(
        spec: Arc<SyncSpec>,
        binding: Arc<DependencyBinding>,
        scheduler: Arc<WriteScheduler>,
    ) -> Self {
        DependencyPropagator {
            spec,
            binding,
            scheduler,
        }
    }

    async fn propagate(
        &self,
        doc: &Document,
        previous: Option<&Document>,
        user_id: Option<&str>,
    ) -> SyncResult<()> {
        let result = self
            .binding
            .refresh_ids()
            .resolve(doc, previous, user_id)
            .await
            .map_err(|err| SyncError::Callback {
                identifier: self.spec.identifier().to_string(),
                stage: "refreshIds",
                reason: err.to_string(),
            })?;

        let ids = validate_refresh_ids(self.spec.identifier(), result)?;
        if ids.is_empty() {
            return Ok(());
        }

        debug!(
            identifier = %self.spec.identifier(),
            related = %self.binding.related().name(),
            ids = ?ids,
            "Refreshing dependent view documents"
        );
        refresh_documents(
            &self.spec,
            &self.scheduler,
            self.scheduler.policy(),
            &ids,
            user_id,
            self.binding.on_missing(),
        )
        .await?;
        Ok(())
    }
}

#[async_trait]
impl ChangeListener for DependencyPropagator {
    async fn after_insert(&self, user_id: Option<&str>, doc: &Document) -> SyncResult<()> {
        self.propagate(doc, None, user_id).await
    }

    async fn after_update(
        &self,
        user_id: Option<&str>,
        doc: &Document,
        previous: &Document,
    ) -> SyncResult<()> {
        self.propagate(doc, Some(previous), user_id).await
    }

    async fn after_remove(&self, user_id: Option<&str>, doc: &Document) -> SyncResult<()> {
        self.propagate(doc, None, user_id).await
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use denorm_core::strategy::{computed, refresh_ids_fn};
    use denorm_core::{Collection, StorageError};
    use denorm_db::MemoryCollection;
    use serde_json::json;
    use std::sync::Mutex;

    #[tokio::test]
    async fn test_previous_only_on_update() {
        let posts = MemoryCollection::shared("posts");
        let view = MemoryCollection::shared("posts_view");
        let tags = MemoryCollection::shared("tags");
        let spec = Arc::new(
            SyncSpec::builder("POSTS", posts.clone(), view.clone())
                .sync("n", computed(|_, _| Some(1)))
                .build(),
        );

        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = seen.clone();
        let binding = DependencyBinding::new(
            "POSTS",
            tags.clone(),
            refresh_ids_fn(move |_, previous, _| {
                log.lock().unwrap().push(previous.is_some());
                json!(null)
            }),
        );
        tags.watch(Arc::new(DependencyPropagator::new(
            spec,
            Arc::new(binding),
            Arc::new(WriteScheduler::default()),
        )));

        tags.insert(Document::with_id("T1"), None).await.unwrap();
        tags.update("T1", Document::new().with("x", 1), &[], false, None)
            .await
            .unwrap();
        tags.remove("T1", None).await.unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![false, true, false]);
        assert!(view.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_result_fails_the_related_write() {
        let posts = MemoryCollection::shared("posts");
        let view = MemoryCollection::shared("posts_view");
        let tags = MemoryCollection::shared("tags");
        let spec = Arc::new(
            SyncSpec::builder("POSTS", posts, view)
                .sync("n", computed(|_, _| Some(1)))
                .build(),
        );
        let binding = DependencyBinding::new("POSTS", tags.clone(), refresh_ids_fn(|_, _, _| json!(42)));
        tags.watch(Arc::new(DependencyPropagator::new(
            spec,
            Arc::new(binding),
            Arc::new(WriteScheduler::default()),
        )));

        match tags.insert(Document::with_id("T1"), None).await {
            Err(StorageError::Listener(inner)) => {
                assert!(matches!(*inner, SyncError::InvalidRefreshIdsResult { .. }))
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
