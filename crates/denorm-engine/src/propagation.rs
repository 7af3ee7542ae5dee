//! # Change Propagator
//!
//! Keeps one view collection in step with its source collection.
//!
//! ## Event Handling
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  source event        filter     view write                    postHook  │
//! │  ──────────────────  ─────────  ────────────────────────────  ────────  │
//! │  insert              excluded   (none)                        no        │
//! │  insert              included   insert(processed)             yes       │
//! │  update              excluded   remove(id)                    yes       │
//! │  update              included   upsert(processed) + unset     yes       │
//! │  remove              (skipped)  remove(id)                    yes       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Processing runs when the event arrives; only the view write and the
//! post hook go through the [`WriteScheduler`].

use std::sync::Arc;

use async_trait::async_trait;
use denorm_core::{
    ChangeListener, DocId, Document, DocumentProcessor, SyncError, SyncResult, SyncSpec,
};
use futures::FutureExt;
use tracing::debug;

use crate::scheduler::{WritePolicy, WriteScheduler};

/// Returns the document's `_id`.
pub(crate) fn identity(spec: &SyncSpec, doc: &Document) -> SyncResult<DocId> {
    doc.id()
        .map(str::to_string)
        .ok_or_else(|| SyncError::MissingIdentity(spec.source().name().to_string()))
}

/// Runs the spec's post hook on the source document.
async fn run_post_hook(spec: &SyncSpec, doc: &Document, user_id: Option<&str>) -> SyncResult<()> {
    let Some(hook) = spec.post_hook() else {
        return Ok(());
    };
    hook.call(doc, user_id)
        .await
        .map_err(|err| SyncError::Callback {
            identifier: spec.identifier().to_string(),
            stage: "postHook",
            reason: err.to_string(),
        })
}

/// The update path shared by source updates, dependency refreshes and
/// manual refreshes.
///
/// `baseline` is the document the view row was last derived from. Fields it
/// carries that the new processing no longer produces are unset, so the row
/// ends up equal to processing `doc` from scratch.
pub(crate) async fn sync_document(
    spec: &Arc<SyncSpec>,
    scheduler: &WriteScheduler,
    policy: WritePolicy,
    doc: &Document,
    baseline: Option<&Document>,
    user_id: Option<&str>,
) -> SyncResult<()> {
    let id = identity(spec, doc)?;
    let processor = DocumentProcessor::new();
    let user = user_id.map(str::to_string);
    let source_doc = doc.clone();
    let job_spec = spec.clone();

    if !processor.is_included(doc, user_id, spec).await? {
        debug!(identifier = %spec.identifier(), id = %id, %policy, "Removing excluded view document");
        let job = async move {
            job_spec.view().remove(&id, user.as_deref()).await?;
            run_post_hook(&job_spec, &source_doc, user.as_deref()).await
        };
        return scheduler.execute_with(policy, job.boxed()).await;
    }

    let mut processed = processor.process(doc, user_id, spec).await?;
    if let Some(baseline) = baseline {
        processed.unset_dropped_fields(baseline, spec);
    }

    debug!(
        identifier = %spec.identifier(),
        id = %id,
        unset = processed.unset.len(),
        %policy,
        "Upserting view document"
    );
    let job = async move {
        job_spec
            .view()
            .update(&id, processed.doc, &processed.unset, true, user.as_deref())
            .await?;
        run_post_hook(&job_spec, &source_doc, user.as_deref()).await
    };
    scheduler.execute_with(policy, job.boxed()).await
}

// =============================================================================
// Change Propagator
// =============================================================================

/// Listener installed on a spec's source collection.
pub struct ChangePropagator {
    spec: Arc<SyncSpec>,
    scheduler: Arc<WriteScheduler>,
    processor: DocumentProcessor,
}

impl ChangePropagator {
    pub fn new(spec: Arc<SyncSpec>, scheduler: Arc<WriteScheduler>) -> Self {
        ChangePropagator {
            spec,
            scheduler,
            processor: DocumentProcessor::new(),
        }
    }

    pub fn spec(&self) -> &Arc<SyncSpec> {
        &self.spec
    }
}

#[async_trait]
impl ChangeListener for ChangePropagator {
    async fn after_insert(&self, user_id: Option<&str>, doc: &Document) -> SyncResult<()> {
        if !self.processor.is_included(doc, user_id, &self.spec).await? {
            return Ok(());
        }

        let processed = self.processor.process(doc, user_id, &self.spec).await?;
        debug!(
            identifier = %self.spec.identifier(),
            id = processed.id().unwrap_or_default(),
            "Inserting view document"
        );

        let spec = self.spec.clone();
        let source_doc = doc.clone();
        let user = user_id.map(str::to_string);
        let job = async move {
            spec.view().insert(processed.doc, user.as_deref()).await?;
            run_post_hook(&spec, &source_doc, user.as_deref()).await
        };
        self.scheduler.execute(job.boxed()).await
    }

    async fn after_update(
        &self,
        user_id: Option<&str>,
        doc: &Document,
        previous: &Document,
    ) -> SyncResult<()> {
        sync_document(
            &self.spec,
            &self.scheduler,
            self.scheduler.policy(),
            doc,
            Some(previous),
            user_id,
        )
        .await
    }

    async fn after_remove(&self, user_id: Option<&str>, doc: &Document) -> SyncResult<()> {
        let id = identity(&self.spec, doc)?;
        debug!(identifier = %self.spec.identifier(), id = %id, "Removing view document");

        let spec = self.spec.clone();
        let source_doc = doc.clone();
        let user = user_id.map(str::to_string);
        let job = async move {
            spec.view().remove(&id, user.as_deref()).await?;
            run_post_hook(&spec, &source_doc, user.as_deref()).await
        };
        self.scheduler.execute(job.boxed()).await
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use denorm_core::strategy::{computed, filter_fn, post_hook_fn};
    use denorm_core::{Collection, ComputeError, PostHook, StorageError};
    use denorm_db::MemoryCollection;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FailingHook;

    #[async_trait]
    impl PostHook for FailingHook {
        async fn call(&self, _doc: &Document, _user_id: Option<&str>) -> Result<(), ComputeError> {
            Err(ComputeError::new("hook down"))
        }
    }

    fn setup(
        hooks: Arc<AtomicUsize>,
    ) -> (Arc<MemoryCollection>, Arc<MemoryCollection>, Arc<SyncSpec>) {
        let posts = MemoryCollection::shared("posts");
        let view = MemoryCollection::shared("posts_view");
        let spec = SyncSpec::builder("POSTS", posts.clone(), view.clone())
            .sync("shout", computed(|doc, _| doc.get_str("text").map(str::to_uppercase)))
            .filter(filter_fn(|doc, _| doc.get("hidden") != Some(&json!(true))))
            .post_hook(post_hook_fn(move |_, _| {
                hooks.fetch_add(1, Ordering::SeqCst);
            }))
            .build();
        let spec = Arc::new(spec);
        posts.watch(Arc::new(ChangePropagator::new(
            spec.clone(),
            Arc::new(WriteScheduler::default()),
        )));
        (posts, view, spec)
    }

    #[tokio::test]
    async fn test_insert_update_remove() {
        let hooks = Arc::new(AtomicUsize::new(0));
        let (posts, view, _spec) = setup(hooks.clone());

        posts
            .insert(Document::with_id("P1").with("text", "hi"), Some("u1"))
            .await
            .unwrap();
        let row = view.find_one("P1").await.unwrap().unwrap();
        assert_eq!(row.get_str("shout"), Some("HI"));

        posts
            .update("P1", Document::new().with("text", "yo"), &[], false, None)
            .await
            .unwrap();
        assert_eq!(
            view.find_one("P1").await.unwrap().unwrap().get_str("shout"),
            Some("YO")
        );

        posts.remove("P1", None).await.unwrap();
        assert!(view.find_one("P1").await.unwrap().is_none());
        assert_eq!(hooks.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_excluded_insert_writes_nothing() {
        let hooks = Arc::new(AtomicUsize::new(0));
        let (posts, view, _spec) = setup(hooks.clone());

        posts
            .insert(Document::with_id("P1").with("hidden", true), None)
            .await
            .unwrap();
        assert!(view.is_empty());
        assert_eq!(hooks.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_update_unsets_removed_source_fields() {
        let hooks = Arc::new(AtomicUsize::new(0));
        let (posts, view, _spec) = setup(hooks);

        posts
            .insert(Document::with_id("P1").with("text", "hi").with("tag", "x"), None)
            .await
            .unwrap();
        posts
            .update("P1", Document::new(), &["tag".to_string(), "text".to_string()], false, None)
            .await
            .unwrap();

        let row = view.find_one("P1").await.unwrap().unwrap();
        assert_eq!(row.fields().collect::<Vec<_>>(), vec!["_id"]);
    }

    #[tokio::test]
    async fn test_post_hook_failure_reaches_the_writer() {
        let posts = MemoryCollection::shared("posts");
        let view = MemoryCollection::shared("posts_view");
        let spec = SyncSpec::builder("POSTS", posts.clone(), view.clone())
            .sync("n", computed(|_, _| Some(1)))
            .post_hook(Arc::new(FailingHook))
            .build();
        posts.watch(Arc::new(ChangePropagator::new(
            Arc::new(spec),
            Arc::new(WriteScheduler::default()),
        )));

        let err = posts.insert(Document::with_id("P1"), None).await.unwrap_err();
        match err {
            StorageError::Listener(inner) => assert!(matches!(
                *inner,
                SyncError::Callback { stage: "postHook", .. }
            )),
            other => panic!("unexpected error: {other:?}"),
        }
        // The view write happened before the hook.
        assert!(view.find_one("P1").await.unwrap().is_some());
    }
}
