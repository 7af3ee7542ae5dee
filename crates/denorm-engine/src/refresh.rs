//! # Refresh Service
//!
//! Re-derives view documents on request instead of on a source event.
//!
//! ## Entry Points
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  refresh_manually(identifier, ids)                                      │
//! │    1. flush deferred writes                                             │
//! │    2. fetch every source doc (missing → MissingSourceDocument, no write)│
//! │    3. update path per id, immediately                                   │
//! │                                                                         │
//! │  refresh_all(identifier)                                                │
//! │    1. flush deferred writes                                             │
//! │    2. view.remove_all()                                                 │
//! │    3. source.find(all) ──► filter ──► process ──► view.insert           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! `refresh_all` is not atomic with respect to concurrent source writes.

use std::sync::Arc;

use denorm_core::{
    DocId, Document, DocumentProcessor, MissingSourcePolicy, Query, SyncError, SyncRegistry,
    SyncResult, SyncSpec,
};
use tracing::{info, warn};

use crate::propagation::sync_document;
use crate::scheduler::{WritePolicy, WriteScheduler};

/// Loads the source document for every id, in order.
///
/// Under [`MissingSourcePolicy::Fail`] the first missing id aborts before
/// anything is written.
async fn load_sources(
    spec: &SyncSpec,
    ids: &[DocId],
    on_missing: MissingSourcePolicy,
) -> SyncResult<Vec<Document>> {
    let mut docs = Vec::with_capacity(ids.len());
    for id in ids {
        match spec.source().find_one(id).await? {
            Some(doc) => docs.push(doc),
            None if on_missing == MissingSourcePolicy::Skip => {
                warn!(
                    identifier = %spec.identifier(),
                    collection = %spec.source().name(),
                    id = %id,
                    "Skipping refresh of missing source document"
                );
            }
            None => {
                return Err(SyncError::MissingSourceDocument {
                    collection: spec.source().name().to_string(),
                    id: id.clone(),
                })
            }
        }
    }
    Ok(docs)
}

/// Runs the update path for each id, using the current view row as baseline.
pub(crate) async fn refresh_documents(
    spec: &Arc<SyncSpec>,
    scheduler: &WriteScheduler,
    policy: WritePolicy,
    ids: &[DocId],
    user_id: Option<&str>,
    on_missing: MissingSourcePolicy,
) -> SyncResult<usize> {
    let docs = load_sources(spec, ids, on_missing).await?;
    for doc in &docs {
        let baseline = match doc.id() {
            Some(id) => spec.view().find_one(id).await?,
            None => None,
        };
        sync_document(spec, scheduler, policy, doc, baseline.as_ref(), user_id).await?;
    }
    Ok(docs.len())
}

/// Manual and full refresh over the registered specs.
pub struct RefreshService {
    registry: Arc<SyncRegistry>,
    scheduler: Arc<WriteScheduler>,
}

impl RefreshService {
    pub fn new(registry: Arc<SyncRegistry>, scheduler: Arc<WriteScheduler>) -> Self {
        RefreshService {
            registry,
            scheduler,
        }
    }

    fn spec(&self, identifier: &str) -> SyncResult<Arc<SyncSpec>> {
        self.registry
            .lookup(identifier)
            .ok_or_else(|| SyncError::UnknownIdentifier(identifier.to_string()))
    }

    /// Re-derives and upserts the view documents of `ids`.
    ///
    /// Writes are immediate regardless of the scheduler's default policy.
    /// Duplicate ids are refreshed once. Returns the number refreshed.
    pub async fn refresh_manually<I, S>(&self, identifier: &str, ids: I) -> SyncResult<usize>
    where
        I: IntoIterator<Item = S>,
        S: Into<DocId>,
    {
        let spec = self.spec(identifier)?;

        let mut unique: Vec<DocId> = Vec::new();
        for id in ids {
            let id = id.into();
            if !unique.contains(&id) {
                unique.push(id);
            }
        }

        self.scheduler.flush().await?;
        let refreshed = refresh_documents(
            &spec,
            &self.scheduler,
            WritePolicy::Immediate,
            &unique,
            None,
            MissingSourcePolicy::Fail,
        )
        .await?;

        info!(identifier = %identifier, refreshed, "Manual refresh complete");
        Ok(refreshed)
    }

    /// Clears the view and rebuilds it from every source document.
    ///
    /// Like [`refresh_manually`](Self::refresh_manually), it flushes deferred
    /// writes first and then always writes immediately, whatever the
    /// scheduler's policy. Post hooks do not run. Returns the number of view
    /// documents written.
    pub async fn refresh_all(&self, identifier: &str) -> SyncResult<u64> {
        let spec = self.spec(identifier)?;
        let processor = DocumentProcessor::new();

        self.scheduler.flush().await?;
        let cleared = spec.view().remove_all(None).await?;

        let mut written = 0u64;
        for doc in spec.source().find(&Query::all()).await? {
            if !processor.is_included(&doc, None, &spec).await? {
                continue;
            }
            let processed = processor.process(&doc, None, &spec).await?;
            spec.view().insert(processed.doc, None).await?;
            written += 1;
        }

        info!(
            identifier = %identifier,
            view = %spec.view().name(),
            cleared,
            written,
            "View rebuilt"
        );
        Ok(written)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
