//! # Collection Collaborator
//!
//! The storage contract the engine orchestrates around, and the change
//! notification mechanism that drives it.
//!
//! ## Notification Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  application                                                            │
//! │     │  posts.update("P1", {text: ...})                                  │
//! │     ▼                                                                   │
//! │  Collection (MemoryCollection / SqliteCollection)                       │
//! │     │  1. apply write                                                   │
//! │     │  2. ChangeHooks::fire_update(user, doc, previous)                 │
//! │     ▼                                                                   │
//! │  ChangeListener (ChangePropagator / DependencyPropagator)               │
//! │     │  process + write view                                             │
//! │     ▼                                                                   │
//! │  error? ──► StorageError::Listener ──► returned from posts.update()     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;

use crate::document::{DocId, Document};
use crate::error::{StorageError, StorageResult, SyncResult};
use crate::query::Query;

// =============================================================================
// Collection
// =============================================================================

/// A named document collection.
///
/// Two handles refer to the same collection iff their names are equal.
#[async_trait]
pub trait Collection: Send + Sync {
    /// Unique collection name within its store.
    fn name(&self) -> &str;

    /// Fetches one document by identity.
    async fn find_one(&self, id: &str) -> StorageResult<Option<Document>>;

    /// Fetches every matching document, ordered by identity.
    async fn find(&self, query: &Query) -> StorageResult<Vec<Document>>;

    /// Inserts a document, generating an `_id` when it has none.
    ///
    /// Fails with [`StorageError::DuplicateId`] if the id is taken.
    async fn insert(&self, doc: Document, user_id: Option<&str>) -> StorageResult<DocId>;

    /// Sets `fields` and removes `unset` on one document.
    ///
    /// With `upsert`, a missing document is created from `fields`.
    /// Returns the number of documents written (0 or 1).
    async fn update(
        &self,
        id: &str,
        fields: Document,
        unset: &[String],
        upsert: bool,
        user_id: Option<&str>,
    ) -> StorageResult<u64>;

    /// Removes one document. Returns 0 when it did not exist.
    async fn remove(&self, id: &str, user_id: Option<&str>) -> StorageResult<u64>;

    /// Removes every document.
    async fn remove_all(&self, user_id: Option<&str>) -> StorageResult<u64>;

    /// Registers a post-commit change listener.
    fn watch(&self, listener: Arc<dyn ChangeListener>);
}

/// Returns true when both handles name the same collection.
pub fn same_collection(a: &dyn Collection, b: &dyn Collection) -> bool {
    a.name() == b.name()
}

// =============================================================================
// Change Listener
// =============================================================================

/// Post-commit callbacks invoked by a collection after each write.
#[async_trait]
pub trait ChangeListener: Send + Sync {
    async fn after_insert(&self, user_id: Option<&str>, doc: &Document) -> SyncResult<()>;

    async fn after_update(
        &self,
        user_id: Option<&str>,
        doc: &Document,
        previous: &Document,
    ) -> SyncResult<()>;

    async fn after_remove(&self, user_id: Option<&str>, doc: &Document) -> SyncResult<()>;
}

// =============================================================================
// Change Hooks
// =============================================================================

/// Listener bookkeeping shared by every store implementation.
///
/// Listeners run in registration order. The first failure stops the chain
/// and is returned as [`StorageError::Listener`].
#[derive(Default)]
pub struct ChangeHooks {
    listeners: RwLock<Vec<Arc<dyn ChangeListener>>>,
}

impl ChangeHooks {
    pub fn new() -> Self {
        ChangeHooks::default()
    }

    pub fn add(&self, listener: Arc<dyn ChangeListener>) {
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(listener);
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // Cloned so no lock is held while listeners await.
    fn snapshot(&self) -> Vec<Arc<dyn ChangeListener>> {
        self.listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub async fn fire_insert(&self, user_id: Option<&str>, doc: &Document) -> StorageResult<()> {
        for listener in self.snapshot() {
            listener
                .after_insert(user_id, doc)
                .await
                .map_err(StorageError::from)?;
        }
        Ok(())
    }

    pub async fn fire_update(
        &self,
        user_id: Option<&str>,
        doc: &Document,
        previous: &Document,
    ) -> StorageResult<()> {
        for listener in self.snapshot() {
            listener
                .after_update(user_id, doc, previous)
                .await
                .map_err(StorageError::from)?;
        }
        Ok(())
    }

    pub async fn fire_remove(&self, user_id: Option<&str>, doc: &Document) -> StorageResult<()> {
        for listener in self.snapshot() {
            listener
                .after_remove(user_id, doc)
                .await
                .map_err(StorageError::from)?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for ChangeHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeHooks")
            .field("listeners", &self.len())
            .finish()
    }
}
