//! # In-Memory Collection
//!
//! A `Collection` backed by an ordered map. Used by tests and by callers that
//! keep their data in process.
//!
//! The map lock is never held while listeners run: listeners read other
//! collections and write views, possibly this one.

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use denorm_core::{
    ChangeHooks, ChangeListener, Collection, DocId, Document, Query, StorageError, StorageResult,
};
use tracing::trace;
use uuid::Uuid;

/// Documents of one collection, ordered by `_id`.
#[derive(Debug)]
pub struct MemoryCollection {
    name: String,
    docs: RwLock<BTreeMap<DocId, Document>>,
    hooks: ChangeHooks,
}

impl MemoryCollection {
    pub fn new(name: impl Into<String>) -> Self {
        MemoryCollection {
            name: name.into(),
            docs: RwLock::new(BTreeMap::new()),
            hooks: ChangeHooks::new(),
        }
    }

    /// Creates a collection already wrapped for sharing.
    pub fn shared(name: impl Into<String>) -> Arc<Self> {
        Arc::new(MemoryCollection::new(name))
    }

    pub fn len(&self) -> usize {
        self.docs.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of every document, ordered by `_id`.
    pub fn documents(&self) -> Vec<Document> {
        self.docs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }
}

#[async_trait]
impl Collection for MemoryCollection {
    fn name(&self) -> &str {
        &self.name
    }

    async fn find_one(&self, id: &str) -> StorageResult<Option<Document>> {
        Ok(self
            .docs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned())
    }

    async fn find(&self, query: &Query) -> StorageResult<Vec<Document>> {
        Ok(self
            .docs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|doc| query.matches(doc))
            .cloned()
            .collect())
    }

    async fn insert(&self, mut doc: Document, user_id: Option<&str>) -> StorageResult<DocId> {
        let id = match doc.id() {
            Some(id) => id.to_string(),
            None => {
                let id = Uuid::new_v4().to_string();
                doc.set_id(id.clone());
                id
            }
        };

        {
            let mut docs = self.docs.write().unwrap_or_else(PoisonError::into_inner);
            if docs.contains_key(&id) {
                return Err(StorageError::DuplicateId {
                    collection: self.name.clone(),
                    id,
                });
            }
            docs.insert(id.clone(), doc.clone());
        }

        trace!(collection = %self.name, id = %id, "insert");
        self.hooks.fire_insert(user_id, &doc).await?;
        Ok(id)
    }

    async fn update(
        &self,
        id: &str,
        fields: Document,
        unset: &[String],
        upsert: bool,
        user_id: Option<&str>,
    ) -> StorageResult<u64> {
        let (doc, previous) = {
            let mut docs = self.docs.write().unwrap_or_else(PoisonError::into_inner);
            match docs.get_mut(id) {
                Some(existing) => {
                    let previous = existing.clone();
                    existing.apply_update(&fields, unset);
                    (existing.clone(), Some(previous))
                }
                None if upsert => {
                    let mut created = Document::with_id(id);
                    created.merge(&fields);
                    docs.insert(id.to_string(), created.clone());
                    (created, None)
                }
                None => return Ok(0),
            }
        };

        trace!(collection = %self.name, id = %id, upserted = previous.is_none(), "update");
        match previous {
            Some(previous) => self.hooks.fire_update(user_id, &doc, &previous).await?,
            None => self.hooks.fire_insert(user_id, &doc).await?,
        }
        Ok(1)
    }

    async fn remove(&self, id: &str, user_id: Option<&str>) -> StorageResult<u64> {
        let removed = self
            .docs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id);

        match removed {
            Some(doc) => {
                trace!(collection = %self.name, id = %id, "remove");
                self.hooks.fire_remove(user_id, &doc).await?;
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn remove_all(&self, user_id: Option<&str>) -> StorageResult<u64> {
        let removed = std::mem::take(&mut *self.docs.write().unwrap_or_else(PoisonError::into_inner));

        for doc in removed.values() {
            self.hooks.fire_remove(user_id, doc).await?;
        }
        Ok(removed.len() as u64)
    }

    fn watch(&self, listener: Arc<dyn ChangeListener>) {
        self.hooks.add(listener);
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
