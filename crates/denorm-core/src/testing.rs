//! Collection stub for unit tests that only need collection identity.

use std::sync::Arc;

use async_trait::async_trait;

use crate::collection::{ChangeListener, Collection};
use crate::document::{DocId, Document};
use crate::error::StorageResult;
use crate::query::Query;

pub(crate) struct Named(&'static str);

#[async_trait]
impl Collection for Named {
    fn name(&self) -> &str {
        self.0
    }
    async fn find_one(&self, _id: &str) -> StorageResult<Option<Document>> {
        Ok(None)
    }
    async fn find(&self, _query: &Query) -> StorageResult<Vec<Document>> {
        Ok(Vec::new())
    }
    async fn insert(&self, _doc: Document, _user_id: Option<&str>) -> StorageResult<DocId> {
        Ok(DocId::new())
    }
    async fn update(
        &self,
        _id: &str,
        _fields: Document,
        _unset: &[String],
        _upsert: bool,
        _user_id: Option<&str>,
    ) -> StorageResult<u64> {
        Ok(0)
    }
    async fn remove(&self, _id: &str, _user_id: Option<&str>) -> StorageResult<u64> {
        Ok(0)
    }
    async fn remove_all(&self, _user_id: Option<&str>) -> StorageResult<u64> {
        Ok(0)
    }
    fn watch(&self, _listener: Arc<dyn ChangeListener>) {}
}

pub(crate) fn coll(name: &'static str) -> Arc<dyn Collection> {
    Arc::new(Named(name))
}
