//! # SQLite Collection
//!
//! A `Collection` stored as rows of the shared `documents` table.
//!
//! ## Write Path
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  update("P1", fields, unset, upsert)                                    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐    │
//! │  │                   SINGLE TRANSACTION                            │    │
//! │  │  1. SELECT body FROM documents WHERE collection = ? AND id = ?  │    │
//! │  │  2. apply set/unset in memory                                   │    │
//! │  │  3. UPDATE (or INSERT when upserting)                           │    │
//! │  └─────────────────────────────────────────────────────────────────┘    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  COMMIT, connection released                                            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ChangeHooks fire (listeners may write other collections)               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use denorm_core::{
    ChangeHooks, ChangeListener, Collection, DocId, Document, Query, StorageError, StorageResult,
};
use sqlx::SqlitePool;
use tracing::trace;
use uuid::Uuid;

use crate::error::{DbError, DbResult};

/// One named collection inside the document table.
///
/// Obtain handles through [`Database::collection`](crate::Database::collection).
#[derive(Debug)]
pub struct SqliteCollection {
    name: String,
    pool: SqlitePool,
    hooks: ChangeHooks,
}

impl SqliteCollection {
    pub(crate) fn new(name: &str, pool: SqlitePool) -> Self {
        SqliteCollection {
            name: name.to_string(),
            pool,
            hooks: ChangeHooks::new(),
        }
    }

    /// Number of stored documents.
    pub async fn count(&self) -> DbResult<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents WHERE collection = ?1")
            .bind(&self.name)
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }

    fn decode(&self, id: &str, body: &str) -> DbResult<Document> {
        let value: serde_json::Value =
            serde_json::from_str(body).map_err(|e| DbError::corrupt(&self.name, id, e))?;
        Document::from_value(value)
            .ok_or_else(|| DbError::corrupt(&self.name, id, "body is not a JSON object"))
    }

    fn encode(&self, doc: &Document) -> DbResult<String> {
        serde_json::to_string(doc).map_err(|e| DbError::Internal(e.to_string()))
    }

    async fn fetch(&self, id: &str) -> DbResult<Option<Document>> {
        let body: Option<String> =
            sqlx::query_scalar("SELECT body FROM documents WHERE collection = ?1 AND id = ?2")
                .bind(&self.name)
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        body.map(|body| self.decode(id, &body)).transpose()
    }

    async fn fetch_all(&self) -> DbResult<Vec<Document>> {
        let rows: Vec<(String, String)> =
            sqlx::query_as("SELECT id, body FROM documents WHERE collection = ?1 ORDER BY id")
                .bind(&self.name)
                .fetch_all(&self.pool)
                .await?;
        rows.iter()
            .map(|(id, body)| self.decode(id, body))
            .collect()
    }

    /// Returns false when the id is already taken.
    async fn insert_row(&self, id: &str, doc: &Document) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO documents (collection, id, body, updated_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT (collection, id) DO NOTHING
            "#,
        )
        .bind(&self.name)
        .bind(id)
        .bind(self.encode(doc)?)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Read-modify-write in one transaction.
    ///
    /// Returns the new document and, unless it was created, the previous one.
    async fn update_row(
        &self,
        id: &str,
        fields: &Document,
        unset: &[String],
        upsert: bool,
    ) -> DbResult<Option<(Document, Option<Document>)>> {
        let mut tx = self.pool.begin().await?;

        let body: Option<String> =
            sqlx::query_scalar("SELECT body FROM documents WHERE collection = ?1 AND id = ?2")
                .bind(&self.name)
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;

        let outcome = match body {
            Some(body) => {
                let previous = self.decode(id, &body)?;
                let mut doc = previous.clone();
                doc.apply_update(fields, unset);
                sqlx::query(
                    "UPDATE documents SET body = ?3, updated_at = ?4 WHERE collection = ?1 AND id = ?2",
                )
                .bind(&self.name)
                .bind(id)
                .bind(self.encode(&doc)?)
                .bind(Utc::now())
                .execute(&mut *tx)
                .await?;
                Some((doc, Some(previous)))
            }
            None if upsert => {
                let mut doc = Document::with_id(id);
                doc.merge(fields);
                sqlx::query(
                    "INSERT INTO documents (collection, id, body, updated_at) VALUES (?1, ?2, ?3, ?4)",
                )
                .bind(&self.name)
                .bind(id)
                .bind(self.encode(&doc)?)
                .bind(Utc::now())
                .execute(&mut *tx)
                .await?;
                Some((doc, None))
            }
            None => None,
        };

        tx.commit().await?;
        Ok(outcome)
    }

    async fn delete_row(&self, id: &str) -> DbResult<Option<Document>> {
        let mut tx = self.pool.begin().await?;

        let body: Option<String> = sqlx::query_scalar(
            "DELETE FROM documents WHERE collection = ?1 AND id = ?2 RETURNING body",
        )
        .bind(&self.name)
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

        tx.commit().await?;
        body.map(|body| self.decode(id, &body)).transpose()
    }

    async fn delete_all(&self) -> DbResult<Vec<Document>> {
        let mut tx = self.pool.begin().await?;

        let rows: Vec<(String, String)> =
            sqlx::query_as("SELECT id, body FROM documents WHERE collection = ?1 ORDER BY id")
                .bind(&self.name)
                .fetch_all(&mut *tx)
                .await?;
        sqlx::query("DELETE FROM documents WHERE collection = ?1")
            .bind(&self.name)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        rows.iter()
            .map(|(id, body)| self.decode(id, body))
            .collect()
    }
}

#[async_trait]
impl Collection for SqliteCollection {
    fn name(&self) -> &str {
        &self.name
    }

    async fn find_one(&self, id: &str) -> StorageResult<Option<Document>> {
        Ok(self.fetch(id).await?)
    }

    async fn find(&self, query: &Query) -> StorageResult<Vec<Document>> {
        let docs = self.fetch_all().await?;
        Ok(docs.into_iter().filter(|doc| query.matches(doc)).collect())
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

        if !self.insert_row(&id, &doc).await? {
            return Err(StorageError::DuplicateId {
                collection: self.name.clone(),
                id,
            });
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
        let Some((doc, previous)) = self.update_row(id, &fields, unset, upsert).await? else {
            return Ok(0);
        };

        trace!(collection = %self.name, id = %id, upserted = previous.is_none(), "update");
        match previous {
            Some(previous) => self.hooks.fire_update(user_id, &doc, &previous).await?,
            None => self.hooks.fire_insert(user_id, &doc).await?,
        }
        Ok(1)
    }

    async fn remove(&self, id: &str, user_id: Option<&str>) -> StorageResult<u64> {
        match self.delete_row(id).await? {
            Some(doc) => {
                trace!(collection = %self.name, id = %id, "remove");
                self.hooks.fire_remove(user_id, &doc).await?;
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn remove_all(&self, user_id: Option<&str>) -> StorageResult<u64> {
        let removed = self.delete_all().await?;
        for doc in &removed {
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
