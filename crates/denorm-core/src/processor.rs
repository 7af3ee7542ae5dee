//! # Document Processor
//!
//! Pure transformation of a raw source document into its view document.
//! Nothing here writes; a failure leaves the view collection untouched.
//!
//! ## Pipeline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  raw source doc                                                         │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  1. sync       for each (field, computer), in declared order            │
//! │                  Present(v) → doc[field] = v                            │
//! │                  Absent     → delete doc[field], record unset           │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  2. postSync   same rules, computers see the sync fields                │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  3. pick       keep pick ∪ sync ∪ postSync ∪ {_id}                      │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ProcessedDoc { doc, unset }                                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::HashSet;

use serde_json::Value;
use tracing::debug;

use crate::document::{DocId, Document, FieldValue, ID_FIELD};
use crate::error::{SyncError, SyncResult};
use crate::spec::{FieldMap, SyncSpec};

/// Output of [`DocumentProcessor::process`].
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessedDoc {
    /// The view document to write.
    pub doc: Document,
    /// Fields to remove from the persisted view document.
    pub unset: Vec<String>,
}

impl ProcessedDoc {
    pub fn id(&self) -> Option<&str> {
        self.doc.id()
    }

    fn mark_unset(&mut self, field: &str) {
        if !self.unset.iter().any(|existing| existing == field) {
            self.unset.push(field.to_string());
        }
    }

    fn clear_unset(&mut self, field: &str) {
        self.unset.retain(|existing| existing != field);
    }

    /// Records an unset for every field of `previous` that the processed
    /// document no longer carries.
    ///
    /// With `pick`, only picked fields are considered; other source fields
    /// never reach the view.
    pub fn unset_dropped_fields(&mut self, previous: &Document, spec: &SyncSpec) {
        let dropped: Vec<String> = previous
            .fields()
            .filter(|field| *field != ID_FIELD && !self.doc.contains(field))
            .filter(|field| match spec.pick() {
                Some(pick) => pick.iter().any(|picked| picked == field),
                None => true,
            })
            .map(str::to_string)
            .collect();
        for field in dropped {
            self.mark_unset(&field);
        }
    }
}

/// Stateless implementation of the processing pipeline.
#[derive(Debug, Clone, Copy, Default)]
pub struct DocumentProcessor;

impl DocumentProcessor {
    pub fn new() -> Self {
        DocumentProcessor
    }

    /// Runs `sync`, `postSync` and `pick` over a copy of `raw`.
    ///
    /// ## Errors
    /// - [`SyncError::InvalidSyncFunction`] if a `sync` computer fails
    /// - [`SyncError::InvalidPostSyncFunction`] if a `postSync` computer fails
    pub async fn process(
        &self,
        raw: &Document,
        user_id: Option<&str>,
        spec: &SyncSpec,
    ) -> SyncResult<ProcessedDoc> {
        let mut processed = ProcessedDoc {
            doc: raw.clone(),
            unset: Vec::new(),
        };

        apply_fields(&mut processed, spec.sync(), user_id, |field, reason| {
            SyncError::InvalidSyncFunction { field, reason }
        })
        .await?;

        if let Some(post_sync) = spec.post_sync() {
            apply_fields(&mut processed, post_sync, user_id, |field, reason| {
                SyncError::InvalidPostSyncFunction { field, reason }
            })
            .await?;
        }

        if let Some(pick) = spec.pick() {
            let keep: HashSet<&str> = pick
                .iter()
                .map(String::as_str)
                .chain(spec.computed_fields())
                .collect();
            processed.doc.retain_fields(keep);
        }

        Ok(processed)
    }

    /// Evaluates the spec's filter.
    ///
    /// Only a result of exactly `false` excludes; a missing filter and every
    /// other value (including `null`, `0` and `""`) include.
    pub async fn is_included(
        &self,
        raw: &Document,
        user_id: Option<&str>,
        spec: &SyncSpec,
    ) -> SyncResult<bool> {
        let Some(filter) = spec.filter() else {
            return Ok(true);
        };

        let verdict = filter
            .evaluate(raw, user_id)
            .await
            .map_err(|err| SyncError::Callback {
                identifier: spec.identifier().to_string(),
                stage: "filter",
                reason: err.to_string(),
            })?;

        let included = verdict != Value::Bool(false);
        if !included {
            debug!(
                identifier = %spec.identifier(),
                id = raw.id().unwrap_or_default(),
                "Filtered out"
            );
        }
        Ok(included)
    }
}

async fn apply_fields(
    processed: &mut ProcessedDoc,
    fields: &FieldMap,
    user_id: Option<&str>,
    on_error: impl Fn(String, String) -> SyncError,
) -> SyncResult<()> {
    for (field, computer) in fields.iter() {
        let value = computer
            .compute(&processed.doc, user_id)
            .await
            .map_err(|err| on_error(field.to_string(), err.to_string()))?;

        match value {
            FieldValue::Present(value) => {
                processed.doc.set(field, value);
                processed.clear_unset(field);
            }
            FieldValue::Absent => {
                processed.doc.remove(field);
                processed.mark_unset(field);
            }
        }
    }
    Ok(())
}

/// Validates the result of a `RefreshIds` callback.
///
/// `null` and `[]` mean nothing to refresh. Otherwise the result must be an
/// array of non-empty strings; duplicates are dropped, keeping the first.
/// No document can have `""` as its id, so `[""]` is rejected instead of
/// being treated as an empty refresh.
pub fn validate_refresh_ids(identifier: &str, result: Value) -> SyncResult<Vec<DocId>> {
    let invalid = |found: &Value| SyncError::InvalidRefreshIdsResult {
        identifier: identifier.to_string(),
        found: found.to_string(),
    };

    let items = match result {
        Value::Null => return Ok(Vec::new()),
        Value::Array(items) => items,
        other => return Err(invalid(&other)),
    };

    let mut ids: Vec<DocId> = Vec::with_capacity(items.len());
    for item in &items {
        match item.as_str() {
            Some(id) if !id.is_empty() => {
                if !ids.iter().any(|seen| seen == id) {
                    ids.push(id.to_string());
                }
            }
            _ => return Err(invalid(&Value::Array(items.clone()))),
        }
    }
    Ok(ids)
}

// =============================================================================
// Unit Tests
// =============================================================================
