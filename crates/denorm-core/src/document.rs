//! # Document Model
//!
//! Documents flowing through the engine, and the explicit present/absent
//! result of a field computation.
//!
//! ## Identity
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  source document                         view document                  │
//! │  ───────────────                         ─────────────                  │
//! │  { "_id": "P1",          process()       { "_id": "P1",                 │
//! │    "text": "post 1",    ──────────►        "text": "post 1",            │
//! │    "authorId": "A1" }                      "authorId": "A1",            │
//! │                                            "authorCache": {...},        │
//! │                                            "wholeText": "..." }         │
//! │                                                                         │
//! │  The view document ALWAYS carries the source document's `_id`.         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Name of the identity field. It is never computed, picked away or unset.
pub const ID_FIELD: &str = "_id";

/// Identity of a document inside a collection.
pub type DocId = String;

// =============================================================================
// Document
// =============================================================================

/// A JSON object with a string `_id`.
///
/// Field order is preserved, so processing the same source twice yields
/// byte-identical output.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Document(Map<String, Value>);

impl Document {
    /// Creates an empty document without identity.
    pub fn new() -> Self {
        Document(Map::new())
    }

    /// Creates an empty document with the given identity.
    pub fn with_id(id: impl Into<DocId>) -> Self {
        let mut doc = Document::new();
        doc.set_id(id);
        doc
    }

    /// Converts a JSON value into a document; `None` unless it is an object.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Document(map)),
            _ => None,
        }
    }

    /// Returns the identity, if the document has a string `_id`.
    pub fn id(&self) -> Option<&str> {
        self.0.get(ID_FIELD).and_then(Value::as_str)
    }

    /// Sets the identity.
    pub fn set_id(&mut self, id: impl Into<DocId>) {
        self.0.insert(ID_FIELD.to_string(), Value::String(id.into()));
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// Returns a string field.
    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.0.get(field).and_then(Value::as_str)
    }

    /// Sets a field, replacing any previous value.
    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(field.into(), value.into());
    }

    /// Builder flavor of [`Document::set`].
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(field, value);
        self
    }

    /// Removes a field, returning its previous value.
    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.0.shift_remove(field)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    /// Keeps only the listed fields plus the identity.
    pub fn retain_fields<'a>(&mut self, keep: impl IntoIterator<Item = &'a str>) {
        let keep: std::collections::HashSet<&str> = keep.into_iter().collect();
        self.0
            .retain(|field, _| field == ID_FIELD || keep.contains(field.as_str()));
    }

    /// Iterates field names in document order.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Copies every field of `other` into this document, except `_id`.
    pub fn merge(&mut self, other: &Document) {
        for (field, value) in &other.0 {
            if field != ID_FIELD {
                self.0.insert(field.clone(), value.clone());
            }
        }
    }

    /// Applies a set/unset write. The identity never changes.
    pub fn apply_update(&mut self, fields: &Document, unset: &[String]) {
        self.merge(fields);
        for field in unset.iter().filter(|field| *field != ID_FIELD) {
            self.remove(field);
        }
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

impl From<Map<String, Value>> for Document {
    fn from(map: Map<String, Value>) -> Self {
        Document(map)
    }
}

impl From<Document> for Value {
    fn from(doc: Document) -> Self {
        doc.into_value()
    }
}

// =============================================================================
// Field Value
// =============================================================================

/// Result of a field computation.
///
/// ## Why Not `Option<Value>` With Truthiness?
/// ```text
/// computer returns          view document
/// ─────────────────         ───────────────────────────────
/// Present(0)          ───►  field = 0
/// Present([])         ───►  field = []
/// Present({})         ───►  field = {}
/// Present(null)       ───►  field = null
/// Absent              ───►  field removed (explicit unset)
/// ```
/// Legitimate "falsy" values are always written; only `Absent` removes.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Present(Value),
    Absent,
}

impl FieldValue {
    /// Wraps anything convertible to JSON as present.
    pub fn present(value: impl Into<Value>) -> Self {
        FieldValue::Present(value.into())
    }

    pub fn is_present(&self) -> bool {
        matches!(self, FieldValue::Present(_))
    }

    pub fn into_option(self) -> Option<Value> {
        match self {
            FieldValue::Present(value) => Some(value),
            FieldValue::Absent => None,
        }
    }
}

impl From<Value> for FieldValue {
    fn from(value: Value) -> Self {
        FieldValue::Present(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for FieldValue {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(value) => FieldValue::Present(value.into()),
            None => FieldValue::Absent,
        }
    }
}

impl From<Document> for FieldValue {
    fn from(doc: Document) -> Self {
        FieldValue::Present(doc.into_value())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_identity() {
        let doc = Document::with_id("P1").with("text", "post 1");
        assert_eq!(doc.id(), Some("P1"));
        assert_eq!(doc.get_str("text"), Some("post 1"));

        let doc = Document::from_value(json!({ "_id": 7 })).unwrap();
        assert_eq!(doc.id(), None);
        assert!(Document::from_value(json!([1, 2])).is_none());
    }

    #[test]
    fn test_retain_fields_keeps_identity() {
        let mut doc = Document::with_id("P1")
            .with("text", "post 1")
            .with("authorId", "A1")
            .with("secret", true);
        doc.retain_fields(["text"]);
        assert_eq!(doc.fields().collect::<Vec<_>>(), vec!["_id", "text"]);
    }

    #[test]
    fn test_remove_preserves_order() {
        let mut doc = Document::with_id("P1").with("a", 1).with("b", 2).with("c", 3);
        doc.remove("b");
        assert_eq!(doc.fields().collect::<Vec<_>>(), vec!["_id", "a", "c"]);
    }

    #[test]
    fn test_falsy_values_are_present() {
        assert!(FieldValue::from(json!(0)).is_present());
        assert!(FieldValue::from(json!([])).is_present());
        assert!(FieldValue::from(json!({})).is_present());
        assert!(FieldValue::from(Value::Null).is_present());
        assert!(!FieldValue::from(None::<String>).is_present());
        assert_eq!(FieldValue::from(Some("x")), FieldValue::present("x"));
    }

    #[test]
    fn test_merge_skips_identity() {
        let mut target = Document::with_id("P1").with("a", 1);
        let patch = Document::with_id("OTHER").with("a", 2).with("b", 3);
        target.merge(&patch);
        assert_eq!(target.id(), Some("P1"));
        assert_eq!(target.get("a"), Some(&json!(2)));
        assert_eq!(target.get("b"), Some(&json!(3)));
    }

    #[test]
    fn test_apply_update_sets_then_unsets() {
        let mut doc = Document::with_id("P1").with("a", 1).with("b", 2);
        doc.apply_update(
            &Document::new().with("c", 3),
            &["a".to_string(), "_id".to_string()],
        );
        assert_eq!(doc.fields().collect::<Vec<_>>(), vec!["_id", "b", "c"]);
    }
}
