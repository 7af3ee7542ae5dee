//! # Query
//!
//! The minimal selector the engine and its callbacks need from a store:
//! "every document" or "documents whose fields equal these values".

use serde_json::Value;

use crate::document::{Document, ID_FIELD};

/// Field-equality selector. An empty query matches every document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    conditions: Vec<(String, Value)>,
}

impl Query {
    /// Matches every document.
    pub fn all() -> Self {
        Query::default()
    }

    /// Matches documents whose `field` equals `value`.
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Query::all().and_eq(field, value)
    }

    /// Matches the document with the given identity.
    pub fn by_id(id: impl Into<String>) -> Self {
        Query::eq(ID_FIELD, Value::String(id.into()))
    }

    /// Adds another equality condition.
    pub fn and_eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions.push((field.into(), value.into()));
        self
    }

    pub fn is_all(&self) -> bool {
        self.conditions.is_empty()
    }

    /// Returns true if the document satisfies every condition.
    ///
    /// A condition on an array field also matches when the array contains
    /// the value, so `Query::eq("commentIds", "C1")` finds posts referencing C1.
    pub fn matches(&self, doc: &Document) -> bool {
        self.conditions.iter().all(|(field, expected)| match doc.get(field) {
            Some(Value::Array(items)) if !expected.is_array() => items.contains(expected),
            Some(actual) => actual == expected,
            None => expected.is_null(),
        })
    }
}
