//! # Synchronization Specs
//!
//! The unit of configuration: which source feeds which view, and how each
//! view field is computed.
//!
//! ## Shape of a Spec
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  SyncSpec "POSTS_VIEW"                                                  │
//! │  ─────────────────────                                                  │
//! │  source    : posts                                                      │
//! │  view      : posts_view                                                 │
//! │  sync      : authorCache   ← authors.find_one(post.authorId)            │
//! │              commentsCache ← comments of post.commentIds                │
//! │  post_sync : wholeText     ← text + commentsCache + authorCache.name    │
//! │  pick      : [text]        (optional; restricts the copied fields)      │
//! │  filter    : published?    (optional; exactly false excludes)           │
//! │  post_hook : audit log     (optional)                                   │
//! │                                                                         │
//! │  DependencyBinding "POSTS_VIEW" ← authors                               │
//! │  refresh_ids: author ─► ids of posts written by that author             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Specs are immutable once built; the registry hands out `Arc<SyncSpec>`.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::collection::Collection;
use crate::strategy::{DocFilter, FieldComputer, PostHook, RefreshIds};

// =============================================================================
// Field Map
// =============================================================================

/// Ordered mapping from view field name to its computer.
#[derive(Clone, Default)]
pub struct FieldMap {
    entries: Vec<(String, Arc<dyn FieldComputer>)>,
}

impl FieldMap {
    pub fn new() -> Self {
        FieldMap::default()
    }

    /// Adds a field. Re-adding a name replaces its computer in place.
    pub fn insert(&mut self, field: impl Into<String>, computer: Arc<dyn FieldComputer>) {
        let field = field.into();
        match self.entries.iter_mut().find(|(name, _)| *name == field) {
            Some(entry) => entry.1 = computer,
            None => self.entries.push((field, computer)),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<dyn FieldComputer>)> {
        self.entries
            .iter()
            .map(|(name, computer)| (name.as_str(), computer))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn contains(&self, field: &str) -> bool {
        self.entries.iter().any(|(name, _)| name == field)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl std::fmt::Debug for FieldMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

// =============================================================================
// Sync Spec
// =============================================================================

/// A registered source → view synchronization.
pub struct SyncSpec {
    identifier: String,
    source: Arc<dyn Collection>,
    view: Arc<dyn Collection>,
    sync: FieldMap,
    post_sync: Option<FieldMap>,
    pick: Option<Vec<String>>,
    filter: Option<Arc<dyn DocFilter>>,
    post_hook: Option<Arc<dyn PostHook>>,
}

impl SyncSpec {
    /// Starts building a spec for the given source/view pair.
    ///
    /// ## Example
    /// ```rust,ignore
    /// let spec = SyncSpec::builder("POSTS_VIEW", posts, posts_view)
    ///     .sync("authorCache", author_lookup)
    ///     .post_sync("wholeText", whole_text)
    ///     .build();
    /// ```
    pub fn builder(
        identifier: impl Into<String>,
        source: Arc<dyn Collection>,
        view: Arc<dyn Collection>,
    ) -> SyncSpecBuilder {
        SyncSpecBuilder {
            spec: SyncSpec {
                identifier: identifier.into(),
                source,
                view,
                sync: FieldMap::new(),
                post_sync: None,
                pick: None,
                filter: None,
                post_hook: None,
            },
        }
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn source(&self) -> &Arc<dyn Collection> {
        &self.source
    }

    pub fn view(&self) -> &Arc<dyn Collection> {
        &self.view
    }

    pub fn sync(&self) -> &FieldMap {
        &self.sync
    }

    pub fn post_sync(&self) -> Option<&FieldMap> {
        self.post_sync.as_ref()
    }

    pub fn pick(&self) -> Option<&[String]> {
        self.pick.as_deref()
    }

    pub fn filter(&self) -> Option<&Arc<dyn DocFilter>> {
        self.filter.as_ref()
    }

    pub fn post_hook(&self) -> Option<&Arc<dyn PostHook>> {
        self.post_hook.as_ref()
    }

    /// Names of every computed field, `sync` first.
    pub fn computed_fields(&self) -> impl Iterator<Item = &str> {
        self.sync
            .names()
            .chain(self.post_sync.iter().flat_map(FieldMap::names))
    }
}

impl std::fmt::Debug for SyncSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncSpec")
            .field("identifier", &self.identifier)
            .field("source", &self.source.name())
            .field("view", &self.view.name())
            .field("sync", &self.sync)
            .field("post_sync", &self.post_sync)
            .field("pick", &self.pick)
            .field("filter", &self.filter.is_some())
            .field("post_hook", &self.post_hook.is_some())
            .finish()
    }
}

/// Builder for [`SyncSpec`]. Validation happens at registration.
pub struct SyncSpecBuilder {
    spec: SyncSpec,
}

impl SyncSpecBuilder {
    /// Adds a field computed from the raw source document.
    pub fn sync(mut self, field: impl Into<String>, computer: Arc<dyn FieldComputer>) -> Self {
        self.spec.sync.insert(field, computer);
        self
    }

    /// Adds a field computed after every `sync` field is in place.
    pub fn post_sync(mut self, field: impl Into<String>, computer: Arc<dyn FieldComputer>) -> Self {
        self.spec
            .post_sync
            .get_or_insert_with(FieldMap::new)
            .insert(field, computer);
        self
    }

    /// Restricts the copied source fields.
    pub fn pick<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.spec.pick = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    pub fn filter(mut self, filter: Arc<dyn DocFilter>) -> Self {
        self.spec.filter = Some(filter);
        self
    }

    pub fn post_hook(mut self, hook: Arc<dyn PostHook>) -> Self {
        self.spec.post_hook = Some(hook);
        self
    }

    pub fn build(self) -> SyncSpec {
        self.spec
    }
}

// =============================================================================
// Dependency Binding
// =============================================================================

/// What a dependency refresh does with an id missing from the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingSourcePolicy {
    /// Raise `MissingSourceDocument`.
    #[default]
    Fail,
    /// Log and continue with the next id.
    Skip,
}

/// Ties a related collection to an existing spec.
pub struct DependencyBinding {
    identifier: String,
    related: Arc<dyn Collection>,
    refresh_ids: Arc<dyn RefreshIds>,
    on_missing: MissingSourcePolicy,
}

impl DependencyBinding {
    pub fn new(
        identifier: impl Into<String>,
        related: Arc<dyn Collection>,
        refresh_ids: Arc<dyn RefreshIds>,
    ) -> Self {
        DependencyBinding {
            identifier: identifier.into(),
            related,
            refresh_ids,
            on_missing: MissingSourcePolicy::Fail,
        }
    }

    /// Skips resolved ids whose source document no longer exists.
    pub fn tolerate_missing(mut self) -> Self {
        self.on_missing = MissingSourcePolicy::Skip;
        self
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn related(&self) -> &Arc<dyn Collection> {
        &self.related
    }

    pub fn refresh_ids(&self) -> &Arc<dyn RefreshIds> {
        &self.refresh_ids
    }

    pub fn on_missing(&self) -> MissingSourcePolicy {
        self.on_missing
    }
}

impl std::fmt::Debug for DependencyBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DependencyBinding")
            .field("identifier", &self.identifier)
            .field("related", &self.related.name())
            .field("on_missing", &self.on_missing)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::computed;

    #[test]
    fn test_field_map_keeps_first_position_on_replace() {
        let mut map = FieldMap::new();
        map.insert("a", computed(|_, _| Some(1)));
        map.insert("b", computed(|_, _| Some(2)));
        map.insert("a", computed(|_, _| Some(3)));
        assert_eq!(map.names().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(map.len(), 2);
        assert!(map.contains("b"));
        assert!(!map.contains("c"));
    }
}
