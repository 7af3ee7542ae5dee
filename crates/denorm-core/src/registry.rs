//! # Sync Registry
//!
//! Explicit, injectable store of every registered [`SyncSpec`] and
//! [`DependencyBinding`]. There is no process-global registry; whoever owns
//! the engine owns its registry.
//!
//! ## Registration Checks
//! ```text
//! register(spec)
//!   ├── identifier already used?          → DuplicateIdentifier
//!   ├── source == view?                   → SourceEqualsTarget
//!   ├── sync empty?                       → EmptySyncMap
//!   ├── (source, view) already synced?    → DuplicateSourceTargetPair
//!   └── computed field named "" or _id?   → InvalidFieldName
//!
//! bind_dependency(binding)
//!   ├── identifier not registered?        → UnknownIdentifier
//!   └── related is source or view?        → RelatedCollectionIsSourceOrTarget
//! ```
//!
//! A rejected registration leaves the registry untouched.

use std::sync::{Arc, PoisonError, RwLock};

use tracing::debug;

use crate::collection::same_collection;
use crate::error::{ConfigError, ConfigResult};
use crate::spec::{DependencyBinding, SyncSpec};
use crate::validation::{validate_computed_fields, validate_spec};

#[derive(Default)]
struct RegistryState {
    specs: Vec<Arc<SyncSpec>>,
    bindings: Vec<Arc<DependencyBinding>>,
}

/// Registered specs and dependency bindings, in registration order.
#[derive(Default)]
pub struct SyncRegistry {
    state: RwLock<RegistryState>,
}

impl SyncRegistry {
    pub fn new() -> Self {
        SyncRegistry::default()
    }

    /// Validates and stores a spec.
    pub fn register(&self, spec: SyncSpec) -> ConfigResult<Arc<SyncSpec>> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);

        if state
            .specs
            .iter()
            .any(|existing| existing.identifier() == spec.identifier())
        {
            return Err(ConfigError::DuplicateIdentifier(
                spec.identifier().to_string(),
            ));
        }

        validate_spec(&spec)?;
        if state.specs.iter().any(|existing| {
            same_collection(existing.source().as_ref(), spec.source().as_ref())
                && same_collection(existing.view().as_ref(), spec.view().as_ref())
        }) {
            return Err(ConfigError::DuplicateSourceTargetPair {
                source_collection: spec.source().name().to_string(),
                view_collection: spec.view().name().to_string(),
            });
        }
        validate_computed_fields(&spec)?;

        debug!(
            identifier = %spec.identifier(),
            source = %spec.source().name(),
            view = %spec.view().name(),
            fields = spec.computed_fields().count(),
            "Registered sync spec"
        );

        let spec = Arc::new(spec);
        state.specs.push(spec.clone());
        Ok(spec)
    }

    /// Validates and stores a dependency binding.
    pub fn bind_dependency(
        &self,
        binding: DependencyBinding,
    ) -> ConfigResult<Arc<DependencyBinding>> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);

        let spec = state
            .specs
            .iter()
            .find(|spec| spec.identifier() == binding.identifier())
            .cloned()
            .ok_or_else(|| ConfigError::UnknownIdentifier(binding.identifier().to_string()))?;

        let related = binding.related().as_ref();
        if same_collection(related, spec.source().as_ref())
            || same_collection(related, spec.view().as_ref())
        {
            return Err(ConfigError::RelatedCollectionIsSourceOrTarget {
                identifier: binding.identifier().to_string(),
                related: related.name().to_string(),
            });
        }

        debug!(
            identifier = %binding.identifier(),
            related = %related.name(),
            "Bound dependency"
        );

        let binding = Arc::new(binding);
        state.bindings.push(binding.clone());
        Ok(binding)
    }

    /// Returns the spec registered under `identifier`.
    pub fn lookup(&self, identifier: &str) -> Option<Arc<SyncSpec>> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .specs
            .iter()
            .find(|spec| spec.identifier() == identifier)
            .cloned()
    }

    /// Returns every binding targeting `identifier`, in binding order.
    pub fn bindings_for(&self, identifier: &str) -> Vec<Arc<DependencyBinding>> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .bindings
            .iter()
            .filter(|binding| binding.identifier() == identifier)
            .cloned()
            .collect()
    }

    /// Registered identifiers, in registration order.
    pub fn identifiers(&self) -> Vec<String> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .specs
            .iter()
            .map(|spec| spec.identifier().to_string())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .specs
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for SyncRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncRegistry")
            .field("identifiers", &self.identifiers())
            .finish()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
