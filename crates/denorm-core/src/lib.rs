//! # denorm-core: Pure Synchronization Logic
//!
//! This crate is the **heart** of the denormalized-views engine. It defines
//! what a view is and how a source document becomes one, with zero I/O.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Denormalized Views Architecture                    │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    denorm-cli (demo binary)                     │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │  denorm-engine: propagation, dependency, refresh, scheduler     │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ denorm-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │ document  │  │   spec    │  │ registry  │  │ processor │  │   │
//! │  │   │ FieldValue│  │ FieldMap  │  │ register  │  │ sync      │  │   │
//! │  │   │ Query     │  │ Binding   │  │ bind      │  │ postSync  │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO DATABASE • NO TASKS • TRAITS FOR EVERY COLLABORATOR       │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │  denorm-db: MemoryCollection, SqliteCollection                  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`document`] - `Document`, `FieldValue` (explicit present/absent)
//! - [`query`] - Equality selector used by `Collection::find`
//! - [`collection`] - Storage and change-notification traits
//! - [`strategy`] - Field computer, filter, post hook and refresh-id traits
//! - [`spec`] - `SyncSpec`, `DependencyBinding`
//! - [`validation`] - Registration-time checks on a single spec
//! - [`registry`] - `SyncRegistry`
//! - [`processor`] - `DocumentProcessor`
//! - [`error`] - Error types
//!
//! ## Design Principles
//!
//! 1. **Explicit Absence**: only `FieldValue::Absent` removes a field; `0`,
//!    `[]`, `{}` and `null` are values
//! 2. **No Globals**: the registry is an ordinary value owned by the engine
//! 3. **Compute Before Write**: processing never touches storage, so a failed
//!    computation leaves nothing half-written

// =============================================================================
// Module Declarations
// =============================================================================

pub mod collection;
pub mod document;
pub mod error;
pub mod processor;
pub mod query;
pub mod registry;
pub mod spec;
pub mod strategy;
pub mod validation;

#[cfg(test)]
mod testing;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use collection::{same_collection, ChangeHooks, ChangeListener, Collection};
pub use document::{DocId, Document, FieldValue, ID_FIELD};
pub use error::{
    ComputeError, ConfigError, ConfigResult, StorageError, StorageResult, SyncError, SyncResult,
};
pub use processor::{validate_refresh_ids, DocumentProcessor, ProcessedDoc};
pub use query::Query;
pub use registry::SyncRegistry;
pub use spec::{DependencyBinding, FieldMap, MissingSourcePolicy, SyncSpec, SyncSpecBuilder};
pub use strategy::{DocFilter, FieldComputer, PostHook, RefreshIds};
