//! # Error Types
//!
//! Error types shared by every layer of the engine.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  denorm-core errors (this file)                                        │
//! │  ├── ConfigError   - Rejected registrations (caller bugs, never retried)│
//! │  ├── SyncError     - Failures while propagating a change               │
//! │  ├── StorageError  - Failures reported by a Collection                 │
//! │  └── ComputeError  - Failures inside caller-supplied callbacks          │
//! │                                                                         │
//! │  denorm-db errors (separate crate)                                     │
//! │  └── DbError       - SQLite failures, converted into StorageError      │
//! │                                                                         │
//! │  Flow: ComputeError → SyncError → StorageError::Listener → caller      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Two Tiers
//! 1. **Configuration** errors come out of `register` / `bind_dependency`
//!    synchronously and leave the registry untouched.
//! 2. **Runtime** errors come out of processing. Processing is entirely
//!    in-memory before the first view write, so a failed computation never
//!    leaves a half-written view document.

use thiserror::Error;

// =============================================================================
// Configuration Error
// =============================================================================

/// A registration was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// Another spec already uses this identifier.
    #[error("identifier already exists: {0}")]
    DuplicateIdentifier(String),

    /// Source and view collection are the same collection.
    #[error("source collection and view collection need to refer to different collections (both are '{0}')")]
    SourceEqualsTarget(String),

    /// The `sync` map has no entries.
    #[error("sync needs to have at least one field (identifier '{0}')")]
    EmptySyncMap(String),

    /// A spec already exists for this (source, view) pair.
    #[error("a synchronization already exists for source '{source_collection}' and view '{view_collection}'")]
    DuplicateSourceTargetPair {
        source_collection: String,
        view_collection: String,
    },

    /// A dependency binding references an identifier nobody registered.
    ///
    /// ## When This Occurs
    /// - `bind_dependency` called before `register` for that identifier
    /// - Typo in the identifier
    #[error("identifier '{0}' is not a registered synchronization; register it before binding dependencies")]
    UnknownIdentifier(String),

    /// A dependency binding points at the spec's own source or view collection.
    #[error("related collection '{related}' can not be the source or view collection of '{identifier}'")]
    RelatedCollectionIsSourceOrTarget { identifier: String, related: String },

    /// A sync / postSync / pick field name can never be written to a view.
    #[error("invalid field name '{field}': {reason}")]
    InvalidFieldName { field: String, reason: String },
}

// =============================================================================
// Sync Error
// =============================================================================

/// Runtime failures raised while processing a change.
///
/// None of these are retried; they propagate to the write that triggered
/// the change notification.
#[derive(Debug, Error)]
pub enum SyncError {
    /// A `sync` field computer failed.
    #[error("sync.{field} failed: {reason}")]
    InvalidSyncFunction { field: String, reason: String },

    /// A `postSync` field computer failed.
    #[error("postSync.{field} failed: {reason}")]
    InvalidPostSyncFunction { field: String, reason: String },

    /// A dependency callback returned something other than an id list or nothing.
    #[error("refreshIds for '{identifier}' needs to return a list of ids, an empty list or nothing, but returned {found}")]
    InvalidRefreshIdsResult { identifier: String, found: String },

    /// An id handed to a refresh path no longer exists in the source collection.
    ///
    /// ## When This Occurs
    /// - `refresh_manually` with stale ids
    /// - A `RefreshIds` callback resolving ids that were already removed
    #[error("trying to refresh '{id}', but it does not exist in collection '{collection}'")]
    MissingSourceDocument { collection: String, id: String },

    /// A refresh was requested for an identifier nobody registered.
    #[error("no synchronization registered for identifier '{0}'")]
    UnknownIdentifier(String),

    /// A filter or post hook failed.
    #[error("{stage} for '{identifier}' failed: {reason}")]
    Callback {
        identifier: String,
        stage: &'static str,
        reason: String,
    },

    /// The document handed to the engine has no string `_id`.
    #[error("document in '{0}' has no string _id")]
    MissingIdentity(String),

    /// The deferred write worker is no longer running.
    #[error("deferred write worker is closed")]
    SchedulerClosed,

    /// The storage collaborator failed.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

// =============================================================================
// Storage Error
// =============================================================================

/// Failures reported by a [`Collection`](crate::collection::Collection).
#[derive(Debug, Error)]
pub enum StorageError {
    /// Insert of an id that already exists.
    #[error("duplicate _id '{id}' in collection '{collection}'")]
    DuplicateId { collection: String, id: String },

    /// The stored document can not be represented as a [`Document`](crate::Document).
    #[error("corrupt document '{id}' in collection '{collection}': {reason}")]
    Corrupt {
        collection: String,
        id: String,
        reason: String,
    },

    /// Backend specific failure (SQL error, pool exhausted, ...).
    #[error("{0}")]
    Backend(String),

    /// A change listener failed after the write was applied.
    #[error("change listener failed: {0}")]
    Listener(Box<SyncError>),
}

impl From<SyncError> for StorageError {
    fn from(err: SyncError) -> Self {
        StorageError::Listener(Box::new(err))
    }
}

// =============================================================================
// Compute Error
// =============================================================================

/// Failure inside caller-supplied code (field computers, filters, hooks).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct ComputeError(pub String);

impl ComputeError {
    /// Creates a compute error from anything printable.
    pub fn new(reason: impl std::fmt::Display) -> Self {
        ComputeError(reason.to_string())
    }
}

impl From<StorageError> for ComputeError {
    fn from(err: StorageError) -> Self {
        ComputeError(err.to_string())
    }
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result of a registration call.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Result of a processing / propagation call.
pub type SyncResult<T> = Result<T, SyncError>;

/// Result of a storage call.
pub type StorageResult<T> = Result<T, StorageError>;

// =============================================================================
// Unit Tests
// =============================================================================
