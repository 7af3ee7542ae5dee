//! # denorm-db: Storage Collaborators
//!
//! Concrete [`Collection`](denorm_core::Collection) implementations: an
//! in-memory map and a SQLite document table.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Denormalized Views Data Flow                     │
//! │                                                                         │
//! │  denorm-engine (ChangePropagator, RefreshService, ...)                  │
//! │       │  Arc<dyn Collection>                                            │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐    │
//! │  │                     denorm-db (THIS CRATE)                      │    │
//! │  │                                                                 │    │
//! │  │   ┌──────────────────┐  ┌──────────────────┐  ┌─────────────┐   │    │
//! │  │   │ MemoryCollection │  │ SqliteCollection │  │  Database   │   │    │
//! │  │   │  (memory.rs)     │  │  (sqlite.rs)     │◄─│  (pool.rs)  │   │    │
//! │  │   │  BTreeMap        │  │  documents table │  │  SqlitePool │   │    │
//! │  │   └──────────────────┘  └──────────────────┘  └─────────────┘   │    │
//! │  │                                                                 │    │
//! │  └─────────────────────────────────────────────────────────────────┘    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐    │
//! │  │  SQLite: documents(collection, id, body, updated_at)            │    │
//! │  └─────────────────────────────────────────────────────────────────┘    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`memory`] - In-memory collection
//! - [`sqlite`] - SQLite-backed collection
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//!
//! ## Usage
//!
//! ```rust,ignore
//! use denorm_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("denorm.db")).await?;
//! let posts = db.collection("posts");
//! let posts_view = db.collection("posts_view");
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod memory;
pub mod migrations;
pub mod pool;
pub mod sqlite;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use memory::MemoryCollection;
pub use pool::{Database, DbConfig};
pub use sqlite::SqliteCollection;
