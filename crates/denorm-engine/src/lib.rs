//! # denorm-engine: Change Propagation Engine
//!
//! Wires registered synchronization specs to their collections and keeps the
//! view collections current.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Propagation Architecture                         │
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐   │
//! │  │                 DenormalizedViews (views.rs)                     │   │
//! │  │  register / bind_dependency / refresh_* / lookup                 │   │
//! │  └─────────┬──────────────────────┬───────────────────────┬─────────┘   │
//! │            ▼                      ▼                       ▼             │
//! │  ┌──────────────────┐  ┌──────────────────────┐  ┌──────────────────┐   │
//! │  │ ChangePropagator │  │ DependencyPropagator │  │  RefreshService  │   │
//! │  │ source events    │  │ related events       │  │  manual / full   │   │
//! │  └─────────┬────────┘  └──────────┬───────────┘  └────────┬─────────┘   │
//! │            └──────────────────────┼───────────────────────┘             │
//! │                                   ▼                                     │
//! │                     ┌───────────────────────────┐                       │
//! │                     │ WriteScheduler            │                       │
//! │                     │ Immediate │ Deferred FIFO │                       │
//! │                     └─────────────┬─────────────┘                       │
//! │                                   ▼                                     │
//! │                           view collection                               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//! - [`views`] - `DenormalizedViews` facade
//! - [`propagation`] - Source collection listener
//! - [`dependency`] - Related collection listener
//! - [`refresh`] - Manual and full refresh
//! - [`scheduler`] - Immediate and deferred view writes
//! - [`config`] - Engine configuration (policy, logging, storage)
//! - [`error`] - Engine error types

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod dependency;
pub mod error;
pub mod propagation;
pub mod refresh;
pub mod scheduler;
pub mod views;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::{EngineConfig, LoggingSettings, StorageSettings, WriteSettings};
pub use dependency::DependencyPropagator;
pub use error::{EngineError, EngineResult};
pub use propagation::ChangePropagator;
pub use refresh::RefreshService;
pub use scheduler::{WriteJob, WritePolicy, WriteScheduler, DEFAULT_QUEUE_CAPACITY};
pub use views::DenormalizedViews;
