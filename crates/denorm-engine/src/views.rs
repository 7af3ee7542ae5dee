//! # Denormalized Views
//!
//! The configuration surface of the engine: register specs, bind
//! dependencies, refresh.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Call                 Effect                                            │
//! │  ───────────────────  ──────────────────────────────────────────────    │
//! │  register(spec)       validate, store, watch spec.source()              │
//! │  bind_dependency(b)   validate, store, watch b.related()                │
//! │  refresh_manually     immediate upsert of the listed ids                │
//! │  refresh_all          full rebuild of one view                          │
//! │  lookup               the stored spec, if any                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust,ignore
//! let views = DenormalizedViews::new(WritePolicy::Immediate);
//! views.register(
//!     SyncSpec::builder("POSTS", posts.clone(), posts_view.clone())
//!         .sync("authorCache", author_lookup)
//!         .post_sync("wholeText", whole_text)
//!         .build(),
//! )?;
//! views.bind_dependency(DependencyBinding::new("POSTS", authors.clone(), posts_by_author))?;
//! ```

use std::sync::Arc;

use denorm_core::{
    ConfigResult, DependencyBinding, DocId, SyncRegistry, SyncResult, SyncSpec,
};
use tracing::info;

use crate::config::EngineConfig;
use crate::dependency::DependencyPropagator;
use crate::propagation::ChangePropagator;
use crate::refresh::RefreshService;
use crate::scheduler::{WritePolicy, WriteScheduler};

/// One engine instance: its registry, write scheduler and refresh service.
pub struct DenormalizedViews {
    registry: Arc<SyncRegistry>,
    scheduler: Arc<WriteScheduler>,
    refresh: RefreshService,
}

impl DenormalizedViews {
    pub fn new(policy: WritePolicy) -> Self {
        DenormalizedViews::with_scheduler(WriteScheduler::new(policy))
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        DenormalizedViews::with_scheduler(WriteScheduler::with_capacity(
            config.write.policy,
            config.write.queue_capacity,
        ))
    }

    fn with_scheduler(scheduler: WriteScheduler) -> Self {
        let registry = Arc::new(SyncRegistry::new());
        let scheduler = Arc::new(scheduler);
        DenormalizedViews {
            refresh: RefreshService::new(registry.clone(), scheduler.clone()),
            registry,
            scheduler,
        }
    }

    /// Registers a spec and starts watching its source collection.
    pub fn register(&self, spec: SyncSpec) -> ConfigResult<Arc<SyncSpec>> {
        let spec = self.registry.register(spec)?;
        spec.source().watch(Arc::new(ChangePropagator::new(
            spec.clone(),
            self.scheduler.clone(),
        )));

        info!(
            identifier = %spec.identifier(),
            source = %spec.source().name(),
            view = %spec.view().name(),
            policy = %self.scheduler.policy(),
            "Synchronization registered"
        );
        Ok(spec)
    }

    /// Binds a related collection to a registered spec and starts watching it.
    pub fn bind_dependency(&self, binding: DependencyBinding) -> ConfigResult<Arc<DependencyBinding>> {
        let binding = self.registry.bind_dependency(binding)?;
        // bind_dependency only succeeds for registered identifiers.
        if let Some(spec) = self.registry.lookup(binding.identifier()) {
            binding.related().watch(Arc::new(DependencyPropagator::new(
                spec,
                binding.clone(),
                self.scheduler.clone(),
            )));
        }

        info!(
            identifier = %binding.identifier(),
            related = %binding.related().name(),
            "Dependency bound"
        );
        Ok(binding)
    }

    pub async fn refresh_manually<I, S>(&self, identifier: &str, ids: I) -> SyncResult<usize>
    where
        I: IntoIterator<Item = S>,
        S: Into<DocId>,
    {
        self.refresh.refresh_manually(identifier, ids).await
    }

    pub async fn refresh_all(&self, identifier: &str) -> SyncResult<u64> {
        self.refresh.refresh_all(identifier).await
    }

    pub fn lookup(&self, identifier: &str) -> Option<Arc<SyncSpec>> {
        self.registry.lookup(identifier)
    }

    pub fn registry(&self) -> &Arc<SyncRegistry> {
        &self.registry
    }

    pub fn scheduler(&self) -> &Arc<WriteScheduler> {
        &self.scheduler
    }

    /// Waits until no deferred write is queued or running, including writes
    /// one view queues into another.
    pub async fn flush(&self) -> SyncResult<()> {
        self.scheduler.flush().await
    }

    /// Drains deferred writes and stops the worker.
    pub async fn shutdown(&self) {
        self.scheduler.shutdown().await
    }
}

impl Default for DenormalizedViews {
    fn default() -> Self {
        DenormalizedViews::new(WritePolicy::default())
    }
}
