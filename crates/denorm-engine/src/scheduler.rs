//! # Write Scheduler
//!
//! Every view-collection mutation goes through here, under a [`WritePolicy`].
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Write Scheduler                                │
//! │                                                                         │
//! │  ChangePropagator / DependencyPropagator / RefreshService               │
//! │       │ execute(job)                                                    │
//! │       ▼                                                                 │
//! │  ┌──────────────────────────┐        ┌──────────────────────────────┐   │
//! │  │ IMMEDIATE                │        │ DEFERRED                     │   │
//! │  │ job.await in the caller  │        │ queue ──► single worker task │   │
//! │  │ errors reach the write   │        │ FIFO, one job at a time      │   │
//! │  │ that triggered the event │        │ errors logged + counted      │   │
//! │  └──────────────────────────┘        └──────────────────────────────┘   │
//! │                                                                         │
//! │  FIFO keeps writes to one view document in event order: an update       │
//! │  followed by a remove never resurrects the row.                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A view can be the source of another view, so a deferred job may queue
//! more jobs. Those skip the capacity limit and land behind everything
//! already queued; `flush` waits for them too.
//!
//! The worker starts on the first deferred job, so an engine that only
//! writes immediately never spawns a task.

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use denorm_core::{SyncError, SyncResult};
use futures::future::BoxFuture;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, Notify, OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::error::EngineError;

/// Default number of deferred jobs a caller may have outstanding before
/// `execute` waits.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// A unit of view writes, run to completion.
pub type WriteJob = BoxFuture<'static, SyncResult<()>>;

// =============================================================================
// Write Policy
// =============================================================================

/// When view writes run relative to the change that caused them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WritePolicy {
    /// Run inside the triggering write. Readers see the view right after it.
    #[default]
    Immediate,

    /// Queue for the background worker.
    Deferred,
}

impl std::fmt::Display for WritePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WritePolicy::Immediate => write!(f, "immediate"),
            WritePolicy::Deferred => write!(f, "deferred"),
        }
    }
}

impl std::str::FromStr for WritePolicy {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "immediate" | "sync" => Ok(WritePolicy::Immediate),
            "deferred" | "defer" | "async" => Ok(WritePolicy::Deferred),
            other => Err(EngineError::InvalidConfig(format!(
                "Unknown write policy: '{}'. Valid options: immediate, deferred",
                other
            ))),
        }
    }
}

// =============================================================================
// Worker Commands
// =============================================================================

tokio::task_local! {
    /// Set while a job runs on the deferred worker.
    static ON_WORKER: ();
}

fn on_worker() -> bool {
    ON_WORKER.try_with(|_| ()).is_ok()
}

enum WriteCommand {
    /// Run one job. The permit is released once it finishes; jobs queued by
    /// another job carry none.
    Run {
        job: WriteJob,
        permit: Option<OwnedSemaphorePermit>,
    },
    /// Stop after the jobs already queued.
    Shutdown,
}

enum WorkerState {
    Idle,
    Running {
        tx: mpsc::UnboundedSender<WriteCommand>,
        handle: JoinHandle<()>,
    },
    Closed,
}

/// Counters shared with the worker.
#[derive(Default)]
struct Progress {
    /// Jobs queued and not yet finished.
    pending: AtomicUsize,
    /// Woken when `pending` drops to zero.
    idle: Notify,
    failed: AtomicU64,
}

impl Progress {
    fn finish(&self) {
        if self.pending.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.idle.notify_waiters();
        }
    }
}

// =============================================================================
// Write Scheduler
// =============================================================================

/// Runs view writes under the configured policy.
pub struct WriteScheduler {
    policy: WritePolicy,
    capacity: usize,
    state: Mutex<WorkerState>,
    permits: Arc<Semaphore>,
    progress: Arc<Progress>,
}

impl WriteScheduler {
    pub fn new(policy: WritePolicy) -> Self {
        WriteScheduler::with_capacity(policy, DEFAULT_QUEUE_CAPACITY)
    }

    pub fn with_capacity(policy: WritePolicy, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        WriteScheduler {
            policy,
            capacity,
            state: Mutex::new(WorkerState::Idle),
            permits: Arc::new(Semaphore::new(capacity)),
            progress: Arc::new(Progress::default()),
        }
    }

    /// The default policy used by [`execute`](Self::execute).
    pub fn policy(&self) -> WritePolicy {
        self.policy
    }

    /// Number of deferred jobs that returned an error.
    pub fn failed_jobs(&self) -> u64 {
        self.progress.failed.load(Ordering::Relaxed)
    }

    /// Runs `job` under the default policy.
    pub async fn execute(&self, job: WriteJob) -> SyncResult<()> {
        self.execute_with(self.policy, job).await
    }

    /// Runs `job` under an explicit policy.
    ///
    /// Immediate jobs return their own result. Deferred jobs return once
    /// queued; their failures only show up in logs and [`failed_jobs`](Self::failed_jobs).
    /// Callers wait while `capacity` jobs are outstanding, except jobs queued
    /// from the worker itself (a view write feeding another view), which
    /// never wait on the queue they are draining.
    pub async fn execute_with(&self, policy: WritePolicy, job: WriteJob) -> SyncResult<()> {
        match policy {
            WritePolicy::Immediate => job.await,
            WritePolicy::Deferred => {
                let tx = self.sender()?;
                let permit = if on_worker() {
                    None
                } else {
                    let permit = self
                        .permits
                        .clone()
                        .acquire_owned()
                        .await
                        .map_err(|_| SyncError::SchedulerClosed)?;
                    Some(permit)
                };

                self.progress.pending.fetch_add(1, Ordering::SeqCst);
                if tx.send(WriteCommand::Run { job, permit }).is_err() {
                    self.progress.finish();
                    return Err(SyncError::SchedulerClosed);
                }
                Ok(())
            }
        }
    }

    /// Waits until the queue is empty, including jobs queued by other jobs
    /// while waiting.
    ///
    /// Called from a job on the worker, returns at once: the queue cannot
    /// drain while that job is still running.
    pub async fn flush(&self) -> SyncResult<()> {
        if on_worker() {
            debug!("Flush requested from the deferred worker; skipping");
            return Ok(());
        }
        loop {
            let idle = self.progress.idle.notified();
            if self.progress.pending.load(Ordering::SeqCst) == 0 {
                return Ok(());
            }
            idle.await;
        }
    }

    /// Drains the queue and stops the worker. Later deferred jobs fail with
    /// [`SyncError::SchedulerClosed`].
    pub async fn shutdown(&self) {
        let from_worker = on_worker();
        if !from_worker {
            let _ = self.flush().await;
        }

        let previous = {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            std::mem::replace(&mut *state, WorkerState::Closed)
        };

        if let WorkerState::Running { tx, handle } = previous {
            let _ = tx.send(WriteCommand::Shutdown);
            drop(tx);
            // The worker stops after the current job; it cannot await itself.
            if from_worker {
                return;
            }
            if let Err(e) = handle.await {
                error!(?e, "Deferred write worker panicked");
            }
        }
    }

    /// Returns the worker's queue, starting the worker on first use.
    fn sender(&self) -> SyncResult<mpsc::UnboundedSender<WriteCommand>> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        match &*state {
            WorkerState::Running { tx, .. } => return Ok(tx.clone()),
            WorkerState::Closed => return Err(SyncError::SchedulerClosed),
            WorkerState::Idle => {}
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(run_worker(rx, self.progress.clone()));
        info!(capacity = self.capacity, "Deferred write worker started");

        *state = WorkerState::Running {
            tx: tx.clone(),
            handle,
        };
        Ok(tx)
    }
}

impl Default for WriteScheduler {
    fn default() -> Self {
        WriteScheduler::new(WritePolicy::default())
    }
}

impl std::fmt::Debug for WriteScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriteScheduler")
            .field("policy", &self.policy)
            .field("capacity", &self.capacity)
            .field("pending", &self.progress.pending.load(Ordering::Relaxed))
            .field("failed_jobs", &self.failed_jobs())
            .finish()
    }
}

/// Main worker loop.
async fn run_worker(mut rx: mpsc::UnboundedReceiver<WriteCommand>, progress: Arc<Progress>) {
    while let Some(command) = rx.recv().await {
        match command {
            WriteCommand::Run { job, permit } => {
                run_job(job, &progress).await;
                drop(permit);
            }
            WriteCommand::Shutdown => {
                debug!("Deferred write worker shutting down");
                break;
            }
        }
    }

    // Anything that raced past shutdown is dropped, but still accounted for
    // so `flush` cannot wait on it forever.
    rx.close();
    while let Ok(command) = rx.try_recv() {
        if let WriteCommand::Run { .. } = command {
            warn!("Dropping deferred view write queued after shutdown");
            progress.failed.fetch_add(1, Ordering::Relaxed);
            progress.finish();
        }
    }
    info!("Deferred write worker stopped");
}

async fn run_job(job: WriteJob, progress: &Progress) {
    match ON_WORKER.scope((), AssertUnwindSafe(job).catch_unwind()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            progress.failed.fetch_add(1, Ordering::Relaxed);
            error!(error = %e, "Deferred view write failed");
        }
        Err(_) => {
            progress.failed.fetch_add(1, Ordering::Relaxed);
            error!("Deferred view write panicked");
        }
    }
    progress.finish();
}

// =============================================================================
// Unit Tests
// =============================================================================
