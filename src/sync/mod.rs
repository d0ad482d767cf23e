//! # Sync Orchestrator
//!
//! Drains the operation queue against the remote API.
//!
//! ## Architecture
//!
//! - **Orchestrator** (`SyncOrchestrator`): one FIFO pass per `process_queue`
//! - **Network Monitor**: the online signal read before and during a pass
//! - **Scheduler**: runs passes on a timer and whenever connectivity returns
//! - **Metrics**: pass and flush counters
//!
//! ## Pass Semantics
//!
//! - Offline: the pass is a no-op and the queue is left untouched
//! - Draining: each operation is sent in queue order. Success removes it.
//!   Failure marks it `failed`, bumps `retry_count` by one, schedules its
//!   next attempt and the pass moves on to the next operation
//! - Operations still in backoff, or past the retry limit, are skipped and
//!   reported. `retry_exhausted` puts the latter back in line; the scheduler
//!   calls it whenever connectivity returns
//! - If connectivity drops mid-pass the pass ends, leaving the rest queued
//! - Only one pass runs at a time; an overlapping call returns at once
//!
//! ## Usage
//!
//! ```rust,no_run
//! use decksync::sync::SyncOrchestrator;
//!
//! # async fn example(sync: SyncOrchestrator) -> Result<(), decksync::shared::SyncError> {
//! let report = sync.process_queue().await?;
//! for (id, error) in &report.failed {
//!     println!("{} failed: {}", id, error);
//! }
//! # Ok(())
//! # }
//! ```

pub mod metrics;
pub mod network_monitor;
pub mod scheduler;

pub use metrics::SyncMetrics;
pub use network_monitor::{Connectivity, NetworkMonitor, NetworkStatus};
pub use scheduler::{SchedulerHandle, SyncScheduler};

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::api::{self, RemoteApi};
use crate::offline::queue::OperationQueue;
use crate::offline::retry::RetryPolicy;
use crate::offline::reviews::ReviewQueue;
use crate::shared::error::{ApiError, SyncError};

/// Outcome of one `process_queue` call
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncReport {
    /// Remote calls issued
    pub attempted: usize,
    pub succeeded: usize,
    /// Operations whose remote call failed this pass
    pub failed: Vec<(Uuid, ApiError)>,
    /// Operations still waiting out their backoff
    pub skipped_backoff: usize,
    /// Operations past the retry limit, left in the queue as `failed`
    pub exhausted: Vec<Uuid>,
    /// The pass did not run because the client was offline
    pub offline: bool,
    /// The pass did not run because another one was in progress
    pub already_running: bool,
    /// Connectivity dropped during the pass
    pub interrupted: bool,
}

impl SyncReport {
    fn offline() -> Self {
        Self {
            offline: true,
            ..Self::default()
        }
    }

    fn already_running() -> Self {
        Self {
            already_running: true,
            ..Self::default()
        }
    }

    /// Whether anything in the queue still needs the server
    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty() || !self.exhausted.is_empty()
    }
}

/// Drains the operation queue
pub struct SyncOrchestrator {
    queue: Arc<OperationQueue>,
    api: Arc<dyn RemoteApi>,
    connectivity: Arc<dyn Connectivity>,
    policy: RetryPolicy,
    drain_lock: Mutex<()>,
    metrics: RwLock<SyncMetrics>,
}

impl fmt::Debug for SyncOrchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncOrchestrator")
            .field("queue", &self.queue)
            .field("policy", &self.policy)
            .finish()
    }
}

impl SyncOrchestrator {
    pub fn new(
        queue: Arc<OperationQueue>,
        api: Arc<dyn RemoteApi>,
        connectivity: Arc<dyn Connectivity>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            queue,
            api,
            connectivity,
            policy,
            drain_lock: Mutex::new(()),
            metrics: RwLock::new(SyncMetrics::new()),
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn is_online(&self) -> bool {
        self.connectivity.is_online()
    }

    /// Run one drain pass
    ///
    /// Remote failures are recorded on the operations and listed in the
    /// report; only storage failures come back as `Err`.
    pub async fn process_queue(&self) -> Result<SyncReport, SyncError> {
        if !self.connectivity.is_online() {
            debug!("Offline; skipping sync pass");
            return Ok(SyncReport::offline());
        }

        let Ok(_drain) = self.drain_lock.try_lock() else {
            debug!("Sync pass already running");
            return Ok(SyncReport::already_running());
        };

        let started = Instant::now();
        let snapshot = self.queue.get_queue().await?;
        let mut report = SyncReport::default();

        for op in snapshot {
            if !self.connectivity.is_online() {
                info!("Connectivity lost; ending sync pass early");
                report.interrupted = true;
                break;
            }

            if self.policy.is_exhausted(op.retry_count) {
                report.exhausted.push(op.id);
                continue;
            }
            if !self.policy.is_due(&op, Utc::now()) {
                report.skipped_backoff += 1;
                continue;
            }

            report.attempted += 1;
            match api::execute(self.api.as_ref(), &op.operation).await {
                Ok(()) => {
                    self.queue.dequeue(op.id).await?;
                    report.succeeded += 1;
                    debug!(op_id = %op.id, kind = %op.kind(), "Synced operation");
                }
                Err(e) => {
                    let updated = self.queue.mark_failed(op.id, &e.to_string(), &self.policy).await?;
                    warn!(
                        op_id = %op.id,
                        kind = %op.kind(),
                        retry_count = updated.as_ref().map_or(op.retry_count + 1, |u| u.retry_count),
                        error = %e,
                        "Operation failed"
                    );
                    report.failed.push((op.id, e));
                }
            }
        }

        let elapsed = started.elapsed();
        let success_rate = {
            let mut metrics = self.metrics.write().await;
            metrics.record_pass(elapsed, report.succeeded, report.failed.len());
            metrics.success_rate()
        };

        if report.attempted > 0 || !report.exhausted.is_empty() {
            info!(
                attempted = report.attempted,
                succeeded = report.succeeded,
                failed = report.failed.len(),
                skipped_backoff = report.skipped_backoff,
                exhausted = report.exhausted.len(),
                success_rate,
                "Sync pass complete"
            );
        }
        if !report.exhausted.is_empty() {
            warn!(count = report.exhausted.len(), "Operations past the retry limit need attention");
        }

        Ok(report)
    }

    /// Give operations past the retry limit a fresh retry budget
    ///
    /// Returns how many were reset.
    pub async fn retry_exhausted(&self) -> Result<usize, SyncError> {
        let reset = self.queue.reset_exhausted(&self.policy).await?;
        if !reset.is_empty() {
            info!(count = reset.len(), "Retrying operations past the retry limit");
        }
        Ok(reset.len())
    }

    /// Flush `reviews` and count the result in the metrics
    pub async fn flush_reviews(&self, reviews: &ReviewQueue) -> Result<usize, SyncError> {
        match reviews.flush_queue().await {
            Ok(count) => {
                self.metrics.write().await.record_review_flush(count);
                Ok(count)
            }
            Err(e) => {
                self.metrics.write().await.record_review_flush_failure();
                Err(e)
            }
        }
    }

    pub async fn metrics(&self) -> SyncMetrics {
        self.metrics.read().await.clone()
    }
}
