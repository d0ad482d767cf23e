//! # Sync Scheduler
//!
//! Background task that runs drain passes on a fixed interval and as soon as
//! connectivity returns.
//!
//! ## Features
//!
//! - **Interval Passes**: first pass right after spawn, then every interval
//! - **Reconnect Passes**: an offline to online transition resets operations
//!   past the retry limit, runs a pass at once and flushes the review queue
//! - **Lifecycle**: `SchedulerHandle::stop` ends the task cleanly; dropping
//!   the handle aborts it
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use decksync::sync::{NetworkMonitor, SyncOrchestrator, SyncScheduler};
//!
//! # async fn example(sync: Arc<SyncOrchestrator>, monitor: Arc<NetworkMonitor>) {
//! let handle = SyncScheduler::new(sync, Duration::from_secs(30), monitor.subscribe()).spawn();
//! // ...
//! handle.stop().await;
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use super::network_monitor::NetworkStatus;
use super::SyncOrchestrator;
use crate::offline::reviews::ReviewQueue;

/// Trigger for one scheduled pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trigger {
    Interval,
    Reconnect,
}

/// Drives `SyncOrchestrator::process_queue` from a timer and reconnects
pub struct SyncScheduler {
    orchestrator: Arc<SyncOrchestrator>,
    reviews: Option<ReviewQueue>,
    interval: Duration,
    status: watch::Receiver<NetworkStatus>,
}

impl SyncScheduler {
    pub fn new(
        orchestrator: Arc<SyncOrchestrator>,
        interval: Duration,
        status: watch::Receiver<NetworkStatus>,
    ) -> Self {
        Self {
            orchestrator,
            reviews: None,
            interval,
            status,
        }
    }

    /// Also flush `reviews` whenever connectivity returns
    pub fn with_reviews(mut self, reviews: ReviewQueue) -> Self {
        self.reviews = Some(reviews);
        self
    }

    /// Start the background task
    pub fn spawn(self) -> SchedulerHandle {
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let task = tokio::spawn(self.run(shutdown_rx));
        SchedulerHandle {
            shutdown: Some(shutdown_tx),
            task: Some(task),
        }
    }

    async fn run(self, mut shutdown: oneshot::Receiver<()>) {
        let Self {
            orchestrator,
            reviews,
            interval,
            mut status,
        } = self;

        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut was_online = status.borrow_and_update().is_online();
        let mut watching = true;

        info!(interval_secs = interval.as_secs(), "Sync scheduler started");

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = ticker.tick() => {
                    run_pass(&orchestrator, Trigger::Interval).await;
                }
                changed = status.changed(), if watching => {
                    if changed.is_err() {
                        // Monitor dropped; keep the timer going
                        watching = false;
                        continue;
                    }
                    let online = status.borrow_and_update().is_online();
                    if online && !was_online {
                        if let Err(e) = orchestrator.retry_exhausted().await {
                            warn!(error = %e, "Could not reset exhausted operations");
                        }
                        run_pass(&orchestrator, Trigger::Reconnect).await;
                        if let Some(reviews) = &reviews {
                            match orchestrator.flush_reviews(reviews).await {
                                Ok(count) => debug!(count, "Flushed reviews on reconnect"),
                                Err(e) => warn!(error = %e, "Review flush on reconnect failed"),
                            }
                        }
                    }
                    was_online = online;
                }
            }
        }

        info!("Sync scheduler stopped");
    }
}

async fn run_pass(orchestrator: &SyncOrchestrator, trigger: Trigger) {
    match orchestrator.process_queue().await {
        Ok(report) => debug!(
            ?trigger,
            attempted = report.attempted,
            succeeded = report.succeeded,
            offline = report.offline,
            "Scheduled sync pass finished"
        ),
        Err(e) => error!(?trigger, error = %e, "Scheduled sync pass failed"),
    }
}

/// Handle to a running scheduler
///
/// Dropping it aborts the task.
#[derive(Debug)]
pub struct SchedulerHandle {
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl SchedulerHandle {
    /// Stop after the pass in progress, if any, and wait for the task
    pub async fn stop(mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                if e.is_panic() {
                    error!(error = %e, "Sync scheduler panicked");
                }
            }
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, |task| task.is_finished())
    }
}

impl Drop for SchedulerHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
