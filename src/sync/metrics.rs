//! # Sync Metrics
//!
//! Counters for drain passes and review flushes.
//!
//! ## Features
//!
//! - **Pass Tracking**: passes run, last and average pass duration
//! - **Outcome Counters**: operations synced and failed, reviews flushed

use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncMetrics {
    /// Passes that reached the drain loop
    pub total_passes: u64,
    pub operations_synced: u64,
    pub operations_failed: u64,
    pub reviews_flushed: u64,
    pub review_flush_failures: u64,
    pub last_pass_duration: Option<Duration>,
    pub average_pass_duration: Duration,
}

impl SyncMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_pass(&mut self, duration: Duration, succeeded: usize, failed: usize) {
        self.total_passes += 1;
        self.operations_synced += succeeded as u64;
        self.operations_failed += failed as u64;
        self.last_pass_duration = Some(duration);

        // Rolling average
        let passes = u32::try_from(self.total_passes).unwrap_or(u32::MAX);
        let total = self.average_pass_duration * (passes - 1) + duration;
        self.average_pass_duration = total / passes;
    }

    pub fn record_review_flush(&mut self, count: usize) {
        self.reviews_flushed += count as u64;
    }

    pub fn record_review_flush_failure(&mut self) {
        self.review_flush_failures += 1;
    }

    /// Share of attempted operations that succeeded
    pub fn success_rate(&self) -> f64 {
        let attempted = self.operations_synced + self.operations_failed;
        if attempted == 0 {
            0.0
        } else {
            self.operations_synced as f64 / attempted as f64
        }
    }
}
