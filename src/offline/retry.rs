//! # Retry Policy and Backoff
//!
//! Bounded retry with exponential backoff for queued operations that failed
//! against the remote API.
//!
//! ## Behavior
//!
//! - **Exponential Backoff**: after the n-th failure the operation waits
//!   `base_delay * factor^(n-1)`, capped at `max_delay`, before the next pass
//!   may attempt it again
//! - **Max Retries**: once `retry_count` reaches `max_retries` the operation is
//!   exhausted. It stays queued as `failed` for the caller to inspect, but
//!   drain passes stop attempting it. `None` retries forever.
//!
//! ## Usage
//!
//! ```rust
//! use decksync::offline::retry::RetryPolicy;
//! use std::time::Duration;
//!
//! let policy = RetryPolicy::default();
//! assert_eq!(policy.delay_for(1), Duration::from_secs(1));
//! assert_eq!(policy.delay_for(2), Duration::from_secs(2));
//! assert!(policy.is_exhausted(8));
//! ```

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::offline::queue::QueuedOperation;
use crate::shared::config::ConfigError;

/// Largest accepted `max_delay_ms`: one day
pub const MAX_DELAY_LIMIT_MS: u64 = 86_400_000;

/// Retry and backoff configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Failures after which an operation is no longer attempted
    pub max_retries: Option<u32>,
    /// Delay after the first failure, in milliseconds
    pub base_delay_ms: u64,
    /// Upper bound for any delay, in milliseconds
    pub max_delay_ms: u64,
    /// Growth factor between consecutive delays
    pub factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: Some(8),
            base_delay_ms: 1_000,
            max_delay_ms: 300_000, // 5 minutes
            factor: 2.0,
        }
    }
}

impl RetryPolicy {
    /// No delay between attempts; failed operations are retried on the very
    /// next pass
    pub fn immediate() -> Self {
        Self {
            base_delay_ms: 0,
            max_delay_ms: 0,
            factor: 1.0,
            ..Self::default()
        }
    }

    /// Same backoff, never gives up
    pub fn unbounded() -> Self {
        Self {
            max_retries: None,
            ..Self::default()
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    /// Delay to wait after the `retry_count`-th failure
    pub fn delay_for(&self, retry_count: u32) -> Duration {
        if retry_count == 0 {
            return Duration::ZERO;
        }
        let exponent = i32::try_from(retry_count - 1).unwrap_or(i32::MAX);
        let delay_ms = (self.base_delay_ms as f64) * self.factor.powi(exponent);
        // f64 -> u64 casts saturate, so an infinite product lands on the cap
        Duration::from_millis((delay_ms.min(self.max_delay_ms as f64)) as u64)
    }

    /// Earliest time a failed operation may be attempted again
    ///
    /// Saturates at the latest representable time instead of overflowing.
    pub fn next_attempt_at(&self, retry_count: u32, now: DateTime<Utc>) -> DateTime<Utc> {
        chrono::Duration::from_std(self.delay_for(retry_count))
            .ok()
            .and_then(|delay| now.checked_add_signed(delay))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// Whether an operation with this many failures is past the limit
    pub fn is_exhausted(&self, retry_count: u32) -> bool {
        self.max_retries.is_some_and(|max| retry_count >= max)
    }

    /// Whether a pass running at `now` should attempt `operation`
    pub fn is_due(&self, operation: &QueuedOperation, now: DateTime<Utc>) -> bool {
        operation.next_attempt_at.map_or(true, |at| at <= now)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.factor >= 1.0) {
            return Err(ConfigError::InvalidValue {
                field: "retry.factor",
                message: format!("must be at least 1.0, got {}", self.factor),
            });
        }
        if self.max_delay_ms > MAX_DELAY_LIMIT_MS {
            return Err(ConfigError::InvalidValue {
                field: "retry.max_delay_ms",
                message: format!("must not exceed {} (one day)", MAX_DELAY_LIMIT_MS),
            });
        }
        if self.base_delay_ms > self.max_delay_ms {
            return Err(ConfigError::InvalidValue {
                field: "retry.base_delay_ms",
                message: "must not exceed retry.max_delay_ms".to_string(),
            });
        }
        Ok(())
    }
}
