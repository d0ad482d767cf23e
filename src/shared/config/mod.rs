//! Sync engine configuration
//!
//! `SyncConfig` is plain data with defaults for every field, so a partial
//! TOML document or an environment override only needs to name what changes.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::offline::retry::RetryPolicy;

/// Default server URL
pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:3000";

/// Largest accepted `cache_ttl_secs`: one year
pub const MAX_CACHE_TTL_SECS: u64 = 365 * 24 * 60 * 60;

/// Environment variable overriding the server URL
pub const ENV_API_URL: &str = "DECKSYNC_API_URL";
/// Environment variable carrying the bearer token
pub const ENV_API_TOKEN: &str = "DECKSYNC_API_TOKEN";
/// Environment variable overriding the scheduler interval (seconds)
pub const ENV_SYNC_INTERVAL: &str = "DECKSYNC_SYNC_INTERVAL";

/// Sync engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Base URL of the server of record
    pub server_url: String,
    /// Bearer token sent with every API request
    pub api_token: Option<String>,
    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,
    /// Scheduler tick interval in seconds
    pub sync_interval_secs: u64,
    /// Attempt a best-effort flush after every queued review
    pub background_review_flush: bool,
    /// How long a cached list view counts as fresh, in seconds
    pub cache_ttl_secs: u64,
    /// Retry and backoff policy for failed operations
    pub retry: RetryPolicy,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            api_token: None,
            request_timeout_secs: 15,
            sync_interval_secs: 30,
            background_review_flush: true,
            cache_ttl_secs: 300,
            retry: RetryPolicy::default(),
        }
    }
}

impl SyncConfig {
    /// Create a new SyncConfigBuilder
    pub fn builder() -> SyncConfigBuilder {
        SyncConfigBuilder::default()
    }

    /// Parse a TOML document; missing fields take their defaults
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(source).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults overridden by `DECKSYNC_*` environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(url) = std::env::var(ENV_API_URL) {
            config.server_url = url;
        }
        if let Ok(token) = std::env::var(ENV_API_TOKEN) {
            config.api_token = Some(token).filter(|t| !t.is_empty());
        }
        if let Ok(interval) = std::env::var(ENV_SYNC_INTERVAL) {
            config.sync_interval_secs = interval.parse().map_err(|_| ConfigError::InvalidValue {
                field: "sync_interval_secs",
                message: format!("not a number: {}", interval),
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = self.server_url.trim();
        if url.is_empty() || !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::InvalidUrl(self.server_url.clone()));
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "request_timeout_secs",
                message: "must be greater than zero".to_string(),
            });
        }
        if self.sync_interval_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "sync_interval_secs",
                message: "must be greater than zero".to_string(),
            });
        }
        if self.cache_ttl_secs > MAX_CACHE_TTL_SECS {
            return Err(ConfigError::InvalidValue {
                field: "cache_ttl_secs",
                message: format!("must not exceed {} (one year)", MAX_CACHE_TTL_SECS),
            });
        }
        self.retry.validate()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.sync_interval_secs)
    }

    /// Out-of-range values saturate to the largest TTL accepted by `validate`
    pub fn cache_ttl(&self) -> chrono::Duration {
        let secs = self.cache_ttl_secs.min(MAX_CACHE_TTL_SECS);
        i64::try_from(secs)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .unwrap_or(chrono::Duration::days(365))
    }
}

/// Builder for SyncConfig
#[derive(Debug, Default)]
pub struct SyncConfigBuilder {
    config: SyncConfig,
}

impl SyncConfigBuilder {
    /// Set the server URL
    pub fn server_url(mut self, url: impl Into<String>) -> Self {
        self.config.server_url = url.into();
        self
    }

    /// Set the bearer token
    pub fn api_token(mut self, token: impl Into<String>) -> Self {
        self.config.api_token = Some(token.into());
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = secs;
        self
    }

    pub fn sync_interval_secs(mut self, secs: u64) -> Self {
        self.config.sync_interval_secs = secs;
        self
    }

    pub fn background_review_flush(mut self, enabled: bool) -> Self {
        self.config.background_review_flush = enabled;
        self
    }

    pub fn cache_ttl_secs(mut self, secs: u64) -> Self {
        self.config.cache_ttl_secs = secs;
        self
    }

    pub fn retry(mut self, policy: RetryPolicy) -> Self {
        self.config.retry = policy;
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<SyncConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Configuration errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
    #[error("invalid value for {field}: {message}")]
    InvalidValue {
        field: &'static str,
        message: String,
    },
    #[error("failed to parse configuration: {0}")]
    Parse(String),
}
