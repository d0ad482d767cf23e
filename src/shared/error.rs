//! Shared Error Types
//!
//! Error taxonomy for the offline sync engine.
//!
//! # Error Categories
//!
//! - `StorageError` - persisted key-value substrate failures. Fatal to the
//!   calling operation, never retried internally.
//! - `ApiError` - network or server failures from the remote API. Recoverable:
//!   they drive `failed` status and retry counts on queued operations, or
//!   leave reviews queued for the next flush.
//! - `ConfigError` - invalid configuration values.
//! - `SyncError` - crate-level error wrapping all of the above.
//!
//! # Usage
//!
//! ```rust
//! use decksync::shared::error::{ApiError, SyncError};
//!
//! let error: SyncError = ApiError::network("connection refused").into();
//! assert!(error.is_recoverable());
//! ```
use thiserror::Error;

use crate::shared::config::ConfigError;

/// Failures of the persisted key-value substrate
#[derive(Debug, Error, Clone)]
pub enum StorageError {
    /// The storage backend rejected or failed the request
    #[error("Storage backend error: {message}")]
    Backend {
        /// Human-readable error message
        message: String,
    },

    /// A stored value could not be encoded or decoded
    #[error("Serialization error for key '{key}': {message}")]
    Serialization {
        /// Key whose value failed to (de)serialize
        key: String,
        /// Human-readable error message
        message: String,
    },
}

impl StorageError {
    /// Create a new backend error
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
        }
    }

    /// Create a new serialization error
    pub fn serialization(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Serialization {
            key: key.into(),
            message: message.into(),
        }
    }
}

impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        Self::backend(format!("SQLite error: {}", err))
    }
}

/// Failures of a remote API call
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// The request never produced a response
    #[error("Network error: {message}")]
    Network {
        /// Human-readable error message
        message: String,
    },

    /// The server answered with a non-success status
    #[error("Server error {status}: {message}")]
    Server {
        /// HTTP status code
        status: u16,
        /// Response body or status text
        message: String,
    },

    /// The response body could not be decoded
    #[error("Decode error: {message}")]
    Decode {
        /// Human-readable error message
        message: String,
    },

    /// The server answered successfully but refused the payload
    #[error("Rejected by server: {message}")]
    Rejected {
        /// Human-readable error message
        message: String,
    },
}

impl ApiError {
    /// Create a new network error
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    /// Create a new server error
    pub fn server(status: u16, message: impl Into<String>) -> Self {
        Self::Server {
            status,
            message: message.into(),
        }
    }

    /// Create a new decode error
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    /// Create a new rejection error
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected {
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::decode(err.to_string())
        } else if let Some(status) = err.status() {
            Self::server(status.as_u16(), err.to_string())
        } else {
            Self::network(err.to_string())
        }
    }
}

/// Crate-level error
#[derive(Debug, Error, Clone)]
pub enum SyncError {
    /// Persisted storage failed
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Remote API call failed
    #[error(transparent)]
    Api(#[from] ApiError),

    /// Configuration was rejected
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl SyncError {
    /// Whether retrying later may succeed
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Api(_))
    }
}
