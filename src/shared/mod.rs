//! Shared Module
//!
//! Types shared by every component of the sync engine: the error taxonomy,
//! configuration, and the list/card summary shapes exchanged with the server.

/// Error types
pub mod error;

/// Engine configuration
pub mod config;

/// Deck list and card summaries
pub mod deck;

/// Re-export commonly used types for convenience
pub use config::{ConfigError, SyncConfig, SyncConfigBuilder};
pub use deck::{CardSummary, ListSummary};
pub use error::{ApiError, StorageError, SyncError};
