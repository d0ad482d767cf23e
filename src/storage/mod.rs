//! # Persisted Key-Value Storage
//!
//! The storage substrate shared by the queues and the optimistic cache.
//! It offers get/set by string key with read-your-writes, and nothing more:
//! no cross-key transactions, no compare-and-swap, no key-level locking.
//! Components that read-modify-write a key must serialize that cycle
//! themselves.
//!
//! ## Backends
//!
//! - `memory.rs`: `MemoryStore`, process-local, used in tests and as a
//!   scratch store
//! - `sqlite.rs`: `SqliteStore`, a single `kv_store` table on disk
//!
//! Values are JSON text. `get_json` / `set_json` wrap the (de)serialization
//! so callers work with typed values.

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::shared::error::StorageError;

/// Persisted key-value substrate
///
/// Every method is a suspension point; callers must assume other tasks run
/// between any two calls.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read a value, `None` when absent
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Write a value, replacing any previous one
    async fn set(&self, key: &str, value: String) -> Result<(), StorageError>;

    /// Delete a value; absent keys are a no-op
    async fn remove(&self, key: &str) -> Result<(), StorageError>;

    /// List every key starting with `prefix`
    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StorageError>;
}

/// Read and decode a JSON value
pub async fn get_json<T>(store: &dyn KeyValueStore, key: &str) -> Result<Option<T>, StorageError>
where
    T: DeserializeOwned,
{
    match store.get(key).await? {
        Some(raw) => serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| StorageError::serialization(key, e.to_string())),
        None => Ok(None),
    }
}

/// Encode and write a JSON value
pub async fn set_json<T>(store: &dyn KeyValueStore, key: &str, value: &T) -> Result<(), StorageError>
where
    T: Serialize + ?Sized,
{
    let raw = serde_json::to_string(value)
        .map_err(|e| StorageError::serialization(key, e.to_string()))?;
    store.set(key, raw).await
}
