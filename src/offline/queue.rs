//! # Operation Queue
//!
//! Durable FIFO of structural mutations (add/remove/reorder lists, delete
//! deck) waiting to be confirmed by the server.
//!
//! ## Features
//!
//! - **Persistent Queue**: the whole queue lives under one storage key and
//!   survives restarts
//! - **FIFO Order**: drain order is insertion order
//! - **Status Tracking**: failed drain attempts set `failed`, bump
//!   `retry_count` and record the error and the next allowed attempt
//! - **Serialized Writes**: every read-modify-write of the stored queue runs
//!   under one async mutex, so concurrent `enqueue`/`dequeue` calls never
//!   overwrite each other's effect
//!
//! ## Usage
//!
//! ```rust,no_run
//! use decksync::offline::queue::{Operation, OperationQueue};
//! use decksync::storage::MemoryStore;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), decksync::shared::StorageError> {
//! let queue = OperationQueue::new(Arc::new(MemoryStore::new()));
//!
//! let queued = queue.enqueue(Operation::add_list("deck-1", None)).await?;
//! for op in queue.get_queue().await? {
//!     // Execute operation...
//!     queue.dequeue(op.id).await?;
//! }
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use crate::offline::retry::RetryPolicy;
use crate::shared::error::StorageError;
use crate::storage::{get_json, set_json, KeyValueStore};

/// Storage key owned by the operation queue
pub const QUEUE_KEY: &str = "offline:operations";

/// Structural operation awaiting server confirmation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Operation {
    /// Add a deck to "my lists"
    #[serde(rename_all = "camelCase")]
    AddList {
        deck_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        icon: Option<String>,
    },
    /// Remove a deck from "my lists"
    #[serde(rename_all = "camelCase")]
    RemoveList { deck_id: String },
    /// Replace the order of "my lists"
    #[serde(rename_all = "camelCase")]
    ReorderLists { deck_ids: Vec<String> },
    /// Delete a deck outright
    #[serde(rename_all = "camelCase")]
    DeleteDeck { deck_id: String },
}

/// Operation type without its payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    AddList,
    RemoveList,
    ReorderLists,
    DeleteDeck,
}

impl OperationKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            OperationKind::AddList => "ADD_LIST",
            OperationKind::RemoveList => "REMOVE_LIST",
            OperationKind::ReorderLists => "REORDER_LISTS",
            OperationKind::DeleteDeck => "DELETE_DECK",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Operation {
    pub fn add_list(deck_id: impl Into<String>, icon: Option<String>) -> Self {
        Operation::AddList {
            deck_id: deck_id.into(),
            icon,
        }
    }

    pub fn remove_list(deck_id: impl Into<String>) -> Self {
        Operation::RemoveList {
            deck_id: deck_id.into(),
        }
    }

    pub fn reorder_lists<I, S>(deck_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Operation::ReorderLists {
            deck_ids: deck_ids.into_iter().map(Into::into).collect(),
        }
    }

    pub fn delete_deck(deck_id: impl Into<String>) -> Self {
        Operation::DeleteDeck {
            deck_id: deck_id.into(),
        }
    }

    pub fn kind(&self) -> OperationKind {
        match self {
            Operation::AddList { .. } => OperationKind::AddList,
            Operation::RemoveList { .. } => OperationKind::RemoveList,
            Operation::ReorderLists { .. } => OperationKind::ReorderLists,
            Operation::DeleteDeck { .. } => OperationKind::DeleteDeck,
        }
    }
}

/// Operation execution status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OperationStatus {
    /// Not yet attempted
    Pending,
    /// Last attempt failed; eligible for retry per the retry policy
    Failed,
}

/// Queued operation with metadata
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QueuedOperation {
    /// Unique per enqueue, never reused
    pub id: Uuid,
    /// Operation type and payload
    #[serde(flatten)]
    pub operation: Operation,
    pub status: OperationStatus,
    /// Failed drain attempts so far
    pub retry_count: u32,
    pub queued_at: DateTime<Utc>,
    #[serde(default)]
    pub last_attempt: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_error: Option<String>,
    /// Backoff gate; `None` means due now
    #[serde(default)]
    pub next_attempt_at: Option<DateTime<Utc>>,
}

impl QueuedOperation {
    fn new(operation: Operation) -> Self {
        Self {
            id: Uuid::new_v4(),
            operation,
            status: OperationStatus::Pending,
            retry_count: 0,
            queued_at: Utc::now(),
            last_attempt: None,
            last_error: None,
            next_attempt_at: None,
        }
    }

    pub fn kind(&self) -> OperationKind {
        self.operation.kind()
    }
}

/// Queue statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueueStats {
    /// Total operations in queue
    pub total_operations: usize,
    /// Never attempted
    pub pending: usize,
    /// Attempted and failed at least once
    pub failed: usize,
}

/// Durable FIFO of structural operations
pub struct OperationQueue {
    store: Arc<dyn KeyValueStore>,
    /// Guards every read-modify-write of `QUEUE_KEY`
    write_lock: Mutex<()>,
}

impl fmt::Debug for OperationQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationQueue").field("key", &QUEUE_KEY).finish()
    }
}

impl OperationQueue {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            write_lock: Mutex::new(()),
        }
    }

    /// Append an operation with a fresh id and `pending` status
    pub async fn enqueue(&self, operation: Operation) -> Result<QueuedOperation, StorageError> {
        let queued = QueuedOperation::new(operation);
        let entry = queued.clone();

        self.mutate(move |operations| operations.push(entry)).await?;

        debug!(op_id = %queued.id, kind = %queued.kind(), "Enqueued operation");
        Ok(queued)
    }

    /// Remove the operation with `id`; returns whether it was present
    pub async fn dequeue(&self, id: Uuid) -> Result<bool, StorageError> {
        let removed = self
            .mutate(|operations| {
                let before = operations.len();
                operations.retain(|op| op.id != id);
                operations.len() != before
            })
            .await?;

        if removed {
            debug!(op_id = %id, "Dequeued operation");
        }
        Ok(removed)
    }

    /// Snapshot of the queue in insertion order
    pub async fn get_queue(&self) -> Result<Vec<QueuedOperation>, StorageError> {
        Ok(get_json(self.store.as_ref(), QUEUE_KEY)
            .await?
            .unwrap_or_default())
    }

    /// Look up a single operation
    pub async fn get(&self, id: Uuid) -> Result<Option<QueuedOperation>, StorageError> {
        Ok(self.get_queue().await?.into_iter().find(|op| op.id == id))
    }

    /// Empty the queue
    pub async fn clear_queue(&self) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().await;
        self.store.remove(QUEUE_KEY).await?;
        debug!("Cleared operation queue");
        Ok(())
    }

    /// Record a failed attempt: `failed` status, `retry_count + 1`, error and
    /// backoff gate per `policy`
    ///
    /// Returns the updated entry, or `None` when the operation was dequeued in
    /// the meantime.
    pub async fn mark_failed(
        &self,
        id: Uuid,
        error: &str,
        policy: &RetryPolicy,
    ) -> Result<Option<QueuedOperation>, StorageError> {
        let now = Utc::now();
        self.mutate(|operations| {
            let op = operations.iter_mut().find(|op| op.id == id)?;
            op.status = OperationStatus::Failed;
            op.retry_count += 1;
            op.last_attempt = Some(now);
            op.last_error = Some(error.to_string());
            op.next_attempt_at = Some(policy.next_attempt_at(op.retry_count, now));
            Some(op.clone())
        })
        .await
    }

    /// Put an exhausted or backed-off operation back to `pending` with a
    /// clean retry count
    pub async fn reset_retries(&self, id: Uuid) -> Result<bool, StorageError> {
        self.mutate(|operations| match operations.iter_mut().find(|op| op.id == id) {
            Some(op) => {
                op.status = OperationStatus::Pending;
                op.retry_count = 0;
                op.next_attempt_at = None;
                true
            }
            None => false,
        })
        .await
    }

    /// Reset every operation past `policy`'s retry limit in one write
    ///
    /// Returns the ids that were reset, in queue order.
    pub async fn reset_exhausted(&self, policy: &RetryPolicy) -> Result<Vec<Uuid>, StorageError> {
        let reset = self
            .mutate(|operations| {
                operations
                    .iter_mut()
                    .filter(|op| policy.is_exhausted(op.retry_count))
                    .map(|op| {
                        op.status = OperationStatus::Pending;
                        op.retry_count = 0;
                        op.next_attempt_at = None;
                        op.id
                    })
                    .collect::<Vec<_>>()
            })
            .await?;

        if !reset.is_empty() {
            debug!(count = reset.len(), "Reset exhausted operations");
        }
        Ok(reset)
    }

    pub async fn len(&self) -> Result<usize, StorageError> {
        Ok(self.get_queue().await?.len())
    }

    pub async fn is_empty(&self) -> Result<bool, StorageError> {
        Ok(self.len().await? == 0)
    }

    /// Get operation statistics
    pub async fn stats(&self) -> Result<QueueStats, StorageError> {
        let operations = self.get_queue().await?;
        let failed = operations
            .iter()
            .filter(|op| op.status == OperationStatus::Failed)
            .count();

        Ok(QueueStats {
            total_operations: operations.len(),
            pending: operations.len() - failed,
            failed,
        })
    }

    /// Load, change and store the queue as one critical section
    async fn mutate<F, R>(&self, change: F) -> Result<R, StorageError>
    where
        F: FnOnce(&mut Vec<QueuedOperation>) -> R,
    {
        let _guard = self.write_lock.lock().await;

        let mut operations: Vec<QueuedOperation> = get_json(self.store.as_ref(), QUEUE_KEY)
            .await?
            .unwrap_or_default();
        let result = change(&mut operations);

        if operations.is_empty() {
            self.store.remove(QUEUE_KEY).await?;
        } else {
            set_json(self.store.as_ref(), QUEUE_KEY, &operations).await?;
        }
        Ok(result)
    }
}
