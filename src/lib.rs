//! DeckSync - Offline Sync Engine
//!
//! DeckSync lets a flashcard client keep working while disconnected from its
//! server, then reconciles local changes once connectivity returns, without
//! losing, duplicating or reordering operations.
//!
//! # Overview
//!
//! - A durable operation queue for structural changes (add/remove/reorder
//!   lists, delete deck)
//! - A deduplicating review queue, one pending review per card
//! - A sync orchestrator that drains the operation queue against the remote
//!   API with bounded retry and backoff
//! - An optimistic cache of list views that reflects user actions at once
//!
//! # Module Structure
//!
//! - **`shared`** - error taxonomy, configuration, list/card summaries
//! - **`storage`** - the persisted key-value substrate (`MemoryStore`,
//!   `SqliteStore`)
//! - **`api`** - the remote API boundary and its HTTP implementation
//! - **`offline`** - operation queue, review queue, optimistic cache, retry
//!   policy and the `OfflineClient` facade
//! - **`sync`** - orchestrator, network monitor, scheduler, metrics
//!
//! # Usage
//!
//! ```rust,no_run
//! use decksync::offline::{OfflineClient, ReviewSubmission};
//! use decksync::shared::SyncConfig;
//!
//! # async fn example() -> Result<(), decksync::shared::SyncError> {
//! let client = OfflineClient::open(SyncConfig::from_env()?).await?;
//! let scheduler = client.start_scheduler();
//!
//! client.add_list("deck-1", None).await?;
//! client.queue_review(ReviewSubmission::new("card-7", true)).await?;
//!
//! client.set_online(false);
//! client.remove_list("deck-2").await?; // queued until back online
//! client.set_online(true);
//!
//! scheduler.stop().await;
//! # Ok(())
//! # }
//! ```
//!
//! # Concurrency
//!
//! Every storage read/write and every remote call is a suspension point.
//! Each component owns its storage keys and serializes its own
//! read-modify-write cycles with an async mutex; the store itself offers no
//! transactions.
//!
//! # Error Handling
//!
//! - `StorageError` aborts the calling operation
//! - `ApiError` is recoverable: it marks queued operations `failed` or
//!   leaves reviews queued
//! - `SyncError` wraps both, plus `ConfigError`

/// Shared types and data structures
pub mod shared;

/// Persisted key-value storage
pub mod storage;

/// Remote API boundary
pub mod api;

/// Offline queues and optimistic cache
pub mod offline;

/// Queue draining and scheduling
pub mod sync;
