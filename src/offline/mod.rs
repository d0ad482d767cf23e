//! # Offline Engine
//!
//! Offline-first deck list management: changes show up locally at once and
//! reach the server whenever connectivity allows.
//!
//! ## Architecture
//!
//! - **Optimistic Cache**: immediate local effect of a user action
//! - **Operation Queue**: durable record of the structural change, drained
//!   later by the sync orchestrator
//! - **Review Queue**: deduplicated review submissions with their own flush
//! - **Retry Policy**: backoff and retry limit for failed operations
//!
//! ## Key Components
//!
//! - `optimistic.rs`: cached list views and their local mutations
//! - `queue.rs`: operation queue
//! - `reviews.rs`: review queue
//! - `retry.rs`: retry and backoff policy
//!
//! `OfflineClient` wires them together. Each structural call applies the
//! cache change and then enqueues the operation. These are two separate
//! writes: a crash in between leaves the cache ahead of the queue, which the
//! next refresh from the server corrects.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use decksync::offline::OfflineClient;
//! use decksync::shared::SyncConfig;
//!
//! # async fn example() -> Result<(), decksync::shared::SyncError> {
//! let client = OfflineClient::open(SyncConfig::from_env()?).await?;
//!
//! client.add_list("deck-1", Some("star")).await?;
//! let report = client.process_queue().await?;
//! # Ok(())
//! # }
//! ```

pub mod optimistic;
pub mod queue;
pub mod retry;
pub mod reviews;

// Re-export main types
pub use optimistic::{CachedListView, ListView, OptimisticCache};
pub use queue::{Operation, OperationKind, OperationQueue, OperationStatus, QueueStats, QueuedOperation};
pub use retry::RetryPolicy;
pub use reviews::{QueuedReview, ReviewQueue, ReviewSubmission, SyncMetadata};

use std::fmt;
use std::sync::Arc;

use tracing::info;

use crate::api::{HttpApi, RemoteApi};
use crate::shared::config::SyncConfig;
use crate::shared::deck::{CardSummary, ListSummary};
use crate::shared::error::SyncError;
use crate::storage::{KeyValueStore, SqliteStore};
use crate::sync::{NetworkMonitor, SchedulerHandle, SyncOrchestrator, SyncReport, SyncScheduler};

/// Offline-first client over one store and one remote API
pub struct OfflineClient {
    config: SyncConfig,
    api: Arc<dyn RemoteApi>,
    monitor: Arc<NetworkMonitor>,
    queue: Arc<OperationQueue>,
    reviews: ReviewQueue,
    cache: OptimisticCache,
    sync: Arc<SyncOrchestrator>,
}

impl fmt::Debug for OfflineClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OfflineClient")
            .field("server_url", &self.config.server_url)
            .field("queue", &self.queue)
            .field("reviews", &self.reviews)
            .finish()
    }
}

impl OfflineClient {
    /// Client that starts out online
    pub fn new(store: Arc<dyn KeyValueStore>, api: Arc<dyn RemoteApi>, config: SyncConfig) -> Self {
        Self::with_monitor(store, api, Arc::new(NetworkMonitor::default()), config)
    }

    pub fn with_monitor(
        store: Arc<dyn KeyValueStore>,
        api: Arc<dyn RemoteApi>,
        monitor: Arc<NetworkMonitor>,
        config: SyncConfig,
    ) -> Self {
        let queue = Arc::new(OperationQueue::new(store.clone()));
        let reviews = ReviewQueue::with_connectivity(
            store.clone(),
            api.clone(),
            monitor.clone(),
            config.background_review_flush,
        );
        let cache = OptimisticCache::new(store);
        let sync = Arc::new(SyncOrchestrator::new(
            queue.clone(),
            api.clone(),
            monitor.clone(),
            config.retry.clone(),
        ));

        Self {
            config,
            api,
            monitor,
            queue,
            reviews,
            cache,
            sync,
        }
    }

    /// SQLite store at the default path and the HTTP API from `config`
    pub async fn open(config: SyncConfig) -> Result<Self, SyncError> {
        let api = HttpApi::new(&config)?;
        let store = SqliteStore::open_default().await?;
        info!(server_url = %config.server_url, "Opened offline client");
        Ok(Self::new(Arc::new(store), Arc::new(api), config))
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn monitor(&self) -> &Arc<NetworkMonitor> {
        &self.monitor
    }

    pub fn queue(&self) -> &OperationQueue {
        &self.queue
    }

    pub fn reviews(&self) -> &ReviewQueue {
        &self.reviews
    }

    pub fn cache(&self) -> &OptimisticCache {
        &self.cache
    }

    pub fn orchestrator(&self) -> &Arc<SyncOrchestrator> {
        &self.sync
    }

    pub fn set_online(&self, online: bool) {
        self.monitor.set_online(online);
    }

    pub async fn add_list(&self, deck_id: &str, icon: Option<&str>) -> Result<QueuedOperation, SyncError> {
        self.cache.add_list(deck_id, icon).await?;
        let op = Operation::add_list(deck_id, icon.map(str::to_string));
        Ok(self.queue.enqueue(op).await?)
    }

    pub async fn remove_list(&self, deck_id: &str) -> Result<QueuedOperation, SyncError> {
        self.cache.remove_list(deck_id).await?;
        Ok(self.queue.enqueue(Operation::remove_list(deck_id)).await?)
    }

    pub async fn delete_deck(&self, deck_id: &str) -> Result<QueuedOperation, SyncError> {
        self.cache.delete_deck(deck_id).await?;
        Ok(self.queue.enqueue(Operation::delete_deck(deck_id)).await?)
    }

    pub async fn reorder_lists<S: AsRef<str>>(&self, deck_ids: &[S]) -> Result<QueuedOperation, SyncError> {
        self.cache.reorder_lists(deck_ids).await?;
        let op = Operation::reorder_lists(deck_ids.iter().map(|id| id.as_ref().to_string()));
        Ok(self.queue.enqueue(op).await?)
    }

    pub async fn queue_review(&self, submission: ReviewSubmission) -> Result<QueuedReview, SyncError> {
        Ok(self.reviews.queue_review(submission).await?)
    }

    pub async fn process_queue(&self) -> Result<SyncReport, SyncError> {
        self.sync.process_queue().await
    }

    /// Reset operations past the retry limit so the next pass sends them
    pub async fn retry_exhausted(&self) -> Result<usize, SyncError> {
        self.sync.retry_exhausted().await
    }

    pub async fn flush_reviews(&self) -> Result<usize, SyncError> {
        self.sync.flush_reviews(&self.reviews).await
    }

    pub async fn refresh(&self, view: ListView) -> Result<Vec<ListSummary>, SyncError> {
        self.cache.refresh_list_view(view, self.api.as_ref()).await
    }

    pub async fn refresh_cards(&self, deck_id: &str) -> Result<Vec<CardSummary>, SyncError> {
        self.cache.refresh_cards(deck_id, self.api.as_ref()).await
    }

    /// Whether `view` is missing or older than the configured TTL
    pub async fn is_stale(&self, view: ListView) -> Result<bool, SyncError> {
        Ok(!self.cache.is_fresh(view, self.config.cache_ttl()).await?)
    }

    /// Run passes every `sync_interval` and on reconnect
    pub fn start_scheduler(&self) -> SchedulerHandle {
        SyncScheduler::new(self.sync.clone(), self.config.sync_interval(), self.monitor.subscribe())
            .with_reviews(self.reviews.clone())
            .spawn()
    }

    /// Empty both queues and the cache, e.g. on sign-out
    pub async fn clear_all(&self) -> Result<(), SyncError> {
        self.queue.clear_queue().await?;
        self.cache.clear_cache().await?;
        self.reviews.clear_review_queue().await?;
        info!("Cleared offline state");
        Ok(())
    }
}
