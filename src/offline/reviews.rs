//! # Review Queue
//!
//! Deduplicating buffer of review submissions, flushed to the server in one
//! batch.
//!
//! ## Features
//!
//! - **One review per card**: a new submission for an already-queued card
//!   replaces the stored review in place (latest wins), so a manual
//!   "incorrect" later confirmed "correct" is sent once, as correct
//! - **Background flush**: every `queue_review` spawns a detached,
//!   best-effort flush whose failure is logged and otherwise ignored. It
//!   steps aside when a flush is already in flight
//! - **Explicit flush**: `flush_queue` sends everything queued and reports
//!   the outcome to the caller
//!
//! ## Usage
//!
//! ```rust,no_run
//! use decksync::offline::reviews::{ReviewQueue, ReviewSubmission};
//!
//! # async fn example(reviews: ReviewQueue) -> Result<(), decksync::shared::SyncError> {
//! reviews.queue_review(ReviewSubmission::new("card-1", false)).await?;
//! reviews.queue_review(ReviewSubmission::new("card-1", true)).await?;
//! assert_eq!(reviews.get_pending_count().await?, 1);
//!
//! let synced = reviews.flush_queue().await?;
//! # Ok(())
//! # }
//! ```

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::api::RemoteApi;
use crate::shared::error::{StorageError, SyncError};
use crate::storage::{get_json, set_json, KeyValueStore};
use crate::sync::network_monitor::Connectivity;

/// Storage key for queued reviews
pub const REVIEWS_KEY: &str = "offline:reviews";
/// Storage key for flush bookkeeping
pub const SYNC_META_KEY: &str = "offline:sync_meta";

const REVIEW_ID_PREFIX: &str = "review_";

/// Review outcome as submitted by the caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewSubmission {
    pub card_id: String,
    pub ok: bool,
    pub user_answer: Option<String>,
}

impl ReviewSubmission {
    pub fn new(card_id: impl Into<String>, ok: bool) -> Self {
        Self {
            card_id: card_id.into(),
            ok,
            user_answer: None,
        }
    }

    pub fn with_answer(mut self, answer: impl Into<String>) -> Self {
        self.user_answer = Some(answer.into());
        self
    }
}

/// Review waiting to be pushed
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct QueuedReview {
    /// `review_<uuid>`, fresh per submission
    pub review_id: String,
    pub card_id: String,
    pub ok: bool,
    #[serde(default)]
    pub user_answer: Option<String>,
    pub reviewed_at: DateTime<Utc>,
}

impl QueuedReview {
    fn from_submission(submission: ReviewSubmission) -> Self {
        Self {
            review_id: format!("{}{}", REVIEW_ID_PREFIX, Uuid::new_v4()),
            card_id: submission.card_id,
            ok: submission.ok,
            user_answer: submission.user_answer,
            reviewed_at: Utc::now(),
        }
    }
}

/// Flush bookkeeping
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SyncMetadata {
    /// Local time of the last successful flush
    pub last_sync_time: Option<DateTime<Utc>>,
    /// Server clock reported by that flush
    #[serde(default)]
    pub last_server_time: Option<DateTime<Utc>>,
}

/// Queued reviews indexed by card
///
/// Persisted as the ordered entry list; the index is rebuilt on load.
#[derive(Debug, Default)]
struct ReviewLedger {
    entries: Vec<QueuedReview>,
    by_card: HashMap<String, usize>,
}

impl ReviewLedger {
    fn from_entries(stored: Vec<QueuedReview>) -> Self {
        let mut ledger = Self::default();
        for review in stored {
            ledger.upsert(review);
        }
        ledger
    }

    /// Insert or replace in place; returns true when a review was replaced
    fn upsert(&mut self, review: QueuedReview) -> bool {
        match self.by_card.get(&review.card_id) {
            Some(&index) => {
                self.entries[index] = review;
                true
            }
            None => {
                self.by_card.insert(review.card_id.clone(), self.entries.len());
                self.entries.push(review);
                false
            }
        }
    }

    /// Drop the exact reviews that were sent; replacements queued since stay
    fn remove_sent(&mut self, sent: &[QueuedReview]) {
        let sent_ids: HashSet<&str> = sent.iter().map(|r| r.review_id.as_str()).collect();
        let remaining = std::mem::take(&mut self.entries)
            .into_iter()
            .filter(|review| !sent_ids.contains(review.review_id.as_str()))
            .collect();
        *self = Self::from_entries(remaining);
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

struct Inner {
    store: Arc<dyn KeyValueStore>,
    api: Arc<dyn RemoteApi>,
    connectivity: Option<Arc<dyn Connectivity>>,
    background_flush: bool,
    /// Guards read-modify-write of both owned keys
    write_lock: Mutex<()>,
    /// One flush in flight at a time
    flush_lock: Mutex<()>,
}

/// Deduplicating review buffer
///
/// Cheap to clone; clones share the same queue.
#[derive(Clone)]
pub struct ReviewQueue {
    inner: Arc<Inner>,
}

impl fmt::Debug for ReviewQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReviewQueue")
            .field("key", &REVIEWS_KEY)
            .field("background_flush", &self.inner.background_flush)
            .finish()
    }
}

impl ReviewQueue {
    pub fn new(store: Arc<dyn KeyValueStore>, api: Arc<dyn RemoteApi>) -> Self {
        Self::build(store, api, None, true)
    }

    /// Skip background flushes while `connectivity` reports offline
    pub fn with_connectivity(
        store: Arc<dyn KeyValueStore>,
        api: Arc<dyn RemoteApi>,
        connectivity: Arc<dyn Connectivity>,
        background_flush: bool,
    ) -> Self {
        Self::build(store, api, Some(connectivity), background_flush)
    }

    /// Queue without the per-submission background flush
    pub fn without_background_flush(store: Arc<dyn KeyValueStore>, api: Arc<dyn RemoteApi>) -> Self {
        Self::build(store, api, None, false)
    }

    fn build(
        store: Arc<dyn KeyValueStore>,
        api: Arc<dyn RemoteApi>,
        connectivity: Option<Arc<dyn Connectivity>>,
        background_flush: bool,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                api,
                connectivity,
                background_flush,
                write_lock: Mutex::new(()),
                flush_lock: Mutex::new(()),
            }),
        }
    }

    /// Queue a review, replacing any queued review for the same card, then
    /// kick off a background flush
    pub async fn queue_review(&self, submission: ReviewSubmission) -> Result<QueuedReview, StorageError> {
        let review = QueuedReview::from_submission(submission);

        let replaced = {
            let _guard = self.inner.write_lock.lock().await;
            let mut ledger = self.load_ledger().await?;
            let replaced = ledger.upsert(review.clone());
            self.save_ledger(&ledger).await?;
            replaced
        };

        debug!(card_id = %review.card_id, ok = review.ok, replaced, "Queued review");

        if self.inner.background_flush {
            self.spawn_background_flush();
        }
        Ok(review)
    }

    /// Number of distinct cards with a queued review
    pub async fn get_pending_count(&self) -> Result<usize, StorageError> {
        Ok(self.load_ledger().await?.len())
    }

    /// Snapshot of queued reviews in queue order
    pub async fn pending_reviews(&self) -> Result<Vec<QueuedReview>, StorageError> {
        Ok(self.load_ledger().await?.entries)
    }

    /// Send every queued review as one batch
    ///
    /// Returns the number sent, `0` without any remote call when nothing is
    /// queued. On failure the queue is left as it was and the error is
    /// returned.
    pub async fn flush_queue(&self) -> Result<usize, SyncError> {
        let _flush = self.inner.flush_lock.lock().await;
        self.send_pending().await
    }

    /// Push the current batch; caller holds `flush_lock`
    async fn send_pending(&self) -> Result<usize, SyncError> {
        let batch = self.pending_reviews().await?;
        if batch.is_empty() {
            return Ok(0);
        }

        let response = self.inner.api.push_reviews(&batch).await?;

        {
            let _guard = self.inner.write_lock.lock().await;
            let mut ledger = self.load_ledger().await?;
            ledger.remove_sent(&batch);
            self.save_ledger(&ledger).await?;

            let meta = SyncMetadata {
                last_sync_time: Some(Utc::now()),
                last_server_time: response.server_time,
            };
            set_json(self.inner.store.as_ref(), SYNC_META_KEY, &meta).await?;
        }

        info!(count = batch.len(), created = response.created, "Flushed review queue");
        Ok(batch.len())
    }

    /// Drop all queued reviews and the last sync time
    pub async fn clear_review_queue(&self) -> Result<(), StorageError> {
        let _guard = self.inner.write_lock.lock().await;
        self.inner.store.remove(REVIEWS_KEY).await?;
        self.inner.store.remove(SYNC_META_KEY).await?;
        debug!("Cleared review queue");
        Ok(())
    }

    pub async fn get_last_sync_time(&self) -> Result<Option<DateTime<Utc>>, StorageError> {
        Ok(self.sync_metadata().await?.last_sync_time)
    }

    pub async fn sync_metadata(&self) -> Result<SyncMetadata, StorageError> {
        Ok(get_json(self.inner.store.as_ref(), SYNC_META_KEY)
            .await?
            .unwrap_or_default())
    }

    /// Fire-and-forget flush; the outcome is only logged
    ///
    /// Does nothing while offline or while another flush is in flight.
    pub fn spawn_background_flush(&self) {
        let queue = self.clone();
        tokio::spawn(async move {
            if let Some(connectivity) = &queue.inner.connectivity {
                if !connectivity.is_online() {
                    debug!("Skipping background review flush while offline");
                    return;
                }
            }

            let Ok(_flush) = queue.inner.flush_lock.try_lock() else {
                debug!("Review flush already in flight; skipping background flush");
                return;
            };

            match queue.send_pending().await {
                Ok(0) => {}
                Ok(count) => debug!(count, "Background review flush succeeded"),
                Err(e) => warn!(error = %e, "Background review flush failed"),
            }
        });
    }

    async fn load_ledger(&self) -> Result<ReviewLedger, StorageError> {
        let stored: Vec<QueuedReview> = get_json(self.inner.store.as_ref(), REVIEWS_KEY)
            .await?
            .unwrap_or_default();
        Ok(ReviewLedger::from_entries(stored))
    }

    async fn save_ledger(&self, ledger: &ReviewLedger) -> Result<(), StorageError> {
        if ledger.entries.is_empty() {
            self.inner.store.remove(REVIEWS_KEY).await
        } else {
            set_json(self.inner.store.as_ref(), REVIEWS_KEY, &ledger.entries).await
        }
    }
}
