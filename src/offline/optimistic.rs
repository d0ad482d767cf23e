//! # Optimistic Cache
//!
//! Locally cached list views, mutated the instant the user acts so the UI
//! shows the outcome before the server has confirmed it.
//!
//! ## Features
//!
//! - **Immediate Updates**: `add_list`, `remove_list`, `delete_deck` and
//!   `reorder_lists` touch only local state, never the network
//! - **Membership Consistency**: a deck is in "my lists" or in "all lists",
//!   never both; a deleted deck leaves no cards cache behind
//! - **Refresh**: views can be replaced wholesale from the server through
//!   any `RemoteApi`, stamping the refresh time
//!
//! Pairing each mutation with the matching queued operation is the caller's
//! job (see `OfflineClient`).
//!
//! ## Usage
//!
//! ```rust,no_run
//! use decksync::offline::optimistic::OptimisticCache;
//!
//! # async fn example(cache: OptimisticCache) -> Result<(), decksync::shared::StorageError> {
//! cache.add_list("deck-1", Some("star")).await?;
//! cache.reorder_lists(&["deck-1", "deck-0"]).await?;
//!
//! let mine = cache.my_lists().await?;
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::debug;

use crate::api::RemoteApi;
use crate::shared::deck::{CardSummary, ListSummary};
use crate::shared::error::{StorageError, SyncError};
use crate::storage::{get_json, set_json, KeyValueStore};

/// Prefix shared by every key this cache owns
pub const CACHE_PREFIX: &str = "cache:";
pub const MY_LISTS_KEY: &str = "cache:my_lists";
pub const ALL_LISTS_KEY: &str = "cache:all_lists";
pub const AVAILABLE_PERSONAL_DECKS_KEY: &str = "cache:available_personal_decks";
const CARDS_KEY_PREFIX: &str = "cache:cards:";

/// Storage key of the cards cache for one deck
pub fn cards_key(deck_id: &str) -> String {
    format!("{}{}", CARDS_KEY_PREFIX, deck_id)
}

/// A cached view and when it was last written
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CachedListView<T> {
    pub data: Vec<T>,
    pub timestamp: DateTime<Utc>,
}

impl<T> CachedListView<T> {
    pub fn new(data: Vec<T>) -> Self {
        Self {
            data,
            timestamp: Utc::now(),
        }
    }

    /// Whether the view was written less than `ttl` before `now`
    pub fn is_fresh(&self, ttl: chrono::Duration, now: DateTime<Utc>) -> bool {
        now - self.timestamp < ttl
    }
}

/// The deck list views kept in the cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListView {
    MyLists,
    AllLists,
    AvailablePersonalDecks,
}

impl ListView {
    pub const fn key(self) -> &'static str {
        match self {
            ListView::MyLists => MY_LISTS_KEY,
            ListView::AllLists => ALL_LISTS_KEY,
            ListView::AvailablePersonalDecks => AVAILABLE_PERSONAL_DECKS_KEY,
        }
    }

    async fn fetch(self, api: &dyn RemoteApi) -> Result<Vec<ListSummary>, SyncError> {
        let lists = match self {
            ListView::MyLists => api.fetch_my_lists().await?,
            ListView::AllLists => api.fetch_all_lists().await?,
            ListView::AvailablePersonalDecks => api.fetch_available_personal_decks().await?,
        };
        Ok(lists)
    }
}

type ListCache = CachedListView<ListSummary>;

/// Optimistically updated deck list views
pub struct OptimisticCache {
    store: Arc<dyn KeyValueStore>,
    /// Mutations span several keys; one lock keeps them from interleaving
    write_lock: Mutex<()>,
}

impl fmt::Debug for OptimisticCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OptimisticCache")
            .field("prefix", &CACHE_PREFIX)
            .finish()
    }
}

impl OptimisticCache {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            write_lock: Mutex::new(()),
        }
    }

    /// Show `deck_id` in "my lists" and take it out of "all lists"
    ///
    /// The summary comes from "all lists", then "available personal decks",
    /// then a placeholder carrying only the id and icon. A deck already in
    /// "my lists" is updated in place.
    pub async fn add_list(&self, deck_id: &str, icon: Option<&str>) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().await;

        let mut all_lists = self.load(ALL_LISTS_KEY).await?;
        let from_all = all_lists.as_mut().and_then(|view| take_by_id(&mut view.data, deck_id));
        if from_all.is_some() {
            self.save_touched(ALL_LISTS_KEY, all_lists).await?;
        }

        let Some(mut mine) = self.load(MY_LISTS_KEY).await? else {
            debug!(deck_id, "My lists not cached; nothing to add to");
            return Ok(());
        };

        match mine.data.iter_mut().find(|item| item.id == deck_id) {
            Some(existing) => {
                if let Some(icon) = icon {
                    existing.icon = Some(icon.to_string());
                }
            }
            None => {
                let summary = match from_all {
                    Some(summary) => Some(summary),
                    None => self
                        .load(AVAILABLE_PERSONAL_DECKS_KEY)
                        .await?
                        .and_then(|view| view.data.into_iter().find(|item| item.id == deck_id)),
                };
                let mut summary =
                    summary.unwrap_or_else(|| ListSummary::placeholder(deck_id, None));
                if let Some(icon) = icon {
                    summary.icon = Some(icon.to_string());
                }
                mine.data.push(summary);
            }
        }

        self.save_touched(MY_LISTS_KEY, Some(mine)).await?;
        debug!(deck_id, "Optimistically added list");
        Ok(())
    }

    /// Take `deck_id` out of "my lists"; a shared deck goes back to "all lists"
    pub async fn remove_list(&self, deck_id: &str) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().await;

        let mut mine = self.load(MY_LISTS_KEY).await?;
        let Some(removed) = mine.as_mut().and_then(|view| take_by_id(&mut view.data, deck_id)) else {
            return Ok(());
        };
        self.save_touched(MY_LISTS_KEY, mine).await?;

        if !removed.is_owned {
            if let Some(mut all_lists) = self.load(ALL_LISTS_KEY).await? {
                if !all_lists.data.iter().any(|item| item.id == deck_id) {
                    all_lists.data.push(removed);
                    self.save_touched(ALL_LISTS_KEY, Some(all_lists)).await?;
                }
            }
        }

        debug!(deck_id, "Optimistically removed list");
        Ok(())
    }

    /// Drop every trace of `deck_id`: "my lists", "available personal decks"
    /// and its cards
    pub async fn delete_deck(&self, deck_id: &str) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().await;

        for key in [MY_LISTS_KEY, AVAILABLE_PERSONAL_DECKS_KEY] {
            let mut view = self.load(key).await?;
            if view.as_mut().and_then(|v| take_by_id(&mut v.data, deck_id)).is_some() {
                self.save_touched(key, view).await?;
            }
        }
        self.store.remove(&cards_key(deck_id)).await?;

        debug!(deck_id, "Optimistically deleted deck");
        Ok(())
    }

    /// Rewrite the order of "my lists" to follow `deck_ids`
    ///
    /// Unknown ids are ignored. Cached decks not named keep their relative
    /// order after the named ones.
    pub async fn reorder_lists<S: AsRef<str>>(&self, deck_ids: &[S]) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().await;

        let Some(mut mine) = self.load(MY_LISTS_KEY).await? else {
            return Ok(());
        };

        let mut by_id: HashMap<String, ListSummary> = HashMap::new();
        let mut original_order = Vec::with_capacity(mine.data.len());
        for item in mine.data.drain(..) {
            original_order.push(item.id.clone());
            by_id.insert(item.id.clone(), item);
        }

        for id in deck_ids {
            if let Some(item) = by_id.remove(id.as_ref()) {
                mine.data.push(item);
            }
        }
        for id in original_order {
            if let Some(item) = by_id.remove(&id) {
                mine.data.push(item);
            }
        }

        self.save_touched(MY_LISTS_KEY, Some(mine)).await?;
        debug!(count = deck_ids.len(), "Optimistically reordered lists");
        Ok(())
    }

    /// Remove every `cache:*` key
    pub async fn clear_cache(&self) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().await;
        let keys = self.store.keys_with_prefix(CACHE_PREFIX).await?;
        for key in &keys {
            self.store.remove(key).await?;
        }
        debug!(count = keys.len(), "Cleared cache");
        Ok(())
    }

    pub async fn list_view(&self, view: ListView) -> Result<Option<ListCache>, StorageError> {
        self.load(view.key()).await
    }

    pub async fn my_lists(&self) -> Result<Option<ListCache>, StorageError> {
        self.list_view(ListView::MyLists).await
    }

    pub async fn all_lists(&self) -> Result<Option<ListCache>, StorageError> {
        self.list_view(ListView::AllLists).await
    }

    pub async fn available_personal_decks(&self) -> Result<Option<ListCache>, StorageError> {
        self.list_view(ListView::AvailablePersonalDecks).await
    }

    pub async fn cards(&self, deck_id: &str) -> Result<Option<CachedListView<CardSummary>>, StorageError> {
        get_json(self.store.as_ref(), &cards_key(deck_id)).await
    }

    /// Replace a view with server data
    pub async fn store_list_view(&self, view: ListView, data: Vec<ListSummary>) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().await;
        set_json(self.store.as_ref(), view.key(), &CachedListView::new(data)).await
    }

    pub async fn store_cards(&self, deck_id: &str, cards: Vec<CardSummary>) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().await;
        set_json(self.store.as_ref(), &cards_key(deck_id), &CachedListView::new(cards)).await
    }

    /// Fetch a view from the server and cache it
    ///
    /// A failed fetch leaves the cached view as it was.
    pub async fn refresh_list_view(
        &self,
        view: ListView,
        api: &dyn RemoteApi,
    ) -> Result<Vec<ListSummary>, SyncError> {
        let lists = view.fetch(api).await?;
        self.store_list_view(view, lists.clone()).await?;
        debug!(view = ?view, count = lists.len(), "Refreshed list view");
        Ok(lists)
    }

    pub async fn refresh_cards(&self, deck_id: &str, api: &dyn RemoteApi) -> Result<Vec<CardSummary>, SyncError> {
        let cards = api.fetch_cards(deck_id).await?;
        self.store_cards(deck_id, cards.clone()).await?;
        debug!(deck_id, count = cards.len(), "Refreshed cards");
        Ok(cards)
    }

    /// Whether `view` is cached and younger than `ttl`
    pub async fn is_fresh(&self, view: ListView, ttl: chrono::Duration) -> Result<bool, StorageError> {
        Ok(self
            .list_view(view)
            .await?
            .is_some_and(|cached| cached.is_fresh(ttl, Utc::now())))
    }

    async fn load(&self, key: &str) -> Result<Option<ListCache>, StorageError> {
        get_json(self.store.as_ref(), key).await
    }

    /// Persist an optimistically changed view, stamping the change time
    async fn save_touched(&self, key: &str, view: Option<ListCache>) -> Result<(), StorageError> {
        match view {
            Some(mut view) => {
                view.timestamp = Utc::now();
                set_json(self.store.as_ref(), key, &view).await
            }
            None => Ok(()),
        }
    }
}

fn take_by_id(items: &mut Vec<ListSummary>, id: &str) -> Option<ListSummary> {
    let index = items.iter().position(|item| item.id == id)?;
    Some(items.remove(index))
}
