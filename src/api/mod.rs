//! # Remote API
//!
//! Boundary to the server of record. Every call is asynchronous and may fail
//! with a network or server error; callers treat those failures as
//! recoverable.
//!
//! - `RemoteApi`: the calls the sync engine needs
//! - `http.rs`: `HttpApi`, a `reqwest` implementation against the REST server

pub mod http;

pub use http::HttpApi;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::offline::queue::Operation;
use crate::offline::reviews::QueuedReview;
use crate::shared::deck::{CardSummary, ListSummary};
use crate::shared::error::ApiError;

/// Server answer to a review batch
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PushReviewsResponse {
    pub ok: bool,
    /// Reviews the server recorded
    #[serde(default)]
    pub created: u32,
    #[serde(default)]
    pub server_time: Option<DateTime<Utc>>,
}

/// Remote operations invoked by the sync engine
#[async_trait]
pub trait RemoteApi: Send + Sync {
    async fn add_list(&self, deck_id: &str, icon: Option<&str>) -> Result<(), ApiError>;

    async fn remove_list(&self, deck_id: &str) -> Result<(), ApiError>;

    async fn reorder_lists(&self, deck_ids: &[String]) -> Result<(), ApiError>;

    async fn delete_deck(&self, deck_id: &str) -> Result<(), ApiError>;

    /// Send a batch of reviews, in queue order
    async fn push_reviews(&self, reviews: &[QueuedReview]) -> Result<PushReviewsResponse, ApiError>;

    async fn fetch_my_lists(&self) -> Result<Vec<ListSummary>, ApiError>;

    async fn fetch_all_lists(&self) -> Result<Vec<ListSummary>, ApiError>;

    async fn fetch_available_personal_decks(&self) -> Result<Vec<ListSummary>, ApiError>;

    async fn fetch_cards(&self, deck_id: &str) -> Result<Vec<CardSummary>, ApiError>;
}

/// Invoke the remote call that realizes `operation`
pub async fn execute(api: &dyn RemoteApi, operation: &Operation) -> Result<(), ApiError> {
    match operation {
        Operation::AddList { deck_id, icon } => api.add_list(deck_id, icon.as_deref()).await,
        Operation::RemoveList { deck_id } => api.remove_list(deck_id).await,
        Operation::ReorderLists { deck_ids } => api.reorder_lists(deck_ids).await,
        Operation::DeleteDeck { deck_id } => api.delete_deck(deck_id).await,
    }
}
