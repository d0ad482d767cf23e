/**
 * HTTP Remote API
 *
 * `RemoteApi` over the server's REST endpoints using a shared
 * `reqwest::Client`. Deck ids are pushed as encoded path segments.
 */
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::{PushReviewsResponse, RemoteApi};
use crate::offline::reviews::QueuedReview;
use crate::shared::config::{ConfigError, SyncConfig};
use crate::shared::deck::{CardSummary, ListSummary};
use crate::shared::error::{ApiError, SyncError};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AddListRequest<'a> {
    deck_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    icon: Option<&'a str>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ReorderListsRequest<'a> {
    deck_ids: &'a [String],
}

#[derive(Serialize)]
struct PushReviewsRequest<'a> {
    reviews: &'a [QueuedReview],
}

/// REST client for the server of record
#[derive(Debug, Clone)]
pub struct HttpApi {
    client: Client,
    base: Url,
    token: Option<String>,
}

impl HttpApi {
    pub fn new(config: &SyncConfig) -> Result<Self, SyncError> {
        config.validate()?;

        let base = Url::parse(&config.server_url)
            .map_err(|_| ConfigError::InvalidUrl(config.server_url.clone()))?;
        if base.cannot_be_a_base() {
            return Err(ConfigError::InvalidUrl(config.server_url.clone()).into());
        }

        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(ApiError::from)?;

        Ok(Self {
            client,
            base,
            token: config.api_token.clone(),
        })
    }

    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn request(&self, method: Method, segments: &[&str]) -> RequestBuilder {
        let builder = self.client.request(method, self.url(segments));
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send(builder: RequestBuilder) -> Result<Response, ApiError> {
        let response = builder.send().await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_else(|_| status.to_string());
            return Err(ApiError::server(status.as_u16(), error_text));
        }
        Ok(response)
    }

    async fn send_json<T: DeserializeOwned>(builder: RequestBuilder) -> Result<T, ApiError> {
        Self::send(builder)
            .await?
            .json::<T>()
            .await
            .map_err(|e| ApiError::decode(format!("Failed to parse response: {}", e)))
    }
}

#[async_trait]
impl RemoteApi for HttpApi {
    async fn add_list(&self, deck_id: &str, icon: Option<&str>) -> Result<(), ApiError> {
        let body = AddListRequest { deck_id, icon };
        Self::send(self.request(Method::POST, &["api", "lists"]).json(&body)).await?;
        Ok(())
    }

    async fn remove_list(&self, deck_id: &str) -> Result<(), ApiError> {
        Self::send(self.request(Method::DELETE, &["api", "lists", deck_id])).await?;
        Ok(())
    }

    async fn reorder_lists(&self, deck_ids: &[String]) -> Result<(), ApiError> {
        let body = ReorderListsRequest { deck_ids };
        Self::send(self.request(Method::PUT, &["api", "lists", "order"]).json(&body)).await?;
        Ok(())
    }

    async fn delete_deck(&self, deck_id: &str) -> Result<(), ApiError> {
        Self::send(self.request(Method::DELETE, &["api", "decks", deck_id])).await?;
        Ok(())
    }

    async fn push_reviews(&self, reviews: &[QueuedReview]) -> Result<PushReviewsResponse, ApiError> {
        let body = PushReviewsRequest { reviews };
        let response: PushReviewsResponse =
            Self::send_json(self.request(Method::POST, &["api", "reviews"]).json(&body)).await?;

        if !response.ok {
            return Err(ApiError::rejected("review batch not accepted"));
        }
        Ok(response)
    }

    async fn fetch_my_lists(&self) -> Result<Vec<ListSummary>, ApiError> {
        Self::send_json(self.request(Method::GET, &["api", "lists", "mine"])).await
    }

    async fn fetch_all_lists(&self) -> Result<Vec<ListSummary>, ApiError> {
        Self::send_json(self.request(Method::GET, &["api", "lists"])).await
    }

    async fn fetch_available_personal_decks(&self) -> Result<Vec<ListSummary>, ApiError> {
        Self::send_json(self.request(Method::GET, &["api", "decks", "personal", "available"])).await
    }

    async fn fetch_cards(&self, deck_id: &str) -> Result<Vec<CardSummary>, ApiError> {
        Self::send_json(self.request(Method::GET, &["api", "decks", deck_id, "cards"])).await
    }
}
