//! HTTP sync tests
//!
//! `OfflineClient` over `SqliteStore` and `HttpApi`, against a mock REST
//! server.

use std::sync::Arc;

use decksync::api::HttpApi;
use decksync::offline::{ListView, OfflineClient, OperationStatus, ReviewSubmission};
use decksync::shared::ApiError;
use decksync::storage::SqliteStore;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common::{config_for, init_tracing, mount_reviews_ok, mount_structural_ok, received_routes};

async fn client_for(server: &MockServer) -> OfflineClient {
    init_tracing();
    let config = config_for(server);
    let api = HttpApi::new(&config).expect("api");
    let store = SqliteStore::open_in_memory().await.expect("store");
    OfflineClient::new(Arc::new(store), Arc::new(api), config)
}

#[tokio::test]
async fn test_queued_operations_reach_server_in_order() {
    let server = MockServer::start().await;
    mount_structural_ok(&server).await;
    let client = client_for(&server).await;

    client.set_online(false);
    client.add_list("d1", Some("star")).await.unwrap();
    client.reorder_lists(&["d1", "d2"]).await.unwrap();
    client.remove_list("d2").await.unwrap();
    client.delete_deck("d3").await.unwrap();
    assert!(received_routes(&server).await.is_empty());

    client.set_online(true);
    let report = client.process_queue().await.unwrap();
    assert_eq!(report.succeeded, 4);

    assert_eq!(
        received_routes(&server).await,
        vec![
            "POST /api/lists",
            "PUT /api/lists/order",
            "DELETE /api/lists/d2",
            "DELETE /api/decks/d3",
        ]
    );

    let requests = server.received_requests().await.unwrap();
    let add: Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(add, json!({"deckId": "d1", "icon": "star"}));
    let reorder: Value = serde_json::from_slice(&requests[1].body).unwrap();
    assert_eq!(reorder, json!({"deckIds": ["d1", "d2"]}));
}

#[tokio::test]
async fn test_server_error_marks_operation_failed() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/api/decks/d1"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;
    let client = client_for(&server).await;

    let op = client.delete_deck("d1").await.unwrap();
    let report = client.process_queue().await.unwrap();

    assert_eq!(report.failed, vec![(op.id, ApiError::server(500, "boom"))]);
    let stored = client.queue().get(op.id).await.unwrap().unwrap();
    assert_eq!(stored.status, OperationStatus::Failed);
    assert_eq!(stored.retry_count, 1);
}

#[tokio::test]
async fn test_review_batch_payload() {
    let server = MockServer::start().await;
    mount_reviews_ok(&server, 2).await;
    let client = client_for(&server).await;

    client.queue_review(ReviewSubmission::new("c1", false)).await.unwrap();
    client.queue_review(ReviewSubmission::new("c2", true)).await.unwrap();
    client
        .queue_review(ReviewSubmission::new("c1", true).with_answer("perro"))
        .await
        .unwrap();

    assert_eq!(client.flush_reviews().await.unwrap(), 2);

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
    let reviews = body["reviews"].as_array().unwrap();
    assert_eq!(reviews.len(), 2);
    assert_eq!(reviews[0]["cardId"], "c1");
    assert_eq!(reviews[0]["ok"], true);
    assert_eq!(reviews[0]["userAnswer"], "perro");
    assert!(reviews[0]["reviewId"].as_str().unwrap().starts_with("review_"));
    assert!(reviews[1]["reviewedAt"].is_string());

    let meta = client.reviews().sync_metadata().await.unwrap();
    assert!(meta.last_sync_time.is_some());
    assert_eq!(
        meta.last_server_time.map(|t| t.to_rfc3339()),
        Some("2026-03-01T12:00:00+00:00".to_string())
    );
}

#[tokio::test]
async fn test_refresh_replaces_cached_view() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/lists"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": "p1", "title": "Public one", "isOwned": false, "cardCount": 4},
            {"id": "p2", "title": "Public two", "isOwned": false, "cardCount": 9}
        ])))
        .mount(&server)
        .await;
    let client = client_for(&server).await;

    assert!(client.is_stale(ListView::AllLists).await.unwrap());
    let lists = client.refresh(ListView::AllLists).await.unwrap();
    assert_eq!(lists.len(), 2);
    assert!(!client.is_stale(ListView::AllLists).await.unwrap());

    let cached = client.cache().all_lists().await.unwrap().unwrap();
    assert_eq!(cached.data[1].card_count, 9);
}
