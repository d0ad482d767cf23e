//! Offline flow tests
//!
//! Queue, review, drain and cache behavior through `OfflineClient` with a
//! scripted API and a store that interleaves at every access.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use decksync::offline::{
    ListView, OfflineClient, Operation, OperationQueue, OperationStatus, ReviewQueue, ReviewSubmission,
};
use decksync::shared::{ListSummary, SyncError};
use decksync::storage::{KeyValueStore, MemoryStore};
use decksync::sync::NetworkMonitor;
use futures_util::future::join_all;
use pretty_assertions::assert_eq;

use crate::common::{init_tracing, test_config, Call, ScriptedApi, YieldingStore};

fn client_with(store: Arc<dyn KeyValueStore>) -> (OfflineClient, Arc<ScriptedApi>) {
    init_tracing();
    let api = ScriptedApi::new();
    let client = OfflineClient::new(store, api.clone(), test_config());
    (client, api)
}

fn client() -> (OfflineClient, Arc<ScriptedApi>) {
    client_with(YieldingStore::new())
}

fn remove(deck_id: &str) -> Call {
    Call::RemoveList {
        deck_id: deck_id.to_string(),
    }
}

#[tokio::test]
async fn test_ten_concurrent_enqueues_all_survive() {
    let queue = OperationQueue::new(YieldingStore::new());

    let enqueues = (0..10).map(|i| queue.enqueue(Operation::add_list(format!("d_{}", i), None)));
    let created = join_all(enqueues).await;

    let queued = crate::assert_ok!(queue.get_queue().await);
    assert_eq!(queued.len(), 10);

    let ids: HashSet<_> = queued.iter().map(|op| op.id).collect();
    assert_eq!(ids.len(), 10);
    for op in created {
        assert!(ids.contains(&op.unwrap().id));
    }

    let decks: HashSet<String> = queued
        .iter()
        .filter_map(|op| match &op.operation {
            Operation::AddList { deck_id, .. } => Some(deck_id.clone()),
            _ => None,
        })
        .collect();
    let expected: HashSet<String> = (0..10).map(|i| format!("d_{}", i)).collect();
    assert_eq!(decks, expected);
}

#[tokio::test]
async fn test_concurrent_dequeue_and_enqueue() {
    let queue = OperationQueue::new(YieldingStore::new());
    let op1 = queue.enqueue(Operation::remove_list("d1")).await.unwrap();
    let op2 = queue.enqueue(Operation::remove_list("d2")).await.unwrap();

    let (removed, op3) = tokio::join!(queue.dequeue(op1.id), queue.enqueue(Operation::remove_list("d3")));
    assert!(removed.unwrap());
    let op3 = op3.unwrap();

    let ids: Vec<_> = queue.get_queue().await.unwrap().iter().map(|op| op.id).collect();
    assert_eq!(ids, vec![op2.id, op3.id]);
}

#[tokio::test]
async fn test_review_dedup_keeps_latest_outcome() {
    let (client, _api) = client();

    client.queue_review(ReviewSubmission::new("c1", false)).await.unwrap();
    client
        .queue_review(ReviewSubmission::new("c1", true).with_answer("gato"))
        .await
        .unwrap();

    let reviews = client.reviews();
    assert_eq!(reviews.get_pending_count().await.unwrap(), 1);
    let pending = reviews.pending_reviews().await.unwrap();
    assert!(pending[0].ok);
    assert_eq!(pending[0].user_answer.as_deref(), Some("gato"));

    client.queue_review(ReviewSubmission::new("c2", false)).await.unwrap();
    assert_eq!(reviews.get_pending_count().await.unwrap(), 2);
}

#[tokio::test]
async fn test_flush_empty_queue_sends_nothing() {
    let (client, api) = client();
    assert_eq!(client.flush_reviews().await.unwrap(), 0);
    assert!(api.calls().is_empty());
}

#[tokio::test]
async fn test_flush_success_and_failure() {
    let (client, api) = client();
    client.queue_review(ReviewSubmission::new("c1", true)).await.unwrap();
    client.queue_review(ReviewSubmission::new("c2", false)).await.unwrap();

    api.fail_reviews(true);
    let error = client.flush_reviews().await.unwrap_err();
    assert!(error.is_recoverable());
    assert_eq!(client.reviews().get_pending_count().await.unwrap(), 2);
    assert!(client.reviews().get_last_sync_time().await.unwrap().is_none());

    api.fail_reviews(false);
    assert_eq!(client.flush_reviews().await.unwrap(), 2);
    assert_eq!(client.reviews().get_pending_count().await.unwrap(), 0);
    assert!(client.reviews().get_last_sync_time().await.unwrap().is_some());

    let batches = api.review_batches();
    assert_eq!(batches.len(), 2);
    let cards: Vec<_> = batches[1].iter().map(|r| r.card_id.as_str()).collect();
    assert_eq!(cards, vec!["c1", "c2"]);

    let metrics = client.orchestrator().metrics().await;
    assert_eq!(metrics.reviews_flushed, 2);
    assert_eq!(metrics.review_flush_failures, 1);
}

#[tokio::test]
async fn test_background_flush_failure_stays_queued() {
    init_tracing();
    let api = ScriptedApi::new();
    api.fail_reviews(true);
    let reviews = ReviewQueue::new(Arc::new(MemoryStore::new()), api.clone());

    let queued = reviews.queue_review(ReviewSubmission::new("c1", true)).await;
    assert!(queued.is_ok());

    for _ in 0..50 {
        if !api.calls().is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(api.review_batches().len(), 1);
    assert_eq!(reviews.get_pending_count().await.unwrap(), 1);
}

#[tokio::test]
async fn test_offline_pass_then_online_drain() {
    let (client, api) = client();
    client.set_online(false);

    client.add_list("d1", Some("star")).await.unwrap();
    client.reorder_lists(&["d1", "d0"]).await.unwrap();
    client.delete_deck("d9").await.unwrap();

    let report = client.process_queue().await.unwrap();
    assert!(report.offline);
    assert_eq!(client.queue().len().await.unwrap(), 3);
    assert!(api.calls().is_empty());

    client.set_online(true);
    let report = client.process_queue().await.unwrap();
    assert_eq!(report.succeeded, 3);
    assert!(client.queue().is_empty().await.unwrap());
    assert_eq!(
        api.calls(),
        vec![
            Call::AddList {
                deck_id: "d1".to_string(),
                icon: Some("star".to_string()),
            },
            Call::ReorderLists {
                deck_ids: vec!["d1".to_string(), "d0".to_string()],
            },
            Call::DeleteDeck {
                deck_id: "d9".to_string(),
            },
        ]
    );
}

#[tokio::test]
async fn test_failed_operation_is_retried_later() {
    let (client, api) = client();
    api.fail("d1");
    let op = client.remove_list("d1").await.unwrap();
    client.remove_list("d2").await.unwrap();

    let report = client.process_queue().await.unwrap();
    assert_eq!(report.succeeded, 1);
    assert_eq!(report.failed.len(), 1);

    let queued = client.queue().get_queue().await.unwrap();
    assert_eq!(queued.len(), 1);
    assert_eq!(queued[0].id, op.id);
    assert_eq!(queued[0].status, OperationStatus::Failed);
    assert_eq!(queued[0].retry_count, 1);
    assert!(queued[0].last_error.as_deref().unwrap().contains("scripted failure"));

    api.heal("d1");
    let report = client.process_queue().await.unwrap();
    assert_eq!(report.succeeded, 1);
    assert!(client.queue().is_empty().await.unwrap());
    assert_eq!(api.calls(), vec![remove("d1"), remove("d2"), remove("d1")]);
}

#[tokio::test]
async fn test_mixed_operations_drain_fifo() {
    let (client, api) = client();
    client.add_list("a", None).await.unwrap();
    client.remove_list("a").await.unwrap();
    client.delete_deck("a").await.unwrap();

    client.process_queue().await.unwrap();

    let kinds: Vec<&str> = api
        .calls()
        .iter()
        .map(|call| match call {
            Call::AddList { .. } => "add",
            Call::RemoveList { .. } => "remove",
            Call::DeleteDeck { .. } => "delete",
            _ => "other",
        })
        .collect();
    assert_eq!(kinds, vec!["add", "remove", "delete"]);
}

#[tokio::test]
async fn test_cache_membership_rules() {
    let (client, api) = client();
    api.serve_my_lists(vec![
        ListSummary::new("a", "Alpha"),
        ListSummary::new("b", "Beta").owned(),
        ListSummary::new("c", "Gamma"),
    ]);
    api.serve_all_lists(vec![ListSummary::new("x", "Public")]);
    api.serve_available_personal(vec![ListSummary::new("b", "Beta").owned()]);
    api.serve_cards("b", vec![decksync::shared::CardSummary::new("k1", "b", "uno", "one")]);
    api.serve_cards("c", vec![decksync::shared::CardSummary::new("k2", "c", "dos", "two")]);

    for view in [ListView::MyLists, ListView::AllLists, ListView::AvailablePersonalDecks] {
        client.refresh(view).await.unwrap();
    }
    client.refresh_cards("b").await.unwrap();
    client.refresh_cards("c").await.unwrap();
    let cache = client.cache();

    client.add_list("x", None).await.unwrap();
    crate::assert_view_ids!(cache.my_lists().await.unwrap(), ["a", "b", "c", "x"]);
    crate::assert_view_lacks!(cache.all_lists().await.unwrap(), "x");

    client.remove_list("a").await.unwrap();
    crate::assert_view_ids!(cache.all_lists().await.unwrap(), ["a"]);
    crate::assert_view_lacks!(cache.my_lists().await.unwrap(), "a");

    client.delete_deck("b").await.unwrap();
    crate::assert_view_lacks!(cache.my_lists().await.unwrap(), "b");
    crate::assert_view_lacks!(cache.available_personal_decks().await.unwrap(), "b");
    assert!(cache.cards("b").await.unwrap().is_none());
    assert!(cache.cards("c").await.unwrap().is_some());

    client.add_list("a", None).await.unwrap();
    client.reorder_lists(&["c", "a", "x"]).await.unwrap();
    crate::assert_view_ids!(cache.my_lists().await.unwrap(), ["c", "a", "x"]);
    crate::assert_view_lacks!(cache.all_lists().await.unwrap(), "a");

    // the network saw none of this yet
    assert!(api.calls().is_empty());
    assert_eq!(client.queue().len().await.unwrap(), 5);
}

#[tokio::test]
async fn test_clear_all_leaves_nothing_behind() {
    let store = Arc::new(MemoryStore::new());
    let (client, api) = client_with(store.clone());
    api.serve_my_lists(vec![ListSummary::new("a", "Alpha")]);
    client.refresh(ListView::MyLists).await.unwrap();
    client.refresh_cards("a").await.unwrap();
    client.remove_list("a").await.unwrap();
    client.queue_review(ReviewSubmission::new("c1", true)).await.unwrap();
    client.flush_reviews().await.unwrap();
    client.queue_review(ReviewSubmission::new("c2", true)).await.unwrap();

    client.clear_all().await.unwrap();

    assert!(client.queue().get_queue().await.unwrap().is_empty());
    assert_eq!(client.reviews().get_pending_count().await.unwrap(), 0);
    assert!(client.reviews().get_last_sync_time().await.unwrap().is_none());
    assert!(store.keys_with_prefix("cache:").await.unwrap().is_empty());
    assert!(store.is_empty().await);
}

#[tokio::test]
async fn test_scheduler_drains_on_reconnect() {
    init_tracing();
    let api = ScriptedApi::new();
    let monitor = Arc::new(NetworkMonitor::default());
    monitor.set_online(false);
    let client = OfflineClient::with_monitor(Arc::new(MemoryStore::new()), api.clone(), monitor, test_config());

    client.remove_list("d1").await.unwrap();
    client.queue_review(ReviewSubmission::new("c1", true)).await.unwrap();
    let scheduler = client.start_scheduler();
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(api.calls().is_empty());

    client.set_online(true);
    for _ in 0..100 {
        if api.calls().len() >= 2 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    scheduler.stop().await;

    assert_eq!(api.calls()[0], remove("d1"));
    assert_eq!(api.review_batches().len(), 1);
    assert!(client.queue().is_empty().await.unwrap());
    assert_eq!(client.reviews().get_pending_count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_storage_failure_surfaces_as_storage_error() {
    let store = Arc::new(MemoryStore::new());
    store
        .set(decksync::offline::queue::QUEUE_KEY, "not json".to_string())
        .await
        .unwrap();
    let (client, _api) = client_with(store.clone());

    let error = client.process_queue().await.unwrap_err();
    assert_matches!(error, SyncError::Storage(_));
    assert!(!error.is_recoverable());
}

#[tokio::test]
async fn test_exhausted_operation_drains_after_reconnect() {
    let (client, api) = client();
    let limit = client.config().retry.max_retries.unwrap_or_default();
    api.fail("d1");
    let op = client.remove_list("d1").await.unwrap();
    for _ in 0..limit {
        client.process_queue().await.unwrap();
    }
    api.heal("d1");

    let report = client.process_queue().await.unwrap();
    assert_eq!(report.attempted, 0);
    assert_eq!(report.exhausted, vec![op.id]);

    let scheduler = client.start_scheduler();
    tokio::time::sleep(Duration::from_millis(20)).await;
    client.set_online(false);
    tokio::time::sleep(Duration::from_millis(20)).await;
    client.set_online(true);

    let sent = limit as usize + 1;
    for _ in 0..100 {
        if api.calls().len() >= sent {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    scheduler.stop().await;

    assert_eq!(api.calls().len(), sent);
    assert!(client.queue().is_empty().await.unwrap());
}

#[tokio::test]
async fn test_retry_exhausted_gives_fresh_budget() {
    let (client, api) = client();
    let limit = client.config().retry.max_retries.unwrap_or_default();
    api.fail("d1");
    let op = client.remove_list("d1").await.unwrap();
    for _ in 0..limit {
        client.process_queue().await.unwrap();
    }
    api.heal("d1");

    assert_eq!(client.retry_exhausted().await.unwrap(), 1);
    let reset = client.queue().get(op.id).await.unwrap().unwrap();
    assert_eq!(reset.status, OperationStatus::Pending);
    assert_eq!(reset.retry_count, 0);

    assert_eq!(client.process_queue().await.unwrap().succeeded, 1);
    assert!(client.queue().is_empty().await.unwrap());
}

#[tokio::test]
async fn test_concurrent_reviews_for_distinct_cards_all_survive() {
    let store = YieldingStore::new();
    let reviews = ReviewQueue::without_background_flush(store.clone(), ScriptedApi::new());

    let queued = join_all((0..10).map(|i| reviews.queue_review(ReviewSubmission::new(format!("c_{}", i), true)))).await;
    assert!(queued.iter().all(Result::is_ok));
    assert_eq!(store.writes(), 10);

    let cards: HashSet<String> = reviews
        .pending_reviews()
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.card_id)
        .collect();
    let expected: HashSet<String> = (0..10).map(|i| format!("c_{}", i)).collect();
    assert_eq!(cards, expected);
}
