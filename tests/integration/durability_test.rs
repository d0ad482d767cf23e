//! Durability tests
//!
//! Queued work survives closing and reopening the on-disk store.

use std::sync::Arc;

use decksync::offline::{OfflineClient, OperationKind, ReviewSubmission};
use decksync::storage::SqliteStore;
use pretty_assertions::assert_eq;
use tempfile::TempDir;

use crate::common::{init_tracing, test_config, ScriptedApi};

async fn open_client(dir: &TempDir) -> (OfflineClient, Arc<ScriptedApi>) {
    init_tracing();
    let store = SqliteStore::open(dir.path().join("offline.db")).await.expect("open store");
    let api = ScriptedApi::new();
    (OfflineClient::new(Arc::new(store), api.clone(), test_config()), api)
}

#[tokio::test]
async fn test_queues_survive_restart() {
    let dir = TempDir::new().unwrap();

    let (client, api) = open_client(&dir).await;
    client.set_online(false);
    client.add_list("d1", None).await.unwrap();
    client.delete_deck("d2").await.unwrap();
    client.queue_review(ReviewSubmission::new("c1", true)).await.unwrap();
    assert!(api.calls().is_empty());
    drop(client);

    let (client, api) = open_client(&dir).await;
    let kinds: Vec<OperationKind> = client
        .queue()
        .get_queue()
        .await
        .unwrap()
        .iter()
        .map(|op| op.kind())
        .collect();
    assert_eq!(kinds, vec![OperationKind::AddList, OperationKind::DeleteDeck]);
    assert_eq!(client.reviews().get_pending_count().await.unwrap(), 1);

    client.process_queue().await.unwrap();
    client.flush_reviews().await.unwrap();
    assert_eq!(api.calls().len(), 3);
    assert!(client.queue().is_empty().await.unwrap());
    assert_eq!(client.reviews().get_pending_count().await.unwrap(), 0);
}
