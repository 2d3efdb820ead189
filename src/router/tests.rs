//! Tests for queue routing over a mocked store.

use linkbroker_testing::{LoggerHandle, logger};
use mockall::Sequence;
use rstest::rstest;

use super::{Cursor, MemoryStore, MockQueueStore, QueueRouter, QueueStore, StoreError};
use crate::message::StorageMessage;

fn message(body: &[u8]) -> StorageMessage { StorageMessage::new(100, body) }

#[test]
fn post_creates_missing_queue_before_posting() {
    let mut store = MockQueueStore::new();
    let mut seq = Sequence::new();
    store
        .expect_exists()
        .withf(|queue| queue.to_string() == "orders")
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_| Ok(false));
    store
        .expect_create()
        .withf(|queue| queue.to_string() == "orders")
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_| Ok(()));
    store
        .expect_post()
        .withf(|queue, messages, _| {
            queue.to_string() == "orders" && *messages == vec![message(b"hi")]
        })
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _, _| Ok(()));

    let mut router = QueueRouter::new(store);
    assert!(router.post("orders", message(b"hi")));
}

#[test]
fn post_skips_creation_for_existing_queue() {
    let mut store = MockQueueStore::new();
    store.expect_exists().returning(|_| Ok(true));
    store.expect_create().never();
    store.expect_post().times(1).returning(|_, _, _| Ok(()));

    let mut router = QueueRouter::new(store);
    assert_eq!(router.try_post("orders", message(b"hi")), Ok(()));
}

#[test]
fn each_post_carries_a_fresh_client_id() {
    let ids = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
    let seen = std::sync::Arc::clone(&ids);
    let mut store = MockQueueStore::new();
    store.expect_exists().returning(|_| Ok(true));
    store.expect_post().times(2).returning(move |_, _, id| {
        seen.lock().expect("lock").push(id);
        Ok(())
    });

    let mut router = QueueRouter::new(store);
    router.post("orders", message(b"a"));
    router.post("orders", message(b"b"));

    let ids = ids.lock().expect("lock");
    assert_eq!(ids.len(), 2);
    assert_ne!(ids[0], ids[1]);
}

#[rstest]
fn post_fault_is_logged_not_raised(mut logger: LoggerHandle) {
    logger.clear();
    let mut store = MockQueueStore::new();
    store
        .expect_exists()
        .returning(|_| Err(StoreError::Unavailable("backend down".into())));
    store.expect_post().never();

    let mut router = QueueRouter::new(store);
    assert!(!router.post("orders", message(b"hi")));

    assert!(logger.contains("failed to post message: queue=orders"));
}

#[test]
fn fetch_returns_empty_for_missing_queue() {
    let mut store = MockQueueStore::new();
    store
        .expect_list()
        .returning(|queue| Err(StoreError::NotFound(queue.to_string())));

    let mut router = QueueRouter::new(store);
    assert_eq!(router.try_fetch("nowhere"), Ok(Vec::new()));
    assert!(router.fetch("nowhere").is_empty());
}

#[rstest]
fn fetch_fault_is_distinguishable_internally(mut logger: LoggerHandle) {
    logger.clear();
    let mut store = MockQueueStore::new();
    store
        .expect_list()
        .returning(|_| Err(StoreError::Unavailable("timeout".into())));

    let mut router = QueueRouter::new(store);
    assert_eq!(
        router.try_fetch("orders"),
        Err(StoreError::Unavailable("timeout".into()))
    );
    assert!(router.fetch("orders").is_empty());
    assert!(logger.contains("failed to fetch messages: queue=orders"));
}

#[test]
fn fetch_materialises_at_most_the_limit() {
    let mut store = MockQueueStore::new();
    store.expect_list().returning(|_| {
        let cursor: Cursor = Box::new((0..100u8).map(|i| StorageMessage::new(100, vec![i])));
        Ok(cursor)
    });

    let mut router = QueueRouter::new(store).with_fetch_limit(3);
    let fetched = router.fetch("orders");
    assert_eq!(
        fetched.iter().map(|m| m.body[0]).collect::<Vec<_>>(),
        vec![0, 1, 2]
    );
}

#[rstest]
fn drop_queue_fault_is_swallowed(mut logger: LoggerHandle) {
    logger.clear();
    let mut store = MockQueueStore::new();
    store
        .expect_delete()
        .withf(|queue| queue.to_string() == "orders")
        .times(1)
        .returning(|_| Err(StoreError::Other("locked".into())));

    let mut router = QueueRouter::new(store);
    router.drop_queue("orders");
    assert!(logger.contains("failed to delete queue: queue=orders"));
}

#[test]
fn memory_store_round_trips_through_router() {
    let mut router = QueueRouter::new(MemoryStore::new());
    assert!(router.fetch("orders").is_empty());

    router.post("orders", message(b"first"));
    router.post("orders", message(b"second"));
    assert_eq!(router.store().depth("orders"), Some(2));

    let fetched = router.fetch("orders");
    assert_eq!(fetched, vec![message(b"first"), message(b"second")]);

    router.drop_queue("orders");
    assert_eq!(router.store().depth("orders"), None);
    assert!(router.fetch("orders").is_empty());
}

#[test]
fn memory_store_rejects_post_to_missing_queue() {
    let mut store = MemoryStore::new();
    assert_eq!(
        store.post("orders", vec![message(b"x")], uuid::Uuid::new_v4()),
        Err(StoreError::NotFound("orders".into()))
    );
}
