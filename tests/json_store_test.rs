//! Tests for the JSON file subscriber store.

mod common;

use chrono::Utc;
use common::subscriber;
use common::teardown_store;
use common::temp_store_path;
use exam_watch::entity::Subscriber;
use exam_watch::entity::SubscriberPatch;
use exam_watch::repository::JsonFileStore;
use exam_watch::repository::SubscriberStore;
use exam_watch::repository::error::StoreError;

#[tokio::test]
async fn test_open_creates_missing_file() {
    let path = temp_store_path();
    assert!(!path.exists());

    let store = JsonFileStore::open(path.clone()).await.unwrap();

    assert!(path.exists());
    assert!(store.list().await.unwrap().is_empty());
    teardown_store(path);
}

#[tokio::test]
async fn test_changes_survive_reopen() {
    let path = temp_store_path();
    let store = JsonFileStore::open(path.clone()).await.unwrap();

    let checked = Utc::now();
    store.insert(subscriber("alice", "01001000001")).await.unwrap();
    store.insert(subscriber("bob", "01001000002")).await.unwrap();
    assert!(
        store
            .update("alice", &SubscriberPatch::checked_at(checked))
            .await
            .unwrap()
    );
    assert!(
        store
            .update("alice", &SubscriberPatch::notified("2025-03-01"))
            .await
            .unwrap()
    );
    assert!(store.delete("bob").await.unwrap());
    drop(store);

    let reopened = JsonFileStore::open(path.clone()).await.unwrap();
    let all = reopened.list().await.unwrap();
    assert_eq!(all.len(), 1);
    let alice = &all[0];
    assert_eq!(alice.id, "alice");
    assert_eq!(alice.last_checked_at, Some(checked));
    assert!(alice.notified);
    assert_eq!(alice.notified_for_occurrence.as_deref(), Some("2025-03-01"));
    teardown_store(path);
}

#[tokio::test]
async fn test_unknown_id_is_not_an_error() {
    let path = temp_store_path();
    let store = JsonFileStore::open(path.clone()).await.unwrap();

    assert!(
        !store
            .update("ghost", &SubscriberPatch::cleared())
            .await
            .unwrap()
    );
    assert!(!store.delete("ghost").await.unwrap());
    assert!(store.get("ghost").await.unwrap().is_none());
    teardown_store(path);
}

#[tokio::test]
async fn test_unknown_id_does_not_rewrite_file() {
    let path = temp_store_path();
    let store = JsonFileStore::open(path.clone()).await.unwrap();
    store.insert(subscriber("alice", "01001000001")).await.unwrap();
    // Any rewrite would replace this with the serialized document.
    std::fs::write(&path, "untouched").unwrap();

    assert!(
        !store
            .update("ghost", &SubscriberPatch::checked_at(Utc::now()))
            .await
            .unwrap()
    );
    assert!(!store.delete("ghost").await.unwrap());
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "untouched");

    assert!(store.delete("alice").await.unwrap());
    assert_ne!(std::fs::read_to_string(&path).unwrap(), "untouched");
    teardown_store(path);
}

#[tokio::test]
async fn test_insert_generates_id_and_replaces_same_watch() {
    let path = temp_store_path();
    let store = JsonFileStore::open(path.clone()).await.unwrap();

    let first = store
        .insert(Subscriber::new("", "01001000001", 4, 2))
        .await
        .unwrap();
    assert!(!first.is_empty());

    // Same subject and category, new location: replaces the first record.
    let second = store
        .insert(Subscriber::new("", "01001000001", 4, 7))
        .await
        .unwrap();

    let all = store.list().await.unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].id, second);
    assert_eq!(all[0].watch_location, 7);
    teardown_store(path);
}

#[tokio::test]
async fn test_reads_registration_document() {
    let path = temp_store_path();
    std::fs::write(
        &path,
        r#"{"users":[{"id":"1","personalNumber":"01001000001","categoryCode":4,"centerId":2,"notified":false}]}"#,
    )
    .unwrap();

    let store = JsonFileStore::open(path.clone()).await.unwrap();
    let sub = store.get("1").await.unwrap().expect("subscriber");

    assert_eq!(sub.subject_key, "01001000001");
    assert!(sub.last_checked_at.is_none());
    teardown_store(path);
}

#[tokio::test]
async fn test_malformed_document_is_rejected() {
    let path = temp_store_path();
    std::fs::write(&path, "{ not json").unwrap();

    let result = JsonFileStore::open(path.clone()).await;

    assert!(matches!(result, Err(StoreError::Malformed(_))));
    teardown_store(path);
}
