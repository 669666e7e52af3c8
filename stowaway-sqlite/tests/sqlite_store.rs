use std::path::Path;
use std::sync::Arc;

use http::Method;
use stowaway::RequestCache;
use stowaway::config::CacheConfig;
use stowaway_core::{Payload, StoredValue};
use stowaway_sqlite::SqliteProvider;
use stowaway_store::{DeleteStatus, KeyValueStore, StoreError, StoreProvider};
use tempfile::TempDir;

#[tokio::test]
async fn text_and_binary_values_round_trip() {
    let provider = SqliteProvider::in_memory().unwrap();
    let store = provider.shared_store();

    let text = StoredValue::new(Payload::text_with_type("héllo", "text/plain"));
    let binary = StoredValue::new(Payload::new(vec![0u8, 159, 146, 150]));
    store.set("GET__/text", text.clone()).await.unwrap();
    store.set("GET__/bin", binary.clone()).await.unwrap();

    assert_eq!(store.get("GET__/text").await.unwrap(), Some(text));
    assert_eq!(store.get("GET__/bin").await.unwrap(), Some(binary));
    assert_eq!(store.get("GET__/none").await.unwrap(), None);
}

#[tokio::test]
async fn set_replaces_existing_value() {
    let provider = SqliteProvider::in_memory().unwrap();
    let store = provider.shared_store();

    store.set("k", StoredValue::new(Payload::new("old"))).await.unwrap();
    store.set("k", StoredValue::new(Payload::new("new"))).await.unwrap();

    let keys = store.keys().await.unwrap();
    assert_eq!(keys, vec!["k"]);
    let value = store.get("k").await.unwrap().unwrap();
    assert_eq!(value.payload().text().unwrap(), "new");
}

#[tokio::test]
async fn remove_and_clear() {
    let provider = SqliteProvider::in_memory().unwrap();
    let store = provider.shared_store();
    store.set("a", StoredValue::new(Payload::new("1"))).await.unwrap();
    store.set("b", StoredValue::new(Payload::new("2"))).await.unwrap();

    assert_eq!(store.remove("a").await.unwrap(), DeleteStatus::Deleted);
    assert_eq!(store.remove("a").await.unwrap(), DeleteStatus::Missing);

    store.clear().await.unwrap();
    assert!(store.keys().await.unwrap().is_empty());
}

#[tokio::test]
async fn named_instances_do_not_share_entries() {
    let provider = SqliteProvider::in_memory().unwrap();
    let tiles = provider.named("tiles", "map tiles").unwrap();
    let shared = provider.shared();

    tiles.set("k", StoredValue::new(Payload::new("tile"))).await.unwrap();
    shared.set("k", StoredValue::new(Payload::new("shared"))).await.unwrap();

    tiles.clear().await.unwrap();
    assert!(tiles.get("k").await.unwrap().is_none());
    assert!(shared.get("k").await.unwrap().is_some());
}

#[tokio::test]
async fn invalid_instance_name_is_rejected() {
    let provider = SqliteProvider::in_memory().unwrap();
    let result = provider.named("drop table;", "");
    assert!(matches!(result, Err(StoreError::InvalidInstance { .. })));
}

#[tokio::test]
async fn entries_survive_reopen() {
    let dir = TempDir::new().unwrap();

    {
        let provider = SqliteProvider::builder().path(dir.path()).build().unwrap();
        let store = provider.instance("offline").unwrap();
        store
            .set("GET__/a", StoredValue::new(Payload::new("persisted")))
            .await
            .unwrap();
    }

    let provider = SqliteProvider::builder().path(dir.path()).build().unwrap();
    let store = provider.instance("offline").unwrap();
    let value = store.get("GET__/a").await.unwrap().unwrap();
    assert_eq!(value.payload().text().unwrap(), "persisted");
    assert!(dir.path().join("cache.db").exists());
}

fn insert_raw(db_dir: &Path, key: &str, bytes: &[u8]) {
    let conn = rusqlite::Connection::open(db_dir.join("cache.db")).unwrap();
    conn.execute(
        "INSERT INTO \"stowaway_shared\" (key, value) VALUES (?1, ?2)",
        rusqlite::params![key, bytes],
    )
    .unwrap();
}

#[tokio::test]
async fn undecodable_rows_are_skipped_by_iteration() {
    let dir = TempDir::new().unwrap();
    let provider = SqliteProvider::builder().path(dir.path()).build().unwrap();
    let store = provider.shared_store();
    store
        .set("app:GET__/good", StoredValue::new(Payload::new("fine")))
        .await
        .unwrap();
    insert_raw(dir.path(), "app:GET__/bad", &[0xFF, 0xFF, 0xFF, 0xFF]);

    let mut visited = Vec::new();
    store
        .iterate(&mut |key: &str, _: &StoredValue| visited.push(key.to_owned()))
        .await
        .unwrap();
    assert_eq!(visited, vec!["app:GET__/good".to_owned()]);

    let keys = store.keys().await.unwrap();
    assert_eq!(keys, vec!["app:GET__/good".to_owned(), "app:GET__/bad".to_owned()]);
    assert!(matches!(
        store.get("app:GET__/bad").await,
        Err(StoreError::FormatError(_))
    ));
}

#[tokio::test]
async fn shared_namespace_scans_and_flushes_past_a_corrupt_row() {
    let dir = TempDir::new().unwrap();
    let provider = SqliteProvider::builder().path(dir.path()).build().unwrap();
    let shared = provider.shared();
    shared
        .set("app:GET__/good", StoredValue::new(Payload::new("fine")))
        .await
        .unwrap();
    shared
        .set("other:GET__/kept", StoredValue::new(Payload::new("theirs")))
        .await
        .unwrap();
    insert_raw(dir.path(), "app:GET__/bad", &[0xFF, 0xFF, 0xFF, 0xFF]);

    let cache = RequestCache::builder()
        .config(CacheConfig::default().key_prefix("app:"))
        .with_store(Arc::clone(&shared), false);
    let summary = cache.initialize().await.unwrap();
    assert_eq!(summary.keys, 1);
    assert_eq!(cache.weak_len(), 1);
    assert!(cache.lookup(&Method::GET, "/good").await.is_hit());

    cache.flush().await.unwrap();
    assert!(shared.get("app:GET__/good").await.unwrap().is_none());
    assert_eq!(shared.keys().await.unwrap(), vec!["other:GET__/kept".to_owned()]);
    assert_eq!(cache.stats().memory, 0);
}
