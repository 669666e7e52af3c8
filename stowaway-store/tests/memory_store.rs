use std::sync::Arc;

use stowaway_core::{Payload, StoredValue};
use stowaway_store::{
    DeleteStatus, KeyValueStore, MemoryProvider, MemoryStore, StoreError, StoreProvider,
};

fn value(text: &str) -> StoredValue {
    StoredValue::new(Payload::new(text))
}

#[tokio::test]
async fn set_get_remove() {
    let store = MemoryStore::new();

    assert_eq!(store.get("GET__/a").await.unwrap(), None);

    store.set("GET__/a", value("alpha")).await.unwrap();
    let stored = store.get("GET__/a").await.unwrap().unwrap();
    assert_eq!(stored.payload(), &Payload::new("alpha"));

    assert_eq!(store.remove("GET__/a").await.unwrap(), DeleteStatus::Deleted);
    assert_eq!(store.remove("GET__/a").await.unwrap(), DeleteStatus::Missing);
    assert!(store.is_empty());
}

#[tokio::test]
async fn iterate_visits_every_entry() {
    let store = MemoryStore::new();
    store.set("a", value("1")).await.unwrap();
    store.set("b", value("22")).await.unwrap();
    store.set("c", value("333")).await.unwrap();

    let mut total = 0;
    store
        .iterate(&mut |_: &str, v: &StoredValue| total += v.size_estimate())
        .await
        .unwrap();
    assert_eq!(total, 6);

    let mut keys = store.keys().await.unwrap();
    keys.sort();
    assert_eq!(keys, vec!["a", "b", "c"]);
}

#[tokio::test]
async fn last_write_wins() {
    let store = Arc::new(MemoryStore::new());

    let writes = (0..16).map(|i| {
        let store = store.clone();
        tokio::spawn(async move { store.set("same", value(&format!("v{i}"))).await })
    });
    for write in futures::future::join_all(writes).await {
        write.unwrap().unwrap();
    }

    assert_eq!(store.len(), 1);
    let stored = store.get("same").await.unwrap().unwrap();
    assert!(stored.payload().text().unwrap().starts_with('v'));
}

#[tokio::test]
async fn named_instances_are_isolated_and_reused() {
    let provider = MemoryProvider::new();

    let first = provider.named("tiles", "map tiles").unwrap();
    first.set("k", value("v")).await.unwrap();

    let again = provider.named("tiles", "map tiles").unwrap();
    assert!(again.get("k").await.unwrap().is_some());

    assert!(provider.shared().get("k").await.unwrap().is_none());
    assert!(provider.named("other", "").unwrap().get("k").await.unwrap().is_none());

    again.clear().await.unwrap();
    assert!(provider.instance("tiles").unwrap().is_empty());
}

#[test]
fn empty_instance_name_is_rejected() {
    let provider = MemoryProvider::new();
    assert!(matches!(
        provider.named("", ""),
        Err(StoreError::InvalidInstance { .. })
    ));
}
