use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use http::Method;
use stowaway::config::{CacheConfig, CacheDebug};
use stowaway::{CacheError, CacheStats, Lookup, RequestCache};
use stowaway_core::{Payload, StoredValue};
use stowaway_store::{KeyValueStore, MemoryProvider};
use stowaway_test::MockStore;
use stowaway_test::tracing::EventCapture;

fn cache_over(store: &MockStore, own_store: bool, prefix: &str) -> RequestCache {
    RequestCache::builder()
        .config(CacheConfig::default().key_prefix(prefix))
        .with_store(Arc::new(store.clone()), own_store)
}

#[tokio::test]
async fn stored_values_come_back_unchanged() {
    let store = MockStore::new();
    let cache = cache_over(&store, true, "");

    let text = Payload::text_with_type("héllo wörld", "text/plain");
    let binary = Payload::with_content_type(Bytes::from_static(&[0, 159, 146, 150]), "image/png");
    cache.store(&Method::GET, "/text", text.clone()).await.unwrap();
    cache
        .store(&Method::GET, "/binary", binary.clone())
        .await
        .unwrap();

    let hit = cache.lookup(&Method::GET, "/text").await.into_value().unwrap();
    assert_eq!(hit.payload(), &text);
    let hit = cache
        .lookup(&Method::GET, "/binary")
        .await
        .into_value()
        .unwrap();
    assert_eq!(hit.payload(), &binary);
    assert_eq!(cache.stats().hits, 2);
}

#[tokio::test]
async fn method_is_part_of_the_key() {
    let store = MockStore::new();
    let cache = cache_over(&store, true, "");
    cache.store(&Method::GET, "/a", Payload::new("a")).await.unwrap();

    assert!(store.contains("GET__/a"));
    assert_eq!(cache.lookup(&Method::POST, "/a").await, Lookup::Miss);
}

#[tokio::test]
async fn startup_scan_claims_every_key_of_an_exclusive_store() {
    let store = MockStore::new();
    store.seed("GET__/a", Payload::new("aaa"));
    store.seed("GET__/b", Payload::new("bbbbb"));
    let cache = cache_over(&store, true, "");
    assert!(!cache.is_ready());

    let summary = cache.initialize().await.unwrap();

    assert_eq!(summary.keys, 2);
    assert_eq!(
        cache.stats(),
        CacheStats {
            hits: 0,
            misses: 0,
            memory: 8
        }
    );
    assert!(cache.is_ready());
    assert!(cache.weak_contains(&Method::GET, "/a"));
}

#[tokio::test]
async fn startup_scan_in_shared_store_claims_only_prefixed_keys() {
    let store = MockStore::new();
    store.seed("app:GET__/a", Payload::new("aaa"));
    store.seed("other:GET__/b", Payload::new("bbbbb"));
    store.seed("GET__/c", Payload::new("c"));
    let cache = cache_over(&store, false, "app:");

    cache.initialize().await.unwrap();

    assert_eq!(cache.weak_len(), 1);
    assert_eq!(cache.stats().memory, 3);
}

#[tokio::test]
async fn startup_scan_tolerates_an_empty_store() {
    let store = MockStore::new();
    let cache = cache_over(&store, false, "app:");

    let summary = cache.initialize().await.unwrap();

    assert_eq!(summary.keys, 0);
    assert_eq!(summary.memory, 0);
    assert!(cache.is_ready());
}

#[tokio::test]
async fn failed_scan_still_reports_ready() {
    let store = MockStore::new();
    store.fail_iterate(true);
    let fired = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&fired);
    let cache = RequestCache::builder()
        .on_ready(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .with_store(Arc::new(store.clone()), true);

    let result = cache.initialize().await;

    assert!(matches!(result, Err(CacheError::Scan(_))));
    assert!(cache.is_ready());
    assert_eq!(fired.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn ready_callback_fires_once_with_the_summary() {
    let store = MockStore::new();
    store.seed("GET__/a", Payload::new("abcd"));
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let cache = Arc::new(
        RequestCache::builder()
            .on_ready(move |summary| sink.lock().unwrap().push(*summary))
            .with_store(Arc::new(store.clone()), true),
    );

    let handle = cache.spawn_initialize();
    cache.ready().await;
    handle.await.unwrap().unwrap();
    cache.initialize().await.unwrap();

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].keys, 1);
    assert_eq!(seen[0].memory, 4);
}

#[tokio::test]
async fn rescanning_does_not_double_count_memory() {
    let store = MockStore::new();
    store.seed("GET__/a", Payload::new("abcd"));
    let cache = cache_over(&store, true, "");

    cache.initialize().await.unwrap();
    cache.initialize().await.unwrap();

    assert_eq!(cache.stats().memory, 4);
}

#[tokio::test]
async fn flush_wipes_an_exclusive_store() {
    let store = MockStore::new();
    store.seed("legacy", Payload::new("left by someone else"));
    let cache = cache_over(&store, true, "");
    cache.initialize().await.unwrap();
    cache.store(&Method::GET, "/a", Payload::new("a")).await.unwrap();
    cache.store(&Method::GET, "/b", Payload::new("b")).await.unwrap();

    cache.flush().await.unwrap();

    assert!(store.is_empty());
    assert_eq!(cache.stats().memory, 0);
    assert_eq!(cache.weak_len(), 0);
    assert_eq!(cache.lookup(&Method::GET, "/a").await, Lookup::Miss);
    assert_eq!(cache.lookup(&Method::GET, "/b").await, Lookup::Miss);
}

#[tokio::test]
async fn flush_of_a_shared_store_keeps_foreign_keys() {
    let store = MockStore::new();
    store.seed("other:GET__/x", Payload::new("foreign"));
    store.seed("app:GET__/old", Payload::new("old"));
    let cache = cache_over(&store, false, "app:");
    cache.initialize().await.unwrap();
    cache.store(&Method::GET, "/a", Payload::new("a")).await.unwrap();

    cache.flush().await.unwrap();

    assert!(store.contains("other:GET__/x"));
    assert!(!store.contains("app:GET__/old"));
    assert!(!store.contains("app:GET__/a"));
    assert_eq!(store.counters.clear_count(), 0);
    assert_eq!(cache.stats().memory, 0);
}

#[tokio::test]
async fn flush_without_prefix_removes_only_known_keys() {
    let store = MockStore::new();
    store.seed("GET__/foreign", Payload::new("foreign"));
    let cache = cache_over(&store, false, "");
    cache.store(&Method::GET, "/mine", Payload::new("mine")).await.unwrap();

    cache.flush().await.unwrap();

    assert!(store.contains("GET__/foreign"));
    assert!(!store.contains("GET__/mine"));
}

#[tokio::test]
async fn partial_flush_reports_the_failures() {
    let store = MockStore::new();
    let cache = cache_over(&store, false, "app:");
    cache.store(&Method::GET, "/a", Payload::new("a")).await.unwrap();
    cache.store(&Method::GET, "/b", Payload::new("b")).await.unwrap();
    store.fail_removes(true);

    let result = cache.flush().await;

    assert!(matches!(result, Err(CacheError::Flush { failed: 2, .. })));
    assert_eq!(cache.weak_len(), 2);
    assert_eq!(store.len(), 2);
}

#[tokio::test]
async fn failed_write_leaves_the_namespace_untouched() {
    let store = MockStore::new();
    let cache = cache_over(&store, true, "");
    store.fail_writes(true);

    let result = cache.store(&Method::GET, "/a", Payload::new("abc")).await;

    match result {
        Err(CacheError::Write { key, .. }) => assert_eq!(key, "GET__/a"),
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(cache.weak_len(), 0);
    assert_eq!(cache.stats().memory, 0);
}

#[tokio::test]
async fn read_fault_is_a_miss() {
    let store = MockStore::new();
    let cache = cache_over(&store, true, "");
    cache.store(&Method::GET, "/a", Payload::new("abc")).await.unwrap();
    store.fail_reads(true);

    assert_eq!(cache.lookup(&Method::GET, "/a").await, Lookup::Miss);

    assert_eq!(
        cache.stats(),
        CacheStats {
            hits: 0,
            misses: 1,
            memory: 0
        }
    );
    assert!(!cache.weak_contains(&Method::GET, "/a"));
}

#[tokio::test]
async fn stale_index_is_never_trusted_for_existence() {
    let store = MockStore::new();
    let cache = cache_over(&store, true, "");
    cache.store(&Method::GET, "/a", Payload::new("abc")).await.unwrap();
    store.entries.remove("GET__/a");

    assert!(cache.weak_contains(&Method::GET, "/a"));
    assert_eq!(cache.lookup(&Method::GET, "/a").await, Lookup::Miss);
    assert!(!cache.weak_contains(&Method::GET, "/a"));
}

#[tokio::test]
async fn reset_counters_keeps_memory() {
    let store = MockStore::new();
    let cache = cache_over(&store, true, "");
    cache.store(&Method::GET, "/a", Payload::new("abc")).await.unwrap();
    cache.lookup(&Method::GET, "/a").await;
    cache.lookup(&Method::GET, "/b").await;

    cache.reset_counters();

    assert_eq!(
        cache.stats(),
        CacheStats {
            hits: 0,
            misses: 0,
            memory: 3
        }
    );
    cache.reset_counters();
    assert_eq!(cache.stats().memory, 3);
}

#[tokio::test]
async fn replacing_an_entry_adjusts_memory_by_the_difference() {
    let store = MockStore::new();
    let cache = cache_over(&store, true, "");

    cache.store(&Method::GET, "/a", Payload::new("abcdef")).await.unwrap();
    cache.store(&Method::GET, "/a", Payload::new("ab")).await.unwrap();

    assert_eq!(cache.stats().memory, 2);
    assert_eq!(cache.weak_len(), 1);
}

#[tokio::test]
async fn status_observer_sees_every_counter_update() {
    let store = MockStore::new();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let cache = RequestCache::builder()
        .on_status(move |stats| sink.lock().unwrap().push(*stats))
        .with_store(Arc::new(store.clone()), true);
    cache.store(&Method::GET, "/a", Payload::new("abc")).await.unwrap();

    cache.lookup(&Method::GET, "/a").await;
    store.fail_reads(true);
    cache.lookup(&Method::GET, "/a").await;

    let seen = seen.lock().unwrap();
    assert_eq!(
        *seen,
        vec![
            CacheStats {
                hits: 1,
                misses: 0,
                memory: 3
            },
            CacheStats {
                hits: 1,
                misses: 1,
                memory: 0
            },
        ]
    );
}

#[tokio::test]
async fn iterate_visits_only_the_namespace() {
    let store = MockStore::new();
    store.seed("other:GET__/x", Payload::new("x"));
    store.seed("app:GET__/a", Payload::new("a"));
    let cache = cache_over(&store, false, "app:");
    cache.store(&Method::GET, "/b", Payload::new("b")).await.unwrap();

    let mut keys = Vec::new();
    cache
        .iterate(|key, _| keys.push(key.to_owned()))
        .await
        .unwrap();

    assert_eq!(keys, vec!["app:GET__/a", "app:GET__/b"]);
}

#[tokio::test]
async fn force_clear_wipes_foreign_keys_too() {
    let store = MockStore::new();
    store.seed("other:GET__/x", Payload::new("x"));
    let cache = cache_over(&store, false, "app:");
    cache.store(&Method::GET, "/a", Payload::new("a")).await.unwrap();

    cache.force_clear().await.unwrap();

    assert!(store.is_empty());
    assert_eq!(cache.weak_len(), 0);
    assert_eq!(cache.stats().memory, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_stores_of_distinct_keys_keep_every_entry() {
    let store = MockStore::new();
    let cache = Arc::new(cache_over(&store, true, ""));

    let tasks: Vec<_> = (0..32)
        .map(|i| {
            let cache = Arc::clone(&cache);
            tokio::spawn(async move {
                cache
                    .store(&Method::GET, &format!("/{i}"), Payload::new(format!("value {i}")))
                    .await
            })
        })
        .collect();
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    assert_eq!(store.len(), 32);
    assert_eq!(cache.weak_len(), 32);
    for i in 0..32 {
        let value = cache
            .lookup(&Method::GET, &format!("/{i}"))
            .await
            .into_value()
            .unwrap();
        assert_eq!(value.payload().text().unwrap(), format!("value {i}"));
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_stores_of_one_key_leave_a_single_whole_value() {
    let store = MockStore::new();
    let cache = Arc::new(cache_over(&store, true, ""));
    let candidates: Vec<String> = (0..16).map(|i| "x".repeat(i + 1)).collect();

    let tasks: Vec<_> = candidates
        .iter()
        .cloned()
        .map(|body| {
            let cache = Arc::clone(&cache);
            tokio::spawn(async move { cache.store(&Method::GET, "/same", Payload::new(body)).await })
        })
        .collect();
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    assert_eq!(store.len(), 1);
    assert_eq!(cache.weak_len(), 1);
    let value = store.entry("GET__/same").unwrap();
    assert!(candidates.contains(&value.payload().text().unwrap().to_owned()));
}

#[tokio::test]
async fn named_instance_owns_its_store() {
    let provider = MemoryProvider::new();
    provider
        .shared_store()
        .set("kept", StoredValue::new(Payload::new("k")))
        .await
        .unwrap();

    let cache = RequestCache::builder()
        .config(CacheConfig::default().instance_name("tiles"))
        .open(&provider)
        .unwrap();
    let shared = RequestCache::builder()
        .config(CacheConfig::default().key_prefix("app:"))
        .open(&provider)
        .unwrap();

    assert!(cache.owns_store());
    assert!(!shared.owns_store());
    assert_eq!(cache.namespace(), "tiles");

    cache.store(&Method::GET, "/a", Payload::new("a")).await.unwrap();
    cache.flush().await.unwrap();
    assert!(provider.shared_store().has("kept"));
}

#[tokio::test]
async fn empty_instance_name_fails_to_open() {
    let provider = MemoryProvider::new();

    let result = RequestCache::builder()
        .config(CacheConfig::default().instance_name(""))
        .open(&provider);

    assert!(matches!(result, Err(CacheError::Open { .. })));
}

#[test]
fn config_parses_from_yaml() {
    let yaml = r#"
instance_name: tiles
key_prefix: "v2:"
debug:
  puts: true
  boot: true
"#;
    let config: CacheConfig = serde_saphyr::from_str(yaml).expect("failed to deserialize");

    assert_eq!(config.instance_name.as_deref(), Some("tiles"));
    assert_eq!(config.key_prefix, "v2:");
    assert_eq!(
        config.debug,
        CacheDebug {
            puts: true,
            hits: false,
            misses: false,
            boot: true
        }
    );
    assert_eq!(
        config.instance_description,
        stowaway::config::DEFAULT_INSTANCE_DESCRIPTION
    );
}

#[tokio::test]
async fn debug_flags_gate_diagnostics_only() {
    let capture = EventCapture::new();
    let _guard = capture.set_default();
    let store = MockStore::new();
    let cache = cache_over(&store, true, "");
    cache.store(&Method::GET, "/a", Payload::new("a")).await.unwrap();

    assert!(cache.lookup(&Method::GET, "/a").await.is_hit());
    assert!(!capture.contains("cache hit"));

    cache.set_debug(CacheDebug::all());
    assert!(cache.lookup(&Method::GET, "/a").await.is_hit());
    assert!(capture.contains("cache hit"));
    assert_eq!(cache.stats().hits, 2);
}

#[tokio::test]
async fn refreshed_value_keeps_its_payload() {
    let store = MockStore::new();
    let cache = cache_over(&store, true, "");
    let value = StoredValue::new(Payload::new("abc"));
    let captured_at = value.captured_at();
    cache.store(&Method::GET, "/a", value.clone().touch()).await.unwrap();

    let stored = store.entry("GET__/a").unwrap();
    assert_eq!(stored.payload(), value.payload());
    assert!(stored.captured_at() >= captured_at);
}
