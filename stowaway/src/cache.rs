//! The request cache.
//!
//! [`RequestCache`] owns a namespace inside a [`KeyValueStore`]. It composes
//! keys from `(method, identifier)` pairs, answers lookups, writes responses
//! through to the store and keeps hit/miss/memory statistics.
//!
//! ## Ownership index
//!
//! The cache remembers which keys it owns, and how large each one is, in an
//! in-memory index filled by [`RequestCache::initialize`] and kept current by
//! every store, lookup and flush. The index is advisory: another actor may
//! change the store behind the cache's back. It scopes [`flush`] and
//! [`iterate`] and feeds the memory estimate; existence is always asked of
//! the store itself.
//!
//! [`flush`]: RequestCache::flush
//! [`iterate`]: RequestCache::iterate

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use dashmap::DashMap;
use http::Method;
use stowaway_core::StoredValue;
use stowaway_store::{KeyValueStore, StoreProvider};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::{CacheConfig, CacheDebug};
use crate::error::CacheError;
use crate::key::{compose_key, has_prefix};
use crate::metrics;
use crate::stats::{CacheStats, Counters};

/// Observer called after every hit/miss counter update.
pub type StatusObserver = Arc<dyn Fn(&CacheStats) + Send + Sync>;

/// Callback fired once the startup scan finishes.
pub type ReadyCallback = Box<dyn FnOnce(&ScanSummary) + Send>;

/// Outcome of [`RequestCache::lookup`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    /// The store holds a value for the key.
    Hit(StoredValue),
    /// Nothing usable was found.
    Miss,
}

impl Lookup {
    /// Returns `true` for a hit.
    pub fn is_hit(&self) -> bool {
        matches!(self, Lookup::Hit(_))
    }

    /// The stored value, for a hit.
    pub fn into_value(self) -> Option<StoredValue> {
        match self {
            Lookup::Hit(value) => Some(value),
            Lookup::Miss => None,
        }
    }
}

/// What the startup scan found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanSummary {
    /// Keys claimed by the namespace.
    pub keys: usize,
    /// Their total estimated size.
    pub memory: u64,
}

/// Persistent request cache bound to one namespace of a key-value store.
pub struct RequestCache {
    store: Arc<dyn KeyValueStore>,
    own_store: bool,
    namespace: String,
    key_prefix: String,
    known_keys: DashMap<String, u64>,
    counters: Counters,
    debug: RwLock<CacheDebug>,
    ready: watch::Sender<bool>,
    on_status: Option<StatusObserver>,
    on_ready: Mutex<Option<ReadyCallback>>,
}

impl fmt::Debug for RequestCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestCache")
            .field("store", &self.store.name())
            .field("own_store", &self.own_store)
            .field("namespace", &self.namespace)
            .field("key_prefix", &self.key_prefix)
            .field("known_keys", &self.known_keys.len())
            .field("stats", &self.stats())
            .field("ready", &self.is_ready())
            .finish()
    }
}

impl RequestCache {
    /// Creates a new [`RequestCacheBuilder`].
    pub fn builder() -> RequestCacheBuilder {
        RequestCacheBuilder::default()
    }

    /// Scans the store once and claims every key that belongs to this
    /// namespace.
    ///
    /// Marks the cache ready and fires the `on_ready` callback even when the
    /// scan fails; in that case the ownership index and memory estimate may
    /// be incomplete and the store fault is returned.
    #[tracing::instrument(skip(self), fields(namespace = %self.namespace))]
    pub async fn initialize(&self) -> Result<ScanSummary, CacheError> {
        let boot = self.debug().boot;
        let mut found: Vec<(String, u64)> = Vec::new();
        let scanned = self
            .store
            .iterate(&mut |key: &str, value: &StoredValue| {
                if self.own_store || has_prefix(&self.key_prefix, key) {
                    found.push((key.to_owned(), value.size_estimate() as u64));
                }
            })
            .await;

        for (key, size) in found {
            if boot {
                debug!(key = %key, size, "found cached key");
            }
            self.track(key, size);
        }

        let summary = ScanSummary {
            keys: self.known_keys.len(),
            memory: self.counters.snapshot().memory,
        };
        info!(keys = summary.keys, memory = summary.memory, "cache namespace scanned");
        metrics::record_memory(&self.namespace, summary.memory);
        self.mark_ready(&summary);

        match scanned {
            Ok(()) => Ok(summary),
            Err(err) => {
                warn!(error = %err, "cache namespace scan failed");
                Err(CacheError::Scan(err))
            }
        }
    }

    /// Runs [`initialize`](Self::initialize) on the tokio runtime.
    pub fn spawn_initialize(self: &Arc<Self>) -> JoinHandle<Result<ScanSummary, CacheError>> {
        let cache = Arc::clone(self);
        tokio::spawn(async move { cache.initialize().await })
    }

    /// Whether the startup scan finished.
    pub fn is_ready(&self) -> bool {
        *self.ready.borrow()
    }

    /// Waits until the startup scan finished.
    pub async fn ready(&self) {
        let mut ready = self.ready.subscribe();
        // The sender lives as long as `self`, so waiting cannot fail.
        let _ = ready.wait_for(|ready| *ready).await;
    }

    /// Builds the key for a request inside this namespace.
    pub fn compose_key(&self, method: &Method, identifier: &str) -> String {
        compose_key(&self.key_prefix, method, identifier)
    }

    /// Looks up a request in the store.
    ///
    /// A store fault counts as a miss. Either way the key leaves the
    /// ownership index when nothing is returned.
    #[tracing::instrument(level = "debug", skip(self), fields(namespace = %self.namespace))]
    pub async fn lookup(&self, method: &Method, identifier: &str) -> Lookup {
        let key = self.compose_key(method, identifier);
        let lookup = match self.store.get(&key).await {
            Ok(Some(value)) => {
                self.counters.hit();
                metrics::record_hit(&self.namespace);
                if self.debug().hits {
                    debug!(key = %key, "cache hit");
                }
                Lookup::Hit(value)
            }
            Ok(None) => {
                self.miss(&key);
                Lookup::Miss
            }
            Err(err) => {
                warn!(key = %key, error = %err, "cache read failed, treating as miss");
                self.miss(&key);
                Lookup::Miss
            }
        };
        self.notify_status();
        lookup
    }

    /// Writes a response through to the store.
    ///
    /// On failure nothing about the namespace changes and the store fault is
    /// returned.
    #[tracing::instrument(level = "debug", skip(self, value), fields(namespace = %self.namespace))]
    pub async fn store(
        &self,
        method: &Method,
        identifier: &str,
        value: impl Into<StoredValue>,
    ) -> Result<(), CacheError> {
        let key = self.compose_key(method, identifier);
        let value = value.into();
        let size = value.size_estimate() as u64;
        if self.debug().puts {
            debug!(key = %key, size, "cache put");
        }

        match self.store.set(&key, value).await {
            Ok(()) => {
                self.track(key, size);
                metrics::record_put(&self.namespace, true);
                metrics::record_memory(&self.namespace, self.counters.snapshot().memory);
                Ok(())
            }
            Err(source) => {
                error!(key = %key, error = %source, "cache write failed");
                metrics::record_put(&self.namespace, false);
                Err(CacheError::Write { key, source })
            }
        }
    }

    /// Removes every entry of this namespace.
    ///
    /// An exclusive store is cleared wholesale. A shared store is iterated and
    /// only the keys this namespace owns are deleted.
    #[tracing::instrument(skip(self), fields(namespace = %self.namespace))]
    pub async fn flush(&self) -> Result<(), CacheError> {
        metrics::record_flush(&self.namespace);
        if self.own_store {
            self.store.clear().await?;
            self.reset_ownership();
            info!("cache flushed");
            return Ok(());
        }

        let keys = self.store.keys().await?;
        let mut failed = 0;
        let mut first_error = None;
        for key in keys.into_iter().filter(|key| self.belongs(key)) {
            match self.store.remove(&key).await {
                Ok(_) => self.forget(&key),
                Err(err) => {
                    error!(key = %key, error = %err, "failed to remove cached key");
                    failed += 1;
                    first_error.get_or_insert(err);
                }
            }
        }

        match first_error {
            None => {
                self.reset_ownership();
                info!("cache flushed");
                Ok(())
            }
            Some(source) => {
                metrics::record_memory(&self.namespace, self.counters.snapshot().memory);
                Err(CacheError::Flush { failed, source })
            }
        }
    }

    /// Wipes the whole underlying store, whoever owns its keys.
    pub async fn force_clear(&self) -> Result<(), CacheError> {
        self.store.clear().await?;
        self.reset_ownership();
        warn!(namespace = %self.namespace, store = self.store.name(), "store force-cleared");
        Ok(())
    }

    /// Visits every entry of this namespace in store order.
    pub async fn iterate<F>(&self, mut visitor: F) -> Result<(), CacheError>
    where
        F: FnMut(&str, &StoredValue) + Send,
    {
        self.store
            .iterate(&mut |key: &str, value: &StoredValue| {
                if self.belongs(key) {
                    visitor(key, value);
                }
            })
            .await?;
        Ok(())
    }

    /// A copy of the current statistics.
    pub fn stats(&self) -> CacheStats {
        self.counters.snapshot()
    }

    /// Zeroes hits and misses. The memory estimate is kept.
    pub fn reset_counters(&self) {
        self.counters.reset_requests();
    }

    /// Number of keys in the ownership index.
    ///
    /// Only an estimate: the store may have changed behind the cache's back.
    pub fn weak_len(&self) -> usize {
        self.known_keys.len()
    }

    /// Whether the ownership index holds the request's key.
    ///
    /// A `true` here does not guarantee [`lookup`](Self::lookup) hits.
    pub fn weak_contains(&self, method: &Method, identifier: &str) -> bool {
        self.known_keys
            .contains_key(&self.compose_key(method, identifier))
    }

    /// Current diagnostic switches.
    pub fn debug(&self) -> CacheDebug {
        *self.debug.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replaces the diagnostic switches.
    pub fn set_debug(&self, debug: CacheDebug) {
        *self.debug.write().unwrap_or_else(PoisonError::into_inner) = debug;
    }

    /// The key prefix of this namespace.
    pub fn key_prefix(&self) -> &str {
        &self.key_prefix
    }

    /// Whether the namespace owns its store exclusively.
    pub fn owns_store(&self) -> bool {
        self.own_store
    }

    /// Label used in logs and metrics.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// The underlying store.
    pub fn store_handle(&self) -> &Arc<dyn KeyValueStore> {
        &self.store
    }

    fn belongs(&self, key: &str) -> bool {
        self.own_store || has_prefix(&self.key_prefix, key) || self.known_keys.contains_key(key)
    }

    fn track(&self, key: String, size: u64) {
        match self.known_keys.insert(key, size) {
            Some(previous) if previous > size => self.counters.sub_memory(previous - size),
            Some(previous) => self.counters.add_memory(size - previous),
            None => self.counters.add_memory(size),
        }
    }

    fn forget(&self, key: &str) {
        if let Some((_, size)) = self.known_keys.remove(key) {
            self.counters.sub_memory(size);
        }
    }

    fn miss(&self, key: &str) {
        self.forget(key);
        self.counters.miss();
        metrics::record_miss(&self.namespace);
        if self.debug().misses {
            debug!(key = %key, "cache miss");
        }
    }

    fn reset_ownership(&self) {
        self.known_keys.clear();
        self.counters.set_memory(0);
        metrics::record_memory(&self.namespace, 0);
    }

    fn notify_status(&self) {
        if let Some(observer) = &self.on_status {
            observer(&self.stats());
        }
    }

    fn mark_ready(&self, summary: &ScanSummary) {
        self.ready.send_replace(true);
        let callback = self
            .on_ready
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(callback) = callback {
            callback(summary);
        }
    }
}

/// Builder for [`RequestCache`].
///
/// ```
/// use stowaway::{RequestCache, config::CacheConfig};
/// use stowaway_store::MemoryProvider;
///
/// let provider = MemoryProvider::new();
/// let cache = RequestCache::builder()
///     .config(CacheConfig::default().instance_name("tiles"))
///     .on_status(|stats| println!("hits: {}", stats.hits))
///     .open(&provider)
///     .unwrap();
/// assert!(cache.owns_store());
/// ```
#[derive(Default)]
pub struct RequestCacheBuilder {
    config: CacheConfig,
    on_status: Option<StatusObserver>,
    on_ready: Option<ReadyCallback>,
}

impl RequestCacheBuilder {
    /// Sets the configuration.
    pub fn config(mut self, config: CacheConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the observer called after every hit/miss counter update.
    pub fn on_status<F>(mut self, observer: F) -> Self
    where
        F: Fn(&CacheStats) + Send + Sync + 'static,
    {
        self.on_status = Some(Arc::new(observer));
        self
    }

    /// Sets the callback fired once the startup scan finishes.
    pub fn on_ready<F>(mut self, callback: F) -> Self
    where
        F: FnOnce(&ScanSummary) + Send + 'static,
    {
        self.on_ready = Some(Box::new(callback));
        self
    }

    /// Opens the namespace through `provider`.
    ///
    /// A configured instance name yields an exclusive store; otherwise the
    /// provider's shared store is used.
    pub fn open<P>(self, provider: &P) -> Result<RequestCache, CacheError>
    where
        P: StoreProvider + ?Sized,
    {
        match self.config.instance_name.clone() {
            Some(name) => {
                let store = provider
                    .named(&name, &self.config.instance_description)
                    .map_err(|source| CacheError::Open {
                        name: name.clone(),
                        source,
                    })?;
                Ok(self.with_store(store, true))
            }
            None => {
                let store = provider.shared();
                Ok(self.with_store(store, false))
            }
        }
    }

    /// Binds the namespace to an already opened store.
    pub fn with_store(self, store: Arc<dyn KeyValueStore>, own_store: bool) -> RequestCache {
        let namespace = match (&self.config.instance_name, self.config.key_prefix.is_empty()) {
            (Some(name), _) => name.clone(),
            (None, false) => self.config.key_prefix.clone(),
            (None, true) => "shared".to_owned(),
        };
        let (ready, _) = watch::channel(false);
        debug!(
            namespace = %namespace,
            store = store.name(),
            own_store,
            key_prefix = %self.config.key_prefix,
            "request cache created"
        );

        RequestCache {
            store,
            own_store,
            namespace,
            key_prefix: self.config.key_prefix,
            known_keys: DashMap::new(),
            counters: Counters::default(),
            debug: RwLock::new(self.config.debug),
            ready,
            on_status: self.on_status,
            on_ready: Mutex::new(self.on_ready),
        }
    }
}
