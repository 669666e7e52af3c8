//! In-memory store.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use stowaway_core::StoredValue;
use tracing::{debug, warn};

use crate::{DeleteStatus, KeyValueStore, StoreError, StoreProvider, StoreResult};

/// Store that keeps entries in a concurrent hash map.
///
/// Cloning is cheap and clones share the same entries. Data does not survive
/// the process; use `stowaway-sqlite` when it must.
#[derive(Clone, Debug)]
pub struct MemoryStore {
    entries: Arc<DashMap<String, StoredValue>>,
    name: Arc<str>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Creates an empty store named `memory`.
    pub fn new() -> Self {
        Self::named("memory")
    }

    /// Creates an empty store with the given name.
    pub fn named(name: impl Into<Arc<str>>) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            name: name.into(),
        }
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` when nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Check if a key exists.
    pub fn has(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> StoreResult<Option<StoredValue>> {
        Ok(self.entries.get(key).map(|v| v.value().clone()))
    }

    async fn set(&self, key: &str, value: StoredValue) -> StoreResult<()> {
        self.entries.insert(key.to_owned(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> StoreResult<DeleteStatus> {
        Ok(match self.entries.remove(key) {
            Some(_) => DeleteStatus::Deleted,
            None => DeleteStatus::Missing,
        })
    }

    async fn iterate(
        &self,
        visitor: &mut (dyn for<'k, 'v> FnMut(&'k str, &'v StoredValue) + Send),
    ) -> StoreResult<()> {
        // Shard locks are released before the visitor runs.
        let snapshot: Vec<(String, StoredValue)> = self
            .entries
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        for (key, value) in &snapshot {
            visitor(key, value);
        }
        Ok(())
    }

    async fn clear(&self) -> StoreResult<()> {
        self.entries.clear();
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Provider handing out [`MemoryStore`]s.
///
/// Named instances are created on first request and shared afterwards.
#[derive(Clone, Debug)]
pub struct MemoryProvider {
    shared: MemoryStore,
    instances: Arc<DashMap<String, MemoryStore>>,
}

impl Default for MemoryProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryProvider {
    /// Creates a provider with an empty shared store.
    pub fn new() -> Self {
        Self {
            shared: MemoryStore::new(),
            instances: Arc::new(DashMap::new()),
        }
    }

    /// The shared store, as its concrete type.
    pub fn shared_store(&self) -> MemoryStore {
        self.shared.clone()
    }

    /// The named instance, if it was created.
    pub fn instance(&self, name: &str) -> Option<MemoryStore> {
        self.instances.get(name).map(|store| store.value().clone())
    }
}

impl StoreProvider for MemoryProvider {
    fn shared(&self) -> Arc<dyn KeyValueStore> {
        Arc::new(self.shared.clone())
    }

    fn named(&self, name: &str, _description: &str) -> StoreResult<Arc<dyn KeyValueStore>> {
        if name.is_empty() {
            warn!("rejected memory store instance with an empty name");
            return Err(StoreError::InvalidInstance {
                name: name.to_owned(),
                reason: "instance name must not be empty".to_owned(),
            });
        }
        let store = self
            .instances
            .entry(name.to_owned())
            .or_insert_with(|| {
                debug!(instance = name, "created memory store instance");
                MemoryStore::named(name)
            })
            .clone();
        Ok(Arc::new(store))
    }
}
