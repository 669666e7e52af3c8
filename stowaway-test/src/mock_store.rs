use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use stowaway_core::StoredValue;
use stowaway_store::{DeleteStatus, KeyValueStore, StoreError, StoreResult};

#[derive(Debug, Default)]
pub struct StoreCounters {
    pub get_count: AtomicUsize,
    pub get_hit_count: AtomicUsize,
    pub get_miss_count: AtomicUsize,
    pub set_count: AtomicUsize,
    pub remove_count: AtomicUsize,
    pub iterate_count: AtomicUsize,
    pub clear_count: AtomicUsize,
}

impl StoreCounters {
    pub fn get_count(&self) -> usize {
        self.get_count.load(Ordering::SeqCst)
    }

    pub fn get_hit_count(&self) -> usize {
        self.get_hit_count.load(Ordering::SeqCst)
    }

    pub fn get_miss_count(&self) -> usize {
        self.get_miss_count.load(Ordering::SeqCst)
    }

    pub fn set_count(&self) -> usize {
        self.set_count.load(Ordering::SeqCst)
    }

    pub fn remove_count(&self) -> usize {
        self.remove_count.load(Ordering::SeqCst)
    }

    pub fn iterate_count(&self) -> usize {
        self.iterate_count.load(Ordering::SeqCst)
    }

    pub fn clear_count(&self) -> usize {
        self.clear_count.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        for counter in [
            &self.get_count,
            &self.get_hit_count,
            &self.get_miss_count,
            &self.set_count,
            &self.remove_count,
            &self.iterate_count,
            &self.clear_count,
        ] {
            counter.store(0, Ordering::SeqCst);
        }
    }
}

/// Operations that fail while their switch is on.
#[derive(Debug, Default)]
pub struct Faults {
    pub reads: AtomicBool,
    pub writes: AtomicBool,
    pub removes: AtomicBool,
    pub iterate: AtomicBool,
    pub clear: AtomicBool,
}

fn injected(operation: &str) -> StoreError {
    StoreError::ConnectionError(format!("injected {operation} failure").into())
}

/// In-memory store that counts every call and fails on demand.
///
/// Iteration visits keys in lexicographic order.
#[derive(Clone, Debug)]
pub struct MockStore {
    pub entries: Arc<DashMap<String, StoredValue>>,
    pub counters: Arc<StoreCounters>,
    pub faults: Arc<Faults>,
}

impl Default for MockStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MockStore {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            counters: Arc::new(StoreCounters::default()),
            faults: Arc::new(Faults::default()),
        }
    }

    /// Seeds an entry without touching the counters.
    pub fn seed(&self, key: impl Into<String>, value: impl Into<StoredValue>) {
        self.entries.insert(key.into(), value.into());
    }

    pub fn entry(&self, key: &str) -> Option<StoredValue> {
        self.entries.get(key).map(|entry| entry.value().clone())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn fail_reads(&self, enabled: bool) {
        self.faults.reads.store(enabled, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, enabled: bool) {
        self.faults.writes.store(enabled, Ordering::SeqCst);
    }

    pub fn fail_removes(&self, enabled: bool) {
        self.faults.removes.store(enabled, Ordering::SeqCst);
    }

    pub fn fail_iterate(&self, enabled: bool) {
        self.faults.iterate.store(enabled, Ordering::SeqCst);
    }

    pub fn fail_clear(&self, enabled: bool) {
        self.faults.clear.store(enabled, Ordering::SeqCst);
    }

    pub fn get_count(&self) -> usize {
        self.counters.get_count()
    }

    pub fn set_count(&self) -> usize {
        self.counters.set_count()
    }

    pub fn remove_count(&self) -> usize {
        self.counters.remove_count()
    }

    pub fn reset_counters(&self) {
        self.counters.reset();
    }
}

#[async_trait]
impl KeyValueStore for MockStore {
    async fn get(&self, key: &str) -> StoreResult<Option<StoredValue>> {
        self.counters.get_count.fetch_add(1, Ordering::SeqCst);
        if self.faults.reads.load(Ordering::SeqCst) {
            return Err(injected("read"));
        }
        let result = self.entry(key);
        if result.is_some() {
            self.counters.get_hit_count.fetch_add(1, Ordering::SeqCst);
        } else {
            self.counters.get_miss_count.fetch_add(1, Ordering::SeqCst);
        }
        Ok(result)
    }

    async fn set(&self, key: &str, value: StoredValue) -> StoreResult<()> {
        self.counters.set_count.fetch_add(1, Ordering::SeqCst);
        if self.faults.writes.load(Ordering::SeqCst) {
            return Err(injected("write"));
        }
        self.entries.insert(key.to_owned(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> StoreResult<DeleteStatus> {
        self.counters.remove_count.fetch_add(1, Ordering::SeqCst);
        if self.faults.removes.load(Ordering::SeqCst) {
            return Err(injected("remove"));
        }
        match self.entries.remove(key) {
            Some(_) => Ok(DeleteStatus::Deleted),
            None => Ok(DeleteStatus::Missing),
        }
    }

    async fn iterate(
        &self,
        visitor: &mut (dyn for<'k, 'v> FnMut(&'k str, &'v StoredValue) + Send),
    ) -> StoreResult<()> {
        self.counters.iterate_count.fetch_add(1, Ordering::SeqCst);
        if self.faults.iterate.load(Ordering::SeqCst) {
            return Err(injected("iterate"));
        }
        let mut snapshot: Vec<(String, StoredValue)> = self
            .entries
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        snapshot.sort_by(|(a, _), (b, _)| a.cmp(b));
        for (key, value) in &snapshot {
            visitor(key, value);
        }
        Ok(())
    }

    async fn clear(&self) -> StoreResult<()> {
        self.counters.clear_count.fetch_add(1, Ordering::SeqCst);
        if self.faults.clear.load(Ordering::SeqCst) {
            return Err(injected("clear"));
        }
        self.entries.clear();
        Ok(())
    }

    fn name(&self) -> &str {
        "mock"
    }
}
