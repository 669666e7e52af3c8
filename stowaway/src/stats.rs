//! Cache usage statistics.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Point-in-time copy of the cache counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Lookups answered from the store.
    pub hits: u64,
    /// Lookups that found nothing (or failed to read).
    pub misses: u64,
    /// Estimated bytes held by the keys the cache owns.
    pub memory: u64,
}

/// Live counters behind [`CacheStats`].
#[derive(Debug, Default)]
pub(crate) struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    memory: AtomicU64,
}

impl Counters {
    pub(crate) fn hit(&self) {
        self.hits.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn miss(&self) {
        self.misses.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn add_memory(&self, bytes: u64) {
        self.memory.fetch_add(bytes, Ordering::SeqCst);
    }

    pub(crate) fn sub_memory(&self, bytes: u64) {
        // Saturates: the estimate must never wrap below zero.
        let _ = self
            .memory
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| {
                Some(current.saturating_sub(bytes))
            });
    }

    pub(crate) fn set_memory(&self, bytes: u64) {
        self.memory.store(bytes, Ordering::SeqCst);
    }

    pub(crate) fn reset_requests(&self) {
        self.hits.store(0, Ordering::SeqCst);
        self.misses.store(0, Ordering::SeqCst);
    }

    pub(crate) fn snapshot(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::SeqCst),
            misses: self.misses.load(Ordering::SeqCst),
            memory: self.memory.load(Ordering::SeqCst),
        }
    }
}
