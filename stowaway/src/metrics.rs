//! Metrics declaration and recording.
//!
//! Every function is a no-op unless the `metrics` feature is enabled.

#[cfg(feature = "metrics")]
use lazy_static::lazy_static;

#[cfg(feature = "metrics")]
lazy_static! {
    /// Track number of cache hits.
    pub static ref CACHE_HIT_COUNTER: &'static str = {
        metrics::describe_counter!(
            "stowaway_cache_hit_total",
            "Total number of cache hit events."
        );
        "stowaway_cache_hit_total"
    };
    /// Track number of cache misses, store read faults included.
    pub static ref CACHE_MISS_COUNTER: &'static str = {
        metrics::describe_counter!(
            "stowaway_cache_miss_total",
            "Total number of cache miss events."
        );
        "stowaway_cache_miss_total"
    };
    /// Track number of cache writes.
    pub static ref CACHE_PUT_COUNTER: &'static str = {
        metrics::describe_counter!(
            "stowaway_cache_put_total",
            "Total number of cache write attempts."
        );
        "stowaway_cache_put_total"
    };
    /// Track number of failed cache writes.
    pub static ref CACHE_PUT_ERRORS: &'static str = {
        metrics::describe_counter!(
            "stowaway_cache_put_errors_total",
            "Total number of failed cache writes."
        );
        "stowaway_cache_put_errors_total"
    };
    /// Track number of flushes.
    pub static ref CACHE_FLUSH_COUNTER: &'static str = {
        metrics::describe_counter!(
            "stowaway_cache_flush_total",
            "Total number of namespace flushes."
        );
        "stowaway_cache_flush_total"
    };
    /// Estimated memory held by a namespace.
    pub static ref CACHE_MEMORY_GAUGE: &'static str = {
        metrics::describe_gauge!(
            "stowaway_cache_memory_bytes",
            metrics::Unit::Bytes,
            "Estimated bytes held by the namespace."
        );
        "stowaway_cache_memory_bytes"
    };
}

/// Record a cache hit.
#[cfg(feature = "metrics")]
#[inline]
pub fn record_hit(namespace: &str) {
    metrics::counter!(*CACHE_HIT_COUNTER, "namespace" => namespace.to_string()).increment(1);
}

/// Record a cache hit (no-op when `metrics` feature disabled).
#[cfg(not(feature = "metrics"))]
#[inline]
pub fn record_hit(_namespace: &str) {}

/// Record a cache miss.
#[cfg(feature = "metrics")]
#[inline]
pub fn record_miss(namespace: &str) {
    metrics::counter!(*CACHE_MISS_COUNTER, "namespace" => namespace.to_string()).increment(1);
}

/// Record a cache miss (no-op when `metrics` feature disabled).
#[cfg(not(feature = "metrics"))]
#[inline]
pub fn record_miss(_namespace: &str) {}

/// Record a cache write and whether it succeeded.
#[cfg(feature = "metrics")]
#[inline]
pub fn record_put(namespace: &str, success: bool) {
    metrics::counter!(*CACHE_PUT_COUNTER, "namespace" => namespace.to_string()).increment(1);
    if !success {
        metrics::counter!(*CACHE_PUT_ERRORS, "namespace" => namespace.to_string()).increment(1);
    }
}

/// Record a cache write (no-op when `metrics` feature disabled).
#[cfg(not(feature = "metrics"))]
#[inline]
pub fn record_put(_namespace: &str, _success: bool) {}

/// Record a flush.
#[cfg(feature = "metrics")]
#[inline]
pub fn record_flush(namespace: &str) {
    metrics::counter!(*CACHE_FLUSH_COUNTER, "namespace" => namespace.to_string()).increment(1);
}

/// Record a flush (no-op when `metrics` feature disabled).
#[cfg(not(feature = "metrics"))]
#[inline]
pub fn record_flush(_namespace: &str) {}

/// Publish the current memory estimate.
#[cfg(feature = "metrics")]
#[inline]
pub fn record_memory(namespace: &str, bytes: u64) {
    metrics::gauge!(*CACHE_MEMORY_GAUGE, "namespace" => namespace.to_string()).set(bytes as f64);
}

/// Publish the memory estimate (no-op when `metrics` feature disabled).
#[cfg(not(feature = "metrics"))]
#[inline]
pub fn record_memory(_namespace: &str, _bytes: u64) {}
