//! Optional process-wide default cache.
//!
//! Nothing is installed implicitly. An application that wants one shared
//! cache installs it once at startup and tears it down on shutdown:
//!
//! ```
//! use std::sync::Arc;
//! use stowaway::{RequestCache, global};
//! use stowaway_store::MemoryStore;
//!
//! let cache = Arc::new(RequestCache::builder().with_store(Arc::new(MemoryStore::new()), true));
//! assert!(global::install(cache).is_none());
//! assert!(global::get().is_some());
//! assert!(global::teardown().is_some());
//! assert!(global::get().is_none());
//! ```

use std::sync::{Arc, PoisonError, RwLock};

use lazy_static::lazy_static;

use crate::RequestCache;

lazy_static! {
    static ref DEFAULT_CACHE: RwLock<Option<Arc<RequestCache>>> = RwLock::new(None);
}

/// Installs the default cache, returning the one it replaces.
pub fn install(cache: Arc<RequestCache>) -> Option<Arc<RequestCache>> {
    DEFAULT_CACHE
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .replace(cache)
}

/// The installed default cache.
pub fn get() -> Option<Arc<RequestCache>> {
    DEFAULT_CACHE
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
}

/// Removes the default cache. Requests already bound to it keep their handle.
pub fn teardown() -> Option<Arc<RequestCache>> {
    DEFAULT_CACHE
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .take()
}
