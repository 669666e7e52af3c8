//! Errors reported by the request cache, the facade and caller hooks.

use stowaway_core::TransportError;
use stowaway_store::StoreError;
use thiserror::Error;

/// Errors reported by [`RequestCache`](crate::RequestCache) operations.
///
/// Lookups never fail: a store read fault is a miss. Writes, scans and
/// flushes report the store fault that stopped them.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The named store instance could not be created.
    #[error("failed to open store instance `{name}`")]
    Open {
        /// Requested instance name.
        name: String,
        /// Store fault.
        #[source]
        source: StoreError,
    },
    /// Writing an entry failed; the cache state is unchanged.
    #[error("failed to write cache entry `{key}`")]
    Write {
        /// Composed cache key.
        key: String,
        /// Store fault.
        #[source]
        source: StoreError,
    },
    /// The startup scan could not iterate the store.
    #[error("failed to scan cache namespace")]
    Scan(#[source] StoreError),
    /// Some owned entries could not be removed.
    #[error("failed to flush cache namespace, {failed} entries left behind")]
    Flush {
        /// Number of entries that could not be removed.
        failed: usize,
        /// First store fault encountered.
        #[source]
        source: StoreError,
    },
    /// Any other store fault (clear, iterate).
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Errors returned by [`CachedRequest`](crate::CachedRequest) calls.
///
/// These describe misuse of the request handle. Network failures are not
/// errors here: they arrive as [`Completion::Failed`](crate::Completion).
#[derive(Debug, Error)]
pub enum RequestError {
    /// `send` was called before `open`.
    #[error("request is not opened")]
    NotOpened,
    /// `send` was called twice in one session.
    #[error("request was already sent, call open() to start a new one")]
    AlreadySent,
    /// The transport rejected `open` or a request header.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// A caller-supplied hook failed.
///
/// Never returned from the public API: the facade logs it and falls back to
/// the behavior of an uncached request.
#[derive(Debug, Error)]
pub enum HookError {
    /// The hook returned an error.
    #[error("{hook} hook failed: {source}")]
    Failed {
        /// Which hook.
        hook: &'static str,
        /// The hook's error.
        #[source]
        source: stowaway_core::BoxError,
    },
    /// The hook panicked.
    #[error("{hook} hook panicked: {message}")]
    Panicked {
        /// Which hook.
        hook: &'static str,
        /// Panic message, when it was a string.
        message: String,
    },
}
