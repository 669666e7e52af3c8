#![warn(missing_docs)]
//! # stowaway
//!
//! An offline-tolerant HTTP request cache.
//!
//! Two pieces work together:
//!
//! - [`RequestCache`] owns a namespace inside a key-value store, answers
//!   lookups for `(method, identifier)` pairs, writes responses through and
//!   keeps hit/miss/memory statistics.
//! - [`CachedRequest`] wraps a real request handle ([`Transport`]) and keeps
//!   its surface. On `send` it decides, through the [`Hooks`], whether the
//!   cache answers; on a miss it lets the request reach the network and
//!   persists a successful response before reporting completion.
//!
//! ```
//! use std::sync::Arc;
//! use stowaway::{RequestCache, config::CacheConfig};
//! use stowaway_store::MemoryProvider;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let provider = MemoryProvider::new();
//! let cache = Arc::new(
//!     RequestCache::builder()
//!         .config(CacheConfig::default().key_prefix("app:"))
//!         .open(&provider)?,
//! );
//! cache.initialize().await?;
//!
//! cache.store(&http::Method::GET, "/a", stowaway_core::Payload::new("hello")).await?;
//! assert!(cache.lookup(&http::Method::GET, "/a").await.is_hit());
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`cache`] - the request cache and its builder
//! - [`interceptor`] - the interception facade
//! - [`hooks`] - caller-supplied decision functions
//! - [`config`] - serde configuration
//! - [`key`] - cache key composition
//! - [`global`] - optional process-wide default cache
//! - [`metrics`] - metric recording, active with the `metrics` feature
//!
//! [`Transport`]: stowaway_core::Transport

pub mod cache;
pub mod config;
pub mod error;
pub mod global;
pub mod hooks;
pub mod interceptor;
pub mod key;
pub mod metrics;
mod stats;

pub use cache::{Lookup, RequestCache, RequestCacheBuilder, ScanSummary};
pub use error::{CacheError, HookError, RequestError};
pub use hooks::{Hooks, HooksBuilder, MissDecision, SessionInfo};
pub use interceptor::{
    CachedRequest, Completion, EventKind, Interceptor, InterceptorBuilder, NotSet, RequestEvent,
    ResponseSource, ResponseState,
};
pub use stats::CacheStats;
