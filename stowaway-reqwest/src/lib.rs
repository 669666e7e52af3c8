//! reqwest-backed request handle for stowaway.
//!
//! [`ReqwestTransport`] implements the [`Transport`](stowaway_core::Transport)
//! contract, so it can be wrapped by the stowaway interception facade:
//!
//! ```no_run
//! use std::sync::Arc;
//! use http::Method;
//! use stowaway::{Hooks, Interceptor, RequestCache};
//! use stowaway_reqwest::ReqwestTransport;
//! use stowaway_store::MemoryStore;
//!
//! # async fn demo() -> Result<(), stowaway::RequestError> {
//! let cache = Arc::new(RequestCache::builder().with_store(Arc::new(MemoryStore::new()), true));
//! let interceptor = Interceptor::builder()
//!     .cache(cache)
//!     .hooks(Hooks::builder().cacheable(|method, _| method == Method::GET).build())
//!     .build();
//!
//! let mut request = interceptor.wrap(ReqwestTransport::default());
//! request.open(Method::GET, "http://localhost:8080/data")?;
//! let completion = request.send(None).await?;
//! println!("{completion:?}");
//! # Ok(())
//! # }
//! ```
//!
//! Events follow the exchange: headers, loading, one progress event per body
//! chunk and finally a load. Connection failures become errors, and reqwest
//! timeouts become timeout events.

mod transport;

pub use transport::{ReqwestAbortHandle, ReqwestTransport};
