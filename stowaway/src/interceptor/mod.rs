//! The interception facade.
//!
//! An [`Interceptor`] holds everything shared by many requests: the
//! [`RequestCache`], the [`Hooks`] and the [`InterceptorConfig`]. Wrapping a
//! [`Transport`] yields a [`CachedRequest`], which exposes the transport's own
//! surface and decides per session whether the cache answers instead of the
//! network.
//!
//! ```no_run
//! # async fn demo<T: stowaway_core::Transport>(transport: T, cache: std::sync::Arc<stowaway::RequestCache>)
//! #     -> Result<(), stowaway::RequestError> {
//! use http::Method;
//! use stowaway::{Completion, Hooks, Interceptor};
//!
//! let interceptor = Interceptor::builder()
//!     .cache(cache)
//!     .hooks(Hooks::builder().cacheable(|method, _| method == Method::GET).build())
//!     .build();
//!
//! let mut request = interceptor.wrap(transport);
//! request.on_load(|response| println!("{} {:?}", response.status(), response.source()));
//! request.open(Method::GET, "https://example.com/tiles/1")?;
//! if let Completion::Loaded { source } = request.send(None).await? {
//!     println!("served from {source:?}");
//! }
//! # Ok(())
//! # }
//! ```

mod listeners;
mod request;
mod response;
mod session;

use std::sync::Arc;

use stowaway_core::{Transport, TransportError};

use crate::RequestCache;
use crate::config::InterceptorConfig;
use crate::hooks::Hooks;

pub use listeners::{EventKind, Listener, RequestEvent};
pub use request::CachedRequest;
pub use response::{ResponseSource, ResponseState};

/// How a `send` ended.
#[derive(Debug)]
pub enum Completion {
    /// A response was delivered.
    Loaded {
        /// Where it came from.
        source: ResponseSource,
    },
    /// The transport failed and no hook substituted a response.
    Failed(TransportError),
    /// The transport's own timeout elapsed.
    TimedOut,
    /// The exchange was aborted.
    Aborted,
}

impl Completion {
    /// Whether a response was delivered.
    pub fn is_loaded(&self) -> bool {
        matches!(self, Completion::Loaded { .. })
    }

    /// Source of the delivered response.
    pub fn source(&self) -> Option<ResponseSource> {
        match self {
            Completion::Loaded { source } => Some(*source),
            _ => None,
        }
    }
}

/// Shared configuration for cached requests.
#[derive(Debug, Clone)]
pub struct Interceptor {
    cache: Arc<RequestCache>,
    hooks: Hooks,
    config: InterceptorConfig,
}

impl Interceptor {
    /// Creates a new [`InterceptorBuilder`].
    pub fn builder() -> InterceptorBuilder<NotSet> {
        InterceptorBuilder::new()
    }

    /// Wraps a transport into a cached request handle.
    pub fn wrap<T: Transport>(&self, transport: T) -> CachedRequest<T> {
        CachedRequest::new(
            transport,
            Arc::clone(&self.cache),
            self.hooks.clone(),
            self.config,
        )
    }

    /// The bound request cache.
    pub fn cache(&self) -> &Arc<RequestCache> {
        &self.cache
    }

    /// The hooks handed to every wrapped request.
    pub fn hooks(&self) -> &Hooks {
        &self.hooks
    }

    /// The configuration handed to every wrapped request.
    pub fn config(&self) -> &InterceptorConfig {
        &self.config
    }
}

/// Marker type for unset builder fields.
///
/// When you see `NotSet` in a compiler error, it means you haven't called
/// [`InterceptorBuilder::cache`] yet.
#[derive(Debug, Clone, Copy, Default)]
pub struct NotSet;

/// Builder for [`Interceptor`].
pub struct InterceptorBuilder<C> {
    cache: C,
    hooks: Hooks,
    config: InterceptorConfig,
}

impl InterceptorBuilder<NotSet> {
    /// Creates a new builder with no cache bound.
    pub fn new() -> Self {
        Self {
            cache: NotSet,
            hooks: Hooks::default(),
            config: InterceptorConfig::default(),
        }
    }
}

impl Default for InterceptorBuilder<NotSet> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> InterceptorBuilder<C> {
    /// Binds the request cache.
    pub fn cache(self, cache: Arc<RequestCache>) -> InterceptorBuilder<Arc<RequestCache>> {
        InterceptorBuilder {
            cache,
            hooks: self.hooks,
            config: self.config,
        }
    }

    /// Sets the hooks.
    pub fn hooks(self, hooks: Hooks) -> Self {
        Self { hooks, ..self }
    }

    /// Sets the configuration.
    pub fn config(self, config: InterceptorConfig) -> Self {
        Self { config, ..self }
    }
}

impl InterceptorBuilder<Arc<RequestCache>> {
    /// Builds the [`Interceptor`].
    pub fn build(self) -> Interceptor {
        Interceptor {
            cache: self.cache,
            hooks: self.hooks,
            config: self.config,
        }
    }
}
