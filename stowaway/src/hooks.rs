//! Caller-supplied decision functions for the interception facade.
//!
//! Every hook is optional. Hooks run synchronously on the task driving the
//! request and must not block. A hook that returns an error or panics never
//! breaks a request: the facade logs the fault and behaves as if the request
//! were not cached (see [`HookError`]).

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use http::Method;
use stowaway_core::{BoxError, Payload, TransportError};

use crate::error::HookError;
use crate::interceptor::ResponseState;

/// Decides whether a request consults the cache.
pub type CacheablePredicate = Arc<dyn Fn(&Method, &str) -> bool + Send + Sync>;

/// Rewrites an identifier before it becomes part of a cache key.
pub type KeyMangler = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// May replace a transport failure with a synthetic response.
pub type ErrorHook = Arc<
    dyn Fn(&TransportError, &SessionInfo<'_>) -> Result<Option<Payload>, BoxError> + Send + Sync,
>;

/// Gets first refusal on a genuine cache miss.
pub type MissHook = Arc<dyn Fn(&SessionInfo<'_>) -> Result<MissDecision, BoxError> + Send + Sync>;

/// Decides whether a network response pending a cache write is persisted.
pub type LoadHook =
    Arc<dyn Fn(&SessionInfo<'_>, &ResponseState) -> Result<bool, BoxError> + Send + Sync>;

/// What the miss hook wants to happen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MissDecision {
    /// Let the request reach the network.
    Continue,
    /// Answer with this payload and skip the network.
    Respond(Payload),
    /// Answer with this payload, store it, and skip the network.
    RespondAndStore(Payload),
}

/// Read-only view of the session a hook is called for.
#[derive(Debug, Clone, Copy)]
pub struct SessionInfo<'a> {
    /// Method captured at `open`.
    pub method: &'a Method,
    /// Resource identifier captured at `open`, before mangling.
    pub identifier: &'a str,
    /// Eligibility decided at `send`, `None` before that.
    pub cache_eligible: Option<bool>,
    /// Whether a successful network response will be written to the cache.
    pub pending_cache_write: bool,
}

/// The five extension points of the facade.
///
/// ```
/// use http::Method;
/// use stowaway::{Hooks, MissDecision};
///
/// let hooks = Hooks::builder()
///     .cacheable(|method, _| method == Method::GET)
///     .key_mangler(|id| id.trim_end_matches('/').to_owned())
///     .on_miss(|_| Ok(MissDecision::Continue))
///     .build();
/// # let _ = hooks;
/// ```
#[derive(Clone, Default)]
pub struct Hooks {
    cacheable: Option<CacheablePredicate>,
    key_mangler: Option<KeyMangler>,
    on_error: Option<ErrorHook>,
    on_miss: Option<MissHook>,
    on_load: Option<LoadHook>,
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks")
            .field("cacheable", &self.cacheable.is_some())
            .field("key_mangler", &self.key_mangler.is_some())
            .field("on_error", &self.on_error.is_some())
            .field("on_miss", &self.on_miss.is_some())
            .field("on_load", &self.on_load.is_some())
            .finish()
    }
}

impl Hooks {
    /// Creates a new [`HooksBuilder`].
    pub fn builder() -> HooksBuilder {
        HooksBuilder::default()
    }

    pub(crate) fn is_cacheable(&self, method: &Method, identifier: &str) -> Result<bool, HookError> {
        match &self.cacheable {
            Some(predicate) => guard("cacheable", || Ok(predicate(method, identifier))),
            None => Ok(false),
        }
    }

    pub(crate) fn mangle(&self, identifier: &str) -> Result<String, HookError> {
        match &self.key_mangler {
            Some(mangler) => guard("key mangler", || Ok(mangler(identifier))),
            None => Ok(identifier.to_owned()),
        }
    }

    pub(crate) fn on_error(
        &self,
        error: &TransportError,
        session: &SessionInfo<'_>,
    ) -> Result<Option<Payload>, HookError> {
        match &self.on_error {
            Some(hook) => guard("error", || hook(error, session)),
            None => Ok(None),
        }
    }

    pub(crate) fn on_miss(&self, session: &SessionInfo<'_>) -> Result<MissDecision, HookError> {
        match &self.on_miss {
            Some(hook) => guard("miss", || hook(session)),
            None => Ok(MissDecision::Continue),
        }
    }

    pub(crate) fn should_store(
        &self,
        session: &SessionInfo<'_>,
        response: &ResponseState,
    ) -> Result<bool, HookError> {
        match &self.on_load {
            Some(hook) => guard("load", || hook(session, response)),
            None => Ok(persistable(response)),
        }
    }
}

/// Default persistence rule: a 2xx status with a non-empty body.
pub fn persistable(response: &ResponseState) -> bool {
    (200..300).contains(&response.status())
        && response.payload().is_some_and(|payload| !payload.is_empty())
}

/// Builder for [`Hooks`].
#[derive(Default)]
pub struct HooksBuilder {
    hooks: Hooks,
}

impl HooksBuilder {
    /// Sets the eligibility predicate. Without one nothing is cached.
    pub fn cacheable<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&Method, &str) -> bool + Send + Sync + 'static,
    {
        self.hooks.cacheable = Some(Arc::new(predicate));
        self
    }

    /// Sets the key mangler. Without one identifiers are used as is.
    pub fn key_mangler<F>(mut self, mangler: F) -> Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        self.hooks.key_mangler = Some(Arc::new(mangler));
        self
    }

    /// Sets the network error hook.
    ///
    /// Returning `Ok(Some(payload))` turns the failure into a successful
    /// response that is not written to the cache.
    pub fn on_error<F>(mut self, hook: F) -> Self
    where
        F: Fn(&TransportError, &SessionInfo<'_>) -> Result<Option<Payload>, BoxError>
            + Send
            + Sync
            + 'static,
    {
        self.hooks.on_error = Some(Arc::new(hook));
        self
    }

    /// Sets the cache miss hook.
    pub fn on_miss<F>(mut self, hook: F) -> Self
    where
        F: Fn(&SessionInfo<'_>) -> Result<MissDecision, BoxError> + Send + Sync + 'static,
    {
        self.hooks.on_miss = Some(Arc::new(hook));
        self
    }

    /// Sets the post-load hook, replacing the default [`persistable`] rule.
    pub fn on_load<F>(mut self, hook: F) -> Self
    where
        F: Fn(&SessionInfo<'_>, &ResponseState) -> Result<bool, BoxError> + Send + Sync + 'static,
    {
        self.hooks.on_load = Some(Arc::new(hook));
        self
    }

    /// Finishes the builder.
    pub fn build(self) -> Hooks {
        self.hooks
    }
}

fn guard<T>(
    hook: &'static str,
    call: impl FnOnce() -> Result<T, BoxError>,
) -> Result<T, HookError> {
    match panic::catch_unwind(AssertUnwindSafe(call)) {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(source)) => Err(HookError::Failed { hook, source }),
        Err(payload) => Err(HookError::Panicked {
            hook,
            message: panic_message(payload.as_ref()),
        }),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(method: &Method) -> SessionInfo<'_> {
        SessionInfo {
            method,
            identifier: "/a",
            cache_eligible: Some(true),
            pending_cache_write: false,
        }
    }

    #[test]
    fn defaults_never_cache_and_keep_identifiers() {
        let hooks = Hooks::default();
        assert!(!hooks.is_cacheable(&Method::GET, "/a").unwrap());
        assert_eq!(hooks.mangle("/a?b").unwrap(), "/a?b");
        assert_eq!(
            hooks.on_miss(&session(&Method::GET)).unwrap(),
            MissDecision::Continue
        );
    }

    #[test]
    fn panics_become_hook_errors() {
        let hooks = Hooks::builder()
            .cacheable(|_, _| panic!("boom"))
            .key_mangler(|_| panic!("{}", String::from("owned boom")))
            .build();

        match hooks.is_cacheable(&Method::GET, "/a") {
            Err(HookError::Panicked { hook, message }) => {
                assert_eq!(hook, "cacheable");
                assert_eq!(message, "boom");
            }
            other => panic!("unexpected {other:?}"),
        }
        match hooks.mangle("/a") {
            Err(HookError::Panicked { message, .. }) => assert_eq!(message, "owned boom"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn returned_errors_are_kept() {
        let hooks = Hooks::builder()
            .on_miss(|_| Err("offline table missing".into()))
            .build();
        let err = hooks.on_miss(&session(&Method::GET)).unwrap_err();
        assert_eq!(err.to_string(), "miss hook failed: offline table missing");
    }
}
