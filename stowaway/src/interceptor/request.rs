use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures::StreamExt;
use http::{HeaderMap, HeaderName, HeaderValue, Method};
use stowaway_core::{
    Payload, Progress, ReadyState, ResponseType, StoredValue, Transport, TransportError,
    TransportEvent, TransportResponse,
};
use tracing::{debug, warn};

use super::Completion;
use super::listeners::{EventKind, Listener, Listeners, RequestEvent};
use super::response::{ResponseSource, ResponseState};
use super::session::Session;
use crate::cache::{Lookup, RequestCache};
use crate::config::InterceptorConfig;
use crate::error::RequestError;
use crate::hooks::{Hooks, MissDecision};

/// A request handle that answers eligible requests from a [`RequestCache`].
///
/// Mirrors the surface of the wrapped [`Transport`]: `open`, `send`, request
/// headers, timeout, credentials, response type, MIME override and abort are
/// forwarded, while `send` first decides whether the cache can answer.
///
/// Each `open` starts a new session on the same transport. Within a session
/// exactly one terminal outcome is reported: listeners see
/// `ReadyStateChange(Done)` followed by one of `Load`, `Error`, `Timeout` or
/// `Abort`, and `send` resolves with the matching [`Completion`].
pub struct CachedRequest<T: Transport> {
    transport: T,
    cache: Arc<RequestCache>,
    hooks: Hooks,
    config: InterceptorConfig,
    session: Session,
    response: ResponseState,
    listeners: Listeners,
}

impl<T: Transport> fmt::Debug for CachedRequest<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachedRequest")
            .field("cache", &self.cache.namespace())
            .field("hooks", &self.hooks)
            .field("session", &self.session)
            .field("response", &self.response)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl<T: Transport> CachedRequest<T> {
    /// Wraps `transport`. Most callers go through
    /// [`Interceptor::wrap`](crate::Interceptor::wrap).
    pub fn new(
        transport: T,
        cache: Arc<RequestCache>,
        hooks: Hooks,
        config: InterceptorConfig,
    ) -> Self {
        Self {
            transport,
            cache,
            hooks,
            config,
            session: Session::default(),
            response: ResponseState::default(),
            listeners: Listeners::default(),
        }
    }

    /// Starts a new session.
    ///
    /// Clears eligibility, any pending cache write and the previous response.
    pub fn open(
        &mut self,
        method: Method,
        identifier: impl Into<String>,
    ) -> Result<(), RequestError> {
        let identifier = identifier.into();
        if self.config.debug.methods {
            debug!(%method, identifier = %identifier, "open");
        }
        self.session = Session::default();
        self.response = ResponseState::default();
        self.transport.open(&method, &identifier)?;

        self.session = Session::opened(method, identifier);
        self.response = ResponseState::opened();
        self.listeners
            .emit(&RequestEvent::ReadyStateChange(&self.response));
        Ok(())
    }

    /// Sends the request.
    ///
    /// Resolves once the session reached its terminal state and every
    /// listener ran. Network failures are reported through the returned
    /// [`Completion`], not as errors.
    pub async fn send(&mut self, body: Option<Bytes>) -> Result<Completion, RequestError> {
        if !self.session.opened {
            return Err(RequestError::NotOpened);
        }
        if self.session.sent {
            return Err(RequestError::AlreadySent);
        }
        self.session.sent = true;

        let method = self.session.method.clone();
        if self.config.debug.methods {
            debug!(%method, identifier = %self.session.identifier, "send");
        }

        let eligible = self
            .hooks
            .is_cacheable(&method, &self.session.identifier)
            .unwrap_or_else(|err| {
                warn!(error = %err, "cacheable hook failed, sending uncached");
                false
            });
        self.session.cache_eligible = Some(eligible);
        if !eligible {
            if self.config.debug.cache {
                debug!(identifier = %self.session.identifier, "not cacheable");
            }
            return Ok(self.dispatch(body).await);
        }

        let identifier = match self.hooks.mangle(&self.session.identifier) {
            Ok(identifier) => identifier,
            Err(err) => {
                warn!(error = %err, "key mangler failed, sending uncached");
                self.session.cache_eligible = Some(false);
                return Ok(self.dispatch(body).await);
            }
        };
        self.session.cache_identifier = Some(identifier.clone());

        if let Lookup::Hit(value) = self.cache.lookup(&method, &identifier).await {
            if self.config.debug.cache {
                debug!(identifier = %identifier, "served from cache");
            }
            if self.config.refresh_on_hit {
                self.refresh(method, identifier, value.clone());
            }
            return Ok(self.respond(value.into_payload(), ResponseSource::Cache));
        }

        match self.hooks.on_miss(&self.session.info()) {
            Ok(MissDecision::Continue) => {}
            Ok(MissDecision::Respond(payload)) => {
                return Ok(self.respond(payload, ResponseSource::MissHook));
            }
            Ok(MissDecision::RespondAndStore(payload)) => {
                if let Err(err) = self.cache.store(&method, &identifier, payload.clone()).await {
                    warn!(error = %err, "failed to store miss hook response");
                }
                return Ok(self.respond(payload, ResponseSource::MissHook));
            }
            Err(err) => warn!(error = %err, "miss hook failed, continuing to network"),
        }

        if self.config.debug.cache {
            debug!(identifier = %identifier, "cache miss, sending");
        }
        self.session.pending_cache_write = true;
        Ok(self.dispatch(body).await)
    }

    async fn dispatch(&mut self, body: Option<Bytes>) -> Completion {
        let mut events = self.transport.send(body);
        while let Some(event) = events.next().await {
            if self.config.debug.events {
                debug!(?event, "transport event");
            }
            match event {
                TransportEvent::HeadersReceived {
                    status,
                    status_text,
                    headers,
                    url,
                } => {
                    self.response
                        .headers_received(status, status_text, headers, url);
                    self.listeners
                        .emit(&RequestEvent::ReadyStateChange(&self.response));
                }
                TransportEvent::Loading => {
                    self.response.set_ready_state(ReadyState::Loading);
                    self.listeners
                        .emit(&RequestEvent::ReadyStateChange(&self.response));
                }
                TransportEvent::Progress(progress) => {
                    self.listeners.emit(&RequestEvent::Progress(progress));
                }
                TransportEvent::Load(response) => return self.loaded(response).await,
                TransportEvent::Error(err) => return self.failed(err),
                TransportEvent::Timeout => {
                    self.interrupted(RequestEvent::Timeout);
                    return Completion::TimedOut;
                }
                TransportEvent::Abort => break,
            }
        }
        self.interrupted(RequestEvent::Abort);
        Completion::Aborted
    }

    async fn loaded(&mut self, response: TransportResponse) -> Completion {
        self.response.loaded(response);

        let success = self
            .response
            .status_code()
            .is_some_and(|status| status.is_success());
        if self.session.pending_cache_write && success {
            let persist = self
                .hooks
                .should_store(&self.session.info(), &self.response)
                .unwrap_or_else(|err| {
                    warn!(error = %err, "load hook failed, skipping cache write");
                    false
                });
            let payload = self.response.payload().filter(|_| persist).cloned();
            if let (Some(payload), Some(identifier)) = (payload, &self.session.cache_identifier) {
                if let Err(err) = self
                    .cache
                    .store(&self.session.method, identifier, payload)
                    .await
                {
                    debug!(error = %err, "response delivered without cache write");
                }
            }
        }
        self.session.pending_cache_write = false;

        self.completed();
        Completion::Loaded {
            source: ResponseSource::Network,
        }
    }

    fn failed(&mut self, err: TransportError) -> Completion {
        let substitute = self.hooks.on_error(&err, &self.session.info());
        self.session.pending_cache_write = false;
        match substitute {
            Ok(Some(payload)) => {
                if self.config.debug.cache {
                    debug!(error = %err, "error hook substituted a response");
                }
                return self.respond(payload, ResponseSource::ErrorHook);
            }
            Ok(None) => {}
            Err(hook_err) => warn!(error = %hook_err, "error hook failed"),
        }

        self.response.failed();
        self.listeners
            .emit(&RequestEvent::ReadyStateChange(&self.response));
        self.listeners.emit(&RequestEvent::Error(&err));
        Completion::Failed(err)
    }

    fn interrupted(&mut self, event: RequestEvent<'static>) {
        self.session.pending_cache_write = false;
        self.response.failed();
        self.listeners
            .emit(&RequestEvent::ReadyStateChange(&self.response));
        self.listeners.emit(&event);
    }

    fn respond(&mut self, payload: Payload, source: ResponseSource) -> Completion {
        self.response.synthesized(payload, source);
        self.completed();
        Completion::Loaded { source }
    }

    fn completed(&mut self) {
        self.listeners
            .emit(&RequestEvent::ReadyStateChange(&self.response));
        self.listeners.emit(&RequestEvent::Load(&self.response));
    }

    fn refresh(&self, method: Method, identifier: String, value: StoredValue) {
        let cache = Arc::clone(&self.cache);
        tokio::spawn(async move {
            if let Err(err) = cache.store(&method, &identifier, value.touch()).await {
                debug!(error = %err, "cache refresh failed");
            }
        });
    }

    /// Registers a listener for one kind of event.
    ///
    /// Listeners of the same kind run in registration order.
    pub fn add_event_listener<F>(&mut self, kind: EventKind, listener: F)
    where
        F: FnMut(&RequestEvent<'_>) + Send + 'static,
    {
        self.listeners.add(kind, Box::new(listener) as Listener);
    }

    /// Registers a listener for ready state changes.
    pub fn on_ready_state_change<F>(&mut self, mut listener: F)
    where
        F: FnMut(&ResponseState) + Send + 'static,
    {
        self.add_event_listener(EventKind::ReadyStateChange, move |event| {
            if let RequestEvent::ReadyStateChange(response) = event {
                listener(response);
            }
        });
    }

    /// Registers a listener for successful completion.
    pub fn on_load<F>(&mut self, mut listener: F)
    where
        F: FnMut(&ResponseState) + Send + 'static,
    {
        self.add_event_listener(EventKind::Load, move |event| {
            if let RequestEvent::Load(response) = event {
                listener(response);
            }
        });
    }

    /// Registers a listener for transport failures.
    pub fn on_error<F>(&mut self, mut listener: F)
    where
        F: FnMut(&TransportError) + Send + 'static,
    {
        self.add_event_listener(EventKind::Error, move |event| {
            if let RequestEvent::Error(err) = event {
                listener(err);
            }
        });
    }

    /// Registers a listener for download progress.
    pub fn on_progress<F>(&mut self, mut listener: F)
    where
        F: FnMut(Progress) + Send + 'static,
    {
        self.add_event_listener(EventKind::Progress, move |event| {
            if let RequestEvent::Progress(progress) = event {
                listener(*progress);
            }
        });
    }

    /// Registers a listener for transport timeouts.
    pub fn on_timeout<F>(&mut self, mut listener: F)
    where
        F: FnMut() + Send + 'static,
    {
        self.add_event_listener(EventKind::Timeout, move |_| listener());
    }

    /// Registers a listener for aborts.
    pub fn on_abort<F>(&mut self, mut listener: F)
    where
        F: FnMut() + Send + 'static,
    {
        self.add_event_listener(EventKind::Abort, move |_| listener());
    }

    /// Effective response of the current session.
    pub fn response(&self) -> &ResponseState {
        &self.response
    }

    /// Current ready state.
    pub fn ready_state(&self) -> ReadyState {
        self.response.ready_state()
    }

    /// Numeric status of the effective response.
    pub fn status(&self) -> u16 {
        self.response.status()
    }

    /// Status text of the effective response.
    pub fn status_text(&self) -> &str {
        self.response.status_text()
    }

    /// Body of the effective response.
    pub fn payload(&self) -> Option<&Payload> {
        self.response.payload()
    }

    /// First value of a response header.
    pub fn response_header(&self, name: &HeaderName) -> Option<&HeaderValue> {
        self.response.header(name)
    }

    /// All response headers.
    pub fn response_headers(&self) -> &HeaderMap {
        self.response.headers()
    }

    /// Final URL reported by the transport.
    pub fn response_url(&self) -> Option<&str> {
        self.response.url()
    }

    /// Method captured by the last `open`.
    pub fn method(&self) -> Option<&Method> {
        self.session.opened.then_some(&self.session.method)
    }

    /// Identifier captured by the last `open`.
    pub fn identifier(&self) -> Option<&str> {
        self.session
            .opened
            .then_some(self.session.identifier.as_str())
    }

    /// The bound request cache.
    pub fn cache(&self) -> &Arc<RequestCache> {
        &self.cache
    }

    /// Binds a different request cache for subsequent sessions.
    pub fn set_cache(&mut self, cache: Arc<RequestCache>) {
        self.cache = cache;
    }

    /// Adds a header to the prepared request.
    pub fn set_request_header(
        &mut self,
        name: HeaderName,
        value: HeaderValue,
    ) -> Result<(), RequestError> {
        self.transport.set_request_header(name, value)?;
        Ok(())
    }

    /// Native transport timeout.
    pub fn timeout(&self) -> Option<Duration> {
        self.transport.timeout()
    }

    /// Sets the native transport timeout.
    pub fn set_timeout(&mut self, timeout: Option<Duration>) {
        self.transport.set_timeout(timeout);
    }

    /// Body representation for responses.
    pub fn response_type(&self) -> ResponseType {
        self.transport.response_type()
    }

    /// Sets the body representation for responses.
    pub fn set_response_type(&mut self, response_type: ResponseType) {
        self.transport.set_response_type(response_type);
    }

    /// Credentials flag.
    pub fn with_credentials(&self) -> bool {
        self.transport.with_credentials()
    }

    /// Sets the credentials flag.
    pub fn set_with_credentials(&mut self, enabled: bool) {
        self.transport.set_with_credentials(enabled);
    }

    /// Overrides the content type reported for responses.
    pub fn override_mime_type(&mut self, mime: &str) {
        self.transport.override_mime_type(mime);
    }

    /// Aborts the current network exchange.
    ///
    /// Does not retract a cache write already in flight.
    pub fn abort(&mut self) {
        self.transport.abort();
    }

    /// A cloneable handle that aborts the exchange while `send` is pending.
    pub fn abort_handle(&self) -> T::Abort {
        self.transport.abort_handle()
    }

    /// The wrapped transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Unwraps the transport.
    pub fn into_inner(self) -> T {
        self.transport
    }
}
