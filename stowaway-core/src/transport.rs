//! The request handle contract.
//!
//! A [`Transport`] is a reusable, stateful request handle: it is opened with a
//! method and URL, configured through pass-through setters, and sent. Sending
//! yields an [`EventStream`] that reports the lifecycle of one exchange.
//!
//! ## Event order
//!
//! A well-behaved transport emits `HeadersReceived`, then `Loading`, then any
//! number of `Progress` events, and finally exactly one terminal event:
//! [`TransportEvent::Load`], [`TransportEvent::Error`],
//! [`TransportEvent::Timeout`] or [`TransportEvent::Abort`]. A stream that
//! ends without a terminal event is treated as aborted. Consumers stop reading
//! after the terminal event, so anything a transport yields afterwards is
//! never observed.

use std::fmt;
use std::time::Duration;

use bytes::Bytes;
use futures::stream::BoxStream;
use http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use thiserror::Error;

use crate::payload::Payload;

/// Boxed error used for foreign error sources.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Stream of events produced by one [`Transport::send`] call.
pub type EventStream = BoxStream<'static, TransportEvent>;

/// Lifecycle stage of a request handle, numbered like the classic
/// request-handle ready states.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum ReadyState {
    /// Created, not opened.
    #[default]
    Unsent = 0,
    /// `open` was called.
    Opened = 1,
    /// Response status and headers are available.
    HeadersReceived = 2,
    /// The body is being received.
    Loading = 3,
    /// The exchange finished, successfully or not.
    Done = 4,
}

/// How a transport should represent the response body.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ResponseType {
    /// Decode the body as UTF-8 text (lossily).
    #[default]
    Text,
    /// Keep the body as raw bytes.
    Binary,
}

/// Body download progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    /// Bytes received so far.
    pub loaded: u64,
    /// Total bytes expected, when the server announced it.
    pub total: Option<u64>,
}

/// A completed network response.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    /// HTTP status.
    pub status: StatusCode,
    /// Status line text.
    pub status_text: String,
    /// Response headers.
    pub headers: HeaderMap,
    /// Final URL after redirects, if known.
    pub url: Option<String>,
    /// The response body.
    pub payload: Payload,
}

impl TransportResponse {
    /// Response with the canonical status text and no headers.
    pub fn new(status: StatusCode, payload: Payload) -> Self {
        Self {
            status,
            status_text: status.canonical_reason().unwrap_or_default().to_owned(),
            headers: HeaderMap::new(),
            url: None,
            payload,
        }
    }

    /// Adds a response header.
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }
}

/// Events reported by a transport while a request is in flight.
#[derive(Debug)]
pub enum TransportEvent {
    /// Status line and headers arrived.
    HeadersReceived {
        /// HTTP status.
        status: StatusCode,
        /// Status line text.
        status_text: String,
        /// Response headers.
        headers: HeaderMap,
        /// Final URL after redirects, if known.
        url: Option<String>,
    },
    /// The body started downloading.
    Loading,
    /// Part of the body arrived.
    Progress(Progress),
    /// The exchange completed with a response. Terminal.
    Load(TransportResponse),
    /// The exchange failed. Terminal.
    Error(TransportError),
    /// The transport's own timeout elapsed. Terminal.
    Timeout,
    /// The request was aborted. Terminal.
    Abort,
}

impl TransportEvent {
    /// Whether this event ends the exchange.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransportEvent::Load(_)
                | TransportEvent::Error(_)
                | TransportEvent::Timeout
                | TransportEvent::Abort
        )
    }
}

/// Network-level failure reported by a transport.
#[derive(Debug, Error)]
pub enum TransportError {
    /// `send` was called on a handle that was never opened.
    #[error("request handle is not opened")]
    NotOpened,
    /// The method, URL or a header was rejected.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    /// The request could not be delivered.
    #[error("connection failed: {0}")]
    Connection(#[source] BoxError),
    /// The response body could not be read.
    #[error("failed to read response body: {0}")]
    Body(#[source] BoxError),
}

impl TransportError {
    /// Wraps any error as a connection failure.
    pub fn connection(err: impl Into<BoxError>) -> Self {
        TransportError::Connection(err.into())
    }
}

/// Cancels the in-flight exchange of a transport from outside of `send`.
pub trait AbortHandle: Clone + Send + Sync + fmt::Debug + 'static {
    /// Aborts the current exchange, if any.
    fn abort(&self);
}

/// A reusable request handle.
///
/// `open` may be called any number of times on one handle; each call starts a
/// new exchange and discards request headers set for the previous one.
pub trait Transport: Send {
    /// Handle type returned by [`Transport::abort_handle`].
    type Abort: AbortHandle;

    /// Prepares a new exchange.
    fn open(&mut self, method: &Method, url: &str) -> Result<(), TransportError>;

    /// Adds a header to the prepared request.
    fn set_request_header(
        &mut self,
        name: HeaderName,
        value: HeaderValue,
    ) -> Result<(), TransportError>;

    /// Starts the exchange and returns its event stream.
    fn send(&mut self, body: Option<Bytes>) -> EventStream;

    /// A cloneable handle that aborts the current exchange.
    fn abort_handle(&self) -> Self::Abort;

    /// Aborts the current exchange.
    fn abort(&mut self) {
        self.abort_handle().abort();
    }

    /// Native timeout applied to each exchange.
    fn timeout(&self) -> Option<Duration>;

    /// Sets the native timeout.
    fn set_timeout(&mut self, timeout: Option<Duration>);

    /// Body representation for responses.
    fn response_type(&self) -> ResponseType;

    /// Sets the body representation for responses.
    fn set_response_type(&mut self, response_type: ResponseType);

    /// Whether credentials are sent with cross-origin requests.
    fn with_credentials(&self) -> bool;

    /// Sets the credentials flag.
    fn set_with_credentials(&mut self, enabled: bool);

    /// Overrides the content type reported for responses.
    fn override_mime_type(&mut self, mime: &str);
}
