use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::task::Poll;
use std::time::Duration;

use bytes::Bytes;
use futures::StreamExt;
use futures::stream;
use http::{HeaderName, HeaderValue, Method, StatusCode};
use stowaway_core::{
    AbortHandle, EventStream, Payload, Progress, ResponseType, Transport, TransportError,
    TransportEvent, TransportResponse,
};

/// Ready-made event sequences.
pub mod script {
    use super::*;

    /// Headers, loading, one progress event and a load.
    pub fn respond(status: StatusCode, payload: Payload) -> Vec<TransportEvent> {
        let size = payload.size_estimate() as u64;
        let response = TransportResponse::new(status, payload);
        vec![
            TransportEvent::HeadersReceived {
                status,
                status_text: response.status_text.clone(),
                headers: response.headers.clone(),
                url: None,
            },
            TransportEvent::Loading,
            TransportEvent::Progress(Progress {
                loaded: size,
                total: Some(size),
            }),
            TransportEvent::Load(response),
        ]
    }

    /// A `200 OK` carrying `body`.
    pub fn ok(body: &str) -> Vec<TransportEvent> {
        respond(StatusCode::OK, Payload::text_with_type(body, "text/plain"))
    }

    /// A connection failure.
    pub fn fail(message: &str) -> Vec<TransportEvent> {
        vec![TransportEvent::Error(TransportError::connection(
            message.to_owned(),
        ))]
    }

    /// The transport's own timeout.
    pub fn timeout() -> Vec<TransportEvent> {
        vec![TransportEvent::Timeout]
    }

    /// Appends events a misbehaving transport emits after finishing.
    pub fn with_spurious_tail(mut events: Vec<TransportEvent>) -> Vec<TransportEvent> {
        events.push(TransportEvent::Error(TransportError::connection(
            "spurious late error",
        )));
        events.push(TransportEvent::Load(TransportResponse::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            Payload::new("late"),
        )));
        events
    }
}

#[derive(Debug, Default)]
struct Shared {
    send_count: AtomicUsize,
    abort_requested: AtomicBool,
    abort_count: AtomicUsize,
    opened: Mutex<Vec<(Method, String)>>,
    headers: Mutex<Vec<(HeaderName, HeaderValue)>>,
    bodies: Mutex<Vec<Option<Bytes>>>,
}

/// Inspects a [`MockTransport`] after it was moved into a request.
#[derive(Clone, Debug)]
pub struct TransportProbe(Arc<Shared>);

impl TransportProbe {
    pub fn send_count(&self) -> usize {
        self.0.send_count.load(Ordering::SeqCst)
    }

    pub fn abort_count(&self) -> usize {
        self.0.abort_count.load(Ordering::SeqCst)
    }

    pub fn opened(&self) -> Vec<(Method, String)> {
        self.0
            .opened
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn headers(&self) -> Vec<(HeaderName, HeaderValue)> {
        self.0
            .headers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn bodies(&self) -> Vec<Option<Bytes>> {
        self.0
            .bodies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[derive(Clone, Debug)]
pub struct MockAbortHandle(Arc<Shared>);

impl AbortHandle for MockAbortHandle {
    fn abort(&self) {
        self.0.abort_count.fetch_add(1, Ordering::SeqCst);
        self.0.abort_requested.store(true, Ordering::SeqCst);
    }
}

/// Transport that replays one scripted event sequence per `send`.
///
/// A `send` without a queued script yields an empty stream. An abort makes
/// the in-flight stream yield `Abort` at its next poll.
#[derive(Debug, Default)]
pub struct MockTransport {
    scripts: VecDeque<Vec<TransportEvent>>,
    shared: Arc<Shared>,
    opened: bool,
    timeout: Option<Duration>,
    response_type: ResponseType,
    with_credentials: bool,
    mime_override: Option<String>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues the events of the next `send`.
    pub fn script(mut self, events: Vec<TransportEvent>) -> Self {
        self.scripts.push_back(events);
        self
    }

    pub fn probe(&self) -> TransportProbe {
        TransportProbe(Arc::clone(&self.shared))
    }

    pub fn mime_override(&self) -> Option<&str> {
        self.mime_override.as_deref()
    }
}

impl Transport for MockTransport {
    type Abort = MockAbortHandle;

    fn open(&mut self, method: &Method, url: &str) -> Result<(), TransportError> {
        if url.is_empty() {
            return Err(TransportError::InvalidRequest("empty url".to_owned()));
        }
        self.opened = true;
        self.shared
            .opened
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((method.clone(), url.to_owned()));
        self.shared
            .headers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        Ok(())
    }

    fn set_request_header(
        &mut self,
        name: HeaderName,
        value: HeaderValue,
    ) -> Result<(), TransportError> {
        if !self.opened {
            return Err(TransportError::NotOpened);
        }
        self.shared
            .headers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((name, value));
        Ok(())
    }

    fn send(&mut self, body: Option<Bytes>) -> EventStream {
        if !self.opened {
            return stream::iter([TransportEvent::Error(TransportError::NotOpened)]).boxed();
        }
        self.shared.send_count.fetch_add(1, Ordering::SeqCst);
        self.shared
            .bodies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(body);
        self.shared.abort_requested.store(false, Ordering::SeqCst);

        let shared = Arc::clone(&self.shared);
        let mut events = self.scripts.pop_front().unwrap_or_default().into_iter();
        let mut finished = false;
        stream::poll_fn(move |_| {
            if finished {
                return Poll::Ready(None);
            }
            if shared.abort_requested.swap(false, Ordering::SeqCst) {
                finished = true;
                return Poll::Ready(Some(TransportEvent::Abort));
            }
            Poll::Ready(events.next())
        })
        .boxed()
    }

    fn abort_handle(&self) -> Self::Abort {
        MockAbortHandle(Arc::clone(&self.shared))
    }

    fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    fn set_timeout(&mut self, timeout: Option<Duration>) {
        self.timeout = timeout;
    }

    fn response_type(&self) -> ResponseType {
        self.response_type
    }

    fn set_response_type(&mut self, response_type: ResponseType) {
        self.response_type = response_type;
    }

    fn with_credentials(&self) -> bool {
        self.with_credentials
    }

    fn set_with_credentials(&mut self, enabled: bool) {
        self.with_credentials = enabled;
    }

    fn override_mime_type(&mut self, mime: &str) {
        self.mime_override = Some(mime.to_owned());
    }
}
