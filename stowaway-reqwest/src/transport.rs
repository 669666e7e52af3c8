//! [`Transport`] implementation over a [`reqwest::Client`].

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use bytes::Bytes;
use futures::StreamExt;
use futures::future::AbortHandle as StreamAbortHandle;
use futures::stream;
use http::header::CONTENT_TYPE;
use http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use reqwest::{Client, RequestBuilder, Response};
use stowaway_core::{
    AbortHandle, Body, EventStream, Payload, Progress, ResponseType, Transport, TransportError,
    TransportEvent, TransportResponse,
};
use tracing::debug;

/// Aborts the in-flight exchange of a [`ReqwestTransport`].
///
/// Aborting ends the event stream, which the facade reports as an abort.
#[derive(Clone, Debug, Default)]
pub struct ReqwestAbortHandle(Arc<Mutex<Option<StreamAbortHandle>>>);

impl ReqwestAbortHandle {
    fn replace(&self, handle: StreamAbortHandle) {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
    }
}

impl AbortHandle for ReqwestAbortHandle {
    fn abort(&self) {
        if let Some(handle) = self
            .0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
        {
            handle.abort();
        }
    }
}

#[derive(Debug)]
struct Prepared {
    method: Method,
    url: reqwest::Url,
    headers: HeaderMap,
}

#[derive(Debug, Clone)]
struct ReadOptions {
    response_type: ResponseType,
    mime_override: Option<String>,
}

/// A reusable request handle backed by reqwest.
///
/// `open` prepares one exchange and `send` consumes it; a second `send`
/// needs a new `open`. The credentials flag is recorded but has no effect:
/// reqwest has no notion of cross-origin requests.
#[derive(Debug)]
pub struct ReqwestTransport {
    client: Client,
    prepared: Option<Prepared>,
    timeout: Option<Duration>,
    response_type: ResponseType,
    with_credentials: bool,
    mime_override: Option<String>,
    abort: ReqwestAbortHandle,
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self::new(Client::new())
    }
}

impl ReqwestTransport {
    /// Creates a handle sending through `client`.
    pub fn new(client: Client) -> Self {
        Self {
            client,
            prepared: None,
            timeout: None,
            response_type: ResponseType::default(),
            with_credentials: false,
            mime_override: None,
            abort: ReqwestAbortHandle::default(),
        }
    }

    /// The underlying client.
    pub fn client(&self) -> &Client {
        &self.client
    }
}

impl Transport for ReqwestTransport {
    type Abort = ReqwestAbortHandle;

    fn open(&mut self, method: &Method, url: &str) -> Result<(), TransportError> {
        let url = reqwest::Url::parse(url)
            .map_err(|err| TransportError::InvalidRequest(format!("{url}: {err}")))?;
        self.prepared = Some(Prepared {
            method: method.clone(),
            url,
            headers: HeaderMap::new(),
        });
        Ok(())
    }

    fn set_request_header(
        &mut self,
        name: HeaderName,
        value: HeaderValue,
    ) -> Result<(), TransportError> {
        let prepared = self.prepared.as_mut().ok_or(TransportError::NotOpened)?;
        prepared.headers.append(name, value);
        Ok(())
    }

    fn send(&mut self, body: Option<Bytes>) -> EventStream {
        let Some(prepared) = self.prepared.take() else {
            return stream::iter([TransportEvent::Error(TransportError::NotOpened)]).boxed();
        };
        debug!(method = %prepared.method, url = %prepared.url, "sending request");

        let mut request = self
            .client
            .request(prepared.method, prepared.url)
            .headers(prepared.headers);
        if let Some(timeout) = self.timeout {
            request = request.timeout(timeout);
        }
        if let Some(body) = body {
            request = request.body(body);
        }
        let options = ReadOptions {
            response_type: self.response_type,
            mime_override: self.mime_override.clone(),
        };

        let events = stream::unfold(Phase::Request(request, options), step);
        let (events, handle) = stream::abortable(events);
        self.abort.replace(handle);
        events.boxed()
    }

    fn abort_handle(&self) -> Self::Abort {
        self.abort.clone()
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

enum Phase {
    Request(RequestBuilder, ReadOptions),
    Loading(Response, ReadOptions),
    Body {
        response: Response,
        received: Vec<u8>,
        total: Option<u64>,
        options: ReadOptions,
    },
    Done,
}

async fn step(phase: Phase) -> Option<(TransportEvent, Phase)> {
    match phase {
        Phase::Request(request, options) => match request.send().await {
            Ok(response) => {
                let event = TransportEvent::HeadersReceived {
                    status: response.status(),
                    status_text: status_text(response.status()),
                    headers: response.headers().clone(),
                    url: Some(response.url().to_string()),
                };
                Some((event, Phase::Loading(response, options)))
            }
            Err(err) => Some((
                request_failed(err, |err| TransportError::Connection(err.into())),
                Phase::Done,
            )),
        },
        Phase::Loading(response, options) => {
            let total = response.content_length();
            let next = Phase::Body {
                response,
                received: Vec::new(),
                total,
                options,
            };
            Some((TransportEvent::Loading, next))
        }
        Phase::Body {
            mut response,
            mut received,
            total,
            options,
        } => match response.chunk().await {
            Ok(Some(chunk)) => {
                received.extend_from_slice(&chunk);
                let progress = Progress {
                    loaded: received.len() as u64,
                    total,
                };
                let next = Phase::Body {
                    response,
                    received,
                    total,
                    options,
                };
                Some((TransportEvent::Progress(progress), next))
            }
            Ok(None) => {
                let loaded = TransportResponse {
                    status: response.status(),
                    status_text: status_text(response.status()),
                    payload: payload(received, response.headers(), &options),
                    headers: response.headers().clone(),
                    url: Some(response.url().to_string()),
                };
                Some((TransportEvent::Load(loaded), Phase::Done))
            }
            Err(err) => Some((
                request_failed(err, |err| TransportError::Body(err.into())),
                Phase::Done,
            )),
        },
        Phase::Done => None,
    }
}

fn request_failed(
    err: reqwest::Error,
    wrap: impl FnOnce(reqwest::Error) -> TransportError,
) -> TransportEvent {
    if err.is_timeout() {
        debug!(error = %err, "request timed out");
        TransportEvent::Timeout
    } else {
        debug!(error = %err, "request failed");
        TransportEvent::Error(wrap(err))
    }
}

fn status_text(status: StatusCode) -> String {
    status.canonical_reason().unwrap_or_default().to_owned()
}

fn payload(received: Vec<u8>, headers: &HeaderMap, options: &ReadOptions) -> Payload {
    let content_type = options.mime_override.clone().or_else(|| {
        headers
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned)
    });
    let body = match options.response_type {
        ResponseType::Text => Body::Text(String::from_utf8_lossy(&received).into_owned()),
        ResponseType::Binary => Body::Binary(Bytes::from(received)),
    };
    match content_type {
        Some(content_type) => Payload::with_content_type(body, content_type),
        None => Payload::new(body),
    }
}
