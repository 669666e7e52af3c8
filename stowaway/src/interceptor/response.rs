use http::header::CONTENT_TYPE;
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use stowaway_core::{Payload, ReadyState, TransportResponse};

/// Where the effective response of a session came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResponseSource {
    /// The real transport.
    Network,
    /// A cache hit.
    Cache,
    /// A payload substituted by the error hook.
    ErrorHook,
    /// A payload supplied by the miss hook.
    MissHook,
}

/// Caller-visible response fields of a [`CachedRequest`](crate::CachedRequest).
///
/// When a load listener runs every field already describes the effective
/// outcome, whichever path produced it.
#[derive(Debug, Clone, Default)]
pub struct ResponseState {
    ready_state: ReadyState,
    status: u16,
    status_text: String,
    headers: HeaderMap,
    url: Option<String>,
    payload: Option<Payload>,
    source: Option<ResponseSource>,
}

impl ResponseState {
    /// Current ready state.
    pub fn ready_state(&self) -> ReadyState {
        self.ready_state
    }

    /// Numeric status, `0` until headers arrive and after failures.
    pub fn status(&self) -> u16 {
        self.status
    }

    /// Status as a [`StatusCode`], when one is known.
    pub fn status_code(&self) -> Option<StatusCode> {
        StatusCode::from_u16(self.status).ok()
    }

    /// Status line text.
    pub fn status_text(&self) -> &str {
        &self.status_text
    }

    /// Response headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// First value of a response header.
    pub fn header(&self, name: &HeaderName) -> Option<&HeaderValue> {
        self.headers.get(name)
    }

    /// Final response URL, if the transport reported one.
    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    /// Response body, available once the state is [`ReadyState::Done`].
    pub fn payload(&self) -> Option<&Payload> {
        self.payload.as_ref()
    }

    /// Where the response came from, once it completed successfully.
    pub fn source(&self) -> Option<ResponseSource> {
        self.source
    }

    pub(crate) fn opened() -> Self {
        Self {
            ready_state: ReadyState::Opened,
            ..Self::default()
        }
    }

    pub(crate) fn set_ready_state(&mut self, ready_state: ReadyState) {
        self.ready_state = ready_state;
    }

    pub(crate) fn headers_received(
        &mut self,
        status: StatusCode,
        status_text: String,
        headers: HeaderMap,
        url: Option<String>,
    ) {
        self.ready_state = ReadyState::HeadersReceived;
        self.status = status.as_u16();
        self.status_text = status_text;
        self.headers = headers;
        self.url = url;
    }

    pub(crate) fn loaded(&mut self, response: TransportResponse) {
        self.ready_state = ReadyState::Done;
        self.status = response.status.as_u16();
        self.status_text = response.status_text;
        self.headers = response.headers;
        if response.url.is_some() {
            self.url = response.url;
        }
        self.payload = Some(response.payload);
        self.source = Some(ResponseSource::Network);
    }

    /// A locally produced `200 OK` carrying `payload`.
    pub(crate) fn synthesized(&mut self, payload: Payload, source: ResponseSource) {
        let mut headers = HeaderMap::new();
        if let Some(value) = payload
            .content_type()
            .and_then(|mime| HeaderValue::from_str(mime).ok())
        {
            headers.insert(CONTENT_TYPE, value);
        }
        self.ready_state = ReadyState::Done;
        self.status = StatusCode::OK.as_u16();
        self.status_text = "OK".to_owned();
        self.headers = headers;
        self.payload = Some(payload);
        self.source = Some(source);
    }

    pub(crate) fn failed(&mut self) {
        self.ready_state = ReadyState::Done;
        self.status = 0;
        self.status_text.clear();
        self.headers.clear();
        self.payload = None;
        self.source = None;
    }
}
