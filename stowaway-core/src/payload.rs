//! Response payloads.
//!
//! A [`Payload`] is the raw body of a response plus the content type it was
//! served with. Nothing is parsed implicitly: callers pick a decoding with
//! [`Payload::decode`], [`Payload::json`] or [`Payload::text`], and every
//! failure comes back as a [`DecodeError`].
//!
//! ```
//! use stowaway_core::{Decoded, Payload};
//!
//! let payload = Payload::text_with_type(r#"{"id":42}"#, "application/json");
//! match payload.decode().unwrap() {
//!     Decoded::Json(value) => assert_eq!(value["id"], 42),
//!     other => panic!("unexpected {other:?}"),
//! }
//! ```

use std::str::Utf8Error;

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Raw response body, kept either as text or as bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Body {
    /// Textual body.
    Text(String),
    /// Binary body.
    Binary(Bytes),
}

impl Body {
    /// Length of the body in bytes.
    pub fn len(&self) -> usize {
        match self {
            Body::Text(text) => text.len(),
            Body::Binary(bytes) => bytes.len(),
        }
    }

    /// Returns `true` when the body holds no data.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Borrow the body as bytes, whatever its representation.
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Body::Text(text) => text.as_bytes(),
            Body::Binary(bytes) => bytes,
        }
    }
}

impl From<String> for Body {
    fn from(text: String) -> Self {
        Body::Text(text)
    }
}

impl From<&str> for Body {
    fn from(text: &str) -> Self {
        Body::Text(text.to_owned())
    }
}

impl From<Bytes> for Body {
    fn from(bytes: Bytes) -> Self {
        Body::Binary(bytes)
    }
}

impl From<Vec<u8>> for Body {
    fn from(bytes: Vec<u8>) -> Self {
        Body::Binary(Bytes::from(bytes))
    }
}

/// A response body together with its content type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payload {
    body: Body,
    content_type: Option<String>,
}

/// Result of [`Payload::decode`].
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    /// The payload was declared as JSON and parsed.
    Json(serde_json::Value),
    /// The payload was declared as text (or undeclared) and is valid UTF-8.
    Text(String),
    /// Any other content type.
    Binary(Bytes),
}

/// Error returned by the explicit payload decoders.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Payload bytes are not valid UTF-8.
    #[error("payload is not valid UTF-8")]
    NotUtf8(#[from] Utf8Error),
    /// Payload is not valid JSON for the requested type.
    #[error("payload is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl Payload {
    /// Creates a payload without a content type.
    pub fn new(body: impl Into<Body>) -> Self {
        Self {
            body: body.into(),
            content_type: None,
        }
    }

    /// Creates a payload with the given content type.
    pub fn with_content_type(body: impl Into<Body>, content_type: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            content_type: Some(content_type.into()),
        }
    }

    /// Shorthand for a textual payload with a content type.
    pub fn text_with_type(text: impl Into<String>, content_type: impl Into<String>) -> Self {
        Self::with_content_type(Body::Text(text.into()), content_type)
    }

    /// The raw body.
    pub fn body(&self) -> &Body {
        &self.body
    }

    /// The declared content type, if any.
    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    /// Size used for memory accounting.
    pub fn size_estimate(&self) -> usize {
        self.body.len()
    }

    /// Returns `true` when the body is empty.
    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }

    /// Consumes the payload and returns its body.
    pub fn into_body(self) -> Body {
        self.body
    }

    /// Borrow the body as UTF-8 text.
    pub fn text(&self) -> Result<&str, DecodeError> {
        match &self.body {
            Body::Text(text) => Ok(text),
            Body::Binary(bytes) => Ok(std::str::from_utf8(bytes)?),
        }
    }

    /// Deserialize the body as JSON, regardless of the declared content type.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, DecodeError> {
        Ok(serde_json::from_slice(self.body.as_bytes())?)
    }

    /// Decode according to the declared content type.
    ///
    /// `*/json` and `*+json` types parse as JSON, `text/*` (and a missing
    /// content type on a textual body) become text, everything else is
    /// returned as bytes.
    pub fn decode(&self) -> Result<Decoded, DecodeError> {
        let essence = self
            .content_type()
            .map(|ct| ct.split(';').next().unwrap_or(ct).trim().to_ascii_lowercase());

        match essence.as_deref() {
            Some(ct) if ct.ends_with("/json") || ct.ends_with("+json") => {
                Ok(Decoded::Json(self.json()?))
            }
            Some(ct) if ct.starts_with("text/") => Ok(Decoded::Text(self.text()?.to_owned())),
            None if matches!(self.body, Body::Text(_)) => {
                Ok(Decoded::Text(self.text()?.to_owned()))
            }
            _ => Ok(Decoded::Binary(Bytes::copy_from_slice(self.body.as_bytes()))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_follows_content_type() {
        let json = Payload::text_with_type("[1,2]", "application/json; charset=utf-8");
        assert_eq!(
            json.decode().unwrap(),
            Decoded::Json(serde_json::json!([1, 2]))
        );

        let text = Payload::with_content_type(Bytes::from_static(b"hello"), "text/plain");
        assert_eq!(text.decode().unwrap(), Decoded::Text("hello".into()));

        let png = Payload::with_content_type(vec![0x89, 0x50], "image/png");
        assert_eq!(
            png.decode().unwrap(),
            Decoded::Binary(Bytes::from_static(&[0x89, 0x50]))
        );
    }

    #[test]
    fn decode_failures_are_explicit() {
        let broken = Payload::text_with_type("{not json", "application/json");
        assert!(matches!(broken.decode(), Err(DecodeError::Json(_))));

        let invalid = Payload::with_content_type(vec![0xff, 0xfe], "text/plain");
        assert!(matches!(invalid.text(), Err(DecodeError::NotUtf8(_))));
    }

    #[test]
    fn size_estimate_is_byte_length() {
        assert_eq!(Payload::new("héllo").size_estimate(), 6);
        assert_eq!(Payload::new(vec![1u8, 2, 3]).size_estimate(), 3);
    }
}
