//! Stored cache values.
//!
//! A [`StoredValue`] is what the request cache writes into a key-value store:
//! the response [`Payload`] plus the moment it was captured. The timestamp is
//! informational; nothing evicts by age.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::payload::Payload;

/// A payload stamped with its capture time.
///
/// ```
/// use stowaway_core::{Payload, StoredValue};
///
/// let value = StoredValue::new(Payload::new("tile"));
/// let touched = value.clone().touch();
/// assert_eq!(value.payload(), touched.payload());
/// assert!(touched.captured_at() >= value.captured_at());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredValue {
    payload: Payload,
    captured_at: DateTime<Utc>,
}

impl StoredValue {
    /// Stamps `payload` with the current time.
    pub fn new(payload: Payload) -> Self {
        Self::captured(payload, Utc::now())
    }

    /// Creates a value with an explicit capture time.
    pub fn captured(payload: Payload, captured_at: DateTime<Utc>) -> Self {
        Self {
            payload,
            captured_at,
        }
    }

    /// The stored payload.
    #[inline]
    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    /// When the payload was captured (or last refreshed).
    #[inline]
    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }

    /// Size used for memory accounting.
    #[inline]
    pub fn size_estimate(&self) -> usize {
        self.payload.size_estimate()
    }

    /// Returns the same payload with a fresh capture time.
    pub fn touch(self) -> Self {
        Self::new(self.payload)
    }

    /// Consumes the value and returns the payload.
    pub fn into_payload(self) -> Payload {
        self.payload
    }
}

impl From<Payload> for StoredValue {
    fn from(payload: Payload) -> Self {
        StoredValue::new(payload)
    }
}
