#![warn(missing_docs)]
//! # stowaway-core
//!
//! Core types shared by every stowaway crate.
//!
//! The request cache stores [`StoredValue`]s, each wrapping a [`Payload`]
//! captured from a response. The interception facade drives a
//! [`Transport`], the contract that a real network request handle
//! implements (see `stowaway-reqwest`) and that test doubles script.
//!
//! ## Modules
//!
//! - [`payload`] - response bodies with explicit, typed decoding
//! - [`value`] - payloads stamped with their capture time
//! - [`transport`] - the request handle contract and its event stream

pub mod payload;
pub mod transport;
pub mod value;

pub use payload::{Body, DecodeError, Decoded, Payload};
pub use transport::{
    AbortHandle, BoxError, EventStream, Progress, ReadyState, ResponseType, Transport,
    TransportError, TransportEvent, TransportResponse,
};
pub use value::StoredValue;
