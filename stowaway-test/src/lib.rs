//! Test doubles shared by the stowaway integration tests.
//!
//! - [`MockStore`] - a counting key-value store with switchable faults
//! - [`MockTransport`] - a request handle replaying scripted event sequences
//! - [`EventCapture`](crate::tracing::EventCapture) - records emitted diagnostics

pub mod mock_store;
pub mod mock_transport;
pub mod tracing;

pub use mock_store::{Faults, MockStore, StoreCounters};
pub use mock_transport::{MockAbortHandle, MockTransport, TransportProbe, script};
