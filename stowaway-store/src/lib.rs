//! Key-value store contract for the stowaway request cache.
//!
//! If you want to persist cached responses somewhere new, you are in the right
//! place: implement [`KeyValueStore`] for the storage and [`StoreProvider`]
//! for the way instances of it are created.
mod memory;
mod provider;
mod store;

pub use memory::{MemoryProvider, MemoryStore};
pub use provider::StoreProvider;
pub use store::{KeyValueStore, StoreResult};

use stowaway_core::BoxError;
use thiserror::Error;

/// Describes general groups of errors in store interaction.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Internal store error, state or computation error.
    ///
    /// Any error not bounded with I/O or encoding.
    #[error(transparent)]
    InternalError(BoxError),
    /// The underlying storage could not be reached or written.
    #[error(transparent)]
    ConnectionError(BoxError),
    /// Serializing\Deserializing a stored value failed.
    #[error(transparent)]
    FormatError(BoxError),
    /// A named instance could not be created.
    #[error("invalid store instance `{name}`: {reason}")]
    InvalidInstance {
        /// Requested instance name.
        name: String,
        /// Why it was rejected.
        reason: String,
    },
}

/// Status of deleting result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteStatus {
    /// Record successfully deleted.
    Deleted,
    /// Record already missing.
    Missing,
}
