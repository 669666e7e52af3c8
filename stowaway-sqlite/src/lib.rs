//! Durable SQLite store for the stowaway request cache.
//!
//! Every store instance is a table inside one database file: the shared
//! instance lives in `stowaway_shared`, a named instance `tiles` in
//! `stowaway_ns_tiles`. Clearing a named instance therefore never touches the
//! entries of another one.
#![warn(missing_docs)]

mod error;
mod store;

pub use error::SqliteStoreError;
pub use store::{SqliteProvider, SqliteProviderBuilder, SqliteStore};
