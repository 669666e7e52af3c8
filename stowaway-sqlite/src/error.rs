use bincode::error::{DecodeError, EncodeError};
use stowaway_store::StoreError;
use thiserror::Error;

/// Errors that can occur when using [`SqliteStore`](crate::SqliteStore).
#[derive(Debug, Error)]
pub enum SqliteStoreError {
    /// An error from the underlying SQLite database.
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Failed to serialize a stored value.
    #[error("Serialization error: {0}")]
    Serialization(#[from] EncodeError),

    /// Failed to deserialize a stored value.
    #[error("Deserialization error: {0}")]
    Deserialization(#[from] DecodeError),

    /// An I/O error occurred while preparing the database file.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The blocking task running the query did not complete.
    #[error("Blocking task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    /// A previous query panicked while holding the connection.
    #[error("Connection lock poisoned")]
    Poisoned,

    /// The provided configuration is invalid.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl From<SqliteStoreError> for StoreError {
    fn from(err: SqliteStoreError) -> Self {
        match err {
            SqliteStoreError::Serialization(_) | SqliteStoreError::Deserialization(_) => {
                StoreError::FormatError(Box::new(err))
            }
            SqliteStoreError::Sqlite(_) | SqliteStoreError::Io(_) => {
                StoreError::ConnectionError(Box::new(err))
            }
            SqliteStoreError::Join(_)
            | SqliteStoreError::Poisoned
            | SqliteStoreError::InvalidConfig(_) => StoreError::InternalError(Box::new(err)),
        }
    }
}
