use std::{
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use bincode::{
    config::standard as bincode_config,
    serde::{decode_from_slice, encode_to_vec},
};
use rusqlite::{Connection, OptionalExtension, params};
use stowaway_core::StoredValue;
use stowaway_store::{DeleteStatus, KeyValueStore, StoreError, StoreProvider, StoreResult};
use tracing::{debug, warn};

use crate::SqliteStoreError;

const TABLE_PREFIX: &str = "stowaway_ns_";
const SHARED_TABLE: &str = "stowaway_shared";

/// Disk-based store backed by one SQLite table.
///
/// Obtain instances from a [`SqliteProvider`]. Cloning is cheap; clones share
/// the same connection. Queries run on tokio's blocking pool.
#[derive(Clone, Debug)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
    table: Arc<str>,
}

impl SqliteStore {
    /// Name of the table holding this instance.
    pub fn table(&self) -> &str {
        &self.table
    }

    async fn blocking<T, F>(&self, query: F) -> Result<T, SqliteStoreError>
    where
        F: FnOnce(&Connection, &str) -> Result<T, SqliteStoreError> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();
        let table = self.table.clone();
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().map_err(|_| SqliteStoreError::Poisoned)?;
            query(&conn, &table)
        })
        .await?
    }
}

fn encode(value: &StoredValue) -> Result<Vec<u8>, SqliteStoreError> {
    Ok(encode_to_vec(value, bincode_config())?)
}

fn decode(bytes: &[u8]) -> Result<StoredValue, SqliteStoreError> {
    let (value, _) = decode_from_slice(bytes, bincode_config())?;
    Ok(value)
}

fn create_table(conn: &Connection, table: &str) -> Result<(), SqliteStoreError> {
    conn.execute(
        &format!(
            "CREATE TABLE IF NOT EXISTS \"{table}\" (key TEXT PRIMARY KEY, value BLOB NOT NULL)"
        ),
        [],
    )?;
    Ok(())
}

fn table_for(name: &str) -> Result<String, SqliteStoreError> {
    if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(SqliteStoreError::InvalidConfig(format!(
            "instance name `{name}` must be non-empty ASCII alphanumerics or underscores"
        )));
    }
    Ok(format!("{TABLE_PREFIX}{name}"))
}

#[async_trait]
impl KeyValueStore for SqliteStore {
    async fn get(&self, key: &str) -> StoreResult<Option<StoredValue>> {
        let key = key.to_owned();
        let value = self
            .blocking(move |conn, table| {
                let raw: Option<Vec<u8>> = conn
                    .query_row(
                        &format!("SELECT value FROM \"{table}\" WHERE key = ?1"),
                        [&key],
                        |row| row.get(0),
                    )
                    .optional()?;
                raw.map(|bytes| decode(&bytes)).transpose()
            })
            .await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: StoredValue) -> StoreResult<()> {
        let key = key.to_owned();
        let bytes = encode(&value)?;
        self.blocking(move |conn, table| {
            conn.execute(
                &format!(
                    "INSERT INTO \"{table}\" (key, value) VALUES (?1, ?2) \
                     ON CONFLICT(key) DO UPDATE SET value = excluded.value"
                ),
                params![key, bytes],
            )?;
            Ok(())
        })
        .await?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> StoreResult<DeleteStatus> {
        let key = key.to_owned();
        let deleted = self
            .blocking(move |conn, table| {
                Ok(conn.execute(&format!("DELETE FROM \"{table}\" WHERE key = ?1"), [&key])?)
            })
            .await?;
        Ok(if deleted > 0 {
            DeleteStatus::Deleted
        } else {
            DeleteStatus::Missing
        })
    }

    async fn iterate(
        &self,
        visitor: &mut (dyn for<'k, 'v> FnMut(&'k str, &'v StoredValue) + Send),
    ) -> StoreResult<()> {
        let entries = self
            .blocking(|conn, table| {
                let mut stmt =
                    conn.prepare(&format!("SELECT key, value FROM \"{table}\" ORDER BY rowid"))?;
                let rows = stmt.query_map([], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, Vec<u8>>(1)?))
                })?;
                let mut entries = Vec::new();
                for row in rows {
                    let (key, bytes) = row?;
                    match decode(&bytes) {
                        Ok(value) => entries.push((key, value)),
                        Err(err) => {
                            warn!(%key, %table, error = %err, "skipping undecodable row")
                        }
                    }
                }
                Ok(entries)
            })
            .await?;

        for (key, value) in &entries {
            visitor(key, value);
        }
        Ok(())
    }

    async fn keys(&self) -> StoreResult<Vec<String>> {
        let keys = self
            .blocking(|conn, table| {
                let mut stmt =
                    conn.prepare(&format!("SELECT key FROM \"{table}\" ORDER BY rowid"))?;
                let keys = stmt
                    .query_map([], |row| row.get::<_, String>(0))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(keys)
            })
            .await?;
        Ok(keys)
    }

    async fn clear(&self) -> StoreResult<()> {
        self.blocking(|conn, table| {
            conn.execute(&format!("DELETE FROM \"{table}\""), [])?;
            Ok(())
        })
        .await?;
        Ok(())
    }

    fn name(&self) -> &str {
        &self.table
    }
}

/// Provider opening [`SqliteStore`] instances inside one database.
///
/// ```no_run
/// use stowaway_sqlite::SqliteProvider;
///
/// let provider = SqliteProvider::builder()
///     .path("/var/cache/myapp")
///     .build()?;
/// # Ok::<(), stowaway_sqlite::SqliteStoreError>(())
/// ```
#[derive(Clone, Debug)]
pub struct SqliteProvider {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteProvider {
    /// Starts building a new provider.
    pub fn builder() -> SqliteProviderBuilder {
        SqliteProviderBuilder::default()
    }

    /// In-memory database for tests.
    ///
    /// Data is lost when dropped. Equivalent to `builder().build()`.
    pub fn in_memory() -> Result<Self, SqliteStoreError> {
        Self::builder().build()
    }

    /// Opens (and creates if needed) the instance named `name`.
    pub fn instance(&self, name: &str) -> Result<SqliteStore, SqliteStoreError> {
        let table = table_for(name)?;
        self.open_table(table)
    }

    /// The shared instance.
    pub fn shared_store(&self) -> SqliteStore {
        SqliteStore {
            conn: self.conn.clone(),
            table: Arc::from(SHARED_TABLE),
        }
    }

    fn open_table(&self, table: String) -> Result<SqliteStore, SqliteStoreError> {
        {
            let conn = self.conn.lock().map_err(|_| SqliteStoreError::Poisoned)?;
            create_table(&conn, &table)?;
        }
        Ok(SqliteStore {
            conn: self.conn.clone(),
            table: Arc::from(table),
        })
    }
}

impl StoreProvider for SqliteProvider {
    fn shared(&self) -> Arc<dyn KeyValueStore> {
        Arc::new(self.shared_store())
    }

    fn named(&self, name: &str, description: &str) -> StoreResult<Arc<dyn KeyValueStore>> {
        let store = self.instance(name).map_err(|err| match err {
            SqliteStoreError::InvalidConfig(reason) => StoreError::InvalidInstance {
                name: name.to_owned(),
                reason,
            },
            other => StoreError::from(other),
        })?;
        debug!(
            instance = name,
            description,
            table = store.table(),
            "opened sqlite store instance"
        );
        Ok(Arc::new(store))
    }
}

/// Builder for [`SqliteProvider`].
#[derive(Debug, Default)]
pub struct SqliteProviderBuilder {
    path: Option<PathBuf>,
}

impl SqliteProviderBuilder {
    /// Enables persistent storage at the given path.
    ///
    /// Without this, data lives only in memory and is lost on restart.
    /// If path is a directory, creates `cache.db` inside it.
    pub fn path(mut self, path: impl AsRef<Path>) -> Self {
        self.path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Opens the database and creates the shared table.
    ///
    /// Fails if the database file can't be opened or created.
    pub fn build(self) -> Result<SqliteProvider, SqliteStoreError> {
        let conn = match self.path {
            Some(mut path) => {
                if path.is_dir() {
                    path.push("cache.db");
                } else if let Some(parent) = path.parent()
                    && !parent.as_os_str().is_empty()
                {
                    std::fs::create_dir_all(parent)?;
                }
                Connection::open(path)?
            }
            None => Connection::open_in_memory()?,
        };
        create_table(&conn, SHARED_TABLE)?;

        Ok(SqliteProvider {
            conn: Arc::new(Mutex::new(conn)),
        })
    }
}
