use std::sync::Arc;

use async_trait::async_trait;
use stowaway_core::StoredValue;

use crate::{DeleteStatus, StoreError};

pub type StoreResult<T> = Result<T, StoreError>;

/// Asynchronous, durable, iterable string-keyed store.
///
/// Implementations must be safe to share between many in-flight requests.
/// No operation is atomic with respect to another: a `get` racing a `set` on
/// the same key may observe either value, and the last `set` wins.
#[async_trait]
pub trait KeyValueStore: Sync + Send {
    /// Reads the value stored under `key`.
    async fn get(&self, key: &str) -> StoreResult<Option<StoredValue>>;

    /// Writes `value` under `key`, replacing any previous value.
    async fn set(&self, key: &str, value: StoredValue) -> StoreResult<()>;

    /// Deletes `key`.
    async fn remove(&self, key: &str) -> StoreResult<DeleteStatus>;

    /// Visits every entry in store-native order.
    ///
    /// The visitor sees a consistent snapshot taken when iteration starts;
    /// the call returns once every entry was visited.
    async fn iterate(
        &self,
        visitor: &mut (dyn for<'k, 'v> FnMut(&'k str, &'v StoredValue) + Send),
    ) -> StoreResult<()>;

    /// Deletes every entry of this store instance.
    async fn clear(&self) -> StoreResult<()>;

    /// Returns the name of this store, used in logs and metrics.
    fn name(&self) -> &str {
        "store"
    }

    /// Collects every key of the store.
    async fn keys(&self) -> StoreResult<Vec<String>> {
        let mut keys = Vec::new();
        self.iterate(&mut |key: &str, _: &StoredValue| keys.push(key.to_owned()))
            .await?;
        Ok(keys)
    }
}

#[async_trait]
impl KeyValueStore for Box<dyn KeyValueStore> {
    async fn get(&self, key: &str) -> StoreResult<Option<StoredValue>> {
        (**self).get(key).await
    }

    async fn set(&self, key: &str, value: StoredValue) -> StoreResult<()> {
        (**self).set(key, value).await
    }

    async fn remove(&self, key: &str) -> StoreResult<DeleteStatus> {
        (**self).remove(key).await
    }

    async fn iterate(
        &self,
        visitor: &mut (dyn for<'k, 'v> FnMut(&'k str, &'v StoredValue) + Send),
    ) -> StoreResult<()> {
        (**self).iterate(visitor).await
    }

    async fn clear(&self) -> StoreResult<()> {
        (**self).clear().await
    }

    fn name(&self) -> &str {
        (**self).name()
    }

    async fn keys(&self) -> StoreResult<Vec<String>> {
        (**self).keys().await
    }
}

#[async_trait]
impl KeyValueStore for Arc<dyn KeyValueStore> {
    async fn get(&self, key: &str) -> StoreResult<Option<StoredValue>> {
        (**self).get(key).await
    }

    async fn set(&self, key: &str, value: StoredValue) -> StoreResult<()> {
        (**self).set(key, value).await
    }

    async fn remove(&self, key: &str) -> StoreResult<DeleteStatus> {
        (**self).remove(key).await
    }

    async fn iterate(
        &self,
        visitor: &mut (dyn for<'k, 'v> FnMut(&'k str, &'v StoredValue) + Send),
    ) -> StoreResult<()> {
        (**self).iterate(visitor).await
    }

    async fn clear(&self) -> StoreResult<()> {
        (**self).clear().await
    }

    fn name(&self) -> &str {
        (**self).name()
    }

    async fn keys(&self) -> StoreResult<Vec<String>> {
        (**self).keys().await
    }
}
