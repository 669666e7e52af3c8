use std::sync::Arc;

use crate::{KeyValueStore, StoreResult};

/// Creates store instances for cache namespaces.
///
/// A namespace either shares the provider's global store with other
/// namespaces (separated by key prefix) or owns a named instance exclusively.
/// Asking for the same name twice must return handles to the same data.
pub trait StoreProvider: Send + Sync {
    /// The store shared by every namespace without an instance name.
    fn shared(&self) -> Arc<dyn KeyValueStore>;

    /// An exclusive store instance identified by `name`.
    fn named(&self, name: &str, description: &str) -> StoreResult<Arc<dyn KeyValueStore>>;
}

impl<P> StoreProvider for Arc<P>
where
    P: StoreProvider + ?Sized,
{
    fn shared(&self) -> Arc<dyn KeyValueStore> {
        (**self).shared()
    }

    fn named(&self, name: &str, description: &str) -> StoreResult<Arc<dyn KeyValueStore>> {
        (**self).named(name, description)
    }
}
