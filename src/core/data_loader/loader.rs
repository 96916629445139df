use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

/// Trait for batch loading.
///
/// Implementations receive every key collected during one scheduling window
/// and return the values they found, keyed by the key that produced them.
/// Keys without an entry in the returned map resolve as missing.
#[async_trait::async_trait]
pub trait Loader<K: Send + Sync + Hash + Eq + Clone + 'static>: Send + Sync + 'static {
    /// type of value.
    type Value: Send + Sync + Clone + 'static;

    /// Type of error.
    type Error: Send + Sync + Clone + 'static;

    /// Load the data set specified by the `keys`.
    async fn load(&self, keys: &[K]) -> Result<HashMap<K, Self::Value>, Self::Error>;
}

#[async_trait::async_trait]
impl<K, T> Loader<K> for Arc<T>
where
    K: Send + Sync + Hash + Eq + Clone + 'static,
    T: Loader<K>,
{
    type Value = T::Value;
    type Error = T::Error;

    async fn load(&self, keys: &[K]) -> Result<HashMap<K, Self::Value>, Self::Error> {
        self.as_ref().load(keys).await
    }
}
