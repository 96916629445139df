use std::hash::Hash;
use std::marker::PhantomData;
use std::sync::Arc;

use super::config::Batch;
use super::data_loader::{DataLoader, Loader};

/// State shared by every unit of work: the batch-fetch implementation and the
/// batch settings.
///
/// Loaders are deliberately not part of it. Each unit of work asks for its own
/// with [AppContext::data_loader], so cached values never cross from one
/// caller to another.
pub struct AppContext<K, T> {
    pub loader: Arc<T>,
    pub batch: Batch,
    _key: PhantomData<fn(K)>,
}

impl<K, T> Clone for AppContext<K, T> {
    fn clone(&self) -> Self {
        Self { loader: self.loader.clone(), batch: self.batch.clone(), _key: PhantomData }
    }
}

impl<K, T> AppContext<K, T>
where
    K: Send + Sync + Hash + Eq + Clone + 'static,
    T: Loader<K>,
{
    pub fn new(loader: T, batch: Batch) -> Self {
        Self { loader: Arc::new(loader), batch, _key: PhantomData }
    }

    /// A fresh loader with an empty cache, to be dropped with the unit of work.
    pub fn data_loader(&self) -> DataLoader<K, Arc<T>> {
        self.batch.to_data_loader(self.loader.clone())
    }
}
