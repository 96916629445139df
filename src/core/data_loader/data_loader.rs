use std::collections::HashMap;
use std::hash::Hash;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures_channel::oneshot;
use futures_util::future::join_all;
use futures_util::FutureExt;
use tracing::Instrument;

use super::cache::{CacheFactory, CacheStorage, HashMapCache};
use super::error::LoadError;
use super::loader::Loader;
use super::requests::{Outcome, Registration, Requests};
use super::scheduler::{Delay, Scheduler, Tick};

const DEFAULT_MAX_BATCH_SIZE: usize = 1000;

type RequestsOf<K, T, C> = Requests<
    K,
    <T as Loader<K>>::Value,
    <T as Loader<K>>::Error,
    <C as CacheFactory<K, <T as Loader<K>>::Value>>::Storage,
>;

/// Data loader.
///
/// Collapses every key requested within one scheduling window into a single
/// call to [Loader::load] and keeps the values it receives for the rest of its
/// life. Build one per unit of work, typically one per inbound request, so
/// that values fetched on behalf of one caller are never served to another.
///
/// The caller whose key opens a window awaits the [Scheduler] in its own task,
/// so every key registered by that task before it yields joins the batch. The
/// batch itself runs on a spawned task, so a loader must be used from within a
/// tokio runtime.
///
/// Reference: <https://github.com/graphql/dataloader>
pub struct DataLoader<K, T, C = HashMapCache>
where
    K: Send + Sync + Hash + Eq + Clone + 'static,
    T: Loader<K>,
    C: CacheFactory<K, T::Value>,
{
    inner: Arc<DataLoaderInner<K, T, C>>,
    scheduler: Arc<dyn Scheduler>,
    max_batch_size: usize,
}

struct DataLoaderInner<K, T, C>
where
    K: Send + Sync + Hash + Eq + Clone + 'static,
    T: Loader<K>,
    C: CacheFactory<K, T::Value>,
{
    requests: Mutex<RequestsOf<K, T, C>>,
    loader: T,
}

/// A key that is either answered from the cache or waiting for its batch.
enum Pending<V, E> {
    Ready(V),
    Waiting(oneshot::Receiver<Outcome<V, E>>),
}

impl<V, E> Pending<V, E> {
    async fn resolve(self) -> Outcome<V, E> {
        match self {
            Pending::Ready(value) => Ok(value),
            // the sender is only dropped if the batch task itself was torn down
            Pending::Waiting(rx) => rx.await.unwrap_or(Err(LoadError::Aborted)),
        }
    }
}

/// Dispatches owed once the requests lock is released.
struct Dispatches<K> {
    full: Vec<Vec<K>>,
    opened: Option<u64>,
}

impl<K> Default for Dispatches<K> {
    fn default() -> Self {
        Self { full: Vec::new(), opened: None }
    }
}

impl<K, T> DataLoader<K, T, HashMapCache>
where
    K: Send + Sync + Hash + Eq + Clone + 'static,
    T: Loader<K>,
{
    /// Use `Loader` to create a [DataLoader] that caches every resolved value
    /// for its whole lifetime.
    pub fn new(loader: T) -> Self {
        Self::with_cache(loader, HashMapCache)
    }
}

impl<K, T, C> DataLoader<K, T, C>
where
    K: Send + Sync + Hash + Eq + Clone + 'static,
    T: Loader<K>,
    C: CacheFactory<K, T::Value>,
{
    /// Use `Loader` to create a [DataLoader] with a cache factory.
    pub fn with_cache(loader: T, cache_factory: C) -> Self {
        Self {
            inner: Arc::new(DataLoaderInner {
                requests: Mutex::new(Requests::new(cache_factory.create())),
                loader,
            }),
            scheduler: Arc::new(Tick),
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
        }
    }

    /// Specify how a window decides to close, the default is [Tick].
    #[must_use]
    pub fn scheduler(self, scheduler: impl Scheduler) -> Self {
        Self { scheduler: Arc::new(scheduler), ..self }
    }

    /// Close every window after `delay`. A zero delay is the same as [Tick].
    #[must_use]
    pub fn delay(self, delay: Duration) -> Self {
        if delay.is_zero() {
            self.scheduler(Tick)
        } else {
            self.scheduler(Delay(delay))
        }
    }

    /// Specify the max batch size for loading data, the default is `1000`.
    ///
    /// A window that reaches the threshold is dispatched immediately, without
    /// waiting for the scheduler.
    #[must_use]
    pub fn max_batch_size(self, max_batch_size: usize) -> Self {
        Self { max_batch_size: max_batch_size.max(1), ..self }
    }

    /// Get the loader.
    #[inline]
    pub fn loader(&self) -> &T {
        &self.inner.loader
    }

    /// Enable/Disable the cache. While disabled, cached values are neither
    /// read nor written, [DataLoader::feed_many] included; keys that are still
    /// in flight are shared regardless.
    pub fn enable_cache(&self, enable: bool) {
        self.inner.requests().set_cache_enabled(enable);
    }

    /// Use this `DataLoader` to load one value.
    ///
    /// Fails with [LoadError::Missing] if the batch did not return a value for
    /// `key`.
    pub async fn load(&self, key: K) -> Result<T::Value, LoadError<T::Error>> {
        let (pending, dispatches) = {
            let mut requests = self.inner.requests();
            let mut dispatches = Dispatches::default();
            let pending = self.enqueue(&mut requests, key, &mut dispatches);
            (pending, settle(dispatches, requests.generation()))
        };
        self.flush(dispatches).await;
        pending.resolve().await
    }

    /// Same as [DataLoader::load], with a missing value reported as `None`.
    pub async fn load_one(&self, key: K) -> Result<Option<T::Value>, LoadError<T::Error>> {
        match self.load(key).await {
            Ok(value) => Ok(Some(value)),
            Err(LoadError::Missing) => Ok(None),
            Err(error) => Err(error),
        }
    }

    /// Use this `DataLoader` to load some data.
    ///
    /// Every key joins the same window. Keys the batch returned no value for
    /// are left out of the result.
    pub async fn load_many<I>(&self, keys: I) -> Result<HashMap<K, T::Value>, LoadError<T::Error>>
    where
        I: IntoIterator<Item = K>,
    {
        let (pending, dispatches) = {
            let mut requests = self.inner.requests();
            let mut dispatches = Dispatches::default();
            let pending = keys
                .into_iter()
                .map(|key| (key.clone(), self.enqueue(&mut requests, key, &mut dispatches)))
                .collect::<Vec<_>>();
            (pending, settle(dispatches, requests.generation()))
        };
        self.flush(dispatches).await;

        let outcomes = join_all(pending.into_iter().map(|(key, pending)| async move {
            (key, pending.resolve().await)
        }))
        .await;

        let mut values = HashMap::with_capacity(outcomes.len());
        for (key, outcome) in outcomes {
            match outcome {
                Ok(value) => {
                    values.insert(key, value);
                }
                Err(LoadError::Missing) => {}
                Err(error) => return Err(error),
            }
        }
        Ok(values)
    }

    /// Feed some data into the cache.
    ///
    /// **NOTE: If the cache type is [NoCache](super::NoCache) or the cache is
    /// disabled, this function will not take effect.**
    pub fn feed_many<I>(&self, values: I)
    where
        I: IntoIterator<Item = (K, T::Value)>,
    {
        let mut requests = self.inner.requests();
        if !requests.cache_enabled() {
            return;
        }
        for (key, value) in values {
            requests.cache_mut().insert(key, value);
        }
    }

    /// Feed one value into the cache.
    pub fn feed_one(&self, key: K, value: T::Value) {
        self.feed_many(std::iter::once((key, value)));
    }

    /// Evicts `key`, so that the next load fetches it again.
    pub fn remove(&self, key: &K) {
        self.inner.requests().cache_mut().remove(key);
    }

    /// Clears the cache.
    pub fn clear(&self) {
        self.inner.requests().cache_mut().clear();
    }

    /// Gets all values in the cache.
    pub fn get_cached_values(&self) -> HashMap<K, T::Value> {
        self.inner.requests().cache().entries().into_iter().collect()
    }

    fn enqueue(
        &self,
        requests: &mut RequestsOf<K, T, C>,
        key: K,
        dispatches: &mut Dispatches<K>,
    ) -> Pending<T::Value, T::Error> {
        if let Some(value) = requests.cached(&key) {
            return Pending::Ready(value);
        }

        let (rx, registration) = requests.register(key);
        if let Registration::Opened(generation) = registration {
            dispatches.opened = Some(generation);
        }
        if requests.window_len() >= self.max_batch_size {
            dispatches.full.push(requests.take_window());
        }
        Pending::Waiting(rx)
    }

    /// Sends full windows right away, then closes the window this call
    /// opened once the scheduler lets it.
    async fn flush(&self, dispatches: Dispatches<K>) {
        for keys in dispatches.full {
            let inner = self.inner.clone();
            let task = inner.dispatch(keys);
            tokio::spawn(task.instrument(tracing::info_span!("immediate_load")));
        }

        if let Some(generation) = dispatches.opened {
            let window = Window { inner: Some(self.inner.clone()), generation };
            self.scheduler.defer().await;
            window.close();
        }
    }
}

/// A window opened by the current caller and not dispatched yet.
///
/// If the caller is dropped while the scheduler is pending, the window is
/// closed on drop so that the other keys in it still get dispatched.
struct Window<K, T, C>
where
    K: Send + Sync + Hash + Eq + Clone + 'static,
    T: Loader<K>,
    C: CacheFactory<K, T::Value>,
{
    inner: Option<Arc<DataLoaderInner<K, T, C>>>,
    generation: u64,
}

impl<K, T, C> Window<K, T, C>
where
    K: Send + Sync + Hash + Eq + Clone + 'static,
    T: Loader<K>,
    C: CacheFactory<K, T::Value>,
{
    fn close(mut self) {
        self.take_and_dispatch();
    }

    fn take_and_dispatch(&mut self) {
        let Some(inner) = self.inner.take() else {
            return;
        };
        let generation = self.generation;
        let keys = inner.requests().take_window_if(generation);
        let Some(keys) = keys else {
            return;
        };

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let task = inner.dispatch(keys);
                handle.spawn(task.instrument(tracing::info_span!("start_fetch", generation)));
            }
            Err(_) => {
                tracing::warn!(keys = keys.len(), "no runtime to dispatch batch");
                inner.requests().resolve(&keys, Err(LoadError::Aborted));
            }
        }
    }
}

impl<K, T, C> Drop for Window<K, T, C>
where
    K: Send + Sync + Hash + Eq + Clone + 'static,
    T: Loader<K>,
    C: CacheFactory<K, T::Value>,
{
    fn drop(&mut self) {
        self.take_and_dispatch();
    }
}

/// Drops the deferred dispatch if its window was already taken because it
/// filled up.
fn settle<K>(mut dispatches: Dispatches<K>, generation: u64) -> Dispatches<K> {
    dispatches.opened = dispatches.opened.filter(|opened| *opened == generation);
    dispatches
}

impl<K, T, C> DataLoaderInner<K, T, C>
where
    K: Send + Sync + Hash + Eq + Clone + 'static,
    T: Loader<K>,
    C: CacheFactory<K, T::Value>,
{
    fn requests(&self) -> MutexGuard<'_, RequestsOf<K, T, C>> {
        self.requests.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn dispatch(self: Arc<Self>, keys: Vec<K>) {
        tracing::debug!(keys = keys.len(), "dispatching batch");

        let outcome = match AssertUnwindSafe(self.loader.load(&keys)).catch_unwind().await {
            Ok(Ok(values)) => Ok(values),
            Ok(Err(error)) => {
                tracing::warn!(keys = keys.len(), "batch load failed");
                Err(LoadError::Batch(error))
            }
            Err(_) => {
                tracing::error!(keys = keys.len(), "batch loader panicked");
                Err(LoadError::Aborted)
            }
        };

        let missing = self.requests().resolve(&keys, outcome);
        if missing > 0 {
            tracing::debug!(missing, "batch returned no value for some keys");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use futures_util::future::join;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::core::data_loader::{scheduler_fn, LruCache, NoCache};

    /// Squares every key it is asked for, except the ones in `missing`, and
    /// records each batch it receives.
    #[derive(Default)]
    struct Squares {
        batches: Mutex<Vec<Vec<u64>>>,
        missing: Vec<u64>,
        fail: bool,
    }

    impl Squares {
        fn batches(&self) -> Vec<Vec<u64>> {
            self.batches.lock().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl Loader<u64> for Squares {
        type Value = u64;
        type Error = String;

        async fn load(&self, keys: &[u64]) -> Result<HashMap<u64, u64>, String> {
            self.batches.lock().unwrap().push(keys.to_vec());
            if self.fail {
                return Err("connection refused".to_string());
            }
            Ok(keys
                .iter()
                .filter(|key| !self.missing.contains(key))
                .map(|key| (*key, key * key))
                .collect())
        }
    }

    struct Panics;

    #[async_trait::async_trait]
    impl Loader<u64> for Panics {
        type Value = u64;
        type Error = String;

        async fn load(&self, _: &[u64]) -> Result<HashMap<u64, u64>, String> {
            panic!("loader bug")
        }
    }

    #[tokio::test]
    async fn test_load_one_batch() {
        let loader: DataLoader<u64, _> = DataLoader::new(Squares::default());
        let (a, b) = join(loader.load(2), loader.load(3)).await;

        assert_eq!(a, Ok(4));
        assert_eq!(b, Ok(9));
        assert_eq!(loader.loader().batches(), vec![vec![2, 3]]);
    }

    #[tokio::test]
    async fn test_cached_value_is_not_fetched_again() {
        let loader: DataLoader<u64, _> = DataLoader::new(Squares::default());
        assert_eq!(loader.load(2).await, Ok(4));
        assert_eq!(loader.load(2).await, Ok(4));

        assert_eq!(loader.loader().batches(), vec![vec![2]]);
        assert_eq!(loader.get_cached_values(), HashMap::from([(2, 4)]));
    }

    #[tokio::test]
    async fn test_no_cache_fetches_every_window() {
        let loader: DataLoader<u64, _, _> = DataLoader::with_cache(Squares::default(), NoCache);
        assert_eq!(loader.load(2).await, Ok(4));
        assert_eq!(loader.load(2).await, Ok(4));

        assert_eq!(loader.loader().batches(), vec![vec![2], vec![2]]);
        assert!(loader.get_cached_values().is_empty());
    }

    #[tokio::test]
    async fn test_lru_cache() {
        let loader: DataLoader<u64, _, _> =
            DataLoader::with_cache(Squares::default(), LruCache::new(1));
        loader.load_many([1, 2]).await.unwrap();
        loader.load(2).await.unwrap();
        loader.load(1).await.unwrap();

        assert_eq!(loader.loader().batches(), vec![vec![1, 2], vec![1]]);
    }

    #[tokio::test]
    async fn test_missing_value() {
        let loader: DataLoader<u64, _> =
            DataLoader::new(Squares { missing: vec![3], ..Default::default() });
        let (a, b) = join(loader.load(2), loader.load(3)).await;

        assert_eq!(a, Ok(4));
        assert_eq!(b, Err(LoadError::Missing));
        assert_eq!(loader.load_one(3).await, Ok(None));
    }

    #[tokio::test]
    async fn test_failure_is_not_cached() {
        let loader: DataLoader<u64, _> =
            DataLoader::new(Squares { fail: true, ..Default::default() });
        let expected = Err(LoadError::Batch("connection refused".to_string()));

        assert_eq!(loader.load(2).await, expected);
        assert_eq!(loader.load(2).await, expected);
        assert_eq!(loader.loader().batches(), vec![vec![2], vec![2]]);
    }

    #[tokio::test]
    async fn test_panicking_loader_aborts_waiters() {
        let loader: DataLoader<u64, _> = DataLoader::new(Panics);
        let (a, b) = join(loader.load(1), loader.load(2)).await;

        assert_eq!(a, Err(LoadError::Aborted));
        assert_eq!(b, Err(LoadError::Aborted));
    }

    #[tokio::test]
    async fn test_max_batch_size_splits_window() {
        let loader: DataLoader<u64, _> = DataLoader::new(Squares::default()).max_batch_size(2);
        let values = loader.load_many([1, 2, 3, 4, 5]).await.unwrap();

        assert_eq!(values.len(), 5);
        assert_eq!(loader.loader().batches(), vec![vec![1, 2], vec![3, 4], vec![5]]);
    }

    #[tokio::test]
    async fn test_load_many_deduplicates_keys() {
        let loader: DataLoader<u64, _> =
            DataLoader::new(Squares { missing: vec![7], ..Default::default() });
        let values = loader.load_many([3, 3, 7, 1]).await.unwrap();

        assert_eq!(values, HashMap::from([(3, 9), (1, 1)]));
        assert_eq!(loader.loader().batches(), vec![vec![3, 7, 1]]);
    }

    #[tokio::test]
    async fn test_feed_and_evict() {
        let loader: DataLoader<u64, _> = DataLoader::new(Squares::default());
        loader.feed_many([(1, 100), (2, 200)]);
        loader.feed_one(3, 300);

        assert_eq!(loader.load(1).await, Ok(100));
        assert!(loader.loader().batches().is_empty());

        loader.remove(&1);
        assert_eq!(loader.load(1).await, Ok(1));

        loader.clear();
        assert_eq!(loader.load(2).await, Ok(4));
        assert_eq!(loader.loader().batches(), vec![vec![1], vec![2]]);
    }

    #[tokio::test]
    async fn test_disabled_cache() {
        let loader: DataLoader<u64, _> = DataLoader::new(Squares::default());
        loader.enable_cache(false);
        loader.load(2).await.unwrap();
        loader.load(2).await.unwrap();

        assert_eq!(loader.loader().batches().len(), 2);
        assert!(loader.get_cached_values().is_empty());
    }

    #[tokio::test]
    async fn test_feed_is_ignored_while_cache_disabled() {
        let loader: DataLoader<u64, _> = DataLoader::new(Squares::default());
        loader.enable_cache(false);
        loader.feed_one(3, 300);
        loader.enable_cache(true);

        assert!(loader.get_cached_values().is_empty());
        assert_eq!(loader.load(3).await, Ok(9));
        assert_eq!(loader.loader().batches(), vec![vec![3]]);
    }

    #[tokio::test]
    async fn test_dropped_opener_still_dispatches_window() {
        let loader: DataLoader<u64, _> =
            DataLoader::new(Squares::default()).delay(Duration::from_millis(10));
        let opener = loader.load(1);
        let joined = async {
            tokio::task::yield_now().await;
            loader.load(1).await
        };

        let mut opener = Box::pin(opener);
        // register key 1 and park the opener on the scheduler, then drop it
        assert!(futures_util::poll!(opener.as_mut()).is_pending());
        drop(opener);

        assert_eq!(joined.await, Ok(1));
        assert_eq!(loader.loader().batches(), vec![vec![1]]);
    }

    #[tokio::test]
    async fn test_custom_scheduler_runs_once_per_window() {
        let windows = Arc::new(AtomicUsize::new(0));
        let scheduler = scheduler_fn({
            let windows = windows.clone();
            move || {
                windows.fetch_add(1, Ordering::SeqCst);
                tokio::task::yield_now()
            }
        });
        let loader: DataLoader<u64, _> = DataLoader::new(Squares::default()).scheduler(scheduler);

        loader.load_many([1, 2, 3]).await.unwrap();
        loader.load(4).await.unwrap();

        assert_eq!(windows.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay_collects_across_yields() {
        let loader: DataLoader<u64, _> =
            DataLoader::new(Squares::default()).delay(Duration::from_millis(50));
        let first = loader.load(1);
        let second = async {
            tokio::task::yield_now().await;
            tokio::task::yield_now().await;
            loader.load(2).await
        };
        let (a, b) = join(first, second).await;

        assert_eq!(a, Ok(1));
        assert_eq!(b, Ok(4));
        assert_eq!(loader.loader().batches(), vec![vec![1, 2]]);
    }
}
