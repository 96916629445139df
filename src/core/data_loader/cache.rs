use std::collections::HashMap;
use std::hash::{BuildHasher, Hash};
use std::num::NonZeroUsize;

/// Storage behind a loader's key cache.
///
/// `get` takes `&mut self` so that bounded storages can record the access.
pub trait CacheStorage<K, V>: Send + 'static {
    /// Returns the value stored for `key`.
    fn get(&mut self, key: &K) -> Option<V>;

    /// Stores `value` for `key`, replacing any previous value.
    fn insert(&mut self, key: K, value: V);

    /// Evicts `key`.
    fn remove(&mut self, key: &K);

    /// Evicts everything.
    fn clear(&mut self);

    /// Returns a copy of every stored entry.
    fn entries(&self) -> Vec<(K, V)>;
}

/// Builds the storage of one [DataLoader](super::DataLoader).
///
/// The factory is consulted once per loader, so a storage never outlives the
/// unit of work its loader was built for.
pub trait CacheFactory<K, V>: Send + Sync + 'static {
    type Storage: CacheStorage<K, V>;

    fn create(&self) -> Self::Storage;
}

/// Keeps nothing. Keys that are still being fetched are shared all the same,
/// but every new window fetches again.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoCache;

impl<K, V> CacheFactory<K, V> for NoCache
where
    K: Send + 'static,
    V: Send + 'static,
{
    type Storage = NoCache;

    fn create(&self) -> Self::Storage {
        NoCache
    }
}

impl<K, V> CacheStorage<K, V> for NoCache
where
    K: Send + 'static,
    V: Send + 'static,
{
    #[inline]
    fn get(&mut self, _: &K) -> Option<V> {
        None
    }

    #[inline]
    fn insert(&mut self, _: K, _: V) {}

    #[inline]
    fn remove(&mut self, _: &K) {}

    #[inline]
    fn clear(&mut self) {}

    fn entries(&self) -> Vec<(K, V)> {
        Vec::new()
    }
}

/// Unbounded cache: every resolved value is kept until the loader is
/// dropped or the entry is evicted by hand.
#[derive(Clone, Copy, Debug, Default)]
pub struct HashMapCache;

impl<K, V> CacheFactory<K, V> for HashMapCache
where
    K: Send + Clone + Eq + Hash + 'static,
    V: Send + Clone + 'static,
{
    type Storage = HashMap<K, V>;

    fn create(&self) -> Self::Storage {
        HashMap::new()
    }
}

impl<K, V, S> CacheStorage<K, V> for HashMap<K, V, S>
where
    K: Send + Clone + Eq + Hash + 'static,
    V: Send + Clone + 'static,
    S: Send + BuildHasher + 'static,
{
    #[inline]
    fn get(&mut self, key: &K) -> Option<V> {
        HashMap::get(self, key).cloned()
    }

    #[inline]
    fn insert(&mut self, key: K, value: V) {
        HashMap::insert(self, key, value);
    }

    #[inline]
    fn remove(&mut self, key: &K) {
        HashMap::remove(self, key);
    }

    #[inline]
    fn clear(&mut self) {
        HashMap::clear(self);
    }

    fn entries(&self) -> Vec<(K, V)> {
        self.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
    }
}

/// Bounded cache that evicts the least recently used key.
#[derive(Clone, Copy, Debug)]
pub struct LruCache {
    cap: NonZeroUsize,
}

impl LruCache {
    /// Holds at most `cap` values. A capacity of zero is raised to one.
    pub fn new(cap: usize) -> Self {
        Self { cap: NonZeroUsize::new(cap).unwrap_or(NonZeroUsize::MIN) }
    }
}

impl<K, V> CacheFactory<K, V> for LruCache
where
    K: Send + Clone + Eq + Hash + 'static,
    V: Send + Clone + 'static,
{
    type Storage = lru::LruCache<K, V>;

    fn create(&self) -> Self::Storage {
        lru::LruCache::new(self.cap)
    }
}

impl<K, V> CacheStorage<K, V> for lru::LruCache<K, V>
where
    K: Send + Clone + Eq + Hash + 'static,
    V: Send + Clone + 'static,
{
    #[inline]
    fn get(&mut self, key: &K) -> Option<V> {
        lru::LruCache::get(self, key).cloned()
    }

    #[inline]
    fn insert(&mut self, key: K, value: V) {
        self.put(key, value);
    }

    #[inline]
    fn remove(&mut self, key: &K) {
        self.pop(key);
    }

    #[inline]
    fn clear(&mut self) {
        lru::LruCache::clear(self);
    }

    fn entries(&self) -> Vec<(K, V)> {
        self.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
    }
}
