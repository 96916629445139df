use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::hash::Hash;
use std::mem;

use futures_channel::oneshot;

use super::cache::CacheStorage;
use super::error::LoadError;

pub(super) type Outcome<V, E> = Result<V, LoadError<E>>;

type Waiter<V, E> = oneshot::Sender<Outcome<V, E>>;

/// Effect of registering a key on the current window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Registration {
    /// The key is already waiting, either in the open window or in a batch
    /// that is in flight.
    Joined,
    /// The key was added to an open window.
    Queued,
    /// The key opened the window with this generation.
    Opened(u64),
}

/// Window and cache state of one loader.
///
/// `waiters` holds every key that has not been resolved yet, including the
/// keys of batches already dispatched; `window` holds only the keys that have
/// not been dispatched. `generation` counts dispatched windows, so a deferred
/// dispatch can tell whether its window is still open.
pub(super) struct Requests<K, V, E, S> {
    window: Vec<K>,
    generation: u64,
    waiters: HashMap<K, Vec<Waiter<V, E>>>,
    cache: S,
    cache_enabled: bool,
}

impl<K, V, E, S> Requests<K, V, E, S>
where
    K: Hash + Eq + Clone,
    V: Clone,
    E: Clone,
    S: CacheStorage<K, V>,
{
    pub fn new(cache: S) -> Self {
        Self {
            window: Vec::new(),
            generation: 0,
            waiters: HashMap::new(),
            cache,
            cache_enabled: true,
        }
    }

    pub fn cached(&mut self, key: &K) -> Option<V> {
        if self.cache_enabled {
            self.cache.get(key)
        } else {
            None
        }
    }

    pub fn register(&mut self, key: K) -> (oneshot::Receiver<Outcome<V, E>>, Registration) {
        let (tx, rx) = oneshot::channel();
        let registration = match self.waiters.entry(key) {
            Entry::Occupied(mut entry) => {
                entry.get_mut().push(tx);
                Registration::Joined
            }
            Entry::Vacant(entry) => {
                self.window.push(entry.key().clone());
                entry.insert(vec![tx]);
                if self.window.len() == 1 {
                    Registration::Opened(self.generation)
                } else {
                    Registration::Queued
                }
            }
        };
        (rx, registration)
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn window_len(&self) -> usize {
        self.window.len()
    }

    /// Closes the open window and returns its keys in first-request order.
    pub fn take_window(&mut self) -> Vec<K> {
        self.generation += 1;
        mem::take(&mut self.window)
    }

    /// Closes the window only if it is still the one opened at `generation`.
    pub fn take_window_if(&mut self, generation: u64) -> Option<Vec<K>> {
        if self.generation == generation && !self.window.is_empty() {
            Some(self.take_window())
        } else {
            None
        }
    }

    /// Hands the outcome of a batch to everyone waiting on its keys and
    /// returns how many keys the batch left without a value.
    pub fn resolve(&mut self, keys: &[K], outcome: Result<HashMap<K, V>, LoadError<E>>) -> usize {
        let mut missing = 0;
        match outcome {
            Ok(mut values) => {
                for key in keys {
                    let waiters = self.waiters.remove(key).unwrap_or_default();
                    match values.remove(key) {
                        Some(value) => {
                            if self.cache_enabled {
                                self.cache.insert(key.clone(), value.clone());
                            }
                            notify(waiters, Ok(value));
                        }
                        None => {
                            missing += 1;
                            notify(waiters, Err(LoadError::Missing));
                        }
                    }
                }
            }
            Err(error) => {
                for key in keys {
                    let waiters = self.waiters.remove(key).unwrap_or_default();
                    notify(waiters, Err(error.clone()));
                }
            }
        }
        missing
    }

    pub fn cache_enabled(&self) -> bool {
        self.cache_enabled
    }

    pub fn set_cache_enabled(&mut self, enabled: bool) {
        self.cache_enabled = enabled;
    }

    pub fn cache(&self) -> &S {
        &self.cache
    }

    pub fn cache_mut(&mut self) -> &mut S {
        &mut self.cache
    }
}

fn notify<V: Clone, E: Clone>(waiters: Vec<Waiter<V, E>>, outcome: Outcome<V, E>) {
    for tx in waiters {
        // the caller may have stopped waiting
        let _ = tx.send(outcome.clone());
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    type TestRequests = Requests<u64, String, String, HashMap<u64, String>>;

    fn requests() -> TestRequests {
        Requests::new(HashMap::new())
    }

    #[test]
    fn test_register_opens_then_queues() {
        let mut requests = requests();
        let (_a, first) = requests.register(1);
        let (_b, second) = requests.register(2);
        let (_c, third) = requests.register(1);

        assert_eq!(first, Registration::Opened(0));
        assert_eq!(second, Registration::Queued);
        assert_eq!(third, Registration::Joined);
        assert_eq!(requests.window_len(), 2);
    }

    #[test]
    fn test_take_window_starts_new_generation() {
        let mut requests = requests();
        let (_a, _) = requests.register(1);
        let (_b, _) = requests.register(2);

        assert_eq!(requests.take_window(), vec![1, 2]);
        assert_eq!(requests.generation(), 1);

        let (_c, registration) = requests.register(3);
        assert_eq!(registration, Registration::Opened(1));
        // stale generation
        assert_eq!(requests.take_window_if(0), None);
        assert_eq!(requests.take_window_if(1), Some(vec![3]));
    }

    #[test]
    fn test_in_flight_key_is_joined() {
        let mut requests = requests();
        let (_a, _) = requests.register(1);
        requests.take_window();

        let (_b, registration) = requests.register(1);
        assert_eq!(registration, Registration::Joined);
        assert_eq!(requests.window_len(), 0);
    }

    #[tokio::test]
    async fn test_resolve_values_and_missing() {
        let mut requests = requests();
        let (one, _) = requests.register(1);
        let (one_again, _) = requests.register(1);
        let (two, _) = requests.register(2);
        let keys = requests.take_window();

        let missing = requests.resolve(&keys, Ok(HashMap::from([(1, "one".to_string())])));

        assert_eq!(missing, 1);
        assert_eq!(one.await.unwrap(), Ok("one".to_string()));
        assert_eq!(one_again.await.unwrap(), Ok("one".to_string()));
        assert_eq!(two.await.unwrap(), Err(LoadError::Missing));
        assert_eq!(requests.cached(&1), Some("one".to_string()));
    }

    #[tokio::test]
    async fn test_resolve_failure_reaches_every_key() {
        let mut requests = requests();
        let (one, _) = requests.register(1);
        let (two, _) = requests.register(2);
        let keys = requests.take_window();

        requests.resolve(&keys, Err(LoadError::Batch("boom".to_string())));

        assert_eq!(one.await.unwrap(), Err(LoadError::Batch("boom".to_string())));
        assert_eq!(two.await.unwrap(), Err(LoadError::Batch("boom".to_string())));
        assert_eq!(requests.cached(&1), None);
    }

    #[test]
    fn test_disabled_cache_is_bypassed() {
        let mut requests = requests();
        requests.cache_mut().insert(1, "one".to_string());
        requests.set_cache_enabled(false);
        assert_eq!(requests.cached(&1), None);
    }
}
