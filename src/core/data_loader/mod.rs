mod cache;
mod data_loader;
mod error;
mod loader;
mod requests;
mod results;
mod scheduler;

pub use cache::{CacheFactory, CacheStorage, HashMapCache, LruCache, NoCache};
pub use data_loader::DataLoader;
pub use error::LoadError;
pub use loader::Loader;
pub use results::{keyed, ordered, LengthMismatch};
pub use scheduler::{scheduler_fn, Delay, Scheduler, SchedulerFn, Tick};
