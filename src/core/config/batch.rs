use std::hash::Hash;
use std::time::Duration;

use derive_setters::Setters;
use serde::{Deserialize, Serialize};

use crate::core::data_loader::{DataLoader, Loader};

const DEFAULT_MAX_SIZE: usize = 100;

/// Batching settings applied to every loader built from a config.
#[derive(Serialize, Deserialize, PartialEq, Eq, Clone, Debug, Setters)]
#[serde(rename_all = "camelCase", default)]
pub struct Batch {
    /// Milliseconds a window stays open before its keys are dispatched. `0`
    /// dispatches on the next tick of the runtime.
    pub delay: usize,

    /// Keys a window may collect before it is dispatched early. `None` lets a
    /// window grow without bound.
    #[setters(strip_option)]
    pub max_size: Option<usize>,
}

impl Default for Batch {
    fn default() -> Self {
        Self { delay: 0, max_size: Some(DEFAULT_MAX_SIZE) }
    }
}

impl Batch {
    pub fn delay_duration(&self) -> Duration {
        Duration::from_millis(self.delay as u64)
    }

    /// Wraps `loader` in a fresh [DataLoader] tuned by these settings.
    pub fn to_data_loader<K, T>(&self, loader: T) -> DataLoader<K, T>
    where
        K: Send + Sync + Hash + Eq + Clone + 'static,
        T: Loader<K>,
    {
        DataLoader::new(loader)
            .delay(self.delay_duration())
            .max_batch_size(self.max_size.unwrap_or(usize::MAX))
    }
}
