use std::env;
use std::str::FromStr;

use tracing::Subscriber;
use tracing_subscriber::filter::filter_fn;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::Layer;

const LONG_ENV_FILTER_VAR_NAME: &str = "BATCHED_LOADER_LOG_LEVEL";
const SHORT_ENV_FILTER_VAR_NAME: &str = "BL_LOG_LEVEL";

/// Compact stderr subscriber showing only this crate's events.
///
/// The level comes from `BATCHED_LOADER_LOG_LEVEL` (or `BL_LOG_LEVEL`) and
/// defaults to `INFO`.
pub fn default_tracing() -> impl Subscriber {
    let level = env::var(LONG_ENV_FILTER_VAR_NAME)
        .or(env::var(SHORT_ENV_FILTER_VAR_NAME))
        .ok()
        .and_then(|v| parse_level(&v))
        .unwrap_or(tracing::Level::INFO);

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .compact()
        .finish()
        .with(default_filter_target())
}

pub fn default_filter_target<S: Subscriber>() -> impl Layer<S> {
    filter_fn(|metadata| metadata.target().starts_with("batched_loader"))
}

fn parse_level(level: &str) -> Option<tracing::Level> {
    tracing::Level::from_str(level.trim()).ok()
}
