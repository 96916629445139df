use derive_setters::Setters;
use serde::{Deserialize, Serialize};

use super::{Batch, Source};
use crate::core::Result;

/// Top level configuration file.
///
/// ```yaml
/// batch:
///   delay: 10
///   maxSize: 50
/// ```
#[derive(Serialize, Deserialize, PartialEq, Eq, Clone, Debug, Default, Setters)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    pub batch: Batch,
}

impl Config {
    pub fn from_json(json: &str) -> Result<Self> {
        Source::Json.decode(json)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Source::Yml.decode(yaml)
    }

    pub fn from_source(source: Source, data: &str) -> Result<Self> {
        source.decode(data)
    }

    /// Reads a config file, picking the format from its extension.
    pub async fn read(path: &str) -> Result<Self> {
        let source = Source::detect(path)?;
        let data = tokio::fs::read_to_string(path).await?;
        let config = source.decode(&data)?;
        tracing::debug!(path, batch = ?config.batch, "config loaded");
        Ok(config)
    }
}
