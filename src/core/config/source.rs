use std::path::Path;

use thiserror::Error;

use super::Config;
use crate::core::Result;

/// Formats a config file may be written in.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Source {
    Json,
    #[default]
    Yml,
}

const JSON_EXT: &str = "json";
const YML_EXT: &str = "yml";
const YAML_EXT: &str = "yaml";

#[derive(Debug, Error, PartialEq)]
#[error("Unsupported config extension: {0}")]
pub struct UnsupportedConfigFormat(pub String);

impl std::str::FromStr for Source {
    type Err = UnsupportedConfigFormat;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            JSON_EXT => Ok(Source::Json),
            YML_EXT | YAML_EXT => Ok(Source::Yml),
            _ => Err(UnsupportedConfigFormat(s.to_string())),
        }
    }
}

impl Source {
    /// Get the file extension for the given format
    pub fn ext(&self) -> &'static str {
        match self {
            Source::Json => JSON_EXT,
            Source::Yml => YML_EXT,
        }
    }

    /// Detect the config format from the file name
    pub fn detect(name: &str) -> std::result::Result<Source, UnsupportedConfigFormat> {
        Path::new(name)
            .extension()
            .and_then(|ext| ext.to_str())
            .ok_or_else(|| UnsupportedConfigFormat(name.to_string()))?
            .parse()
            .map_err(|_| UnsupportedConfigFormat(name.to_string()))
    }

    /// Decode the config from the given data
    pub fn decode(&self, data: &str) -> Result<Config> {
        match self {
            Source::Json => Ok(serde_json::from_str(data)?),
            Source::Yml => Ok(serde_yaml::from_str(data)?),
        }
    }

    /// Encode the config to the given format
    pub fn encode(&self, config: &Config) -> Result<String> {
        match self {
            Source::Json => Ok(serde_json::to_string_pretty(config)?),
            Source::Yml => Ok(serde_yaml::to_string(config)?),
        }
    }
}
