//! TOML and JSON configuration documents

use std::path::Path;

use super::sql::RawConfig;
use crate::{Error, Result};

/// Load configuration from a TOML file
pub fn load_from_file(path: &Path) -> Result<RawConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!(
            "Failed to read config file {}: {}",
            path.display(),
            e
        ))
    })?;

    toml::from_str(&content).map_err(|e| {
        Error::Config(format!(
            "Failed to parse config file {}: {}",
            path.display(),
            e
        ))
    })
}

/// Parse a JSON configuration document
pub fn from_json_str(json: &str) -> Result<RawConfig> {
    serde_json::from_str(json).map_err(|e| Error::Config(format!("Invalid JSON config: {e}")))
}
