//! Configuration management
//!
//! Supports configuration loading with precedence: env > file > in-memory value

mod env;
mod file;
mod sql;

use std::path::Path;

pub use env::apply_env;
pub use file::{from_json_str, load_from_file};
pub use sql::{
    Authentication, AuthenticationOptions, AuthenticationType, ConfigBuilder, ConnectionOptions,
    RawAuthentication, RawAuthenticationOptions, RawConfig, SqlConfig,
};

use crate::Result;

/// Load a TOML file, apply environment overrides and validate.
pub fn load_config(path: &Path) -> Result<SqlConfig> {
    let raw = load_from_file(path)?;
    tracing::debug!("Loaded configuration from {}", path.display());
    apply_env(raw).validate()
}
