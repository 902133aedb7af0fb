//! Configuration error types.

use std::path::PathBuf;
use thiserror::Error;

/// Errors produced while locating, parsing, or validating `forge.toml`.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file could not be found by upward search.
    #[error("config file '{0}' not found (searched upward from the current directory)")]
    NotFound(PathBuf),

    /// Config file exists but could not be read.
    #[error("failed to read {0}: {1}")]
    Io(PathBuf, #[source] std::io::Error),

    /// Config file is not valid TOML / does not match the schema.
    #[error("failed to parse {0}: {1}")]
    Parse(PathBuf, #[source] toml::de::Error),

    /// Config parsed but a field is semantically invalid.
    #[error("invalid config: {0}")]
    Invalid(String),
}
