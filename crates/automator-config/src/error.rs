//! Configuration errors

use std::path::PathBuf;
use thiserror::Error;

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Why a configuration could not be loaded
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read
    #[error("cannot read {path}: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The document is not valid YAML, or does not have the automator layout
    #[error("malformed configuration in {origin}: {source}")]
    Malformed {
        origin: String,
        #[source]
        source: serde_yaml::Error,
    },

    /// A setting parsed but its value is out of range
    #[error("invalid value for '{key}': {reason}")]
    InvalidValue { key: String, reason: String },
}
