//! Error types for configuration loading.

use thiserror::Error;

/// Result type alias using the config error type.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Fatal configuration problems. Any of these at startup exits non-zero.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The YAML file exists but could not be read.
    #[error("could not read config file {path}: {source}")]
    Io {
        /// Path of the offending file.
        path: String,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The YAML file could not be parsed.
    #[error("could not parse config file {path}: {source}")]
    Parse {
        /// Path of the offending file.
        path: String,
        /// Underlying YAML error.
        #[source]
        source: serde_yaml::Error,
    },

    /// An environment variable carried a value of the wrong shape.
    #[error("invalid value for {var}: {message}")]
    InvalidEnv {
        /// The environment variable name.
        var: String,
        /// Why the value was rejected.
        message: String,
    },

    /// A setting failed validation.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}
