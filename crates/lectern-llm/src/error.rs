//! Error types for the LLM crate.

use thiserror::Error;

/// Result type alias using the LLM error type.
pub type Result<T> = std::result::Result<T, LlmError>;

/// Errors from talking to the LLM runtime.
#[derive(Debug, Error)]
pub enum LlmError {
    /// The runtime could not be reached (connection refused, DNS, TLS).
    #[error("LLM runtime unavailable: {0}")]
    Unavailable(String),

    /// The request exceeded the configured deadline.
    #[error("LLM request timed out after {seconds}s")]
    Timeout {
        /// The deadline that was exceeded.
        seconds: u64,
    },

    /// The runtime answered, but not with what the protocol promises.
    #[error("LLM protocol error: {0}")]
    Protocol(String),

    /// Invalid client configuration.
    #[error("LLM configuration error: {0}")]
    Config(String),
}

impl LlmError {
    /// Map a transport error onto the taxonomy, attributing timeouts to the
    /// given deadline.
    pub fn from_transport(err: reqwest::Error, timeout_seconds: u64) -> Self {
        if err.is_timeout() {
            LlmError::Timeout {
                seconds: timeout_seconds,
            }
        } else if err.is_connect() {
            LlmError::Unavailable(err.to_string())
        } else if err.is_decode() {
            LlmError::Protocol(err.to_string())
        } else {
            LlmError::Unavailable(err.to_string())
        }
    }
}
