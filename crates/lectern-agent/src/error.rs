//! Error types for the agent crate.

use thiserror::Error;

/// Result type alias using the agent error type.
pub type Result<T> = std::result::Result<T, AgentError>;

/// Errors from running the agent loop.
#[derive(Debug, Error)]
pub enum AgentError {
    /// The underlying LLM call failed.
    #[error(transparent)]
    Llm(#[from] lectern_llm::LlmError),

    /// The user message was empty after trimming.
    #[error("empty message")]
    EmptyMessage,
}
