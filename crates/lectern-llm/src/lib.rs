//! HTTP client for the local LLM runtime.
//!
//! This crate wraps the runtime's generation and embedding endpoints behind
//! the [`LlmBackend`] trait so the rest of the system never touches the
//! transport directly. The concrete [`OllamaClient`] speaks the runtime's
//! JSON API (including newline-delimited streaming generation); [`MockLlm`]
//! provides a deterministic stand-in for tests.

pub mod client;
pub mod error;
pub mod mock;
pub mod types;

pub use client::{LlmBackend, OllamaClient, SharedLlm, TokenStream};
pub use error::{LlmError, Result};
pub use mock::MockLlm;
pub use types::{
    EmbeddingsRequest, EmbeddingsResponse, GenerateFrame, GenerateRequest, GenerationOptions,
    ModelTag, PullRequest, TagsResponse,
};
