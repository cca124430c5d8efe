//! Error types for the RAG crate.

use thiserror::Error;

/// Result type alias using the RAG error type.
pub type Result<T> = std::result::Result<T, RagError>;

/// Errors from ingestion, indexing, and retrieval.
#[derive(Debug, Error)]
pub enum RagError {
    /// The file suffix is not one we can extract text from.
    #[error("unsupported document format: {0}")]
    UnsupportedFormat(String),

    /// The document parsed, but contained no extractable text.
    #[error("no text extracted from {0}")]
    EmptyDocument(String),

    /// The document bytes could not be parsed at all.
    #[error("failed to parse {filename}: {message}")]
    Parse {
        /// The offending file.
        filename: String,
        /// What went wrong.
        message: String,
    },

    /// An embedding call failed; the index was left unchanged.
    #[error("embedding failed: {0}")]
    Embedding(#[from] lectern_llm::LlmError),

    /// The vector index itself failed (storage, corruption).
    #[error("vector index error: {0}")]
    Index(String),

    /// Persisting or loading index state failed.
    #[error("index persistence error: {0}")]
    Persist(#[from] std::io::Error),

    /// Invalid backend configuration.
    #[error("invalid RAG configuration: {0}")]
    Config(String),
}

impl From<rusqlite::Error> for RagError {
    fn from(err: rusqlite::Error) -> Self {
        RagError::Index(err.to_string())
    }
}
