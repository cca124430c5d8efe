//! Retrieval-augmented generation: ingestion, chunking, vector storage, and
//! similarity-ranked retrieval.
//!
//! Two interchangeable backends share one operation set ([`RagBackend`]):
//!
//! - **manual** — fixed-window chunking over a hand-rolled in-memory index
//!   persisted as a single JSON snapshot.
//! - **framework** — recursive-separator chunking over a sqlite-vec index,
//!   either in-memory (`flat`) or on disk (`persistent`).
//!
//! Embeddings always come from the LLM runtime via [`lectern_llm`]; an
//! index never mixes vectors from different embedding models.

pub mod backend;
pub mod chunk;
pub mod error;
pub mod index;
pub mod parser;

pub use backend::{BackendStats, RagBackend, RagConfig};
pub use chunk::{Chunk, ChunkStrategy, ChunkerConfig, split_fixed, split_recursive};
pub use error::{RagError, Result};
pub use index::{
    IndexStats, JsonVectorIndex, SearchHit, SqliteVectorIndex, VectorIndex, VectorStoreMode,
};
pub use parser::parse_document;
