//! RAG backends: ingestion and context retrieval.
//!
//! Both backends expose the same operations and differ only in chunking
//! strategy and index variant: the manual backend pairs the fixed-window
//! splitter with the JSON-persisted in-memory index, the framework backend
//! pairs the recursive splitter with the sqlite-vec index.

use std::path::PathBuf;

use serde::Serialize;
use uuid::Uuid;

use lectern_llm::SharedLlm;

use crate::chunk::{Chunk, ChunkStrategy, ChunkerConfig, split};
use crate::error::Result;
use crate::index::{
    IndexStats, JsonVectorIndex, SearchHit, SqliteVectorIndex, VectorIndex, VectorStoreMode,
};
use crate::parser::parse_document;

/// Separator between context blocks in an assembled context string.
const CONTEXT_SEPARATOR: &str = "\n\n---\n\n";

/// Configuration shared by both backends.
#[derive(Debug, Clone)]
pub struct RagConfig {
    /// Embedding model name; fixed for the lifetime of the backend.
    pub embed_model: String,
    /// Chunk window size in characters.
    pub chunk_size: usize,
    /// Overlap between consecutive chunks.
    pub chunk_overlap: usize,
    /// Default number of chunks to retrieve.
    pub top_k: usize,
    /// Cap on the assembled context length in characters.
    pub max_context_chars: usize,
}

impl RagConfig {
    fn chunker(&self) -> Result<ChunkerConfig> {
        ChunkerConfig::new(self.chunk_size, self.chunk_overlap)
    }
}

/// Stats payload for one backend.
#[derive(Debug, Clone, Serialize)]
pub struct BackendStats {
    /// Backend name (`manual` or `framework`).
    pub system: String,
    /// Total chunk count.
    pub chunks: usize,
    /// Chunk count per source document.
    pub sources: std::collections::BTreeMap<String, usize>,
    /// Embedding model used by the index.
    pub embed_model: String,
}

/// One complete ingestion-and-retrieval stack.
pub struct RagBackend {
    name: &'static str,
    config: RagConfig,
    chunker: ChunkerConfig,
    strategy: ChunkStrategy,
    index: Box<dyn VectorIndex>,
    llm: SharedLlm,
}

impl RagBackend {
    /// Build the manual backend: fixed-window chunking over the
    /// JSON-persisted in-memory index.
    pub fn manual(config: RagConfig, llm: SharedLlm, store_path: Option<PathBuf>) -> Result<Self> {
        let chunker = config.chunker()?;
        let index = JsonVectorIndex::new(config.embed_model.clone(), store_path);
        Ok(Self {
            name: "manual",
            chunker,
            strategy: ChunkStrategy::FixedWindow,
            index: Box::new(index),
            config,
            llm,
        })
    }

    /// Build the framework backend: recursive chunking over the sqlite-vec
    /// index in the given mode.
    pub fn framework(config: RagConfig, llm: SharedLlm, mode: VectorStoreMode) -> Result<Self> {
        let chunker = config.chunker()?;
        let index = SqliteVectorIndex::new(config.embed_model.clone(), mode)?;
        Ok(Self {
            name: "framework",
            chunker,
            strategy: ChunkStrategy::Recursive,
            index: Box::new(index),
            config,
            llm,
        })
    }

    /// The backend name (`manual` or `framework`).
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The backend configuration.
    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// Chunk, embed, and index a text. Returns the number of chunks added.
    ///
    /// All chunks are embedded before the single index insert, so an
    /// embedding failure leaves the index unchanged.
    pub async fn ingest_text(&self, text: &str, source: &str) -> Result<usize> {
        let pieces = split(text, self.strategy, &self.chunker);
        if pieces.is_empty() {
            return Ok(0);
        }

        let mut chunks = Vec::with_capacity(pieces.len());
        for piece in pieces {
            let embedding = self.llm.embed(&self.config.embed_model, &piece).await?;
            chunks.push(Chunk {
                id: Uuid::new_v4().to_string(),
                text: piece,
                source: source.to_string(),
                embedding,
            });
        }

        let added = chunks.len();
        self.index.add(chunks)?;

        tracing::info!(
            backend = self.name,
            source,
            added,
            "Indexed text"
        );
        Ok(added)
    }

    /// Parse a file and ingest the extracted text under its filename.
    pub async fn ingest_file(&self, filename: &str, bytes: &[u8]) -> Result<usize> {
        let text = parse_document(filename, bytes)?;
        self.ingest_text(&text, filename).await
    }

    /// Retrieve the top chunks for a query and assemble them into a context
    /// string bounded by `max_context_chars`.
    ///
    /// Returns the context string together with the scored hits.
    pub async fn build_context(
        &self,
        query: &str,
        top_k: usize,
        sources: Option<&[String]>,
    ) -> Result<(String, Vec<SearchHit>)> {
        let query_embedding = self.llm.embed(&self.config.embed_model, query).await?;
        let hits = self.index.search(&query_embedding, top_k, sources)?;

        let context = assemble_context(&hits, self.config.max_context_chars);

        tracing::debug!(
            backend = self.name,
            hits = hits.len(),
            context_chars = context.chars().count(),
            "Built retrieval context"
        );
        Ok((context, hits))
    }

    /// Number of chunks visible through the given source filter.
    pub fn matching_chunks(&self, sources: Option<&[String]>) -> Result<usize> {
        let stats = self.index.stats()?;
        Ok(match sources {
            Some(filter) if !filter.is_empty() => filter
                .iter()
                .map(|s| stats.sources.get(s).copied().unwrap_or(0))
                .sum(),
            _ => stats.chunks,
        })
    }

    /// Backend metadata plus index stats.
    pub fn stats(&self) -> Result<BackendStats> {
        let IndexStats {
            chunks,
            sources,
            embed_model,
        } = self.index.stats()?;
        Ok(BackendStats {
            system: self.name.to_string(),
            chunks,
            sources,
            embed_model,
        })
    }

    /// Drop every chunk in this backend's index.
    pub fn reset(&self) -> Result<()> {
        self.index.reset()
    }
}

/// Format hits as `Source: <name>` blocks joined by the separator, cutting
/// the final block so the total (separators included) stays within
/// `max_chars`.
fn assemble_context(hits: &[SearchHit], max_chars: usize) -> String {
    let sep_chars = CONTEXT_SEPARATOR.chars().count();
    let mut parts: Vec<String> = Vec::new();
    let mut total = 0usize;

    for hit in hits {
        let sep_len = if parts.is_empty() { 0 } else { sep_chars };
        let mut block = format!("Source: {}\n{}", hit.chunk.source, hit.chunk.text);
        let block_len = block.chars().count();

        if total + sep_len + block_len > max_chars {
            let remaining = max_chars.saturating_sub(total + sep_len);
            if remaining == 0 {
                break;
            }
            block = block.chars().take(remaining).collect();
        }

        total += sep_len + block.chars().count();
        parts.push(block);
        if total >= max_chars {
            break;
        }
    }

    parts.join(CONTEXT_SEPARATOR)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lectern_llm::MockLlm;
    use std::sync::Arc;

    fn config() -> RagConfig {
        RagConfig {
            embed_model: "test-embed".to_string(),
            chunk_size: 800,
            chunk_overlap: 200,
            top_k: 4,
            max_context_chars: 2000,
        }
    }

    fn manual_backend() -> RagBackend {
        RagBackend::manual(config(), Arc::new(MockLlm::with_text("ok")), None).unwrap()
    }

    fn framework_backend() -> RagBackend {
        RagBackend::framework(
            config(),
            Arc::new(MockLlm::with_text("ok")),
            VectorStoreMode::Flat,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_ingest_text_counts_chunks() {
        for backend in [manual_backend(), framework_backend()] {
            let added = backend
                .ingest_text("The secret code is BANANA-7.", "secret.txt")
                .await
                .unwrap();
            assert_eq!(added, 1);

            let stats = backend.stats().unwrap();
            assert_eq!(stats.chunks, 1);
            assert_eq!(stats.sources["secret.txt"], 1);
        }
    }

    #[tokio::test]
    async fn test_ingest_count_matches_chunker() {
        use crate::chunk::split_fixed;

        let backend = manual_backend();
        let text = "word ".repeat(400);
        let chunker = ChunkerConfig::new(800, 200).unwrap();
        let expected = split_fixed(&text, &chunker).len();
        assert!(expected > 1);

        let added = backend.ingest_text(&text, "long.txt").await.unwrap();
        assert_eq!(added, expected);
        assert_eq!(backend.stats().unwrap().chunks, expected);
    }

    #[tokio::test]
    async fn test_ingest_empty_text_adds_nothing() {
        let backend = manual_backend();
        assert_eq!(backend.ingest_text("", "empty.txt").await.unwrap(), 0);
        assert_eq!(backend.stats().unwrap().chunks, 0);
    }

    #[tokio::test]
    async fn test_ingest_is_atomic_on_embedding_failure() {
        let backend =
            RagBackend::manual(config(), Arc::new(MockLlm::failing_embeddings()), None).unwrap();

        let err = backend
            .ingest_text("some document text", "doc.txt")
            .await
            .unwrap_err();
        assert!(matches!(err, crate::error::RagError::Embedding(_)));
        assert_eq!(backend.stats().unwrap().chunks, 0);
    }

    #[tokio::test]
    async fn test_build_context_includes_ingested_text() {
        for backend in [manual_backend(), framework_backend()] {
            backend
                .ingest_text("The secret code is BANANA-7.", "secret.txt")
                .await
                .unwrap();

            let filter = vec!["secret.txt".to_string()];
            let (context, hits) = backend
                .build_context("What is the secret code?", 4, Some(&filter))
                .await
                .unwrap();

            assert!(context.contains("BANANA-7"));
            assert!(context.starts_with("Source: secret.txt"));
            assert_eq!(hits.len(), 1);
        }
    }

    #[tokio::test]
    async fn test_source_filter_isolates_documents() {
        let backend = manual_backend();
        backend
            .ingest_text("The cat's name is Mittens.", "cats.txt")
            .await
            .unwrap();
        backend
            .ingest_text("The dog's name is Rex.", "dogs.txt")
            .await
            .unwrap();

        let filter = vec!["cats.txt".to_string()];
        let (context, _) = backend
            .build_context("What is the pet's name?", 4, Some(&filter))
            .await
            .unwrap();

        assert!(context.contains("Mittens"));
        assert!(!context.contains("Rex"));
    }

    #[tokio::test]
    async fn test_matching_chunks_respects_filter() {
        let backend = manual_backend();
        backend.ingest_text("cats", "cats.txt").await.unwrap();
        backend.ingest_text("dogs", "dogs.txt").await.unwrap();

        assert_eq!(backend.matching_chunks(None).unwrap(), 2);
        let filter = vec!["cats.txt".to_string()];
        assert_eq!(backend.matching_chunks(Some(&filter)).unwrap(), 1);
        let unknown = vec!["birds.txt".to_string()];
        assert_eq!(backend.matching_chunks(Some(&unknown)).unwrap(), 0);
    }

    #[tokio::test]
    async fn test_reset_empties_backend() {
        let backend = framework_backend();
        backend.ingest_text("content", "doc.txt").await.unwrap();
        assert_eq!(backend.stats().unwrap().chunks, 1);

        backend.reset().unwrap();
        assert_eq!(backend.stats().unwrap().chunks, 0);
    }

    #[test]
    fn test_assemble_context_respects_budget() {
        let hits: Vec<SearchHit> = (0..5)
            .map(|i| SearchHit {
                chunk: Chunk {
                    id: i.to_string(),
                    text: "x".repeat(100),
                    source: "doc.txt".to_string(),
                    embedding: vec![1.0],
                },
                score: 1.0,
            })
            .collect();

        let context = assemble_context(&hits, 250);
        assert!(context.chars().count() <= 250);

        // Blocks are prefixed with their source and separated.
        assert!(context.starts_with("Source: doc.txt\n"));
        assert!(context.contains(CONTEXT_SEPARATOR));
    }

    #[test]
    fn test_assemble_context_empty_hits() {
        assert!(assemble_context(&[], 2000).is_empty());
    }

    #[test]
    fn test_invalid_chunker_config_rejected_at_construction() {
        let bad = RagConfig {
            chunk_size: 100,
            chunk_overlap: 100,
            ..config()
        };
        assert!(RagBackend::manual(bad, Arc::new(MockLlm::with_text("ok")), None).is_err());
    }
}
