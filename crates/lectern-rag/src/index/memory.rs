//! In-memory vector index with JSON file persistence.
//!
//! The manual backend's index: chunks live in a `Vec` behind a read-write
//! lock and similarity is brute-force cosine. When a store path is
//! configured, every mutation serializes the whole state to JSON via a
//! write-to-temp-then-rename so a failed write never corrupts the previous
//! snapshot.

use std::path::{Path, PathBuf};
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use super::{IndexStats, SearchHit, VectorIndex, cosine_sim};
use crate::chunk::Chunk;
use crate::error::{RagError, Result};

/// On-disk snapshot shape.
#[derive(Debug, Serialize, Deserialize)]
struct PersistedIndex {
    embed_model: String,
    chunks: Vec<Chunk>,
}

/// Brute-force in-memory index, optionally persisted to a JSON file.
pub struct JsonVectorIndex {
    embed_model: String,
    path: Option<PathBuf>,
    chunks: RwLock<Vec<Chunk>>,
}

impl JsonVectorIndex {
    /// Create an index, loading any existing snapshot at `path`.
    ///
    /// A missing file starts empty; a snapshot that fails to parse or was
    /// produced with a different embedding model is discarded with a
    /// warning rather than mixing incompatible vectors.
    pub fn new(embed_model: impl Into<String>, path: Option<PathBuf>) -> Self {
        let embed_model = embed_model.into();
        let chunks = path
            .as_deref()
            .map(|p| load_snapshot(p, &embed_model))
            .unwrap_or_default();

        Self {
            embed_model,
            path,
            chunks: RwLock::new(chunks),
        }
    }

    /// Create an ephemeral index with no persistence, for tests.
    pub fn ephemeral(embed_model: impl Into<String>) -> Self {
        Self::new(embed_model, None)
    }

    fn persist(&self, chunks: &[Chunk]) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let snapshot = PersistedIndex {
            embed_model: self.embed_model.clone(),
            chunks: chunks.to_vec(),
        };
        let json = serde_json::to_vec(&snapshot)
            .map_err(|e| RagError::Index(format!("failed to serialize index: {e}")))?;

        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }
}

fn load_snapshot(path: &Path, embed_model: &str) -> Vec<Chunk> {
    if !path.exists() {
        return Vec::new();
    }

    let data = match std::fs::read(path) {
        Ok(data) => data,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Could not read index snapshot, starting empty");
            return Vec::new();
        }
    };

    match serde_json::from_slice::<PersistedIndex>(&data) {
        Ok(snapshot) if snapshot.embed_model == embed_model => {
            tracing::info!(
                path = %path.display(),
                chunks = snapshot.chunks.len(),
                "Loaded index snapshot"
            );
            snapshot.chunks
        }
        Ok(snapshot) => {
            tracing::warn!(
                path = %path.display(),
                snapshot_model = %snapshot.embed_model,
                configured_model = %embed_model,
                "Index snapshot was built with a different embedding model, starting empty"
            );
            Vec::new()
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Corrupt index snapshot, starting empty");
            Vec::new()
        }
    }
}

impl VectorIndex for JsonVectorIndex {
    fn add(&self, new_chunks: Vec<Chunk>) -> Result<()> {
        let mut chunks = self.chunks.write().expect("index lock poisoned");
        chunks.extend(new_chunks);
        self.persist(&chunks)
    }

    fn search(
        &self,
        query: &[f32],
        k: usize,
        sources: Option<&[String]>,
    ) -> Result<Vec<SearchHit>> {
        if k == 0 {
            return Ok(Vec::new());
        }

        let chunks = self.chunks.read().expect("index lock poisoned");
        let mut hits: Vec<SearchHit> = chunks
            .iter()
            .filter(|c| match sources {
                Some(filter) if !filter.is_empty() => filter.iter().any(|s| s == &c.source),
                _ => true,
            })
            .map(|c| SearchHit {
                chunk: c.clone(),
                score: cosine_sim(query, &c.embedding),
            })
            .collect();

        // Stable sort: equal scores keep insertion order, earlier wins.
        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(k);
        Ok(hits)
    }

    fn stats(&self) -> Result<IndexStats> {
        let chunks = self.chunks.read().expect("index lock poisoned");
        let mut sources = std::collections::BTreeMap::new();
        for chunk in chunks.iter() {
            *sources.entry(chunk.source.clone()).or_insert(0) += 1;
        }
        Ok(IndexStats {
            chunks: chunks.len(),
            sources,
            embed_model: self.embed_model.clone(),
        })
    }

    fn reset(&self) -> Result<()> {
        let mut chunks = self.chunks.write().expect("index lock poisoned");
        chunks.clear();
        self.persist(&chunks)
    }
}
