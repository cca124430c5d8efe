//! Vector index contract shared by both storage variants.

mod memory;
mod sqlite;

pub use memory::JsonVectorIndex;
pub use sqlite::{SqliteVectorIndex, VectorStoreMode};

use std::collections::BTreeMap;

use serde::Serialize;

use crate::chunk::Chunk;
use crate::error::Result;

/// A retrieval hit: the chunk plus its cosine similarity to the query.
#[derive(Debug, Clone)]
pub struct SearchHit {
    /// The matched chunk.
    pub chunk: Chunk,
    /// Cosine similarity in [-1, 1].
    pub score: f32,
}

/// Summary of an index's contents.
#[derive(Debug, Clone, Serialize)]
pub struct IndexStats {
    /// Total chunk count.
    pub chunks: usize,
    /// Chunk count per source document.
    pub sources: BTreeMap<String, usize>,
    /// Embedding model every stored vector was produced with.
    pub embed_model: String,
}

/// Storage for chunks with top-k cosine-similarity search.
///
/// `add` is atomic with respect to concurrent `search`: readers observe
/// either the pre-add or post-add state, never a partial insert. Results are
/// ordered by descending score, length at most `k`; ties prefer earlier
/// insertion. Scores at or below zero are still returned when within the
/// top k.
pub trait VectorIndex: Send + Sync {
    /// Append chunks to the index.
    fn add(&self, chunks: Vec<Chunk>) -> Result<()>;

    /// Top-k nearest chunks by cosine similarity, optionally restricted to
    /// the given source names.
    fn search(&self, query: &[f32], k: usize, sources: Option<&[String]>)
        -> Result<Vec<SearchHit>>;

    /// Summarize the index contents.
    fn stats(&self) -> Result<IndexStats>;

    /// Drop all chunks.
    fn reset(&self) -> Result<()>;
}

/// Cosine similarity between two vectors; zero when either has no magnitude
/// or the dimensions disagree.
pub(crate) fn cosine_sim(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let mag_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let mag_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if mag_a < f32::EPSILON || mag_b < f32::EPSILON {
        0.0
    } else {
        dot / (mag_a * mag_b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_identical_vectors() {
        let v = vec![0.5, 0.5, 0.0];
        assert!((cosine_sim(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_orthogonal_vectors() {
        assert!(cosine_sim(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_opposite_vectors() {
        assert!((cosine_sim(&[1.0, 0.0], &[-1.0, 0.0]) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_degenerate_inputs() {
        assert_eq!(cosine_sim(&[], &[]), 0.0);
        assert_eq!(cosine_sim(&[1.0], &[1.0, 2.0]), 0.0);
        assert_eq!(cosine_sim(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }
}
