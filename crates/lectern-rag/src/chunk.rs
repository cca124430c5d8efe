//! Chunk records and text splitters.
//!
//! Two splitters share one size/overlap contract: [`split_fixed`] slides a
//! plain character window (manual backend), [`split_recursive`] prefers
//! paragraph, line, and word boundaries before falling back to hard
//! character windows (framework backend).

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};

/// An indexed slice of a document.
///
/// Immutable once created; destroyed only by resetting its index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    /// Globally unique id within one index.
    pub id: String,
    /// The chunk text.
    pub text: String,
    /// Name of the originating document. Never empty.
    pub source: String,
    /// Embedding vector; every chunk in one index shares one model and
    /// therefore one dimension.
    pub embedding: Vec<f32>,
}

/// Splitter configuration shared by both chunking strategies.
#[derive(Debug, Clone, Copy)]
pub struct ChunkerConfig {
    /// Window size in characters.
    pub chunk_size: usize,
    /// Characters of overlap between consecutive windows.
    pub overlap: usize,
}

impl ChunkerConfig {
    /// Validate and build a chunker config. The overlap must leave a
    /// positive step, otherwise chunking would never advance.
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(RagError::Config("chunk_size must be positive".to_string()));
        }
        if overlap >= chunk_size {
            return Err(RagError::Config(format!(
                "chunk_overlap ({overlap}) must be smaller than chunk_size ({chunk_size})"
            )));
        }
        Ok(Self {
            chunk_size,
            overlap,
        })
    }
}

/// Which splitter a backend uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkStrategy {
    /// Plain sliding character window.
    FixedWindow,
    /// Separator-priority splitting (paragraph, line, word, character).
    Recursive,
}

/// Split `text` according to the given strategy.
pub fn split(text: &str, strategy: ChunkStrategy, config: &ChunkerConfig) -> Vec<String> {
    match strategy {
        ChunkStrategy::FixedWindow => split_fixed(text, config),
        ChunkStrategy::Recursive => split_recursive(text, config),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Fixed Window
// ─────────────────────────────────────────────────────────────────────────────

/// Fixed-window character splitter.
///
/// CRLF is normalized and lines are trimmed before windowing. The final
/// window may be shorter; empty input yields no chunks; input shorter than
/// the window yields a single chunk.
pub fn split_fixed(text: &str, config: &ChunkerConfig) -> Vec<String> {
    let normalized = normalize(text);
    let chars: Vec<char> = normalized.chars().collect();
    let n = chars.len();
    if n == 0 {
        return Vec::new();
    }

    let step = config.chunk_size - config.overlap;
    let mut chunks = Vec::new();
    let mut start = 0;

    while start < n {
        let end = (start + config.chunk_size).min(n);
        let window: String = chars[start..end].iter().collect();
        let window = window.trim();
        if !window.is_empty() {
            chunks.push(window.to_string());
        }
        if end == n {
            break;
        }
        start += step;
    }

    chunks
}

// ─────────────────────────────────────────────────────────────────────────────
// Recursive
// ─────────────────────────────────────────────────────────────────────────────

const SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

/// Separator-priority splitter.
///
/// Splits on the coarsest separator that produces pieces within the window,
/// then greedily merges pieces back up to `chunk_size`, carrying an
/// `overlap`-sized tail between consecutive chunks.
pub fn split_recursive(text: &str, config: &ChunkerConfig) -> Vec<String> {
    let normalized = normalize(text);
    if normalized.is_empty() {
        return Vec::new();
    }

    let mut pieces = Vec::new();
    split_on(&normalized, &SEPARATORS, config.chunk_size, &mut pieces);
    merge_pieces(pieces, config)
}

fn split_on(text: &str, separators: &[&str], max: usize, out: &mut Vec<String>) {
    if char_len(text) <= max {
        if !text.trim().is_empty() {
            out.push(text.to_string());
        }
        return;
    }

    let Some((&sep, rest)) = separators.split_first() else {
        out.push(text.to_string());
        return;
    };

    if sep.is_empty() {
        // Last resort: hard character windows.
        let chars: Vec<char> = text.chars().collect();
        for window in chars.chunks(max) {
            let piece: String = window.iter().collect();
            if !piece.trim().is_empty() {
                out.push(piece);
            }
        }
        return;
    }

    if !text.contains(sep) {
        split_on(text, rest, max, out);
        return;
    }

    for part in text.split(sep) {
        if char_len(part) <= max {
            if !part.trim().is_empty() {
                out.push(part.to_string());
            }
        } else {
            split_on(part, rest, max, out);
        }
    }
}

fn merge_pieces(pieces: Vec<String>, config: &ChunkerConfig) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut buffer: Vec<String> = Vec::new();
    let mut buffer_len = 0usize;

    for piece in pieces {
        let piece_len = char_len(&piece);

        if !buffer.is_empty() && buffer_len + buffer.len() + piece_len > config.chunk_size {
            let chunk = buffer.join("\n");
            let chunk = chunk.trim();
            if !chunk.is_empty() {
                chunks.push(chunk.to_string());
            }
            // Drop leading pieces until only the overlap tail remains (or
            // the next piece fits again).
            while !buffer.is_empty()
                && (buffer_len > config.overlap
                    || buffer_len + buffer.len() + piece_len > config.chunk_size)
            {
                let removed = buffer.remove(0);
                buffer_len -= char_len(&removed);
            }
        }

        buffer_len += piece_len;
        buffer.push(piece);
    }

    let chunk = buffer.join("\n");
    let chunk = chunk.trim();
    if !chunk.is_empty() {
        chunks.push(chunk.to_string());
    }

    chunks
}

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

fn normalize(text: &str) -> String {
    text.replace("\r\n", "\n")
        .lines()
        .map(str::trim)
        .collect::<Vec<_>>()
        .join("\n")
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(size: usize, overlap: usize) -> ChunkerConfig {
        ChunkerConfig::new(size, overlap).unwrap()
    }

    #[test]
    fn test_config_rejects_overlap_not_smaller_than_size() {
        assert!(ChunkerConfig::new(100, 100).is_err());
        assert!(ChunkerConfig::new(100, 200).is_err());
        assert!(ChunkerConfig::new(0, 0).is_err());
        assert!(ChunkerConfig::new(100, 99).is_ok());
    }

    #[test]
    fn test_fixed_empty_input_yields_no_chunks() {
        assert!(split_fixed("", &cfg(800, 200)).is_empty());
        assert!(split_fixed("   \n  ", &cfg(800, 200)).is_empty());
    }

    #[test]
    fn test_fixed_short_input_yields_single_chunk() {
        let chunks = split_fixed("hello world", &cfg(800, 200));
        assert_eq!(chunks, vec!["hello world"]);
    }

    #[test]
    fn test_fixed_window_count_and_overlap() {
        let text = "a".repeat(1000);
        let chunks = split_fixed(&text, &cfg(800, 200));
        // Windows start at 0 and 600: [0..800] and [600..1000].
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].len(), 800);
        assert_eq!(chunks[1].len(), 400);
    }

    #[test]
    fn test_fixed_normalizes_crlf() {
        let chunks = split_fixed("line one\r\nline two", &cfg(800, 200));
        assert_eq!(chunks, vec!["line one\nline two"]);
    }

    #[test]
    fn test_fixed_handles_multibyte_text() {
        let text = "héllo wörld ".repeat(100);
        let chunks = split_fixed(&text, &cfg(100, 20));
        assert!(!chunks.is_empty());
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 100);
        }
    }

    #[test]
    fn test_recursive_prefers_paragraph_boundaries() {
        let text = "first paragraph here\n\nsecond paragraph here\n\nthird paragraph here";
        let chunks = split_recursive(text, &cfg(45, 10));
        assert!(chunks.len() >= 2);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 45, "chunk too long: {chunk:?}");
        }
    }

    #[test]
    fn test_recursive_short_input_single_chunk() {
        let chunks = split_recursive("tiny", &cfg(800, 200));
        assert_eq!(chunks, vec!["tiny"]);
    }

    #[test]
    fn test_recursive_falls_back_to_character_windows() {
        // No separators at all, longer than the window.
        let text = "x".repeat(250);
        let chunks = split_recursive(&text, &cfg(100, 20));
        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|c| c.chars().count() <= 100));
    }

    #[test]
    fn test_recursive_empty_input() {
        assert!(split_recursive("", &cfg(800, 200)).is_empty());
    }
}
