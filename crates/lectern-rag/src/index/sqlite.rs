//! Library-backed vector index on sqlite-vec.
//!
//! The framework backend's index. Two modes behind one type: `Flat` keeps
//! everything in an in-memory database (lost on restart), `Persistent`
//! stores the database inside a configured directory (survives restart;
//! deleting the directory resets the index).
//!
//! Embeddings live in a `vec0` virtual table declared with cosine distance;
//! similarity reported to callers is `1 - distance`. Chunk text and source
//! rows live in a companion table keyed by insertion sequence. A single
//! connection behind a mutex serializes writers and readers, which keeps
//! `add` atomic with respect to concurrent `search`.

use std::path::PathBuf;
use std::sync::{Mutex, Once};

use rusqlite::{Connection, params};
use zerocopy::IntoBytes;

use super::{IndexStats, SearchHit, VectorIndex};
use crate::chunk::Chunk;
use crate::error::{RagError, Result};

static VEC_EXTENSION: Once = Once::new();

/// Register the sqlite-vec extension for all future connections.
fn init_vector_extension() {
    VEC_EXTENSION.call_once(|| {
        use rusqlite::ffi::sqlite3_auto_extension;
        use sqlite_vec::sqlite3_vec_init;

        unsafe {
            #[allow(clippy::missing_transmute_annotations)]
            sqlite3_auto_extension(Some(std::mem::transmute(sqlite3_vec_init as *const ())));
        }
    });
}

/// Where the framework index keeps its state.
#[derive(Debug, Clone)]
pub enum VectorStoreMode {
    /// In-memory database; state is lost on restart.
    Flat,
    /// Database file inside the given directory; state survives restart.
    Persistent(PathBuf),
}

struct IndexInner {
    conn: Connection,
    /// Embedding dimension, known after the first add (or from a loaded
    /// database). The vec0 table is created lazily once this is known.
    dims: Option<usize>,
}

/// sqlite-vec backed vector index.
pub struct SqliteVectorIndex {
    embed_model: String,
    inner: Mutex<IndexInner>,
}

impl SqliteVectorIndex {
    /// Open (or create) an index in the given mode.
    pub fn new(embed_model: impl Into<String>, mode: VectorStoreMode) -> Result<Self> {
        init_vector_extension();
        let embed_model = embed_model.into();

        let conn = match &mode {
            VectorStoreMode::Flat => Connection::open_in_memory()?,
            VectorStoreMode::Persistent(dir) => {
                std::fs::create_dir_all(dir)?;
                Connection::open(dir.join("vectors.db"))?
            }
        };

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS index_meta (
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS chunks (
                seq      INTEGER PRIMARY KEY AUTOINCREMENT,
                chunk_id TEXT UNIQUE NOT NULL,
                text     TEXT NOT NULL,
                source   TEXT NOT NULL
            );
            "#,
        )?;

        let mut index = Self {
            embed_model,
            inner: Mutex::new(IndexInner { conn, dims: None }),
        };
        index.load_or_clear_meta()?;
        Ok(index)
    }

    fn load_or_clear_meta(&mut self) -> Result<()> {
        let inner = self.inner.get_mut().expect("index lock poisoned");

        let stored_model: Option<String> = inner
            .conn
            .query_row(
                "SELECT value FROM index_meta WHERE key = 'embed_model'",
                [],
                |row| row.get(0),
            )
            .ok();

        match stored_model {
            Some(model) if model == self.embed_model => {
                let dims: Option<String> = inner
                    .conn
                    .query_row(
                        "SELECT value FROM index_meta WHERE key = 'dims'",
                        [],
                        |row| row.get(0),
                    )
                    .ok();
                inner.dims = dims.and_then(|d| d.parse().ok());
                if inner.dims.is_some() {
                    let count: i64 =
                        inner
                            .conn
                            .query_row("SELECT COUNT(*) FROM chunks", [], |row| row.get(0))?;
                    tracing::info!(chunks = count, "Loaded persistent vector index");
                }
            }
            Some(model) => {
                tracing::warn!(
                    stored_model = %model,
                    configured_model = %self.embed_model,
                    "Vector index was built with a different embedding model, resetting"
                );
                clear_all(&inner.conn)?;
                inner.dims = None;
            }
            None => {}
        }

        Ok(())
    }

    fn ensure_vec_table(inner: &mut IndexInner, embed_model: &str, dims: usize) -> Result<()> {
        match inner.dims {
            Some(existing) if existing == dims => return Ok(()),
            Some(existing) => {
                return Err(RagError::Index(format!(
                    "embedding dimension mismatch: index has {existing}, got {dims}"
                )));
            }
            None => {}
        }

        let sql = format!(
            "CREATE VIRTUAL TABLE IF NOT EXISTS chunk_embeddings USING vec0(
                chunk_id TEXT PRIMARY KEY,
                embedding FLOAT[{dims}] distance_metric=cosine
            )"
        );
        inner.conn.execute_batch(&sql)?;

        inner.conn.execute(
            "INSERT OR REPLACE INTO index_meta (key, value) VALUES ('embed_model', ?1)",
            params![embed_model],
        )?;
        inner.conn.execute(
            "INSERT OR REPLACE INTO index_meta (key, value) VALUES ('dims', ?1)",
            params![dims.to_string()],
        )?;

        inner.dims = Some(dims);
        Ok(())
    }
}

fn clear_all(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        DROP TABLE IF EXISTS chunk_embeddings;
        DELETE FROM chunks;
        DELETE FROM index_meta;
        "#,
    )?;
    Ok(())
}

fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect()
}

impl VectorIndex for SqliteVectorIndex {
    fn add(&self, chunks: Vec<Chunk>) -> Result<()> {
        if chunks.is_empty() {
            return Ok(());
        }

        let dims = chunks[0].embedding.len();
        if chunks.iter().any(|c| c.embedding.len() != dims) {
            return Err(RagError::Index(
                "chunks in one add must share an embedding dimension".to_string(),
            ));
        }

        let mut inner = self.inner.lock().expect("index lock poisoned");
        Self::ensure_vec_table(&mut inner, &self.embed_model, dims)?;

        let tx = inner.conn.transaction()?;
        for chunk in &chunks {
            tx.execute(
                "INSERT INTO chunks (chunk_id, text, source) VALUES (?1, ?2, ?3)",
                params![chunk.id, chunk.text, chunk.source],
            )?;
            tx.execute(
                "INSERT INTO chunk_embeddings (chunk_id, embedding) VALUES (?1, ?2)",
                params![chunk.id, chunk.embedding.as_bytes()],
            )?;
        }
        tx.commit()?;

        tracing::debug!(added = chunks.len(), "Added chunks to sqlite-vec index");
        Ok(())
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

        let inner = self.inner.lock().expect("index lock poisoned");
        let Some(dims) = inner.dims else {
            return Ok(Vec::new());
        };
        if query.len() != dims {
            return Err(RagError::Index(format!(
                "query dimension {} does not match index dimension {dims}",
                query.len()
            )));
        }

        // Resolve the candidate id set first when a source filter applies,
        // then constrain the KNN query with an IN clause.
        let candidate_ids: Option<Vec<String>> = match sources {
            Some(filter) => {
                if filter.is_empty() {
                    None
                } else {
                    let placeholders: Vec<String> =
                        (1..=filter.len()).map(|i| format!("?{i}")).collect();
                    let sql = format!(
                        "SELECT chunk_id FROM chunks WHERE source IN ({})",
                        placeholders.join(", ")
                    );
                    let mut stmt = inner.conn.prepare(&sql)?;
                    let params: Vec<&dyn rusqlite::ToSql> =
                        filter.iter().map(|s| s as &dyn rusqlite::ToSql).collect();
                    let ids = stmt
                        .query_map(params.as_slice(), |row| row.get::<_, String>(0))?
                        .collect::<std::result::Result<Vec<_>, _>>()?;
                    if ids.is_empty() {
                        return Ok(Vec::new());
                    }
                    Some(ids)
                }
            }
            None => None,
        };

        let mut sql = String::from(
            "SELECT chunk_id, distance FROM chunk_embeddings WHERE embedding MATCH ?1",
        );
        let mut bindings: Vec<Box<dyn rusqlite::ToSql>> =
            vec![Box::new(query.as_bytes().to_vec())];

        if let Some(ids) = &candidate_ids {
            let start = bindings.len() + 2;
            let placeholders: Vec<String> = (0..ids.len())
                .map(|i| format!("?{}", start + i))
                .collect();
            sql.push_str(&format!(" AND chunk_id IN ({})", placeholders.join(", ")));
        }
        sql.push_str(" ORDER BY distance LIMIT ?2");
        bindings.push(Box::new(k as i64));
        if let Some(ids) = &candidate_ids {
            for id in ids {
                bindings.push(Box::new(id.clone()));
            }
        }

        let mut stmt = inner.conn.prepare(&sql)?;
        let params: Vec<&dyn rusqlite::ToSql> = bindings.iter().map(|b| b.as_ref()).collect();
        let mut rows = stmt.query(params.as_slice())?;

        let mut scored: Vec<(String, f32)> = Vec::new();
        while let Some(row) = rows.next()? {
            let chunk_id: String = row.get(0)?;
            let distance: f32 = row.get(1)?;
            scored.push((chunk_id, 1.0 - distance));
        }

        let mut lookup = inner
            .conn
            .prepare("SELECT text, source FROM chunks WHERE chunk_id = ?1")?;
        let mut vector_lookup = inner
            .conn
            .prepare("SELECT embedding FROM chunk_embeddings WHERE chunk_id = ?1")?;
        let mut hits = Vec::with_capacity(scored.len());
        for (chunk_id, score) in scored {
            let (text, source) = lookup.query_row(params![chunk_id], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?;
            let blob: Vec<u8> =
                vector_lookup.query_row(params![chunk_id], |row| row.get(0))?;
            hits.push(SearchHit {
                chunk: Chunk {
                    id: chunk_id,
                    text,
                    source,
                    embedding: blob_to_vec(&blob),
                },
                score,
            });
        }

        Ok(hits)
    }

    fn stats(&self) -> Result<IndexStats> {
        let inner = self.inner.lock().expect("index lock poisoned");

        let count: i64 = inner
            .conn
            .query_row("SELECT COUNT(*) FROM chunks", [], |row| row.get(0))?;

        let mut stmt = inner
            .conn
            .prepare("SELECT source, COUNT(*) FROM chunks GROUP BY source")?;
        let mut rows = stmt.query([])?;
        let mut sources = std::collections::BTreeMap::new();
        while let Some(row) = rows.next()? {
            let source: String = row.get(0)?;
            let n: i64 = row.get(1)?;
            sources.insert(source, n as usize);
        }

        Ok(IndexStats {
            chunks: count as usize,
            sources,
            embed_model: self.embed_model.clone(),
        })
    }

    fn reset(&self) -> Result<()> {
        let mut inner = self.inner.lock().expect("index lock poisoned");
        clear_all(&inner.conn)?;
        inner.dims = None;
        Ok(())
    }
}
