//! On-disk embedding cache for the legacy in-process backend.
//!
//! Two files live in the cache directory:
//! - `embeddings_meta.json`: model, chunk ids and metadata, dimension,
//!   corpus fingerprint and creation time
//! - `embeddings.bin`: the embedding matrix as little-endian `f32`, row-major,
//!   one row per chunk id
//!
//! The metadata also records how the corpus was chunked, so a query can
//! rebuild exactly the chunks the rows were computed for, and a digest of the
//! matrix, so a metadata file never pairs with a matrix it was not written
//! with.

use crate::embeddings::EmbeddingEngine;
use crate::types::{CacheSummary, Chunk};
use chrono::{DateTime, Utc};
use regula_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};

pub const META_FILE: &str = "embeddings_meta.json";
pub const MATRIX_FILE: &str = "embeddings.bin";

/// Per-chunk metadata kept next to the matrix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedChunk {
    pub chunk_id: String,
    pub source: String,
    pub chunk_index: usize,
}

/// Data directory and window settings the cached chunks were built with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorpusLayout {
    /// Data directory as configured (relative paths resolve against the workspace)
    pub data_dir: PathBuf,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

/// Contents of `embeddings_meta.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheMeta {
    pub model_name: String,
    pub chunk_ids: Vec<String>,
    #[serde(default)]
    pub chunks: Vec<CachedChunk>,
    pub embedding_dim: usize,
    /// SHA-256 over chunk ids and texts
    #[serde(default)]
    pub fingerprint: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    /// Chunking used at ingest; absent in caches written without one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layout: Option<CorpusLayout>,
    /// SHA-256 of `embeddings.bin`
    #[serde(default)]
    pub matrix_digest: String,
}

/// A validated cache: metadata plus one embedding row per chunk id.
#[derive(Debug, Clone)]
pub struct CachedEmbeddings {
    pub meta: CacheMeta,
    pub embeddings: Vec<Vec<f32>>,
}

impl CachedEmbeddings {
    /// Whether this cache was computed for `chunks` with `model_name`.
    pub fn is_current(&self, chunks: &[Chunk], model_name: &str) -> bool {
        self.meta.model_name == model_name && self.meta.fingerprint == fingerprint(chunks)
    }

    /// Require the cached ids to be exactly the ids of `chunks`, in order,
    /// and the chunk texts to be the ones the rows were computed from.
    ///
    /// Ranking pairs rows with chunks by position, so any drift between the
    /// corpus and the cache would attach scores to the wrong text.
    pub fn ensure_matches(&self, chunks: &[Chunk]) -> AppResult<()> {
        if self.meta.chunk_ids.len() != chunks.len() {
            return Err(AppError::Alignment(format!(
                "Cache holds {} chunks but the corpus has {}; re-run ingest with the cache backend",
                self.meta.chunk_ids.len(),
                chunks.len()
            )));
        }

        if let Some((cached, chunk)) = self
            .meta
            .chunk_ids
            .iter()
            .zip(chunks)
            .find(|(id, chunk)| **id != chunk.chunk_id)
        {
            return Err(AppError::Alignment(format!(
                "Cache entry '{}' does not match corpus chunk '{}'; re-run ingest with the cache backend",
                cached, chunk.chunk_id
            )));
        }

        if self.meta.fingerprint != fingerprint(chunks) {
            return Err(AppError::Alignment(
                "Corpus text changed since the cache was built; re-run ingest with the cache backend"
                    .to_string(),
            ));
        }

        Ok(())
    }

    pub fn summary(&self) -> CacheSummary {
        CacheSummary {
            model_name: self.meta.model_name.clone(),
            chunks_count: self.meta.chunk_ids.len(),
            embedding_dim: self.meta.embedding_dim,
            created_at: self.meta.created_at,
        }
    }
}

/// Embedding cache rooted at a directory.
#[derive(Debug, Clone)]
pub struct EmbeddingCache {
    dir: PathBuf,
    layout: Option<CorpusLayout>,
}

impl EmbeddingCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            layout: None,
        }
    }

    /// Record `layout` in every cache this instance writes.
    pub fn with_layout(mut self, layout: CorpusLayout) -> Self {
        self.layout = Some(layout);
        self
    }

    pub fn meta_path(&self) -> PathBuf {
        self.dir.join(META_FILE)
    }

    pub fn matrix_path(&self) -> PathBuf {
        self.dir.join(MATRIX_FILE)
    }

    /// Whether both cache files are present.
    pub fn exists(&self) -> bool {
        self.meta_path().exists() && self.matrix_path().exists()
    }

    /// Read and validate the cache. `Ok(None)` when no cache has been written.
    pub fn load(&self) -> AppResult<Option<CachedEmbeddings>> {
        if !self.exists() {
            return Ok(None);
        }

        let meta: CacheMeta = serde_json::from_str(&fs::read_to_string(self.meta_path())?)?;
        let bytes = fs::read(self.matrix_path())?;

        if !meta.matrix_digest.is_empty() && meta.matrix_digest != digest(&bytes) {
            return Err(AppError::Alignment(format!(
                "{} does not belong to {}; re-run ingest with the cache backend",
                self.matrix_path().display(),
                self.meta_path().display()
            )));
        }

        let embeddings = decode_matrix(&bytes, meta.embedding_dim)?;

        if embeddings.len() != meta.chunk_ids.len() {
            return Err(AppError::Alignment(format!(
                "Cache metadata lists {} chunk ids but the matrix has {} rows",
                meta.chunk_ids.len(),
                embeddings.len()
            )));
        }

        tracing::debug!(
            "Loaded embedding cache: {} rows of dimension {}",
            embeddings.len(),
            meta.embedding_dim
        );

        Ok(Some(CachedEmbeddings { meta, embeddings }))
    }

    /// Write the cache for `chunks`, replacing any previous one.
    pub fn save(
        &self,
        model_name: &str,
        chunks: &[Chunk],
        embeddings: Vec<Vec<f32>>,
    ) -> AppResult<CachedEmbeddings> {
        if embeddings.len() != chunks.len() {
            return Err(AppError::Alignment(format!(
                "{} embeddings for {} chunks",
                embeddings.len(),
                chunks.len()
            )));
        }

        let embedding_dim = embeddings.first().map(Vec::len).unwrap_or(0);
        let matrix = encode_matrix(&embeddings, embedding_dim)?;

        let meta = CacheMeta {
            model_name: model_name.to_string(),
            chunk_ids: chunks.iter().map(|c| c.chunk_id.clone()).collect(),
            chunks: chunks
                .iter()
                .map(|c| CachedChunk {
                    chunk_id: c.chunk_id.clone(),
                    source: c.source.clone(),
                    chunk_index: c.chunk_index,
                })
                .collect(),
            embedding_dim,
            fingerprint: fingerprint(chunks),
            created_at: Some(Utc::now()),
            layout: self.layout.clone(),
            matrix_digest: digest(&matrix),
        };

        fs::create_dir_all(&self.dir)?;
        write_replacing(&self.matrix_path(), &matrix)?;
        write_replacing(&self.meta_path(), serde_json::to_string_pretty(&meta)?.as_bytes())?;

        tracing::info!(
            "Saved {} embeddings to {}",
            embeddings.len(),
            self.dir.display()
        );

        Ok(CachedEmbeddings { meta, embeddings })
    }

    /// Return cached embeddings for `chunks`, computing and saving them when
    /// the cache is missing, stale, or `force_recompute` is set.
    pub async fn load_or_compute(
        &self,
        chunks: &[Chunk],
        engine: &EmbeddingEngine,
        force_recompute: bool,
    ) -> AppResult<CachedEmbeddings> {
        if !force_recompute {
            if let Some(cached) = self.load()? {
                if cached.is_current(chunks, engine.model_name())
                    && cached.meta.layout == self.layout
                {
                    tracing::info!("Embedding cache is current ({} chunks)", chunks.len());
                    return Ok(cached);
                }
                tracing::warn!("Embedding cache is stale; recomputing");
            }
        }

        let embeddings = engine.embed_chunks(chunks).await?;
        self.save(engine.model_name(), chunks, embeddings)
    }

    /// Delete both cache files if present.
    pub fn clear(&self) -> AppResult<()> {
        for path in [self.meta_path(), self.matrix_path()] {
            if path.exists() {
                fs::remove_file(path)?;
            }
        }
        Ok(())
    }
}

/// SHA-256 over every chunk id and text, in order.
pub fn fingerprint(chunks: &[Chunk]) -> String {
    let mut hasher = Sha256::new();
    for chunk in chunks {
        hasher.update(chunk.chunk_id.as_bytes());
        hasher.update([0u8]);
        hasher.update(chunk.text.as_bytes());
        hasher.update([0u8]);
    }
    format!("{:x}", hasher.finalize())
}

fn digest(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// Write to a sibling temp file, then rename over `path`.
fn write_replacing(path: &Path, contents: &[u8]) -> AppResult<()> {
    let temp_path = path.with_extension("tmp");
    fs::write(&temp_path, contents)?;
    fs::rename(&temp_path, path)?;
    Ok(())
}

fn encode_matrix(embeddings: &[Vec<f32>], dim: usize) -> AppResult<Vec<u8>> {
    let mut bytes = Vec::with_capacity(embeddings.len() * dim * 4);
    for (i, row) in embeddings.iter().enumerate() {
        if row.len() != dim {
            return Err(AppError::Alignment(format!(
                "Embedding row {} has dimension {}, expected {}",
                i,
                row.len(),
                dim
            )));
        }
        for value in row {
            bytes.extend_from_slice(&value.to_le_bytes());
        }
    }
    Ok(bytes)
}

fn decode_matrix(bytes: &[u8], dim: usize) -> AppResult<Vec<Vec<f32>>> {
    if bytes.is_empty() {
        return Ok(Vec::new());
    }

    let row_bytes = dim * 4;
    if dim == 0 || bytes.len() % row_bytes != 0 {
        return Err(AppError::Alignment(format!(
            "Cache matrix of {} bytes is not a whole number of {}-dimensional rows",
            bytes.len(),
            dim
        )));
    }

    Ok(bytes
        .chunks_exact(row_bytes)
        .map(|row| {
            row.chunks_exact(4)
                .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
                .collect()
        })
        .collect())
}
