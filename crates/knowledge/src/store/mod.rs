//! Vector store abstraction for embedded chunks.
//!
//! A store persists chunk text, metadata and embeddings keyed by chunk id,
//! and answers nearest-neighbour queries with raw distances. Turning those
//! distances into ranked results is the job of [`crate::assembly`].

pub mod lance;
pub mod memory;

pub use lance::LanceDbStore;
pub use memory::InMemoryStore;

use crate::assembly::{DistanceMetric, QueryResponse};
use crate::types::Chunk;
use regula_core::{AppError, AppResult};
use serde_json::{json, Value};

/// Trait for vector store backends.
///
/// Implementations must support:
/// - Upserting chunks with embeddings, keyed by chunk id
/// - Querying the nearest `top_k` records, closest first
/// - Counting and clearing stored records
#[async_trait::async_trait]
pub trait VectorStore: Send + Sync {
    /// Backend name for logs and stats.
    fn name(&self) -> &str;

    /// Distance function reported by [`VectorStore::query`].
    fn metric(&self) -> DistanceMetric;

    /// Insert or replace chunks. `vectors[i]` is the embedding of `chunks[i]`.
    async fn upsert(&self, chunks: &[Chunk], vectors: &[Vec<f32>]) -> AppResult<()>;

    /// Find the `top_k` records closest to `vector`, ordered by ascending distance.
    async fn query(&self, vector: &[f32], top_k: usize) -> AppResult<QueryResponse>;

    /// Number of stored records.
    async fn count(&self) -> AppResult<usize>;

    /// Remove every record.
    async fn reset(&self) -> AppResult<()>;
}

/// Check that chunks and vectors line up before writing.
pub(crate) fn check_upsert(chunks: &[Chunk], vectors: &[Vec<f32>], dim: usize) -> AppResult<()> {
    if chunks.len() != vectors.len() {
        return Err(AppError::Alignment(format!(
            "{} chunks but {} vectors",
            chunks.len(),
            vectors.len()
        )));
    }

    if let Some((i, v)) = vectors.iter().enumerate().find(|(_, v)| v.len() != dim) {
        return Err(AppError::Alignment(format!(
            "Vector for '{}' has dimension {}, store expects {}",
            chunks[i].chunk_id,
            v.len(),
            dim
        )));
    }

    Ok(())
}

/// Metadata object stored alongside each chunk.
pub(crate) fn chunk_metadata(chunk: &Chunk) -> Value {
    json!({
        "source": chunk.source,
        "chunk_index": chunk.chunk_index,
    })
}
