//! Knowledge system type definitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// A loaded source file. One per `.txt` file in the data directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// File base name, e.g. "Condominium regulations - chapter 3.txt"
    pub source: String,

    /// Full file content with boilerplate removed
    pub text: String,
}

/// A retained window of a document, the unit of retrieval and citation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// `"{source}::chunk_{chunk_index}"`
    pub chunk_id: String,

    /// Source document name
    pub source: String,

    /// Position among the retained chunks of `source`, starting at 0
    pub chunk_index: usize,

    /// Trimmed window text
    pub text: String,
}

impl Chunk {
    /// Create a chunk, deriving its identifier from source and index.
    pub fn new(source: impl Into<String>, chunk_index: usize, text: impl Into<String>) -> Self {
        let source = source.into();
        Self {
            chunk_id: chunk_id(&source, chunk_index),
            source,
            chunk_index,
            text: text.into(),
        }
    }
}

/// Build the citation token for a chunk.
pub fn chunk_id(source: &str, chunk_index: usize) -> String {
    format!("{}::chunk_{}", source, chunk_index)
}

/// One ranked retrieval hit.
///
/// `score` is always a similarity: higher is better. Results that come from a
/// vector store keep the raw store distance in `distance`; the conversion to
/// `score` happens once, when the store response is assembled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub chunk_id: String,

    /// Source document name, empty when the store record lacked it
    pub source: String,

    /// Chunk index, -1 when the store record lacked it
    pub chunk_index: i64,

    pub text: String,

    /// Similarity used for ranking (higher is better)
    pub score: f32,

    /// Raw store distance (lower is better), when the result came from a store
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance: Option<f32>,
}

impl RetrievalResult {
    /// Result for a chunk scored in similarity space.
    pub fn from_chunk(chunk: &Chunk, score: f32) -> Self {
        Self {
            chunk_id: chunk.chunk_id.clone(),
            source: chunk.source.clone(),
            chunk_index: chunk.chunk_index as i64,
            text: chunk.text.clone(),
            score,
            distance: None,
        }
    }
}

/// Retrieval backend.
///
/// `Store` (LanceDB) is canonical; `Cache` is the legacy on-disk embedding
/// matrix ranked in process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Store,
    Cache,
}

impl Backend {
    /// Parse backend from string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "store" | "lancedb" => Some(Self::Store),
            "cache" => Some(Self::Cache),
            _ => None,
        }
    }

    /// Get the canonical backend name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Store => "store",
            Self::Cache => "cache",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Options for the ingest operation.
#[derive(Debug, Clone, Default)]
pub struct IngestOptions {
    /// Backend override (defaults to the configured backend)
    pub backend: Option<Backend>,

    /// Clear the store (or ignore the cache) before ingesting
    pub reset: bool,

    /// Recompute cached embeddings even when the cache is current
    pub force_recompute: bool,
}

/// Statistics from an ingest operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestStats {
    /// Backend the chunks were written to
    pub backend: Backend,

    /// Number of documents loaded
    pub documents_count: usize,

    /// Number of chunks retained after quality filtering
    pub chunks_count: usize,

    /// Total bytes of document text processed
    pub bytes_processed: u64,

    /// Embedding vector dimension
    pub embedding_dim: usize,

    /// Duration in seconds
    pub duration_secs: f64,
}

/// Options for the search operation.
///
/// Unset fields fall back to the corpus configuration.
#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    /// Query text
    pub query: String,

    /// Number of results to return
    pub top_k: Option<usize>,

    /// Minimum similarity
    pub min_score: Option<f32>,

    /// Extra phrases to exclude, added to the configured ones
    pub exclude_phrases: Vec<String>,

    /// Backend override
    pub backend: Option<Backend>,
}

impl SearchOptions {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
        }
    }
}

/// Summary of the persisted embedding cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSummary {
    pub model_name: String,
    pub chunks_count: usize,
    pub embedding_dim: usize,
    pub created_at: Option<DateTime<Utc>>,
}

/// Statistics for the workspace corpus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorpusStats {
    /// Resolved data directory
    pub data_dir: PathBuf,

    /// Chunks in the vector store, `None` when no index exists
    pub stored_chunks: Option<usize>,

    /// Embedding cache summary, `None` when no cache exists
    pub cache: Option<CacheSummary>,
}
