//! Retrieval over condominium regulation documents.
//!
//! Loads `.txt` regulation files, splits them into overlapping chunks,
//! embeds them, and ranks chunks against questions. Two retrieval backends
//! share the same ranking rules: a LanceDB vector store (default) and an
//! on-disk embedding cache ranked in process.

pub mod assembly;
pub mod cache;
pub mod chunker;
pub mod config;
pub mod embeddings;
pub mod loader;
pub mod rag;
pub mod ranker;
pub mod store;
pub mod types;

#[cfg(test)]
mod tests;

// Re-export commonly used types
pub use config::KnowledgeConfig;
pub use embeddings::EmbeddingEngine;
pub use ranker::RankOptions;
pub use store::VectorStore;
pub use types::{
    Backend, CacheSummary, Chunk, CorpusStats, Document, IngestOptions, IngestStats,
    RetrievalResult, SearchOptions,
};

use cache::{CorpusLayout, EmbeddingCache};
use regula_core::{AppError, AppResult};
use std::path::Path;
use std::time::Instant;
use store::LanceDbStore;

/// Candidate pool multiplier used when exclusion phrases may discard hits.
pub const EXCLUSION_OVERFETCH: usize = 4;

/// Load, chunk and embed the corpus, then write it to the chosen backend.
///
/// Any failure aborts the whole run before the backend is modified, so a
/// failed ingest never leaves a partial corpus behind.
pub async fn ingest(
    workspace: &Path,
    config: &KnowledgeConfig,
    options: &IngestOptions,
) -> AppResult<IngestStats> {
    let start = Instant::now();
    config.validate()?;

    let backend = options.backend.unwrap_or(config.retrieval.backend);
    tracing::info!("Starting ingest into {} backend", backend);

    let (documents, chunks) = load_corpus(workspace, config)?;
    if chunks.is_empty() {
        tracing::warn!("Corpus produced no chunks; nothing will be retrievable");
    }

    let engine = EmbeddingEngine::from_config(&config.embedding)?;

    match backend {
        Backend::Store => {
            let vectors = engine.embed_chunks(&chunks).await?;
            let store = open_store_for_ingest(
                &config::get_index_path(workspace),
                &config.store.table,
                engine.dimensions(),
                options.reset,
            )
            .await?;
            store.upsert(&chunks, &vectors).await?;
        }
        Backend::Cache => {
            let cache = EmbeddingCache::new(config::get_cache_dir(workspace))
                .with_layout(corpus_layout(config));
            cache
                .load_or_compute(&chunks, &engine, options.force_recompute || options.reset)
                .await?;
        }
    }

    let duration = start.elapsed();
    let stats = IngestStats {
        backend,
        documents_count: documents.len(),
        chunks_count: chunks.len(),
        bytes_processed: documents.iter().map(|d| d.text.len() as u64).sum(),
        embedding_dim: engine.dimensions(),
        duration_secs: duration.as_secs_f64(),
    };

    tracing::info!(
        "Ingest completed: {} documents, {} chunks in {:.2}s",
        stats.documents_count,
        stats.chunks_count,
        stats.duration_secs
    );

    Ok(stats)
}

/// Embed chunks and upsert them into any store.
pub async fn index_chunks(
    store: &dyn VectorStore,
    engine: &EmbeddingEngine,
    chunks: &[Chunk],
) -> AppResult<usize> {
    let vectors = engine.embed_chunks(chunks).await?;
    store.upsert(chunks, &vectors).await?;
    Ok(chunks.len())
}

/// Rank corpus chunks against a query.
pub async fn search(
    workspace: &Path,
    config: &KnowledgeConfig,
    options: &SearchOptions,
) -> AppResult<Vec<RetrievalResult>> {
    let rank_options = resolve_rank_options(config, options);
    rank_options.validate()?;

    let backend = options.backend.unwrap_or(config.retrieval.backend);
    let engine = EmbeddingEngine::from_config(&config.embedding)?;

    tracing::info!("Searching {} backend for: {}", backend, options.query);

    let results = match backend {
        Backend::Store => {
            let store = LanceDbStore::open_existing(
                &config::get_index_path(workspace),
                &config.store.table,
            )
            .await?;
            retrieve_from_store(&store, &engine, &options.query, &rank_options).await?
        }
        Backend::Cache => {
            let cached = EmbeddingCache::new(config::get_cache_dir(workspace))
                .load()?
                .ok_or_else(|| {
                    AppError::NotFound(
                        "No embedding cache; run `regula ingest --backend cache` first".to_string(),
                    )
                })?;

            if cached.meta.model_name != engine.model_name() {
                return Err(AppError::Alignment(format!(
                    "Cache was built with model '{}' but the configured model is '{}'; re-run ingest",
                    cached.meta.model_name,
                    engine.model_name()
                )));
            }

            // Rows pair with chunks by position, so rebuild the chunks exactly
            // as ingest did and require the corpus not to have drifted
            let corpus_config = match &cached.meta.layout {
                Some(layout) => apply_layout(config, layout),
                None => config.clone(),
            };
            let (_, chunks) = load_corpus(workspace, &corpus_config)?;
            cached.ensure_matches(&chunks)?;

            retrieve_from_cache(
                &engine,
                &chunks,
                &cached.embeddings,
                &options.query,
                &rank_options,
            )
            .await?
        }
    };

    tracing::info!("Search returned {} results", results.len());
    Ok(results)
}

/// Query a store and rank its answer.
///
/// The store is asked for `top_k` candidates, or a larger pool when
/// exclusion phrases are configured.
pub async fn retrieve_from_store(
    store: &dyn VectorStore,
    engine: &EmbeddingEngine,
    query: &str,
    options: &RankOptions,
) -> AppResult<Vec<RetrievalResult>> {
    options.validate()?;

    let query_vector = engine.embed_query(query).await?;
    let pool = if options.has_exclusions() {
        options.top_k.saturating_mul(EXCLUSION_OVERFETCH)
    } else {
        options.top_k
    };

    let response = store.query(&query_vector, pool).await?;
    tracing::debug!("{} returned {} candidates", store.name(), response.len());

    let candidates = assembly::assemble_results(response, store.metric())?;
    ranker::rank_scored(candidates, options)
}

/// Rank precomputed chunk vectors in process.
pub async fn retrieve_from_cache(
    engine: &EmbeddingEngine,
    chunks: &[Chunk],
    vectors: &[Vec<f32>],
    query: &str,
    options: &RankOptions,
) -> AppResult<Vec<RetrievalResult>> {
    options.validate()?;

    let query_vector = engine.embed_query(query).await?;
    ranker::rank(&query_vector, vectors, chunks, options)
}

/// Report what has been ingested for the workspace.
pub async fn stats(workspace: &Path, config: &KnowledgeConfig) -> AppResult<CorpusStats> {
    let stored_chunks = match LanceDbStore::open_existing(
        &config::get_index_path(workspace),
        &config.store.table,
    )
    .await
    {
        Ok(store) => Some(store.count().await?),
        Err(AppError::NotFound(_)) => None,
        Err(e) => return Err(e),
    };

    let cache = EmbeddingCache::new(config::get_cache_dir(workspace))
        .load()?
        .map(|c| c.summary());

    Ok(CorpusStats {
        data_dir: config.data_dir(workspace),
        stored_chunks,
        cache,
    })
}

/// Merge per-call overrides over the configured retrieval settings.
pub fn resolve_rank_options(config: &KnowledgeConfig, options: &SearchOptions) -> RankOptions {
    let mut phrases = config.retrieval.exclude_phrases.clone();
    phrases.extend(options.exclude_phrases.iter().cloned());

    RankOptions::new(options.top_k.unwrap_or(config.retrieval.top_k))
        .with_min_score(options.min_score.unwrap_or(config.retrieval.min_score))
        .with_exclude_phrases(phrases)
}

fn corpus_layout(config: &KnowledgeConfig) -> CorpusLayout {
    CorpusLayout {
        data_dir: config.data_dir.clone(),
        chunk_size: config.chunking.chunk_size,
        chunk_overlap: config.chunking.chunk_overlap,
    }
}

fn apply_layout(config: &KnowledgeConfig, layout: &CorpusLayout) -> KnowledgeConfig {
    let mut config = config.clone();
    config.data_dir = layout.data_dir.clone();
    config.chunking.chunk_size = layout.chunk_size;
    config.chunking.chunk_overlap = layout.chunk_overlap;
    config
}

fn load_corpus(
    workspace: &Path,
    config: &KnowledgeConfig,
) -> AppResult<(Vec<Document>, Vec<Chunk>)> {
    let documents =
        loader::load_documents_with_boilerplate(&config.data_dir(workspace), &config.boilerplate)?;
    let chunks = chunker::chunk_documents(
        &documents,
        config.chunking.chunk_size,
        config.chunking.chunk_overlap,
    )?;
    Ok((documents, chunks))
}

/// Open the store for writing. With `reset`, existing rows are removed and
/// an index built for another vector dimension is recreated.
async fn open_store_for_ingest(
    index_path: &Path,
    table: &str,
    embedding_dim: usize,
    reset: bool,
) -> AppResult<LanceDbStore> {
    match LanceDbStore::open(index_path, table, embedding_dim).await {
        Ok(store) => {
            if reset {
                store.reset().await?;
            }
            Ok(store)
        }
        Err(AppError::Alignment(message)) if reset => {
            tracing::warn!("{}; recreating index", message);
            std::fs::remove_dir_all(index_path)?;
            LanceDbStore::open(index_path, table, embedding_dim).await
        }
        Err(e) => Err(e),
    }
}
