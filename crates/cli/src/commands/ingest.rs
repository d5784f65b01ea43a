//! Ingest command handler.
//!
//! Loads, chunks and embeds the regulations corpus into a retrieval backend.

use crate::commands::{parse_backend, print_json};
use clap::Args;
use regula_core::{config::AppConfig, AppResult};
use regula_knowledge::{config::load_config, Backend, IngestOptions};
use std::path::PathBuf;

/// Build the retrieval index from the data directory
#[derive(Args, Debug)]
pub struct IngestCommand {
    /// Directory of .txt regulation files
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Chunk size in characters
    #[arg(long)]
    pub chunk_size: Option<usize>,

    /// Overlap between consecutive chunks in characters
    #[arg(long)]
    pub overlap: Option<usize>,

    /// Backend to write (store, cache)
    #[arg(long, value_parser = parse_backend)]
    pub backend: Option<Backend>,

    /// Clear existing rows before ingesting
    #[arg(long)]
    pub reset: bool,

    /// Recompute cached embeddings even if the cache is current
    #[arg(long)]
    pub force_recompute: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl IngestCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing ingest command");
        tracing::debug!("Ingest options: {:?}", self);

        let mut corpus = load_config(&config.workspace)?;
        if let Some(ref data_dir) = self.data_dir {
            corpus.data_dir = data_dir.clone();
        }
        if let Some(chunk_size) = self.chunk_size {
            corpus.chunking.chunk_size = chunk_size;
        }
        if let Some(overlap) = self.overlap {
            corpus.chunking.chunk_overlap = overlap;
        }

        let options = IngestOptions {
            backend: self.backend,
            reset: self.reset,
            force_recompute: self.force_recompute,
        };

        let stats = regula_knowledge::ingest(&config.workspace, &corpus, &options).await?;

        if self.json {
            print_json(&stats)?;
        } else {
            println!(
                "Ingested {} documents ({} chunks, {} bytes, dim {}) into {} in {:.2}s",
                stats.documents_count,
                stats.chunks_count,
                stats.bytes_processed,
                stats.embedding_dim,
                stats.backend,
                stats.duration_secs
            );
        }

        Ok(())
    }
}
