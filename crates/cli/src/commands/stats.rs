//! Stats command handler.

use crate::commands::print_json;
use clap::Args;
use regula_core::{config::AppConfig, AppResult};
use regula_knowledge::config::load_config;

/// Show what has been ingested
#[derive(Args, Debug)]
pub struct StatsCommand {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl StatsCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing stats command");

        let corpus = load_config(&config.workspace)?;
        let stats = regula_knowledge::stats(&config.workspace, &corpus).await?;

        if self.json {
            return print_json(&stats);
        }

        println!("Data directory: {}", stats.data_dir.display());
        match stats.stored_chunks {
            Some(count) => println!("  Store: {} chunks (table '{}')", count, corpus.store.table),
            None => println!("  Store: (not ingested)"),
        }
        match stats.cache {
            Some(cache) => {
                println!(
                    "  Cache: {} chunks, dim {}, model {}",
                    cache.chunks_count, cache.embedding_dim, cache.model_name
                );
                if let Some(created_at) = cache.created_at {
                    println!("  Cache built: {}", created_at);
                }
            }
            None => println!("  Cache: (not ingested)"),
        }

        Ok(())
    }
}
