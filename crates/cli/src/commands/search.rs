//! Search command handler.

use crate::commands::{print_json, RetrievalArgs};
use clap::Args;
use regula_core::{config::AppConfig, AppResult};
use regula_knowledge::config::load_config;

/// Retrieve the regulation chunks most similar to a query
#[derive(Args, Debug)]
pub struct SearchCommand {
    #[command(flatten)]
    pub retrieval: RetrievalArgs,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl SearchCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing search command");

        let corpus = load_config(&config.workspace)?;
        let options = self.retrieval.search_options();
        let results = regula_knowledge::search(&config.workspace, &corpus, &options).await?;

        if self.json {
            return print_json(&results);
        }

        if results.is_empty() {
            println!("No matching chunks.");
            return Ok(());
        }

        for (rank, result) in results.iter().enumerate() {
            println!("{}. [{}] score {:.3}", rank + 1, result.chunk_id, result.score);
            println!("   {}", result.text.split_whitespace().collect::<Vec<_>>().join(" "));
        }

        Ok(())
    }
}
