//! Ask command handler.
//!
//! Answers a question from the retrieved regulation chunks.

use crate::commands::{print_json, RetrievalArgs};
use clap::Args;
use regula_core::{config::AppConfig, AppResult};
use regula_knowledge::config::load_config;
use regula_knowledge::rag::{self, AskOptions};

/// Ask a question about the regulations
#[derive(Args, Debug)]
pub struct AskCommand {
    #[command(flatten)]
    pub retrieval: RetrievalArgs,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl AskCommand {
    /// Execute the ask command.
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing ask command");
        tracing::debug!("Ask command options: {:?}", self);

        config.validate()?;
        let corpus = load_config(&config.workspace)?;

        let options = AskOptions {
            search: self.retrieval.search_options(),
            provider: config.provider.clone(),
            model: config.model.clone(),
            endpoint: config.endpoint.clone(),
        };

        let response = rag::ask(&config.workspace, &corpus, &options).await?;

        tracing::debug!(
            "RAG response: max_score={:.3}, sources_count={}",
            response.max_score,
            response.sources.len()
        );

        if self.json {
            return print_json(&response);
        }

        println!("Answer:");
        println!("{}", response.answer);
        println!();

        if response.sources.is_empty() {
            println!("Sources: (no sources available)");
        } else {
            println!("Sources:");
            for source in &response.sources {
                println!("- {} (score {:.3})", source.chunk_id, source.score);
            }
        }

        Ok(())
    }
}
