//! Command handlers for the regula CLI.
//!
//! This module organizes all CLI commands into separate submodules.

pub mod ask;
pub mod ingest;
pub mod search;
pub mod stats;

// Re-export command types for convenience
pub use ask::AskCommand;
pub use ingest::IngestCommand;
pub use search::SearchCommand;
pub use stats::StatsCommand;

use clap::Args;
use regula_core::{AppError, AppResult};
use regula_knowledge::{Backend, SearchOptions};
use serde::Serialize;

/// Retrieval flags shared by `search` and `ask`.
#[derive(Args, Debug, Clone)]
pub struct RetrievalArgs {
    /// Question or search text
    pub query: String,

    /// Number of chunks to retrieve
    #[arg(short = 'k', long)]
    pub top_k: Option<usize>,

    /// Minimum similarity score
    #[arg(long)]
    pub min_score: Option<f32>,

    /// Drop chunks containing this phrase (repeatable)
    #[arg(long = "exclude", value_name = "PHRASE")]
    pub exclude: Vec<String>,

    /// Retrieval backend (store, cache)
    #[arg(long, value_parser = parse_backend)]
    pub backend: Option<Backend>,
}

impl RetrievalArgs {
    pub fn search_options(&self) -> SearchOptions {
        SearchOptions {
            query: self.query.clone(),
            top_k: self.top_k,
            min_score: self.min_score,
            exclude_phrases: self.exclude.clone(),
            backend: self.backend,
        }
    }
}

pub fn parse_backend(value: &str) -> Result<Backend, String> {
    Backend::parse(value).ok_or_else(|| format!("unknown backend '{}' (expected store or cache)", value))
}

pub fn print_json<T: Serialize>(value: &T) -> AppResult<()> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| AppError::Serialization(e.to_string()))?;
    println!("{}", json);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_backend() {
        assert_eq!(parse_backend("cache"), Ok(Backend::Cache));
        assert_eq!(parse_backend("lancedb"), Ok(Backend::Store));
        assert!(parse_backend("sqlite").is_err());
    }
}
