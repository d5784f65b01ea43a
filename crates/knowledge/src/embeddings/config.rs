//! Embedding configuration.

use regula_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};

/// Default Ollama embedding model.
pub const DEFAULT_EMBEDDING_MODEL: &str = "nomic-embed-text";

/// Dimension of `nomic-embed-text` vectors.
pub const DEFAULT_DIMENSIONS: usize = 768;

/// Embedding configuration for the corpus.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmbeddingConfig {
    /// Provider name: "ollama" or "trigram"
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Model identifier (provider-specific)
    #[serde(default = "default_model")]
    pub model: String,

    /// Embedding service base URL
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Embedding vector dimensions
    #[serde(default = "default_dimensions")]
    pub dimensions: usize,

    /// Maximum number of texts per embedding request
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Whether to normalize embeddings to unit length
    #[serde(default = "default_normalize")]
    pub normalize: bool,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_provider() -> String {
    "ollama".to_string()
}

fn default_model() -> String {
    DEFAULT_EMBEDDING_MODEL.to_string()
}

fn default_endpoint() -> String {
    "http://localhost:11434".to_string()
}

fn default_dimensions() -> usize {
    DEFAULT_DIMENSIONS
}

fn default_batch_size() -> usize {
    32
}

fn default_normalize() -> bool {
    true
}

fn default_timeout_secs() -> u64 {
    180
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            endpoint: default_endpoint(),
            dimensions: default_dimensions(),
            batch_size: default_batch_size(),
            normalize: default_normalize(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl EmbeddingConfig {
    /// Offline configuration backed by the trigram provider.
    pub fn trigram(dimensions: usize) -> Self {
        Self {
            provider: "trigram".to_string(),
            model: "trigram-v1".to_string(),
            dimensions,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.dimensions == 0 {
            return Err(AppError::InvalidArgument(
                "embedding.dimensions must be greater than 0".to_string(),
            ));
        }

        if self.batch_size == 0 {
            return Err(AppError::InvalidArgument(
                "embedding.batch_size must be greater than 0".to_string(),
            ));
        }

        if self.model.trim().is_empty() {
            return Err(AppError::InvalidArgument(
                "embedding.model cannot be empty".to_string(),
            ));
        }

        Ok(())
    }
}
