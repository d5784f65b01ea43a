//! Ollama Embedding Provider
//!
//! Provides semantic embeddings via Ollama's local API using models like nomic-embed-text.
//!
//! # Features
//! - Neural semantic embeddings (768-dim by default)
//! - Local-first (no API costs, privacy-preserving)
//! - One request per batch through `/api/embed`
//!
//! Failures are reported as [`AppError::Provider`] and never retried.
//!
//! # Example
//! ```no_run
//! use regula_knowledge::embeddings::{EmbeddingConfig, EmbeddingProvider};
//! use regula_knowledge::embeddings::providers::ollama::OllamaEmbeddingProvider;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let provider = OllamaEmbeddingProvider::new(&EmbeddingConfig::default());
//! let embedding = provider.embed("Pets must be leashed").await?;
//! assert_eq!(embedding.len(), 768);
//! # Ok(())
//! # }
//! ```

use crate::embeddings::EmbeddingConfig;
use crate::embeddings::EmbeddingProvider;
use async_trait::async_trait;
use regula_core::{AppError, AppResult};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};

const EMBED_ENDPOINT: &str = "/api/embed";

/// Ollama embedding provider using local API
#[derive(Debug, Clone)]
pub struct OllamaEmbeddingProvider {
    /// HTTP client for API requests
    client: Client,
    /// Ollama API base URL
    base_url: String,
    /// Model name (e.g., "nomic-embed-text")
    model: String,
    /// Expected embedding dimensions
    dimensions: usize,
}

/// Request payload for Ollama embed API
#[derive(Debug, Clone, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

/// Response from Ollama embed API
#[derive(Debug, Clone, Deserialize)]
struct EmbedResponse {
    #[serde(default)]
    embeddings: Vec<Vec<f32>>,
}

/// Error response from Ollama API
#[derive(Debug, Clone, Deserialize)]
struct ErrorResponse {
    error: String,
}

impl OllamaEmbeddingProvider {
    /// Create a provider from configuration. No request is made until the
    /// first embedding call.
    pub fn new(config: &EmbeddingConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!("Falling back to default HTTP client: {}", e);
                Client::new()
            });

        Self {
            client,
            base_url: config.endpoint.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            dimensions: config.dimensions,
        }
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbeddingProvider {
    fn provider_name(&self) -> &str {
        "ollama"
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    #[instrument(skip(self, texts), fields(batch_size = texts.len(), model = %self.model))]
    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        let url = format!("{}{}", self.base_url, EMBED_ENDPOINT);
        let request = EmbedRequest {
            model: &self.model,
            input: texts,
        };

        debug!("Sending embedding request to {}", url);

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                AppError::provider_transport(format!(
                    "Failed to reach Ollama at {}: {}",
                    self.base_url, e
                ))
            })?;

        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());

            let message = serde_json::from_str::<ErrorResponse>(&error_text)
                .map(|r| r.error)
                .unwrap_or(error_text);

            return Err(AppError::provider_status(
                status.as_u16(),
                format!("Ollama embed failed for model '{}': {}", self.model, message),
            ));
        }

        let body: EmbedResponse = response.json().await.map_err(|e| {
            AppError::provider_status(
                status.as_u16(),
                format!("Failed to parse Ollama embed response: {}", e),
            )
        })?;

        if body.embeddings.len() != texts.len() {
            return Err(AppError::provider_status(
                status.as_u16(),
                format!(
                    "Ollama returned {} embeddings for {} inputs",
                    body.embeddings.len(),
                    texts.len()
                ),
            ));
        }

        debug!("Received {} embeddings", body.embeddings.len());

        Ok(body.embeddings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_shape() {
        let input = vec!["a".to_string(), "b".to_string()];
        let request = EmbedRequest {
            model: "nomic-embed-text",
            input: &input,
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "nomic-embed-text");
        assert_eq!(json["input"], serde_json::json!(["a", "b"]));
    }

    #[test]
    fn test_response_parsing() {
        let body: EmbedResponse =
            serde_json::from_str(r#"{"model":"m","embeddings":[[0.1,0.2],[0.3,0.4]]}"#).unwrap();
        assert_eq!(body.embeddings.len(), 2);
        assert_eq!(body.embeddings[1], vec![0.3, 0.4]);
    }

    #[test]
    fn test_trailing_slash_trimmed() {
        let config = EmbeddingConfig {
            endpoint: "http://localhost:11434/".to_string(),
            ..Default::default()
        };
        let provider = OllamaEmbeddingProvider::new(&config);
        assert_eq!(provider.base_url, "http://localhost:11434");
    }

    #[tokio::test]
    async fn test_empty_batch_makes_no_request() {
        let config = EmbeddingConfig {
            endpoint: "http://127.0.0.1:9".to_string(),
            ..Default::default()
        };
        let provider = OllamaEmbeddingProvider::new(&config);
        assert!(provider.embed_batch(&[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_transport_error() {
        let config = EmbeddingConfig {
            endpoint: "http://127.0.0.1:9".to_string(),
            timeout_secs: 1,
            ..Default::default()
        };
        let provider = OllamaEmbeddingProvider::new(&config);

        let result = provider.embed("Pets must be leashed").await;
        assert!(matches!(
            result,
            Err(AppError::Provider { status: None, .. })
        ));
    }
}
