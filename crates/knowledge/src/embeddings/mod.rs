//! Embedding engine for the regulations corpus.
//!
//! Wraps a provider with batching, optional L2 normalization and a dimension
//! check on every returned vector.

pub mod config;
pub mod provider;
pub mod providers;

pub use config::EmbeddingConfig;
pub use provider::{create_provider, EmbeddingProvider};

use crate::ranker::l2_normalize;
use crate::types::Chunk;
use regula_core::{AppError, AppResult};
use std::sync::Arc;

/// Embedding engine shared by ingestion and query.
#[derive(Debug, Clone)]
pub struct EmbeddingEngine {
    provider: Arc<dyn EmbeddingProvider>,
    batch_size: usize,
    normalize: bool,
}

impl EmbeddingEngine {
    /// Build the engine and its provider from configuration.
    pub fn from_config(config: &EmbeddingConfig) -> AppResult<Self> {
        config.validate()?;
        let provider = create_provider(config)?;

        tracing::debug!(
            "Embedding engine: provider={}, model={}, dimensions={}, batch_size={}",
            provider.provider_name(),
            provider.model_name(),
            provider.dimensions(),
            config.batch_size
        );

        Ok(Self::with_provider(provider, config.batch_size, config.normalize))
    }

    /// Wrap an existing provider.
    pub fn with_provider(
        provider: Arc<dyn EmbeddingProvider>,
        batch_size: usize,
        normalize: bool,
    ) -> Self {
        Self {
            provider,
            batch_size: batch_size.max(1),
            normalize,
        }
    }

    pub fn provider_name(&self) -> &str {
        self.provider.provider_name()
    }

    pub fn model_name(&self) -> &str {
        self.provider.model_name()
    }

    pub fn dimensions(&self) -> usize {
        self.provider.dimensions()
    }

    /// Embed texts in batches, preserving input order.
    pub async fn embed_texts(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        tracing::info!(
            "Embedding {} texts using provider '{}' (model: {})",
            texts.len(),
            self.provider_name(),
            self.model_name()
        );

        let mut embeddings = Vec::with_capacity(texts.len());
        for (batch_idx, batch) in texts.chunks(self.batch_size).enumerate() {
            let vectors = self.provider.embed_batch(batch).await?;
            if vectors.len() != batch.len() {
                return Err(AppError::Alignment(format!(
                    "Batch {} returned {} embeddings for {} texts",
                    batch_idx,
                    vectors.len(),
                    batch.len()
                )));
            }

            for vector in vectors {
                embeddings.push(self.finish(vector)?);
            }

            tracing::debug!(
                "Embedded batch {} ({}/{})",
                batch_idx,
                embeddings.len(),
                texts.len()
            );
        }

        Ok(embeddings)
    }

    /// Embed chunk texts, one vector per chunk.
    pub async fn embed_chunks(&self, chunks: &[Chunk]) -> AppResult<Vec<Vec<f32>>> {
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        self.embed_texts(&texts).await
    }

    /// Embed a single query string.
    pub async fn embed_query(&self, query: &str) -> AppResult<Vec<f32>> {
        let vector = self.provider.embed(query).await?;
        self.finish(vector)
    }

    fn finish(&self, mut vector: Vec<f32>) -> AppResult<Vec<f32>> {
        if vector.len() != self.dimensions() {
            return Err(AppError::Alignment(format!(
                "Model '{}' returned a {}-dimensional vector, expected {}",
                self.model_name(),
                vector.len(),
                self.dimensions()
            )));
        }

        if self.normalize {
            l2_normalize(&mut vector);
        }
        Ok(vector)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Returns constant unnormalized vectors and counts calls.
    #[derive(Debug)]
    struct CountingProvider {
        dimensions: usize,
        output_dimensions: usize,
        calls: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl EmbeddingProvider for CountingProvider {
        fn provider_name(&self) -> &str {
            "counting"
        }

        fn model_name(&self) -> &str {
            "counting-v1"
        }

        fn dimensions(&self) -> usize {
            self.dimensions
        }

        async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(texts.iter().map(|_| vec![2.0; self.output_dimensions]).collect())
        }
    }

    fn counting(dimensions: usize, output_dimensions: usize) -> Arc<CountingProvider> {
        Arc::new(CountingProvider {
            dimensions,
            output_dimensions,
            calls: AtomicUsize::new(0),
        })
    }

    #[tokio::test]
    async fn test_batches_and_normalizes() {
        let provider = counting(4, 4);
        let engine = EmbeddingEngine::with_provider(provider.clone(), 2, true);

        let texts: Vec<String> = (0..5).map(|i| format!("text {}", i)).collect();
        let vectors = engine.embed_texts(&texts).await.unwrap();

        assert_eq!(vectors.len(), 5);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 3);
        let norm: f32 = vectors[0].iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_without_normalization() {
        let engine = EmbeddingEngine::with_provider(counting(2, 2), 8, false);
        let vector = engine.embed_query("q").await.unwrap();
        assert_eq!(vector, vec![2.0, 2.0]);
    }

    #[tokio::test]
    async fn test_dimension_mismatch() {
        let engine = EmbeddingEngine::with_provider(counting(4, 3), 8, true);
        assert!(matches!(
            engine.embed_query("q").await,
            Err(AppError::Alignment(_))
        ));
    }

    #[tokio::test]
    async fn test_trigram_engine_from_config() {
        let engine = EmbeddingEngine::from_config(&EmbeddingConfig::trigram(384)).unwrap();
        let chunks = vec![Chunk::new("a.txt", 0, "Pets must be leashed")];

        let vectors = engine.embed_chunks(&chunks).await.unwrap();
        assert_eq!(vectors.len(), 1);
        assert_eq!(vectors[0].len(), 384);
        assert_eq!(engine.model_name(), "trigram-v1");
    }

    #[tokio::test]
    async fn test_empty_input() {
        let engine = EmbeddingEngine::with_provider(counting(2, 2), 8, true);
        assert!(engine.embed_texts(&[]).await.unwrap().is_empty());
    }
}
