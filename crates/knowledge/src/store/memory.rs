//! In-process vector store.
//!
//! Keeps records in insertion order and answers queries by brute-force
//! cosine distance. Used for tests and small offline corpora.

use super::{check_upsert, chunk_metadata, VectorStore};
use crate::assembly::{DistanceMetric, QueryResponse};
use crate::ranker::cosine_similarity;
use crate::types::Chunk;
use regula_core::{AppError, AppResult};
use serde_json::Value;
use std::cmp::Ordering;
use tokio::sync::RwLock;

#[derive(Debug, Clone)]
struct StoredRecord {
    id: String,
    text: String,
    metadata: Value,
    vector: Vec<f32>,
}

/// Vector store held entirely in memory.
#[derive(Debug)]
pub struct InMemoryStore {
    embedding_dim: usize,
    records: RwLock<Vec<StoredRecord>>,
}

impl InMemoryStore {
    pub fn new(embedding_dim: usize) -> Self {
        Self {
            embedding_dim,
            records: RwLock::new(Vec::new()),
        }
    }

    pub fn embedding_dim(&self) -> usize {
        self.embedding_dim
    }
}

#[async_trait::async_trait]
impl VectorStore for InMemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    fn metric(&self) -> DistanceMetric {
        DistanceMetric::Cosine
    }

    async fn upsert(&self, chunks: &[Chunk], vectors: &[Vec<f32>]) -> AppResult<()> {
        check_upsert(chunks, vectors, self.embedding_dim)?;

        let mut records = self.records.write().await;
        for (chunk, vector) in chunks.iter().zip(vectors) {
            let record = StoredRecord {
                id: chunk.chunk_id.clone(),
                text: chunk.text.clone(),
                metadata: chunk_metadata(chunk),
                vector: vector.clone(),
            };

            match records.iter_mut().find(|r| r.id == record.id) {
                Some(existing) => *existing = record,
                None => records.push(record),
            }
        }

        tracing::debug!("Upserted {} chunks into memory store", chunks.len());
        Ok(())
    }

    async fn query(&self, vector: &[f32], top_k: usize) -> AppResult<QueryResponse> {
        if vector.len() != self.embedding_dim {
            return Err(AppError::Alignment(format!(
                "Query vector has dimension {}, store expects {}",
                vector.len(),
                self.embedding_dim
            )));
        }

        let records = self.records.read().await;
        let mut scored: Vec<(&StoredRecord, f32)> = records
            .iter()
            .map(|r| (r, 1.0 - cosine_similarity(vector, &r.vector)))
            .collect();
        scored.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal));

        let mut response = QueryResponse::default();
        for (record, distance) in scored.into_iter().take(top_k) {
            response.push(
                record.id.clone(),
                Some(record.text.clone()),
                Some(record.metadata.clone()),
                distance,
            );
        }

        Ok(response)
    }

    async fn count(&self) -> AppResult<usize> {
        Ok(self.records.read().await.len())
    }

    async fn reset(&self) -> AppResult<()> {
        self.records.write().await.clear();
        Ok(())
    }
}
