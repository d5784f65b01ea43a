//! Conversion of raw vector store responses into retrieval results.
//!
//! Stores answer with parallel lists (ids, documents, metadata, distances)
//! aligned by position. This is the single place where those lists are
//! validated, metadata fields are coerced, and distances become similarities.

use crate::types::RetrievalResult;
use regula_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Chunk index reported when the store record has none.
pub const MISSING_CHUNK_INDEX: i64 = -1;

/// Distance function used by a store. Lower distance means closer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    /// `1 - cosine_similarity`
    Cosine,
    /// Euclidean distance
    L2,
}

impl DistanceMetric {
    /// Map a distance onto the similarity scale used for ranking.
    ///
    /// Cosine distance maps back to cosine similarity, so a `min_score`
    /// threshold means the same thing for both backends. L2 is negated.
    pub fn to_similarity(self, distance: f32) -> f32 {
        match self {
            Self::Cosine => 1.0 - distance,
            Self::L2 => -distance,
        }
    }
}

/// Raw result of one store query, aligned by position.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse {
    #[serde(default)]
    pub ids: Vec<String>,

    /// Stored text; entries may be missing or null
    #[serde(default)]
    pub documents: Vec<Option<String>>,

    /// Stored metadata objects; entries may be missing, null or malformed
    #[serde(default)]
    pub metadatas: Vec<Option<Value>>,

    #[serde(default)]
    pub distances: Vec<f32>,
}

impl QueryResponse {
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Append one aligned row.
    pub fn push(&mut self, id: String, document: Option<String>, metadata: Option<Value>, distance: f32) {
        self.ids.push(id);
        self.documents.push(document);
        self.metadatas.push(metadata);
        self.distances.push(distance);
    }
}

/// Typed view of a record's metadata after lenient coercion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordMetadata {
    pub source: String,
    pub chunk_index: i64,
}

impl Default for RecordMetadata {
    fn default() -> Self {
        Self {
            source: String::new(),
            chunk_index: MISSING_CHUNK_INDEX,
        }
    }
}

impl RecordMetadata {
    /// Read `source` and `chunk_index` from a metadata object.
    ///
    /// Missing or unusable fields fall back to the defaults; this never fails.
    pub fn from_value(value: Option<&Value>) -> Self {
        let Some(Value::Object(map)) = value else {
            return Self::default();
        };

        let source = match map.get("source") {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => String::new(),
        };

        let chunk_index = map
            .get("chunk_index")
            .and_then(coerce_index)
            .unwrap_or(MISSING_CHUNK_INDEX);

        Self {
            source,
            chunk_index,
        }
    }
}

/// Accept integers, integral floats and numeric strings.
fn coerce_index(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>().ok().or_else(|| {
                s.parse::<f64>()
                    .ok()
                    .filter(|f| f.is_finite())
                    .map(|f| f.trunc() as i64)
            })
        }
        _ => None,
    }
}

/// Turn a store response into results in the store's order.
///
/// Fails when ids and distances are not the same length. Missing documents
/// become empty text and missing metadata uses [`RecordMetadata::default`].
pub fn assemble_results(
    response: QueryResponse,
    metric: DistanceMetric,
) -> AppResult<Vec<RetrievalResult>> {
    if response.distances.len() != response.ids.len() {
        return Err(AppError::Alignment(format!(
            "Store returned {} ids but {} distances",
            response.ids.len(),
            response.distances.len()
        )));
    }

    let QueryResponse {
        ids,
        documents,
        metadatas,
        distances,
    } = response;

    let mut documents = documents.into_iter();
    let mut metadatas = metadatas.into_iter();

    let results = ids
        .into_iter()
        .zip(distances)
        .map(|(chunk_id, distance)| {
            let text = documents.next().flatten().unwrap_or_default();
            let metadata = metadatas.next().flatten();
            let metadata = RecordMetadata::from_value(metadata.as_ref());

            if metadata.chunk_index == MISSING_CHUNK_INDEX {
                tracing::warn!("Record '{}' has no usable chunk_index", chunk_id);
            }

            RetrievalResult {
                chunk_id,
                source: metadata.source,
                chunk_index: metadata.chunk_index,
                text,
                score: metric.to_similarity(distance),
                distance: Some(distance),
            }
        })
        .collect();

    Ok(results)
}
