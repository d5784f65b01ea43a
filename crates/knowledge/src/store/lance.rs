//! LanceDB-backed vector store.

use super::{check_upsert, chunk_metadata, VectorStore};
use crate::assembly::{DistanceMetric, QueryResponse};
use crate::types::Chunk;
use arrow_array::{
    Array, FixedSizeListArray, Float32Array, RecordBatch, RecordBatchIterator, StringArray,
};
use arrow_schema::{DataType, Field, Schema, SchemaRef};
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{Connection, DistanceType, Table};
use regula_core::{AppError, AppResult};
use std::path::Path;
use std::sync::Arc;

const VECTOR_COLUMN: &str = "vector";
const DISTANCE_COLUMN: &str = "_distance";

/// LanceDB table of chunks keyed by chunk id.
///
/// Columns: `id`, `text`, `metadata` (JSON object with `source` and
/// `chunk_index`) and a fixed-size `vector`. Queries use cosine distance.
pub struct LanceDbStore {
    table: Table,
    embedding_dim: usize,
}

impl LanceDbStore {
    /// Create or open the table at `db_path`.
    ///
    /// # Arguments
    /// * `db_path` - Directory of the LanceDB database
    /// * `table_name` - Name of the chunks table
    /// * `embedding_dim` - Dimension of the embedding vectors
    ///
    /// Opening an existing table whose vectors have another dimension fails
    /// with an alignment error.
    pub async fn open(db_path: &Path, table_name: &str, embedding_dim: usize) -> AppResult<Self> {
        std::fs::create_dir_all(db_path).map_err(|e| {
            AppError::Store(format!(
                "Failed to create index directory {}: {}",
                db_path.display(),
                e
            ))
        })?;

        let conn = connect(db_path).await?;

        let table = if has_table(&conn, table_name).await? {
            let table = open_table(&conn, table_name).await?;
            let existing = vector_dim(&table).await?;
            if existing != embedding_dim {
                return Err(AppError::Alignment(format!(
                    "Index '{}' stores {}-dimensional vectors but the embedding model produces {}; re-run ingest with --reset",
                    table_name, existing, embedding_dim
                )));
            }
            table
        } else {
            let schema = Self::schema(embedding_dim);
            let empty_batch = RecordBatch::new_empty(schema.clone());

            conn.create_table(
                table_name,
                RecordBatchIterator::new(vec![Ok(empty_batch)], schema),
            )
            .execute()
            .await
            .map_err(|e| AppError::Store(format!("Failed to create table: {}", e)))?
        };

        tracing::debug!("Opened LanceDB store at {}", db_path.display());

        Ok(Self {
            table,
            embedding_dim,
        })
    }

    /// Open a table that must already exist, reading its vector dimension.
    pub async fn open_existing(db_path: &Path, table_name: &str) -> AppResult<Self> {
        if !db_path.exists() {
            return Err(AppError::NotFound(format!(
                "No index at {}; run `regula ingest` first",
                db_path.display()
            )));
        }

        let conn = connect(db_path).await?;
        if !has_table(&conn, table_name).await? {
            return Err(AppError::NotFound(format!(
                "Table '{}' not found in {}; run `regula ingest` first",
                table_name,
                db_path.display()
            )));
        }

        let table = open_table(&conn, table_name).await?;
        let embedding_dim = vector_dim(&table).await?;

        Ok(Self {
            table,
            embedding_dim,
        })
    }

    pub fn embedding_dim(&self) -> usize {
        self.embedding_dim
    }

    fn schema(embedding_dim: usize) -> SchemaRef {
        Arc::new(Schema::new(vec![
            Field::new("id", DataType::Utf8, false),
            Field::new("text", DataType::Utf8, true),
            Field::new("metadata", DataType::Utf8, true),
            Field::new(
                VECTOR_COLUMN,
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, true)),
                    embedding_dim as i32,
                ),
                false,
            ),
        ]))
    }

    /// Convert chunks and their vectors to one Arrow RecordBatch.
    fn chunks_to_batch(&self, chunks: &[Chunk], vectors: &[Vec<f32>]) -> AppResult<RecordBatch> {
        let schema = Self::schema(self.embedding_dim);

        let metadata = chunks
            .iter()
            .map(|c| serde_json::to_string(&chunk_metadata(c)))
            .collect::<Result<Vec<_>, _>>()?;

        let id_array = StringArray::from(chunks.iter().map(|c| c.chunk_id.as_str()).collect::<Vec<_>>());
        let text_array = StringArray::from(chunks.iter().map(|c| c.text.as_str()).collect::<Vec<_>>());
        let metadata_array = StringArray::from(metadata.iter().map(String::as_str).collect::<Vec<_>>());

        let values = Float32Array::from(vectors.iter().flatten().copied().collect::<Vec<f32>>());
        let vector_array = FixedSizeListArray::try_new(
            Arc::new(Field::new("item", DataType::Float32, true)),
            self.embedding_dim as i32,
            Arc::new(values),
            None,
        )
        .map_err(|e| AppError::Store(format!("Failed to build vector column: {}", e)))?;

        RecordBatch::try_new(
            schema,
            vec![
                Arc::new(id_array),
                Arc::new(text_array),
                Arc::new(metadata_array),
                Arc::new(vector_array),
            ],
        )
        .map_err(|e| AppError::Store(format!("Failed to create RecordBatch: {}", e)))
    }

    /// Append every row of a result batch to `response`.
    fn append_rows(batch: &RecordBatch, response: &mut QueryResponse) -> AppResult<()> {
        let ids = string_column(batch, "id")?;
        let texts = string_column(batch, "text")?;
        let metadata = string_column(batch, "metadata")?;
        let distances = batch
            .column_by_name(DISTANCE_COLUMN)
            .and_then(|c| c.as_any().downcast_ref::<Float32Array>())
            .ok_or_else(|| AppError::Store("Missing _distance column".to_string()))?;

        for row in 0..batch.num_rows() {
            let document = (!texts.is_null(row)).then(|| texts.value(row).to_string());
            let meta = if metadata.is_null(row) {
                None
            } else {
                match serde_json::from_str(metadata.value(row)) {
                    Ok(value) => Some(value),
                    Err(e) => {
                        tracing::warn!("Unreadable metadata for '{}': {}", ids.value(row), e);
                        None
                    }
                }
            };

            response.push(
                ids.value(row).to_string(),
                document,
                meta,
                distances.value(row),
            );
        }

        Ok(())
    }
}

#[async_trait::async_trait]
impl VectorStore for LanceDbStore {
    fn name(&self) -> &str {
        "lancedb"
    }

    fn metric(&self) -> DistanceMetric {
        DistanceMetric::Cosine
    }

    async fn upsert(&self, chunks: &[Chunk], vectors: &[Vec<f32>]) -> AppResult<()> {
        check_upsert(chunks, vectors, self.embedding_dim)?;
        if chunks.is_empty() {
            return Ok(());
        }

        let batch = self.chunks_to_batch(chunks, vectors)?;
        let schema = batch.schema();

        let mut merge = self.table.merge_insert(&["id"]);
        merge
            .when_matched_update_all(None)
            .when_not_matched_insert_all();
        merge
            .execute(Box::new(RecordBatchIterator::new(vec![Ok(batch)], schema)))
            .await
            .map_err(|e| AppError::Store(format!("Failed to upsert chunks: {}", e)))?;

        tracing::debug!("Upserted {} chunks into LanceDB", chunks.len());
        Ok(())
    }

    async fn query(&self, vector: &[f32], top_k: usize) -> AppResult<QueryResponse> {
        if vector.len() != self.embedding_dim {
            return Err(AppError::Alignment(format!(
                "Query vector has dimension {}, index stores {}",
                vector.len(),
                self.embedding_dim
            )));
        }

        let batches: Vec<RecordBatch> = self
            .table
            .query()
            .nearest_to(vector.to_vec())
            .map_err(|e| AppError::Store(format!("Failed to create query: {}", e)))?
            .distance_type(DistanceType::Cosine)
            .limit(top_k)
            .execute()
            .await
            .map_err(|e| AppError::Store(format!("Failed to execute search: {}", e)))?
            .try_collect()
            .await
            .map_err(|e| AppError::Store(format!("Failed to collect results: {}", e)))?;

        let mut response = QueryResponse::default();
        for batch in &batches {
            Self::append_rows(batch, &mut response)?;
        }

        tracing::debug!(
            "LanceDB returned {} rows (requested top-{})",
            response.len(),
            top_k
        );

        Ok(response)
    }

    async fn count(&self) -> AppResult<usize> {
        self.table
            .count_rows(None)
            .await
            .map_err(|e| AppError::Store(format!("Failed to count rows: {}", e)))
    }

    async fn reset(&self) -> AppResult<()> {
        if self.count().await? > 0 {
            self.table
                .delete("id IS NOT NULL")
                .await
                .map_err(|e| AppError::Store(format!("Failed to reset index: {}", e)))?;
        }

        tracing::info!("Reset LanceDB store");
        Ok(())
    }
}

async fn connect(db_path: &Path) -> AppResult<Connection> {
    let uri = db_path.to_string_lossy().to_string();
    lancedb::connect(&uri)
        .execute()
        .await
        .map_err(|e| AppError::Store(format!("Failed to connect to LanceDB: {}", e)))
}

async fn has_table(conn: &Connection, table_name: &str) -> AppResult<bool> {
    let names = conn
        .table_names()
        .execute()
        .await
        .map_err(|e| AppError::Store(format!("Failed to list tables: {}", e)))?;
    Ok(names.iter().any(|n| n == table_name))
}

async fn open_table(conn: &Connection, table_name: &str) -> AppResult<Table> {
    conn.open_table(table_name)
        .execute()
        .await
        .map_err(|e| AppError::Store(format!("Failed to open table '{}': {}", table_name, e)))
}

async fn vector_dim(table: &Table) -> AppResult<usize> {
    let schema = table
        .schema()
        .await
        .map_err(|e| AppError::Store(format!("Failed to read schema: {}", e)))?;

    match schema.field_with_name(VECTOR_COLUMN).map(|f| f.data_type()) {
        Ok(DataType::FixedSizeList(_, dim)) => Ok(*dim as usize),
        _ => Err(AppError::Store(format!(
            "Table has no fixed-size '{}' column",
            VECTOR_COLUMN
        ))),
    }
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> AppResult<&'a StringArray> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<StringArray>())
        .ok_or_else(|| AppError::Store(format!("Invalid {} column", name)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn chunks() -> Vec<Chunk> {
        vec![
            Chunk::new("a.txt", 0, "Pets must be leashed."),
            Chunk::new("a.txt", 1, "Parking spots are assigned."),
        ]
    }

    #[tokio::test]
    async fn test_upsert_and_query() {
        let temp = TempDir::new().unwrap();
        let store = LanceDbStore::open(&temp.path().join("index"), "condo_rules", 2)
            .await
            .unwrap();

        store
            .upsert(&chunks(), &[vec![1.0, 0.0], vec![0.0, 1.0]])
            .await
            .unwrap();
        assert_eq!(store.count().await.unwrap(), 2);

        let response = store.query(&[1.0, 0.0], 1).await.unwrap();
        assert_eq!(response.ids, vec!["a.txt::chunk_0"]);
        assert_eq!(response.documents[0].as_deref(), Some("Pets must be leashed."));
        assert!(response.distances[0].abs() < 1e-5);
    }

    #[tokio::test]
    async fn test_upsert_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let store = LanceDbStore::open(&temp.path().join("index"), "condo_rules", 2)
            .await
            .unwrap();

        let vectors = vec![vec![1.0, 0.0], vec![0.0, 1.0]];
        store.upsert(&chunks(), &vectors).await.unwrap();
        store.upsert(&chunks(), &vectors).await.unwrap();

        assert_eq!(store.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_reopen_reads_dimension() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("index");
        LanceDbStore::open(&path, "condo_rules", 3).await.unwrap();

        let store = LanceDbStore::open_existing(&path, "condo_rules").await.unwrap();
        assert_eq!(store.embedding_dim(), 3);

        assert!(matches!(
            LanceDbStore::open(&path, "condo_rules", 4).await,
            Err(AppError::Alignment(_))
        ));
    }

    #[tokio::test]
    async fn test_open_existing_missing() {
        let temp = TempDir::new().unwrap();
        assert!(matches!(
            LanceDbStore::open_existing(&temp.path().join("index"), "condo_rules").await,
            Err(AppError::NotFound(_))
        ));
    }
}
