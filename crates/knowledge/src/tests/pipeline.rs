//! End-to-end retrieval over a small regulations corpus.

use crate::cache::EmbeddingCache;
use crate::chunker::chunk_documents;
use crate::config::{get_cache_dir, KnowledgeConfig};
use crate::embeddings::{EmbeddingConfig, EmbeddingEngine};
use crate::loader::{load_documents, BOILERPLATE};
use crate::ranker::RankOptions;
use crate::store::{InMemoryStore, VectorStore};
use crate::types::{Backend, IngestOptions, SearchOptions};
use crate::{index_chunks, ingest, retrieve_from_cache, retrieve_from_store, search, stats};
use regula_core::AppError;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const DIM: usize = 256;

const PETS: &str = "Article 12. Dogs and cats living in the condominium must be carried \
or kept on a leash in hallways, elevators and gardens. Owners clean up after their dogs immediately.";

const PARKING: &str = "Article 20. Each apartment has one assigned parking space in the basement \
garage. Visitors park in the marked visitor bays near the entrance gate.";

const NOISE: &str = "Article 31. Quiet hours run from ten at night until seven in the morning. \
Loud music, drilling and parties are forbidden during quiet hours.";

#[cfg(test)]
mod tests {
    use super::*;

    fn write_corpus(data_dir: &Path) {
        fs::create_dir_all(data_dir).unwrap();
        fs::write(
            data_dir.join("chapter_1.txt"),
            format!("{}\n{}", BOILERPLATE, PETS),
        )
        .unwrap();
        fs::write(data_dir.join("chapter_2.txt"), PARKING).unwrap();
        fs::write(data_dir.join("chapter_3.txt"), NOISE).unwrap();
        fs::write(data_dir.join("notes.md"), "Not part of the corpus").unwrap();
    }

    /// Workspace with a corpus under `data/` and the offline embedder.
    fn workspace() -> (TempDir, KnowledgeConfig) {
        let temp = TempDir::new().unwrap();
        write_corpus(&temp.path().join("data"));

        let config = KnowledgeConfig {
            embedding: EmbeddingConfig::trigram(DIM),
            ..Default::default()
        };
        (temp, config)
    }

    fn engine() -> EmbeddingEngine {
        EmbeddingEngine::from_config(&EmbeddingConfig::trigram(DIM)).unwrap()
    }

    #[test]
    fn test_corpus_loading_and_chunking() {
        let (temp, _) = workspace();
        let documents = load_documents(&temp.path().join("data")).unwrap();

        assert_eq!(documents.len(), 3);
        assert!(!documents[0].text.contains("TRIVENTO"));

        let chunks = chunk_documents(&documents, 800, 100).unwrap();
        let ids: Vec<_> = chunks.iter().map(|c| c.chunk_id.as_str()).collect();
        assert_eq!(
            ids,
            vec![
                "chapter_1.txt::chunk_0",
                "chapter_2.txt::chunk_0",
                "chapter_3.txt::chunk_0"
            ]
        );
    }

    #[tokio::test]
    async fn test_store_retrieval_finds_relevant_chunk() {
        let (temp, _) = workspace();
        let documents = load_documents(&temp.path().join("data")).unwrap();
        let chunks = chunk_documents(&documents, 800, 100).unwrap();

        let engine = engine();
        let store = InMemoryStore::new(DIM);
        let indexed = index_chunks(&store, &engine, &chunks).await.unwrap();
        assert_eq!(indexed, 3);
        assert_eq!(store.count().await.unwrap(), 3);

        let results = retrieve_from_store(
            &store,
            &engine,
            "Do dogs need a leash?",
            &RankOptions::new(3),
        )
        .await
        .unwrap();

        assert!(!results.is_empty());
        assert_eq!(results[0].source, "chapter_1.txt");
        assert_eq!(results[0].chunk_index, 0);
        let distance = results[0].distance.unwrap();
        assert!((results[0].score - (1.0 - distance)).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_store_exclusions_overfetch() {
        let (temp, _) = workspace();
        let documents = load_documents(&temp.path().join("data")).unwrap();
        let chunks = chunk_documents(&documents, 800, 100).unwrap();

        let engine = engine();
        let store = InMemoryStore::new(DIM);
        index_chunks(&store, &engine, &chunks).await.unwrap();

        // The best match is excluded, so a one-result pool would come back empty
        let options = RankOptions::new(1)
            .with_min_score(-1.0)
            .with_exclude_phrases(vec!["LEASH".to_string()]);
        let results = retrieve_from_store(&store, &engine, "Do dogs need a leash?", &options)
            .await
            .unwrap();

        assert_eq!(results.len(), 1);
        assert_ne!(results[0].source, "chapter_1.txt");
    }

    #[tokio::test]
    async fn test_backends_agree_on_scores() {
        let (temp, _) = workspace();
        let documents = load_documents(&temp.path().join("data")).unwrap();
        let chunks = chunk_documents(&documents, 800, 100).unwrap();

        let engine = engine();
        let vectors = engine.embed_chunks(&chunks).await.unwrap();
        let store = InMemoryStore::new(DIM);
        store.upsert(&chunks, &vectors).await.unwrap();

        let options = RankOptions::new(3).with_min_score(-1.0);
        let query = "When are quiet hours?";
        let from_store = retrieve_from_store(&store, &engine, query, &options)
            .await
            .unwrap();
        let from_cache = retrieve_from_cache(&engine, &chunks, &vectors, query, &options)
            .await
            .unwrap();

        assert_eq!(from_store.len(), from_cache.len());
        assert_eq!(from_store[0].chunk_id, from_cache[0].chunk_id);
        assert_eq!(from_cache[0].source, "chapter_3.txt");
        for a in &from_store {
            let b = from_cache.iter().find(|b| b.chunk_id == a.chunk_id).unwrap();
            assert!((a.score - b.score).abs() < 1e-4);
        }
    }

    #[tokio::test]
    async fn test_cache_ingest_and_search() {
        let (temp, config) = workspace();
        let options = IngestOptions {
            backend: Some(Backend::Cache),
            ..Default::default()
        };

        let ingest_stats = ingest(temp.path(), &config, &options).await.unwrap();
        assert_eq!(ingest_stats.backend, Backend::Cache);
        assert_eq!(ingest_stats.documents_count, 3);
        assert_eq!(ingest_stats.chunks_count, 3);
        assert_eq!(ingest_stats.embedding_dim, DIM);

        let cache = EmbeddingCache::new(get_cache_dir(temp.path()));
        assert!(cache.exists());
        let first = cache.load().unwrap().unwrap();

        // Unchanged corpus reuses the cache
        ingest(temp.path(), &config, &options).await.unwrap();
        let second = cache.load().unwrap().unwrap();
        assert_eq!(first.meta.created_at, second.meta.created_at);

        let mut search_options = SearchOptions::new("Where do visitors park?");
        search_options.backend = Some(Backend::Cache);
        let results = search(temp.path(), &config, &search_options).await.unwrap();

        assert!(!results.is_empty());
        assert_eq!(results[0].chunk_id, "chapter_2.txt::chunk_0");
        assert!(results[0].distance.is_none());
    }

    #[tokio::test]
    async fn test_cache_search_rejects_drifted_corpus() {
        let (temp, config) = workspace();
        let options = IngestOptions {
            backend: Some(Backend::Cache),
            ..Default::default()
        };
        ingest(temp.path(), &config, &options).await.unwrap();

        fs::write(
            temp.path().join("data").join("chapter_4.txt"),
            "Article 40. Owners must pay the monthly administration fee before the fifth day of each month.",
        )
        .unwrap();

        let mut search_options = SearchOptions::new("When is the fee due?");
        search_options.backend = Some(Backend::Cache);
        let result = search(temp.path(), &config, &search_options).await;
        assert!(matches!(result, Err(AppError::Alignment(_))));
    }

    #[tokio::test]
    async fn test_cache_search_rejects_edited_chapter() {
        let (temp, config) = workspace();
        let options = IngestOptions {
            backend: Some(Backend::Cache),
            ..Default::default()
        };
        ingest(temp.path(), &config, &options).await.unwrap();

        // Same files and chunk ids, one word changed
        fs::write(
            temp.path().join("data").join("chapter_2.txt"),
            PARKING.replace("basement", "underground"),
        )
        .unwrap();

        let mut search_options = SearchOptions::new("Where do visitors park?");
        search_options.backend = Some(Backend::Cache);
        let result = search(temp.path(), &config, &search_options).await;
        assert!(matches!(result, Err(AppError::Alignment(_))));
    }

    #[tokio::test]
    async fn test_cache_search_uses_ingest_layout() {
        let (temp, config) = workspace();
        let regs = temp.path().join("regs");
        write_corpus(&regs);
        fs::write(regs.join("chapter_4.txt"), [PETS, PARKING, NOISE].join(" ")).unwrap();

        let mut ingest_config = config.clone();
        ingest_config.data_dir = PathBuf::from("regs");
        ingest_config.chunking.chunk_size = 120;
        ingest_config.chunking.chunk_overlap = 20;

        let options = IngestOptions {
            backend: Some(Backend::Cache),
            ..Default::default()
        };
        let ingest_stats = ingest(temp.path(), &ingest_config, &options).await.unwrap();
        assert_eq!(ingest_stats.chunks_count, 7);

        let cached = EmbeddingCache::new(get_cache_dir(temp.path()))
            .load()
            .unwrap()
            .unwrap();
        let layout = cached.meta.layout.unwrap();
        assert_eq!(layout.data_dir, PathBuf::from("regs"));
        assert_eq!((layout.chunk_size, layout.chunk_overlap), (120, 20));

        // Searching with the default data/ and 800-char windows still lines up
        let mut search_options = SearchOptions::new("Where do visitors park?");
        search_options.backend = Some(Backend::Cache);
        search_options.top_k = Some(10);
        search_options.min_score = Some(-1.0);
        let results = search(temp.path(), &config, &search_options).await.unwrap();

        assert_eq!(results.len(), 7);
        assert!(results
            .iter()
            .any(|r| r.chunk_id == "chapter_4.txt::chunk_3"));
    }

    #[tokio::test]
    async fn test_search_without_ingest() {
        let (temp, config) = workspace();

        let mut options = SearchOptions::new("Pets?");
        options.backend = Some(Backend::Cache);
        let result = search(temp.path(), &config, &options).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));

        options.backend = Some(Backend::Store);
        let result = search(temp.path(), &config, &options).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_invalid_top_k_rejected_before_io() {
        let (temp, config) = workspace();

        let mut options = SearchOptions::new("Pets?");
        options.top_k = Some(0);
        let result = search(temp.path(), &config, &options).await;
        assert!(matches!(result, Err(AppError::InvalidArgument(_))));
    }

    #[tokio::test]
    async fn test_ingest_missing_data_dir() {
        let temp = TempDir::new().unwrap();
        let config = KnowledgeConfig {
            embedding: EmbeddingConfig::trigram(DIM),
            ..Default::default()
        };

        let result = ingest(temp.path(), &config, &IngestOptions::default()).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_store_ingest_search_and_stats() {
        let (temp, config) = workspace();

        let empty = stats(temp.path(), &config).await.unwrap();
        assert_eq!(empty.stored_chunks, None);
        assert!(empty.cache.is_none());

        let ingest_stats = ingest(temp.path(), &config, &IngestOptions::default())
            .await
            .unwrap();
        assert_eq!(ingest_stats.backend, Backend::Store);

        // Re-ingesting the same corpus updates rows in place
        ingest(temp.path(), &config, &IngestOptions::default())
            .await
            .unwrap();

        let results = search(temp.path(), &config, &SearchOptions::new("Do dogs need a leash?"))
            .await
            .unwrap();
        assert_eq!(results[0].chunk_id, "chapter_1.txt::chunk_0");
        assert_eq!(results[0].source, "chapter_1.txt");

        let reported = stats(temp.path(), &config).await.unwrap();
        assert_eq!(reported.stored_chunks, Some(3));
        assert_eq!(reported.data_dir, temp.path().join("data"));
    }

    #[tokio::test]
    async fn test_reset_recreates_index_for_new_dimension() {
        let (temp, config) = workspace();
        ingest(temp.path(), &config, &IngestOptions::default())
            .await
            .unwrap();

        let resized = KnowledgeConfig {
            embedding: EmbeddingConfig::trigram(128),
            ..config.clone()
        };

        let result = ingest(temp.path(), &resized, &IngestOptions::default()).await;
        assert!(matches!(result, Err(AppError::Alignment(_))));

        let options = IngestOptions {
            reset: true,
            ..Default::default()
        };
        let ingest_stats = ingest(temp.path(), &resized, &options).await.unwrap();
        assert_eq!(ingest_stats.embedding_dim, 128);

        let reported = stats(temp.path(), &resized).await.unwrap();
        assert_eq!(reported.stored_chunks, Some(3));
    }
}
