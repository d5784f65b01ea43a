//! Corpus configuration management.
//!
//! The corpus is configured by `.regula/knowledge.yaml` in the workspace.
//! Every section is optional; missing values take their defaults.

use crate::chunker::{validate_window, DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE};
use crate::embeddings::EmbeddingConfig;
use crate::loader::BOILERPLATE;
use crate::ranker::{RankOptions, DEFAULT_TOP_K};
use crate::types::Backend;
use regula_core::config::STATE_DIR;
use regula_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const CONFIG_FILE: &str = "knowledge.yaml";
const INDEX_DIR: &str = "index";
const CACHE_DIR: &str = "cache";

/// Default LanceDB table name.
pub const DEFAULT_TABLE: &str = "condo_rules";

/// Corpus configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeConfig {
    /// Directory of `.txt` regulation files, relative to the workspace
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Header strings removed from every document
    #[serde(default = "default_boilerplate")]
    pub boilerplate: Vec<String>,

    #[serde(default)]
    pub chunking: ChunkingConfig,

    #[serde(default)]
    pub embedding: EmbeddingConfig,

    #[serde(default)]
    pub retrieval: RetrievalConfig,

    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub generation: GenerationConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalConfig {
    #[serde(default)]
    pub backend: Backend,

    #[serde(default = "default_top_k")]
    pub top_k: usize,

    #[serde(default)]
    pub min_score: f32,

    /// Results containing any of these phrases are dropped
    #[serde(default)]
    pub exclude_phrases: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_table")]
    pub table: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationConfig {
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_generation_timeout")]
    pub timeout_secs: u64,

    /// Cap on generated tokens; the model default applies when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Custom prompt definition (YAML), relative to the workspace
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_file: Option<PathBuf>,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_boilerplate() -> Vec<String> {
    vec![BOILERPLATE.to_string()]
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

fn default_chunk_overlap() -> usize {
    DEFAULT_CHUNK_OVERLAP
}

fn default_top_k() -> usize {
    DEFAULT_TOP_K
}

fn default_table() -> String {
    DEFAULT_TABLE.to_string()
}

fn default_temperature() -> f32 {
    0.2
}

fn default_generation_timeout() -> u64 {
    180
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            boilerplate: default_boilerplate(),
            chunking: ChunkingConfig::default(),
            embedding: EmbeddingConfig::default(),
            retrieval: RetrievalConfig::default(),
            store: StoreConfig::default(),
            generation: GenerationConfig::default(),
        }
    }
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            backend: Backend::default(),
            top_k: default_top_k(),
            min_score: 0.0,
            exclude_phrases: Vec::new(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            table: default_table(),
        }
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            temperature: default_temperature(),
            timeout_secs: default_generation_timeout(),
            max_tokens: None,
            prompt_file: None,
        }
    }
}

impl KnowledgeConfig {
    /// Check every value that would otherwise fail deep inside a pipeline.
    pub fn validate(&self) -> AppResult<()> {
        validate_window(self.chunking.chunk_size, self.chunking.chunk_overlap)?;
        self.embedding.validate()?;
        self.rank_options().validate()?;

        if self.store.table.trim().is_empty() {
            return Err(AppError::InvalidArgument(
                "store.table cannot be empty".to_string(),
            ));
        }

        if !(0.0..=2.0).contains(&self.generation.temperature) {
            return Err(AppError::InvalidArgument(format!(
                "generation.temperature must be between 0.0 and 2.0, got {}",
                self.generation.temperature
            )));
        }

        Ok(())
    }

    /// Ranking options from the retrieval section.
    pub fn rank_options(&self) -> RankOptions {
        RankOptions::new(self.retrieval.top_k)
            .with_min_score(self.retrieval.min_score)
            .with_exclude_phrases(self.retrieval.exclude_phrases.clone())
    }

    /// Data directory resolved against the workspace.
    pub fn data_dir(&self, workspace: &Path) -> PathBuf {
        resolve(workspace, &self.data_dir)
    }

    /// Prompt file resolved against the workspace, if configured.
    pub fn prompt_file(&self, workspace: &Path) -> Option<PathBuf> {
        self.generation
            .prompt_file
            .as_ref()
            .map(|p| resolve(workspace, p))
    }
}

fn resolve(workspace: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        workspace.join(path)
    }
}

/// Load corpus configuration.
///
/// Loads from `.regula/knowledge.yaml` if it exists, otherwise returns the
/// defaults. The result is validated either way.
pub fn load_config(workspace: &Path) -> AppResult<KnowledgeConfig> {
    let config_path = get_config_path(workspace);

    let config = if config_path.exists() {
        let content = fs::read_to_string(&config_path).map_err(|e| {
            AppError::Config(format!("Failed to read config at {:?}: {}", config_path, e))
        })?;

        let config: KnowledgeConfig = serde_yaml::from_str(&content).map_err(|e| {
            AppError::Config(format!("Failed to parse config at {:?}: {}", config_path, e))
        })?;

        tracing::debug!("Loaded corpus config from {:?}", config_path);
        config
    } else {
        tracing::debug!("Using default corpus config (no config file found)");
        KnowledgeConfig::default()
    };

    config.validate()?;
    Ok(config)
}

/// Save corpus configuration.
pub fn save_config(workspace: &Path, config: &KnowledgeConfig) -> AppResult<()> {
    let config_path = get_config_path(workspace);

    if let Some(parent) = config_path.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            AppError::Config(format!("Failed to create config directory: {}", e))
        })?;
    }

    let yaml = serde_yaml::to_string(config)?;

    fs::write(&config_path, yaml).map_err(|e| {
        AppError::Config(format!("Failed to write config to {:?}: {}", config_path, e))
    })?;

    tracing::debug!("Saved corpus config to {:?}", config_path);
    Ok(())
}

/// Get the workspace state directory.
pub fn get_state_dir(workspace: &Path) -> PathBuf {
    workspace.join(STATE_DIR)
}

/// Get the path to the corpus config file.
pub fn get_config_path(workspace: &Path) -> PathBuf {
    get_state_dir(workspace).join(CONFIG_FILE)
}

/// Get the LanceDB index directory.
pub fn get_index_path(workspace: &Path) -> PathBuf {
    get_state_dir(workspace).join(INDEX_DIR)
}

/// Get the embedding cache directory.
pub fn get_cache_dir(workspace: &Path) -> PathBuf {
    get_state_dir(workspace).join(CACHE_DIR)
}
