//! RAG request and response types.

use crate::types::{RetrievalResult, SearchOptions};
use regula_prompt::FALLBACK_ANSWER;
use serde::{Deserialize, Serialize};

/// Maximum snippet length (in characters) for source references.
pub const MAX_SNIPPET_CHARS: usize = 150;

/// Options for answering a question.
#[derive(Debug, Clone)]
pub struct AskOptions {
    /// Retrieval options; `search.query` is the question
    pub search: SearchOptions,

    /// Generation provider (e.g., "ollama")
    pub provider: String,

    /// Generation model (e.g., "mistral:7b-instruct")
    pub model: String,

    /// Generation service base URL
    pub endpoint: String,
}

/// A retrieved chunk offered to the model as context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RagSourceRef {
    /// Citation token, e.g. "Condominium regulations - chapter 5.txt::chunk_2"
    pub chunk_id: String,

    /// Source document name
    pub source: String,

    /// Similarity score
    pub score: f32,

    /// Start of the chunk text, truncated to [`MAX_SNIPPET_CHARS`]
    pub snippet: String,
}

impl From<&RetrievalResult> for RagSourceRef {
    fn from(result: &RetrievalResult) -> Self {
        Self {
            chunk_id: result.chunk_id.clone(),
            source: result.source.clone(),
            score: result.score,
            snippet: snippet(&result.text),
        }
    }
}

fn snippet(text: &str) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= MAX_SNIPPET_CHARS {
        flat
    } else {
        let cut: String = flat.chars().take(MAX_SNIPPET_CHARS).collect();
        format!("{}...", cut.trim_end())
    }
}

/// Response from a RAG answering query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagResponse {
    /// Answer produced by the model, expected to cite chunk ids
    pub answer: String,

    /// Chunks the answer was grounded on, in ranking order
    pub sources: Vec<RagSourceRef>,

    /// Highest similarity among the sources
    #[serde(skip_serializing, default)]
    pub max_score: f32,
}

impl RagResponse {
    pub fn new(answer: String, results: &[RetrievalResult]) -> Self {
        Self {
            answer,
            sources: results.iter().map(RagSourceRef::from).collect(),
            max_score: results.first().map(|r| r.score).unwrap_or(0.0),
        }
    }

    /// Response used when retrieval found nothing to ground an answer on.
    pub fn no_information() -> Self {
        Self {
            answer: FALLBACK_ANSWER.to_string(),
            sources: Vec::new(),
            max_score: 0.0,
        }
    }
}
