//! Prompt types.

use serde::{Deserialize, Serialize};

/// A prompt definition loaded from YAML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptDefinition {
    /// Unique prompt identifier
    pub id: String,

    /// Human-readable title
    pub title: String,

    /// API version for schema evolution
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// Instructions placed before the question; exposed as `{{rules}}`
    pub rules: String,

    /// Template string with Handlebars syntax.
    ///
    /// Available variables: `rules`, `question`, `context`.
    pub template: String,
}

/// One retrieved passage offered to the model, tagged with its citation token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextPassage {
    /// Token the model must cite, e.g. `chapter 3.txt::chunk_2`
    pub citation: String,

    /// Passage text
    pub text: String,
}

impl ContextPassage {
    pub fn new(citation: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            citation: citation.into(),
            text: text.into(),
        }
    }
}

/// A fully built prompt ready for generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuiltPrompt {
    /// Rendered prompt text
    pub text: String,

    /// Metadata about the built prompt
    pub metadata: BuiltPromptMetadata,
}

/// Metadata about a built prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuiltPromptMetadata {
    /// Source prompt ID
    #[serde(rename = "sourcePromptId")]
    pub source_prompt_id: String,

    /// Citation tokens offered to the model, in context order
    pub citations: Vec<String>,
}
