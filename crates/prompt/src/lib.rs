//! Grounded prompt system for Regula.
//!
//! This crate provides:
//! - YAML-based prompt definitions with a built-in grounded default
//! - Handlebars template rendering
//! - Context formatting with chunk-id citations

pub mod builder;
pub mod loader;
pub mod types;

// Re-export main types
pub use builder::{build_prompt, format_context};
pub use loader::{
    default_prompt, load_prompt, load_prompt_or_default, DEFAULT_PROMPT_ID, FALLBACK_ANSWER,
};
pub use types::{BuiltPrompt, BuiltPromptMetadata, ContextPassage, PromptDefinition};
