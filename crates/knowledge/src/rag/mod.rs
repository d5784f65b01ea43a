//! RAG (Retrieval-Augmented Generation) answering.
//!
//! Retrieves regulation chunks and asks a generation model to answer from
//! them, citing chunk ids.

pub mod ask;
pub mod types;

pub use ask::{answer_with_results, ask};
pub use types::{AskOptions, RagResponse, RagSourceRef};
