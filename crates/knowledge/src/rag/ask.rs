//! RAG answering orchestration.
//!
//! Retrieves relevant chunks and asks the generation model for an answer
//! grounded on them.

use crate::config::{GenerationConfig, KnowledgeConfig};
use crate::rag::types::{AskOptions, RagResponse};
use crate::types::RetrievalResult;
use regula_core::AppResult;
use regula_llm::{create_client, LlmClient, LlmRequest};
use regula_prompt::{build_prompt, load_prompt_or_default, ContextPassage, PromptDefinition};
use std::path::Path;
use std::time::Duration;

/// Answer a question over the workspace corpus.
///
/// This function:
/// 1. Retrieves ranked chunks with [`crate::search`]
/// 2. Returns the fallback answer without calling the model when nothing was retrieved
/// 3. Builds the grounded prompt from the configured (or built-in) definition
/// 4. Generates the answer
pub async fn ask(
    workspace: &Path,
    config: &KnowledgeConfig,
    options: &AskOptions,
) -> AppResult<RagResponse> {
    tracing::info!("RAG answering for query: {}", options.search.query);

    let results = crate::search(workspace, config, &options.search).await?;

    let definition = load_prompt_or_default(config.prompt_file(workspace).as_deref())?;
    let client = create_client(
        &options.provider,
        Some(&options.endpoint),
        Some(Duration::from_secs(config.generation.timeout_secs)),
    )?;

    answer_with_results(
        client.as_ref(),
        &definition,
        &options.model,
        &config.generation,
        &options.search.query,
        &results,
    )
    .await
}

/// Generate an answer from already retrieved results.
pub async fn answer_with_results(
    client: &dyn LlmClient,
    definition: &PromptDefinition,
    model: &str,
    generation: &GenerationConfig,
    question: &str,
    results: &[RetrievalResult],
) -> AppResult<RagResponse> {
    if results.is_empty() {
        tracing::info!("No chunks retrieved; returning fallback answer");
        return Ok(RagResponse::no_information());
    }

    let passages: Vec<ContextPassage> = results
        .iter()
        .map(|r| ContextPassage::new(r.chunk_id.as_str(), r.text.as_str()))
        .collect();

    let prompt = build_prompt(definition, question, &passages)?;

    tracing::debug!(
        "Generating answer with {} (model: {}, {} passages, max score: {:.3})",
        client.provider_name(),
        model,
        passages.len(),
        results[0].score
    );

    let mut request = LlmRequest::new(prompt.text, model).with_temperature(generation.temperature);
    if let Some(max_tokens) = generation.max_tokens {
        request = request.with_max_tokens(max_tokens);
    }
    let response = client.complete(&request).await?;

    Ok(RagResponse::new(response.content, results))
}
