//! Prompt builder for rendering templates and injecting retrieved context.

use crate::types::{BuiltPrompt, BuiltPromptMetadata, ContextPassage, PromptDefinition};
use handlebars::Handlebars;
use regula_core::{AppError, AppResult};
use std::collections::HashMap;

/// Build a grounded prompt from a definition, the user question and the
/// retrieved passages.
///
/// Passages are rendered in the order given, which is expected to be the
/// ranking order.
///
/// # Example
/// ```no_run
/// use regula_prompt::{build_prompt, default_prompt, ContextPassage};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let passages = vec![ContextPassage::new("chapter 3.txt::chunk_0", "Quiet hours are 10pm to 7am.")];
/// let built = build_prompt(&default_prompt(), "When are quiet hours?", &passages)?;
/// println!("{}", built.text);
/// # Ok(())
/// # }
/// ```
pub fn build_prompt(
    definition: &PromptDefinition,
    question: &str,
    passages: &[ContextPassage],
) -> AppResult<BuiltPrompt> {
    tracing::debug!(
        "Building prompt '{}' with {} passages",
        definition.id,
        passages.len()
    );

    let mut variables = HashMap::new();
    variables.insert("rules".to_string(), definition.rules.clone());
    variables.insert("question".to_string(), question.to_string());
    variables.insert("context".to_string(), format_context(passages));

    let text = render_template(&definition.template, &variables)?;

    Ok(BuiltPrompt {
        text,
        metadata: BuiltPromptMetadata {
            source_prompt_id: definition.id.clone(),
            citations: passages.iter().map(|p| p.citation.clone()).collect(),
        },
    })
}

/// Format passages as `[citation] text` blocks separated by blank lines.
///
/// Newlines inside a passage are flattened to spaces so each block stays on
/// one line next to its citation.
pub fn format_context(passages: &[ContextPassage]) -> String {
    passages
        .iter()
        .map(|p| format!("[{}] {}", p.citation, p.text.trim().replace('\n', " ")))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Render a Handlebars template with variables.
fn render_template(template: &str, variables: &HashMap<String, String>) -> AppResult<String> {
    let mut handlebars = Handlebars::new();

    // Regulation text is plain text; HTML escaping would mangle quotes
    handlebars.register_escape_fn(handlebars::no_escape);

    handlebars
        .register_template_string("prompt", template)
        .map_err(|e| AppError::Prompt(format!("Failed to register template: {}", e)))?;

    handlebars
        .render("prompt", variables)
        .map_err(|e| AppError::Prompt(format!("Failed to render template: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::default_prompt;

    #[test]
    fn test_format_context_flattens_newlines() {
        let passages = vec![
            ContextPassage::new("a.txt::chunk_0", "Pets must be\nleashed."),
            ContextPassage::new("b.txt::chunk_3", "  Parking is assigned.  "),
        ];

        assert_eq!(
            format_context(&passages),
            "[a.txt::chunk_0] Pets must be leashed.\n\n[b.txt::chunk_3] Parking is assigned."
        );
    }

    #[test]
    fn test_build_default_prompt_sections() {
        let passages = vec![ContextPassage::new(
            "chapter 5.txt::chunk_2",
            "Noise is prohibited after 10pm.",
        )];

        let built = build_prompt(&default_prompt(), "Can I play music at night?", &passages)
            .unwrap();

        let question_at = built.text.find("QUESTION:\nCan I play music at night?").unwrap();
        let context_at = built
            .text
            .find("CONTEXT:\n[chapter 5.txt::chunk_2] Noise is prohibited after 10pm.")
            .unwrap();
        assert!(built.text.starts_with("You are a helpful assistant"));
        assert!(question_at < context_at);
        assert!(built.text.ends_with("ANSWER:\n"));
        assert_eq!(built.metadata.citations, vec!["chapter 5.txt::chunk_2"]);
    }

    #[test]
    fn test_quotes_not_escaped() {
        let mut def = default_prompt();
        def.template = "{{context}}".to_string();
        let passages = vec![ContextPassage::new("x::chunk_0", "the \"Board\" & owners")];

        let built = build_prompt(&def, "q", &passages).unwrap();
        assert_eq!(built.text, "[x::chunk_0] the \"Board\" & owners");
    }

    #[test]
    fn test_empty_context_renders() {
        let built = build_prompt(&default_prompt(), "Anything?", &[]).unwrap();
        assert!(built.text.contains("CONTEXT:\n\n\nANSWER:"));
        assert!(built.metadata.citations.is_empty());
    }

    #[test]
    fn test_invalid_template() {
        let mut def = default_prompt();
        def.template = "{{#if}}broken".to_string();
        assert!(matches!(
            build_prompt(&def, "q", &[]),
            Err(AppError::Prompt(_))
        ));
    }
}
