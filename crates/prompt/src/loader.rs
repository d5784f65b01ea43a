//! Prompt loader for YAML prompt definitions.

use crate::types::PromptDefinition;
use regula_core::{AppError, AppResult};
use std::path::Path;

/// Identifier of the built-in grounded answering prompt.
pub const DEFAULT_PROMPT_ID: &str = "regula.answer.grounded";

/// Answer the model must give when the context does not cover the question.
pub const FALLBACK_ANSWER: &str = "I don't know based on the provided regulations.";

const DEFAULT_TEMPLATE: &str =
    "{{rules}}\nQUESTION:\n{{question}}\n\nCONTEXT:\n{{context}}\n\nANSWER:\n";

/// The built-in grounded prompt: answer only from context, cite every rule.
pub fn default_prompt() -> PromptDefinition {
    let rules = format!(
        "You are a helpful assistant answering questions about condominium regulations.\n\
         Use ONLY the provided CONTEXT to answer.\n\
         If the answer is not in the CONTEXT, say: \"{}\"\n\
         ALWAYS include citations.\n\
         Every sentence that states a rule, time window, restriction, fine, or requirement MUST end with a citation\n\
         in square brackets using the chunk_id, e.g. [Condominium regulations - chapter 5.txt::chunk_2].\n\
         Be concise and factual.\n",
        FALLBACK_ANSWER
    );

    PromptDefinition {
        id: DEFAULT_PROMPT_ID.to_string(),
        title: "Grounded answer with chunk citations".to_string(),
        api_version: "1.0".to_string(),
        rules,
        template: DEFAULT_TEMPLATE.to_string(),
    }
}

/// Load a prompt definition from a YAML file.
///
/// # Example
/// ```no_run
/// use regula_prompt::load_prompt;
/// use std::path::Path;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let prompt = load_prompt(Path::new(".regula/prompts/grounded.yml"))?;
/// println!("Loaded prompt: {}", prompt.title);
/// # Ok(())
/// # }
/// ```
pub fn load_prompt(path: &Path) -> AppResult<PromptDefinition> {
    tracing::debug!("Loading prompt from: {:?}", path);

    if !path.exists() {
        return Err(AppError::Prompt(format!("Prompt file not found: {:?}", path)));
    }

    let contents = std::fs::read_to_string(path).map_err(|e| {
        AppError::Prompt(format!("Failed to read prompt file {:?}: {}", path, e))
    })?;

    let definition: PromptDefinition = serde_yaml::from_str(&contents).map_err(|e| {
        AppError::Prompt(format!("Failed to parse prompt YAML {:?}: {}", path, e))
    })?;

    validate_prompt(&definition)?;

    tracing::info!("Loaded prompt: {} ({})", definition.id, definition.title);

    Ok(definition)
}

/// Load the prompt at `path` when one is configured, else the built-in default.
pub fn load_prompt_or_default(path: Option<&Path>) -> AppResult<PromptDefinition> {
    match path {
        Some(path) => load_prompt(path),
        None => Ok(default_prompt()),
    }
}

/// Validate a prompt definition.
fn validate_prompt(def: &PromptDefinition) -> AppResult<()> {
    if def.id.is_empty() {
        return Err(AppError::Prompt("Prompt ID cannot be empty".to_string()));
    }

    if def.template.is_empty() {
        return Err(AppError::Prompt(
            "Prompt template cannot be empty".to_string(),
        ));
    }

    // Without the context the model has nothing to cite
    if !def.template.contains("{{context}}") {
        return Err(AppError::Prompt(format!(
            "Prompt '{}' template must reference {{{{context}}}}",
            def.id
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_prompt_is_valid() {
        let def = default_prompt();
        assert!(validate_prompt(&def).is_ok());
        assert!(def.rules.contains("Use ONLY the provided CONTEXT"));
        assert!(def.rules.contains(FALLBACK_ANSWER));
    }

    #[test]
    fn test_load_prompt_from_yaml() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("grounded.yml");
        std::fs::write(
            &path,
            "id: custom\ntitle: Custom\napiVersion: \"1.0\"\nrules: Answer in one line.\ntemplate: \"{{rules}} Q={{question}} C={{context}}\"\n",
        )
        .unwrap();

        let def = load_prompt(&path).unwrap();
        assert_eq!(def.id, "custom");
        assert_eq!(def.rules, "Answer in one line.");
    }

    #[test]
    fn test_load_prompt_missing_file() {
        let temp = TempDir::new().unwrap();
        let result = load_prompt(&temp.path().join("missing.yml"));
        assert!(matches!(result, Err(AppError::Prompt(_))));
    }

    #[test]
    fn test_template_without_context_rejected() {
        let mut def = default_prompt();
        def.template = "{{rules}} {{question}}".to_string();
        assert!(validate_prompt(&def).is_err());
    }

    #[test]
    fn test_load_or_default() {
        let def = load_prompt_or_default(None).unwrap();
        assert_eq!(def.id, DEFAULT_PROMPT_ID);
    }
}
