//! Prompt builder for rendering templates and injecting context.

use crate::loader::PromptLibrary;
use crate::tones::FORMAT_INSTRUCTIONS;
use crate::types::{BuiltPrompt, PromptKind, Tone};
use docqa_core::{AppError, AppResult};
use handlebars::Handlebars;
use std::collections::HashMap;

const STRUCTURED_USER_TEMPLATE: &str = "Context from {{corpus}}:
{{context}}

Question: {{question}}

Previous conversation:
{{history}}

Provide a response in the requested style:";

const SIMPLE_SYSTEM_TEMPLATE: &str = "You are an expert on {{corpus}}. Answer the question based on the context provided.

{{instructions}}

Provide a direct answer in paragraph form with page citations.";

const SIMPLE_USER_TEMPLATE: &str = "Context from {{corpus}}:
{{context}}

Question: {{question}}

Answer the question based on the context above.";

const EMPTY_HISTORY: &str = "(no previous conversation)";

/// Build the schema-aware prompt for the structured tier.
///
/// The system message is the tone instructions followed by the JSON
/// format instructions. The user message carries the context block, the
/// question and the rendered conversation history.
pub fn build_structured_prompt(
    library: &PromptLibrary,
    tone: Tone,
    question: &str,
    context: &str,
    history: &str,
) -> AppResult<BuiltPrompt> {
    tracing::debug!(tone = %tone, "Building structured prompt");

    let system = format!("{}\n\n{}", library.instructions(tone)?, FORMAT_INSTRUCTIONS);

    let history = if history.trim().is_empty() {
        EMPTY_HISTORY
    } else {
        history
    };

    let mut variables = base_variables(library, question, context);
    variables.insert("history".to_string(), history.to_string());
    let user = render_template(STRUCTURED_USER_TEMPLATE, &variables)?;

    Ok(BuiltPrompt {
        system,
        user,
        tone,
        kind: PromptKind::Structured,
    })
}

/// Build the plain instructional prompt for the simple tier.
///
/// No schema and no conversation history.
pub fn build_simple_prompt(
    library: &PromptLibrary,
    tone: Tone,
    question: &str,
    context: &str,
) -> AppResult<BuiltPrompt> {
    tracing::debug!(tone = %tone, "Building simple prompt");

    let mut variables = base_variables(library, question, context);
    variables.insert("instructions".to_string(), library.instructions(tone)?);

    let system = render_template(SIMPLE_SYSTEM_TEMPLATE, &variables)?;
    let user = render_template(SIMPLE_USER_TEMPLATE, &variables)?;

    Ok(BuiltPrompt {
        system,
        user,
        tone,
        kind: PromptKind::Simple,
    })
}

fn base_variables(library: &PromptLibrary, question: &str, context: &str) -> HashMap<String, String> {
    HashMap::from([
        ("corpus".to_string(), library.corpus().to_string()),
        ("question".to_string(), question.to_string()),
        ("context".to_string(), context.to_string()),
    ])
}

/// Render a Handlebars template with variables.
pub(crate) fn render_template(
    template: &str,
    variables: &HashMap<String, String>,
) -> AppResult<String> {
    let mut handlebars = Handlebars::new();

    // Plain text, not HTML
    handlebars.register_escape_fn(handlebars::no_escape);

    handlebars
        .register_template_string("prompt", template)
        .map_err(|e| AppError::Prompt(format!("Failed to register template: {}", e)))?;

    handlebars
        .render("prompt", variables)
        .map_err(|e| AppError::Prompt(format!("Failed to render template: {}", e)))
}
