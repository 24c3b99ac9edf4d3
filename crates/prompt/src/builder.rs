//! Handlebars rendering.

use handlebars::Handlebars;
use recall_core::{AppError, AppResult};
use serde::Serialize;

/// Render a Handlebars template with variables.
///
/// HTML escaping is disabled: prompts are plain text and retrieved content
/// must reach the model byte for byte. Strict mode is off, so a missing
/// variable renders as an empty string.
pub fn render_template<T: Serialize>(template: &str, variables: &T) -> AppResult<String> {
    let mut handlebars = Handlebars::new();
    handlebars.register_escape_fn(handlebars::no_escape);

    handlebars
        .register_template_string("prompt", template)
        .map_err(|e| AppError::Prompt(format!("Failed to register template: {}", e)))?;

    handlebars
        .render("prompt", variables)
        .map_err(|e| AppError::Prompt(format!("Failed to render template: {}", e)))
}
