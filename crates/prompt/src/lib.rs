//! Prompt system for Recall.
//!
//! - YAML prompt definitions, built in or overridden per workspace
//! - Handlebars template rendering
//! - The `PromptSet` the question-answering pipeline renders from

pub mod builder;
pub mod loader;
pub mod set;
pub mod types;

// Re-export main types
pub use builder::render_template;
pub use loader::{list_prompts, load_prompt};
pub use set::PromptSet;
pub use types::{BuiltPrompt, PromptDefinition, PromptOrigin, PromptSummary};
