//! The effective set of question-answering prompts.
//!
//! Built-in definitions ship inside the crate. A workspace can replace any
//! of them by dropping `<id>.yml` into `.recall/prompts/`.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use recall_core::{AppError, AppResult};

use crate::builder::render_template;
use crate::loader::{list_prompts, load_prompt, parse_prompt};
use crate::types::{BuiltPrompt, PromptDefinition, PromptOrigin, PromptSummary};

pub const ANALYZE: &str = "rag.analyze";
pub const SYSTEM: &str = "rag.system";
pub const CONTEXT: &str = "rag.context";
pub const CITATION: &str = "rag.citation";
pub const NO_INFORMATION: &str = "rag.no_information";

const BUILTINS: [(&str, &str); 5] = [
    (ANALYZE, include_str!("../prompts/rag.analyze.yml")),
    (SYSTEM, include_str!("../prompts/rag.system.yml")),
    (CONTEXT, include_str!("../prompts/rag.context.yml")),
    (CITATION, include_str!("../prompts/rag.citation.yml")),
    (NO_INFORMATION, include_str!("../prompts/rag.no_information.yml")),
];

/// Prompt definitions used by the pipeline, keyed by id.
#[derive(Debug, Clone)]
pub struct PromptSet {
    prompts: BTreeMap<String, (PromptDefinition, PromptOrigin)>,
}

impl PromptSet {
    /// The built-in definitions only.
    pub fn builtin() -> AppResult<Self> {
        let mut prompts = BTreeMap::new();
        for (id, yaml) in BUILTINS {
            let definition = parse_prompt(yaml, id)?;
            prompts.insert(id.to_string(), (definition, PromptOrigin::Builtin));
        }
        Ok(Self { prompts })
    }

    /// Built-ins with workspace overrides applied.
    ///
    /// Override files for ids the pipeline does not use are ignored with a
    /// warning.
    pub fn load(workspace_path: &Path) -> AppResult<Self> {
        let mut set = Self::builtin()?;

        for id in list_prompts(workspace_path)? {
            if !set.prompts.contains_key(&id) {
                tracing::warn!(prompt_id = %id, "Ignoring prompt override with unknown id");
                continue;
            }
            let definition = load_prompt(workspace_path, &id)?;
            set.prompts
                .insert(id, (definition, PromptOrigin::Workspace));
        }

        Ok(set)
    }

    /// Get the effective definition for an id.
    pub fn get(&self, id: &str) -> AppResult<&PromptDefinition> {
        self.prompts
            .get(id)
            .map(|(definition, _)| definition)
            .ok_or_else(|| AppError::Prompt(format!("Unknown prompt: {}", id)))
    }

    /// Effective prompts in id order.
    pub fn summaries(&self) -> Vec<PromptSummary> {
        self.prompts
            .iter()
            .map(|(id, (definition, origin))| PromptSummary {
                id: id.clone(),
                title: definition.title.clone(),
                origin: *origin,
            })
            .collect()
    }

    /// Render a prompt by id.
    pub fn render(&self, id: &str, variables: &HashMap<&str, &str>) -> AppResult<String> {
        render_template(&self.get(id)?.template, variables)
    }

    /// The structured-output request used to analyze a question.
    pub fn analysis_prompt(&self, query: &str) -> AppResult<String> {
        self.render(ANALYZE, &HashMap::from([("query", query)]))
    }

    /// System instruction plus context/question and citation instruction.
    pub fn answer_prompt(&self, context: &str, query: &str) -> AppResult<BuiltPrompt> {
        let system = self.render(SYSTEM, &HashMap::new())?;
        let body = self.render(CONTEXT, &HashMap::from([("context", context), ("query", query)]))?;
        let citation = self.render(CITATION, &HashMap::new())?;

        Ok(BuiltPrompt {
            system: Some(system.trim_end().to_string()),
            user: format!("{}\n\n{}", body.trim_end(), citation.trim_end()),
        })
    }

    /// The fixed answer used when nothing relevant was found.
    pub fn no_information(&self) -> AppResult<String> {
        Ok(self.render(NO_INFORMATION, &HashMap::new())?.trim_end().to_string())
    }
}
