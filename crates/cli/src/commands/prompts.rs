//! Prompts command handler.

use clap::Args;
use recall_core::{config::AppConfig, AppResult};
use recall_prompt::{PromptOrigin, PromptSet};

/// List the effective prompts
#[derive(Args, Debug)]
pub struct PromptsCommand {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl PromptsCommand {
    pub fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing prompts command");

        let summaries = PromptSet::load(&config.workspace)?.summaries();

        if self.json {
            println!("{}", serde_json::to_string_pretty(&summaries)?);
            return Ok(());
        }

        for summary in &summaries {
            let origin = match summary.origin {
                PromptOrigin::Builtin => "built-in",
                PromptOrigin::Workspace => "workspace",
            };
            println!("{:<20} {:<10} {}", summary.id, origin, summary.title);
        }

        Ok(())
    }
}
