//! Stats command handler.
//!
//! Shows how much of the corpus is available to answer from.

use clap::Args;
use recall_core::{config::AppConfig, AppResult};
use recall_rag::CorpusStats;

use super::open_store;

/// Show corpus statistics
#[derive(Args, Debug)]
pub struct StatsCommand {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl StatsCommand {
    pub fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing stats command");

        let stats = open_store(config)?.stats()?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&stats)?);
        } else {
            print!("{}", render_text(&stats, &config.store_path().display().to_string()));
        }

        Ok(())
    }
}

fn render_text(stats: &CorpusStats, location: &str) -> String {
    format!(
        "Corpus: {}\n  Documents: {}\n  Meetings:  {}\n  Chunks:    {}\n",
        location, stats.documents, stats.meetings, stats.chunks
    )
}
