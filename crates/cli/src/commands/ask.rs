//! Ask command handler.
//!
//! Runs the question-answering pipeline against the workspace corpus.

use std::fmt::Write as _;
use std::sync::Arc;

use clap::Args;
use recall_core::{config::AppConfig, AppResult};
use recall_llm::create_client;
use recall_prompt::PromptSet;
use recall_rag::{ChatResponse, ErrorBody, PipelineDeps, RagPipeline};

use super::open_store;

/// Ask a question and get a cited answer
#[derive(Args, Debug)]
pub struct AskCommand {
    /// The question to ask
    pub question: String,

    /// Output the response as JSON
    #[arg(long)]
    pub json: bool,

    /// Abort the run after this many seconds
    #[arg(long)]
    pub timeout_secs: Option<u64>,
}

impl AskCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing ask command");
        tracing::debug!("Ask command options: {:?}", self);

        let result = self.answer(config).await;

        match result {
            Ok(response) => {
                if self.json {
                    println!("{}", serde_json::to_string_pretty(&response)?);
                } else {
                    print!("{}", render_text(&response));
                }
                Ok(())
            }
            Err(e) => {
                if self.json {
                    println!("{}", serde_json::to_string_pretty(&ErrorBody::from_error(&e))?);
                }
                Err(e)
            }
        }
    }

    async fn answer(&self, config: &AppConfig) -> AppResult<ChatResponse> {
        let provider_config = config.get_provider_config(&config.provider);
        let api_key = config.resolve_api_key(&config.provider);

        let llm = create_client(
            &config.provider,
            provider_config.and_then(|pc| pc.endpoint()),
            api_key.as_deref(),
            provider_config.and_then(|pc| pc.timeout()),
        )?;

        let store = open_store(config)?;
        let prompts = Arc::new(PromptSet::load(&config.workspace)?);

        let mut rag_config = config.rag.clone();
        if let Some(secs) = self.timeout_secs {
            rag_config.request_timeout_secs = Some(secs);
        }

        let deps = PipelineDeps {
            llm,
            index: store.clone(),
            store,
            prompts,
            model: config.model.clone(),
        };

        RagPipeline::new(deps, &rag_config)?
            .run(&self.question)
            .await
    }
}

/// Plain-text rendering: answer, numbered sources, confidence.
fn render_text(response: &ChatResponse) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", response.answer.trim_end());

    if !response.sources.is_empty() {
        let _ = writeln!(out, "\nSources:");
        for (i, source) in response.sources.iter().enumerate() {
            let _ = write!(
                out,
                "  [{}] {} ({}, {})",
                i + 1,
                source.name,
                source.source_type.as_str(),
                source.date
            );
            if !source.url.is_empty() {
                let _ = write!(out, " {}", source.url);
            }
            let _ = writeln!(out);
        }
    }

    let _ = writeln!(out, "\nConfidence: {}", response.confidence.as_str());
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use recall_rag::{Confidence, Source, SourceDetails, SourceType};

    #[test]
    fn test_render_text_with_sources() {
        let response = ChatResponse {
            answer: "Launch is on May 3 [Source 1].".to_string(),
            sources: vec![Source {
                source_type: SourceType::Meeting,
                name: "Launch sync".to_string(),
                date: "2024-04-20".to_string(),
                url: "https://transcripts.example.com/m1".to_string(),
                excerpt: "We move launch to May 3.".to_string(),
                relevance_score: 0.91,
                metadata: SourceDetails::default(),
            }],
            confidence: Confidence::Medium,
        };

        let text = render_text(&response);
        assert!(text.starts_with("Launch is on May 3 [Source 1].\n"));
        assert!(text.contains(
            "  [1] Launch sync (meeting, 2024-04-20) https://transcripts.example.com/m1\n"
        ));
        assert!(text.ends_with("Confidence: medium\n"));
    }

    #[test]
    fn test_render_text_without_sources() {
        let response = ChatResponse {
            answer: "I don't have enough information.".to_string(),
            sources: Vec::new(),
            confidence: Confidence::Low,
        };

        let text = render_text(&response);
        assert!(!text.contains("Sources:"));
        assert!(text.ends_with("Confidence: low\n"));
    }
}
