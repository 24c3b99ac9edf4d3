//! Answer synthesis from ranked context.

use std::fmt::Write as _;
use std::sync::Arc;

use recall_core::{AppError, AppResult};
use recall_llm::{LlmClient, LlmRequest};
use recall_prompt::PromptSet;

use super::Stage;
use crate::state::{PipelineState, StateDelta};
use crate::types::{EnrichedChunk, SourceRecord};

pub const NO_CONTEXT_NOTE: &str = "No relevant context found";

/// Builds the cited prompt and makes the single generation call.
pub struct ResponseGenerator {
    llm: Arc<dyn LlmClient>,
    prompts: Arc<PromptSet>,
    model: String,
    temperature: f32,
    no_information: String,
}

impl ResponseGenerator {
    /// Fails if the "no information" prompt does not render.
    pub fn new(
        llm: Arc<dyn LlmClient>,
        prompts: Arc<PromptSet>,
        model: impl Into<String>,
        temperature: f32,
    ) -> AppResult<Self> {
        let no_information = prompts.no_information()?;
        Ok(Self {
            llm,
            prompts,
            model: model.into(),
            temperature,
            no_information,
        })
    }
}

#[async_trait::async_trait]
impl Stage for ResponseGenerator {
    fn name(&self) -> &'static str {
        "response_generator"
    }

    async fn run(&self, state: &PipelineState) -> AppResult<StateDelta> {
        let ranked = state.ranked_context.as_deref().unwrap_or_default();

        if ranked.is_empty() {
            tracing::warn!("No ranked context, skipping generation");
            return Ok(StateDelta {
                generated_answer: Some(self.no_information.clone()),
                error: Some(NO_CONTEXT_NOTE.to_string()),
                ..Default::default()
            });
        }

        let context = format_context(ranked);
        let built = self
            .prompts
            .answer_prompt(&context, state.query())
            .map_err(|e| AppError::Generation(format!("Failed to build prompt: {}", e)))?;

        let mut request =
            LlmRequest::new(built.user, &self.model).with_temperature(self.temperature);
        if let Some(system) = built.system {
            request = request.with_system(system);
        }

        tracing::debug!(
            context_chunks = ranked.len(),
            prompt_chars = request.prompt.len(),
            "Calling model for answer"
        );

        let response = self.llm.complete(&request).await.map_err(|e| {
            tracing::error!(error = %e, "Answer generation failed");
            AppError::Generation(format!("Failed to generate response: {}", e))
        })?;

        tracing::info!(
            answer_chars = response.content.chars().count(),
            total_tokens = response.usage.total_tokens,
            "Answer generated"
        );

        Ok(StateDelta {
            generated_answer: Some(response.content),
            ..Default::default()
        })
    }
}

/// Render ranked chunks as numbered source blocks with their full content.
pub fn format_context(chunks: &[EnrichedChunk]) -> String {
    chunks
        .iter()
        .enumerate()
        .map(|(i, chunk)| source_block(i + 1, chunk))
        .collect::<Vec<_>>()
        .join("\n")
}

fn source_block(number: usize, chunk: &EnrichedChunk) -> String {
    let mut block = format!("\n--- Source {} ---\n", number);

    // Writing to a String cannot fail
    match &chunk.source {
        SourceRecord::Document {
            metadata,
            page_number,
        } => {
            let _ = writeln!(block, "Type: Document");
            let _ = writeln!(block, "Name: {}", metadata.document_name);
            let _ = writeln!(block, "Date: {}", metadata.upload_date);
            let _ = writeln!(block, "URL: {}", metadata.file_url);
            if let Some(category) = &metadata.category {
                let _ = writeln!(block, "Category: {}", category);
            }
            if let Some(uploaded_by) = &metadata.uploaded_by {
                let _ = writeln!(block, "Uploaded By: {}", uploaded_by);
            }
            if let Some(page) = page_number {
                let _ = writeln!(block, "Page: {}", page);
            }
        }
        SourceRecord::Meeting {
            metadata,
            timestamp,
        } => {
            let _ = writeln!(block, "Type: Meeting");
            let _ = writeln!(block, "Title: {}", metadata.meeting_title);
            let _ = writeln!(block, "Date: {}", metadata.meeting_date);
            let url = chunk.source.url();
            if !url.is_empty() {
                let _ = writeln!(block, "URL: {}", url);
            }
            if !metadata.participants.is_empty() {
                let _ = writeln!(block, "Participants: {}", metadata.participants.join(", "));
            }
            if let Some(meeting_type) = &metadata.meeting_type {
                let _ = writeln!(block, "Meeting Type: {}", meeting_type);
            }
            if let Some(timestamp) = timestamp {
                let _ = writeln!(block, "Timestamp: {}", timestamp);
            }
        }
    }

    let _ = write!(block, "\nContent:\n{}\n---\n", chunk.content);
    block
}
