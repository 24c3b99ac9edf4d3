//! Pipeline driver: runs the stages in order over one state.

use std::sync::Arc;
use std::time::{Duration, Instant};

use recall_core::{AppError, AppResult, RagConfig};
use recall_llm::LlmClient;
use recall_prompt::PromptSet;
use tracing::Instrument;

use crate::metadata_store::MetadataStore;
use crate::stages::{
    ContextRanker, MetadataEnricher, QueryAnalyzer, ResponseGenerator, RetrievalAgent,
    SourceFormatter, Stage,
};
use crate::state::PipelineState;
use crate::types::ChatResponse;
use crate::vector_index::VectorIndex;

/// External collaborators the pipeline calls out to.
#[derive(Clone)]
pub struct PipelineDeps {
    pub llm: Arc<dyn LlmClient>,
    pub index: Arc<dyn VectorIndex>,
    pub store: Arc<dyn MetadataStore>,
    pub prompts: Arc<PromptSet>,
    /// Model used for both analysis and generation.
    pub model: String,
}

/// Question answering over the corpus.
///
/// Shareable across concurrent requests; every run owns its own state.
pub struct RagPipeline {
    stages: Vec<Box<dyn Stage>>,
    timeout: Option<Duration>,
}

impl RagPipeline {
    /// Wire the standard six stages.
    pub fn new(deps: PipelineDeps, config: &RagConfig) -> AppResult<Self> {
        config.validate()?;

        let PipelineDeps {
            llm,
            index,
            store,
            prompts,
            model,
        } = deps;

        let stages: Vec<Box<dyn Stage>> = vec![
            Box::new(QueryAnalyzer::new(
                Arc::clone(&llm),
                Arc::clone(&prompts),
                model.clone(),
                config.analysis_temperature,
            )),
            Box::new(RetrievalAgent::new(index, config.top_k_retrieval)),
            Box::new(MetadataEnricher::new(store)),
            Box::new(ContextRanker::new(config.top_k_context)),
            Box::new(ResponseGenerator::new(
                llm,
                prompts,
                model,
                config.llm_temperature,
            )?),
            Box::new(SourceFormatter::new(
                config.confidence_threshold_high,
                config.confidence_threshold_medium,
            )),
        ];

        Ok(Self::from_stages(
            stages,
            config.request_timeout_secs.map(Duration::from_secs),
        ))
    }

    /// Run an arbitrary ordered list of stages.
    pub fn from_stages(stages: Vec<Box<dyn Stage>>, timeout: Option<Duration>) -> Self {
        Self { stages, timeout }
    }

    /// Answer a question.
    ///
    /// "Nothing found" is a normal low-confidence answer; only
    /// infrastructure failures and the deadline produce `Err`.
    pub async fn run(&self, query: &str) -> AppResult<ChatResponse> {
        self.run_to_state(query)
            .await?
            .formatted_response
            .ok_or_else(|| AppError::Other("Pipeline finished without a response".to_string()))
    }

    /// Answer a question and return the full final state.
    pub async fn run_to_state(&self, query: &str) -> AppResult<PipelineState> {
        if query.trim().is_empty() {
            return Err(AppError::Other("Query cannot be empty".to_string()));
        }

        let request_id = uuid::Uuid::new_v4();
        let span = tracing::info_span!("rag_pipeline", request_id = %request_id);
        let run = self.execute(query).instrument(span);

        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, run).await.map_err(|_| {
                tracing::error!(%request_id, timeout_secs = limit.as_secs(), "Pipeline timed out");
                AppError::Timeout(limit.as_secs())
            })?,
            None => run.await,
        }
    }

    async fn execute(&self, query: &str) -> AppResult<PipelineState> {
        let started = Instant::now();
        let mut state = PipelineState::new(query);

        tracing::info!(stages = self.stages.len(), "Pipeline started");

        for stage in &self.stages {
            let stage_started = Instant::now();

            let delta = stage.run(&state).await.map_err(|e| {
                tracing::error!(stage = stage.name(), code = e.code(), error = %e, "Stage failed");
                e
            })?;
            state.merge(delta);

            tracing::debug!(
                stage = stage.name(),
                elapsed_ms = stage_started.elapsed().as_millis() as u64,
                "Stage complete"
            );
        }

        tracing::info!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            note = state.error.as_deref(),
            "Pipeline finished"
        );

        Ok(state)
    }
}
