//! Query analysis: intent, keywords and date filters.

use std::sync::Arc;

use recall_core::AppResult;
use recall_llm::{LlmClient, LlmRequest};
use recall_prompt::PromptSet;
use serde::Deserialize;
use serde_json::Value;

use super::Stage;
use crate::state::{PipelineState, StateDelta};
use crate::types::{DateBound, QueryAnalysis, QueryType, Timeframe};

/// Asks the model for a structured reading of the question.
///
/// Never fails: any model or parse problem yields
/// [`QueryAnalysis::fallback`].
pub struct QueryAnalyzer {
    llm: Arc<dyn LlmClient>,
    prompts: Arc<PromptSet>,
    model: String,
    temperature: f32,
}

impl QueryAnalyzer {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        prompts: Arc<PromptSet>,
        model: impl Into<String>,
        temperature: f32,
    ) -> Self {
        Self {
            llm,
            prompts,
            model: model.into(),
            temperature,
        }
    }

    pub async fn analyze(&self, query: &str) -> QueryAnalysis {
        let prompt = match self.prompts.analysis_prompt(query) {
            Ok(prompt) => prompt,
            Err(e) => {
                tracing::warn!(error = %e, "Analysis prompt failed to render, using fallback");
                return QueryAnalysis::fallback(query);
            }
        };

        let request = LlmRequest::new(prompt, &self.model).with_temperature(self.temperature);

        match self.llm.complete(&request).await {
            Ok(response) => parse_analysis(&response.content, query),
            Err(e) => {
                tracing::warn!(error = %e, "Query analysis call failed, using fallback");
                QueryAnalysis::fallback(query)
            }
        }
    }
}

#[async_trait::async_trait]
impl Stage for QueryAnalyzer {
    fn name(&self) -> &'static str {
        "query_analyzer"
    }

    async fn run(&self, state: &PipelineState) -> AppResult<StateDelta> {
        let analysis = self.analyze(state.query()).await;

        tracing::info!(
            query_type = analysis.query_type.as_str(),
            keywords = analysis.keywords.len(),
            has_timeframe = analysis.timeframe.is_some(),
            "Query analyzed"
        );

        Ok(StateDelta {
            query_analysis: Some(analysis),
            ..Default::default()
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawAnalysis {
    #[serde(default)]
    query_type: Option<String>,
    #[serde(default)]
    keywords: Option<Vec<String>>,
    #[serde(default)]
    timeframe: Option<Value>,
    #[serde(default)]
    specific_document: Option<String>,
    #[serde(default)]
    specific_meeting: Option<String>,
}

/// Turn a model response into an analysis, falling back when it holds no
/// usable JSON object.
pub fn parse_analysis(response: &str, query: &str) -> QueryAnalysis {
    let Some(json) = extract_json_object(response) else {
        tracing::warn!("No JSON object in analysis response, using fallback");
        return QueryAnalysis::fallback(query);
    };

    let raw: RawAnalysis = match serde_json::from_str(json) {
        Ok(raw) => raw,
        Err(e) => {
            tracing::warn!(error = %e, "Malformed analysis JSON, using fallback");
            return QueryAnalysis::fallback(query);
        }
    };

    let query_type = match raw.query_type.as_deref() {
        None => QueryType::Factual,
        Some(name) => QueryType::parse(name).unwrap_or_else(|| {
            tracing::debug!(query_type = name, "Unknown query type, treating as factual");
            QueryType::Factual
        }),
    };

    QueryAnalysis {
        query_type,
        keywords: raw.keywords.unwrap_or_default(),
        timeframe: raw.timeframe.and_then(timeframe),
        specific_document: raw.specific_document,
        specific_meeting: raw.specific_meeting,
    }
}

/// An object is read bound by bound. Any other non-null value is kept as
/// an unreadable period on both ends.
fn timeframe(value: Value) -> Option<Timeframe> {
    match value {
        Value::Null => None,
        Value::Object(map) => Some(Timeframe {
            start: date_bound(map.get("start").cloned()),
            end: date_bound(map.get("end").cloned()),
        }),
        other => {
            let raw = match other {
                Value::String(s) => s,
                v => v.to_string(),
            };
            Some(Timeframe {
                start: DateBound::Invalid(raw.clone()),
                end: DateBound::Invalid(raw),
            })
        }
    }
}

fn date_bound(value: Option<Value>) -> DateBound {
    match value {
        Some(Value::String(raw)) => DateBound::parse(&raw),
        Some(Value::Null) | None => DateBound::Invalid(String::new()),
        Some(other) => DateBound::Invalid(other.to_string()),
    }
}

/// Slice from the first `{` to the last `}`.
fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}
