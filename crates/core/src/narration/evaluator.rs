//! # Consistency Evaluator
//!
//! Audits a finished narrative against the residents that seeded it and
//! returns a fixed-shape [`EvaluationVerdict`]. A response that does not fit
//! the shape is an error; no fallback verdict is ever made up.

use std::sync::Arc;

use async_trait::async_trait;

use super::prompts;
use super::types::{EvaluationVerdict, NarrationError, ResidentRef};
use crate::llm::{ChatMessage, ChatRequest, CompletionBackend, LlmError, OutputSchema};

#[async_trait]
pub trait ConsistencyEvaluator: Send + Sync {
    async fn evaluate(
        &self,
        narrative: &str,
        residents: &[ResidentRef],
    ) -> Result<EvaluationVerdict, NarrationError>;
}

/// [`ConsistencyEvaluator`] backed by a schema-constrained completion
pub struct StructuredJudge {
    backend: Arc<dyn CompletionBackend>,
    temperature: f32,
}

impl StructuredJudge {
    pub fn new(backend: Arc<dyn CompletionBackend>) -> Self {
        Self {
            backend,
            temperature: 0.0,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

/// JSON schema of [`EvaluationVerdict`] as sent to the provider
pub fn verdict_schema() -> OutputSchema {
    let mut schema = serde_json::to_value(schemars::schema_for!(EvaluationVerdict))
        .unwrap_or_else(|_| serde_json::json!({ "type": "object" }));
    if let Some(object) = schema.as_object_mut() {
        object.remove("$schema");
        object.remove("title");
    }
    OutputSchema {
        name: "evaluation_response".to_string(),
        schema,
    }
}

/// Parse and validate the raw structured output
pub fn parse_verdict(raw: &str) -> Result<EvaluationVerdict, NarrationError> {
    let verdict: EvaluationVerdict = serde_json::from_str(raw.trim())
        .map_err(|e| NarrationError::StructuredOutput(e.to_string()))?;
    if !verdict.is_in_range() {
        return Err(NarrationError::StructuredOutput(format!(
            "score {} is outside 0..={}",
            verdict.score,
            EvaluationVerdict::MAX_SCORE
        )));
    }
    Ok(verdict)
}

#[async_trait]
impl ConsistencyEvaluator for StructuredJudge {
    async fn evaluate(
        &self,
        narrative: &str,
        residents: &[ResidentRef],
    ) -> Result<EvaluationVerdict, NarrationError> {
        let request = ChatRequest::new(vec![
            ChatMessage::system(prompts::EVALUATOR),
            ChatMessage::user(prompts::evaluation_payload(narrative, residents)),
        ])
        .with_temperature(self.temperature);

        let raw = self
            .backend
            .complete_structured(request, verdict_schema())
            .await
            .map_err(|e| match e {
                LlmError::Decode(_) | LlmError::Refusal(_) | LlmError::EmptyResponse => {
                    NarrationError::StructuredOutput(e.to_string())
                }
                _ => NarrationError::Evaluation(e.to_string()),
            })?;

        parse_verdict(&raw)
    }
}
