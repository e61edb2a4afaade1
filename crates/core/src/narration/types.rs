//! Data model shared by the narration pipeline, its adapters, and the framer.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::llm::LlmError;

/// A resident of a location. Only `name` is read; every other field is
/// carried through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResidentRef {
    pub name: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ResidentRef {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            extra: serde_json::Map::new(),
        }
    }
}

/// Input for one narration run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationDescriptor {
    pub name: String,
    /// Location type, e.g. "Planet" or "Microverse"
    #[serde(rename = "type", alias = "kind")]
    pub kind: String,
    #[serde(default)]
    pub residents: Vec<ResidentRef>,
}

impl LocationDescriptor {
    pub fn new(name: impl Into<String>, kind: impl Into<String>, residents: Vec<ResidentRef>) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
            residents,
        }
    }

    pub fn resident_names(&self) -> Vec<&str> {
        self.residents.iter().map(|r| r.name.as_str()).collect()
    }
}

/// Structured factual-consistency judgment over a narrative
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct EvaluationVerdict {
    /// A score from 0 to 10 for factual consistency.
    #[schemars(range(min = 0, max = 10))]
    pub score: u8,
    /// Explanation for the score, specifically checking if it mentioned
    /// characters not present in the data.
    pub reasoning: String,
}

impl EvaluationVerdict {
    pub const MAX_SCORE: u8 = 10;

    pub fn new(score: u8, reasoning: impl Into<String>) -> Self {
        Self {
            score,
            reasoning: reasoning.into(),
        }
    }

    pub fn is_in_range(&self) -> bool {
        self.score <= Self::MAX_SCORE
    }
}

/// A unit on the output channel of a narration run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FramedEvent {
    /// A piece of the narrative, in generation order
    TextFragment(String),
    /// The verdict; always last, at most once
    Evaluation(EvaluationVerdict),
}

/// Errors raised while narrating a location
#[derive(Debug, Error)]
pub enum NarrationError {
    /// The text generator failed or produced nothing
    #[error("narration generation failed: {0}")]
    Generation(String),
    /// The evaluator could not produce a verdict
    #[error("consistency evaluation failed: {0}")]
    Evaluation(String),
    /// The structured output did not conform to the verdict shape
    #[error("evaluator returned a non-conforming verdict: {0}")]
    StructuredOutput(String),
    #[error(transparent)]
    Backend(#[from] LlmError),
}

impl NarrationError {
    /// True for failures of the evaluation stage
    pub fn is_evaluation_failure(&self) -> bool {
        matches!(
            self,
            NarrationError::Evaluation(_) | NarrationError::StructuredOutput(_)
        )
    }
}
