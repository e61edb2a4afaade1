//! # Completion Backends
//!
//! The narrow seam between Portal and whatever model serves completions.
//!
//! ```text
//! TextGenerator ──stream_chat──────────┐
//!                                      ├──▶ CompletionBackend ──▶ OpenAiCompatClient (HTTP/SSE)
//! ConsistencyEvaluator ──complete_structured┘
//! ```
//!
//! Backends must be safe for concurrent use: every call is an independent
//! request/response or stream.

pub mod client;
pub mod types;

#[cfg(test)]
pub(crate) mod scripted;

use async_trait::async_trait;
use futures::stream::BoxStream;

pub use client::OpenAiCompatClient;
pub use types::{ChatDelta, ChatMessage, ChatRequest, ChatRole, LlmError, OutputSchema};

/// Lazily pulled sequence of completion events
pub type DeltaStream = BoxStream<'static, Result<ChatDelta, LlmError>>;

/// A text/structured-output completion capability
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Start a streamed completion. Events arrive in generation order.
    async fn stream_chat(&self, request: ChatRequest) -> Result<DeltaStream, LlmError>;

    /// Run a single completion constrained to `schema`, returning the raw JSON text.
    async fn complete_structured(
        &self,
        request: ChatRequest,
        schema: OutputSchema,
    ) -> Result<String, LlmError>;
}
