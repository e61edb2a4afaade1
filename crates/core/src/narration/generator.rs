//! # Text Generator
//!
//! Turns a completion stream into the ordered sequence of narrative fragments
//! the pipeline relays. Events without text (role headers, tool calls, usage
//! reports, empty deltas) never reach the pipeline.

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use futures::future;

use super::types::NarrationError;
use crate::llm::{ChatDelta, ChatMessage, ChatRequest, CompletionBackend, DeltaStream};

/// Finite, non-restartable sequence of non-empty narrative fragments
pub type FragmentStream = BoxStream<'static, Result<String, NarrationError>>;

#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn stream(
        &self,
        system_instructions: &str,
        user_payload: &str,
    ) -> Result<FragmentStream, NarrationError>;
}

/// [`TextGenerator`] backed by a streaming chat completion
pub struct ChatNarrator {
    backend: Arc<dyn CompletionBackend>,
}

impl ChatNarrator {
    pub fn new(backend: Arc<dyn CompletionBackend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl TextGenerator for ChatNarrator {
    async fn stream(
        &self,
        system_instructions: &str,
        user_payload: &str,
    ) -> Result<FragmentStream, NarrationError> {
        let request = ChatRequest::new(vec![
            ChatMessage::system(system_instructions),
            ChatMessage::user(user_payload),
        ]);

        let deltas = self
            .backend
            .stream_chat(request)
            .await
            .map_err(|e| NarrationError::Generation(e.to_string()))?;

        Ok(content_fragments(deltas))
    }
}

/// Keep only content-bearing events, in arrival order
pub fn content_fragments(deltas: DeltaStream) -> FragmentStream {
    deltas
        .filter_map(|delta| {
            future::ready(match delta {
                Ok(ChatDelta {
                    content: Some(text),
                    ..
                }) if !text.is_empty() => Some(Ok(text)),
                Ok(_) => None,
                Err(e) => Some(Err(NarrationError::Generation(e.to_string()))),
            })
        })
        .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::scripted::{ScriptedBackend, Step};
    use crate::llm::ChatRole;

    #[tokio::test]
    async fn test_filters_contentless_events() {
        let backend = Arc::new(ScriptedBackend::streaming(vec![
            Step::Delta(ChatDelta::metadata()),
            Step::Delta(ChatDelta::text("Welcome to ")),
            Step::Delta(ChatDelta {
                content: None,
                has_tool_calls: true,
            }),
            Step::Delta(ChatDelta::text("")),
            Step::Delta(ChatDelta::text("Anatomy Park.")),
        ]));
        let narrator = ChatNarrator::new(backend);

        let fragments: Vec<String> = narrator
            .stream("system", "payload")
            .await
            .unwrap()
            .map(|f| f.unwrap())
            .collect()
            .await;

        assert_eq!(fragments, vec!["Welcome to ", "Anatomy Park."]);
    }

    #[tokio::test]
    async fn test_frames_system_and_user_messages() {
        let backend = Arc::new(ScriptedBackend::streaming(vec![]));
        let narrator = ChatNarrator::new(backend.clone());

        let _ = narrator.stream("be cynical", "Location Name: X").await.unwrap();

        let requests = backend.stream_requests.lock().unwrap();
        let messages = &requests[0].messages;
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, ChatRole::System);
        assert_eq!(messages[0].content, "be cynical");
        assert_eq!(messages[1].role, ChatRole::User);
        assert_eq!(messages[1].content, "Location Name: X");
    }

    #[tokio::test]
    async fn test_mid_stream_failure_is_generation_error() {
        let backend = Arc::new(ScriptedBackend::streaming(vec![
            Step::Delta(ChatDelta::text("Half a sent")),
            Step::Fail("connection reset".to_string()),
        ]));
        let narrator = ChatNarrator::new(backend);

        let items: Vec<_> = narrator.stream("s", "p").await.unwrap().collect().await;
        assert_eq!(items.len(), 2);
        assert!(matches!(items[1], Err(NarrationError::Generation(_))));
    }

    #[tokio::test]
    async fn test_outright_failure() {
        let narrator = ChatNarrator::new(Arc::new(ScriptedBackend::refusing_stream()));
        assert!(matches!(
            narrator.stream("s", "p").await,
            Err(NarrationError::Generation(_))
        ));
    }
}
