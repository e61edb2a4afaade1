//! In-process backend that replays a script; used by unit tests.

use std::sync::Mutex;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};

use super::types::{ChatDelta, ChatRequest, LlmError, OutputSchema};
use super::{CompletionBackend, DeltaStream};

/// One scripted stream event
#[derive(Debug, Clone)]
pub enum Step {
    Delta(ChatDelta),
    Fail(String),
}

#[derive(Default)]
pub struct ScriptedBackend {
    steps: Vec<Step>,
    refuse_stream: bool,
    structured: Mutex<Vec<Result<String, String>>>,
    pub stream_requests: Mutex<Vec<ChatRequest>>,
    pub structured_requests: Mutex<Vec<(ChatRequest, OutputSchema)>>,
}

impl ScriptedBackend {
    pub fn streaming(steps: Vec<Step>) -> Self {
        Self {
            steps,
            ..Default::default()
        }
    }

    pub fn refusing_stream() -> Self {
        Self {
            refuse_stream: true,
            ..Default::default()
        }
    }

    /// Queue structured responses, consumed front to back
    pub fn answering(responses: Vec<Result<String, String>>) -> Self {
        Self {
            structured: Mutex::new(responses),
            ..Default::default()
        }
    }
}

#[async_trait]
impl CompletionBackend for ScriptedBackend {
    async fn stream_chat(&self, request: ChatRequest) -> Result<DeltaStream, LlmError> {
        self.stream_requests.lock().unwrap().push(request);
        if self.refuse_stream {
            return Err(LlmError::Status {
                status: 500,
                body: "scripted outage".to_string(),
            });
        }
        let items: Vec<Result<ChatDelta, LlmError>> = self
            .steps
            .iter()
            .cloned()
            .map(|step| match step {
                Step::Delta(delta) => Ok(delta),
                Step::Fail(message) => Err(LlmError::Stream(message)),
            })
            .collect();
        Ok(stream::iter(items).boxed())
    }

    async fn complete_structured(
        &self,
        request: ChatRequest,
        schema: OutputSchema,
    ) -> Result<String, LlmError> {
        self.structured_requests
            .lock()
            .unwrap()
            .push((request, schema));
        let mut queue = self.structured.lock().unwrap();
        if queue.is_empty() {
            return Err(LlmError::EmptyResponse);
        }
        queue.remove(0).map_err(LlmError::Api)
    }
}
