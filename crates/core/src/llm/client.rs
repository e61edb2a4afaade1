//! # OpenAI-Compatible Client
//!
//! Streams chat completions over server-sent events and runs JSON-schema
//! constrained completions. Works against any provider exposing the
//! `/chat/completions` contract (see [`LlmProvider::default_base_url`]).
//!
//! [`LlmProvider::default_base_url`]: crate::models::LlmProvider::default_base_url

use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::{future, StreamExt};
use serde_json::json;

use super::types::{
    ChatDelta, ChatRequest, CompletionBody, CompletionResponse, LlmError, OutputSchema,
    StreamPayload,
};
use super::{CompletionBackend, DeltaStream};
use crate::models::ModelConfig;

/// Terminal marker OpenAI-style streams send as their last `data:` line
const DONE_MARKER: &str = "[DONE]";

pub struct OpenAiCompatClient {
    http: reqwest::Client,
    config: ModelConfig,
    api_key: String,
}

impl OpenAiCompatClient {
    pub fn new(config: ModelConfig, api_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
            api_key: api_key.into(),
        }
    }

    /// Read the provider's API key from the environment
    pub fn from_env(config: ModelConfig) -> Result<Self, LlmError> {
        let var = config.provider.api_key_env();
        let Ok(api_key) = std::env::var(var) else {
            return Err(LlmError::MissingApiKey(var));
        };
        Ok(Self::new(config, api_key))
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.effective_base_url())
    }

    async fn post(&self, body: &CompletionBody<'_>) -> Result<reqwest::Response, LlmError> {
        let response = self
            .http
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl CompletionBackend for OpenAiCompatClient {
    async fn stream_chat(&self, request: ChatRequest) -> Result<DeltaStream, LlmError> {
        let body = CompletionBody {
            model: &self.config.model,
            messages: &request.messages,
            stream: true,
            temperature: request.temperature.or(self.config.temperature),
            response_format: None,
        };

        tracing::debug!(model = %self.config.model, "Opening completion stream");
        let response = self.post(&body).await?;

        let stream = response
            .bytes_stream()
            .eventsource()
            .take_while(|event| {
                future::ready(!matches!(event, Ok(e) if e.data.trim() == DONE_MARKER))
            })
            .filter_map(|event| async move {
                match event {
                    Ok(event) if event.data.trim().is_empty() => None,
                    Ok(event) => Some(parse_stream_payload(&event.data)),
                    Err(err) => Some(Err(LlmError::Stream(err.to_string()))),
                }
            })
            .boxed();

        Ok(stream)
    }

    async fn complete_structured(
        &self,
        request: ChatRequest,
        schema: OutputSchema,
    ) -> Result<String, LlmError> {
        let response_format = json!({
            "type": "json_schema",
            "json_schema": {
                "name": schema.name,
                "schema": schema.schema,
                "strict": false,
            }
        });
        let body = CompletionBody {
            model: &self.config.model,
            messages: &request.messages,
            stream: false,
            temperature: request.temperature.or(self.config.temperature),
            response_format: Some(response_format),
        };

        let response: CompletionResponse = self.post(&body).await?.json().await?;
        let message = response
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message)
            .ok_or(LlmError::EmptyResponse)?;

        if let Some(refusal) = message.refusal {
            return Err(LlmError::Refusal(refusal));
        }
        match message.content {
            Some(content) if !content.trim().is_empty() => Ok(content),
            _ => Err(LlmError::EmptyResponse),
        }
    }
}

/// Decode one `data:` payload of a completion stream
pub(crate) fn parse_stream_payload(data: &str) -> Result<ChatDelta, LlmError> {
    let payload: StreamPayload = serde_json::from_str(data)?;
    if let Some(error) = payload.error {
        return Err(LlmError::Api(error.message));
    }

    let Some(choice) = payload.choices.into_iter().next() else {
        // usage-only chunk
        return Ok(ChatDelta::metadata());
    };
    Ok(ChatDelta {
        content: choice.delta.content,
        has_tool_calls: choice.delta.tool_calls.is_some(),
    })
}
