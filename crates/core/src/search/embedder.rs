//! Text embedding behind a narrow trait, with an HTTP implementation for
//! `/v1/embeddings`-style endpoints (Jina, OpenAI, and compatibles).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::SearchError;
use crate::config::EmbeddingConfig;

#[async_trait]
pub trait Embedder: Send + Sync {
    /// One vector per input, in input order
    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, SearchError>;
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponseData {
    index: usize,
    embedding: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingResponseData>,
}

pub struct HttpEmbedder {
    http: reqwest::Client,
    config: EmbeddingConfig,
    api_key: String,
}

impl HttpEmbedder {
    pub fn new(config: EmbeddingConfig, api_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
            api_key: api_key.into(),
        }
    }

    pub fn from_env(config: EmbeddingConfig) -> Result<Self, SearchError> {
        let Ok(api_key) = std::env::var(&config.api_key_env) else {
            return Err(SearchError::MissingApiKey(config.api_key_env.clone()));
        };
        Ok(Self::new(config, api_key))
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, SearchError> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }

        let url = format!("{}/embeddings", self.config.base_url.trim_end_matches('/'));
        let response = self
            .http
            .post(url)
            .bearer_auth(&self.api_key)
            .json(&EmbeddingRequest {
                model: &self.config.model,
                input: inputs,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SearchError::Embedding(format!("status {}: {}", status, body)));
        }

        let response: EmbeddingResponse = response.json().await?;
        order_embeddings(response, inputs.len())
    }
}

fn order_embeddings(
    response: EmbeddingResponse,
    expected: usize,
) -> Result<Vec<Vec<f32>>, SearchError> {
    let mut data = response.data;
    if data.len() != expected {
        return Err(SearchError::Embedding(format!(
            "expected {} embeddings, got {}",
            expected,
            data.len()
        )));
    }
    data.sort_by_key(|d| d.index);
    Ok(data.into_iter().map(|d| d.embedding).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embeddings_are_reordered_by_index() {
        let response: EmbeddingResponse = serde_json::from_str(
            r#"{"data":[{"object":"embedding","index":1,"embedding":[0.0,1.0]},{"object":"embedding","index":0,"embedding":[1.0,0.0]}]}"#,
        )
        .unwrap();
        let vectors = order_embeddings(response, 2).unwrap();
        assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[test]
    fn test_count_mismatch_is_an_error() {
        let response = EmbeddingResponse { data: vec![] };
        assert!(matches!(
            order_embeddings(response, 1),
            Err(SearchError::Embedding(_))
        ));
    }
}
