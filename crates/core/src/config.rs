//! Persisted portal configuration (`.portal/config.json`).
//!
//! Secrets never live here; API keys are read from the environment by the
//! clients that need them.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::catalog::DEFAULT_GRAPHQL_URL;
use crate::models::ModelConfig;

pub const DEFAULT_CONFIG_PATH: &str = ".portal/config.json";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to access config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed config at {path}: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Embedding endpoint used by the search index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub base_url: String,
    pub model: String,
    pub api_key_env: String,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.jina.ai/v1".to_string(),
            model: "jina-embeddings-v2-base-en".to_string(),
            api_key_env: "JINA_API_KEY".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PortalConfig {
    pub narrator: ModelConfig,
    pub evaluator: ModelConfig,
    pub embeddings: EmbeddingConfig,
    pub catalog_url: String,
    pub database_path: PathBuf,
    pub index_path: PathBuf,
    pub request_timeout_secs: u64,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            narrator: ModelConfig::default(),
            evaluator: ModelConfig::evaluator_default(),
            embeddings: EmbeddingConfig::default(),
            catalog_url: DEFAULT_GRAPHQL_URL.to_string(),
            database_path: PathBuf::from(".portal/notes.db"),
            index_path: PathBuf::from(".portal/index.json"),
            request_timeout_secs: 300,
        }
    }
}

impl PortalConfig {
    /// Load from the default location
    pub async fn load() -> Result<Self, ConfigError> {
        Self::load_from(DEFAULT_CONFIG_PATH).await
    }

    /// A missing file yields the defaults; a malformed one is an error
    pub async fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = match tokio::fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file, using defaults");
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        serde_json::from_str(&content).map_err(|source| ConfigError::Malformed {
            path: path.to_path_buf(),
            source,
        })
    }

    pub async fn save(&self) -> Result<(), ConfigError> {
        self.save_to(DEFAULT_CONFIG_PATH).await
    }

    pub async fn save_to(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let io_err = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
        }
        let content =
            serde_json::to_string_pretty(self).map_err(|source| ConfigError::Malformed {
                path: path.to_path_buf(),
                source,
            })?;
        tokio::fs::write(path, content).await.map_err(io_err)
    }
}
