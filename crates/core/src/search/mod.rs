//! # Semantic Search
//!
//! Embed-and-query over the catalog. The service is built or loaded
//! explicitly and handed to whoever needs it; nothing here is global.
//!
//! ```text
//! CatalogClient ──▶ create_documents ──▶ Embedder ──▶ VectorIndex ──save──▶ index file
//!                                                        ▲
//! query ──▶ Embedder ──▶ SearchService::embed_and_search ─┘
//! ```

pub mod documents;
pub mod embedder;
pub mod index;

use std::path::Path;
use std::sync::Arc;

use thiserror::Error;

pub use documents::{create_documents, Document, DocumentKind, DocumentMetadata};
pub use embedder::{Embedder, HttpEmbedder};
pub use index::{SearchMatch, VectorIndex};

/// Documents embedded per request while building
pub const DEFAULT_BATCH_SIZE: usize = 100;

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("{0} is not set")]
    MissingApiKey(String),
    #[error("embedding request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("embedding failed: {0}")]
    Embedding(String),
    #[error("vector has {actual} dimensions, index expects {expected}")]
    Dimensions { expected: usize, actual: usize },
    #[error("index file error: {0}")]
    Io(#[from] std::io::Error),
    #[error("index serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("query must not be empty")]
    EmptyQuery,
}

pub struct SearchService {
    embedder: Arc<dyn Embedder>,
    index: VectorIndex,
}

impl SearchService {
    pub fn new(embedder: Arc<dyn Embedder>, index: VectorIndex) -> Self {
        Self { embedder, index }
    }

    /// Embed `documents` in batches and index them
    pub async fn build(
        embedder: Arc<dyn Embedder>,
        documents: Vec<Document>,
        batch_size: usize,
    ) -> Result<Self, SearchError> {
        let batch_size = batch_size.max(1);
        let total_batches = documents.len().div_ceil(batch_size);
        let mut index = VectorIndex::new();

        for (i, batch) in documents.chunks(batch_size).enumerate() {
            tracing::info!(
                "Processing batch {}/{} ({} docs)...",
                i + 1,
                total_batches,
                batch.len()
            );
            let inputs: Vec<String> = batch.iter().map(|d| d.content.clone()).collect();
            let vectors = embedder.embed(&inputs).await?;
            for (vector, document) in vectors.into_iter().zip(batch.iter().cloned()) {
                index.add(vector, document)?;
            }
        }

        Ok(Self::new(embedder, index))
    }

    /// Load a previously saved index
    pub async fn load(embedder: Arc<dyn Embedder>, path: impl AsRef<Path>) -> Result<Self, SearchError> {
        let index = VectorIndex::load(path).await?;
        tracing::info!(documents = index.len(), "Search index loaded");
        Ok(Self::new(embedder, index))
    }

    pub async fn save(&self, path: impl AsRef<Path>) -> Result<(), SearchError> {
        self.index.save(path).await
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Ranked matches for a free-text query, best first
    pub async fn embed_and_search(&self, query: &str, k: usize) -> Result<Vec<SearchMatch>, SearchError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(SearchError::EmptyQuery);
        }
        let mut vectors = self.embedder.embed(&[query.to_string()]).await?;
        let Some(vector) = vectors.pop() else {
            return Err(SearchError::Embedding("no vector for query".to_string()));
        };
        self.index.search(&vector, k)
    }
}
