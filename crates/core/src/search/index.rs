//! In-memory cosine-similarity index, persisted as JSON.

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::documents::Document;
use super::SearchError;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct IndexEntry {
    embedding: Vec<f32>,
    document: Document,
}

/// A ranked hit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchMatch {
    pub score: f32,
    pub document: Document,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VectorIndex {
    dimensions: Option<usize>,
    entries: Vec<IndexEntry>,
}

impl VectorIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Add a document; every vector must have the same dimensions
    pub fn add(&mut self, embedding: Vec<f32>, document: Document) -> Result<(), SearchError> {
        match self.dimensions {
            Some(dims) if dims != embedding.len() => {
                return Err(SearchError::Dimensions {
                    expected: dims,
                    actual: embedding.len(),
                })
            }
            Some(_) => {}
            None => self.dimensions = Some(embedding.len()),
        }
        self.entries.push(IndexEntry {
            embedding,
            document,
        });
        Ok(())
    }

    /// Top `k` documents by cosine similarity, best first
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchMatch>, SearchError> {
        if let Some(dims) = self.dimensions {
            if dims != query.len() {
                return Err(SearchError::Dimensions {
                    expected: dims,
                    actual: query.len(),
                });
            }
        }

        let mut matches: Vec<SearchMatch> = self
            .entries
            .iter()
            .map(|entry| SearchMatch {
                score: cosine(query, &entry.embedding),
                document: entry.document.clone(),
            })
            .collect();
        matches.sort_by(|a, b| b.score.total_cmp(&a.score));
        matches.truncate(k);
        Ok(matches)
    }

    pub async fn save(&self, path: impl AsRef<Path>) -> Result<(), SearchError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let content = serde_json::to_vec(self)?;
        tokio::fs::write(path, content).await?;
        Ok(())
    }

    pub async fn load(path: impl AsRef<Path>) -> Result<Self, SearchError> {
        let content = tokio::fs::read(path.as_ref()).await?;
        Ok(serde_json::from_slice(&content)?)
    }
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::documents::{DocumentKind, DocumentMetadata};

    fn doc(name: &str) -> Document {
        Document {
            content: format!("Location: {}", name),
            metadata: DocumentMetadata {
                id: name.to_lowercase(),
                kind: DocumentKind::Location,
                name: name.to_string(),
            },
        }
    }

    #[test]
    fn test_ranks_by_similarity() {
        let mut index = VectorIndex::new();
        index.add(vec![1.0, 0.0], doc("Earth")).unwrap();
        index.add(vec![0.0, 1.0], doc("Gazorpazorp")).unwrap();
        index.add(vec![0.7, 0.7], doc("Citadel")).unwrap();

        let hits = index.search(&[1.0, 0.1], 2).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].document.metadata.name, "Earth");
        assert_eq!(hits[1].document.metadata.name, "Citadel");
        assert!(hits[0].score >= hits[1].score);
    }

    #[test]
    fn test_rejects_mismatched_dimensions() {
        let mut index = VectorIndex::new();
        index.add(vec![1.0, 0.0], doc("Earth")).unwrap();
        assert!(matches!(
            index.add(vec![1.0], doc("Bad")),
            Err(SearchError::Dimensions { expected: 2, actual: 1 })
        ));
        assert!(index.search(&[1.0, 0.0, 0.0], 1).is_err());
    }

    #[test]
    fn test_zero_vector_scores_zero() {
        assert_eq!(cosine(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index").join("vectors.json");

        let mut index = VectorIndex::new();
        index.add(vec![0.5, 0.5], doc("Anatomy Park")).unwrap();
        index.save(&path).await.unwrap();

        let loaded = VectorIndex::load(&path).await.unwrap();
        assert_eq!(loaded.len(), 1);
        let hits = loaded.search(&[0.5, 0.5], 1).unwrap();
        assert_eq!(hits[0].document.metadata.name, "Anatomy Park");
    }
}
