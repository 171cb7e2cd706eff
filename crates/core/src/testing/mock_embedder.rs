//! Mock embedding and affiliation-scoring implementations for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::similarity::{AffiliationScorer, EmbedderError, TextEmbedder};

/// Mock implementation of the TextEmbedder trait.
///
/// Returns pre-registered vectors per input string and fails on
/// anything unregistered.
pub struct MockEmbedder {
    vectors: Arc<RwLock<HashMap<String, Vec<f32>>>>,
    /// If set, the next operation will fail with this error.
    next_error: Arc<RwLock<Option<EmbedderError>>>,
}

impl Default for MockEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

impl MockEmbedder {
    pub fn new() -> Self {
        Self {
            vectors: Arc::new(RwLock::new(HashMap::new())),
            next_error: Arc::new(RwLock::new(None)),
        }
    }

    /// Register the vector returned for a text.
    pub async fn set_vector(&self, text: &str, vector: Vec<f32>) {
        self.vectors
            .write()
            .await
            .insert(text.to_lowercase(), vector);
    }

    /// Configure the next operation to fail with the given error.
    pub async fn set_next_error(&self, error: EmbedderError) {
        *self.next_error.write().await = Some(error);
    }
}

#[async_trait]
impl TextEmbedder for MockEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedderError> {
        if let Some(err) = self.next_error.write().await.take() {
            return Err(err);
        }

        self.vectors
            .read()
            .await
            .get(&text.to_lowercase())
            .cloned()
            .ok_or_else(|| EmbedderError::RequestFailed(format!("no vector for {:?}", text)))
    }
}

/// Affiliation scorer with scripted pair scores.
///
/// Pairs are keyed by (input, candidate) lowercased; unscripted pairs
/// fall back to a configurable default.
pub struct ScriptedAffiliationScorer {
    scores: Arc<RwLock<HashMap<(String, String), f64>>>,
    default_score: f64,
}

impl ScriptedAffiliationScorer {
    pub fn new(default_score: f64) -> Self {
        Self {
            scores: Arc::new(RwLock::new(HashMap::new())),
            default_score,
        }
    }

    /// Script the score returned for an (input, candidate) pair.
    pub async fn set_score(&self, input: &str, candidate: &str, score: f64) {
        self.scores
            .write()
            .await
            .insert((input.to_lowercase(), candidate.to_lowercase()), score);
    }
}

#[async_trait]
impl AffiliationScorer for ScriptedAffiliationScorer {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn score(&self, input: &str, candidate: &str) -> Result<f64, EmbedderError> {
        let key = (input.to_lowercase(), candidate.to_lowercase());
        Ok(self
            .scores
            .read()
            .await
            .get(&key)
            .copied()
            .unwrap_or(self.default_score))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_embedder_returns_registered_vectors() {
        let embedder = MockEmbedder::new();
        embedder.set_vector("Lab A", vec![1.0, 0.0]).await;

        assert_eq!(embedder.embed("lab a").await.unwrap(), vec![1.0, 0.0]);
        assert!(embedder.embed("lab b").await.is_err());
    }

    #[tokio::test]
    async fn test_scripted_scorer_falls_back_to_default() {
        let scorer = ScriptedAffiliationScorer::new(0.5);
        scorer.set_score("Dept of CS, MIT", "MIT", 0.95).await;

        assert_eq!(scorer.score("Dept of CS, MIT", "MIT").await.unwrap(), 0.95);
        assert_eq!(scorer.score("anything", "else").await.unwrap(), 0.5);
    }
}
