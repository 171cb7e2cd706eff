//! Affiliation similarity strategies.
//!
//! Two interchangeable implementations of one capability: a fuzzy text
//! ratio and a cosine similarity over text embeddings. Both honor the
//! same [0, 1] output contract, so call sites never branch on which one
//! is configured.

use async_trait::async_trait;
use thiserror::Error;

use super::{ascii_fold, cosine_similarity, name_ratio};

/// Errors from the text-embedding capability.
#[derive(Debug, Error)]
pub enum EmbedderError {
    #[error("embedding request failed: {0}")]
    RequestFailed(String),

    #[error("embedding service unavailable: {0}")]
    Unavailable(String),
}

/// Capability: turn a string into a fixed-dimension vector.
///
/// Implemented by an external embedding service client; used only inside
/// [`EmbeddingAffiliationScorer`].
#[async_trait]
pub trait TextEmbedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedderError>;
}

/// Capability: score how well a raw affiliation string matches a
/// candidate institution name. Output is always in [0, 1].
#[async_trait]
pub trait AffiliationScorer: Send + Sync {
    /// Name of this scorer for logging.
    fn name(&self) -> &str;

    async fn score(&self, input: &str, candidate: &str) -> Result<f64, EmbedderError>;
}

/// Fuzzy text scorer: normalized containment counts as a full match,
/// otherwise Jaro-Winkler on the folded strings.
#[derive(Debug, Default)]
pub struct FuzzyAffiliationScorer;

#[async_trait]
impl AffiliationScorer for FuzzyAffiliationScorer {
    fn name(&self) -> &str {
        "fuzzy"
    }

    async fn score(&self, input: &str, candidate: &str) -> Result<f64, EmbedderError> {
        if input.is_empty() || candidate.is_empty() {
            return Ok(0.0);
        }
        let a = ascii_fold(input);
        let b = ascii_fold(candidate);
        if a.is_empty() || b.is_empty() {
            return Ok(0.0);
        }
        if a.contains(&b) || b.contains(&a) {
            return Ok(1.0);
        }
        Ok(name_ratio(&a, &b))
    }
}

/// Embedding-based scorer: cosine similarity between vectors from a
/// [`TextEmbedder`]. Trivially-equal strings short-circuit to 1.0
/// without a round trip.
pub struct EmbeddingAffiliationScorer<E: TextEmbedder> {
    embedder: E,
}

impl<E: TextEmbedder> EmbeddingAffiliationScorer<E> {
    pub fn new(embedder: E) -> Self {
        Self { embedder }
    }
}

#[async_trait]
impl<E: TextEmbedder> AffiliationScorer for EmbeddingAffiliationScorer<E> {
    fn name(&self) -> &str {
        "embedding"
    }

    async fn score(&self, input: &str, candidate: &str) -> Result<f64, EmbedderError> {
        if input.is_empty() || candidate.is_empty() {
            return Ok(0.0);
        }
        let a = input.trim().to_lowercase();
        let b = candidate.trim().to_lowercase();
        if a == b {
            return Ok(1.0);
        }
        let va = self.embedder.embed(&a).await?;
        let vb = self.embedder.embed(&b).await?;
        Ok(cosine_similarity(&va, &vb))
    }
}
