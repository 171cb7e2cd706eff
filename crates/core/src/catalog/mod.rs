//! Clients for the scholarly works catalog and the organization registry.
//!
//! The catalog (OpenAlex-compatible) answers work, author and institution
//! queries; the registry (ROR-compatible) disambiguates free-text
//! affiliation strings. Both clients rate-limit themselves and feed the
//! shared endpoint health monitors.

mod openalex;
mod ror;
mod types;

pub use openalex::{short_id, OpenAlexClient, OpenAlexConfig};
pub use ror::{RorClient, RorConfig};
pub use types::*;

use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur when querying the catalog or the registry.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Resource not found (404).
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// API returned an error.
    #[error("API error: {status} - {message}")]
    ApiError { status: u16, message: String },

    /// Failed to parse response.
    #[error("Failed to parse response: {0}")]
    ParseError(String),

    /// Embedding service failed while scoring an affiliation.
    #[error("Embedding service error: {0}")]
    EmbeddingError(String),

    /// All retry attempts failed.
    #[error("Retries exhausted after {attempts} attempts: {last_error}")]
    RetriesExhausted { attempts: u32, last_error: String },

    /// The endpoint health monitor has tripped; no further requests allowed.
    #[error("Endpoint {endpoint} is unhealthy: {reason}")]
    CircuitOpen { endpoint: String, reason: String },
}

impl CatalogError {
    /// True when the run should stop instead of moving to the next record.
    pub fn is_fatal(&self) -> bool {
        matches!(self, CatalogError::CircuitOpen { .. })
    }
}

/// Trait for scholarly works catalog clients.
#[async_trait]
pub trait CatalogClient: Send + Sync {
    /// Full-text search for works by title, optionally year-filtered.
    async fn search_works(
        &self,
        title: &str,
        years: Option<YearRange>,
        limit: u32,
    ) -> Result<Vec<CandidateWork>, CatalogError>;

    /// Fetch one work by catalog id or DOI.
    async fn get_work(&self, id: &str) -> Result<CandidateWork, CatalogError>;

    /// Search for authors by name, optionally restricted to an institution.
    async fn search_authors(
        &self,
        query: &str,
        institution_id: Option<&str>,
    ) -> Result<Vec<AuthorCandidate>, CatalogError>;

    /// Search for institutions by name.
    async fn search_institutions(
        &self,
        query: &str,
        limit: u32,
    ) -> Result<Vec<Institution>, CatalogError>;

    /// All works by an author, optionally restricted to an institution
    /// and a year range.
    ///
    /// Paginates through the full result set; an empty vec means the
    /// author genuinely has no qualifying works.
    async fn works_by_author(
        &self,
        author_id: &str,
        institution_id: Option<&str>,
        years: Option<YearRange>,
    ) -> Result<Vec<CandidateWork>, CatalogError>;
}

/// Trait for organization registry clients.
#[async_trait]
pub trait RegistryClient: Send + Sync {
    /// Disambiguate a free-text affiliation string to registry records.
    async fn match_affiliation(
        &self,
        affiliation: &str,
    ) -> Result<Vec<RegistryMatch>, CatalogError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_circuit_open_is_fatal() {
        let err = CatalogError::CircuitOpen {
            endpoint: "works".to_string(),
            reason: "error rate 0.9 over 300s".to_string(),
        };
        assert!(err.is_fatal());
        assert!(!CatalogError::NotFound("W123".to_string()).is_fatal());
    }
}
