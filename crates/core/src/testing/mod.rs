//! Testing utilities and mock implementations.
//!
//! This module provides mock implementations of the external service
//! traits, allowing end-to-end matching tests without real infrastructure.
//!
//! # Example
//!
//! ```rust,ignore
//! use grantmatch_core::testing::{fixtures, MockCatalogClient, MockRegistryClient};
//!
//! let catalog = MockCatalogClient::new();
//! let registry = MockRegistryClient::new();
//!
//! // Configure mock responses
//! catalog.add_work(fixtures::work("W1", "A study of things", Some(2020))).await;
//!
//! // Use in a MatchEngine...
//! ```

mod mock_catalog;
mod mock_embedder;
mod mock_registry;

pub use mock_catalog::{MockCatalogClient, RecordedCatalogQuery};
pub use mock_embedder::{MockEmbedder, ScriptedAffiliationScorer};
pub use mock_registry::MockRegistryClient;

/// Test fixtures and helper functions.
pub mod fixtures {
    use crate::catalog::{
        AffiliationRecord, AuthorCandidate, Authorship, CandidateWork, Grant, Institution,
        RegistryMatch,
    };

    /// Create a test institution with no registry id or aliases.
    pub fn institution(id: &str, display_name: &str) -> Institution {
        Institution {
            id: id.to_string(),
            display_name: display_name.to_string(),
            ror_id: None,
            aliases: Vec::new(),
            country_code: None,
        }
    }

    /// Create a test authorship credit.
    pub fn authorship(author_id: &str, name: &str, institutions: Vec<Institution>) -> Authorship {
        Authorship {
            author_id: author_id.to_string(),
            author_name: name.to_string(),
            orcid: None,
            institutions,
        }
    }

    /// Create a test work with no authors or funding.
    pub fn work(id: &str, title: &str, year: Option<i32>) -> CandidateWork {
        CandidateWork {
            id: id.to_string(),
            title: title.to_string(),
            publication_year: year,
            publication_date: year.map(|y| format!("{}-06-15", y)),
            doi: None,
            work_type: Some("article".to_string()),
            language: Some("en".to_string()),
            cited_by_count: 0,
            is_retracted: false,
            authorships: Vec::new(),
            grants: Vec::new(),
            venue: None,
            open_access: None,
            best_oa_location: None,
            topics: Vec::new(),
            abstract_text: None,
        }
    }

    /// Create a test author candidate affiliated with the given institutions.
    pub fn author(id: &str, display_name: &str, institutions: Vec<Institution>) -> AuthorCandidate {
        AuthorCandidate {
            id: id.to_string(),
            display_name: display_name.to_string(),
            orcid: None,
            affiliations: institutions
                .into_iter()
                .map(|institution| AffiliationRecord {
                    institution,
                    years: vec![2018, 2019, 2020],
                })
                .collect(),
        }
    }

    /// Create a test funding acknowledgment.
    pub fn grant(funder_id: &str, funder_name: &str, award_id: Option<&str>) -> Grant {
        Grant {
            funder_id: funder_id.to_string(),
            funder_display_name: funder_name.to_string(),
            award_id: award_id.map(str::to_string),
        }
    }

    /// Create a test registry match.
    pub fn registry_match(institution: Institution, score: f64, chosen: bool) -> RegistryMatch {
        RegistryMatch {
            institution,
            score,
            chosen,
        }
    }
}
