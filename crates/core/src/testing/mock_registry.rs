//! Mock registry client for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::catalog::{CatalogError, RegistryClient, RegistryMatch};

/// Mock implementation of the RegistryClient trait.
///
/// Matches are keyed by the lowercased affiliation string; anything
/// unregistered resolves to no matches.
pub struct MockRegistryClient {
    matches: Arc<RwLock<HashMap<String, Vec<RegistryMatch>>>>,
    /// Recorded affiliation queries.
    queries: Arc<RwLock<Vec<String>>>,
    /// If set, the next operation will fail with this error.
    next_error: Arc<RwLock<Option<CatalogError>>>,
}

impl Default for MockRegistryClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MockRegistryClient {
    /// Create a new empty mock registry.
    pub fn new() -> Self {
        Self {
            matches: Arc::new(RwLock::new(HashMap::new())),
            queries: Arc::new(RwLock::new(Vec::new())),
            next_error: Arc::new(RwLock::new(None)),
        }
    }

    /// Register the matches returned for an affiliation string.
    pub async fn set_matches(&self, affiliation: &str, matches: Vec<RegistryMatch>) {
        self.matches
            .write()
            .await
            .insert(affiliation.to_lowercase(), matches);
    }

    /// Get all recorded affiliation queries.
    pub async fn recorded_queries(&self) -> Vec<String> {
        self.queries.read().await.clone()
    }

    /// Configure the next operation to fail with the given error.
    pub async fn set_next_error(&self, error: CatalogError) {
        *self.next_error.write().await = Some(error);
    }
}

#[async_trait]
impl RegistryClient for MockRegistryClient {
    async fn match_affiliation(&self, affiliation: &str) -> Result<Vec<RegistryMatch>, CatalogError> {
        if let Some(err) = self.next_error.write().await.take() {
            return Err(err);
        }

        self.queries.write().await.push(affiliation.to_string());

        Ok(self
            .matches
            .read()
            .await
            .get(&affiliation.to_lowercase())
            .cloned()
            .unwrap_or_default())
    }
}
