//! Mock catalog client for testing.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::catalog::{
    AuthorCandidate, CandidateWork, CatalogClient, CatalogError, Institution, YearRange,
};

/// A recorded catalog query for test assertions.
#[derive(Debug, Clone)]
pub enum RecordedCatalogQuery {
    SearchWorks {
        query: String,
        years: Option<YearRange>,
        limit: u32,
    },
    GetWork {
        id: String,
    },
    SearchAuthors {
        query: String,
        institution_id: Option<String>,
    },
    SearchInstitutions {
        query: String,
        limit: u32,
    },
    WorksByAuthor {
        author_id: String,
        institution_id: Option<String>,
        years: Option<YearRange>,
    },
}

/// Mock implementation of the CatalogClient trait.
///
/// Provides controllable behavior for testing:
/// - Return configurable works, authors, and institutions
/// - Track queries for assertions
/// - Simulate failures
pub struct MockCatalogClient {
    /// Works, in insertion order.
    works: Arc<RwLock<Vec<CandidateWork>>>,
    /// Author candidates, in insertion order.
    authors: Arc<RwLock<Vec<AuthorCandidate>>>,
    /// Institutions, in insertion order.
    institutions: Arc<RwLock<Vec<Institution>>>,
    /// Recorded queries.
    queries: Arc<RwLock<Vec<RecordedCatalogQuery>>>,
    /// If set, the next operation will fail with this error.
    next_error: Arc<RwLock<Option<CatalogError>>>,
}

impl Default for MockCatalogClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MockCatalogClient {
    /// Create a new empty mock catalog.
    pub fn new() -> Self {
        Self {
            works: Arc::new(RwLock::new(Vec::new())),
            authors: Arc::new(RwLock::new(Vec::new())),
            institutions: Arc::new(RwLock::new(Vec::new())),
            queries: Arc::new(RwLock::new(Vec::new())),
            next_error: Arc::new(RwLock::new(None)),
        }
    }

    /// Add a work.
    pub async fn add_work(&self, work: CandidateWork) {
        self.works.write().await.push(work);
    }

    /// Replace all works at once.
    pub async fn set_works(&self, works: Vec<CandidateWork>) {
        *self.works.write().await = works;
    }

    /// Add an author candidate.
    pub async fn add_author(&self, author: AuthorCandidate) {
        self.authors.write().await.push(author);
    }

    /// Replace all author candidates at once.
    pub async fn set_authors(&self, authors: Vec<AuthorCandidate>) {
        *self.authors.write().await = authors;
    }

    /// Add an institution.
    pub async fn add_institution(&self, institution: Institution) {
        self.institutions.write().await.push(institution);
    }

    /// Get all recorded queries.
    pub async fn recorded_queries(&self) -> Vec<RecordedCatalogQuery> {
        self.queries.read().await.clone()
    }

    /// Get the number of queries performed.
    pub async fn query_count(&self) -> usize {
        self.queries.read().await.len()
    }

    /// Configure the next operation to fail with the given error.
    pub async fn set_next_error(&self, error: CatalogError) {
        *self.next_error.write().await = Some(error);
    }

    async fn take_error(&self) -> Option<CatalogError> {
        self.next_error.write().await.take()
    }

    async fn record(&self, query: RecordedCatalogQuery) {
        self.queries.write().await.push(query);
    }
}

/// True when any query word longer than two characters appears in the title.
fn title_matches(title: &str, query: &str) -> bool {
    let title_lower = title.to_lowercase();
    let mut any = false;
    for word in query.to_lowercase().split_whitespace() {
        if word.len() <= 2 {
            continue;
        }
        any = true;
        if title_lower.contains(word) {
            return true;
        }
    }
    // A query of only short words falls back to plain containment
    !any && title_lower.contains(query.to_lowercase().trim())
}

/// True when the query surname (its last token) appears among the
/// candidate's name tokens.
fn name_matches(display_name: &str, query: &str) -> bool {
    let query_lower = query.to_lowercase();
    let Some(surname) = query_lower.split_whitespace().last() else {
        return false;
    };
    display_name
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .any(|token| token == surname)
}

fn in_years(year: Option<i32>, range: Option<YearRange>) -> bool {
    match range {
        None => true,
        Some(r) => year.is_some_and(|y| r.contains(y)),
    }
}

#[async_trait]
impl CatalogClient for MockCatalogClient {
    async fn search_works(
        &self,
        title: &str,
        years: Option<YearRange>,
        limit: u32,
    ) -> Result<Vec<CandidateWork>, CatalogError> {
        if let Some(err) = self.take_error().await {
            return Err(err);
        }

        self.record(RecordedCatalogQuery::SearchWorks {
            query: title.to_string(),
            years,
            limit,
        })
        .await;

        let works = self.works.read().await;
        let results: Vec<CandidateWork> = works
            .iter()
            .filter(|w| title_matches(&w.title, title) && in_years(w.publication_year, years))
            .take(limit as usize)
            .cloned()
            .collect();

        Ok(results)
    }

    async fn get_work(&self, id: &str) -> Result<CandidateWork, CatalogError> {
        if let Some(err) = self.take_error().await {
            return Err(err);
        }

        self.record(RecordedCatalogQuery::GetWork { id: id.to_string() })
            .await;

        let works = self.works.read().await;
        let found = if let Some(doi) = id.strip_prefix("doi:") {
            let doi_lower = doi.to_lowercase();
            works.iter().find(|w| {
                w.doi
                    .as_deref()
                    .is_some_and(|d| d.to_lowercase().ends_with(&doi_lower))
            })
        } else {
            works.iter().find(|w| w.id == id)
        };

        found
            .cloned()
            .ok_or_else(|| CatalogError::NotFound(format!("work {} not found", id)))
    }

    async fn search_authors(
        &self,
        query: &str,
        institution_id: Option<&str>,
    ) -> Result<Vec<AuthorCandidate>, CatalogError> {
        if let Some(err) = self.take_error().await {
            return Err(err);
        }

        self.record(RecordedCatalogQuery::SearchAuthors {
            query: query.to_string(),
            institution_id: institution_id.map(str::to_string),
        })
        .await;

        let authors = self.authors.read().await;
        let results: Vec<AuthorCandidate> = authors
            .iter()
            .filter(|a| {
                let by_name = name_matches(&a.display_name, query);
                let by_institution = institution_id.is_none_or(|id| {
                    a.affiliations.iter().any(|aff| aff.institution.id == id)
                });
                by_name && by_institution
            })
            .cloned()
            .collect();

        Ok(results)
    }

    async fn search_institutions(
        &self,
        query: &str,
        limit: u32,
    ) -> Result<Vec<Institution>, CatalogError> {
        if let Some(err) = self.take_error().await {
            return Err(err);
        }

        self.record(RecordedCatalogQuery::SearchInstitutions {
            query: query.to_string(),
            limit,
        })
        .await;

        let query_lower = query.to_lowercase();
        let institutions = self.institutions.read().await;
        let results: Vec<Institution> = institutions
            .iter()
            .filter(|i| {
                let name = i.display_name.to_lowercase();
                name.contains(&query_lower)
                    || query_lower.contains(&name)
                    || i.aliases
                        .iter()
                        .any(|a| a.to_lowercase() == query_lower)
            })
            .take(limit as usize)
            .cloned()
            .collect();

        Ok(results)
    }

    async fn works_by_author(
        &self,
        author_id: &str,
        institution_id: Option<&str>,
        years: Option<YearRange>,
    ) -> Result<Vec<CandidateWork>, CatalogError> {
        if let Some(err) = self.take_error().await {
            return Err(err);
        }

        self.record(RecordedCatalogQuery::WorksByAuthor {
            author_id: author_id.to_string(),
            institution_id: institution_id.map(str::to_string),
            years,
        })
        .await;

        let works = self.works.read().await;
        let results: Vec<CandidateWork> = works
            .iter()
            .filter(|w| {
                let by_author = w.authorships.iter().any(|a| {
                    a.author_id == author_id
                        && institution_id
                            .is_none_or(|id| a.institutions.iter().any(|i| i.id == id))
                });
                by_author && in_years(w.publication_year, years)
            })
            .cloned()
            .collect();

        Ok(results)
    }
}
