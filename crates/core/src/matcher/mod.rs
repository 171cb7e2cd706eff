//! The matching engine: title matching (mode A) and author-affiliation
//! resolution (mode B).
//!
//! The engine owns trait objects for the catalog, the registry and the
//! affiliation scorer, so tests substitute deterministic fakes. It
//! keeps no state across calls; the shared health monitors live inside
//! the clients.

mod author;
mod broad;
mod funding;
mod institution;
mod title;
mod types;

pub use institution::{
    CatalogInstitutionSearch, InstitutionResolver, InstitutionStrategy, RegistryLookup,
    ResolvedInstitution,
};
pub use types::{
    AuthorAffiliationRow, AwardMatchType, FundingCheck, InputRecord, MatchError, MatchMode,
    MatchStatus, MatchingConfig, SearchMethod, TitleMatch,
};

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{info, warn};

use crate::catalog::{CandidateWork, CatalogClient, RegistryClient, YearRange};
use crate::names::{parse_name, split_authors};
use crate::similarity::AffiliationScorer;

use author::AuthorDisambiguator;
use broad::BroadMatcher;
use title::TitleMatcher;

/// Matching engine for both modes.
pub struct MatchEngine {
    catalog: Arc<dyn CatalogClient>,
    scorer: Arc<dyn AffiliationScorer>,
    config: MatchingConfig,
    title: TitleMatcher,
    resolver: InstitutionResolver,
}

impl MatchEngine {
    pub fn new(
        catalog: Arc<dyn CatalogClient>,
        registry: Arc<dyn RegistryClient>,
        scorer: Arc<dyn AffiliationScorer>,
        config: MatchingConfig,
    ) -> Self {
        let resolver = InstitutionResolver::new(vec![
            Box::new(CatalogInstitutionSearch::new(
                Arc::clone(&catalog),
                config.institution_acceptance_threshold,
            )),
            Box::new(RegistryLookup::new(
                registry,
                config.institution_acceptance_threshold,
            )),
        ]);

        Self {
            title: TitleMatcher::new(Arc::clone(&catalog), config.clone()),
            catalog,
            scorer,
            config,
            resolver,
        }
    }

    pub fn config(&self) -> &MatchingConfig {
        &self.config
    }

    /// Mode A: resolve one record to exactly one [`TitleMatch`].
    pub async fn match_by_title(&self, record: &InputRecord) -> Result<TitleMatch, MatchError> {
        self.title.run(record).await
    }

    /// Mode B: enumerate an author's works at the record's affiliation.
    ///
    /// Authors are processed in input order and each author's rows stay
    /// contiguous. Duplicate `(award_id, author, affiliation, work)`
    /// tuples are dropped.
    pub async fn match_by_author_affiliation(
        &self,
        record: &InputRecord,
    ) -> Result<Vec<AuthorAffiliationRow>, MatchError> {
        let authors_field = record
            .authors
            .as_deref()
            .filter(|a| !a.trim().is_empty())
            .ok_or_else(|| MatchError::InvalidRecord("record has no authors".to_string()))?;
        let affiliation = record
            .affiliation
            .as_deref()
            .filter(|a| !a.trim().is_empty())
            .ok_or_else(|| MatchError::InvalidRecord("record has no affiliation".to_string()))?;

        let authors = split_authors(authors_field, &self.config.author_separator);
        if authors.is_empty() {
            return Err(MatchError::InvalidRecord(
                "author field split to nothing".to_string(),
            ));
        }

        // Every name must parse before any catalog call; an ambiguous
        // single token fails the record rather than being guessed at.
        for raw_author in &authors {
            parse_name(raw_author, self.config.name_style)?;
        }

        // Forward-only window; publication before the award year never counts.
        let years = record
            .year
            .map(|y| YearRange::forward(y, self.config.year_search_window));

        // One resolution per record; every author shares the affiliation.
        let resolved = self.resolver.resolve(affiliation).await?;

        let mut rows = Vec::new();
        let mut seen = HashSet::new();

        for raw_author in &authors {
            match &resolved {
                Some(resolved) => {
                    self.resolved_path(record, raw_author, resolved, years, &mut rows, &mut seen)
                        .await?;
                }
                None => {
                    self.broad_path(record, raw_author, affiliation, years, &mut rows, &mut seen)
                        .await?;
                }
            }
        }

        info!(
            "record {}: {} author-affiliation rows",
            record.award_id,
            rows.len()
        );
        Ok(rows)
    }

    /// Institution-resolved path: disambiguate, then the strictly
    /// filtered works fetch. An empty fetch emits nothing.
    async fn resolved_path(
        &self,
        record: &InputRecord,
        raw_author: &str,
        resolved: &ResolvedInstitution,
        years: Option<YearRange>,
        rows: &mut Vec<AuthorAffiliationRow>,
        seen: &mut HashSet<(String, String, String)>,
    ) -> Result<(), MatchError> {
        let disambiguator =
            AuthorDisambiguator::new(Arc::clone(&self.catalog), self.config.name_matching_threshold);

        let Some(author) = disambiguator
            .disambiguate(raw_author, self.config.name_style, &resolved.institution)
            .await?
        else {
            warn!(
                "record {}: no confident author for '{}' at '{}'",
                record.award_id, raw_author, resolved.institution.display_name
            );
            return Ok(());
        };

        let works = disambiguator
            .qualifying_works(&author, &resolved.institution, years)
            .await?;

        let combined = self.config.author_weight * author.name_score
            + self.config.affiliation_weight * resolved.confidence;

        for work in works {
            let key = (
                author.author.id.clone(),
                resolved.institution.id.clone(),
                work.id.clone(),
            );
            if !seen.insert(key) {
                continue;
            }

            let (year_match, year_difference) = self.year_annotation(record.year, &work);
            rows.push(AuthorAffiliationRow {
                award_id: record.award_id.clone(),
                input_author: raw_author.to_string(),
                matched_author: author.author.display_name.clone(),
                matched_author_id: author.author.id.clone(),
                matched_affiliation: resolved.institution.display_name.clone(),
                matched_affiliation_id: resolved.institution.id.clone(),
                matched_affiliation_ror: resolved.institution.ror_id.clone(),
                work_id: work.id.clone(),
                work_title: work.title.clone(),
                publication_year: work.publication_year,
                doi: work.doi.clone(),
                author_match_score: author.name_score,
                affiliation_match_score: resolved.confidence,
                combined_match_score: combined,
                year_match,
                year_difference,
            });
        }

        Ok(())
    }

    /// Institution-unresolved path: weighted broad matching.
    async fn broad_path(
        &self,
        record: &InputRecord,
        raw_author: &str,
        affiliation: &str,
        years: Option<YearRange>,
        rows: &mut Vec<AuthorAffiliationRow>,
        seen: &mut HashSet<(String, String, String)>,
    ) -> Result<(), MatchError> {
        let matcher = BroadMatcher::new(
            Arc::clone(&self.catalog),
            Arc::clone(&self.scorer),
            self.config.clone(),
        );

        let hits = matcher
            .run(raw_author, self.config.name_style, affiliation, years)
            .await?;

        for hit in hits {
            let key = (
                hit.author_id.clone(),
                hit.institution_id.clone(),
                hit.work.id.clone(),
            );
            if !seen.insert(key) {
                continue;
            }

            let (year_match, year_difference) = self.year_annotation(record.year, &hit.work);
            rows.push(AuthorAffiliationRow {
                award_id: record.award_id.clone(),
                input_author: raw_author.to_string(),
                matched_author: hit.author_name,
                matched_author_id: hit.author_id,
                matched_affiliation: hit.institution_name,
                matched_affiliation_id: hit.institution_id,
                matched_affiliation_ror: hit.institution_ror,
                work_id: hit.work.id.clone(),
                work_title: hit.work.title.clone(),
                publication_year: hit.work.publication_year,
                doi: hit.work.doi.clone(),
                author_match_score: hit.author_score,
                affiliation_match_score: hit.affiliation_score,
                combined_match_score: hit.combined_score,
                year_match,
                year_difference,
            });
        }

        Ok(())
    }

    /// Signed distance from the award year; a match means the work
    /// falls inside the forward window.
    fn year_annotation(
        &self,
        input_year: Option<i32>,
        work: &CandidateWork,
    ) -> (Option<bool>, Option<i32>) {
        match (input_year, work.publication_year) {
            (Some(input), Some(published)) => {
                let diff = published - input;
                (
                    Some(diff >= 0 && diff <= self.config.year_search_window),
                    Some(diff),
                )
            }
            _ => (None, None),
        }
    }
}
