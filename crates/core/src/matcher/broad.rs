//! Fallback matching when no institution could be resolved.
//!
//! Candidate authors come from an unfiltered name search. Every
//! (author, stated-institution) pair on a qualifying work is scored:
//! the name similarity must clear the name threshold, the affiliation
//! score must clear BOTH configured floors, and the survivors are
//! ranked by the weighted combined score. Institution variants of the
//! same physical organization are deliberately kept apart.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, info};

use crate::catalog::{CandidateWork, CatalogClient, CatalogError, YearRange};
use crate::names::{display_order, NameStyle};
use crate::similarity::{ascii_fold, name_ratio, AffiliationScorer};

use super::types::MatchingConfig;

// Author-search candidates considered for id collection.
const MAX_AUTHOR_CANDIDATES: usize = 10;

/// One scored (work, author, institution) survivor.
#[derive(Debug, Clone)]
pub(super) struct BroadHit {
    pub work: CandidateWork,
    pub author_name: String,
    pub author_id: String,
    pub institution_name: String,
    pub institution_id: String,
    pub institution_ror: Option<String>,
    pub author_score: f64,
    pub affiliation_score: f64,
    pub combined_score: f64,
}

pub(super) struct BroadMatcher {
    catalog: Arc<dyn CatalogClient>,
    scorer: Arc<dyn AffiliationScorer>,
    config: MatchingConfig,
}

impl BroadMatcher {
    pub(super) fn new(
        catalog: Arc<dyn CatalogClient>,
        scorer: Arc<dyn AffiliationScorer>,
        config: MatchingConfig,
    ) -> Self {
        Self {
            catalog,
            scorer,
            config,
        }
    }

    pub(super) async fn run(
        &self,
        raw_name: &str,
        style: NameStyle,
        affiliation: &str,
        years: Option<YearRange>,
    ) -> Result<Vec<BroadHit>, CatalogError> {
        let query = display_order(raw_name, style);
        let folded_input = ascii_fold(&query);

        let candidates = self.catalog.search_authors(&query, None).await?;

        let mut author_ids: Vec<String> = Vec::new();
        for candidate in candidates.into_iter().take(MAX_AUTHOR_CANDIDATES) {
            let score = name_ratio(&folded_input, &ascii_fold(&candidate.display_name));
            if score >= self.config.name_matching_threshold {
                debug!(
                    "broad candidate '{}' accepted ({:.3})",
                    candidate.display_name, score
                );
                author_ids.push(candidate.id);
            }
        }

        if author_ids.is_empty() {
            info!("no sufficiently similar authors for '{}'", raw_name);
            return Ok(Vec::new());
        }

        // Works are pooled across matching author ids, deduplicated by id.
        let mut seen_works = HashSet::new();
        let mut works = Vec::new();
        for author_id in &author_ids {
            let fetched = self.catalog.works_by_author(author_id, None, years).await?;
            for work in fetched {
                if seen_works.insert(work.id.clone()) {
                    works.push(work);
                }
            }
        }

        let mut hits = Vec::new();
        for work in works {
            hits.extend(self.score_work(&work, &folded_input, affiliation).await?);
        }

        // Combined desc; ties by author id, institution id, then work id.
        hits.sort_by(|a, b| {
            b.combined_score
                .partial_cmp(&a.combined_score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.author_id.cmp(&b.author_id))
                .then_with(|| a.institution_id.cmp(&b.institution_id))
                .then_with(|| a.work.id.cmp(&b.work.id))
        });

        info!(
            "broad match for '{}' at '{}': {} surviving rows",
            raw_name,
            affiliation,
            hits.len()
        );
        Ok(hits)
    }

    /// Score every (author, institution) pair on one work.
    async fn score_work(
        &self,
        work: &CandidateWork,
        folded_input: &str,
        affiliation: &str,
    ) -> Result<Vec<BroadHit>, CatalogError> {
        let mut hits = Vec::new();

        for authorship in &work.authorships {
            let author_score = name_ratio(folded_input, &ascii_fold(&authorship.author_name));
            if author_score < self.config.name_matching_threshold {
                continue;
            }

            for institution in &authorship.institutions {
                if institution.display_name.is_empty() {
                    continue;
                }

                let affiliation_score = self
                    .scorer
                    .score(affiliation, &institution.display_name)
                    .await
                    .map_err(|e| CatalogError::EmbeddingError(e.to_string()))?;

                // Both floors gate the candidate.
                if affiliation_score < self.config.affiliation_matching_threshold
                    || affiliation_score < self.config.minimum_affiliation_score
                {
                    continue;
                }

                let combined_score = self.config.author_weight * author_score
                    + self.config.affiliation_weight * affiliation_score;

                hits.push(BroadHit {
                    work: work.clone(),
                    author_name: authorship.author_name.clone(),
                    author_id: authorship.author_id.clone(),
                    institution_name: institution.display_name.clone(),
                    institution_id: institution.id.clone(),
                    institution_ror: institution.ror_id.clone(),
                    author_score,
                    affiliation_score,
                    combined_score,
                });
            }
        }

        Ok(hits)
    }
}
