//! Author disambiguation at a resolved institution.
//!
//! Candidates come from the catalog's author search restricted to the
//! institution; the best ASCII-normalized name similarity must clear
//! the threshold, else disambiguation fails. The follow-up works fetch
//! keeps the institution filter and, when a year is given, a
//! forward-only window. An empty filtered fetch is a real answer:
//! zero rows, never a widened search.

use std::sync::Arc;

use tracing::{debug, info};

use crate::catalog::{
    AuthorCandidate, CandidateWork, CatalogClient, CatalogError, Institution, YearRange,
};
use crate::names::{display_order, NameStyle};
use crate::similarity::{ascii_fold, name_ratio};

/// The selected catalog author and the score that selected them.
#[derive(Debug, Clone)]
pub struct DisambiguatedAuthor {
    pub author: AuthorCandidate,
    pub name_score: f64,
}

pub(super) struct AuthorDisambiguator {
    catalog: Arc<dyn CatalogClient>,
    threshold: f64,
}

impl AuthorDisambiguator {
    pub(super) fn new(catalog: Arc<dyn CatalogClient>, threshold: f64) -> Self {
        Self { catalog, threshold }
    }

    /// Pick the catalog author at `institution` best matching the input
    /// name, or `None` when nothing clears the threshold.
    pub(super) async fn disambiguate(
        &self,
        raw_name: &str,
        style: NameStyle,
        institution: &Institution,
    ) -> Result<Option<DisambiguatedAuthor>, CatalogError> {
        let query = display_order(raw_name, style);
        let candidates = self
            .catalog
            .search_authors(&query, Some(&institution.id))
            .await?;

        let folded_input = ascii_fold(&query);

        let mut best: Option<DisambiguatedAuthor> = None;
        for candidate in candidates {
            let score = name_ratio(&folded_input, &ascii_fold(&candidate.display_name));
            debug!(
                "author candidate '{}' scored {:.3} against '{}'",
                candidate.display_name, score, query
            );
            // Ties break toward the smaller id for determinism.
            let better = match &best {
                None => true,
                Some(b) => {
                    score > b.name_score
                        || (score == b.name_score && candidate.id < b.author.id)
                }
            };
            if better {
                best = Some(DisambiguatedAuthor {
                    author: candidate,
                    name_score: score,
                });
            }
        }

        match best {
            Some(b) if b.name_score >= self.threshold => {
                info!(
                    "'{}' disambiguated to {} ({:.3})",
                    raw_name, b.author.display_name, b.name_score
                );
                Ok(Some(b))
            }
            Some(b) => {
                info!(
                    "'{}' best candidate {} below threshold ({:.3} < {:.3})",
                    raw_name, b.author.display_name, b.name_score, self.threshold
                );
                Ok(None)
            }
            None => {
                info!("no author candidates for '{}'", raw_name);
                Ok(None)
            }
        }
    }

    /// Works by the selected author at the institution, year-filtered.
    pub(super) async fn qualifying_works(
        &self,
        author: &DisambiguatedAuthor,
        institution: &Institution,
        years: Option<YearRange>,
    ) -> Result<Vec<CandidateWork>, CatalogError> {
        self.catalog
            .works_by_author(&author.author.id, Some(&institution.id), years)
            .await
    }
}
