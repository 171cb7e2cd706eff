//! Title matching: normalize, search exact then fuzzy, validate.
//!
//! The search runs as a small state machine. An exact-stage query uses
//! the cleaned title; the fuzzy stage relaxes it (aggressive stopword
//! normalization, then truncation) over the same year window. A
//! candidate is accepted only when its title ratio clears the
//! similarity threshold; author and year validation afterwards annotate
//! the result without ever reversing acceptance.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::catalog::{CandidateWork, CatalogClient, CatalogError, YearRange};
use crate::doi::{extract_doi, is_valid_doi};
use crate::names::{parse_name, split_authors, NameStyle};
use crate::normalizer::{clean_title_for_search, normalize_text, normalize_title};
use crate::similarity::{ascii_fold, name_ratio, title_ratio};

use super::funding;
use super::types::{
    InputRecord, MatchError, MatchStatus, MatchingConfig, SearchMethod, TitleMatch,
};

// A relaxed query keeps at most this many leading words.
const FUZZY_MAX_WORDS: usize = 10;

pub(super) struct TitleMatcher {
    catalog: Arc<dyn CatalogClient>,
    config: MatchingConfig,
}

impl TitleMatcher {
    pub(super) fn new(catalog: Arc<dyn CatalogClient>, config: MatchingConfig) -> Self {
        Self { catalog, config }
    }

    /// Resolve one record to exactly one [`TitleMatch`].
    ///
    /// Recoverable failures become a `Failed` result; only a tripped
    /// health monitor propagates as an error.
    pub(super) async fn run(&self, record: &InputRecord) -> Result<TitleMatch, MatchError> {
        let Some(title) = record.title.as_deref().filter(|t| !t.trim().is_empty()) else {
            warn!("record {} has no title", record.award_id);
            return Ok(TitleMatch::failed(&record.award_id, "no_title"));
        };

        let normalized = normalize_title(title);
        let mut result = TitleMatch::empty(&record.award_id);
        result.cleaned_title = Some(normalized.cleaned.clone());
        result.extracted_date = normalized.extracted_date;
        result.date_format = normalized.date_format;

        // A DOI identifies the work outright; no search needed.
        if let Some(work) = self.try_doi_fetch(record).await? {
            info!(
                "record {} resolved by DOI to {}",
                record.award_id, work.id
            );
            self.accept(&mut result, record, work, 100, SearchMethod::Exact);
            return Ok(result);
        }

        let years = record
            .year
            .map(|y| YearRange::around(y, self.config.year_tolerance));

        let exact_query = clean_title_for_search(title, false);
        match self.search_stage(title, &exact_query, years).await {
            Ok(Some((work, ratio))) => {
                info!(
                    "record {} matched exact with ratio {}",
                    record.award_id, ratio
                );
                self.accept(&mut result, record, work, ratio, SearchMethod::Exact);
                return Ok(result);
            }
            Ok(None) => {}
            Err(e) if e.is_fatal() => return Err(e.into()),
            Err(e) => {
                warn!("exact search failed for {}: {}", record.award_id, e);
                return Ok(TitleMatch::failed(&record.award_id, e.to_string()));
            }
        }

        let fuzzy_query = relax_query(title);
        if fuzzy_query != exact_query && !fuzzy_query.is_empty() {
            match self.search_stage(title, &fuzzy_query, years).await {
                Ok(Some((work, ratio))) => {
                    info!(
                        "record {} matched fuzzy with ratio {}",
                        record.award_id, ratio
                    );
                    self.accept(&mut result, record, work, ratio, SearchMethod::Fuzzy);
                    return Ok(result);
                }
                Ok(None) => {}
                Err(e) if e.is_fatal() => return Err(e.into()),
                Err(e) => {
                    warn!("fuzzy search failed for {}: {}", record.award_id, e);
                    return Ok(TitleMatch::failed(&record.award_id, e.to_string()));
                }
            }
        }

        info!("no match for record {}", record.award_id);
        Ok(result)
    }

    /// Direct work fetch when the record carries a DOI.
    async fn try_doi_fetch(
        &self,
        record: &InputRecord,
    ) -> Result<Option<CandidateWork>, MatchError> {
        // Bare DOIs pass through as-is; anything else (resolver URLs,
        // doi: prefixes, percent-encoded forms) goes through extraction
        let Some(doi) = record.doi.as_deref().map(str::trim).and_then(|d| {
            if is_valid_doi(d) {
                Some(d.to_string())
            } else {
                extract_doi(d)
            }
        }) else {
            return Ok(None);
        };

        debug!("record {} carries DOI {}", record.award_id, doi);
        match self.catalog.get_work(&format!("doi:{}", doi)).await {
            Ok(work) => Ok(Some(work)),
            Err(CatalogError::NotFound(_)) => Ok(None),
            Err(e) if e.is_fatal() => Err(e.into()),
            Err(e) => {
                warn!("DOI fetch failed for {}, falling back to search: {}", doi, e);
                Ok(None)
            }
        }
    }

    /// One search stage: query, rank deterministically, apply threshold.
    async fn search_stage(
        &self,
        original_title: &str,
        query: &str,
        years: Option<YearRange>,
    ) -> Result<Option<(CandidateWork, u8)>, CatalogError> {
        if query.is_empty() {
            return Ok(None);
        }

        let candidates = self
            .catalog
            .search_works(query, years, self.config.max_results)
            .await?;

        let normalized_input = normalize_text(original_title, false);

        let mut scored: Vec<(u8, CandidateWork)> = candidates
            .into_iter()
            .filter(|w| !w.title.is_empty())
            .map(|w| {
                let ratio = title_ratio(&normalized_input, &normalize_text(&w.title, false));
                (ratio, w)
            })
            .collect();

        // Ratio desc, then most recent year, then smallest id.
        scored.sort_by(|(ra, wa), (rb, wb)| {
            rb.cmp(ra)
                .then_with(|| wb.publication_year.cmp(&wa.publication_year))
                .then_with(|| wa.id.cmp(&wb.id))
        });

        match scored.into_iter().next() {
            Some((ratio, work)) if ratio >= self.config.similarity_threshold => {
                Ok(Some((work, ratio)))
            }
            _ => Ok(None),
        }
    }

    /// Fill in the accepted work plus author/year/funding annotations.
    fn accept(
        &self,
        result: &mut TitleMatch,
        record: &InputRecord,
        work: CandidateWork,
        ratio: u8,
        method: SearchMethod,
    ) {
        result.status = MatchStatus::Matched;
        result.match_ratio = ratio;
        result.search_method = Some(method);

        if let Some(authors) = record.authors.as_deref().filter(|a| !a.trim().is_empty()) {
            self.validate_authors(result, authors, &work);
        }

        if let (Some(input_year), Some(pub_year)) = (record.year, work.publication_year) {
            let diff = (pub_year - input_year).abs();
            result.year_difference = Some(diff);
            result.year_match = Some(diff <= self.config.year_tolerance);
        }

        result.funding = Some(funding::verify(
            &work.grants,
            &record.award_id,
            &self.config.target_funder_ids,
        ));

        result.work = Some(work);
    }

    /// Surname-set comparison between input authors and the work's credits.
    ///
    /// Each input surname is scored against its best counterpart; the
    /// mean of those best scores decides `matched_authors`.
    fn validate_authors(&self, result: &mut TitleMatch, authors: &str, work: &CandidateWork) {
        let input_surnames: Vec<String> =
            split_authors(authors, &self.config.author_separator)
                .iter()
                .filter_map(|raw| parse_name(raw, self.config.name_style).ok())
                .map(|name| ascii_fold(&name.surname))
                .filter(|s| !s.is_empty())
                .collect();

        let work_surnames: Vec<String> = work
            .author_names()
            .iter()
            .filter_map(|raw| parse_name(raw, NameStyle::FirstLast).ok())
            .map(|name| ascii_fold(&name.surname))
            .filter(|s| !s.is_empty())
            .collect();

        if input_surnames.is_empty() || work_surnames.is_empty() {
            return;
        }

        let mut matched = Vec::new();
        let mut total = 0.0;
        for surname in &input_surnames {
            let best = work_surnames
                .iter()
                .map(|w| name_ratio(surname, w))
                .fold(0.0_f64, f64::max);
            total += best;
            if best >= self.config.author_validation_threshold {
                matched.push(surname.clone());
            }
        }

        let mean = total / input_surnames.len() as f64;
        result.matched_authors = Some(mean >= self.config.author_validation_threshold);
        result.matched_authors_count = matched.len() as u32;
        result.matched_authors_list = matched;
    }
}

/// Relaxed query for the fuzzy stage: aggressive normalization, then a
/// leading-words cap for very long titles.
fn relax_query(title: &str) -> String {
    let aggressive = clean_title_for_search(title, true);
    let words: Vec<&str> = aggressive.split_whitespace().collect();
    if words.len() > FUZZY_MAX_WORDS {
        words[..FUZZY_MAX_WORDS].join(" ")
    } else {
        aggressive
    }
}
