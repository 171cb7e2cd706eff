//! Input records, match results and the matcher error taxonomy.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::catalog::{CandidateWork, CatalogError};
use crate::names::{NameParseError, NameStyle};
use crate::normalizer::{DateFormat, ExtractedDate};

/// One field-mapped input record. Immutable once dispatched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InputRecord {
    /// Funding award identifier; anchors every output row.
    pub award_id: String,
    #[serde(default)]
    pub title: Option<String>,
    /// Raw author field, possibly several names joined by a separator.
    #[serde(default)]
    pub authors: Option<String>,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub affiliation: Option<String>,
    /// DOI or a URL containing one.
    #[serde(default)]
    pub doi: Option<String>,
}

/// Which pipeline a run dispatches records to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    #[default]
    Title,
    AuthorAffiliation,
}

/// Outcome class of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    Matched,
    /// Search completed but nothing cleared the threshold.
    NoMatch,
    /// Unrecoverable processing error (parse failure, exhausted retries).
    Failed,
}

impl std::fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            MatchStatus::Matched => "matched",
            MatchStatus::NoMatch => "no_match",
            MatchStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Which search stage produced an accepted title match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchMethod {
    Exact,
    Fuzzy,
}

/// How an award identifier matched a grant on the work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AwardMatchType {
    Exact,
    Normalized,
    Contains,
    Fuzzy,
}

/// Award-id and target-funder verification against a matched work's grants.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FundingCheck {
    pub award_id_match: bool,
    pub award_id_match_type: Option<AwardMatchType>,
    pub award_id_match_score: u8,
    pub matched_grant_award_id: Option<String>,
    pub matched_grant_funder: Option<String>,
    pub has_target_funder: bool,
    pub matched_target_funders: Vec<String>,
    pub matched_target_funder_names: Vec<String>,
}

/// The single result a title-mode record always produces.
#[derive(Debug, Clone, Serialize)]
pub struct TitleMatch {
    pub award_id: String,
    pub status: MatchStatus,
    /// 0 when nothing matched.
    pub match_ratio: u8,
    pub search_method: Option<SearchMethod>,
    pub cleaned_title: Option<String>,
    pub extracted_date: Option<ExtractedDate>,
    pub date_format: Option<DateFormat>,
    /// The accepted work, present only when `status` is `Matched`.
    pub work: Option<CandidateWork>,
    pub matched_authors: Option<bool>,
    pub matched_authors_count: u32,
    pub matched_authors_list: Vec<String>,
    pub year_match: Option<bool>,
    pub year_difference: Option<i32>,
    pub funding: Option<FundingCheck>,
    /// Set when `status` is `Failed`.
    pub failure_reason: Option<String>,
}

impl TitleMatch {
    pub(crate) fn empty(award_id: &str) -> Self {
        Self {
            award_id: award_id.to_string(),
            status: MatchStatus::NoMatch,
            match_ratio: 0,
            search_method: None,
            cleaned_title: None,
            extracted_date: None,
            date_format: None,
            work: None,
            matched_authors: None,
            matched_authors_count: 0,
            matched_authors_list: Vec::new(),
            year_match: None,
            year_difference: None,
            funding: None,
            failure_reason: None,
        }
    }

    pub(crate) fn failed(award_id: &str, reason: impl Into<String>) -> Self {
        let mut result = Self::empty(award_id);
        result.status = MatchStatus::Failed;
        result.failure_reason = Some(reason.into());
        result
    }
}

/// One author-affiliation output row.
///
/// The `(award_id, matched_author_id, matched_affiliation_id, work_id)`
/// tuple is unique within a record's output.
#[derive(Debug, Clone, Serialize)]
pub struct AuthorAffiliationRow {
    pub award_id: String,
    /// The raw input author string this row was produced for.
    pub input_author: String,
    pub matched_author: String,
    pub matched_author_id: String,
    pub matched_affiliation: String,
    pub matched_affiliation_id: String,
    pub matched_affiliation_ror: Option<String>,
    pub work_id: String,
    pub work_title: String,
    pub publication_year: Option<i32>,
    pub doi: Option<String>,
    pub author_match_score: f64,
    pub affiliation_match_score: f64,
    pub combined_match_score: f64,
    pub year_match: Option<bool>,
    pub year_difference: Option<i32>,
}

impl AuthorAffiliationRow {
    /// The uniqueness key within one record's output.
    pub fn key(&self) -> (&str, &str, &str, &str) {
        (
            &self.award_id,
            &self.matched_author_id,
            &self.matched_affiliation_id,
            &self.work_id,
        )
    }
}

/// Errors surfaced by the match engine.
#[derive(Debug, Error)]
pub enum MatchError {
    /// Name unparseable; the record is failed, no partial rows emitted.
    #[error("name parsing failed: {0}")]
    Parse(#[from] NameParseError),

    /// A required input field is missing or unusable.
    #[error("record cannot be processed: {0}")]
    InvalidRecord(String),

    /// External call failed; includes the circuit-open condition.
    #[error(transparent)]
    External(#[from] CatalogError),
}

impl MatchError {
    /// True when the whole run must stop, not just this record.
    pub fn is_fatal(&self) -> bool {
        matches!(self, MatchError::External(e) if e.is_fatal())
    }
}

/// Matching thresholds and weights shared by both modes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    /// Title ratio a candidate must reach to be accepted (0-100).
    pub similarity_threshold: u8,
    /// Surname-set mean similarity for title-mode author annotation.
    pub author_validation_threshold: f64,
    /// Max-over-candidates name similarity for author disambiguation.
    pub name_matching_threshold: f64,
    /// First affiliation-score floor in the broad matcher.
    pub affiliation_matching_threshold: f64,
    /// Second affiliation-score floor; both must be cleared.
    pub minimum_affiliation_score: f64,
    /// Catalog/registry confidence needed to accept an institution.
    pub institution_acceptance_threshold: f64,
    pub author_weight: f64,
    pub affiliation_weight: f64,
    /// Symmetric year window for title-mode search and validation.
    pub year_tolerance: i32,
    /// Forward-only year window for author-affiliation works fetches.
    pub year_search_window: i32,
    /// Candidates pulled per title search.
    pub max_results: u32,
    pub name_style: NameStyle,
    pub author_separator: String,
    /// Funder ids whose presence on a matched work is flagged.
    pub target_funder_ids: Vec<String>,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 95,
            author_validation_threshold: 0.85,
            name_matching_threshold: 0.85,
            affiliation_matching_threshold: 0.8,
            minimum_affiliation_score: 0.85,
            institution_acceptance_threshold: 0.9,
            author_weight: 0.3,
            affiliation_weight: 0.7,
            year_tolerance: 2,
            year_search_window: 5,
            max_results: 10,
            name_style: NameStyle::Auto,
            author_separator: ";".to_string(),
            target_funder_ids: Vec::new(),
        }
    }
}
