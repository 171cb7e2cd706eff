//! Domain types for catalog and registry data.

use serde::Serialize;

/// A canonical institution, resolved from the catalog or the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Institution {
    pub id: String,
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ror_id: Option<String>,
    /// Alternate names and acronyms, used during name-confidence checks.
    pub aliases: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country_code: Option<String>,
}

/// One author credit on a work, with the institutions stated for it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Authorship {
    pub author_id: String,
    pub author_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub orcid: Option<String>,
    pub institutions: Vec<Institution>,
}

/// A funding acknowledgment on a work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Grant {
    pub funder_id: String,
    pub funder_display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub award_id: Option<String>,
}

/// Where a work was published.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Venue {
    pub journal: Option<String>,
    pub issn: Option<String>,
    pub publisher: Option<String>,
    pub volume: Option<String>,
    pub issue: Option<String>,
    pub pages: Option<String>,
}

/// Open-access status of a work.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OpenAccessInfo {
    pub is_oa: bool,
    pub oa_status: Option<String>,
    pub oa_url: Option<String>,
}

/// Best open-access copy of a work.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OaLocation {
    pub landing_page_url: Option<String>,
    pub pdf_url: Option<String>,
    pub license: Option<String>,
    pub version: Option<String>,
}

/// A candidate work returned by catalog search.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandidateWork {
    pub id: String,
    pub title: String,
    pub publication_year: Option<i32>,
    pub publication_date: Option<String>,
    pub doi: Option<String>,
    pub work_type: Option<String>,
    pub language: Option<String>,
    pub cited_by_count: u64,
    pub is_retracted: bool,
    pub authorships: Vec<Authorship>,
    pub grants: Vec<Grant>,
    pub venue: Option<Venue>,
    pub open_access: Option<OpenAccessInfo>,
    pub best_oa_location: Option<OaLocation>,
    pub topics: Vec<String>,
    pub abstract_text: Option<String>,
}

impl CandidateWork {
    /// Ordered author display names.
    pub fn author_names(&self) -> Vec<&str> {
        self.authorships.iter().map(|a| a.author_name.as_str()).collect()
    }
}

/// One stated affiliation of a catalog author, with the years it covers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AffiliationRecord {
    pub institution: Institution,
    pub years: Vec<i32>,
}

/// A candidate author returned by catalog author search.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuthorCandidate {
    pub id: String,
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub orcid: Option<String>,
    pub affiliations: Vec<AffiliationRecord>,
}

/// A registry hit for an affiliation string.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegistryMatch {
    pub institution: Institution,
    /// Registry-reported confidence, normalized to [0, 1].
    pub score: f64,
    /// Registry marked this candidate as its chosen disambiguation.
    pub chosen: bool,
}

/// Inclusive publication-year filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct YearRange {
    pub start: i32,
    pub end: i32,
}

impl YearRange {
    pub fn new(start: i32, end: i32) -> Self {
        Self { start, end }
    }

    /// Symmetric window around a reference year.
    pub fn around(year: i32, tolerance: i32) -> Self {
        Self::new(year - tolerance, year + tolerance)
    }

    /// Forward-only window starting at a reference year.
    pub fn forward(year: i32, window: i32) -> Self {
        Self::new(year, year + window)
    }

    pub fn contains(&self, year: i32) -> bool {
        (self.start..=self.end).contains(&year)
    }
}

impl std::fmt::Display for YearRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}
