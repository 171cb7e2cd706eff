//! OpenAlex API client.
//!
//! OpenAlex asks for:
//! - A mailto parameter (or User-Agent contact) to join the polite pool
//! - Client-side rate limiting (10 req/sec for the polite pool)
//!
//! Every request outcome is recorded against the shared endpoint health
//! monitor; a tripped monitor short-circuits all further requests.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};
use tracing::{debug, warn};

use super::types::{
    AffiliationRecord, AuthorCandidate, Authorship, CandidateWork, Grant, Institution, OaLocation,
    OpenAccessInfo, Venue, YearRange,
};
use super::{CatalogClient, CatalogError};
use crate::health::HealthMonitor;
use crate::normalizer::sanitize_for_search;
use async_trait::async_trait;

/// OpenAlex API client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAlexConfig {
    /// Contact email sent with every request (polite pool).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mailto: Option<String>,
    /// Rate limit delay in milliseconds (default: 110 for ~9 req/sec).
    #[serde(default = "default_rate_limit")]
    pub rate_limit_ms: u64,
    /// Attempts per request before giving up (default: 3).
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Delay between retry attempts in milliseconds (default: 1000).
    #[serde(default = "default_retry_delay")]
    pub retry_delay_ms: u64,
    /// Page size for paginated queries (default: 200, the API maximum).
    #[serde(default = "default_per_page")]
    pub per_page: u32,
    /// Base URL (default: https://api.openalex.org).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

fn default_rate_limit() -> u64 {
    110
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay() -> u64 {
    1000
}

fn default_per_page() -> u32 {
    200
}

impl Default for OpenAlexConfig {
    fn default() -> Self {
        Self {
            mailto: None,
            rate_limit_ms: default_rate_limit(),
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay(),
            per_page: default_per_page(),
            base_url: None,
        }
    }
}

/// OpenAlex API client.
pub struct OpenAlexClient {
    client: Client,
    base_url: String,
    mailto: Option<String>,
    last_request: Arc<Mutex<Option<Instant>>>,
    rate_limit: Duration,
    max_retries: u32,
    retry_delay: Duration,
    per_page: u32,
    health: Arc<HealthMonitor>,
}

/// Drop the `https://openalex.org/` prefix so an id can be used in filters.
pub fn short_id(id: &str) -> &str {
    id.strip_prefix("https://openalex.org/").unwrap_or(id)
}

impl OpenAlexClient {
    /// Create a new OpenAlex client reporting into the given health monitor.
    pub fn new(config: OpenAlexConfig, health: Arc<HealthMonitor>) -> Result<Self, CatalogError> {
        let client = Client::builder()
            .user_agent(format!("grantmatch/{}", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(30))
            .build()?;

        let base_url = config
            .base_url
            .unwrap_or_else(|| "https://api.openalex.org".to_string());

        Ok(Self {
            client,
            base_url,
            mailto: config.mailto,
            last_request: Arc::new(Mutex::new(None)),
            rate_limit: Duration::from_millis(config.rate_limit_ms),
            max_retries: config.max_retries.max(1),
            retry_delay: Duration::from_millis(config.retry_delay_ms),
            per_page: config.per_page.clamp(1, 200),
            health,
        })
    }

    /// Wait for rate limit if needed.
    async fn wait_for_rate_limit(&self) {
        let mut last = self.last_request.lock().await;

        if let Some(last_time) = *last {
            let elapsed = last_time.elapsed();
            if elapsed < self.rate_limit {
                let wait_time = self.rate_limit - elapsed;
                debug!("OpenAlex rate limit: waiting {:?}", wait_time);
                sleep(wait_time).await;
            }
        }

        *last = Some(Instant::now());
    }

    fn check_health(&self) -> Result<(), CatalogError> {
        self.health.check().map_err(|e| CatalogError::CircuitOpen {
            endpoint: self.health.endpoint().to_string(),
            reason: e.to_string(),
        })
    }

    /// GET a JSON document with retries and health accounting.
    ///
    /// 404 is a definitive answer, not an endpoint fault; it neither
    /// retries nor counts against the health monitor.
    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, CatalogError> {
        let url = format!("{}{}", self.base_url, path);
        let mut last_error = String::new();

        for attempt in 1..=self.max_retries {
            self.check_health()?;
            self.wait_for_rate_limit().await;

            let mut request = self.client.get(&url).query(query);
            if let Some(mailto) = &self.mailto {
                request = request.query(&[("mailto", mailto.as_str())]);
            }

            let response = match request.send().await {
                Ok(r) => r,
                Err(e) => {
                    warn!("OpenAlex request failed (attempt {}): {}", attempt, e);
                    self.health.record_failure();
                    last_error = e.to_string();
                    sleep(self.retry_delay).await;
                    continue;
                }
            };

            let status = response.status();
            if status == 404 {
                self.health.record_success();
                return Err(CatalogError::NotFound(url.clone()));
            }
            if status == 429 || status.is_server_error() {
                warn!("OpenAlex returned {} (attempt {})", status, attempt);
                self.health.record_failure();
                last_error = format!("status {status}");
                sleep(self.retry_delay).await;
                continue;
            }
            if !status.is_success() {
                self.health.record_failure();
                let body = response.text().await.unwrap_or_default();
                return Err(CatalogError::ApiError {
                    status: status.as_u16(),
                    message: body,
                });
            }

            self.health.record_success();
            return response
                .json()
                .await
                .map_err(|e| CatalogError::ParseError(format!("{}: {}", url, e)));
        }

        Err(CatalogError::RetriesExhausted {
            attempts: self.max_retries,
            last_error,
        })
    }

    /// Cursor-paginate through every page of a works listing.
    async fn paged_works(
        &self,
        path: &str,
        base_query: Vec<(&str, String)>,
    ) -> Result<Vec<CandidateWork>, CatalogError> {
        let mut works = Vec::new();
        let mut cursor = "*".to_string();

        loop {
            let mut query = base_query.clone();
            query.push(("per-page", self.per_page.to_string()));
            query.push(("cursor", cursor.clone()));

            let page: WorksResponse = self.get_json(path, &query).await?;
            works.extend(page.results.into_iter().map(CandidateWork::from));

            match page.meta.and_then(|m| m.next_cursor) {
                Some(next) if !next.is_empty() => cursor = next,
                _ => break,
            }
        }

        Ok(works)
    }
}

/// Build a works filter string. Title text goes through
/// [`sanitize_for_search`] first: `|`, `+` and bracket characters are
/// operators to the OpenAlex search parser.
fn works_filter(title: &str, years: Option<YearRange>) -> String {
    let mut filter = format!("title.search:{}", sanitize_for_search(title));
    if let Some(range) = years {
        filter.push_str(&format!(",publication_year:{}", range));
    }
    filter
}

#[async_trait]
impl CatalogClient for OpenAlexClient {
    async fn search_works(
        &self,
        title: &str,
        years: Option<YearRange>,
        limit: u32,
    ) -> Result<Vec<CandidateWork>, CatalogError> {
        debug!("OpenAlex works search: title='{}', limit={}", title, limit);

        let query = vec![
            ("filter", works_filter(title, years)),
            ("per-page", limit.clamp(1, 200).to_string()),
        ];

        let page: WorksResponse = self.get_json("/works", &query).await?;
        Ok(page.results.into_iter().map(CandidateWork::from).collect())
    }

    async fn get_work(&self, id: &str) -> Result<CandidateWork, CatalogError> {
        debug!("OpenAlex get work: id={}", id);

        let path = format!("/works/{}", id);
        let work: WorkDto = self.get_json(&path, &[]).await?;
        Ok(work.into())
    }

    async fn search_authors(
        &self,
        query: &str,
        institution_id: Option<&str>,
    ) -> Result<Vec<AuthorCandidate>, CatalogError> {
        debug!(
            "OpenAlex author search: query='{}', institution={:?}",
            query, institution_id
        );

        let mut params = vec![
            ("search", query.to_string()),
            ("per-page", self.per_page.to_string()),
        ];
        if let Some(inst) = institution_id {
            params.push((
                "filter",
                format!("affiliations.institution.id:{}", short_id(inst)),
            ));
        }

        let page: AuthorsResponse = self.get_json("/authors", &params).await?;
        Ok(page.results.into_iter().map(AuthorCandidate::from).collect())
    }

    async fn search_institutions(
        &self,
        query: &str,
        limit: u32,
    ) -> Result<Vec<Institution>, CatalogError> {
        debug!("OpenAlex institution search: query='{}'", query);

        let params = vec![
            ("search", query.to_string()),
            ("per-page", limit.clamp(1, 200).to_string()),
        ];

        let page: InstitutionsResponse = self.get_json("/institutions", &params).await?;
        Ok(page.results.into_iter().map(Institution::from).collect())
    }

    async fn works_by_author(
        &self,
        author_id: &str,
        institution_id: Option<&str>,
        years: Option<YearRange>,
    ) -> Result<Vec<CandidateWork>, CatalogError> {
        debug!(
            "OpenAlex works by author: author={}, institution={:?}, years={:?}",
            author_id, institution_id, years
        );

        let mut filter = format!("author.id:{}", short_id(author_id));
        if let Some(inst) = institution_id {
            filter.push_str(&format!(",institutions.id:{}", short_id(inst)));
        }
        if let Some(range) = years {
            filter.push_str(&format!(",publication_year:{}", range));
        }

        self.paged_works("/works", vec![("filter", filter)]).await
    }
}

// ============================================================================
// OpenAlex API Response Types (private)
// ============================================================================

#[derive(Debug, Deserialize)]
struct Meta {
    #[serde(default)]
    next_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WorksResponse {
    #[serde(default)]
    meta: Option<Meta>,
    #[serde(default)]
    results: Vec<WorkDto>,
}

#[derive(Debug, Deserialize)]
struct AuthorsResponse {
    #[serde(default)]
    results: Vec<AuthorDto>,
}

#[derive(Debug, Deserialize)]
struct InstitutionsResponse {
    #[serde(default)]
    results: Vec<InstitutionDto>,
}

#[derive(Debug, Deserialize)]
struct WorkDto {
    id: String,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    publication_year: Option<i32>,
    #[serde(default)]
    publication_date: Option<String>,
    #[serde(default)]
    doi: Option<String>,
    #[serde(rename = "type", default)]
    work_type: Option<String>,
    #[serde(default)]
    language: Option<String>,
    #[serde(default)]
    cited_by_count: u64,
    #[serde(default)]
    is_retracted: bool,
    #[serde(default)]
    authorships: Vec<AuthorshipDto>,
    #[serde(default)]
    grants: Vec<GrantDto>,
    #[serde(default)]
    primary_location: Option<LocationDto>,
    #[serde(default)]
    biblio: Option<BiblioDto>,
    #[serde(default)]
    open_access: Option<OpenAccessDto>,
    #[serde(default)]
    best_oa_location: Option<LocationDto>,
    #[serde(default)]
    topics: Vec<TopicDto>,
    #[serde(default)]
    abstract_inverted_index: Option<HashMap<String, Vec<u32>>>,
}

#[derive(Debug, Deserialize)]
struct AuthorshipDto {
    author: AuthorRefDto,
    #[serde(default)]
    institutions: Vec<InstitutionDto>,
}

#[derive(Debug, Deserialize)]
struct AuthorRefDto {
    #[serde(default)]
    id: String,
    #[serde(default)]
    display_name: String,
    #[serde(default)]
    orcid: Option<String>,
}

#[derive(Debug, Deserialize)]
struct InstitutionDto {
    #[serde(default)]
    id: String,
    #[serde(default)]
    display_name: String,
    #[serde(default)]
    ror: Option<String>,
    #[serde(default)]
    country_code: Option<String>,
    #[serde(default)]
    display_name_acronyms: Vec<String>,
    #[serde(default)]
    display_name_alternatives: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct GrantDto {
    #[serde(default)]
    funder: String,
    #[serde(default)]
    funder_display_name: Option<String>,
    #[serde(default)]
    award_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LocationDto {
    #[serde(default)]
    source: Option<SourceDto>,
    #[serde(default)]
    landing_page_url: Option<String>,
    #[serde(default)]
    pdf_url: Option<String>,
    #[serde(default)]
    license: Option<String>,
    #[serde(default)]
    version: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SourceDto {
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    issn_l: Option<String>,
    #[serde(default)]
    host_organization_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BiblioDto {
    #[serde(default)]
    volume: Option<String>,
    #[serde(default)]
    issue: Option<String>,
    #[serde(default)]
    first_page: Option<String>,
    #[serde(default)]
    last_page: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAccessDto {
    #[serde(default)]
    is_oa: bool,
    #[serde(default)]
    oa_status: Option<String>,
    #[serde(default)]
    oa_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TopicDto {
    #[serde(default)]
    display_name: String,
}

#[derive(Debug, Deserialize)]
struct AffiliationDto {
    institution: InstitutionDto,
    #[serde(default)]
    years: Vec<i32>,
}

#[derive(Debug, Deserialize)]
struct AuthorDto {
    id: String,
    #[serde(default)]
    display_name: String,
    #[serde(default)]
    orcid: Option<String>,
    #[serde(default)]
    affiliations: Vec<AffiliationDto>,
}

/// Rebuild abstract text from the word -> positions index.
fn reconstruct_abstract(index: &HashMap<String, Vec<u32>>) -> Option<String> {
    if index.is_empty() {
        return None;
    }
    let mut positions: Vec<(u32, &str)> = index
        .iter()
        .flat_map(|(word, ps)| ps.iter().map(move |&p| (p, word.as_str())))
        .collect();
    positions.sort_unstable();
    Some(
        positions
            .into_iter()
            .map(|(_, w)| w)
            .collect::<Vec<_>>()
            .join(" "),
    )
}

impl From<InstitutionDto> for Institution {
    fn from(dto: InstitutionDto) -> Self {
        let mut aliases = dto.display_name_acronyms;
        aliases.extend(dto.display_name_alternatives);
        Institution {
            id: dto.id,
            display_name: dto.display_name,
            ror_id: dto.ror,
            aliases,
            country_code: dto.country_code,
        }
    }
}

impl From<WorkDto> for CandidateWork {
    fn from(dto: WorkDto) -> Self {
        let title = dto
            .display_name
            .or(dto.title)
            .unwrap_or_default();

        let authorships = dto
            .authorships
            .into_iter()
            .map(|a| Authorship {
                author_id: a.author.id,
                author_name: a.author.display_name,
                orcid: a.author.orcid,
                institutions: a.institutions.into_iter().map(Institution::from).collect(),
            })
            .collect();

        let grants = dto
            .grants
            .into_iter()
            .map(|g| Grant {
                funder_display_name: g.funder_display_name.unwrap_or_default(),
                funder_id: g.funder,
                award_id: g.award_id,
            })
            .collect();

        let venue = dto.primary_location.as_ref().map(|loc| {
            let source = loc.source.as_ref();
            let biblio = dto.biblio.as_ref();
            Venue {
                journal: source.and_then(|s| s.display_name.clone()),
                issn: source.and_then(|s| s.issn_l.clone()),
                publisher: source.and_then(|s| s.host_organization_name.clone()),
                volume: biblio.and_then(|b| b.volume.clone()),
                issue: biblio.and_then(|b| b.issue.clone()),
                pages: biblio.and_then(|b| match (&b.first_page, &b.last_page) {
                    (Some(f), Some(l)) => Some(format!("{}-{}", f, l)),
                    (Some(f), None) => Some(f.clone()),
                    _ => None,
                }),
            }
        });

        let open_access = dto.open_access.map(|oa| OpenAccessInfo {
            is_oa: oa.is_oa,
            oa_status: oa.oa_status,
            oa_url: oa.oa_url,
        });

        let best_oa_location = dto.best_oa_location.map(|loc| OaLocation {
            landing_page_url: loc.landing_page_url,
            pdf_url: loc.pdf_url,
            license: loc.license,
            version: loc.version,
        });

        let abstract_text = dto
            .abstract_inverted_index
            .as_ref()
            .and_then(reconstruct_abstract);

        CandidateWork {
            id: dto.id,
            title,
            publication_year: dto.publication_year,
            publication_date: dto.publication_date,
            doi: dto.doi,
            work_type: dto.work_type,
            language: dto.language,
            cited_by_count: dto.cited_by_count,
            is_retracted: dto.is_retracted,
            authorships,
            grants,
            venue,
            open_access,
            best_oa_location,
            topics: dto.topics.into_iter().map(|t| t.display_name).collect(),
            abstract_text,
        }
    }
}

impl From<AuthorDto> for AuthorCandidate {
    fn from(dto: AuthorDto) -> Self {
        AuthorCandidate {
            id: dto.id,
            display_name: dto.display_name,
            orcid: dto.orcid,
            affiliations: dto
                .affiliations
                .into_iter()
                .map(|a| AffiliationRecord {
                    institution: a.institution.into(),
                    years: a.years,
                })
                .collect(),
        }
    }
}
