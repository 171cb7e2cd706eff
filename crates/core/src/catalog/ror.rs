//! ROR (Research Organization Registry) affiliation-matching client.
//!
//! Used as a fallback when catalog institution search comes up empty;
//! the registry's affiliation endpoint scores free-text strings against
//! canonical organization records.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};
use tracing::{debug, warn};

use super::types::{Institution, RegistryMatch};
use super::{CatalogError, RegistryClient};
use crate::health::HealthMonitor;
use async_trait::async_trait;

/// ROR API client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RorConfig {
    /// Rate limit delay in milliseconds (default: 500).
    #[serde(default = "default_rate_limit")]
    pub rate_limit_ms: u64,
    /// Attempts per request before giving up (default: 3).
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Delay between retry attempts in milliseconds (default: 1000).
    #[serde(default = "default_retry_delay")]
    pub retry_delay_ms: u64,
    /// Base URL (default: https://api.ror.org/v2).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

fn default_rate_limit() -> u64 {
    500
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay() -> u64 {
    1000
}

impl Default for RorConfig {
    fn default() -> Self {
        Self {
            rate_limit_ms: default_rate_limit(),
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay(),
            base_url: None,
        }
    }
}

/// ROR API client.
pub struct RorClient {
    client: Client,
    base_url: String,
    last_request: Arc<Mutex<Option<Instant>>>,
    rate_limit: Duration,
    max_retries: u32,
    retry_delay: Duration,
    health: Arc<HealthMonitor>,
}

impl RorClient {
    /// Create a new ROR client reporting into the given health monitor.
    pub fn new(config: RorConfig, health: Arc<HealthMonitor>) -> Result<Self, CatalogError> {
        let client = Client::builder()
            .user_agent(format!("grantmatch/{}", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(30))
            .build()?;

        let base_url = config
            .base_url
            .unwrap_or_else(|| "https://api.ror.org/v2".to_string());

        Ok(Self {
            client,
            base_url,
            last_request: Arc::new(Mutex::new(None)),
            rate_limit: Duration::from_millis(config.rate_limit_ms),
            max_retries: config.max_retries.max(1),
            retry_delay: Duration::from_millis(config.retry_delay_ms),
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
                debug!("ROR rate limit: waiting {:?}", wait_time);
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
}

#[async_trait]
impl RegistryClient for RorClient {
    async fn match_affiliation(
        &self,
        affiliation: &str,
    ) -> Result<Vec<RegistryMatch>, CatalogError> {
        debug!("ROR affiliation match: '{}'", affiliation);

        let url = format!("{}/organizations", self.base_url);
        let mut last_error = String::new();

        for attempt in 1..=self.max_retries {
            self.check_health()?;
            self.wait_for_rate_limit().await;

            let response = match self
                .client
                .get(&url)
                .query(&[("affiliation", affiliation)])
                .send()
                .await
            {
                Ok(r) => r,
                Err(e) => {
                    warn!("ROR request failed (attempt {}): {}", attempt, e);
                    self.health.record_failure();
                    last_error = e.to_string();
                    sleep(self.retry_delay).await;
                    continue;
                }
            };

            let status = response.status();
            if status == 429 || status.is_server_error() {
                warn!("ROR returned {} (attempt {})", status, attempt);
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
            let parsed: RorAffiliationResponse = response.json().await.map_err(|e| {
                CatalogError::ParseError(format!("affiliation response: {}", e))
            })?;

            return Ok(parsed.items.into_iter().map(RegistryMatch::from).collect());
        }

        Err(CatalogError::RetriesExhausted {
            attempts: self.max_retries,
            last_error,
        })
    }
}

// ============================================================================
// ROR API Response Types (private)
// ============================================================================

#[derive(Debug, Deserialize)]
struct RorAffiliationResponse {
    #[serde(default)]
    items: Vec<RorItem>,
}

#[derive(Debug, Deserialize)]
struct RorItem {
    organization: RorOrganization,
    #[serde(default)]
    score: f64,
    #[serde(default)]
    chosen: bool,
}

#[derive(Debug, Deserialize)]
struct RorOrganization {
    id: String,
    #[serde(default)]
    names: Vec<RorName>,
    #[serde(default)]
    locations: Vec<RorLocation>,
}

#[derive(Debug, Deserialize)]
struct RorName {
    #[serde(default)]
    value: String,
    #[serde(default)]
    types: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RorLocation {
    #[serde(default)]
    geonames_details: Option<RorGeonames>,
}

#[derive(Debug, Deserialize)]
struct RorGeonames {
    #[serde(default)]
    country_code: Option<String>,
}

impl From<RorItem> for RegistryMatch {
    fn from(item: RorItem) -> Self {
        let display_name = item
            .organization
            .names
            .iter()
            .find(|n| n.types.iter().any(|t| t == "ror_display"))
            .or_else(|| item.organization.names.first())
            .map(|n| n.value.clone())
            .unwrap_or_default();

        let aliases = item
            .organization
            .names
            .iter()
            .filter(|n| n.value != display_name)
            .map(|n| n.value.clone())
            .collect();

        let country_code = item
            .organization
            .locations
            .first()
            .and_then(|l| l.geonames_details.as_ref())
            .and_then(|g| g.country_code.clone());

        RegistryMatch {
            institution: Institution {
                id: item.organization.id.clone(),
                display_name,
                ror_id: Some(item.organization.id),
                aliases,
                country_code,
            },
            score: item.score.clamp(0.0, 1.0),
            chosen: item.chosen,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ror_item_conversion() {
        let json = r#"{
            "organization": {
                "id": "https://ror.org/02mhbdp94",
                "names": [
                    {"value": "UNL", "types": ["acronym"]},
                    {"value": "University of Nebraska-Lincoln", "types": ["ror_display", "label"]}
                ],
                "locations": [
                    {"geonames_details": {"country_code": "US"}}
                ]
            },
            "score": 0.96,
            "chosen": true
        }"#;

        let item: RorItem = serde_json::from_str(json).unwrap();
        let m: RegistryMatch = item.into();

        assert_eq!(m.institution.display_name, "University of Nebraska-Lincoln");
        assert_eq!(m.institution.ror_id.as_deref(), Some("https://ror.org/02mhbdp94"));
        assert_eq!(m.institution.aliases, vec!["UNL".to_string()]);
        assert_eq!(m.institution.country_code.as_deref(), Some("US"));
        assert!(m.chosen);
        assert!((m.score - 0.96).abs() < 1e-9);
    }

    #[test]
    fn test_score_clamped() {
        let item = RorItem {
            organization: RorOrganization {
                id: "https://ror.org/x".to_string(),
                names: vec![],
                locations: vec![],
            },
            score: 1.7,
            chosen: false,
        };
        let m: RegistryMatch = item.into();
        assert_eq!(m.score, 1.0);
    }
}
