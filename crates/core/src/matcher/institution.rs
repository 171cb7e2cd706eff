//! Institution resolution: an ordered list of interchangeable
//! strategies, short-circuiting on the first confident hit.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::catalog::{CatalogClient, CatalogError, Institution, RegistryClient};
use crate::similarity::{ascii_fold, name_ratio};

/// An accepted institution with the confidence the strategy assigned.
#[derive(Debug, Clone)]
pub struct ResolvedInstitution {
    pub institution: Institution,
    pub confidence: f64,
    pub strategy: &'static str,
}

/// One way of turning an affiliation string into an institution.
#[async_trait]
pub trait InstitutionStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// `Ok(None)` means "no confident hit"; the resolver moves on.
    async fn try_resolve(
        &self,
        affiliation: &str,
    ) -> Result<Option<ResolvedInstitution>, CatalogError>;
}

/// Name-similarity confidence of an institution against an affiliation
/// string, taking the best over display name and aliases.
fn institution_confidence(institution: &Institution, affiliation: &str) -> f64 {
    let folded_affiliation = ascii_fold(affiliation);
    std::iter::once(institution.display_name.as_str())
        .chain(institution.aliases.iter().map(String::as_str))
        .map(|name| {
            let folded = ascii_fold(name);
            if folded.is_empty() || folded_affiliation.is_empty() {
                return 0.0;
            }
            if folded_affiliation.contains(&folded) || folded.contains(&folded_affiliation) {
                1.0
            } else {
                name_ratio(&folded_affiliation, &folded)
            }
        })
        .fold(0.0_f64, f64::max)
}

/// Strategy 1: the catalog's own institution search.
pub struct CatalogInstitutionSearch {
    catalog: Arc<dyn CatalogClient>,
    acceptance: f64,
    limit: u32,
}

impl CatalogInstitutionSearch {
    pub fn new(catalog: Arc<dyn CatalogClient>, acceptance: f64) -> Self {
        Self {
            catalog,
            acceptance,
            limit: 10,
        }
    }
}

#[async_trait]
impl InstitutionStrategy for CatalogInstitutionSearch {
    fn name(&self) -> &'static str {
        "catalog_search"
    }

    async fn try_resolve(
        &self,
        affiliation: &str,
    ) -> Result<Option<ResolvedInstitution>, CatalogError> {
        let candidates = self
            .catalog
            .search_institutions(affiliation, self.limit)
            .await?;

        let best = candidates
            .into_iter()
            .map(|inst| {
                let confidence = institution_confidence(&inst, affiliation);
                (inst, confidence)
            })
            .max_by(|(ia, ca), (ib, cb)| {
                ca.partial_cmp(cb)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| ib.id.cmp(&ia.id))
            });

        Ok(best
            .filter(|(_, confidence)| *confidence >= self.acceptance)
            .map(|(institution, confidence)| ResolvedInstitution {
                institution,
                confidence,
                strategy: self.name(),
            }))
    }
}

/// Strategy 2: the organization registry's affiliation matcher.
pub struct RegistryLookup {
    registry: Arc<dyn RegistryClient>,
    acceptance: f64,
}

impl RegistryLookup {
    pub fn new(registry: Arc<dyn RegistryClient>, acceptance: f64) -> Self {
        Self {
            registry,
            acceptance,
        }
    }
}

#[async_trait]
impl InstitutionStrategy for RegistryLookup {
    fn name(&self) -> &'static str {
        "registry_lookup"
    }

    async fn try_resolve(
        &self,
        affiliation: &str,
    ) -> Result<Option<ResolvedInstitution>, CatalogError> {
        let matches = self.registry.match_affiliation(affiliation).await?;

        // The registry's own chosen flag overrides the score gate.
        let accepted = matches
            .into_iter()
            .find(|m| m.chosen || m.score >= self.acceptance);

        Ok(accepted.map(|m| ResolvedInstitution {
            institution: m.institution,
            confidence: m.score,
            strategy: self.name(),
        }))
    }
}

/// Walks the configured strategies in order.
pub struct InstitutionResolver {
    strategies: Vec<Box<dyn InstitutionStrategy>>,
}

impl InstitutionResolver {
    pub fn new(strategies: Vec<Box<dyn InstitutionStrategy>>) -> Self {
        Self { strategies }
    }

    /// `Ok(None)` is the `Unresolved` outcome; the caller switches to
    /// the broad matcher.
    pub async fn resolve(
        &self,
        affiliation: &str,
    ) -> Result<Option<ResolvedInstitution>, CatalogError> {
        for strategy in &self.strategies {
            debug!("trying institution strategy '{}'", strategy.name());
            if let Some(resolved) = strategy.try_resolve(affiliation).await? {
                info!(
                    "affiliation '{}' resolved to '{}' via {} (confidence {:.2})",
                    affiliation,
                    resolved.institution.display_name,
                    resolved.strategy,
                    resolved.confidence
                );
                return Ok(Some(resolved));
            }
        }

        info!("affiliation '{}' unresolved", affiliation);
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn institution(name: &str, aliases: &[&str]) -> Institution {
        Institution {
            id: "I1".to_string(),
            display_name: name.to_string(),
            ror_id: None,
            aliases: aliases.iter().map(|s| s.to_string()).collect(),
            country_code: None,
        }
    }

    #[test]
    fn test_containment_is_full_confidence() {
        let inst = institution("University of Nebraska-Lincoln", &[]);
        let c = institution_confidence(&inst, "Dept. of Agronomy, University of Nebraska-Lincoln");
        assert_eq!(c, 1.0);
    }

    #[test]
    fn test_alias_considered() {
        let inst = institution("University of Nebraska-Lincoln", &["UNL"]);
        let c = institution_confidence(&inst, "UNL");
        assert_eq!(c, 1.0);
    }

    #[test]
    fn test_unrelated_name_scores_low() {
        let inst = institution("University of Nebraska-Lincoln", &[]);
        let c = institution_confidence(&inst, "Zhejiang Normal College");
        assert!(c < 0.8, "confidence was {}", c);
    }
}
