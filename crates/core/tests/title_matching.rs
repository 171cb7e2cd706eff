//! Title-mode integration tests.
//!
//! These tests verify the full mode-A flow against mock clients:
//! - DOI direct resolution
//! - Exact search, ranking, and the similarity threshold
//! - Year-window filtering and deterministic tie-breaking
//! - Author, year, and funding annotations on accepted matches
//! - Failure handling, including the circuit breaker

use std::sync::Arc;

use grantmatch_core::catalog::{CatalogClient, CatalogError};
use grantmatch_core::matcher::{
    AwardMatchType, InputRecord, MatchEngine, MatchStatus, MatchingConfig, SearchMethod,
};
use grantmatch_core::similarity::FuzzyAffiliationScorer;
use grantmatch_core::testing::{fixtures, MockCatalogClient, MockRegistryClient};

struct TestHarness {
    catalog: Arc<MockCatalogClient>,
    engine: MatchEngine,
}

impl TestHarness {
    fn new() -> Self {
        Self::with_config(MatchingConfig::default())
    }

    fn with_config(config: MatchingConfig) -> Self {
        let catalog = Arc::new(MockCatalogClient::new());
        let registry = Arc::new(MockRegistryClient::new());
        let engine = MatchEngine::new(
            Arc::clone(&catalog) as Arc<dyn CatalogClient>,
            registry,
            Arc::new(FuzzyAffiliationScorer),
            config,
        );
        Self { catalog, engine }
    }
}

fn record(award_id: &str, title: &str, year: Option<i32>) -> InputRecord {
    InputRecord {
        award_id: award_id.to_string(),
        title: Some(title.to_string()),
        year,
        ..Default::default()
    }
}

#[tokio::test]
async fn test_doi_resolves_without_search() {
    let harness = TestHarness::new();
    let mut work = fixtures::work("W77", "An entirely different title", Some(2021));
    work.doi = Some("https://doi.org/10.5555/trees.9".to_string());
    harness.catalog.add_work(work).await;

    let mut input = record("AW-1", "Canopy height estimation from lidar", Some(2021));
    input.doi = Some("https://doi.org/10.5555/trees.9".to_string());

    let result = harness.engine.match_by_title(&input).await.unwrap();
    assert_eq!(result.status, MatchStatus::Matched);
    assert_eq!(result.match_ratio, 100);
    assert_eq!(result.search_method, Some(SearchMethod::Exact));
    assert_eq!(result.work.unwrap().id, "W77");

    // The DOI fetch was the only catalog call
    assert_eq!(harness.catalog.query_count().await, 1);
}

#[tokio::test]
async fn test_bare_doi_resolves_without_search() {
    let harness = TestHarness::new();
    let mut work = fixtures::work("W78", "An entirely different title", Some(2021));
    work.doi = Some("https://doi.org/10.5555/trees.10".to_string());
    harness.catalog.add_work(work).await;

    let mut input = record("AW-1b", "Canopy height estimation from lidar", Some(2021));
    input.doi = Some("10.5555/trees.10".to_string());

    let result = harness.engine.match_by_title(&input).await.unwrap();
    assert_eq!(result.status, MatchStatus::Matched);
    assert_eq!(result.work.unwrap().id, "W78");
    assert_eq!(harness.catalog.query_count().await, 1);
}

#[tokio::test]
async fn test_exact_title_match() {
    let harness = TestHarness::new();
    harness
        .catalog
        .add_work(fixtures::work(
            "W1",
            "Soil moisture retrieval from spaceborne radar",
            Some(2020),
        ))
        .await;

    let input = record(
        "AW-2",
        "Soil moisture retrieval from spaceborne radar",
        Some(2020),
    );
    let result = harness.engine.match_by_title(&input).await.unwrap();

    assert_eq!(result.status, MatchStatus::Matched);
    assert_eq!(result.match_ratio, 100);
    assert_eq!(result.search_method, Some(SearchMethod::Exact));
    assert_eq!(result.year_match, Some(true));
    assert_eq!(result.year_difference, Some(0));
}

#[tokio::test]
async fn test_dissimilar_title_is_no_match() {
    let harness = TestHarness::new();
    harness
        .catalog
        .add_work(fixtures::work(
            "W1",
            "Soil carbon dynamics in tallgrass prairies",
            Some(2020),
        ))
        .await;

    let input = record("AW-3", "Soil moisture retrieval from spaceborne radar", Some(2020));
    let result = harness.engine.match_by_title(&input).await.unwrap();

    assert_eq!(result.status, MatchStatus::NoMatch);
    assert_eq!(result.match_ratio, 0);
    assert!(result.work.is_none());
}

#[tokio::test]
async fn test_year_window_excludes_old_work() {
    let harness = TestHarness::new();
    harness
        .catalog
        .add_work(fixtures::work(
            "W1",
            "Soil moisture retrieval from spaceborne radar",
            Some(2010),
        ))
        .await;

    // Default tolerance is 2 years, so 2010 falls outside [2018, 2022]
    let input = record("AW-4", "Soil moisture retrieval from spaceborne radar", Some(2020));
    let result = harness.engine.match_by_title(&input).await.unwrap();
    assert_eq!(result.status, MatchStatus::NoMatch);
}

#[tokio::test]
async fn test_tie_break_prefers_recent_then_smallest_id() {
    let harness = TestHarness::new();
    let title = "Benchmarking graph layout heuristics";
    harness.catalog.add_work(fixtures::work("W9", title, Some(2019))).await;
    harness.catalog.add_work(fixtures::work("W5", title, Some(2021))).await;
    harness.catalog.add_work(fixtures::work("W3", title, Some(2021))).await;

    let input = record("AW-5", title, Some(2020));
    let result = harness.engine.match_by_title(&input).await.unwrap();

    // Same ratio everywhere: latest year wins, then the smaller id
    assert_eq!(result.work.unwrap().id, "W3");
}

#[tokio::test]
async fn test_author_validation_annotates_match() {
    let harness = TestHarness::new();
    let mut work = fixtures::work("W1", "Coastal erosion under storm surge", Some(2020));
    work.authorships = vec![
        fixtures::authorship("A1", "John Smith", vec![]),
        fixtures::authorship("A2", "Mary Jones", vec![]),
    ];
    harness.catalog.add_work(work).await;

    let mut input = record("AW-6", "Coastal erosion under storm surge", Some(2020));
    input.authors = Some("John Smith; Mary Jones".to_string());

    let result = harness.engine.match_by_title(&input).await.unwrap();
    assert_eq!(result.status, MatchStatus::Matched);
    assert_eq!(result.matched_authors, Some(true));
    assert_eq!(result.matched_authors_count, 2);
}

#[tokio::test]
async fn test_author_mismatch_does_not_reverse_acceptance() {
    let harness = TestHarness::new();
    let mut work = fixtures::work("W1", "Coastal erosion under storm surge", Some(2020));
    work.authorships = vec![fixtures::authorship("A1", "Wei Zhang", vec![])];
    harness.catalog.add_work(work).await;

    let mut input = record("AW-7", "Coastal erosion under storm surge", Some(2020));
    input.authors = Some("John Smith".to_string());

    let result = harness.engine.match_by_title(&input).await.unwrap();
    assert_eq!(result.status, MatchStatus::Matched);
    assert_eq!(result.matched_authors, Some(false));
    assert_eq!(result.matched_authors_count, 0);
}

#[tokio::test]
async fn test_funding_check_on_matched_work() {
    let harness = TestHarness::new();
    let mut work = fixtures::work("W1", "Mapping wetland loss with time series", Some(2020));
    work.grants = vec![fixtures::grant("F100", "National Science Agency", Some("AW-8"))];
    harness.catalog.add_work(work).await;

    let input = record("AW-8", "Mapping wetland loss with time series", Some(2020));
    let result = harness.engine.match_by_title(&input).await.unwrap();

    let funding = result.funding.unwrap();
    assert!(funding.award_id_match);
    assert_eq!(funding.award_id_match_type, Some(AwardMatchType::Exact));
    assert_eq!(funding.matched_grant_award_id.as_deref(), Some("AW-8"));
}

#[tokio::test]
async fn test_missing_title_fails_record() {
    let harness = TestHarness::new();
    let input = InputRecord {
        award_id: "AW-9".to_string(),
        ..Default::default()
    };

    let result = harness.engine.match_by_title(&input).await.unwrap();
    assert_eq!(result.status, MatchStatus::Failed);
    assert_eq!(result.failure_reason.as_deref(), Some("no_title"));
    assert_eq!(harness.catalog.query_count().await, 0);
}

#[tokio::test]
async fn test_recoverable_api_error_becomes_failed_result() {
    let harness = TestHarness::new();
    harness
        .catalog
        .set_next_error(CatalogError::ApiError {
            status: 500,
            message: "upstream".to_string(),
        })
        .await;

    let input = record("AW-10", "Some reasonable title words", Some(2020));
    let result = harness.engine.match_by_title(&input).await.unwrap();
    assert_eq!(result.status, MatchStatus::Failed);
    assert!(result.failure_reason.is_some());
}

#[tokio::test]
async fn test_circuit_open_aborts_with_error() {
    let harness = TestHarness::new();
    harness
        .catalog
        .set_next_error(CatalogError::CircuitOpen {
            endpoint: "openalex".to_string(),
            reason: "error rate 0.92 over 300s".to_string(),
        })
        .await;

    let input = record("AW-11", "Some reasonable title words", Some(2020));
    let err = harness.engine.match_by_title(&input).await.unwrap_err();
    assert!(err.is_fatal());
}

#[tokio::test]
async fn test_threshold_is_configurable() {
    let mut config = MatchingConfig::default();
    config.similarity_threshold = 50;
    let harness = TestHarness::with_config(config);
    harness
        .catalog
        .add_work(fixtures::work(
            "W1",
            "Soil moisture retrieval over croplands",
            Some(2020),
        ))
        .await;

    let input = record("AW-12", "Soil moisture retrieval from spaceborne radar", Some(2020));
    let result = harness.engine.match_by_title(&input).await.unwrap();
    assert_eq!(result.status, MatchStatus::Matched);
    assert!(result.match_ratio >= 50);
}
