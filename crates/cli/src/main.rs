use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use clap::Parser;
use futures::stream::{self, StreamExt};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use grantmatch_core::catalog::{OpenAlexClient, RorClient};
use grantmatch_core::io::{read_records, RowWriter};
use grantmatch_core::matcher::AuthorAffiliationRow;
use grantmatch_core::similarity::{AffiliationScorer, FuzzyAffiliationScorer};
use grantmatch_core::{
    load_config, validate_config, Config, HealthMonitor, InputRecord, MatchEngine, MatchError,
    MatchMode, MatchStatus, TitleMatch,
};

#[derive(Debug, Parser)]
#[command(name = "grantmatch", version, about = "Match grant records against a scholarly catalog")]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Process at most this many input records.
    #[arg(long)]
    limit: Option<usize>,

    /// Load and validate the input, then exit without calling any API.
    #[arg(long)]
    dry_run: bool,

    /// Enable debug logging.
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

/// Per-mode result of one record, kept in input order.
enum RecordOutcome {
    Title(Box<TitleMatch>),
    Author(Vec<AuthorAffiliationRow>),
    /// Recoverable per-record failure (bad input, unparsable names).
    Skipped(String),
}

#[derive(Default)]
struct RunSummary {
    matched: usize,
    no_match: usize,
    failed: usize,
    rows_written: usize,
    ratio_sum: u64,
}

async fn run() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let default_filter = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    info!("Loading configuration from {:?}", args.config);
    let config = load_config(&args.config)
        .with_context(|| format!("Failed to load config from {:?}", args.config))?;
    validate_config(&config).context("Configuration validation failed")?;

    info!("Mode: {:?}", config.mode);
    info!("Input: {:?}", config.input.path);
    info!("Output: {:?}", config.output.path);

    // Read and map the input records
    let mut records = read_records(
        &config.input.path,
        config.input.format,
        config.input.field_mappings.clone(),
        config.input.records_path.as_deref(),
    )
    .with_context(|| format!("Failed to read records from {:?}", config.input.path))?;

    let limit = match (args.limit, config.processing.limit) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    };
    if let Some(limit) = limit {
        records.truncate(limit);
    }
    info!("Loaded {} input records", records.len());

    if args.dry_run {
        info!("Dry run requested, exiting before any API call");
        return Ok(());
    }

    // One health monitor per endpoint, shared with the summary below
    let openalex_health = Arc::new(HealthMonitor::new("openalex", config.api.health.clone()));
    let ror_health = Arc::new(HealthMonitor::new("ror", config.api.health.clone()));

    let catalog = Arc::new(
        OpenAlexClient::new(config.api.openalex.clone(), Arc::clone(&openalex_health))
            .context("Failed to create catalog client")?,
    );
    let registry = Arc::new(
        RorClient::new(config.api.ror.clone(), Arc::clone(&ror_health))
            .context("Failed to create registry client")?,
    );
    let scorer = build_scorer(&config)?;
    info!("Affiliation scorer: {}", scorer.name());

    let engine = Arc::new(MatchEngine::new(
        catalog,
        registry,
        scorer,
        config.matching.clone(),
    ));

    let mut writer = RowWriter::create(&config.output.path, config.output.format, config.mode)
        .context("Failed to create output writer")?;

    let started = Instant::now();
    let concurrency = config.processing.concurrency.max(1);
    let mode = config.mode;

    let mut outcomes = stream::iter(records.iter().cloned())
        .map(|record| {
            let engine = Arc::clone(&engine);
            async move {
                let outcome = process_record(&engine, mode, &record).await;
                (record, outcome)
            }
        })
        .buffered(concurrency);

    let mut summary = RunSummary::default();
    let mut fatal: Option<MatchError> = None;

    while let Some((record, outcome)) = outcomes.next().await {
        match outcome {
            Ok(RecordOutcome::Title(result)) => {
                match result.status {
                    MatchStatus::Matched => {
                        summary.matched += 1;
                        summary.ratio_sum += u64::from(result.match_ratio);
                    }
                    MatchStatus::NoMatch => summary.no_match += 1,
                    MatchStatus::Failed => summary.failed += 1,
                }
                writer.write_title_match(&record, &result)?;
                summary.rows_written += 1;
            }
            Ok(RecordOutcome::Author(rows)) => {
                if rows.is_empty() {
                    summary.no_match += 1;
                } else {
                    summary.matched += 1;
                }
                for row in &rows {
                    writer.write_author_row(row)?;
                    summary.rows_written += 1;
                }
            }
            Ok(RecordOutcome::Skipped(reason)) => {
                warn!(award_id = %record.award_id, "Skipping record: {}", reason);
                summary.failed += 1;
            }
            Err(e) => {
                // The circuit breaker tripped; everything written so far
                // stays on disk.
                error!(award_id = %record.award_id, "Aborting run: {}", e);
                fatal = Some(e);
                break;
            }
        }
    }
    drop(outcomes);

    writer.finalize().context("Failed to finalize output")?;

    let elapsed = started.elapsed();
    info!(
        "Processed {} records in {:.1}s: {} matched, {} no_match, {} failed, {} rows written",
        summary.matched + summary.no_match + summary.failed,
        elapsed.as_secs_f64(),
        summary.matched,
        summary.no_match,
        summary.failed,
        summary.rows_written,
    );
    if summary.matched > 0 && mode == MatchMode::Title {
        info!(
            "Mean match ratio: {:.1}",
            summary.ratio_sum as f64 / summary.matched as f64
        );
    }
    for monitor in [&openalex_health, &ror_health] {
        let stats = monitor.stats();
        info!(
            "API {}: {} attempts, {} failures, success rate {:.2}",
            monitor.endpoint(),
            stats.attempts,
            stats.failures,
            stats.success_rate,
        );
    }

    if let Some(e) = fatal {
        bail!("run aborted: {}", e);
    }
    Ok(())
}

/// Run one record through the engine for the configured mode.
///
/// Recoverable per-record errors come back as `Skipped`; only fatal
/// errors surface as `Err` and abort the run.
async fn process_record(
    engine: &MatchEngine,
    mode: MatchMode,
    record: &InputRecord,
) -> Result<RecordOutcome, MatchError> {
    let result = match mode {
        MatchMode::Title => engine
            .match_by_title(record)
            .await
            .map(|m| RecordOutcome::Title(Box::new(m))),
        MatchMode::AuthorAffiliation => engine
            .match_by_author_affiliation(record)
            .await
            .map(RecordOutcome::Author),
    };

    match result {
        Ok(outcome) => Ok(outcome),
        Err(e) if e.is_fatal() => Err(e),
        Err(e) => Ok(RecordOutcome::Skipped(e.to_string())),
    }
}

fn build_scorer(config: &Config) -> Result<Arc<dyn AffiliationScorer>> {
    use grantmatch_core::config::ScorerKind;

    match config.processing.scorer {
        ScorerKind::Fuzzy => Ok(Arc::new(FuzzyAffiliationScorer)),
        ScorerKind::Embedding => {
            bail!("embedding scorer requires an external embedding service; configure processing.scorer = \"fuzzy\"")
        }
    }
}
