//! Fund decomposition over a bounded worker pool.
//!
//! Each fund position becomes one task: fetch its holdings table, then
//! resolve every constituent. A semaphore bounds concurrent funds so
//! outbound calls stay inside third-party rate limits. Per-fund
//! failures become pipeline issues; they never abort the run.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::domain::{FundDecomposition, HoldingRecord, LoadedPosition, ResolutionStatus};
use crate::holdings::{AdapterRegistry, HoldingsCache, HoldingsError};
use crate::issue::{FailureKind, Phase, PipelineIssue};
use crate::pipeline::CancelToken;
use crate::resolve::Resolver;
use crate::schema::RawHolding;

/// Decomposition results plus per-fund and per-row failures.
#[derive(Debug, Default)]
pub struct DecompositionOutcome {
    pub decompositions: Vec<FundDecomposition>,
    pub issues: Vec<PipelineIssue>,
    /// Funds that produced no decomposition at all. Row-level issues
    /// on funds that still decomposed do not count here.
    pub failed_funds: usize,
}

pub struct Decomposer {
    resolver: Arc<Resolver>,
    holdings: Arc<HoldingsCache>,
    registry: Arc<AdapterRegistry>,
    concurrency: usize,
}

impl Decomposer {
    pub fn new(
        resolver: Arc<Resolver>,
        holdings: Arc<HoldingsCache>,
        registry: Arc<AdapterRegistry>,
        concurrency: usize,
    ) -> Self {
        Self {
            resolver,
            holdings,
            registry,
            concurrency: concurrency.max(1),
        }
    }

    /// Decompose all fund positions. Funds whose holdings cannot be
    /// retrieved are reported as issues and excluded from the result;
    /// the aggregation stage carries them as opaque exposures instead.
    pub async fn decompose_all(
        &self,
        funds: Vec<LoadedPosition>,
        force_refresh: bool,
        cancel: &CancelToken,
    ) -> DecompositionOutcome {
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks = JoinSet::new();

        for fund in funds {
            if cancel.is_cancelled() {
                debug!("decomposition cancelled before scheduling remaining funds");
                break;
            }

            let resolver = Arc::clone(&self.resolver);
            let holdings = Arc::clone(&self.holdings);
            let registry = Arc::clone(&self.registry);
            let semaphore = Arc::clone(&semaphore);
            let cancel = cancel.clone();

            tasks.spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .expect("semaphore is never closed");
                decompose_one(&resolver, &holdings, &registry, fund, force_refresh, &cancel).await
            });
        }

        let mut outcome = DecompositionOutcome::default();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok((decomposition, row_issues))) => {
                    outcome.decompositions.push(decomposition);
                    outcome.issues.extend(row_issues);
                }
                Ok(Err(issue)) => {
                    outcome.failed_funds += 1;
                    outcome.issues.push(issue);
                }
                Err(error) => {
                    warn!(%error, "decomposition task panicked");
                    outcome.failed_funds += 1;
                    outcome.issues.push(PipelineIssue::new(
                        Phase::Decomposition,
                        FailureKind::Unknown,
                        "unknown",
                        error.to_string(),
                    ));
                }
            }
        }

        // Join order is arbitrary; keep output deterministic.
        outcome
            .decompositions
            .sort_by(|a, b| a.fund.as_str().cmp(b.fund.as_str()));
        outcome
    }
}

async fn decompose_one(
    resolver: &Resolver,
    holdings: &HoldingsCache,
    registry: &AdapterRegistry,
    fund: LoadedPosition,
    force_refresh: bool,
    cancel: &CancelToken,
) -> Result<(FundDecomposition, Vec<PipelineIssue>), PipelineIssue> {
    let table = holdings
        .get_holdings(&fund.identifier, Some(&fund.name), registry, force_refresh)
        .await
        .map_err(|error| holdings_issue(&fund, &error))?;

    let rows = with_weight_fallback(table.rows);
    let mut records = Vec::with_capacity(rows.len());
    let mut row_issues = Vec::new();

    for (row, weight) in rows {
        let name = row
            .name
            .clone()
            .or_else(|| row.ticker.clone())
            .unwrap_or_else(|| String::from("UNKNOWN"));

        let record = match HoldingRecord::new(name.clone(), row.ticker.clone(), weight) {
            Ok(record) => record,
            Err(error) => {
                warn!(fund = fund.identifier.as_str(), holding = name, %error, "dropping holding row");
                row_issues.push(PipelineIssue::new(
                    Phase::Decomposition,
                    FailureKind::ValidationFailed,
                    fund.identifier.as_str(),
                    format!("holding '{name}' dropped: {error}"),
                ));
                continue;
            }
        };

        // A cancelled run finishes the rows it already has but stops
        // issuing new lookups.
        let outcome = if cancel.is_cancelled() {
            None
        } else {
            let resolved = resolver
                .resolve(row.ticker.as_deref(), &name, row.isin.as_deref(), weight)
                .await
                .map_err(|error| {
                    PipelineIssue::new(
                        Phase::Decomposition,
                        FailureKind::Unknown,
                        fund.identifier.as_str(),
                        error.to_string(),
                    )
                })?;
            Some(resolved)
        };

        let record = match outcome {
            Some(outcome) => record.with_resolution(
                outcome.identifier,
                outcome.status,
                outcome.source,
                outcome.confidence,
            ),
            None => record.with_resolution(None, ResolutionStatus::Skipped, None, 0.0),
        }
            .map_err(|error| {
                PipelineIssue::new(
                    Phase::Decomposition,
                    FailureKind::ValidationFailed,
                    fund.identifier.as_str(),
                    error.to_string(),
                )
            })?;
        records.push(record);
    }

    Ok((
        FundDecomposition::new(
            fund.identifier.clone(),
            fund.name.clone(),
            fund.market_value(),
            records,
        ),
        row_issues,
    ))
}

/// Pair each row with its effective weight. A table with no weight
/// column at all falls back to equal weighting; a row that merely
/// lacks a value in a weighted table contributes nothing.
fn with_weight_fallback(rows: Vec<RawHolding>) -> Vec<(RawHolding, f64)> {
    if rows.is_empty() {
        return Vec::new();
    }

    let any_weighted = rows.iter().any(|row| row.weight_percentage.is_some());
    #[allow(clippy::cast_precision_loss)]
    let equal_weight = 100.0 / rows.len() as f64;

    rows.into_iter()
        .map(|row| {
            let weight = if any_weighted {
                row.weight_percentage.unwrap_or(0.0)
            } else {
                equal_weight
            };
            (row, weight)
        })
        .collect()
}

fn holdings_issue(fund: &LoadedPosition, error: &HoldingsError) -> PipelineIssue {
    let kind = match error {
        HoldingsError::ManualUploadRequired { .. } => FailureKind::NoAdapter,
        HoldingsError::Parse(_) => FailureKind::ParseError,
        HoldingsError::Warehouse(_) => FailureKind::Unknown,
    };
    let issue = PipelineIssue::new(
        Phase::Decomposition,
        kind,
        fund.identifier.as_str(),
        error.to_string(),
    );
    if kind == FailureKind::NoAdapter {
        issue.with_fix_hint(format!(
            "upload holdings for {} manually or assign a scraper provider",
            fund.identifier.as_str()
        ))
    } else {
        issue
    }
}
