//! End-to-end portfolio run.
//!
//! Phases run in a fixed order: load validation, fund decomposition,
//! enrichment, aggregation, reporting. Each phase boundary crosses a
//! validation gate whose findings degrade the quality score; only a
//! completely empty portfolio fails the run outright.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use crate::aggregate::aggregate;
use crate::config::RunConfig;
use crate::decompose::Decomposer;
use crate::domain::{AssetClass, ExposureRecord, LoadedPosition};
use crate::enrich::Enricher;
use crate::external::{NoopProgress, ProgressSink};
use crate::gates;
use crate::holdings::{AdapterRegistry, HoldingsCache};
use crate::issue::{Phase, PipelineIssue};
use crate::quality::DataQuality;
use crate::resolve::{ResolutionStatsSnapshot, Resolver};

/// Cooperative cancellation flag shared with worker tasks.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Outcome of one portfolio run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// False only when there was no input to work on.
    pub success: bool,
    /// True when some items failed but the run still produced output.
    pub partial: bool,
    pub exposures: Vec<ExposureRecord>,
    pub quality: DataQuality,
    pub issues: Vec<PipelineIssue>,
    pub processed_funds: usize,
    pub failed_funds: usize,
    pub total_value: f64,
    pub resolution_stats: ResolutionStatsSnapshot,
}

pub struct Pipeline {
    resolver: Arc<Resolver>,
    holdings: Arc<HoldingsCache>,
    registry: Arc<AdapterRegistry>,
    enricher: Enricher,
    progress: Arc<dyn ProgressSink>,
    config: RunConfig,
}

impl Pipeline {
    pub fn new(
        resolver: Arc<Resolver>,
        holdings: Arc<HoldingsCache>,
        registry: Arc<AdapterRegistry>,
        enricher: Enricher,
        config: RunConfig,
    ) -> Self {
        Self {
            resolver,
            holdings,
            registry,
            enricher,
            progress: Arc::new(NoopProgress),
            config,
        }
    }

    #[must_use]
    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    /// Run the full look-through over the loaded positions.
    pub async fn run(
        &self,
        positions: Vec<LoadedPosition>,
        force_refresh: bool,
        cancel: &CancelToken,
    ) -> RunReport {
        let mut quality = DataQuality::new();
        let mut issues: Vec<PipelineIssue> = Vec::new();

        self.progress.on_progress("Validating positions", 0.0);
        quality.add_issues(gates::validate_loaded_positions(
            &positions,
            Phase::DataLoading,
        ));
        if positions.is_empty() {
            return RunReport {
                success: false,
                partial: false,
                exposures: Vec::new(),
                quality,
                issues,
                processed_funds: 0,
                failed_funds: 0,
                total_value: 0.0,
                resolution_stats: self.resolver.stats(),
            };
        }

        let (funds, direct): (Vec<_>, Vec<_>) = positions
            .into_iter()
            .partition(|p| matches!(p.asset_class, AssetClass::Etf | AssetClass::Fund));
        info!(
            direct = direct.len(),
            funds = funds.len(),
            "positions partitioned"
        );

        self.progress.on_progress("Decomposing funds", 0.2);
        let decomposer = Decomposer::new(
            Arc::clone(&self.resolver),
            Arc::clone(&self.holdings),
            Arc::clone(&self.registry),
            self.config.effective_concurrency(),
        );
        let decomposition = decomposer
            .decompose_all(funds.clone(), force_refresh, cancel)
            .await;
        let failed_funds = decomposition.failed_funds;
        issues.extend(decomposition.issues);

        for fund in &decomposition.decompositions {
            quality.add_issues(gates::validate_holdings_weights(fund, Phase::Decomposition));
            quality.add_issues(gates::validate_resolution_rate(fund, Phase::Decomposition));
        }

        self.progress.on_progress("Enriching securities", 0.6);
        let all_positions: Vec<LoadedPosition> =
            direct.iter().chain(funds.iter()).cloned().collect();
        let enrichment = self
            .enricher
            .enrich(&all_positions, &decomposition.decompositions)
            .await;
        issues.extend(enrichment.issues);

        self.progress.on_progress("Aggregating exposures", 0.8);
        let aggregation = aggregate(
            &direct,
            &funds,
            &decomposition.decompositions,
            &enrichment.metadata,
        );
        issues.extend(aggregation.issues);

        let calculated_total: f64 = aggregation.exposures.iter().map(ExposureRecord::total).sum();
        quality.add_issues(gates::validate_aggregation_totals(
            calculated_total,
            aggregation.total_value,
            self.config.conservation_tolerance,
            Phase::Aggregation,
        ));
        quality.add_issues(gates::validate_enrichment_coverage(
            &aggregation.exposures,
            Phase::Enrichment,
        ));
        quality.add_issues(gates::validate_percentage_sum(
            &aggregation.exposures,
            Phase::Reporting,
        ));
        quality.add_issues(gates::validate_completeness(
            &direct,
            &aggregation.exposures,
            Phase::Reporting,
        ));

        self.progress.on_progress("Run complete", 1.0);
        let resolution_stats = self.resolver.stats();
        info!(
            resolution = %resolution_stats.summary(),
            total_value = aggregation.total_value,
            quality_score = quality.score,
            "portfolio run finished"
        );
        // A cancelled run still emits what it computed, flagged partial.
        let partial = failed_funds > 0 || !issues.is_empty() || cancel.is_cancelled();
        RunReport {
            success: true,
            partial,
            exposures: aggregation.exposures,
            quality,
            issues,
            processed_funds: decomposition.decompositions.len(),
            failed_funds,
            total_value: aggregation.total_value,
            resolution_stats,
        }
    }
}
