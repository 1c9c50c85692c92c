//! End-to-end pipeline behavior over stubbed external collaborators.

use std::collections::BTreeMap;
use std::sync::Arc;

use lookthru_core::{
    AdapterRegistry, AssetClass, BoxFuture, CancelToken, Enricher, ExposureRecord, ExternalError,
    FailureKind, HoldingsCache, Identifier, LoadedPosition, MetadataService, Phase, Pipeline,
    RawHolding, ResolutionCache, Resolver, ResolverOptions, RunConfig, ScraperAdapter,
    SecurityMetadata, Warehouse, WarehouseConfig,
};
use tempfile::tempdir;

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn apple() -> Identifier {
    Identifier::parse("US0378331005").expect("valid identifier")
}

fn microsoft() -> Identifier {
    Identifier::parse("US5949181045").expect("valid identifier")
}

fn world_fund() -> Identifier {
    Identifier::parse("IE00B4L5Y983").expect("valid identifier")
}

fn warehouse(dir: &std::path::Path) -> Warehouse {
    Warehouse::open(WarehouseConfig {
        lookthru_home: dir.to_path_buf(),
        db_path: dir.join("cache.duckdb"),
        max_pool_size: 2,
    })
    .expect("open warehouse")
}

fn equity(identifier: Identifier, name: &str, quantity: f64, price: f64) -> LoadedPosition {
    LoadedPosition::new(
        identifier,
        name,
        quantity,
        Some(price),
        None,
        AssetClass::Equity,
        "USD",
    )
    .expect("valid position")
}

fn etf(identifier: Identifier, name: &str, value: f64) -> LoadedPosition {
    LoadedPosition::new(identifier, name, 1.0, Some(value), None, AssetClass::Etf, "USD")
        .expect("valid position")
}

struct StubAdapter {
    rows: Vec<RawHolding>,
}

impl ScraperAdapter for StubAdapter {
    fn provider(&self) -> &'static str {
        "ishares"
    }

    fn fetch_holdings<'a>(
        &'a self,
        _identifier: &'a Identifier,
    ) -> BoxFuture<'a, Result<Vec<RawHolding>, ExternalError>> {
        let rows = self.rows.clone();
        Box::pin(async move { Ok(rows) })
    }
}

struct StubMetadata;

impl MetadataService for StubMetadata {
    fn get_metadata_batch<'a>(
        &'a self,
        identifiers: &'a [Identifier],
    ) -> BoxFuture<'a, Result<BTreeMap<Identifier, SecurityMetadata>, ExternalError>> {
        Box::pin(async move {
            Ok(identifiers
                .iter()
                .map(|identifier| {
                    (
                        identifier.clone(),
                        SecurityMetadata {
                            sector: "Technology".into(),
                            geography: "United States".into(),
                            asset_class: AssetClass::Equity,
                            name: None,
                        },
                    )
                })
                .collect())
        })
    }
}

fn world_fund_rows() -> Vec<RawHolding> {
    vec![
        RawHolding {
            name: Some("Apple Inc".into()),
            ticker: Some("AAPL".into()),
            isin: Some(apple().as_str().to_string()),
            weight_percentage: Some(60.0),
        },
        RawHolding {
            name: Some("Microsoft Corp".into()),
            ticker: Some("MSFT".into()),
            isin: Some(microsoft().as_str().to_string()),
            weight_percentage: Some(40.0),
        },
    ]
}

fn pipeline(dir: &std::path::Path, registry: AdapterRegistry) -> Pipeline {
    let warehouse = warehouse(dir);
    let config = RunConfig::default();
    let cache = ResolutionCache::new(
        warehouse.clone(),
        config.unresolved_ttl_hours,
        config.rate_limited_ttl_hours,
    );
    let resolver = Arc::new(Resolver::new(
        cache,
        None,
        Vec::new(),
        ResolverOptions::default(),
    ));
    let holdings = Arc::new(HoldingsCache::new(
        warehouse,
        None,
        config.holdings_max_age,
        false,
    ));
    let enricher = Enricher::new(Some(Arc::new(StubMetadata)));
    Pipeline::new(resolver, holdings, Arc::new(registry), enricher, config)
}

#[tokio::test]
async fn look_through_merges_direct_and_fund_exposure() {
    init_tracing();
    let temp = tempdir().expect("tempdir");

    let mut registry = AdapterRegistry::new();
    registry.register_adapter(Arc::new(StubAdapter {
        rows: world_fund_rows(),
    }));
    registry.assign(world_fund(), "ishares");

    let pipeline = pipeline(temp.path(), registry);
    let positions = vec![
        equity(apple(), "Apple Inc", 10.0, 150.0),
        etf(world_fund(), "iShares Core MSCI World", 2200.0),
    ];

    let report = pipeline
        .run(positions, false, &CancelToken::new())
        .await;

    assert!(report.success);
    assert_eq!(report.processed_funds, 1);
    assert_eq!(report.failed_funds, 0);
    assert_eq!(report.total_value, 3700.0);

    let apple_row = report
        .exposures
        .iter()
        .find(|e| e.key.as_str() == apple().as_str())
        .expect("apple exposure");
    assert_eq!(apple_row.direct_value, 1500.0);
    assert_eq!(apple_row.indirect_value, 1320.0);
    assert_eq!(apple_row.total(), 2820.0);
    assert_eq!(apple_row.sector, "Technology");

    let microsoft_row = report
        .exposures
        .iter()
        .find(|e| e.key.as_str() == microsoft().as_str())
        .expect("microsoft exposure");
    assert_eq!(microsoft_row.indirect_value, 880.0);

    // Value conservation is exact here: no holding was dropped.
    let calculated: f64 = report.exposures.iter().map(ExposureRecord::total).sum();
    assert_eq!(calculated, report.total_value);

    assert!(report.quality.is_trustworthy(), "{:?}", report.quality);
    assert_eq!(report.resolution_stats.provider_hits, 2);
}

#[tokio::test]
async fn empty_portfolio_fails_the_run() {
    init_tracing();
    let temp = tempdir().expect("tempdir");
    let pipeline = pipeline(temp.path(), AdapterRegistry::new());

    let report = pipeline.run(Vec::new(), false, &CancelToken::new()).await;
    assert!(!report.success);
    assert!(report.exposures.is_empty());
    assert!(report
        .quality
        .issues
        .iter()
        .any(|issue| issue.code == "NO_POSITIONS"));
    assert!(!report.quality.is_trustworthy());
}

#[tokio::test]
async fn fund_without_adapter_is_carried_whole() {
    init_tracing();
    let temp = tempdir().expect("tempdir");
    let pipeline = pipeline(temp.path(), AdapterRegistry::new());

    let positions = vec![
        equity(apple(), "Apple Inc", 10.0, 100.0),
        etf(world_fund(), "Unknown Fund", 500.0),
    ];
    let report = pipeline.run(positions, false, &CancelToken::new()).await;

    assert!(report.success);
    assert!(report.partial);
    assert_eq!(report.failed_funds, 1);
    assert!(report
        .issues
        .iter()
        .any(|issue| issue.kind == FailureKind::NoAdapter));

    // The fund's value still shows up as a single opaque exposure.
    let fund_row = report
        .exposures
        .iter()
        .find(|e| e.key.as_str() == world_fund().as_str())
        .expect("fund exposure");
    assert_eq!(fund_row.indirect_value, 500.0);

    let calculated: f64 = report.exposures.iter().map(ExposureRecord::total).sum();
    assert_eq!(calculated, report.total_value);
}

#[tokio::test]
async fn cancellation_skips_remaining_funds() {
    init_tracing();
    let temp = tempdir().expect("tempdir");

    let mut registry = AdapterRegistry::new();
    registry.register_adapter(Arc::new(StubAdapter {
        rows: world_fund_rows(),
    }));
    registry.assign(world_fund(), "ishares");

    let pipeline = pipeline(temp.path(), registry);
    let cancel = CancelToken::new();
    cancel.cancel();

    let report = pipeline
        .run(vec![etf(world_fund(), "World Fund", 1000.0)], false, &cancel)
        .await;

    // The fund was never decomposed, so it is carried whole instead,
    // and the truncated output is flagged as partial.
    assert_eq!(report.processed_funds, 0);
    assert!(report.partial);
    let calculated: f64 = report.exposures.iter().map(ExposureRecord::total).sum();
    assert_eq!(calculated, 1000.0);
}

#[tokio::test]
async fn invalid_holding_rows_surface_as_issues() {
    init_tracing();
    let temp = tempdir().expect("tempdir");

    let mut rows = world_fund_rows();
    rows[1].weight_percentage = Some(200.0); // outside the accepted range

    let mut registry = AdapterRegistry::new();
    registry.register_adapter(Arc::new(StubAdapter { rows }));
    registry.assign(world_fund(), "ishares");

    let pipeline = pipeline(temp.path(), registry);
    let report = pipeline
        .run(vec![etf(world_fund(), "World Fund", 1000.0)], false, &CancelToken::new())
        .await;

    // The fund still decomposes; the bad row becomes a structured
    // issue rather than vanishing.
    assert!(report.success);
    assert!(report.partial);
    assert_eq!(report.processed_funds, 1);
    assert_eq!(report.failed_funds, 0);
    let dropped: Vec<_> = report
        .issues
        .iter()
        .filter(|issue| {
            issue.phase == Phase::Decomposition && issue.kind == FailureKind::ValidationFailed
        })
        .collect();
    assert_eq!(dropped.len(), 1);
    assert!(dropped[0].message.contains("Microsoft Corp"));
}

#[tokio::test]
async fn weight_shortfall_degrades_quality_without_failing() {
    init_tracing();
    let temp = tempdir().expect("tempdir");

    let mut rows = world_fund_rows();
    rows[1].weight_percentage = Some(25.0); // sums to 85

    let mut registry = AdapterRegistry::new();
    registry.register_adapter(Arc::new(StubAdapter { rows }));
    registry.assign(world_fund(), "ishares");

    let pipeline = pipeline(temp.path(), registry);
    let report = pipeline
        .run(vec![etf(world_fund(), "World Fund", 1000.0)], false, &CancelToken::new())
        .await;

    assert!(report.success);
    let weight_issues: Vec<_> = report
        .quality
        .issues
        .iter()
        .filter(|issue| issue.code == "WEIGHT_SUM_LOW")
        .collect();
    assert_eq!(weight_issues.len(), 1);
    assert!(report.quality.score < 1.0);
}
