//! Core engine for lookthru.
//!
//! This crate contains:
//! - Canonical domain models: validated identifiers, fallback keys,
//!   positions, holdings and exposures
//! - Cascading identifier resolution with a persistent cache
//! - Tiered fund holdings retrieval
//! - Decomposition, enrichment and value-conserving aggregation
//! - Validation gates and the severity-weighted quality score

pub mod aggregate;
pub mod config;
pub mod decompose;
pub mod domain;
pub mod enrich;
pub mod error;
pub mod external;
pub mod gates;
pub mod holdings;
pub mod http_client;
pub mod issue;
pub mod normalize;
pub mod pipeline;
pub mod quality;
pub mod resolve;
pub mod schema;
pub mod throttling;

pub use aggregate::{aggregate as aggregate_exposures, AggregationOutcome};
pub use config::{RunConfig, MAX_CONCURRENCY, MIN_CONCURRENCY};
pub use decompose::{Decomposer, DecompositionOutcome};
pub use domain::{
    is_placeholder, AssetClass, ExposureRecord, FallbackKey, FundDecomposition, HoldingRecord,
    Identifier, LoadedPosition, ResolutionStatus, SecurityKey, MAX_WEIGHT_PERCENTAGE,
};
pub use enrich::{Enricher, EnrichmentOutcome};
pub use error::{CoreError, ValidationError};
pub use external::{
    BoxFuture, CommunityStore, ExternalError, MetadataService, NoopProgress, ProgressSink,
    ScraperAdapter, SecurityMetadata,
};
pub use holdings::{
    AdapterRegistry, HoldingsCache, HoldingsError, HoldingsSource, HoldingsTable,
};
pub use http_client::{
    HttpClient, HttpError, HttpMethod, HttpRequest, HttpResponse, NoopHttpClient,
    ReqwestHttpClient,
};
pub use issue::{FailureKind, Phase, PipelineIssue};
pub use lookthru_warehouse::{
    AliasRecord, HoldingsRow, Warehouse, WarehouseConfig, WarehouseError,
};
pub use pipeline::{CancelToken, Pipeline, RunReport};
pub use quality::{DataQuality, IssueCategory, Severity, ValidationIssue};
pub use resolve::{
    AliasKind, CacheEntry, CacheStatus, FinnhubSource, LookupError, LookupErrorKind, LookupQuery,
    LookupSource, ResolutionCache, ResolutionOutcome, ResolutionStatsSnapshot, Resolver,
    ResolverOptions, SourceSlot, WikidataSource,
};
pub use schema::{normalize_row, normalize_table, RawHolding};
pub use throttling::{BackoffPolicy, SourcePolicy, ThrottlingQueue};
