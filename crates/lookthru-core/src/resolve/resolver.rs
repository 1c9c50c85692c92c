//! Cascading identifier resolution.
//!
//! Resolution walks a fixed cost ladder: provider-supplied identifier,
//! persistent cache, community store, then external lookup sources.
//! Each rung that answers records its own confidence; only external
//! rungs cost API quota, and minor holdings never reach them.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use crate::domain::{is_placeholder, Identifier, ResolutionStatus};
use crate::error::CoreError;
use crate::external::CommunityStore;
use crate::normalize::{detect_format, name_variants, ticker_variants};
use crate::resolve::cache::{AliasKind, CacheStatus, ResolutionCache};
use crate::resolve::sources::{LookupErrorKind, LookupQuery, LookupSource};
use crate::throttling::ThrottlingQueue;

pub const CONFIDENCE_PROVIDER: f64 = 1.0;
pub const CONFIDENCE_LOCAL_CACHE: f64 = 0.95;
pub const CONFIDENCE_COMMUNITY: f64 = 0.90;

/// One external source paired with its rate budget.
pub struct SourceSlot {
    pub source: Arc<dyn LookupSource>,
    pub throttle: ThrottlingQueue,
}

/// Result of resolving one loose security reference.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolutionOutcome {
    pub identifier: Option<Identifier>,
    pub status: ResolutionStatus,
    /// Short machine-readable note on how the outcome was reached,
    /// e.g. `"negative_cached"`. Observability only.
    pub detail: Option<&'static str>,
    pub source: Option<String>,
    pub confidence: f64,
}

impl ResolutionOutcome {
    fn resolved(identifier: Identifier, source: &str, confidence: f64) -> Self {
        Self {
            identifier: Some(identifier),
            status: ResolutionStatus::Resolved,
            detail: None,
            source: Some(source.to_string()),
            confidence,
        }
    }

    fn unresolved(detail: &'static str) -> Self {
        Self {
            identifier: None,
            status: ResolutionStatus::Unresolved,
            detail: Some(detail),
            source: None,
            confidence: 0.0,
        }
    }

    fn skipped() -> Self {
        Self {
            identifier: None,
            status: ResolutionStatus::Skipped,
            detail: Some("below_api_weight_threshold"),
            source: None,
            confidence: 0.0,
        }
    }
}

/// Per-run resolution counters, updated across worker tasks.
#[derive(Debug, Default)]
pub struct ResolutionStats {
    provider_hits: AtomicU64,
    cache_hits: AtomicU64,
    community_hits: AtomicU64,
    external_hits: AtomicU64,
    skipped: AtomicU64,
    rate_limited: AtomicU64,
    misses: AtomicU64,
}

/// Point-in-time copy of the counters, suitable for reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ResolutionStatsSnapshot {
    pub provider_hits: u64,
    pub cache_hits: u64,
    pub community_hits: u64,
    pub external_hits: u64,
    pub skipped: u64,
    pub rate_limited: u64,
    pub misses: u64,
}

impl ResolutionStatsSnapshot {
    #[must_use]
    pub const fn total(&self) -> u64 {
        self.provider_hits
            + self.cache_hits
            + self.community_hits
            + self.external_hits
            + self.skipped
            + self.rate_limited
            + self.misses
    }

    #[must_use]
    pub const fn resolved(&self) -> u64 {
        self.provider_hits + self.cache_hits + self.community_hits + self.external_hits
    }

    /// Human-readable one-line report for logs and run summaries.
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "resolved {}/{} (existing {}, cache {}, community {}, external {}), \
             skipped {}, rate limited {}, unresolved {}",
            self.resolved(),
            self.total(),
            self.provider_hits,
            self.cache_hits,
            self.community_hits,
            self.external_hits,
            self.skipped,
            self.rate_limited,
            self.misses,
        )
    }
}

impl ResolutionStats {
    fn bump(&self, counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> ResolutionStatsSnapshot {
        ResolutionStatsSnapshot {
            provider_hits: self.provider_hits.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            community_hits: self.community_hits.load(Ordering::Relaxed),
            external_hits: self.external_hits.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            rate_limited: self.rate_limited.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

/// Options carved out of the run configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolverOptions {
    /// Holdings at or below this weight never hit external sources.
    pub api_weight_threshold: f64,
    /// Upper bound on variants sent per lookup call.
    pub max_lookup_variants: usize,
    /// Push external hits back to the community store.
    pub contribute_enabled: bool,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self {
            api_weight_threshold: 1.0,
            max_lookup_variants: 5,
            contribute_enabled: true,
        }
    }
}

pub struct Resolver {
    cache: ResolutionCache,
    community: Option<Arc<dyn CommunityStore>>,
    sources: Vec<SourceSlot>,
    options: ResolverOptions,
    stats: ResolutionStats,
}

impl Resolver {
    pub fn new(
        cache: ResolutionCache,
        community: Option<Arc<dyn CommunityStore>>,
        sources: Vec<SourceSlot>,
        options: ResolverOptions,
    ) -> Self {
        Self {
            cache,
            community,
            sources,
            options,
            stats: ResolutionStats::default(),
        }
    }

    pub fn stats(&self) -> ResolutionStatsSnapshot {
        self.stats.snapshot()
    }

    /// Resolve one loose reference to a canonical identifier.
    ///
    /// `provider_identifier` is whatever identifier column the source
    /// table carried; it wins outright when it validates. The weight
    /// gates the external tier only, never the cheap tiers.
    pub async fn resolve(
        &self,
        ticker: Option<&str>,
        name: &str,
        provider_identifier: Option<&str>,
        weight_percentage: f64,
    ) -> Result<ResolutionOutcome, CoreError> {
        if let Some(raw) = provider_identifier {
            if !is_placeholder(raw) {
                if let Ok(identifier) = Identifier::parse(raw) {
                    self.stats.bump(&self.stats.provider_hits);
                    return Ok(ResolutionOutcome::resolved(
                        identifier,
                        "existing",
                        CONFIDENCE_PROVIDER,
                    ));
                }
                debug!(raw, name, "provider identifier failed validation");
            }
        }

        let ticker = ticker.filter(|t| !is_placeholder(t));
        let tickers = ticker.map(ticker_variants).unwrap_or_default();
        let names = if is_placeholder(name) {
            Vec::new()
        } else {
            name_variants(name)
        };

        if let Some(t) = ticker {
            debug!(
                ticker = t,
                format = %detect_format(t),
                variants = tickers.len(),
                "resolving ticker"
            );
        }

        // Cache tier: positive hits short-circuit, negative hits mean
        // a recent attempt already failed for this alias.
        let mut negative_cached = false;
        for (alias, kind) in alias_pairs(&tickers, &names) {
            match self.cache.get(alias, kind)? {
                Some(entry) if entry.status == CacheStatus::Resolved => {
                    if let Some(identifier) = entry.identifier {
                        self.stats.bump(&self.stats.cache_hits);
                        return Ok(ResolutionOutcome::resolved(
                            identifier,
                            "local_cache",
                            CONFIDENCE_LOCAL_CACHE,
                        ));
                    }
                }
                Some(_) => negative_cached = true,
                None => {}
            }
        }
        if negative_cached {
            self.stats.bump(&self.stats.misses);
            return Ok(ResolutionOutcome::unresolved("negative_cached"));
        }

        // Community tier. Store failures are logged and skipped.
        if let (Some(store), Some(t)) = (self.community.as_ref(), ticker) {
            match store.lookup_ticker(t).await {
                Ok(Some(raw)) => {
                    if let Ok(identifier) = Identifier::parse(&raw) {
                        self.cache.set_positive(
                            t,
                            AliasKind::Ticker,
                            &identifier,
                            CONFIDENCE_COMMUNITY,
                            "community",
                        )?;
                        self.stats.bump(&self.stats.community_hits);
                        return Ok(ResolutionOutcome::resolved(
                            identifier,
                            "community",
                            CONFIDENCE_COMMUNITY,
                        ));
                    }
                    warn!(ticker = t, raw, "community listing failed validation");
                }
                Ok(None) => {}
                Err(error) => warn!(ticker = t, %error, "community lookup failed"),
            }
        }

        // External tier is quota-bound; minor holdings stop here.
        if weight_percentage <= self.options.api_weight_threshold {
            self.stats.bump(&self.stats.skipped);
            return Ok(ResolutionOutcome::skipped());
        }

        self.resolve_external(ticker, name, &tickers, &names).await
    }

    async fn resolve_external(
        &self,
        ticker: Option<&str>,
        name: &str,
        tickers: &[String],
        names: &[String],
    ) -> Result<ResolutionOutcome, CoreError> {
        let bound = self.options.max_lookup_variants;
        let query = LookupQuery {
            ticker_variants: &tickers[..tickers.len().min(bound)],
            name_variants: &names[..names.len().min(bound)],
        };

        for slot in &self.sources {
            if let Err(delay) = slot.throttle.acquire() {
                debug!(
                    source = slot.source.name(),
                    backoff_secs = delay.as_secs(),
                    "local rate budget exhausted"
                );
                self.record_rate_limited(ticker, name)?;
                return Ok(ResolutionOutcome::unresolved("rate_limited"));
            }

            match slot.source.lookup(query).await {
                Ok(Some(identifier)) => {
                    let source = slot.source.name();
                    let confidence = slot.source.confidence();
                    if let Some(t) = ticker {
                        self.cache
                            .set_positive(t, AliasKind::Ticker, &identifier, confidence, source)?;
                    }
                    if !is_placeholder(name) {
                        self.cache
                            .set_positive(name, AliasKind::Name, &identifier, confidence, source)?;
                    }
                    self.contribute_listing(ticker, name, &identifier, source)
                        .await;
                    self.stats.bump(&self.stats.external_hits);
                    return Ok(ResolutionOutcome::resolved(identifier, source, confidence));
                }
                Ok(None) => {
                    debug!(source = slot.source.name(), name, "lookup miss");
                }
                Err(error) if error.kind() == LookupErrorKind::RateLimited => {
                    warn!(source = slot.source.name(), %error, "source rate limited");
                    self.record_rate_limited(ticker, name)?;
                    return Ok(ResolutionOutcome::unresolved("rate_limited"));
                }
                Err(error) => {
                    warn!(source = slot.source.name(), %error, "lookup failed");
                }
            }
        }

        if let Some(t) = ticker {
            self.cache
                .set_negative(t, AliasKind::Ticker, CacheStatus::Unresolved, None)?;
        }
        if !is_placeholder(name) {
            self.cache
                .set_negative(name, AliasKind::Name, CacheStatus::Unresolved, None)?;
        }
        self.stats.bump(&self.stats.misses);
        Ok(ResolutionOutcome::unresolved("sources_exhausted"))
    }

    fn record_rate_limited(&self, ticker: Option<&str>, name: &str) -> Result<(), CoreError> {
        self.stats.bump(&self.stats.rate_limited);
        if let Some(t) = ticker {
            self.cache
                .set_negative(t, AliasKind::Ticker, CacheStatus::RateLimited, None)?;
        }
        if !is_placeholder(name) {
            self.cache
                .set_negative(name, AliasKind::Name, CacheStatus::RateLimited, None)?;
        }
        Ok(())
    }

    async fn contribute_listing(
        &self,
        ticker: Option<&str>,
        name: &str,
        identifier: &Identifier,
        source: &str,
    ) {
        if !self.options.contribute_enabled {
            return;
        }
        let (Some(store), Some(t)) = (self.community.as_ref(), ticker) else {
            return;
        };
        if let Err(error) = store.contribute_listing(t, name, identifier, source).await {
            debug!(ticker = t, %error, "community contribution failed");
        }
    }
}

fn alias_pairs<'a>(
    tickers: &'a [String],
    names: &'a [String],
) -> impl Iterator<Item = (&'a str, AliasKind)> {
    tickers
        .iter()
        .map(|t| (t.as_str(), AliasKind::Ticker))
        .chain(names.iter().map(|n| (n.as_str(), AliasKind::Name)))
}
