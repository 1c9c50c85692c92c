//! Per-run configuration.

use time::Duration;

/// Bounds for the outbound worker pool. The bound reflects third-party
/// rate limits, not a tunable optimization.
pub const MIN_CONCURRENCY: usize = 2;
pub const MAX_CONCURRENCY: usize = 5;

/// Configuration for one portfolio run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    /// Concurrent outbound operations, clamped to `[2, 5]`.
    pub concurrency: usize,
    /// Relative tolerance for the value-conservation check. The 2%
    /// default is a heuristic for NAV timing lag and cash drag.
    pub conservation_tolerance: f64,
    /// Freshness window for locally cached fund holdings.
    pub holdings_max_age: Duration,
    /// Negative-cache TTL after a definitive not-found.
    pub unresolved_ttl_hours: i64,
    /// Negative-cache TTL after a quota/rate-limit response.
    pub rate_limited_ttl_hours: i64,
    /// Holdings at or below this weight skip external API resolution.
    pub api_weight_threshold: f64,
    /// Upper bound on ticker/name variants sent to one lookup source.
    pub max_lookup_variants: usize,
    /// Whether successful fetches are pushed back to the community
    /// store.
    pub contribute_enabled: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            concurrency: 3,
            conservation_tolerance: 0.02,
            holdings_max_age: Duration::hours(24),
            unresolved_ttl_hours: 24,
            rate_limited_ttl_hours: 1,
            api_weight_threshold: 1.0,
            max_lookup_variants: 5,
            contribute_enabled: true,
        }
    }
}

impl RunConfig {
    /// Worker pool size clamped to the allowed band.
    #[must_use]
    pub fn effective_concurrency(&self) -> usize {
        self.concurrency.clamp(MIN_CONCURRENCY, MAX_CONCURRENCY)
    }
}
