//! Identifier resolution: persistent cache, cascade resolver and
//! external lookup sources.

pub mod cache;
pub mod resolver;
pub mod sources;

pub use cache::{AliasKind, CacheEntry, CacheStatus, ResolutionCache};
pub use resolver::{
    ResolutionOutcome, ResolutionStats, ResolutionStatsSnapshot, Resolver, ResolverOptions,
    SourceSlot, CONFIDENCE_COMMUNITY, CONFIDENCE_LOCAL_CACHE, CONFIDENCE_PROVIDER,
};
pub use sources::{
    FinnhubSource, LookupError, LookupErrorKind, LookupFuture, LookupQuery, LookupSource,
    WikidataSource,
};
