//! Contracts for external collaborators.
//!
//! Scraper adapters, the community store, the metadata service and the
//! progress sink are consumed through these traits; their
//! implementations live outside this crate. Community-store failures
//! are always swallowed by the core: callers log them and move on.

use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};

use crate::domain::{AssetClass, Identifier};
use crate::schema::RawHolding;

/// Boxed future used by the collaborator traits.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Failure from an external collaborator call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalError {
    message: String,
    retryable: bool,
}

impl ExternalError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retryable: true,
        }
    }

    pub fn non_retryable(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retryable: false,
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn retryable(&self) -> bool {
        self.retryable
    }
}

impl Display for ExternalError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ExternalError {}

/// Sector/geography/asset-class metadata for one identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityMetadata {
    pub sector: String,
    pub geography: String,
    pub asset_class: AssetClass,
    pub name: Option<String>,
}

impl Default for SecurityMetadata {
    fn default() -> Self {
        Self {
            sector: String::from("Unknown"),
            geography: String::from("Unknown"),
            asset_class: AssetClass::Unknown,
            name: None,
        }
    }
}

/// Provider-specific holdings scraper. Empty results and errors both
/// signal "no data", never partial garbage.
pub trait ScraperAdapter: Send + Sync {
    /// Stable provider key, e.g. `"ishares"`.
    fn provider(&self) -> &'static str;

    fn fetch_holdings<'a>(
        &'a self,
        identifier: &'a Identifier,
    ) -> BoxFuture<'a, Result<Vec<RawHolding>, ExternalError>>;
}

/// Community knowledge store for ticker listings and fund holdings.
pub trait CommunityStore: Send + Sync {
    fn lookup_ticker<'a>(
        &'a self,
        ticker: &'a str,
    ) -> BoxFuture<'a, Result<Option<String>, ExternalError>>;

    fn get_holdings<'a>(
        &'a self,
        identifier: &'a Identifier,
    ) -> BoxFuture<'a, Result<Option<Vec<RawHolding>>, ExternalError>>;

    fn contribute_listing<'a>(
        &'a self,
        ticker: &'a str,
        name: &'a str,
        identifier: &'a Identifier,
        source: &'a str,
    ) -> BoxFuture<'a, Result<bool, ExternalError>>;

    fn contribute_holdings<'a>(
        &'a self,
        identifier: &'a Identifier,
        rows: &'a [RawHolding],
        source: &'a str,
    ) -> BoxFuture<'a, Result<bool, ExternalError>>;
}

/// Batched sector/geography/asset-class lookup. Partial results are
/// acceptable; missing identifiers stay "Unknown".
pub trait MetadataService: Send + Sync {
    fn get_metadata_batch<'a>(
        &'a self,
        identifiers: &'a [Identifier],
    ) -> BoxFuture<'a, Result<BTreeMap<Identifier, SecurityMetadata>, ExternalError>>;
}

/// Progress callback invoked at phase boundaries.
pub trait ProgressSink: Send + Sync {
    fn on_progress(&self, message: &str, fraction_complete: f64);
}

/// Default sink that discards progress events.
#[derive(Debug, Default)]
pub struct NoopProgress;

impl ProgressSink for NoopProgress {
    fn on_progress(&self, _message: &str, _fraction_complete: f64) {}
}
