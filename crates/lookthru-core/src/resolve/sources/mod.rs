//! External lookup source contract and reference implementations.

pub mod finnhub;
pub mod wikidata;

use std::fmt::{Display, Formatter};
use std::future::Future;
use std::pin::Pin;

use crate::domain::Identifier;

pub use finnhub::FinnhubSource;
pub use wikidata::WikidataSource;

/// Failure classification for one lookup call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupErrorKind {
    /// Quota or rate-limit response; drives the short negative TTL.
    RateLimited,
    /// Transport failure or non-success status.
    Unavailable,
    /// Response arrived but could not be interpreted.
    InvalidResponse,
    /// Source is missing required configuration (e.g. API key).
    NotConfigured,
}

/// Error from an external lookup source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupError {
    kind: LookupErrorKind,
    message: String,
    retryable: bool,
}

impl LookupError {
    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self {
            kind: LookupErrorKind::RateLimited,
            message: message.into(),
            retryable: true,
        }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self {
            kind: LookupErrorKind::Unavailable,
            message: message.into(),
            retryable: true,
        }
    }

    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self {
            kind: LookupErrorKind::InvalidResponse,
            message: message.into(),
            retryable: false,
        }
    }

    pub fn not_configured(message: impl Into<String>) -> Self {
        Self {
            kind: LookupErrorKind::NotConfigured,
            message: message.into(),
            retryable: false,
        }
    }

    pub const fn kind(&self) -> LookupErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn retryable(&self) -> bool {
        self.retryable
    }

    pub const fn code(&self) -> &'static str {
        match self.kind {
            LookupErrorKind::RateLimited => "lookup.rate_limited",
            LookupErrorKind::Unavailable => "lookup.unavailable",
            LookupErrorKind::InvalidResponse => "lookup.invalid_response",
            LookupErrorKind::NotConfigured => "lookup.not_configured",
        }
    }
}

impl Display for LookupError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code())
    }
}

impl std::error::Error for LookupError {}

/// Bounded variant lists passed to one lookup call.
#[derive(Debug, Clone, Copy)]
pub struct LookupQuery<'a> {
    pub ticker_variants: &'a [String],
    pub name_variants: &'a [String],
}

pub type LookupFuture<'a> =
    Pin<Box<dyn Future<Output = Result<Option<Identifier>, LookupError>> + Send + 'a>>;

/// One external metadata API capable of mapping a loose reference to a
/// canonical identifier.
pub trait LookupSource: Send + Sync {
    /// Stable source key used for cache provenance and stats.
    fn name(&self) -> &'static str;

    /// Confidence recorded for positive entries from this source.
    fn confidence(&self) -> f64;

    /// Try to resolve to an identifier. `Ok(None)` is a definitive
    /// not-found; errors classify transport and quota failures.
    fn lookup<'a>(&'a self, query: LookupQuery<'a>) -> LookupFuture<'a>;
}
