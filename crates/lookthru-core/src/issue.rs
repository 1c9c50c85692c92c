use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

/// Pipeline phase where an issue was detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    DataLoading,
    Decomposition,
    Enrichment,
    Aggregation,
    Reporting,
}

impl Phase {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::DataLoading => "DATA_LOADING",
            Self::Decomposition => "DECOMPOSITION",
            Self::Enrichment => "ENRICHMENT",
            Self::Aggregation => "AGGREGATION",
            Self::Reporting => "REPORTING",
        }
    }
}

impl Display for Phase {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure classification for per-item pipeline errors.
///
/// `CacheMiss` is expected-path bookkeeping, not an error signal.
/// `RateLimited` is split out from `ApiFailure` because it drives a
/// shorter negative-cache TTL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureKind {
    NoAdapter,
    ApiFailure,
    CacheMiss,
    ValidationFailed,
    FileNotFound,
    ParseError,
    RateLimited,
    Unknown,
}

impl FailureKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NoAdapter => "NO_ADAPTER",
            Self::ApiFailure => "API_FAILURE",
            Self::CacheMiss => "CACHE_MISS",
            Self::ValidationFailed => "VALIDATION_FAILED",
            Self::FileNotFound => "FILE_NOT_FOUND",
            Self::ParseError => "PARSE_ERROR",
            Self::RateLimited => "RATE_LIMITED",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl Display for FailureKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A structured per-item failure, caught at the smallest scope and
/// carried through to the run report instead of aborting the run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineIssue {
    pub phase: Phase,
    pub kind: FailureKind,
    /// Identifier or input name the failure relates to.
    pub item: String,
    pub message: String,
    pub fix_hint: Option<String>,
}

impl PipelineIssue {
    pub fn new(
        phase: Phase,
        kind: FailureKind,
        item: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            phase,
            kind,
            item: item.into(),
            message: message.into(),
            fix_hint: None,
        }
    }

    pub fn with_fix_hint(mut self, fix_hint: impl Into<String>) -> Self {
        self.fix_hint = Some(fix_hint.into());
        self
    }
}

impl Display for PipelineIssue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}/{}] {}: {}",
            self.phase, self.kind, self.item, self.message
        )
    }
}
