//! Typed view over the persistent resolution cache.
//!
//! Positive entries (status resolved) never expire; negative entries
//! always carry a status-dependent TTL so throttled services are not
//! hammered and unreachable items are not blacklisted forever.

use lookthru_warehouse::{format_rfc3339, AliasRecord, Warehouse};
use time::{Duration, OffsetDateTime};
use tracing::warn;

use crate::domain::{is_placeholder, Identifier};
use crate::error::{CoreError, ValidationError};

/// Kind of alias a cache entry is keyed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AliasKind {
    Ticker,
    Name,
}

impl AliasKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ticker => "ticker",
            Self::Name => "name",
        }
    }
}

/// Resolution status of a cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheStatus {
    Resolved,
    Unresolved,
    RateLimited,
}

impl CacheStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Resolved => "resolved",
            Self::Unresolved => "unresolved",
            Self::RateLimited => "rate_limited",
        }
    }

    pub fn parse(value: &str) -> Result<Self, ValidationError> {
        match value {
            "resolved" => Ok(Self::Resolved),
            "unresolved" => Ok(Self::Unresolved),
            "rate_limited" => Ok(Self::RateLimited),
            other => Err(ValidationError::UnknownStatus {
                value: other.to_string(),
            }),
        }
    }

    pub const fn is_negative(self) -> bool {
        !matches!(self, Self::Resolved)
    }
}

/// One typed cache entry.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub identifier: Option<Identifier>,
    pub status: CacheStatus,
    pub confidence: f64,
    pub source: Option<String>,
}

/// Typed facade over the `isin_cache` table.
#[derive(Clone)]
pub struct ResolutionCache {
    warehouse: Warehouse,
    unresolved_ttl_hours: i64,
    rate_limited_ttl_hours: i64,
}

impl ResolutionCache {
    pub fn new(
        warehouse: Warehouse,
        unresolved_ttl_hours: i64,
        rate_limited_ttl_hours: i64,
    ) -> Self {
        Self {
            warehouse,
            unresolved_ttl_hours,
            rate_limited_ttl_hours,
        }
    }

    /// Look up an entry; expired rows are deleted lazily by the
    /// warehouse and reported as a miss. Rows whose stored identifier
    /// no longer validates are dropped and treated as a miss too.
    pub fn get(&self, alias: &str, kind: AliasKind) -> Result<Option<CacheEntry>, CoreError> {
        let alias = normalize_alias(alias);
        let Some(record) = self.warehouse.lookup_alias(&alias, kind.as_str())? else {
            return Ok(None);
        };

        let status = CacheStatus::parse(&record.resolution_status)?;
        let identifier = match record.isin.as_deref() {
            Some(stored) => match Identifier::parse(stored) {
                Ok(identifier) => Some(identifier),
                Err(error) => {
                    warn!(alias, stored, %error, "dropping cache entry with invalid identifier");
                    return Ok(None);
                }
            },
            None => None,
        };

        Ok(Some(CacheEntry {
            identifier,
            status,
            confidence: record.confidence,
            source: record.source,
        }))
    }

    /// Upsert an entry. `ttl_hours` must be `None` exactly when the
    /// status is resolved.
    pub fn set(
        &self,
        alias: &str,
        kind: AliasKind,
        identifier: Option<&Identifier>,
        status: CacheStatus,
        confidence: f64,
        source: Option<&str>,
        ttl_hours: Option<i64>,
    ) -> Result<(), CoreError> {
        if status.is_negative() && ttl_hours.is_none() {
            return Err(ValidationError::MissingTtl {
                status: status.as_str().to_string(),
            }
            .into());
        }
        if !(0.0..=1.0).contains(&confidence) {
            return Err(ValidationError::ConfidenceOutOfRange { value: confidence }.into());
        }

        let alias = normalize_alias(alias);
        if is_placeholder(&alias) {
            // Sentinels never reach the cache.
            return Ok(());
        }

        let expires_at = match ttl_hours {
            Some(hours) => Some(format_rfc3339(
                OffsetDateTime::now_utc() + Duration::hours(hours),
            )?),
            None => None,
        };

        self.warehouse.record_alias(&AliasRecord {
            alias,
            alias_type: kind.as_str().to_string(),
            isin: identifier.map(|i| i.as_str().to_string()),
            resolution_status: status.as_str().to_string(),
            confidence,
            source: source.map(str::to_string),
            expires_at,
        })?;
        Ok(())
    }

    /// Record a permanent positive entry.
    pub fn set_positive(
        &self,
        alias: &str,
        kind: AliasKind,
        identifier: &Identifier,
        confidence: f64,
        source: &str,
    ) -> Result<(), CoreError> {
        self.set(
            alias,
            kind,
            Some(identifier),
            CacheStatus::Resolved,
            confidence,
            Some(source),
            None,
        )
    }

    /// Record a negative entry with the TTL implied by the status.
    pub fn set_negative(
        &self,
        alias: &str,
        kind: AliasKind,
        status: CacheStatus,
        source: Option<&str>,
    ) -> Result<(), CoreError> {
        let ttl_hours = match status {
            CacheStatus::RateLimited => self.rate_limited_ttl_hours,
            _ => self.unresolved_ttl_hours,
        };
        self.set(
            alias,
            kind,
            None,
            if status.is_negative() {
                status
            } else {
                CacheStatus::Unresolved
            },
            0.0,
            source,
            Some(ttl_hours),
        )
    }

    /// Whether an unexpired negative entry exists for the alias.
    pub fn is_negative_cached(&self, alias: &str, kind: AliasKind) -> Result<bool, CoreError> {
        Ok(self
            .get(alias, kind)?
            .is_some_and(|entry| entry.status.is_negative()))
    }

    /// Bulk-delete expired entries; returns the number removed. Run
    /// periodically rather than per-lookup.
    pub fn cleanup_expired(&self) -> Result<usize, CoreError> {
        Ok(self.warehouse.purge_expired()?)
    }
}

fn normalize_alias(alias: &str) -> String {
    alias.trim().to_uppercase()
}
