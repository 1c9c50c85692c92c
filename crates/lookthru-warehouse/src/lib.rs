//! # Lookthru Warehouse
//!
//! DuckDB-based persistence for the look-through engine.
//!
//! Two tables are managed here:
//!
//! | Table | Description |
//! |-------|-------------|
//! | `isin_cache` | Alias-to-identifier resolution cache with negative-entry TTLs |
//! | `fund_holdings` | Cached fund holdings payloads with freshness timestamps |
//!
//! Both tables store timestamps as RFC 3339 TEXT in UTC. Expiry and
//! freshness are evaluated in Rust after parsing, never by string
//! comparison, so mixed fractional-second precision cannot skew results.
//!
//! All user-provided values go through parameterized queries.

pub mod duckdb;
pub mod migrations;

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use ::duckdb::ToSql;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::format_description::well_known::Rfc3339;
use time::{Duration, OffsetDateTime};
use tracing::debug;

pub use duckdb::{AccessMode, DuckDbPool, PooledConnection};

/// Errors that can occur during warehouse operations.
#[derive(Debug, Error)]
pub enum WarehouseError {
    /// `DuckDB` database error.
    #[error(transparent)]
    DuckDb(#[from] ::duckdb::Error),

    /// I/O error (file system operations).
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// A stored timestamp could not be parsed as RFC 3339.
    #[error("invalid stored timestamp '{value}': {source}")]
    InvalidTimestamp {
        value: String,
        #[source]
        source: time::error::Parse,
    },

    /// A timestamp could not be formatted as RFC 3339.
    #[error(transparent)]
    TimestampFormat(#[from] time::error::Format),
}

/// Configuration for the warehouse database.
#[derive(Debug, Clone)]
pub struct WarehouseConfig {
    /// Root directory for lookthru data.
    pub lookthru_home: PathBuf,
    /// Path to the `DuckDB` database file.
    pub db_path: PathBuf,
    /// Maximum number of idle connections kept per access mode.
    pub max_pool_size: usize,
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        let lookthru_home = resolve_lookthru_home();
        let db_path = lookthru_home.join("cache").join("lookthru.duckdb");
        Self {
            lookthru_home,
            db_path,
            max_pool_size: 4,
        }
    }
}

fn resolve_lookthru_home() -> PathBuf {
    if let Ok(home) = env::var("LOOKTHRU_HOME") {
        if !home.trim().is_empty() {
            return PathBuf::from(home);
        }
    }
    if let Ok(home) = env::var("HOME") {
        if !home.trim().is_empty() {
            return PathBuf::from(home).join(".lookthru");
        }
    }
    PathBuf::from(".lookthru")
}

/// A row in the `isin_cache` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AliasRecord {
    /// Normalized alias text (uppercased ticker or normalized name).
    pub alias: String,
    /// Kind of alias: `"ticker"` or `"name"`.
    pub alias_type: String,
    /// Resolved identifier, if any.
    pub isin: Option<String>,
    /// `"resolved"`, `"unresolved"` or `"rate_limited"`.
    pub resolution_status: String,
    /// Resolution confidence in `[0, 1]`.
    pub confidence: f64,
    /// Which source produced this entry.
    pub source: Option<String>,
    /// RFC 3339 expiry for negative entries; `None` means never expires.
    pub expires_at: Option<String>,
}

/// A row in the `fund_holdings` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HoldingsRow {
    /// Fund identifier.
    pub isin: String,
    /// Fund display name, if known at caching time.
    pub fund_name: Option<String>,
    /// Raw holdings payload as a JSON array of row objects.
    pub payload: String,
    /// Which tier produced the payload (e.g. `"community"`, `"scraper"`).
    pub source: String,
    /// RFC 3339 timestamp of when the payload was cached.
    pub cached_at: String,
}

/// The warehouse interface for resolution and holdings caches.
#[derive(Clone)]
pub struct Warehouse {
    pool: DuckDbPool,
}

impl Warehouse {
    /// Open a warehouse with default configuration.
    pub fn open_default() -> Result<Self, WarehouseError> {
        Self::open(WarehouseConfig::default())
    }

    /// Open a warehouse at the configured path, creating parent
    /// directories and applying migrations.
    pub fn open(config: WarehouseConfig) -> Result<Self, WarehouseError> {
        if let Some(parent) = config.db_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let pool = DuckDbPool::new(config.db_path.clone(), config.max_pool_size);
        let warehouse = Self { pool };
        warehouse.initialize()?;
        Ok(warehouse)
    }

    /// Apply any pending schema migrations.
    pub fn initialize(&self) -> Result<(), WarehouseError> {
        let connection = self.pool.acquire(AccessMode::ReadWrite)?;
        migrations::apply_migrations(&connection)?;
        Ok(())
    }

    /// Path of the backing database file.
    #[must_use]
    pub fn db_path(&self) -> &Path {
        self.pool.db_path()
    }

    /// Look up a cache entry by `(alias, alias_type)`.
    ///
    /// Expired entries are deleted on read and reported as a miss.
    pub fn lookup_alias(
        &self,
        alias: &str,
        alias_type: &str,
    ) -> Result<Option<AliasRecord>, WarehouseError> {
        let connection = self.pool.acquire(AccessMode::ReadWrite)?;
        let row = optional_row(connection.query_row(
            "SELECT alias, alias_type, isin, resolution_status, confidence, source, expires_at \
             FROM isin_cache WHERE alias = ? AND alias_type = ?",
            [alias, alias_type],
            |row| {
                Ok(AliasRecord {
                    alias: row.get(0)?,
                    alias_type: row.get(1)?,
                    isin: row.get(2)?,
                    resolution_status: row.get(3)?,
                    confidence: row.get(4)?,
                    source: row.get(5)?,
                    expires_at: row.get(6)?,
                })
            },
        ))?;

        let Some(record) = row else {
            return Ok(None);
        };

        if let Some(expires_at) = record.expires_at.as_deref() {
            if parse_rfc3339(expires_at)? <= OffsetDateTime::now_utc() {
                debug!(alias, alias_type, "cache entry expired, deleting");
                connection.execute(
                    "DELETE FROM isin_cache WHERE alias = ? AND alias_type = ?",
                    [alias, alias_type],
                )?;
                return Ok(None);
            }
        }

        Ok(Some(record))
    }

    /// Insert or replace a cache entry, stamping `updated_at` with now.
    pub fn record_alias(&self, record: &AliasRecord) -> Result<(), WarehouseError> {
        let updated_at = format_rfc3339(OffsetDateTime::now_utc())?;
        let connection = self.pool.acquire(AccessMode::ReadWrite)?;
        let params: [&dyn ToSql; 8] = [
            &record.alias,
            &record.alias_type,
            &record.isin,
            &record.resolution_status,
            &record.confidence,
            &record.source,
            &record.expires_at,
            &updated_at,
        ];
        connection.execute(
            "INSERT OR REPLACE INTO isin_cache \
             (alias, alias_type, isin, resolution_status, confidence, source, expires_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            params.as_slice(),
        )?;
        Ok(())
    }

    /// Delete every expired entry, returning how many were removed.
    pub fn purge_expired(&self) -> Result<usize, WarehouseError> {
        let connection = self.pool.acquire(AccessMode::ReadWrite)?;
        let mut statement = connection.prepare(
            "SELECT alias, alias_type, expires_at FROM isin_cache WHERE expires_at IS NOT NULL",
        )?;
        let candidates = statement
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        drop(statement);

        let now = OffsetDateTime::now_utc();
        let mut purged = 0;
        for (alias, alias_type, expires_at) in candidates {
            if parse_rfc3339(&expires_at)? <= now {
                purged += connection.execute(
                    "DELETE FROM isin_cache WHERE alias = ? AND alias_type = ?",
                    [alias.as_str(), alias_type.as_str()],
                )?;
            }
        }

        if purged > 0 {
            debug!(purged, "purged expired cache entries");
        }
        Ok(purged)
    }

    /// Load cached holdings for `isin`.
    ///
    /// When `max_age` is given, rows with `cached_at` older than
    /// `now - max_age` are reported as a miss (but not deleted, so a
    /// stale payload can still be recovered by a caller that passes
    /// `None`).
    pub fn load_holdings(
        &self,
        isin: &str,
        max_age: Option<Duration>,
    ) -> Result<Option<HoldingsRow>, WarehouseError> {
        let connection = self.pool.acquire(AccessMode::ReadOnly)?;
        let row = optional_row(connection.query_row(
            "SELECT isin, fund_name, payload, source, cached_at \
             FROM fund_holdings WHERE isin = ?",
            [isin],
            |row| {
                Ok(HoldingsRow {
                    isin: row.get(0)?,
                    fund_name: row.get(1)?,
                    payload: row.get(2)?,
                    source: row.get(3)?,
                    cached_at: row.get(4)?,
                })
            },
        ))?;

        let Some(record) = row else {
            return Ok(None);
        };

        if let Some(max_age) = max_age {
            let cached_at = parse_rfc3339(&record.cached_at)?;
            if cached_at <= OffsetDateTime::now_utc() - max_age {
                debug!(isin, cached_at = %record.cached_at, "cached holdings stale");
                return Ok(None);
            }
        }

        Ok(Some(record))
    }

    /// Insert or replace cached holdings, stamping `cached_at` with now.
    pub fn store_holdings(
        &self,
        isin: &str,
        fund_name: Option<&str>,
        payload: &str,
        source: &str,
    ) -> Result<(), WarehouseError> {
        let cached_at = format_rfc3339(OffsetDateTime::now_utc())?;
        let connection = self.pool.acquire(AccessMode::ReadWrite)?;
        let params: [&dyn ToSql; 5] = [&isin, &fund_name, &payload, &source, &cached_at];
        connection.execute(
            "INSERT OR REPLACE INTO fund_holdings \
             (isin, fund_name, payload, source, cached_at) \
             VALUES (?, ?, ?, ?, ?)",
            params.as_slice(),
        )?;
        Ok(())
    }
}

/// Format a timestamp as RFC 3339 for storage.
pub fn format_rfc3339(instant: OffsetDateTime) -> Result<String, WarehouseError> {
    Ok(instant.format(&Rfc3339)?)
}

/// Parse a stored RFC 3339 timestamp.
pub fn parse_rfc3339(value: &str) -> Result<OffsetDateTime, WarehouseError> {
    OffsetDateTime::parse(value, &Rfc3339).map_err(|source| WarehouseError::InvalidTimestamp {
        value: value.to_string(),
        source,
    })
}

fn optional_row<T>(result: Result<T, ::duckdb::Error>) -> Result<Option<T>, ::duckdb::Error> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(::duckdb::Error::QueryReturnedNoRows) => Ok(None),
        Err(error) => Err(error),
    }
}
