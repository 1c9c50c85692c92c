//! Tiered fund holdings retrieval.
//!
//! Cheapest tier first: local warehouse cache, community store, then a
//! provider scraper adapter. Community failures degrade to the next
//! tier; only exhaustion of all tiers is an error. Fresh data fetched
//! from a non-local tier is persisted locally and, when enabled,
//! contributed back to the community store.

pub mod registry;

use std::sync::Arc;

use lookthru_warehouse::{Warehouse, WarehouseError};
use thiserror::Error;
use time::Duration;
use tracing::{debug, info, warn};

use crate::domain::Identifier;
use crate::external::CommunityStore;
use crate::schema::{normalize_table, RawHolding};

pub use registry::AdapterRegistry;

/// Where a holdings table came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HoldingsSource {
    LocalCache,
    Community,
    Scraper,
}

impl HoldingsSource {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::LocalCache => "local_cache",
            Self::Community => "community",
            Self::Scraper => "scraper",
        }
    }
}

/// A fund's constituent rows, pre-validation, with provenance.
#[derive(Debug, Clone, PartialEq)]
pub struct HoldingsTable {
    pub rows: Vec<RawHolding>,
    pub source: HoldingsSource,
}

#[derive(Debug, Error)]
pub enum HoldingsError {
    /// Every tier came up empty; the caller must supply data manually.
    #[error("no holdings data available for {identifier}{}", provider_note(.provider))]
    ManualUploadRequired {
        identifier: String,
        provider: Option<&'static str>,
    },

    #[error(transparent)]
    Warehouse(#[from] WarehouseError),

    #[error("cached holdings payload is corrupt: {0}")]
    Parse(#[from] serde_json::Error),
}

fn provider_note(provider: &Option<&'static str>) -> String {
    match provider {
        Some(provider) => format!(" (assigned provider: {provider})"),
        None => String::from(" (no provider assigned)"),
    }
}

/// Tiered holdings fetcher over the warehouse and external stores.
pub struct HoldingsCache {
    warehouse: Warehouse,
    community: Option<Arc<dyn CommunityStore>>,
    max_age: Duration,
    contribute_enabled: bool,
}

impl HoldingsCache {
    pub fn new(
        warehouse: Warehouse,
        community: Option<Arc<dyn CommunityStore>>,
        max_age: Duration,
        contribute_enabled: bool,
    ) -> Self {
        Self {
            warehouse,
            community,
            max_age,
            contribute_enabled,
        }
    }

    /// Fetch holdings for a fund, walking the tiers cheapest-first.
    ///
    /// `force_refresh` bypasses the local tier so a stale-but-present
    /// cache row cannot mask fresh upstream data.
    pub async fn get_holdings(
        &self,
        fund: &Identifier,
        fund_name: Option<&str>,
        registry: &AdapterRegistry,
        force_refresh: bool,
    ) -> Result<HoldingsTable, HoldingsError> {
        if !force_refresh {
            if let Some(table) = self.load_local(fund)? {
                debug!(fund = fund.as_str(), rows = table.rows.len(), "holdings cache hit");
                return Ok(table);
            }
        }

        if let Some(store) = self.community.as_ref() {
            match store.get_holdings(fund).await {
                Ok(Some(rows)) if !rows.is_empty() => {
                    info!(fund = fund.as_str(), rows = rows.len(), "holdings from community");
                    self.persist(fund, fund_name, &rows, HoldingsSource::Community)?;
                    return Ok(HoldingsTable {
                        rows,
                        source: HoldingsSource::Community,
                    });
                }
                Ok(_) => {}
                Err(error) => {
                    warn!(fund = fund.as_str(), %error, "community holdings lookup failed");
                }
            }
        }

        if let Some(adapter) = registry.adapter_for(fund) {
            match adapter.fetch_holdings(fund).await {
                Ok(rows) if !rows.is_empty() => {
                    info!(
                        fund = fund.as_str(),
                        provider = adapter.provider(),
                        rows = rows.len(),
                        "holdings scraped"
                    );
                    self.persist(fund, fund_name, &rows, HoldingsSource::Scraper)?;
                    self.contribute(fund, &rows, adapter.provider()).await;
                    return Ok(HoldingsTable {
                        rows,
                        source: HoldingsSource::Scraper,
                    });
                }
                Ok(_) => {
                    warn!(
                        fund = fund.as_str(),
                        provider = adapter.provider(),
                        "scraper returned no rows"
                    );
                }
                Err(error) => {
                    warn!(
                        fund = fund.as_str(),
                        provider = adapter.provider(),
                        %error,
                        "scraper fetch failed"
                    );
                }
            }
        }

        Err(HoldingsError::ManualUploadRequired {
            identifier: fund.as_str().to_string(),
            provider: registry.provider_hint(fund),
        })
    }

    fn load_local(&self, fund: &Identifier) -> Result<Option<HoldingsTable>, HoldingsError> {
        let Some(row) = self
            .warehouse
            .load_holdings(fund.as_str(), Some(self.max_age))?
        else {
            return Ok(None);
        };

        let rows = match normalize_table(&row.payload) {
            Ok(rows) => rows,
            Err(error) => {
                warn!(fund = fund.as_str(), %error, "ignoring corrupt cached holdings payload");
                return Ok(None);
            }
        };
        if rows.is_empty() {
            return Ok(None);
        }

        Ok(Some(HoldingsTable {
            rows,
            source: HoldingsSource::LocalCache,
        }))
    }

    fn persist(
        &self,
        fund: &Identifier,
        fund_name: Option<&str>,
        rows: &[RawHolding],
        source: HoldingsSource,
    ) -> Result<(), HoldingsError> {
        let payload = serde_json::to_string(rows)?;
        self.warehouse
            .store_holdings(fund.as_str(), fund_name, &payload, source.as_str())?;
        Ok(())
    }

    async fn contribute(&self, fund: &Identifier, rows: &[RawHolding], provider: &str) {
        if !self.contribute_enabled {
            return;
        }
        let Some(store) = self.community.as_ref() else {
            return;
        };
        if let Err(error) = store.contribute_holdings(fund, rows, provider).await {
            debug!(fund = fund.as_str(), %error, "community contribution failed");
        }
    }
}
