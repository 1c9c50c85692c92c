//! Run-scoped domain records: positions, holdings, decompositions and
//! aggregated exposures. These live only for the duration of one
//! portfolio run; persistent state is limited to the resolution and
//! holdings caches.

use serde::{Deserialize, Serialize};

use crate::domain::identifier::{Identifier, SecurityKey};
use crate::error::ValidationError;

/// Upper bound on a single holding's weight. Above 100 tolerates
/// leveraged and derivative overlay positions.
pub const MAX_WEIGHT_PERCENTAGE: f64 = 150.0;

/// Asset classification for a position or exposure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AssetClass {
    Equity,
    Etf,
    Fund,
    Bond,
    Commodity,
    Cash,
    Crypto,
    #[default]
    Unknown,
}

impl AssetClass {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Equity => "equity",
            Self::Etf => "etf",
            Self::Fund => "fund",
            Self::Bond => "bond",
            Self::Commodity => "commodity",
            Self::Cash => "cash",
            Self::Crypto => "crypto",
            Self::Unknown => "unknown",
        }
    }
}

/// Outcome classification for one identifier resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolutionStatus {
    Resolved,
    Unresolved,
    /// Resolution deliberately not attempted (minor holding below the
    /// API weight threshold).
    Skipped,
}

impl ResolutionStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Resolved => "resolved",
            Self::Unresolved => "unresolved",
            Self::Skipped => "skipped",
        }
    }

    pub const fn is_resolved(self) -> bool {
        matches!(self, Self::Resolved)
    }
}

/// One fund constituent after schema normalization and resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HoldingRecord {
    pub name: String,
    pub ticker: Option<String>,
    pub weight_percentage: f64,
    pub identifier: Option<Identifier>,
    pub status: ResolutionStatus,
    pub source: Option<String>,
    pub confidence: f64,
}

impl HoldingRecord {
    /// Build a holding record, validating the weight and confidence
    /// bounds.
    pub fn new(
        name: impl Into<String>,
        ticker: Option<String>,
        weight_percentage: f64,
    ) -> Result<Self, ValidationError> {
        if !weight_percentage.is_finite() {
            return Err(ValidationError::NonFiniteValue {
                field: "weight_percentage",
            });
        }
        if !(0.0..=MAX_WEIGHT_PERCENTAGE).contains(&weight_percentage) {
            return Err(ValidationError::WeightOutOfRange {
                value: weight_percentage,
            });
        }

        Ok(Self {
            name: name.into(),
            ticker,
            weight_percentage,
            identifier: None,
            status: ResolutionStatus::Unresolved,
            source: None,
            confidence: 0.0,
        })
    }

    /// Attach a resolution outcome to this holding.
    pub fn with_resolution(
        mut self,
        identifier: Option<Identifier>,
        status: ResolutionStatus,
        source: Option<String>,
        confidence: f64,
    ) -> Result<Self, ValidationError> {
        if !(0.0..=1.0).contains(&confidence) {
            return Err(ValidationError::ConfidenceOutOfRange { value: confidence });
        }
        self.identifier = identifier;
        self.status = status;
        self.source = source;
        self.confidence = confidence;
        Ok(self)
    }
}

/// A fund position decomposed into its constituent holdings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundDecomposition {
    pub fund: Identifier,
    pub fund_name: String,
    pub fund_value: f64,
    pub holdings: Vec<HoldingRecord>,
}

impl FundDecomposition {
    pub fn new(
        fund: Identifier,
        fund_name: impl Into<String>,
        fund_value: f64,
        holdings: Vec<HoldingRecord>,
    ) -> Self {
        Self {
            fund,
            fund_name: fund_name.into(),
            fund_value,
            holdings,
        }
    }

    #[must_use]
    pub fn weight_sum(&self) -> f64 {
        self.holdings.iter().map(|h| h.weight_percentage).sum()
    }

    #[must_use]
    pub fn holdings_count(&self) -> usize {
        self.holdings.len()
    }

    #[must_use]
    pub fn resolved_count(&self) -> usize {
        self.holdings
            .iter()
            .filter(|h| h.status.is_resolved())
            .count()
    }

    #[must_use]
    pub fn unresolved_count(&self) -> usize {
        self.holdings_count() - self.resolved_count()
    }
}

/// One portfolio line item as loaded from the provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadedPosition {
    pub identifier: Identifier,
    pub name: String,
    pub quantity: f64,
    pub current_price: Option<f64>,
    pub cost_basis: Option<f64>,
    pub asset_class: AssetClass,
    pub currency: String,
}

impl LoadedPosition {
    pub fn new(
        identifier: Identifier,
        name: impl Into<String>,
        quantity: f64,
        current_price: Option<f64>,
        cost_basis: Option<f64>,
        asset_class: AssetClass,
        currency: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        if !quantity.is_finite() {
            return Err(ValidationError::NonFiniteValue { field: "quantity" });
        }
        if quantity < 0.0 {
            return Err(ValidationError::NegativeQuantity { value: quantity });
        }

        Ok(Self {
            identifier,
            name: name.into(),
            quantity,
            current_price,
            cost_basis,
            asset_class,
            currency: currency.into(),
        })
    }

    /// Market value: quantity times current price, falling back to
    /// cost basis, then zero.
    #[must_use]
    pub fn market_value(&self) -> f64 {
        let price = self.current_price.or(self.cost_basis).unwrap_or(0.0);
        self.quantity * price
    }
}

/// Aggregated exposure for one security key across direct holdings and
/// fund look-through.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExposureRecord {
    pub key: SecurityKey,
    pub name: String,
    pub direct_value: f64,
    pub indirect_value: f64,
    pub portfolio_percentage: f64,
    pub status: ResolutionStatus,
    pub sector: String,
    pub geography: String,
    pub asset_class: AssetClass,
}

impl ExposureRecord {
    #[must_use]
    pub fn total(&self) -> f64 {
        self.direct_value + self.indirect_value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn apple() -> Identifier {
        Identifier::parse("US0378331005").expect("valid identifier")
    }

    #[test]
    fn market_value_prefers_current_price() {
        let position = LoadedPosition::new(
            apple(),
            "Apple Inc",
            10.0,
            Some(150.0),
            Some(120.0),
            AssetClass::Equity,
            "USD",
        )
        .expect("valid position");
        assert_eq!(position.market_value(), 1500.0);
    }

    #[test]
    fn market_value_falls_back_to_cost_basis_then_zero() {
        let with_basis = LoadedPosition::new(
            apple(),
            "Apple Inc",
            10.0,
            None,
            Some(120.0),
            AssetClass::Equity,
            "USD",
        )
        .expect("valid position");
        assert_eq!(with_basis.market_value(), 1200.0);

        let bare =
            LoadedPosition::new(apple(), "Apple Inc", 10.0, None, None, AssetClass::Equity, "USD")
                .expect("valid position");
        assert_eq!(bare.market_value(), 0.0);
    }

    #[test]
    fn holding_weight_bounds_are_enforced() {
        assert!(HoldingRecord::new("X", None, 150.0).is_ok());
        assert!(matches!(
            HoldingRecord::new("X", None, 150.1),
            Err(ValidationError::WeightOutOfRange { .. })
        ));
        assert!(matches!(
            HoldingRecord::new("X", None, -0.5),
            Err(ValidationError::WeightOutOfRange { .. })
        ));
    }

    #[test]
    fn decomposition_counts_resolved_holdings() {
        let resolved = HoldingRecord::new("Apple Inc", Some("AAPL".into()), 60.0)
            .expect("holding")
            .with_resolution(Some(apple()), ResolutionStatus::Resolved, Some("provider".into()), 1.0)
            .expect("resolution");
        let unresolved = HoldingRecord::new("Mystery Corp", None, 40.0).expect("holding");

        let decomposition = FundDecomposition::new(
            Identifier::parse("IE00B4L5Y983").expect("valid identifier"),
            "iShares Core MSCI World",
            2200.0,
            vec![resolved, unresolved],
        );

        assert_eq!(decomposition.weight_sum(), 100.0);
        assert_eq!(decomposition.holdings_count(), 2);
        assert_eq!(decomposition.resolved_count(), 1);
        assert_eq!(decomposition.unresolved_count(), 1);
    }
}
