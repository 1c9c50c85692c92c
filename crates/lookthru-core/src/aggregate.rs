//! Value-conserving exposure aggregation.
//!
//! Pure synchronous arithmetic over already-fetched data. Direct
//! positions contribute at full market value; fund positions
//! contribute `weight/100 * fund_value` per constituent. A fund whose
//! decomposition is missing contributes its whole value as a single
//! opaque exposure, so the portfolio total is conserved no matter how
//! many funds failed upstream.

use std::collections::BTreeMap;

use tracing::debug;

use crate::domain::{
    AssetClass, ExposureRecord, FallbackKey, FundDecomposition, Identifier, LoadedPosition,
    ResolutionStatus, SecurityKey,
};
use crate::external::SecurityMetadata;
use crate::issue::{FailureKind, Phase, PipelineIssue};

/// Aggregated exposures, portfolio total and any malformed-input
/// failure.
#[derive(Debug, Default)]
pub struct AggregationOutcome {
    pub exposures: Vec<ExposureRecord>,
    pub issues: Vec<PipelineIssue>,
    /// Sum of all position market values (direct plus funds).
    pub total_value: f64,
}

#[derive(Debug)]
struct Accumulator {
    name: String,
    direct_value: f64,
    indirect_value: f64,
    status: ResolutionStatus,
    identifier: Option<Identifier>,
}

impl Default for Accumulator {
    fn default() -> Self {
        Self {
            name: String::new(),
            direct_value: 0.0,
            indirect_value: 0.0,
            status: ResolutionStatus::Unresolved,
            identifier: None,
        }
    }
}

/// Aggregate direct positions and fund decompositions into exposures.
///
/// Malformed input (any non-finite value or weight) aborts with a
/// single validation issue and an empty result rather than emitting
/// NaN-poisoned totals.
#[must_use]
pub fn aggregate(
    direct: &[LoadedPosition],
    funds: &[LoadedPosition],
    decompositions: &[FundDecomposition],
    metadata: &BTreeMap<Identifier, SecurityMetadata>,
) -> AggregationOutcome {
    if let Some(problem) = find_malformed(direct, funds, decompositions) {
        return AggregationOutcome {
            exposures: Vec::new(),
            issues: vec![PipelineIssue::new(
                Phase::Aggregation,
                FailureKind::ValidationFailed,
                problem.clone(),
                format!("non-finite value encountered for {problem}; aggregation aborted"),
            )],
            total_value: 0.0,
        };
    }

    let total_value: f64 = direct
        .iter()
        .chain(funds.iter())
        .map(LoadedPosition::market_value)
        .sum();

    let decomposed: BTreeMap<&Identifier, &FundDecomposition> = decompositions
        .iter()
        .map(|decomposition| (&decomposition.fund, decomposition))
        .collect();

    let mut accumulators: BTreeMap<SecurityKey, Accumulator> = BTreeMap::new();

    for position in direct {
        let key = SecurityKey::Resolved(position.identifier.clone());
        let entry = accumulators.entry(key).or_default();
        entry.direct_value += position.market_value();
        entry.status = ResolutionStatus::Resolved;
        entry.identifier = Some(position.identifier.clone());
        if entry.name.is_empty() {
            entry.name = position.name.clone();
        }
    }

    for fund in funds {
        let fund_value = fund.market_value();
        match decomposed.get(&fund.identifier) {
            Some(decomposition) => {
                for holding in &decomposition.holdings {
                    let value = holding.weight_percentage / 100.0 * fund_value;
                    let (key, status, identifier) = match &holding.identifier {
                        Some(identifier) => (
                            SecurityKey::Resolved(identifier.clone()),
                            ResolutionStatus::Resolved,
                            Some(identifier.clone()),
                        ),
                        None => (
                            SecurityKey::Fallback(FallbackKey::derive(
                                holding.ticker.as_deref().unwrap_or(""),
                                &holding.name,
                            )),
                            holding.status,
                            None,
                        ),
                    };
                    let entry = accumulators.entry(key).or_default();
                    entry.indirect_value += value;
                    entry.identifier = identifier;
                    if status == ResolutionStatus::Resolved {
                        entry.status = ResolutionStatus::Resolved;
                    } else if entry.status != ResolutionStatus::Resolved {
                        entry.status = status;
                    }
                    if entry.name.is_empty() {
                        entry.name = holding.name.clone();
                    }
                }
            }
            None => {
                // Undeconstructed fund: carried whole so totals hold.
                debug!(fund = fund.identifier.as_str(), "carrying fund as opaque exposure");
                let key = SecurityKey::Resolved(fund.identifier.clone());
                let entry = accumulators.entry(key).or_default();
                entry.indirect_value += fund_value;
                entry.status = ResolutionStatus::Resolved;
                entry.identifier = Some(fund.identifier.clone());
                if entry.name.is_empty() {
                    entry.name = fund.name.clone();
                }
            }
        }
    }

    let mut exposures: Vec<ExposureRecord> = accumulators
        .into_iter()
        .map(|(key, accumulator)| {
            let enriched = accumulator
                .identifier
                .as_ref()
                .and_then(|identifier| metadata.get(identifier));
            let total = accumulator.direct_value + accumulator.indirect_value;
            let portfolio_percentage = if total_value > 0.0 {
                total / total_value * 100.0
            } else {
                0.0
            };
            ExposureRecord {
                key,
                name: accumulator.name,
                direct_value: accumulator.direct_value,
                indirect_value: accumulator.indirect_value,
                portfolio_percentage,
                status: accumulator.status,
                sector: enriched
                    .map_or_else(|| String::from("Unknown"), |m| m.sector.clone()),
                geography: enriched
                    .map_or_else(|| String::from("Unknown"), |m| m.geography.clone()),
                asset_class: enriched.map_or(AssetClass::Unknown, |m| m.asset_class),
            }
        })
        .collect();

    exposures.sort_by(|a, b| {
        b.total()
            .partial_cmp(&a.total())
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.key.as_str().cmp(b.key.as_str()))
    });

    AggregationOutcome {
        exposures,
        issues: Vec::new(),
        total_value,
    }
}

fn find_malformed(
    direct: &[LoadedPosition],
    funds: &[LoadedPosition],
    decompositions: &[FundDecomposition],
) -> Option<String> {
    for position in direct.iter().chain(funds.iter()) {
        if !position.market_value().is_finite() {
            return Some(position.identifier.as_str().to_string());
        }
    }
    for decomposition in decompositions {
        if !decomposition.fund_value.is_finite() {
            return Some(decomposition.fund.as_str().to_string());
        }
        for holding in &decomposition.holdings {
            if !holding.weight_percentage.is_finite() {
                return Some(decomposition.fund.as_str().to_string());
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::HoldingRecord;

    fn apple() -> Identifier {
        Identifier::parse("US0378331005").expect("valid identifier")
    }

    fn microsoft() -> Identifier {
        Identifier::parse("US5949181045").expect("valid identifier")
    }

    fn world_fund() -> Identifier {
        Identifier::parse("IE00B4L5Y983").expect("valid identifier")
    }

    fn position(identifier: Identifier, name: &str, value: f64) -> LoadedPosition {
        LoadedPosition::new(
            identifier,
            name,
            1.0,
            Some(value),
            None,
            AssetClass::Equity,
            "USD",
        )
        .expect("valid position")
    }

    fn resolved_holding(identifier: Identifier, name: &str, weight: f64) -> HoldingRecord {
        HoldingRecord::new(name, None, weight)
            .expect("holding")
            .with_resolution(
                Some(identifier),
                ResolutionStatus::Resolved,
                Some("provider".into()),
                1.0,
            )
            .expect("resolution")
    }

    #[test]
    fn merges_direct_and_indirect_exposure() {
        let direct = vec![position(apple(), "Apple Inc", 1500.0)];
        let funds = vec![position(world_fund(), "World Fund", 2200.0)];
        let decompositions = vec![FundDecomposition::new(
            world_fund(),
            "World Fund",
            2200.0,
            vec![
                resolved_holding(apple(), "Apple Inc", 60.0),
                resolved_holding(microsoft(), "Microsoft Corp", 40.0),
            ],
        )];

        let outcome = aggregate(&direct, &funds, &decompositions, &BTreeMap::new());
        assert_eq!(outcome.total_value, 3700.0);
        assert!(outcome.issues.is_empty());

        let apple_row = outcome
            .exposures
            .iter()
            .find(|e| e.key.as_str() == apple().as_str())
            .expect("apple exposure");
        assert_eq!(apple_row.direct_value, 1500.0);
        assert_eq!(apple_row.indirect_value, 1320.0);
        assert_eq!(apple_row.total(), 2820.0);

        let calculated: f64 = outcome.exposures.iter().map(ExposureRecord::total).sum();
        assert_eq!(calculated, 3700.0);
    }

    #[test]
    fn unresolved_holdings_key_on_fallback() {
        let funds = vec![position(world_fund(), "World Fund", 1000.0)];
        let holding = HoldingRecord::new("Mystery Corp", Some("MYST".into()), 100.0)
            .expect("holding");
        let decompositions = vec![FundDecomposition::new(
            world_fund(),
            "World Fund",
            1000.0,
            vec![holding],
        )];

        let outcome = aggregate(&[], &funds, &decompositions, &BTreeMap::new());
        assert_eq!(outcome.exposures.len(), 1);
        let exposure = &outcome.exposures[0];
        assert!(!exposure.key.is_resolved());
        assert!(exposure.key.as_str().starts_with("UNRESOLVED:MYST:"));
        assert_eq!(exposure.indirect_value, 1000.0);
        assert_eq!(exposure.status, ResolutionStatus::Unresolved);
    }

    #[test]
    fn undeconstructed_funds_are_carried_whole() {
        let funds = vec![position(world_fund(), "World Fund", 2200.0)];
        let outcome = aggregate(&[], &funds, &[], &BTreeMap::new());

        assert_eq!(outcome.exposures.len(), 1);
        assert_eq!(outcome.exposures[0].indirect_value, 2200.0);
        assert_eq!(outcome.exposures[0].key.as_str(), world_fund().as_str());

        let calculated: f64 = outcome.exposures.iter().map(ExposureRecord::total).sum();
        assert_eq!(calculated, outcome.total_value);
    }

    #[test]
    fn exposures_are_sorted_by_total_descending() {
        let direct = vec![
            position(apple(), "Apple Inc", 100.0),
            position(microsoft(), "Microsoft Corp", 900.0),
        ];
        let outcome = aggregate(&direct, &[], &[], &BTreeMap::new());
        assert_eq!(outcome.exposures[0].key.as_str(), microsoft().as_str());
        assert_eq!(outcome.exposures[1].key.as_str(), apple().as_str());
    }

    #[test]
    fn non_finite_input_aborts_with_one_issue() {
        let mut bad = position(apple(), "Apple Inc", 100.0);
        bad.current_price = Some(f64::INFINITY);

        let outcome = aggregate(&[bad], &[], &[], &BTreeMap::new());
        assert!(outcome.exposures.is_empty());
        assert_eq!(outcome.issues.len(), 1);
        assert_eq!(outcome.issues[0].kind, FailureKind::ValidationFailed);
        assert_eq!(outcome.total_value, 0.0);
    }

    #[test]
    fn metadata_classifies_resolved_exposures() {
        let mut metadata = BTreeMap::new();
        metadata.insert(
            apple(),
            SecurityMetadata {
                sector: "Technology".into(),
                geography: "United States".into(),
                asset_class: AssetClass::Equity,
                name: None,
            },
        );

        let outcome = aggregate(
            &[position(apple(), "Apple Inc", 100.0)],
            &[],
            &[],
            &metadata,
        );
        assert_eq!(outcome.exposures[0].sector, "Technology");
        assert_eq!(outcome.exposures[0].geography, "United States");
        assert_eq!(outcome.exposures[0].asset_class, AssetClass::Equity);
    }
}
