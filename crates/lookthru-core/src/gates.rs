//! Validation gates at phase boundaries.
//!
//! Each gate inspects a phase's output and emits quality issues; none
//! of them ever halts the pipeline. The final aggregation gate also
//! checks value conservation and completeness of direct positions.

use std::collections::BTreeSet;

use crate::domain::{ExposureRecord, FundDecomposition, LoadedPosition, SecurityKey};
use crate::issue::Phase;
use crate::quality::{IssueCategory, Severity, ValidationIssue};

/// Weight-sum band outside which a decomposition is flagged.
const WEIGHT_SUM_BAND: (f64, f64) = (90.0, 110.0);
/// A sum in this range means the weights are decimals, not percents.
const DECIMAL_FORMAT_BAND: (f64, f64) = (0.5, 1.5);
/// Below this the holdings data is treated as corrupted.
const WEIGHT_SUM_CRITICAL: f64 = 50.0;

const RESOLUTION_RATE_TARGET: f64 = 0.80;
const RESOLUTION_RATE_FLOOR: f64 = 0.50;
const COVERAGE_FLOOR: f64 = 0.50;

/// Validate the loaded positions. Empty input is the one condition
/// that makes a run fail outright; the gate still only reports it.
pub fn validate_loaded_positions(
    positions: &[LoadedPosition],
    phase: Phase,
) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    if positions.is_empty() {
        issues.push(ValidationIssue::new(
            Severity::Critical,
            IssueCategory::Schema,
            "NO_POSITIONS",
            "No positions were loaded",
            "Check the portfolio input file and provider export",
            "portfolio",
            phase,
        ));
        return issues;
    }

    let zero_value = positions
        .iter()
        .filter(|p| p.market_value() == 0.0)
        .count();
    if zero_value > 0 {
        issues.push(
            ValidationIssue::new(
                Severity::Medium,
                IssueCategory::Value,
                "ZERO_VALUE_POSITIONS",
                format!("{zero_value} position(s) have zero market value"),
                "Check that positions have valid prices and quantities",
                "portfolio",
                phase,
            )
            .with_actual(zero_value.to_string()),
        );
    }

    let unknown_class = positions
        .iter()
        .filter(|p| p.asset_class == crate::domain::AssetClass::Unknown)
        .count();
    if unknown_class > 0 {
        issues.push(ValidationIssue::new(
            Severity::Low,
            IssueCategory::Schema,
            "UNKNOWN_ASSET_CLASS",
            format!("{unknown_class} position(s) have unknown asset class"),
            "Classify the positions in the source data",
            "portfolio",
            phase,
        ));
    }

    issues
}

/// Validate the holdings weights of one fund decomposition.
pub fn validate_holdings_weights(
    decomposition: &FundDecomposition,
    phase: Phase,
) -> Vec<ValidationIssue> {
    let fund = decomposition.fund.as_str();
    let mut issues = Vec::new();

    if decomposition.holdings.is_empty() {
        issues.push(ValidationIssue::new(
            Severity::High,
            IssueCategory::Schema,
            "NO_HOLDINGS",
            format!("Fund {fund} has no holdings data"),
            "Check the fund data source or add holdings manually",
            fund,
            phase,
        ));
        return issues;
    }

    let weight_sum = decomposition.weight_sum();

    if (DECIMAL_FORMAT_BAND.0..=DECIMAL_FORMAT_BAND.1).contains(&weight_sum) {
        issues.push(
            ValidationIssue::new(
                Severity::Critical,
                IssueCategory::Weight,
                "WEIGHT_DECIMAL_FORMAT",
                format!("Fund {fund} weights appear to be in decimal format (sum: {weight_sum:.2})"),
                "Weights should be percentages (0-100), not decimals (0-1)",
                fund,
                phase,
            )
            .with_expected("sum ~100")
            .with_actual(format!("{weight_sum:.2}")),
        );
    } else if weight_sum < WEIGHT_SUM_CRITICAL {
        issues.push(
            ValidationIssue::new(
                Severity::Critical,
                IssueCategory::Weight,
                "WEIGHT_SUM_VERY_LOW",
                format!("Fund {fund} weight sum is critically low: {weight_sum:.1}%"),
                "Holdings data may be incomplete or corrupted",
                fund,
                phase,
            )
            .with_expected("sum ~100")
            .with_actual(format!("{weight_sum:.1}%")),
        );
    } else if weight_sum < WEIGHT_SUM_BAND.0 {
        issues.push(
            ValidationIssue::new(
                Severity::High,
                IssueCategory::Weight,
                "WEIGHT_SUM_LOW",
                format!("Fund {fund} weight sum is low: {weight_sum:.1}%"),
                "Some holdings may be missing from the data source",
                fund,
                phase,
            )
            .with_expected("sum ~100")
            .with_actual(format!("{weight_sum:.1}%")),
        );
    } else if weight_sum > WEIGHT_SUM_BAND.1 {
        issues.push(
            ValidationIssue::new(
                Severity::High,
                IssueCategory::Weight,
                "WEIGHT_SUM_HIGH",
                format!("Fund {fund} weight sum exceeds 100%: {weight_sum:.1}%"),
                "May be normal for leveraged funds, or indicates duplicate holdings",
                fund,
                phase,
            )
            .with_expected("sum ~100")
            .with_actual(format!("{weight_sum:.1}%")),
        );
    }

    issues
}

/// Validate the identifier resolution rate of one decomposition.
pub fn validate_resolution_rate(
    decomposition: &FundDecomposition,
    phase: Phase,
) -> Vec<ValidationIssue> {
    let total = decomposition.holdings_count();
    if total == 0 {
        return Vec::new();
    }

    let fund = decomposition.fund.as_str();
    let rate = decomposition.resolved_count() as f64 / total as f64;
    let mut issues = Vec::new();

    if rate < RESOLUTION_RATE_FLOOR {
        issues.push(
            ValidationIssue::new(
                Severity::High,
                IssueCategory::Resolution,
                "LOW_RESOLUTION_RATE",
                format!("Fund {fund} has low identifier resolution rate: {:.0}%", rate * 100.0),
                "Consider contributing unresolved tickers to the community store",
                fund,
                phase,
            )
            .with_expected(format!(">= {:.0}%", RESOLUTION_RATE_TARGET * 100.0))
            .with_actual(format!("{:.0}%", rate * 100.0)),
        );
    } else if rate < RESOLUTION_RATE_TARGET {
        issues.push(
            ValidationIssue::new(
                Severity::Medium,
                IssueCategory::Resolution,
                "MODERATE_RESOLUTION_RATE",
                format!("Fund {fund} resolution rate is below target: {:.0}%", rate * 100.0),
                "Some holdings could not be resolved to identifiers",
                fund,
                phase,
            )
            .with_expected(format!(">= {:.0}%", RESOLUTION_RATE_TARGET * 100.0))
            .with_actual(format!("{:.0}%", rate * 100.0)),
        );
    }

    issues
}

/// Validate sector/geography coverage after enrichment.
pub fn validate_enrichment_coverage(
    exposures: &[ExposureRecord],
    phase: Phase,
) -> Vec<ValidationIssue> {
    if exposures.is_empty() {
        return Vec::new();
    }

    let total = exposures.len() as f64;
    let sector_coverage = exposures.iter().filter(|e| e.sector != "Unknown").count() as f64 / total;
    let geography_coverage =
        exposures.iter().filter(|e| e.geography != "Unknown").count() as f64 / total;

    let mut issues = Vec::new();
    if sector_coverage < COVERAGE_FLOOR {
        issues.push(
            ValidationIssue::new(
                Severity::Medium,
                IssueCategory::Enrichment,
                "LOW_SECTOR_COVERAGE",
                format!("Only {:.0}% of exposures have sector metadata", sector_coverage * 100.0),
                "The metadata service could not answer most identifiers",
                "portfolio",
                phase,
            )
            .with_actual(format!("{:.0}%", sector_coverage * 100.0)),
        );
    }
    if geography_coverage < COVERAGE_FLOOR {
        issues.push(
            ValidationIssue::new(
                Severity::Medium,
                IssueCategory::Enrichment,
                "LOW_GEOGRAPHY_COVERAGE",
                format!(
                    "Only {:.0}% of exposures have geography metadata",
                    geography_coverage * 100.0
                ),
                "The metadata service could not answer most identifiers",
                "portfolio",
                phase,
            )
            .with_actual(format!("{:.0}%", geography_coverage * 100.0)),
        );
    }

    issues
}

/// Validate value conservation: the aggregated total must match the
/// expected total within a relative tolerance.
pub fn validate_aggregation_totals(
    calculated_total: f64,
    expected_total: f64,
    tolerance: f64,
    phase: Phase,
) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    if expected_total <= 0.0 {
        issues.push(
            ValidationIssue::new(
                Severity::Critical,
                IssueCategory::Value,
                "ZERO_PORTFOLIO_VALUE",
                "Expected portfolio value is zero or negative",
                "Check that positions have valid prices and quantities",
                "portfolio",
                phase,
            )
            .with_expected("> 0")
            .with_actual(format!("{expected_total:.2}")),
        );
        return issues;
    }

    let difference = (calculated_total - expected_total).abs() / expected_total;

    if difference > 0.10 {
        issues.push(
            ValidationIssue::new(
                Severity::Critical,
                IssueCategory::Value,
                "TOTAL_MISMATCH_LARGE",
                format!("Aggregated total differs from expected by {:.1}%", difference * 100.0),
                "Large discrepancy indicates calculation errors or missing data",
                "portfolio",
                phase,
            )
            .with_expected(format!("{expected_total:.2}"))
            .with_actual(format!("{calculated_total:.2}")),
        );
    } else if difference > tolerance {
        issues.push(
            ValidationIssue::new(
                Severity::High,
                IssueCategory::Value,
                "TOTAL_MISMATCH",
                format!("Aggregated total differs from expected by {:.1}%", difference * 100.0),
                "Minor discrepancy may be due to NAV timing or cash drag",
                "portfolio",
                phase,
            )
            .with_expected(format!("{expected_total:.2}"))
            .with_actual(format!("{calculated_total:.2}")),
        );
    }

    issues
}

/// Validate that portfolio percentages sum to roughly 100.
pub fn validate_percentage_sum(exposures: &[ExposureRecord], phase: Phase) -> Vec<ValidationIssue> {
    if exposures.is_empty() {
        return Vec::new();
    }

    let percentage_sum: f64 = exposures.iter().map(|e| e.portfolio_percentage).sum();
    let mut issues = Vec::new();

    if percentage_sum < 95.0 {
        issues.push(
            ValidationIssue::new(
                Severity::High,
                IssueCategory::Value,
                "PERCENTAGE_SUM_LOW",
                format!("Portfolio percentages sum to only {percentage_sum:.1}%"),
                "Some exposures may be missing from the aggregation",
                "portfolio",
                phase,
            )
            .with_expected("~100%")
            .with_actual(format!("{percentage_sum:.1}%")),
        );
    } else if percentage_sum > 105.0 {
        issues.push(
            ValidationIssue::new(
                Severity::Medium,
                IssueCategory::Value,
                "PERCENTAGE_SUM_HIGH",
                format!("Portfolio percentages sum to {percentage_sum:.1}%"),
                "May indicate overlapping exposures or leveraged positions",
                "portfolio",
                phase,
            )
            .with_expected("~100%")
            .with_actual(format!("{percentage_sum:.1}%")),
        );
    }

    issues
}

/// Validate that every directly-held identifier appears in the output.
pub fn validate_completeness(
    direct_positions: &[LoadedPosition],
    exposures: &[ExposureRecord],
    phase: Phase,
) -> Vec<ValidationIssue> {
    let present: BTreeSet<&str> = exposures
        .iter()
        .filter_map(|e| match &e.key {
            SecurityKey::Resolved(identifier) => Some(identifier.as_str()),
            SecurityKey::Fallback(_) => None,
        })
        .collect();

    direct_positions
        .iter()
        .filter(|position| !present.contains(position.identifier.as_str()))
        .map(|position| {
            ValidationIssue::new(
                Severity::High,
                IssueCategory::Value,
                "MISSING_DIRECT_EXPOSURE",
                format!(
                    "Direct position {} is missing from the aggregated output",
                    position.identifier
                ),
                "Exposure rows must never be silently dropped",
                position.identifier.as_str(),
                phase,
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{HoldingRecord, Identifier};
    use crate::quality::DataQuality;

    fn fund() -> Identifier {
        Identifier::parse("IE00B4L5Y983").expect("valid identifier")
    }

    fn decomposition_with_weights(weights: &[f64]) -> FundDecomposition {
        let holdings = weights
            .iter()
            .enumerate()
            .map(|(index, weight)| {
                HoldingRecord::new(format!("Holding {index}"), None, *weight).expect("holding")
            })
            .collect();
        FundDecomposition::new(fund(), "Test Fund", 1000.0, holdings)
    }

    #[test]
    fn weight_sum_85_yields_exactly_one_high_issue() {
        let decomposition = decomposition_with_weights(&[50.0, 35.0]);
        let issues = validate_holdings_weights(&decomposition, Phase::Decomposition);

        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].severity, Severity::High);
        assert_eq!(issues[0].code, "WEIGHT_SUM_LOW");
    }

    #[test]
    fn decimal_weight_sum_is_critical() {
        let decomposition = decomposition_with_weights(&[0.6, 0.25]);
        let issues = validate_holdings_weights(&decomposition, Phase::Decomposition);

        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].code, "WEIGHT_DECIMAL_FORMAT");
        assert_eq!(issues[0].severity, Severity::Critical);
    }

    #[test]
    fn in_band_weight_sum_is_clean() {
        let decomposition = decomposition_with_weights(&[60.0, 40.0]);
        assert!(validate_holdings_weights(&decomposition, Phase::Decomposition).is_empty());
    }

    #[test]
    fn conservation_within_tolerance_is_clean() {
        assert!(validate_aggregation_totals(101.0, 100.0, 0.02, Phase::Aggregation).is_empty());
        let issues = validate_aggregation_totals(104.0, 100.0, 0.02, Phase::Aggregation);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].code, "TOTAL_MISMATCH");
    }

    #[test]
    fn large_mismatch_is_critical() {
        let issues = validate_aggregation_totals(150.0, 100.0, 0.02, Phase::Aggregation);
        assert_eq!(issues[0].code, "TOTAL_MISMATCH_LARGE");

        let mut quality = DataQuality::new();
        quality.add_issues(issues);
        assert!(quality.has_critical_issues());
    }

    #[test]
    fn empty_positions_are_a_critical_schema_issue() {
        let issues = validate_loaded_positions(&[], Phase::DataLoading);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].code, "NO_POSITIONS");
        assert_eq!(issues[0].severity, Severity::Critical);
    }
}
