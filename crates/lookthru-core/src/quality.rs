//! Severity-weighted data quality tracking.
//!
//! The score starts at 1.0 and degrades as issues are recorded, with a
//! fixed penalty per severity, floored at 0. A run is trustworthy when
//! the score is at least 0.95 and no critical issue was seen.

use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use serde_json::json;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::issue::Phase;

const TRUSTWORTHY_THRESHOLD: f64 = 0.95;

/// Severity of a data quality issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Calculation WILL be wrong.
    Critical,
    /// Calculation MAY be wrong.
    High,
    /// Data is incomplete.
    Medium,
    /// Cosmetic.
    Low,
}

impl Severity {
    /// Score penalty applied when an issue of this severity is added.
    pub const fn penalty(self) -> f64 {
        match self {
            Self::Critical => 0.25,
            Self::High => 0.10,
            Self::Medium => 0.03,
            Self::Low => 0.01,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

impl Display for Severity {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Grouping category for quality issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueCategory {
    /// Missing or invalid columns.
    Schema,
    /// Weight sum problems.
    Weight,
    /// Identifier resolution failures.
    Resolution,
    /// Missing metadata.
    Enrichment,
    /// Value calculation problems.
    Value,
}

impl IssueCategory {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Schema => "schema",
            Self::Weight => "weight",
            Self::Resolution => "resolution",
            Self::Enrichment => "enrichment",
            Self::Value => "value",
        }
    }
}

impl Display for IssueCategory {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single validation finding detected at a phase boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub severity: Severity,
    pub category: IssueCategory,
    /// Machine-readable code, e.g. `WEIGHT_SUM_LOW`.
    pub code: String,
    pub message: String,
    /// What the user or community can do about it.
    pub fix_hint: String,
    /// Identifier or item the finding relates to.
    pub item: String,
    pub phase: Phase,
    /// RFC 3339, set at construction.
    pub timestamp: String,
    pub expected: Option<String>,
    pub actual: Option<String>,
}

impl ValidationIssue {
    pub fn new(
        severity: Severity,
        category: IssueCategory,
        code: impl Into<String>,
        message: impl Into<String>,
        fix_hint: impl Into<String>,
        item: impl Into<String>,
        phase: Phase,
    ) -> Self {
        let timestamp = OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .unwrap_or_default();
        Self {
            severity,
            category,
            code: code.into(),
            message: message.into(),
            fix_hint: fix_hint.into(),
            item: item.into(),
            phase,
            timestamp,
            expected: None,
            actual: None,
        }
    }

    pub fn with_expected(mut self, expected: impl Into<String>) -> Self {
        self.expected = Some(expected.into());
        self
    }

    pub fn with_actual(mut self, actual: impl Into<String>) -> Self {
        self.actual = Some(actual.into());
        self
    }
}

/// Quality score and issue list accumulated across one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataQuality {
    pub score: f64,
    pub issues: Vec<ValidationIssue>,
}

impl Default for DataQuality {
    fn default() -> Self {
        Self {
            score: 1.0,
            issues: Vec::new(),
        }
    }
}

impl DataQuality {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an issue and degrade the score by its severity penalty.
    pub fn add_issue(&mut self, issue: ValidationIssue) {
        self.score = (self.score - issue.severity.penalty()).max(0.0);
        self.issues.push(issue);
    }

    pub fn add_issues(&mut self, issues: impl IntoIterator<Item = ValidationIssue>) {
        for issue in issues {
            self.add_issue(issue);
        }
    }

    /// Score at least 0.95 and no critical issue.
    #[must_use]
    pub fn is_trustworthy(&self) -> bool {
        self.score >= TRUSTWORTHY_THRESHOLD && !self.has_critical_issues()
    }

    #[must_use]
    pub fn has_critical_issues(&self) -> bool {
        self.issues
            .iter()
            .any(|issue| issue.severity == Severity::Critical)
    }

    #[must_use]
    pub fn issue_count_by_severity(&self) -> BTreeMap<Severity, usize> {
        let mut counts = BTreeMap::new();
        for issue in &self.issues {
            *counts.entry(issue.severity).or_insert(0) += 1;
        }
        counts
    }

    #[must_use]
    pub fn issue_count_by_category(&self) -> BTreeMap<IssueCategory, usize> {
        let mut counts = BTreeMap::new();
        for issue in &self.issues {
            *counts.entry(issue.category).or_insert(0) += 1;
        }
        counts
    }

    pub fn issues_for_phase(&self, phase: Phase) -> impl Iterator<Item = &ValidationIssue> {
        self.issues.iter().filter(move |issue| issue.phase == phase)
    }

    /// Fold another accumulator's issues into this one, recomputing
    /// the score from scratch so merge order cannot matter.
    pub fn merge(&mut self, other: DataQuality) {
        self.issues.extend(other.issues);
        self.score = 1.0;
        for issue in &self.issues {
            self.score = (self.score - issue.severity.penalty()).max(0.0);
        }
    }

    /// JSON summary for reporting surfaces.
    #[must_use]
    pub fn to_summary(&self) -> serde_json::Value {
        let by_severity: BTreeMap<&str, usize> = self
            .issue_count_by_severity()
            .into_iter()
            .map(|(severity, count)| (severity.as_str(), count))
            .collect();
        let by_category: BTreeMap<&str, usize> = self
            .issue_count_by_category()
            .into_iter()
            .map(|(category, count)| (category.as_str(), count))
            .collect();

        json!({
            "quality_score": (self.score * 10_000.0).round() / 10_000.0,
            "is_trustworthy": self.is_trustworthy(),
            "has_critical_issues": self.has_critical_issues(),
            "total_issues": self.issues.len(),
            "by_severity": by_severity,
            "by_category": by_category,
            "issues": self.issues,
        })
    }

    /// Human-friendly status line for the run report.
    #[must_use]
    pub fn to_user_message(&self) -> String {
        let percent = (self.score * 100.0).round();
        if self.has_critical_issues() {
            let critical = self
                .issue_count_by_severity()
                .get(&Severity::Critical)
                .copied()
                .unwrap_or(0);
            return format!(
                "Warning: {critical} critical issue(s) detected. \
                 Results may be inaccurate. Quality score: {percent:.0}%"
            );
        }

        if !self.is_trustworthy() {
            let high = self
                .issue_count_by_severity()
                .get(&Severity::High)
                .copied()
                .unwrap_or(0);
            if high > 0 {
                return format!(
                    "Caution: {high} high-priority issue(s) found. Quality score: {percent:.0}%"
                );
            }
            return format!("Some data quality issues detected. Quality score: {percent:.0}%");
        }

        if !self.issues.is_empty() {
            return format!(
                "Data quality is good with {} minor issue(s). Quality score: {percent:.0}%",
                self.issues.len()
            );
        }

        format!("Excellent data quality. Score: {percent:.0}%")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issue(severity: Severity) -> ValidationIssue {
        ValidationIssue::new(
            severity,
            IssueCategory::Weight,
            "TEST_ISSUE",
            "test",
            "none",
            "IE00B4L5Y983",
            Phase::Decomposition,
        )
    }

    #[test]
    fn penalties_accumulate_per_severity() {
        let mut quality = DataQuality::new();
        quality.add_issue(issue(Severity::Critical));
        quality.add_issue(issue(Severity::Medium));
        assert!((quality.score - 0.72).abs() < 1e-9);
        assert!(!quality.is_trustworthy());
        assert!(quality.has_critical_issues());
    }

    #[test]
    fn score_is_floored_at_zero() {
        let mut quality = DataQuality::new();
        for _ in 0..5 {
            quality.add_issue(issue(Severity::Critical));
        }
        assert_eq!(quality.score, 0.0);
    }

    #[test]
    fn trustworthy_requires_no_critical_even_at_high_score() {
        let mut quality = DataQuality::new();
        assert!(quality.is_trustworthy());

        quality.add_issue(issue(Severity::Low));
        assert!(quality.score >= 0.95);
        assert!(quality.is_trustworthy());

        quality.add_issue(issue(Severity::High));
        assert!(!quality.is_trustworthy());
    }

    #[test]
    fn merge_recomputes_score() {
        let mut left = DataQuality::new();
        left.add_issue(issue(Severity::High));

        let mut right = DataQuality::new();
        right.add_issue(issue(Severity::Medium));
        right.add_issue(issue(Severity::Medium));

        left.merge(right);
        assert_eq!(left.issues.len(), 3);
        assert!((left.score - (1.0 - 0.10 - 0.03 - 0.03)).abs() < 1e-9);
    }

    #[test]
    fn user_message_reflects_state() {
        let mut quality = DataQuality::new();
        assert!(quality.to_user_message().starts_with("Excellent"));

        quality.add_issue(issue(Severity::Critical));
        assert!(quality.to_user_message().starts_with("Warning"));
    }
}
