//! # Catalog Contract Validation
//!
//! Checks candidate records against the [`MetricsCatalog`] and aggregates every problem
//! into one [`ValidationReport`]. The scan never stops at the first issue; callers see the
//! complete picture and decide once whether to abort (any error) or continue (warnings only).
//!
//! | Kind | Severity | Raised when |
//! |------|----------|-------------|
//! | `unknown_key` | error | metric key not declared in the catalog |
//! | `missing_required` | error | value missing, policy `required` |
//! | `missing_warn` | warning | value missing, policy `warn_if_missing` |
//! | `invalid_value` | error | selected vendor value is not numeric |
//! | `bounds_violation` | error | value outside `[min, max]` |
//! | `sign_violation` | error | sign convention or `allow_negative` broken |
//! | `ratio_violation` | error | ratio metric outside its ratio bounds |

use std::fmt::{Display, Formatter};

use rust_decimal::Decimal;
use serde::Serialize;

use crate::observe::{Observation, Observer};
use crate::{
    CatalogEntry, FinancialRecord, MetricKind, MetricsCatalog, PeriodEnd, Policy, Provenance,
    Strategy, Ticker,
};

/// A value as it arrives from resolution, before the catalog has judged it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetricValue {
    Present(Decimal),
    Missing,
    /// Present but not numeric; holds the raw JSON text.
    Unparsable(String),
}

/// One (ticker, metric, fiscal year) value awaiting validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateRecord {
    pub ticker: Ticker,
    /// Kept as a raw string: keys outside the catalog must still be reportable.
    pub metric: String,
    pub value: MetricValue,
    pub fiscal_year: i32,
    pub period_end: PeriodEnd,
    pub strategy: Strategy,
    pub provenance: Option<Provenance>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Error,
    Warning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    UnknownKey,
    MissingRequired,
    MissingWarn,
    InvalidValue,
    BoundsViolation,
    SignViolation,
    RatioViolation,
}

impl IssueKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::UnknownKey => "unknown_key",
            Self::MissingRequired => "missing_required",
            Self::MissingWarn => "missing_warn",
            Self::InvalidValue => "invalid_value",
            Self::BoundsViolation => "bounds_violation",
            Self::SignViolation => "sign_violation",
            Self::RatioViolation => "ratio_violation",
        }
    }

    pub const fn severity(self) -> Severity {
        match self {
            Self::MissingWarn => Severity::Warning,
            _ => Severity::Error,
        }
    }
}

impl Display for IssueKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationIssue {
    pub severity: Severity,
    pub kind: IssueKind,
    pub ticker: Ticker,
    pub metric: String,
    pub fiscal_year: i32,
    pub detail: String,
}

impl ValidationIssue {
    fn new(record: &CandidateRecord, kind: IssueKind, detail: impl Into<String>) -> Self {
        Self {
            severity: kind.severity(),
            kind,
            ticker: record.ticker.clone(),
            metric: record.metric.clone(),
            fiscal_year: record.fiscal_year,
            detail: detail.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl Display for ValidationIssue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let severity = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        write!(
            f,
            "[{severity}] {} {}/{} FY{}: {}",
            self.kind, self.ticker, self.metric, self.fiscal_year, self.detail
        )
    }
}

/// Every issue found in one pass, plus the records that passed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    issues: Vec<ValidationIssue>,
    accepted: Vec<FinancialRecord>,
}

impl ValidationReport {
    /// Fatal iff at least one error-severity issue exists.
    pub fn is_fatal(&self) -> bool {
        self.issues.iter().any(ValidationIssue::is_error)
    }

    pub fn issues(&self) -> &[ValidationIssue] {
        &self.issues
    }

    pub fn errors(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.issues.iter().filter(|issue| issue.is_error())
    }

    pub fn warnings(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.issues.iter().filter(|issue| !issue.is_error())
    }

    pub fn accepted(&self) -> &[FinancialRecord] {
        &self.accepted
    }

    pub fn into_accepted(self) -> Vec<FinancialRecord> {
        self.accepted
    }

    /// One message listing every violation.
    pub fn summary(&self) -> String {
        let errors = self.errors().count();
        let warnings = self.issues.len() - errors;
        let mut summary = format!("{errors} contract error(s), {warnings} warning(s)");
        for issue in &self.issues {
            summary.push_str("\n  - ");
            summary.push_str(&issue.to_string());
        }
        summary
    }
}

impl Display for ValidationReport {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.summary())
    }
}

/// Validates candidate records against an immutable catalog.
#[derive(Debug, Clone, Copy)]
pub struct ContractValidator<'a> {
    catalog: &'a MetricsCatalog,
}

impl<'a> ContractValidator<'a> {
    pub fn new(catalog: &'a MetricsCatalog) -> Self {
        Self { catalog }
    }

    pub fn validate(
        &self,
        records: &[CandidateRecord],
        observer: &mut dyn Observer,
    ) -> ValidationReport {
        let mut issues = Vec::new();
        let mut accepted = Vec::new();

        for record in records {
            let Some(entry) = self.catalog.get(&record.metric) else {
                observer.observe(Observation::UnknownKeyRejected {
                    ticker: record.ticker.clone(),
                    metric: record.metric.clone(),
                    fiscal_year: record.fiscal_year,
                });
                issues.push(ValidationIssue::new(
                    record,
                    IssueKind::UnknownKey,
                    "metric is not declared in the catalog",
                ));
                continue;
            };

            match &record.value {
                MetricValue::Missing => {
                    if let Some(issue) = missing_issue(entry, record, observer) {
                        issues.push(issue);
                    }
                }
                MetricValue::Unparsable(raw) => issues.push(ValidationIssue::new(
                    record,
                    IssueKind::InvalidValue,
                    format!("vendor value {raw} is not numeric"),
                )),
                MetricValue::Present(value) => {
                    let found = constraint_issues(entry, record, *value);
                    if found.is_empty() {
                        accepted.push(FinancialRecord::new(
                            record.ticker.clone(),
                            entry.key().clone(),
                            *value,
                            record.fiscal_year,
                            record.period_end,
                            entry.unit().to_owned(),
                            record.provenance.clone(),
                            record.strategy,
                        ));
                    }
                    issues.extend(found);
                }
            }
        }

        ValidationReport { issues, accepted }
    }
}

fn missing_issue(
    entry: &CatalogEntry,
    record: &CandidateRecord,
    observer: &mut dyn Observer,
) -> Option<ValidationIssue> {
    match entry.policy_for(record.strategy, record.fiscal_year) {
        Policy::Required => {
            observer.observe(Observation::MissingRequiredRejected {
                ticker: record.ticker.clone(),
                metric: record.metric.clone(),
                fiscal_year: record.fiscal_year,
                strategy: record.strategy,
            });
            Some(ValidationIssue::new(
                record,
                IssueKind::MissingRequired,
                format!("required for {} strategy", record.strategy),
            ))
        }
        Policy::WarnIfMissing => Some(ValidationIssue::new(
            record,
            IssueKind::MissingWarn,
            format!("expected for {} strategy", record.strategy),
        )),
        Policy::Optional => None,
    }
}

fn constraint_issues(
    entry: &CatalogEntry,
    record: &CandidateRecord,
    value: Decimal,
) -> Vec<ValidationIssue> {
    let constraints = entry.constraints();
    let mut issues = Vec::new();

    if let Some(min) = constraints.min {
        if value < min {
            issues.push(ValidationIssue::new(
                record,
                IssueKind::BoundsViolation,
                format!("value {value} is below minimum {min}"),
            ));
        }
    }
    if let Some(max) = constraints.max {
        if value > max {
            issues.push(ValidationIssue::new(
                record,
                IssueKind::BoundsViolation,
                format!("value {value} is above maximum {max}"),
            ));
        }
    }

    if value.is_sign_negative() && !value.is_zero() && constraints.forbids_negative() {
        issues.push(ValidationIssue::new(
            record,
            IssueKind::SignViolation,
            format!("value {value} must not be negative"),
        ));
    }
    if value.is_sign_positive() && !value.is_zero() && constraints.forbids_positive() {
        issues.push(ValidationIssue::new(
            record,
            IssueKind::SignViolation,
            format!("value {value} must not be positive"),
        ));
    }

    if entry.kind() == MetricKind::Ratio {
        if let Some(bounds) = constraints.ratio_bounds {
            if !bounds.contains(value) {
                issues.push(ValidationIssue::new(
                    record,
                    IssueKind::RatioViolation,
                    format!(
                        "ratio {value} is outside [{}, {}]",
                        bounds.lo, bounds.hi
                    ),
                ));
            }
        }
    }

    issues
}
