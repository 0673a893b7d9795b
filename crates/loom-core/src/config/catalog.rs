//! Metrics catalog: the single source of truth for which metrics may appear in a report,
//! when they are required, and which numeric constraints their values must satisfy.

use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::path::Path;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::read_document;
use crate::{ConfigError, MetricKey, MetricKind, Strategy};

const CATALOG_VERSION: u32 = 1;

/// Missing-value policy for a metric under one strategy and fiscal-year range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Policy {
    Required,
    #[default]
    Optional,
    WarnIfMissing,
}

impl Policy {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Required => "required",
            Self::Optional => "optional",
            Self::WarnIfMissing => "warn_if_missing",
        }
    }
}

impl Display for Policy {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sign convention a metric's values must follow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignConvention {
    NonNegative,
    NonPositive,
    #[default]
    Any,
}

/// Inclusive fiscal-year range; open ends match every year on that side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct YearRange {
    pub from: Option<i32>,
    pub to: Option<i32>,
}

impl YearRange {
    pub fn contains(self, year: i32) -> bool {
        self.from.map_or(true, |from| year >= from) && self.to.map_or(true, |to| year <= to)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyRule {
    pub strategy: Strategy,
    pub years: YearRange,
    pub policy: Policy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RatioBounds {
    pub lo: Decimal,
    pub hi: Decimal,
}

impl RatioBounds {
    pub fn contains(self, value: Decimal) -> bool {
        value >= self.lo && value <= self.hi
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Constraints {
    pub min: Option<Decimal>,
    pub max: Option<Decimal>,
    pub sign: SignConvention,
    pub allow_negative: bool,
    pub ratio_bounds: Option<RatioBounds>,
}

impl Constraints {
    /// Negative values are rejected either by `allow_negative: false` or a non-negative sign
    /// convention; both are reported as a single sign violation.
    pub fn forbids_negative(&self) -> bool {
        !self.allow_negative || self.sign == SignConvention::NonNegative
    }

    pub fn forbids_positive(&self) -> bool {
        self.sign == SignConvention::NonPositive
    }
}

/// One declared metric.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    key: MetricKey,
    unit: String,
    kind: MetricKind,
    rules: Vec<PolicyRule>,
    default_policy: Policy,
    constraints: Constraints,
    direct_only: bool,
}

impl CatalogEntry {
    pub fn key(&self) -> &MetricKey {
        &self.key
    }

    pub fn unit(&self) -> &str {
        &self.unit
    }

    pub fn kind(&self) -> MetricKind {
        self.kind
    }

    pub fn constraints(&self) -> &Constraints {
        &self.constraints
    }

    pub fn rules(&self) -> &[PolicyRule] {
        &self.rules
    }

    /// Values for this metric arrive in canonical form only, never through vendor mapping.
    pub fn direct_only(&self) -> bool {
        self.direct_only
    }

    /// First rule matching the strategy and year wins; otherwise the default policy applies.
    pub fn policy_for(&self, strategy: Strategy, fiscal_year: i32) -> Policy {
        self.rules
            .iter()
            .find(|rule| rule.strategy == strategy && rule.years.contains(fiscal_year))
            .map_or(self.default_policy, |rule| rule.policy)
    }

    pub fn is_ever_required(&self) -> bool {
        self.default_policy == Policy::Required
            || self.rules.iter().any(|rule| rule.policy == Policy::Required)
    }
}

/// Immutable metrics catalog, loaded once per process and shared by reference.
#[derive(Debug, Clone)]
pub struct MetricsCatalog {
    entries: Vec<CatalogEntry>,
    index: HashMap<String, usize>,
}

impl MetricsCatalog {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        Self::from_yaml_str(&read_document(path)?)
    }

    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        let raw: RawCatalog = serde_yaml::from_str(text).map_err(|source| ConfigError::Parse {
            document: "metrics catalog",
            source,
        })?;
        Self::from_raw(raw)
    }

    fn from_raw(raw: RawCatalog) -> Result<Self, ConfigError> {
        if raw.version != CATALOG_VERSION {
            return Err(ConfigError::UnsupportedVersion {
                document: "metrics catalog",
                found: raw.version,
                expected: CATALOG_VERSION,
            });
        }
        if raw.metrics.is_empty() {
            return Err(ConfigError::EmptyCatalog);
        }

        let mut entries = Vec::with_capacity(raw.metrics.len());
        let mut index = HashMap::with_capacity(raw.metrics.len());
        for metric in raw.metrics {
            let entry = metric.into_entry()?;
            if index
                .insert(entry.key.as_str().to_owned(), entries.len())
                .is_some()
            {
                return Err(ConfigError::DuplicateMetric {
                    key: entry.key.as_str().to_owned(),
                });
            }
            entries.push(entry);
        }

        Ok(Self { entries, index })
    }

    pub fn get(&self, key: &str) -> Option<&CatalogEntry> {
        self.index.get(key).map(|position| &self.entries[*position])
    }

    pub fn contains(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    /// Entries in declaration order.
    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawCatalog {
    version: u32,
    metrics: Vec<RawMetric>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawMetric {
    key: String,
    unit: String,
    kind: MetricKind,
    #[serde(default)]
    default_policy: Policy,
    #[serde(default)]
    policies: Vec<RawPolicyRule>,
    #[serde(default)]
    constraints: RawConstraints,
    #[serde(default)]
    direct_only: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawPolicyRule {
    strategy: Strategy,
    #[serde(default)]
    from_year: Option<i32>,
    #[serde(default)]
    to_year: Option<i32>,
    policy: Policy,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConstraints {
    #[serde(default)]
    min: Option<Decimal>,
    #[serde(default)]
    max: Option<Decimal>,
    #[serde(default)]
    sign: SignConvention,
    #[serde(default)]
    allow_negative: Option<bool>,
    #[serde(default)]
    ratio_bounds: Option<[Decimal; 2]>,
}

impl RawMetric {
    fn into_entry(self) -> Result<CatalogEntry, ConfigError> {
        let key = MetricKey::parse(self.key.trim())
            .map_err(|source| ConfigError::invalid("metrics catalog key", source))?;

        let mut rules = Vec::with_capacity(self.policies.len());
        for rule in self.policies {
            if let (Some(from), Some(to)) = (rule.from_year, rule.to_year) {
                if from > to {
                    return Err(ConfigError::InvalidYearRange {
                        key: key.as_str().to_owned(),
                        from,
                        to,
                    });
                }
            }
            rules.push(PolicyRule {
                strategy: rule.strategy,
                years: YearRange {
                    from: rule.from_year,
                    to: rule.to_year,
                },
                policy: rule.policy,
            });
        }

        let raw = self.constraints;
        if let (Some(min), Some(max)) = (raw.min, raw.max) {
            if min > max {
                return Err(ConfigError::InvalidBounds {
                    key: key.as_str().to_owned(),
                    min,
                    max,
                });
            }
        }

        let ratio_bounds = match raw.ratio_bounds {
            None => None,
            Some(_) if self.kind != MetricKind::Ratio => {
                return Err(ConfigError::RatioBoundsOnNonRatio {
                    key: key.as_str().to_owned(),
                    kind: self.kind,
                });
            }
            Some([lo, hi]) if lo > hi => {
                return Err(ConfigError::InvalidRatioBounds {
                    key: key.as_str().to_owned(),
                    lo,
                    hi,
                });
            }
            Some([lo, hi]) => Some(RatioBounds { lo, hi }),
        };

        Ok(CatalogEntry {
            key,
            unit: self.unit.trim().to_owned(),
            kind: self.kind,
            rules,
            default_policy: self.default_policy,
            constraints: Constraints {
                min: raw.min,
                max: raw.max,
                sign: raw.sign,
                allow_negative: raw.allow_negative.unwrap_or(true),
                ratio_bounds,
            },
            direct_only: self.direct_only,
        })
    }
}
