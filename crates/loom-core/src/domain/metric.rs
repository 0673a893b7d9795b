use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::ValidationError;

/// Catalog-defined stable metric name, independent of vendor terminology.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MetricKey(String);

impl MetricKey {
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let mut chars = input.chars();
        let starts_with_letter = chars.next().is_some_and(|ch| ch.is_ascii_lowercase());
        let rest_valid =
            chars.all(|ch| ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '_');

        if !starts_with_letter || !rest_valid {
            return Err(ValidationError::InvalidMetricKey {
                value: input.to_owned(),
            });
        }

        Ok(Self(input.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for MetricKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for MetricKey {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<MetricKey> for String {
    fn from(value: MetricKey) -> Self {
        value.0
    }
}

/// Value semantics of a metric. Only `Ratio` metrics may carry ratio bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    Currency,
    Ratio,
    Count,
    PerShare,
}

impl MetricKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Currency => "currency",
            Self::Ratio => "ratio",
            Self::Count => "count",
            Self::PerShare => "per_share",
        }
    }
}

impl Display for MetricKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
