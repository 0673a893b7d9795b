//! Vendor key resolution: translate a raw vendor payload into canonical metric values by
//! scanning each metric's candidate keys in rank order.

use std::str::FromStr;

use rust_decimal::Decimal;
use serde_json::{Map, Value};

use crate::observe::{Observation, Observer};
use crate::{ConfigError, MappingConfig, MetricKey, MetricsCatalog, Vendor};

/// Raw vendor payload: field name to JSON value.
pub type Payload = Map<String, Value>;

/// Value selected from a payload, with the candidate that supplied it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedValue {
    pub metric: MetricKey,
    pub vendor: Vendor,
    pub raw_key: String,
    pub rank: usize,
    pub value: Decimal,
}

/// Outcome of resolving one metric against one vendor payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Resolved(ResolvedValue),
    /// The selected candidate is present but is not a number.
    Unparsable {
        metric: MetricKey,
        vendor: Vendor,
        raw_key: String,
        rank: usize,
        raw: String,
    },
    /// No candidate is present. Severity is decided by the validator, not here.
    Missing,
}

impl Resolution {
    pub fn is_missing(&self) -> bool {
        matches!(self, Self::Missing)
    }
}

/// Resolves canonical metrics from vendor payloads using the mapping configuration.
#[derive(Debug, Clone, Copy)]
pub struct CandidateResolver<'a> {
    mapping: &'a MappingConfig,
}

impl<'a> CandidateResolver<'a> {
    pub fn new(mapping: &'a MappingConfig) -> Self {
        Self { mapping }
    }

    /// Resolve `metric` for `vendor`. The first candidate whose key exists with a non-null
    /// value is selected; selecting any rank other than 0 emits a fallback observation.
    ///
    /// An undeclared (metric, vendor) pair is a configuration error. Pipelines only ask for
    /// pairs the mapping declares, so this surfaces mistakes in ad-hoc callers.
    pub fn resolve(
        &self,
        metric: &str,
        vendor: Vendor,
        payload: &Payload,
        observer: &mut dyn Observer,
    ) -> Result<Resolution, ConfigError> {
        let entry = self
            .mapping
            .entry(metric)
            .ok_or_else(|| ConfigError::MissingCandidates {
                key: metric.to_owned(),
                vendor,
            })?;
        let candidates = entry
            .candidates(vendor)
            .ok_or_else(|| ConfigError::MissingCandidates {
                key: metric.to_owned(),
                vendor,
            })?;

        let Some((rank, raw_key, raw_value)) = candidates.ranked().find_map(|(rank, key)| {
            payload
                .get(key)
                .filter(|value| !value.is_null())
                .map(|value| (rank, key, value))
        }) else {
            return Ok(Resolution::Missing);
        };

        if rank > 0 {
            observer.observe(Observation::MappingFallbackUsed {
                metric: metric.to_owned(),
                vendor,
                candidate: raw_key.to_owned(),
                rank,
            });
        }

        let resolution = match decimal_from_json(raw_value) {
            Some(value) => Resolution::Resolved(ResolvedValue {
                metric: entry.metric().clone(),
                vendor,
                raw_key: raw_key.to_owned(),
                rank,
                value,
            }),
            None => Resolution::Unparsable {
                metric: entry.metric().clone(),
                vendor,
                raw_key: raw_key.to_owned(),
                rank,
                raw: raw_value.to_string(),
            },
        };
        Ok(resolution)
    }

    /// Resolve every catalog metric that declares candidates for `vendor`, in catalog order.
    pub fn resolve_vendor(
        &self,
        catalog: &MetricsCatalog,
        vendor: Vendor,
        payload: &Payload,
        observer: &mut dyn Observer,
    ) -> Result<Vec<(MetricKey, Resolution)>, ConfigError> {
        let mut resolved = Vec::new();
        for entry in catalog.entries() {
            let key = entry.key();
            if self.mapping.candidates(key.as_str(), vendor).is_none() {
                continue;
            }
            let resolution = self.resolve(key.as_str(), vendor, payload, observer)?;
            resolved.push((key.clone(), resolution));
        }
        Ok(resolved)
    }
}

/// Exact decimal from a JSON number or numeric string. Floats go through their shortest
/// decimal representation, so `0.1` stays `0.1`.
pub fn decimal_from_json(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(number) => {
            if let Some(int) = number.as_i64() {
                return Some(Decimal::from(int));
            }
            if let Some(int) = number.as_u64() {
                return Some(Decimal::from(int));
            }
            parse_decimal(&number.to_string())
        }
        Value::String(text) => parse_decimal(text.trim()),
        _ => None,
    }
}

fn parse_decimal(text: &str) -> Option<Decimal> {
    if text.is_empty() {
        return None;
    }
    Decimal::from_str(text)
        .or_else(|_| Decimal::from_scientific(text))
        .ok()
}
