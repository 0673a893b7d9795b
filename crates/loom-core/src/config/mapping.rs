//! Vendor key mapping: per metric and vendor, an ordered list of candidate payload keys.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::str::FromStr;

use serde::Deserialize;

use super::read_document;
use crate::{ConfigError, MetricKey, MetricsCatalog, Vendor};

const MAPPING_VERSION: u32 = 1;

/// Non-empty, duplicate-free candidate keys; index is the candidate rank.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateList(Vec<String>);

impl CandidateList {
    pub fn primary(&self) -> &str {
        &self.0[0]
    }

    pub fn ranked(&self) -> impl Iterator<Item = (usize, &str)> {
        self.0.iter().map(String::as_str).enumerate()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingEntry {
    metric: MetricKey,
    by_vendor: BTreeMap<Vendor, CandidateList>,
}

impl MappingEntry {
    pub fn metric(&self) -> &MetricKey {
        &self.metric
    }

    pub fn candidates(&self, vendor: Vendor) -> Option<&CandidateList> {
        self.by_vendor.get(&vendor)
    }

    pub fn vendors(&self) -> impl Iterator<Item = Vendor> + '_ {
        self.by_vendor.keys().copied()
    }
}

/// Immutable mapping configuration, cross-checked against the catalog at load time.
#[derive(Debug, Clone)]
pub struct MappingConfig {
    entries: BTreeMap<String, MappingEntry>,
}

impl MappingConfig {
    pub fn load(path: &Path, catalog: &MetricsCatalog) -> Result<Self, ConfigError> {
        Self::from_yaml_str(&read_document(path)?, catalog)
    }

    pub fn from_yaml_str(text: &str, catalog: &MetricsCatalog) -> Result<Self, ConfigError> {
        let raw: RawMapping = serde_yaml::from_str(text).map_err(|source| ConfigError::Parse {
            document: "mapping",
            source,
        })?;

        if raw.version != MAPPING_VERSION {
            return Err(ConfigError::UnsupportedVersion {
                document: "mapping",
                found: raw.version,
                expected: MAPPING_VERSION,
            });
        }

        let mut entries = BTreeMap::new();
        for (raw_key, vendors) in raw.mappings {
            let metric = MetricKey::parse(raw_key.trim())
                .map_err(|source| ConfigError::invalid("mapping metric key", source))?;
            if !catalog.contains(metric.as_str()) {
                return Err(ConfigError::UnknownMappedMetric {
                    key: metric.as_str().to_owned(),
                });
            }

            if vendors.is_empty() {
                return Err(ConfigError::EmptyVendorMap {
                    key: metric.as_str().to_owned(),
                });
            }

            let mut by_vendor = BTreeMap::new();
            for (raw_vendor, candidates) in vendors {
                let vendor = Vendor::from_str(&raw_vendor).map_err(|source| {
                    ConfigError::invalid(format!("mapping for '{metric}'"), source)
                })?;
                let list = candidate_list(&metric, vendor, candidates)?;
                by_vendor.insert(vendor, list);
            }

            let key = metric.as_str().to_owned();
            if entries.contains_key(&key) {
                return Err(ConfigError::DuplicateMappedMetric { key });
            }
            entries.insert(key, MappingEntry { metric, by_vendor });
        }

        Ok(Self { entries })
    }

    pub fn entry(&self, metric: &str) -> Option<&MappingEntry> {
        self.entries.get(metric)
    }

    pub fn candidates(&self, metric: &str, vendor: Vendor) -> Option<&CandidateList> {
        self.entry(metric)?.candidates(vendor)
    }

    /// Whether any vendor declares candidates for `metric`.
    pub fn covers(&self, metric: &str) -> bool {
        self.entries
            .get(metric)
            .is_some_and(|entry| !entry.by_vendor.is_empty())
    }

    pub fn entries(&self) -> impl Iterator<Item = &MappingEntry> {
        self.entries.values()
    }
}

fn candidate_list(
    metric: &MetricKey,
    vendor: Vendor,
    candidates: Vec<String>,
) -> Result<CandidateList, ConfigError> {
    if candidates.is_empty() {
        return Err(ConfigError::EmptyCandidates {
            key: metric.as_str().to_owned(),
            vendor,
        });
    }

    let mut seen = HashSet::with_capacity(candidates.len());
    for (rank, candidate) in candidates.iter().enumerate() {
        if candidate.trim().is_empty() {
            return Err(ConfigError::BlankCandidate {
                key: metric.as_str().to_owned(),
                vendor,
                rank,
            });
        }
        if !seen.insert(candidate.as_str()) {
            return Err(ConfigError::DuplicateCandidate {
                key: metric.as_str().to_owned(),
                vendor,
                candidate: candidate.clone(),
            });
        }
    }

    Ok(CandidateList(candidates))
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawMapping {
    version: u32,
    mappings: BTreeMap<String, BTreeMap<String, Vec<String>>>,
}
