//! # Configuration
//!
//! Typed, immutable configuration for a loom run.
//!
//! Every document is parsed from YAML into raw structs and converted into validated
//! value objects at load time. A malformed document is a [`ConfigError`]; nothing is
//! repaired or defaulted past what the document declares.
//!
//! | Document | Type | Default location |
//! |----------|------|------------------|
//! | Metrics catalog | [`MetricsCatalog`] | `$LOOM_HOME/config/metrics_catalog.yaml` |
//! | Vendor mappings | [`MappingConfig`] | `$LOOM_HOME/config/mappings.yaml` |
//! | Template tables | [`TemplateSpec`] | `$LOOM_HOME/config/template.yaml` |
//!
//! `LOOM_HOME` falls back to `$HOME/.loom`, then `./.loom`.

mod catalog;
mod mapping;
mod template;

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

pub use catalog::{
    CatalogEntry, Constraints, MetricsCatalog, Policy, PolicyRule, RatioBounds, SignConvention,
    YearRange,
};
pub use mapping::{CandidateList, MappingConfig, MappingEntry};
pub use template::{SafeZoneSpec, TemplateSpec, DATA_TABLE, NARRATIVE_TABLE};

use crate::ConfigError;

/// Default tolerance before a vendor period end is reported as a fiscal mismatch.
pub const DEFAULT_FISCAL_TOLERANCE_DAYS: u32 = 7;

/// File locations and tunables for one process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoomConfig {
    /// Root directory for loom configuration and templates.
    pub loom_home: PathBuf,
    pub catalog_path: PathBuf,
    pub mapping_path: PathBuf,
    pub template_spec_path: PathBuf,
    pub template_path: PathBuf,
    pub fiscal_tolerance_days: u32,
}

impl Default for LoomConfig {
    fn default() -> Self {
        Self::with_home(resolve_loom_home())
    }
}

impl LoomConfig {
    pub fn with_home(loom_home: PathBuf) -> Self {
        let config_dir = loom_home.join("config");
        Self {
            catalog_path: config_dir.join("metrics_catalog.yaml"),
            mapping_path: config_dir.join("mappings.yaml"),
            template_spec_path: config_dir.join("template.yaml"),
            template_path: loom_home.join("templates").join("report.xlsx"),
            fiscal_tolerance_days: DEFAULT_FISCAL_TOLERANCE_DAYS,
            loom_home,
        }
    }
}

/// Catalog, mapping, and template spec loaded together and cross-checked.
#[derive(Debug, Clone)]
pub struct ConfigBundle {
    pub catalog: MetricsCatalog,
    pub mapping: MappingConfig,
    pub template: TemplateSpec,
}

impl ConfigBundle {
    pub fn load(config: &LoomConfig) -> Result<Self, ConfigError> {
        let catalog = MetricsCatalog::load(&config.catalog_path)?;
        let mapping = MappingConfig::load(&config.mapping_path, &catalog)?;
        let template = TemplateSpec::load(&config.template_spec_path)?;
        Self::new(catalog, mapping, template)
    }

    pub fn new(
        catalog: MetricsCatalog,
        mapping: MappingConfig,
        template: TemplateSpec,
    ) -> Result<Self, ConfigError> {
        check_required_coverage(&catalog, &mapping)?;
        debug!(
            metrics = catalog.len(),
            tables = template.tables().len(),
            "configuration loaded"
        );
        Ok(Self {
            catalog,
            mapping,
            template,
        })
    }
}

/// Every metric that can be required must be obtainable from some vendor, unless the
/// catalog marks it as supplied in canonical form only.
pub fn check_required_coverage(
    catalog: &MetricsCatalog,
    mapping: &MappingConfig,
) -> Result<(), ConfigError> {
    for entry in catalog.entries() {
        let key = entry.key().as_str();
        if entry.is_ever_required() && !entry.direct_only() && !mapping.covers(key) {
            return Err(ConfigError::UncoveredRequiredMetric {
                key: key.to_owned(),
            });
        }
    }
    Ok(())
}

pub(crate) fn read_document(path: &Path) -> Result<String, ConfigError> {
    fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn resolve_loom_home() -> PathBuf {
    if let Some(path) = env::var_os("LOOM_HOME") {
        return PathBuf::from(path);
    }
    if let Some(home) = env::var_os("HOME") {
        return PathBuf::from(home).join(".loom");
    }
    PathBuf::from(".loom")
}
