use std::path::PathBuf;

use rust_decimal::Decimal;
use thiserror::Error;

use crate::validation::ValidationReport;
use crate::{MetricKind, Vendor};

/// Validation errors for domain value objects exposed by `loom-core`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("ticker cannot be empty")]
    EmptyTicker,
    #[error("ticker length {len} exceeds max {max}")]
    TickerTooLong { len: usize, max: usize },
    #[error("ticker must start with an ASCII letter: '{ch}'")]
    TickerInvalidStart { ch: char },
    #[error("ticker contains invalid character '{ch}' at index {index}")]
    TickerInvalidChar { ch: char, index: usize },
    #[error("ticker '{value}' must be a root symbol with at most one share-class suffix of 1-2 letters")]
    TickerShareClass { value: String },

    #[error("metric key '{value}' must be lowercase snake_case starting with a letter")]
    InvalidMetricKey { value: String },

    #[error("invalid vendor '{value}', expected one of fmp, sec, yahoo")]
    InvalidVendor { value: String },
    #[error("invalid strategy '{value}', expected one of operating, insurance")]
    InvalidStrategy { value: String },

    #[error("period end must be a YYYY-MM-DD calendar date: '{value}'")]
    InvalidPeriodEnd { value: String },
    #[error("fiscal year {year} is outside the supported calendar range")]
    InvalidFiscalYear { year: i32 },

    #[error("request id must be at least 8 characters")]
    InvalidRequestId,
    #[error("schema version '{value}' must look like v<major>.<minor>.<patch>")]
    InvalidSchemaVersion { value: String },
    #[error("timestamp cannot be formatted as RFC3339")]
    InvalidTimestamp,
    #[error("envelope error code cannot be empty")]
    EmptyErrorCode,
    #[error("envelope error message cannot be empty")]
    EmptyErrorMessage,
}

/// Malformed catalog, mapping, or template configuration. Always fatal at load time.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {document}: {source}")]
    Parse {
        document: &'static str,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("{document}: unsupported version {found}, expected {expected}")]
    UnsupportedVersion {
        document: &'static str,
        found: u32,
        expected: u32,
    },

    #[error("{context}: {source}")]
    InvalidValue {
        context: String,
        #[source]
        source: ValidationError,
    },

    #[error("catalog declares no metrics")]
    EmptyCatalog,
    #[error("duplicate metric key '{key}' in catalog")]
    DuplicateMetric { key: String },
    #[error("metric '{key}': min {min} exceeds max {max}")]
    InvalidBounds {
        key: String,
        min: Decimal,
        max: Decimal,
    },
    #[error("metric '{key}': ratio bounds [{lo}, {hi}] are inverted")]
    InvalidRatioBounds { key: String, lo: Decimal, hi: Decimal },
    #[error("metric '{key}': ratio bounds declared on a {kind} metric")]
    RatioBoundsOnNonRatio { key: String, kind: MetricKind },
    #[error("metric '{key}': policy year range {from}..={to} is inverted")]
    InvalidYearRange { key: String, from: i32, to: i32 },

    #[error("mapping references metric '{key}' which is not in the catalog")]
    UnknownMappedMetric { key: String },
    #[error("mapping declares metric '{key}' more than once")]
    DuplicateMappedMetric { key: String },
    #[error("mapping for '{key}' declares no vendors")]
    EmptyVendorMap { key: String },
    #[error("mapping for '{key}' / {vendor} has no candidates")]
    EmptyCandidates { key: String, vendor: Vendor },
    #[error("mapping for '{key}' / {vendor} has a blank candidate at rank {rank}")]
    BlankCandidate {
        key: String,
        vendor: Vendor,
        rank: usize,
    },
    #[error("mapping for '{key}' / {vendor} repeats candidate '{candidate}'")]
    DuplicateCandidate {
        key: String,
        vendor: Vendor,
        candidate: String,
    },
    #[error("no candidate list for metric '{key}' and vendor {vendor}")]
    MissingCandidates { key: String, vendor: Vendor },
    #[error("required metric '{key}' has no vendor candidates and is not direct_only")]
    UncoveredRequiredMetric { key: String },

    #[error("template spec declares table '{name}' more than once")]
    DuplicateTable { name: String },
    #[error("template table '{name}': max_rows must be greater than zero")]
    InvalidSafeZone { name: String },
    #[error("template spec must declare the data table '{name}'")]
    MissingDataTable { name: String },
}

impl ConfigError {
    pub(crate) fn invalid(context: impl Into<String>, source: ValidationError) -> Self {
        Self::InvalidValue {
            context: context.into(),
            source,
        }
    }
}

/// Write-time failures. Every variant is raised before any output bytes exist.
#[derive(Debug, Error)]
pub enum WriteError {
    #[error("table '{name}' not found in template")]
    TableNotFound { name: String },
    #[error("table '{table}' needs {needed_rows} rows but its safe zone allows {max_rows}")]
    SafeZoneOverflow {
        table: String,
        needed_rows: usize,
        max_rows: usize,
    },
    #[error("table '{table}' has no column headed '{header}'")]
    ColumnNotFound { table: String, header: String },
    #[error("row {index} has {found} cells, expected {expected}")]
    RowShape {
        index: usize,
        found: usize,
        expected: usize,
    },
    #[error("unsupported template: {0}")]
    Template(String),
    #[error("template archive error: {0}")]
    Archive(#[from] zip::result::ZipError),
    #[error("template xml error: {0}")]
    Xml(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("failed to persist workbook to {path}: {source}")]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Top-level error for one pipeline run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("fiscal year {fiscal_year} appears more than once for {ticker}")]
    DuplicateFiscalYear { ticker: String, fiscal_year: i32 },
    #[error("contract violated: {0}")]
    Contract(Box<ValidationReport>),
    #[error(transparent)]
    Write(#[from] WriteError),
    #[error("invalid report input: {0}")]
    Input(#[from] serde_json::Error),
}

impl PipelineError {
    /// The aggregated report when the run stopped on contract violations.
    pub fn report(&self) -> Option<&ValidationReport> {
        match self {
            Self::Contract(report) => Some(report),
            _ => None,
        }
    }
}
