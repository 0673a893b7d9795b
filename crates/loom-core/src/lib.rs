//! Core contracts for loom.
//!
//! Turns raw vendor payloads for one ticker into catalog-validated financial records and
//! injects them into named tables of a spreadsheet template.
//!
//! | Module | Role |
//! |--------|------|
//! | [`domain`] | Validated value objects (tickers, metric keys, period ends, records) |
//! | [`config`] | Metrics catalog, vendor mappings, template table spec |
//! | [`resolver`] | Ranked vendor-key resolution with fallback observation |
//! | [`fiscal`] | Fiscal period end normalization |
//! | [`validation`] | Catalog contract validation with aggregated reports |
//! | [`workbook`] | Safe-zone table writing into `.xlsx` templates |
//! | [`pipeline`] | The four stages wired together for one report |
//! | [`observe`] | Observation taxonomy and observer sinks |
//! | [`envelope`] | Machine-readable response envelope |
//!
//! Configuration is loaded once and borrowed by every call. Stages receive an injected
//! [`observe::Observer`] instead of logging as a side effect.

pub mod config;
pub mod domain;
pub mod envelope;
pub mod error;
pub mod fiscal;
pub mod observe;
pub mod pipeline;
pub mod resolver;
pub mod validation;
pub mod workbook;

pub use config::{
    check_required_coverage, CandidateList, CatalogEntry, ConfigBundle, Constraints, LoomConfig,
    MappingConfig, MappingEntry, MetricsCatalog, Policy, PolicyRule, RatioBounds, SafeZoneSpec,
    SignConvention, TemplateSpec, YearRange, DATA_TABLE, DEFAULT_FISCAL_TOLERANCE_DAYS,
    NARRATIVE_TABLE,
};
pub use domain::{
    FinancialRecord, MetricKey, MetricKind, NarrativeEntry, PeriodEnd, Provenance, Strategy,
    Ticker, Vendor,
};
pub use envelope::{Envelope, EnvelopeError, EnvelopeMeta};
pub use error::{ConfigError, PipelineError, ValidationError, WriteError};
pub use fiscal::{FiscalCalendar, NormalizedPeriod, PeriodSource};
pub use observe::{NoopObserver, Observation, ObservationLog, Observer};
pub use pipeline::{NarrativeInput, Pipeline, ReportInput, RunOutput, VendorPayload, YearInput};
pub use resolver::{CandidateResolver, Payload, Resolution, ResolvedValue};
pub use validation::{
    CandidateRecord, ContractValidator, IssueKind, MetricValue, Severity, ValidationIssue,
    ValidationReport,
};
pub use workbook::{
    persist, CellValue, RowSet, SafeZoneTable, SafeZoneTableWriter, TableRecord, TableWrite,
    WrittenWorkbook,
};
