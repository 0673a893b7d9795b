//! Structured observations emitted by pipeline stages.
//!
//! Stages never log as a hidden side effect: each call takes an injected [`Observer`].
//! [`ObservationLog`] collects observations for the caller and forwards each one to
//! `tracing` under its stable event name.

use serde::Serialize;
use tracing::{info, warn};

use crate::{PeriodEnd, Strategy, Ticker, Vendor};

/// Observation taxonomy. Event names are stable and used as `tracing` event fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event")]
pub enum Observation {
    #[serde(rename = "mapping.fallback_used")]
    MappingFallbackUsed {
        metric: String,
        vendor: Vendor,
        candidate: String,
        rank: usize,
    },
    #[serde(rename = "time.fy_end_mismatch")]
    FiscalPeriodMismatch {
        fiscal_year: i32,
        calendar_default: PeriodEnd,
        vendor_period_end: PeriodEnd,
        deviation_days: i64,
    },
    #[serde(rename = "excel.table_resized")]
    TableResized {
        table: String,
        old_rows: usize,
        new_rows: usize,
    },
    #[serde(rename = "excel.safe_zone_overflow")]
    SafeZoneOverflow {
        table: String,
        needed_rows: usize,
        max_rows: usize,
    },
    #[serde(rename = "contract.unknown_key")]
    UnknownKeyRejected {
        ticker: Ticker,
        metric: String,
        fiscal_year: i32,
    },
    #[serde(rename = "contract.missing_required")]
    MissingRequiredRejected {
        ticker: Ticker,
        metric: String,
        fiscal_year: i32,
        strategy: Strategy,
    },
}

impl Observation {
    pub const fn name(&self) -> &'static str {
        match self {
            Self::MappingFallbackUsed { .. } => "mapping.fallback_used",
            Self::FiscalPeriodMismatch { .. } => "time.fy_end_mismatch",
            Self::TableResized { .. } => "excel.table_resized",
            Self::SafeZoneOverflow { .. } => "excel.safe_zone_overflow",
            Self::UnknownKeyRejected { .. } => "contract.unknown_key",
            Self::MissingRequiredRejected { .. } => "contract.missing_required",
        }
    }

    fn trace(&self) {
        let event = self.name();
        match self {
            Self::MappingFallbackUsed {
                metric,
                vendor,
                candidate,
                rank,
            } => warn!(
                event,
                %metric, %vendor, %candidate, rank,
                "non-primary mapping candidate used"
            ),
            Self::FiscalPeriodMismatch {
                fiscal_year,
                calendar_default,
                vendor_period_end,
                deviation_days,
            } => warn!(
                event,
                fiscal_year,
                %calendar_default,
                %vendor_period_end,
                deviation_days,
                "vendor period end deviates from calendar year end"
            ),
            Self::TableResized {
                table,
                old_rows,
                new_rows,
            } => info!(event, %table, old_rows, new_rows, "table reference resized"),
            Self::SafeZoneOverflow {
                table,
                needed_rows,
                max_rows,
            } => warn!(event, %table, needed_rows, max_rows, "safe zone overflow"),
            Self::UnknownKeyRejected {
                ticker,
                metric,
                fiscal_year,
            } => warn!(
                event,
                %ticker, %metric, fiscal_year,
                "metric key not declared in catalog"
            ),
            Self::MissingRequiredRejected {
                ticker,
                metric,
                fiscal_year,
                strategy,
            } => warn!(
                event,
                %ticker, %metric, fiscal_year, %strategy,
                "required metric missing"
            ),
        }
    }
}

/// Sink for observations, injected into every stage call.
pub trait Observer {
    fn observe(&mut self, observation: Observation);
}

impl Observer for Vec<Observation> {
    fn observe(&mut self, observation: Observation) {
        self.push(observation);
    }
}

/// Discards every observation.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl Observer for NoopObserver {
    fn observe(&mut self, _observation: Observation) {}
}

/// Collects observations in emission order and mirrors each to `tracing`.
#[derive(Debug, Default, Clone)]
pub struct ObservationLog {
    events: Vec<Observation>,
}

impl ObservationLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &[Observation] {
        &self.events
    }

    pub fn into_events(self) -> Vec<Observation> {
        self.events
    }

    pub fn count(&self, name: &str) -> usize {
        self.events
            .iter()
            .filter(|event| event.name() == name)
            .count()
    }
}

impl Observer for ObservationLog {
    fn observe(&mut self, observation: Observation) {
        observation.trace();
        self.events.push(observation);
    }
}
