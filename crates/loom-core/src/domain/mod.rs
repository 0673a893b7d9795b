//! # Domain Models
//!
//! IO-free value objects shared by every pipeline stage.
//!
//! All types validate their invariants at construction and serialize with serde.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Ticker`] | Canonical report ticker |
//! | [`Vendor`] | Upstream data vendor |
//! | [`Strategy`] | Report strategy (operating, insurance) |
//! | [`MetricKey`] | Catalog metric name |
//! | [`MetricKind`] | Metric value semantics |
//! | [`PeriodEnd`] | Concrete fiscal period end date |
//! | [`FinancialRecord`] | Validated, exact-decimal metric value with provenance |
//! | [`NarrativeEntry`] | Narrative table row |

mod metric;
mod models;
mod period;
mod strategy;
mod ticker;
mod vendor;

pub use metric::{MetricKey, MetricKind};
pub use models::{FinancialRecord, NarrativeEntry, Provenance};
pub use period::PeriodEnd;
pub use strategy::Strategy;
pub use ticker::Ticker;
pub use vendor::Vendor;
