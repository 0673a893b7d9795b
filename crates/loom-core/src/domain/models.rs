use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{MetricKey, PeriodEnd, Strategy, Ticker, Vendor};

/// Where a value came from: the vendor, the raw key that supplied it, and that key's
/// candidate rank (0 = primary).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provenance {
    pub vendor: Vendor,
    pub raw_key: String,
    pub rank: usize,
}

impl Provenance {
    pub fn is_fallback(&self) -> bool {
        self.rank > 0
    }

    /// Short label used in the data table's `Source` column, e.g. `fmp:totalRevenue`.
    pub fn label(&self) -> String {
        format!("{}:{}", self.vendor, self.raw_key)
    }
}

/// Validated metric value for one ticker and fiscal year.
///
/// Only the contract validator builds these; they are read-only afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FinancialRecord {
    ticker: Ticker,
    metric: MetricKey,
    value: Decimal,
    fiscal_year: i32,
    period_end: PeriodEnd,
    unit: String,
    provenance: Option<Provenance>,
    strategy: Strategy,
}

impl FinancialRecord {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        ticker: Ticker,
        metric: MetricKey,
        value: Decimal,
        fiscal_year: i32,
        period_end: PeriodEnd,
        unit: String,
        provenance: Option<Provenance>,
        strategy: Strategy,
    ) -> Self {
        Self {
            ticker,
            metric,
            value,
            fiscal_year,
            period_end,
            unit,
            provenance,
            strategy,
        }
    }

    pub fn ticker(&self) -> &Ticker {
        &self.ticker
    }

    pub fn metric(&self) -> &MetricKey {
        &self.metric
    }

    pub fn value(&self) -> Decimal {
        self.value
    }

    pub fn fiscal_year(&self) -> i32 {
        self.fiscal_year
    }

    pub fn period_end(&self) -> PeriodEnd {
        self.period_end
    }

    pub fn unit(&self) -> &str {
        &self.unit
    }

    /// `None` when the value was supplied already in canonical form.
    pub fn provenance(&self) -> Option<&Provenance> {
        self.provenance.as_ref()
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }
}

/// One narrative paragraph destined for the optional narrative table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NarrativeEntry {
    pub ticker: Ticker,
    pub section: String,
    pub text: String,
}
