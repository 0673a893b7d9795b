use serde::Serialize;

use crate::observe::{Observation, Observer};
use crate::{PeriodEnd, ValidationError, DEFAULT_FISCAL_TOLERANCE_DAYS};

/// Where a normalized period end came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PeriodSource {
    Vendor,
    CalendarDefault,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NormalizedPeriod {
    pub fiscal_year: i32,
    pub period_end: PeriodEnd,
    pub source: PeriodSource,
    /// Signed days between the chosen end and December 31st of the fiscal year.
    pub deviation_days: i64,
}

/// Turns (fiscal year, vendor hint) into one concrete period end date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FiscalCalendar {
    mismatch_tolerance_days: i64,
}

impl Default for FiscalCalendar {
    fn default() -> Self {
        Self::new(DEFAULT_FISCAL_TOLERANCE_DAYS)
    }
}

impl FiscalCalendar {
    pub fn new(mismatch_tolerance_days: u32) -> Self {
        Self {
            mismatch_tolerance_days: i64::from(mismatch_tolerance_days),
        }
    }

    /// A vendor-supplied end date always wins. Deviating from the calendar year end by more
    /// than the tolerance is observed but never rejected.
    pub fn normalize(
        &self,
        fiscal_year: i32,
        vendor_hint: Option<PeriodEnd>,
        observer: &mut dyn Observer,
    ) -> Result<NormalizedPeriod, ValidationError> {
        let calendar_default = PeriodEnd::calendar_year_end(fiscal_year)?;

        let Some(vendor_period_end) = vendor_hint else {
            return Ok(NormalizedPeriod {
                fiscal_year,
                period_end: calendar_default,
                source: PeriodSource::CalendarDefault,
                deviation_days: 0,
            });
        };

        let deviation_days = vendor_period_end.days_since(calendar_default);
        if deviation_days.abs() > self.mismatch_tolerance_days {
            observer.observe(Observation::FiscalPeriodMismatch {
                fiscal_year,
                calendar_default,
                vendor_period_end,
                deviation_days,
            });
        }

        Ok(NormalizedPeriod {
            fiscal_year,
            period_end: vendor_period_end,
            source: PeriodSource::Vendor,
            deviation_days,
        })
    }
}
