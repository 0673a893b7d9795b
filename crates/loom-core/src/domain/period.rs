use std::fmt::{Display, Formatter};

use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use time::macros::{date, format_description};
use time::{Date, Month};

use crate::ValidationError;

/// Day zero of the 1900 spreadsheet date system (accounts for the phantom 1900-02-29).
const SPREADSHEET_EPOCH: Date = date!(1899 - 12 - 30);

/// Concrete fiscal period end date, serialized as `YYYY-MM-DD`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PeriodEnd(Date);

impl PeriodEnd {
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        Date::parse(input.trim(), format_description!("[year]-[month]-[day]"))
            .map(Self)
            .map_err(|_| ValidationError::InvalidPeriodEnd {
                value: input.to_owned(),
            })
    }

    pub const fn from_date(value: Date) -> Self {
        Self(value)
    }

    /// December 31st of `year`, the default when a vendor gives no explicit period end.
    pub fn calendar_year_end(year: i32) -> Result<Self, ValidationError> {
        Date::from_calendar_date(year, Month::December, 31)
            .map(Self)
            .map_err(|_| ValidationError::InvalidFiscalYear { year })
    }

    pub const fn date(self) -> Date {
        self.0
    }

    pub const fn year(self) -> i32 {
        self.0.year()
    }

    /// Signed distance in days from `other` to `self`.
    pub fn days_since(self, other: Self) -> i64 {
        (self.0 - other.0).whole_days()
    }

    /// Serial day number used by spreadsheet date cells.
    pub fn spreadsheet_serial(self) -> i64 {
        (self.0 - SPREADSHEET_EPOCH).whole_days()
    }

    pub fn format_iso(self) -> String {
        format!(
            "{:04}-{:02}-{:02}",
            self.0.year(),
            u8::from(self.0.month()),
            self.0.day()
        )
    }
}

impl Display for PeriodEnd {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.format_iso())
    }
}

impl Serialize for PeriodEnd {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.format_iso())
    }
}

impl<'de> Deserialize<'de> for PeriodEnd {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        Self::parse(&value).map_err(D::Error::custom)
    }
}
