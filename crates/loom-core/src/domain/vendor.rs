use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ValidationError;

/// Upstream data vendors whose payload keys are mapped onto catalog metrics.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Vendor {
    Fmp,
    Sec,
    Yahoo,
}

impl Vendor {
    pub const ALL: [Self; 3] = [Self::Fmp, Self::Sec, Self::Yahoo];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Fmp => "fmp",
            Self::Sec => "sec",
            Self::Yahoo => "yahoo",
        }
    }
}

impl Display for Vendor {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Vendor {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "fmp" => Ok(Self::Fmp),
            "sec" => Ok(Self::Sec),
            "yahoo" => Ok(Self::Yahoo),
            other => Err(ValidationError::InvalidVendor {
                value: other.to_owned(),
            }),
        }
    }
}
