use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ValidationError;

/// Report strategy. Selects which catalog policies apply and which template is filled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    Operating,
    Insurance,
}

impl Strategy {
    pub const ALL: [Self; 2] = [Self::Operating, Self::Insurance];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Operating => "operating",
            Self::Insurance => "insurance",
        }
    }
}

impl Display for Strategy {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Strategy {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "operating" => Ok(Self::Operating),
            "insurance" => Ok(Self::Insurance),
            other => Err(ValidationError::InvalidStrategy {
                value: other.to_owned(),
            }),
        }
    }
}
