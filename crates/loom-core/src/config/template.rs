use std::collections::HashSet;
use std::path::Path;

use serde::Deserialize;

use super::read_document;
use crate::ConfigError;

const TEMPLATE_SPEC_VERSION: u32 = 1;

/// Name of the data feed table every template must provide.
pub const DATA_TABLE: &str = "tbl_data";
/// Name of the optional narrative table.
pub const NARRATIVE_TABLE: &str = "tbl_narrative";

/// Safe zone declared for one named table: how many data rows the template pre-authored.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SafeZoneSpec {
    pub name: String,
    pub max_rows: usize,
    #[serde(default = "default_required")]
    pub required: bool,
}

fn default_required() -> bool {
    true
}

/// Table layout contract accompanying a spreadsheet template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateSpec {
    tables: Vec<SafeZoneSpec>,
}

impl TemplateSpec {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        Self::from_yaml_str(&read_document(path)?)
    }

    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        let raw: RawTemplateSpec =
            serde_yaml::from_str(text).map_err(|source| ConfigError::Parse {
                document: "template spec",
                source,
            })?;

        if raw.version != TEMPLATE_SPEC_VERSION {
            return Err(ConfigError::UnsupportedVersion {
                document: "template spec",
                found: raw.version,
                expected: TEMPLATE_SPEC_VERSION,
            });
        }

        Self::new(raw.tables)
    }

    pub fn new(tables: Vec<SafeZoneSpec>) -> Result<Self, ConfigError> {
        let mut seen = HashSet::new();
        for table in &tables {
            if !seen.insert(table.name.as_str()) {
                return Err(ConfigError::DuplicateTable {
                    name: table.name.clone(),
                });
            }
            if table.max_rows == 0 {
                return Err(ConfigError::InvalidSafeZone {
                    name: table.name.clone(),
                });
            }
        }

        if !seen.contains(DATA_TABLE) {
            return Err(ConfigError::MissingDataTable {
                name: DATA_TABLE.to_owned(),
            });
        }

        Ok(Self { tables })
    }

    pub fn table(&self, name: &str) -> Option<&SafeZoneSpec> {
        self.tables.iter().find(|table| table.name == name)
    }

    pub fn data_table(&self) -> &SafeZoneSpec {
        self.table(DATA_TABLE)
            .expect("constructor guarantees the data table is declared")
    }

    pub fn narrative_table(&self) -> Option<&SafeZoneSpec> {
        self.table(NARRATIVE_TABLE)
    }

    pub fn tables(&self) -> &[SafeZoneSpec] {
        &self.tables
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawTemplateSpec {
    version: u32,
    tables: Vec<SafeZoneSpec>,
}
