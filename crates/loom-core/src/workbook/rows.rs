use rust_decimal::Decimal;

use crate::{FinancialRecord, NarrativeEntry, PeriodEnd, WriteError};

/// Headers of the data feed table, in the order rows are produced.
pub const DATA_COLUMNS: [&str; 7] = [
    "Ticker",
    "Metric",
    "Fiscal Year",
    "Period End",
    "Value",
    "Unit",
    "Source",
];

pub const NARRATIVE_COLUMNS: [&str; 3] = ["Ticker", "Section", "Narrative"];

/// Typed value for one cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CellValue {
    Number(Decimal),
    Integer(i64),
    /// Written as a spreadsheet serial number; display format comes from the template.
    Date(PeriodEnd),
    Text(String),
    Empty,
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<Decimal> for CellValue {
    fn from(value: Decimal) -> Self {
        Self::Number(value)
    }
}

/// A row type with a fixed, named column schema.
pub trait TableRecord {
    const COLUMNS: &'static [&'static str];

    /// Cells in `COLUMNS` order.
    fn cells(&self) -> Vec<CellValue>;
}

impl TableRecord for FinancialRecord {
    const COLUMNS: &'static [&'static str] = &DATA_COLUMNS;

    fn cells(&self) -> Vec<CellValue> {
        let source = self
            .provenance()
            .map_or_else(|| String::from("direct"), |provenance| provenance.label());
        vec![
            CellValue::from(self.ticker().as_str()),
            CellValue::from(self.metric().as_str()),
            CellValue::Integer(i64::from(self.fiscal_year())),
            CellValue::Date(self.period_end()),
            CellValue::Number(self.value()),
            CellValue::from(self.unit()),
            CellValue::Text(source),
        ]
    }
}

impl TableRecord for NarrativeEntry {
    const COLUMNS: &'static [&'static str] = &NARRATIVE_COLUMNS;

    fn cells(&self) -> Vec<CellValue> {
        vec![
            CellValue::from(self.ticker.as_str()),
            CellValue::from(self.section.as_str()),
            CellValue::from(self.text.as_str()),
        ]
    }
}

/// Ordered rows bound to named columns. Cells are matched to template columns by header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowSet {
    columns: Vec<String>,
    rows: Vec<Vec<CellValue>>,
}

impl RowSet {
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    pub fn from_records<R: TableRecord>(records: &[R]) -> Self {
        Self {
            columns: R::COLUMNS.iter().map(|column| (*column).to_owned()).collect(),
            rows: records.iter().map(TableRecord::cells).collect(),
        }
    }

    pub fn push(&mut self, row: Vec<CellValue>) -> Result<(), WriteError> {
        if row.len() != self.columns.len() {
            return Err(WriteError::RowShape {
                index: self.rows.len(),
                found: row.len(),
                expected: self.columns.len(),
            });
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<CellValue>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
