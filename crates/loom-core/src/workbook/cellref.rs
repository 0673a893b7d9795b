use std::fmt::{Display, Formatter};

use crate::WriteError;

/// Largest column index an OOXML worksheet allows (`XFD`).
const MAX_COLUMN: u32 = 16_384;
/// Last row an OOXML worksheet allows.
pub(crate) const MAX_ROW: u32 = 1_048_576;

/// 1-based column index to letters: 1 -> `A`, 28 -> `AB`.
pub fn column_letters(mut column: u32) -> String {
    let mut letters = Vec::new();
    while column > 0 {
        let rem = (column - 1) % 26;
        letters.push(b'A' + rem as u8);
        column = (column - 1) / 26;
    }
    letters.reverse();
    String::from_utf8(letters).unwrap_or_default()
}

/// One cell address such as `C12`. Absolute markers (`$`) are accepted and dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct CellRef {
    pub row: u32,
    pub column: u32,
}

impl CellRef {
    pub fn new(column: u32, row: u32) -> Self {
        Self { row, column }
    }

    pub fn parse(input: &str) -> Result<Self, WriteError> {
        let invalid = || WriteError::Template(format!("invalid cell reference '{input}'"));
        let cleaned = input.trim().replace('$', "");
        let split = cleaned
            .find(|ch: char| ch.is_ascii_digit())
            .ok_or_else(invalid)?;
        let (letters, digits) = cleaned.split_at(split);
        if letters.is_empty() || !letters.chars().all(|ch| ch.is_ascii_alphabetic()) {
            return Err(invalid());
        }

        let mut column = 0u32;
        for ch in letters.chars() {
            let value = u32::from(ch.to_ascii_uppercase() as u8 - b'A' + 1);
            column = column
                .checked_mul(26)
                .and_then(|col| col.checked_add(value))
                .ok_or_else(invalid)?;
        }
        let row = digits.parse::<u32>().map_err(|_| invalid())?;

        if column > MAX_COLUMN || row == 0 || row > MAX_ROW {
            return Err(invalid());
        }
        Ok(Self { row, column })
    }
}

impl Display for CellRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", column_letters(self.column), self.row)
    }
}

/// Rectangular range such as `A1:G41`, normalized so `start` is the top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellRange {
    pub start: CellRef,
    pub end: CellRef,
}

impl CellRange {
    pub fn parse(input: &str) -> Result<Self, WriteError> {
        let (first, second) = match input.split_once(':') {
            Some((first, second)) => (CellRef::parse(first)?, CellRef::parse(second)?),
            None => {
                let single = CellRef::parse(input)?;
                (single, single)
            }
        };
        Ok(Self {
            start: CellRef::new(first.column.min(second.column), first.row.min(second.row)),
            end: CellRef::new(first.column.max(second.column), first.row.max(second.row)),
        })
    }

    pub fn width(&self) -> u32 {
        self.end.column - self.start.column + 1
    }

    pub fn height(&self) -> u32 {
        self.end.row - self.start.row + 1
    }

    /// Same columns and top row, spanning `height` rows.
    pub fn with_height(&self, height: u32) -> Self {
        Self {
            start: self.start,
            end: CellRef::new(self.end.column, self.start.row + height.max(1) - 1),
        }
    }
}

impl Display for CellRange {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.start, self.end)
    }
}
