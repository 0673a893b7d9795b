//! # Safe-Zone Workbook Writer
//!
//! Injects rows into named tables of an `.xlsx` template without inserting or deleting
//! physical rows. Only the table reference is resized, within the row budget the template
//! pre-authored (its safe zone).
//!
//! | Part | Role |
//! |------|------|
//! | `package` | zip container access and deterministic repacking |
//! | `table` | table discovery through sheet relationships, `ref` resizing |
//! | `sheet` | streaming cell merge into worksheet XML |
//! | `rows` | typed cells and header-bound row sets |
//! | `cellref` | `A1` reference arithmetic |
//!
//! All lookups and overflow checks run before anything is rewritten. A failed write
//! produces no bytes at all.

mod cellref;
mod package;
mod rows;
mod sheet;
mod table;

use std::collections::BTreeMap;
use std::fmt::Display;
use std::io::Write as _;
use std::path::Path;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Writer;
use serde::Serialize;
use tracing::debug;

pub use cellref::{column_letters, CellRange, CellRef};
pub use rows::{CellValue, RowSet, TableRecord, DATA_COLUMNS, NARRATIVE_COLUMNS};

use crate::observe::{Observation, Observer};
use crate::WriteError;
use package::Package;
use sheet::{merge_cells, CellWrites};
use table::{list_tables, resize_table_xml, TemplateTable};

/// Row-count state of one table across a write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SafeZoneTable {
    pub sheet: String,
    pub table: String,
    pub max_rows: usize,
    pub rows_before: usize,
    pub rows_after: usize,
}

/// One table to fill in a multi-table write.
#[derive(Debug, Clone, Copy)]
pub struct TableWrite<'a> {
    pub table: &'a str,
    pub rows: &'a RowSet,
    pub max_rows: usize,
    /// An absent optional table is skipped instead of failing the write.
    pub required: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenWorkbook {
    pub bytes: Vec<u8>,
    pub tables: Vec<SafeZoneTable>,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SafeZoneTableWriter;

impl SafeZoneTableWriter {
    pub fn new() -> Self {
        Self
    }

    /// Fill `table_name` with `rows`. Fails with `SafeZoneOverflow` before any mutation when
    /// `rows` exceeds `max_rows`.
    pub fn write(
        &self,
        template: &[u8],
        table_name: &str,
        rows: &RowSet,
        max_rows: usize,
        observer: &mut dyn Observer,
    ) -> Result<WrittenWorkbook, WriteError> {
        let request = TableWrite {
            table: table_name,
            rows,
            max_rows,
            required: true,
        };
        self.write_tables(template, &[request], observer)
    }

    /// Fill several tables in one pass. Either every table is written or none is.
    pub fn write_tables(
        &self,
        template: &[u8],
        writes: &[TableWrite<'_>],
        observer: &mut dyn Observer,
    ) -> Result<WrittenWorkbook, WriteError> {
        let mut package = Package::open(template)?;
        let tables = list_tables(&mut package)?;

        let mut plans: Vec<(&TemplateTable, &TableWrite<'_>, Vec<u32>, CellRange)> =
            Vec::with_capacity(writes.len());
        for request in writes {
            let Some(found) = tables
                .iter()
                .find(|table| table.definition.matches(request.table))
            else {
                if request.required {
                    return Err(WriteError::TableNotFound {
                        name: request.table.to_owned(),
                    });
                }
                debug!(table = request.table, "optional table not in template, skipped");
                continue;
            };

            let needed_rows = request.rows.len();
            if needed_rows > request.max_rows {
                observer.observe(Observation::SafeZoneOverflow {
                    table: request.table.to_owned(),
                    needed_rows,
                    max_rows: request.max_rows,
                });
                return Err(WriteError::SafeZoneOverflow {
                    table: request.table.to_owned(),
                    needed_rows,
                    max_rows: request.max_rows,
                });
            }

            let columns = request
                .rows
                .columns()
                .iter()
                .map(|header| {
                    found
                        .definition
                        .column_for(header)
                        .ok_or_else(|| WriteError::ColumnNotFound {
                            table: request.table.to_owned(),
                            header: header.clone(),
                        })
                })
                .collect::<Result<Vec<_>, _>>()?;

            if plans
                .iter()
                .any(|(planned, _, _, _)| planned.table_part == found.table_part)
            {
                return Err(WriteError::Template(format!(
                    "table '{}' requested more than once",
                    request.table
                )));
            }
            let range = found.definition.resized_range(needed_rows)?;
            plans.push((found, request, columns, range));
        }

        let mut replacements = BTreeMap::new();
        let mut sheet_writes: BTreeMap<&str, CellWrites> = BTreeMap::new();
        let mut summaries = Vec::with_capacity(plans.len());
        for (found, request, columns, range) in plans {
            let definition = &found.definition;
            replacements.insert(
                found.table_part.clone(),
                resize_table_xml(&found.xml, definition, range)?,
            );

            let cells = sheet_writes.entry(found.sheet_part.as_str()).or_default();
            let mut row_number = definition.first_data_row();
            for row in request.rows.rows() {
                let target = cells.entry(row_number).or_default();
                for (value, column) in row.iter().zip(&columns) {
                    target.insert(*column, value.clone());
                }
                row_number += 1;
            }

            summaries.push(SafeZoneTable {
                sheet: found.sheet_name.clone(),
                table: definition.name.clone(),
                max_rows: request.max_rows,
                rows_before: definition.data_rows(),
                rows_after: (range.height() - definition.header_rows) as usize,
            });
        }

        for (sheet_part, cells) in sheet_writes {
            let xml = package.require_part(sheet_part)?;
            replacements.insert(sheet_part.to_owned(), merge_cells(&xml, &cells)?);
        }
        let bytes = package.repack(&replacements)?;

        for table in &summaries {
            observer.observe(Observation::TableResized {
                table: table.table.clone(),
                old_rows: table.rows_before,
                new_rows: table.rows_after,
            });
        }
        Ok(WrittenWorkbook {
            bytes,
            tables: summaries,
        })
    }
}

/// Write `bytes` next to `path` and rename into place; a failure leaves no file at `path`.
pub fn persist(path: &Path, bytes: &[u8]) -> Result<(), WriteError> {
    let persist_error = |source: std::io::Error| WriteError::Persist {
        path: path.to_path_buf(),
        source,
    };
    let Some(file_name) = path.file_name() else {
        return Err(persist_error(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "output path has no file name",
        )));
    };

    let directory = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    // The staging file is removed on drop, so any failure below leaves nothing behind.
    let mut staging = tempfile::Builder::new()
        .prefix(&format!(".{}.", file_name.to_string_lossy()))
        .suffix(".partial")
        .tempfile_in(directory)
        .map_err(persist_error)?;
    staging.write_all(bytes).map_err(persist_error)?;
    staging.flush().map_err(persist_error)?;
    staging
        .persist(path)
        .map_err(|failure| persist_error(failure.error))?;
    Ok(())
}

pub(crate) fn xml_error<E: Display>(err: E) -> WriteError {
    WriteError::Xml(err.to_string())
}

pub(crate) fn emit(writer: &mut Writer<Vec<u8>>, event: &Event<'_>) -> Result<(), WriteError> {
    writer.write_event(event).map_err(xml_error)
}

/// Unescaped value of the attribute whose local name is `name`.
pub(crate) fn attribute(
    element: &BytesStart<'_>,
    name: &[u8],
) -> Result<Option<String>, WriteError> {
    for attr in element.attributes() {
        let attr = attr.map_err(xml_error)?;
        if attr.key.local_name().as_ref() == name {
            return Ok(Some(attr.unescape_value().map_err(xml_error)?.into_owned()));
        }
    }
    Ok(None)
}

/// Copy of `element` with attribute `name` set to `value`, other attributes in place.
pub(crate) fn replace_attribute(
    element: &BytesStart<'_>,
    name: &str,
    value: &str,
) -> Result<BytesStart<'static>, WriteError> {
    let mut updated = element.clone().into_owned();
    updated.clear_attributes();
    let mut replaced = false;
    for attr in element.attributes() {
        let attr = attr.map_err(xml_error)?;
        if attr.key.as_ref() == name.as_bytes() {
            updated.push_attribute((name, value));
            replaced = true;
        } else {
            updated.push_attribute(attr);
        }
    }
    if !replaced {
        updated.push_attribute((name, value));
    }
    Ok(updated)
}
