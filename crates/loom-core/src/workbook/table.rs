use quick_xml::events::Event;
use quick_xml::{Reader, Writer};

use super::cellref::{CellRange, CellRef, MAX_ROW};
use super::package::{rels_part_for, resolve_target, Package};
use super::{attribute, emit, replace_attribute, xml_error};
use crate::WriteError;

const DEFAULT_WORKBOOK_PART: &str = "xl/workbook.xml";

/// Parsed `xl/tables/tableN.xml` definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct TableDefinition {
    pub name: String,
    pub display_name: String,
    pub range: CellRange,
    pub header_rows: u32,
    pub columns: Vec<String>,
}

impl TableDefinition {
    pub fn matches(&self, name: &str) -> bool {
        self.name == name || self.display_name == name
    }

    pub fn data_rows(&self) -> usize {
        self.range.height().saturating_sub(self.header_rows) as usize
    }

    pub fn first_data_row(&self) -> u32 {
        self.range.start.row + self.header_rows
    }

    /// Absolute sheet column for a header, matched on trimmed text.
    pub fn column_for(&self, header: &str) -> Option<u32> {
        let header = header.trim();
        self.columns
            .iter()
            .position(|column| column.trim() == header)
            .map(|offset| self.range.start.column + offset as u32)
    }

    /// Full table reference covering the header plus `data_rows` (at least one).
    pub fn resized_range(&self, data_rows: usize) -> Result<CellRange, WriteError> {
        let last_row = u64::from(self.first_data_row())
            .saturating_add(data_rows.max(1) as u64)
            - 1;
        if last_row > u64::from(MAX_ROW) {
            return Err(WriteError::Template(format!(
                "table '{}' cannot hold {data_rows} rows: row {last_row} is past the last sheet row {MAX_ROW}",
                self.name
            )));
        }
        let height = last_row - u64::from(self.range.start.row) + 1;
        Ok(self.range.with_height(height as u32))
    }
}

/// A table found in the template together with the parts that own it.
#[derive(Debug, Clone)]
pub(crate) struct TemplateTable {
    pub sheet_name: String,
    pub sheet_part: String,
    pub table_part: String,
    pub xml: String,
    pub definition: TableDefinition,
}

/// Every table in the package, in workbook sheet order.
pub(crate) fn list_tables(package: &mut Package<'_>) -> Result<Vec<TemplateTable>, WriteError> {
    let workbook_part = package
        .read_part("_rels/.rels")?
        .map(|xml| parse_relationships(&xml))
        .transpose()?
        .and_then(|rels| {
            rels.into_iter()
                .find(|rel| rel.rel_type.ends_with("/officeDocument"))
                .map(|rel| resolve_target("", &rel.target))
        })
        .unwrap_or_else(|| DEFAULT_WORKBOOK_PART.to_owned());

    let workbook_xml = package.require_part(&workbook_part)?;
    let workbook_rels = parse_relationships(&package.require_part(&rels_part_for(&workbook_part))?)?;

    let mut tables = Vec::new();
    for (sheet_name, relationship_id) in parse_sheets(&workbook_xml)? {
        let Some(sheet_rel) = workbook_rels.iter().find(|rel| rel.id == relationship_id) else {
            return Err(WriteError::Template(format!(
                "sheet '{sheet_name}' references unknown relationship '{relationship_id}'"
            )));
        };
        let sheet_part = resolve_target(&workbook_part, &sheet_rel.target);

        let Some(sheet_rels) = package.read_part(&rels_part_for(&sheet_part))? else {
            continue;
        };
        for rel in parse_relationships(&sheet_rels)? {
            if !rel.rel_type.ends_with("/table") {
                continue;
            }
            let table_part = resolve_target(&sheet_part, &rel.target);
            let xml = package.require_part(&table_part)?;
            let definition = parse_table(&xml)?;
            tables.push(TemplateTable {
                sheet_name: sheet_name.clone(),
                sheet_part: sheet_part.clone(),
                table_part,
                xml,
                definition,
            });
        }
    }
    Ok(tables)
}

#[derive(Debug)]
struct Relationship {
    id: String,
    rel_type: String,
    target: String,
}

fn parse_relationships(xml: &str) -> Result<Vec<Relationship>, WriteError> {
    let mut reader = Reader::from_str(xml);
    let mut relationships = Vec::new();
    loop {
        match reader.read_event().map_err(xml_error)? {
            Event::Start(element) | Event::Empty(element)
                if element.local_name().as_ref() == b"Relationship" =>
            {
                if attribute(&element, b"TargetMode")?.as_deref() == Some("External") {
                    continue;
                }
                let (Some(id), Some(rel_type), Some(target)) = (
                    attribute(&element, b"Id")?,
                    attribute(&element, b"Type")?,
                    attribute(&element, b"Target")?,
                ) else {
                    return Err(WriteError::Template(String::from(
                        "relationship is missing Id, Type, or Target",
                    )));
                };
                relationships.push(Relationship {
                    id,
                    rel_type,
                    target,
                });
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(relationships)
}

/// `(sheet name, relationship id)` pairs from `workbook.xml`.
fn parse_sheets(xml: &str) -> Result<Vec<(String, String)>, WriteError> {
    let mut reader = Reader::from_str(xml);
    let mut sheets = Vec::new();
    loop {
        match reader.read_event().map_err(xml_error)? {
            Event::Start(element) | Event::Empty(element)
                if element.local_name().as_ref() == b"sheet" =>
            {
                // `r:id` is the only attribute on <sheet> whose local name is `id`.
                let (Some(name), Some(id)) =
                    (attribute(&element, b"name")?, attribute(&element, b"id")?)
                else {
                    return Err(WriteError::Template(String::from(
                        "workbook sheet entry is missing name or r:id",
                    )));
                };
                sheets.push((name, id));
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(sheets)
}

pub(crate) fn parse_table(xml: &str) -> Result<TableDefinition, WriteError> {
    let mut reader = Reader::from_str(xml);
    let mut header = None;
    let mut columns = Vec::new();

    loop {
        match reader.read_event().map_err(xml_error)? {
            Event::Start(element) | Event::Empty(element) => match element.local_name().as_ref()
            {
                b"table" => {
                    let name = attribute(&element, b"name")?.unwrap_or_default();
                    let display_name =
                        attribute(&element, b"displayName")?.unwrap_or_else(|| name.clone());
                    let reference = attribute(&element, b"ref")?.ok_or_else(|| {
                        WriteError::Template(format!("table '{name}' has no ref"))
                    })?;
                    let header_rows = count_attribute(&element, b"headerRowCount", 1)?;
                    let totals_rows = count_attribute(&element, b"totalsRowCount", 0)?;

                    if header_rows == 0 {
                        return Err(WriteError::Template(format!(
                            "table '{name}' has no header row; columns cannot be bound"
                        )));
                    }
                    if totals_rows > 0 {
                        return Err(WriteError::Template(format!(
                            "table '{name}' has a totals row, which cannot be resized safely"
                        )));
                    }
                    header = Some((name, display_name, CellRange::parse(&reference)?, header_rows));
                }
                b"tableColumn" => {
                    columns.push(attribute(&element, b"name")?.unwrap_or_default());
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    let Some((name, display_name, range, header_rows)) = header else {
        return Err(WriteError::Template(String::from(
            "table part has no <table> element",
        )));
    };
    if columns.len() != range.width() as usize {
        return Err(WriteError::Template(format!(
            "table '{name}' declares {} columns but its ref {range} spans {}",
            columns.len(),
            range.width()
        )));
    }

    Ok(TableDefinition {
        name,
        display_name,
        range,
        header_rows,
        columns,
    })
}

fn count_attribute(
    element: &quick_xml::events::BytesStart<'_>,
    name: &[u8],
    default: u32,
) -> Result<u32, WriteError> {
    match attribute(element, name)? {
        None => Ok(default),
        Some(raw) => raw.trim().parse::<u32>().map_err(|_| {
            WriteError::Template(format!(
                "table attribute {} is not a count: '{raw}'",
                String::from_utf8_lossy(name)
            ))
        }),
    }
}

/// Rewrite the table part so its reference, auto filter, and sort state cover `range`.
pub(crate) fn resize_table_xml(
    xml: &str,
    definition: &TableDefinition,
    range: CellRange,
) -> Result<Vec<u8>, WriteError> {
    let data_top = definition.first_data_row();
    let data_range = CellRange {
        start: CellRef::new(range.start.column, data_top),
        end: range.end,
    };

    let mut reader = Reader::from_str(xml);
    let mut writer = Writer::new(Vec::with_capacity(xml.len() + 32));
    loop {
        let event = reader.read_event().map_err(xml_error)?;
        let replacement = match &event {
            Event::Start(element) | Event::Empty(element) => {
                match element.local_name().as_ref() {
                    b"table" | b"autoFilter" => {
                        Some(replace_attribute(element, "ref", &range.to_string())?)
                    }
                    b"sortState" => {
                        Some(replace_attribute(element, "ref", &data_range.to_string())?)
                    }
                    b"sortCondition" => match attribute(element, b"ref")? {
                        Some(raw) => {
                            let condition = CellRange::parse(&raw)?;
                            let rebound = CellRange {
                                start: CellRef::new(condition.start.column, data_top),
                                end: CellRef::new(condition.end.column, range.end.row),
                            };
                            Some(replace_attribute(element, "ref", &rebound.to_string())?)
                        }
                        None => None,
                    },
                    _ => None,
                }
            }
            Event::Eof => break,
            _ => None,
        };

        match (replacement, &event) {
            (Some(element), Event::Start(_)) => emit(&mut writer, &Event::Start(element))?,
            (Some(element), _) => emit(&mut writer, &Event::Empty(element))?,
            (None, _) => emit(&mut writer, &event)?,
        }
    }
    Ok(writer.into_inner())
}
