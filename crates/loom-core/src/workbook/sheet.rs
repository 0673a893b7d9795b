//! Streaming merge of typed cell values into worksheet XML.
//!
//! The worksheet is copied event by event. Only `<c>` elements at addressed positions are
//! replaced, and rows or cells that do not exist yet are inserted in order. Everything else
//! (styles, formulas elsewhere, column widths, conditional formats) passes through unchanged.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::iter::Peekable;

use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use super::cellref::{CellRange, CellRef};
use super::rows::CellValue;
use super::{attribute, emit, replace_attribute, xml_error};
use crate::WriteError;

/// Row number to (column number to value).
pub(crate) type CellWrites = BTreeMap<u32, BTreeMap<u32, CellValue>>;

type PendingRows<'w> = Peekable<std::collections::btree_map::Iter<'w, u32, BTreeMap<u32, CellValue>>>;

pub(crate) fn merge_cells(xml: &str, writes: &CellWrites) -> Result<Vec<u8>, WriteError> {
    let mut reader = Reader::from_str(xml);
    let mut writer = Writer::new(Vec::with_capacity(xml.len() + writes.len() * 256));
    let mut pending = writes.iter().peekable();
    let mut in_sheet_data = false;
    let mut last_row = 0u32;

    loop {
        let event = reader.read_event().map_err(xml_error)?;
        match &event {
            Event::Eof => break,
            Event::Start(element) if element.local_name().as_ref() == b"sheetData" => {
                in_sheet_data = true;
            }
            Event::Empty(element) if element.local_name().as_ref() == b"sheetData" => {
                if pending.peek().is_some() {
                    emit(&mut writer, &Event::Start(element.borrow()))?;
                    flush_rows(&mut writer, &mut pending, u32::MAX)?;
                    emit(&mut writer, &Event::End(element.to_end()))?;
                    continue;
                }
            }
            Event::End(element) if element.local_name().as_ref() == b"sheetData" => {
                flush_rows(&mut writer, &mut pending, u32::MAX)?;
                in_sheet_data = false;
            }
            Event::Start(element) | Event::Empty(element)
                if in_sheet_data && element.local_name().as_ref() == b"row" =>
            {
                let row = match attribute(element, b"r")? {
                    Some(raw) => raw.trim().parse::<u32>().map_err(|_| {
                        WriteError::Template(format!("invalid row number '{raw}'"))
                    })?,
                    None => last_row + 1,
                };
                last_row = row;
                flush_rows(&mut writer, &mut pending, row)?;

                if let Some((_, cells)) = pending.next_if(|(target, _)| **target == row) {
                    if matches!(event, Event::Start(_)) {
                        merge_row(&mut reader, &mut writer, element, row, cells)?;
                    } else {
                        emit(&mut writer, &Event::Start(element.borrow()))?;
                        for (column, value) in cells {
                            write_cell(&mut writer, None, CellRef::new(*column, row), value)?;
                        }
                        emit(&mut writer, &Event::End(element.to_end()))?;
                    }
                    continue;
                }
            }
            Event::Start(element) | Event::Empty(element)
                if element.local_name().as_ref() == b"dimension" && !writes.is_empty() =>
            {
                let widened = widen_dimension(element, writes)?;
                let widened = if matches!(event, Event::Start(_)) {
                    Event::Start(widened)
                } else {
                    Event::Empty(widened)
                };
                emit(&mut writer, &widened)?;
                continue;
            }
            _ => {}
        }
        emit(&mut writer, &event)?;
    }

    if pending.peek().is_some() {
        return Err(WriteError::Template(String::from(
            "worksheet has no <sheetData> element",
        )));
    }
    Ok(writer.into_inner())
}

/// Write every pending row numbered below `before` as a new row.
fn flush_rows(
    writer: &mut Writer<Vec<u8>>,
    pending: &mut PendingRows<'_>,
    before: u32,
) -> Result<(), WriteError> {
    while let Some((row, cells)) = pending.next_if(|(row, _)| **row < before) {
        let number = row.to_string();
        let start = BytesStart::new("row").with_attributes([("r", number.as_str())]);
        emit(writer, &Event::Start(start))?;
        for (column, value) in cells {
            write_cell(writer, None, CellRef::new(*column, *row), value)?;
        }
        emit(writer, &Event::End(BytesEnd::new("row")))?;
    }
    Ok(())
}

fn merge_row(
    reader: &mut Reader<&[u8]>,
    writer: &mut Writer<Vec<u8>>,
    row_start: &BytesStart<'_>,
    row: u32,
    cells: &BTreeMap<u32, CellValue>,
) -> Result<(), WriteError> {
    emit(writer, &Event::Start(row_start.borrow()))?;
    let mut pending = cells.iter().peekable();
    let mut last_column = 0u32;

    loop {
        let event = reader.read_event().map_err(xml_error)?;
        match &event {
            Event::Start(element) | Event::Empty(element)
                if element.local_name().as_ref() == b"c" =>
            {
                let reference = match attribute(element, b"r")? {
                    Some(raw) => CellRef::parse(&raw)?,
                    None => CellRef::new(last_column + 1, row),
                };
                last_column = reference.column;

                while let Some((column, value)) =
                    pending.next_if(|(column, _)| **column < reference.column)
                {
                    write_cell(writer, None, CellRef::new(*column, row), value)?;
                }
                if let Some((_, value)) =
                    pending.next_if(|(column, _)| **column == reference.column)
                {
                    if matches!(event, Event::Start(_)) {
                        reader.read_to_end(element.name()).map_err(xml_error)?;
                    }
                    write_cell(writer, Some(element), reference, value)?;
                    continue;
                }
            }
            Event::End(element) if element.local_name().as_ref() == b"row" => {
                for (column, value) in pending.by_ref() {
                    write_cell(writer, None, CellRef::new(*column, row), value)?;
                }
                emit(writer, &event)?;
                return Ok(());
            }
            Event::Eof => {
                return Err(WriteError::Template(format!(
                    "worksheet ends inside row {row}"
                )))
            }
            _ => {}
        }
        emit(writer, &event)?;
    }
}

/// Emit one `<c>`. With a `template` cell, its attributes (style in particular) are kept
/// and only the reference and type change.
fn write_cell(
    writer: &mut Writer<Vec<u8>>,
    template: Option<&BytesStart<'_>>,
    reference: CellRef,
    value: &CellValue,
) -> Result<(), WriteError> {
    let reference = reference.to_string();
    let mut cell = BytesStart::new("c");
    cell.push_attribute(("r", reference.as_str()));
    if let Some(template) = template {
        for attr in template.attributes() {
            let attr = attr.map_err(xml_error)?;
            if !matches!(attr.key.as_ref(), b"r" | b"t") {
                cell.push_attribute(attr);
            }
        }
    }

    let number = match value {
        CellValue::Empty => return emit(writer, &Event::Empty(cell)),
        CellValue::Text(text) => {
            cell.push_attribute(("t", "inlineStr"));
            emit(writer, &Event::Start(cell.borrow()))?;
            emit(writer, &Event::Start(BytesStart::new("is")))?;
            let mut t = BytesStart::new("t");
            if text.trim() != text {
                t.push_attribute(("xml:space", "preserve"));
            }
            emit(writer, &Event::Start(t))?;
            emit(writer, &Event::Text(BytesText::new(&encode_cell_text(text))))?;
            emit(writer, &Event::End(BytesEnd::new("t")))?;
            emit(writer, &Event::End(BytesEnd::new("is")))?;
            return emit(writer, &Event::End(BytesEnd::new("c")));
        }
        CellValue::Number(number) => number.normalize().to_string(),
        CellValue::Integer(number) => number.to_string(),
        CellValue::Date(date) => date.spreadsheet_serial().to_string(),
    };

    emit(writer, &Event::Start(cell.borrow()))?;
    emit(writer, &Event::Start(BytesStart::new("v")))?;
    emit(writer, &Event::Text(BytesText::new(&number)))?;
    emit(writer, &Event::End(BytesEnd::new("v")))?;
    emit(writer, &Event::End(BytesEnd::new("c")))
}

/// Characters XML 1.0 cannot carry become OOXML `_xHHHH_` escapes. A literal `_xHHHH_` in
/// the source has its underscore escaped so Excel shows it as typed.
fn encode_cell_text(text: &str) -> Cow<'_, str> {
    if !text.contains("_x") && !text.chars().any(is_xml_illegal) {
        return Cow::Borrowed(text);
    }

    let mut encoded = String::with_capacity(text.len() + 8);
    for (index, ch) in text.char_indices() {
        if is_xml_illegal(ch) {
            encoded.push_str(&format!("_x{:04X}_", u32::from(ch)));
        } else if ch == '_' && is_escape_sequence(&text.as_bytes()[index..]) {
            encoded.push_str("_x005F_");
        } else {
            encoded.push(ch);
        }
    }
    Cow::Owned(encoded)
}

fn is_xml_illegal(ch: char) -> bool {
    matches!(
        ch,
        '\u{0}'..='\u{8}' | '\u{B}' | '\u{C}' | '\u{E}'..='\u{1F}' | '\u{FFFE}' | '\u{FFFF}'
    )
}

fn is_escape_sequence(bytes: &[u8]) -> bool {
    bytes.len() >= 7
        && bytes[0] == b'_'
        && bytes[1] == b'x'
        && bytes[2..6].iter().all(u8::is_ascii_hexdigit)
        && bytes[6] == b'_'
}

fn widen_dimension(
    element: &BytesStart<'_>,
    writes: &CellWrites,
) -> Result<BytesStart<'static>, WriteError> {
    let Some(current) = attribute(element, b"ref")? else {
        return Ok(element.clone().into_owned());
    };
    let current = CellRange::parse(&current)?;

    let mut widened = current;
    for (row, cells) in writes {
        for column in cells.keys() {
            widened.start.row = widened.start.row.min(*row);
            widened.end.row = widened.end.row.max(*row);
            widened.start.column = widened.start.column.min(*column);
            widened.end.column = widened.end.column.max(*column);
        }
    }
    if widened == current {
        return Ok(element.clone().into_owned());
    }
    replace_attribute(element, "ref", &widened.to_string())
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use rust_decimal::Decimal;

    use super::*;
    use crate::PeriodEnd;

    const SHEET: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><dimension ref="A1:C3"/><sheetData><row r="1"><c r="A1" t="s"><v>0</v></c><c r="B1" t="s"><v>1</v></c><c r="C1" t="s"><v>2</v></c></row><row r="2"><c r="A2" s="4"/><c r="C2" s="7"><f>B2*2</f><v>0</v></c></row><row r="3"><c r="A3" s="4"/></row></sheetData><pageMargins left="0.7" right="0.7" top="0.75" bottom="0.75" header="0.3" footer="0.3"/></worksheet>"#;

    fn writes(entries: &[(u32, u32, CellValue)]) -> CellWrites {
        let mut writes = CellWrites::new();
        for (row, column, value) in entries {
            writes
                .entry(*row)
                .or_default()
                .insert(*column, value.clone());
        }
        writes
    }

    fn merge(entries: &[(u32, u32, CellValue)]) -> String {
        String::from_utf8(merge_cells(SHEET, &writes(entries)).expect("merged")).expect("utf-8")
    }

    #[test]
    fn replaces_cells_and_keeps_style() {
        let text = merge(&[
            (2, 1, CellValue::from("AAPL")),
            (2, 3, CellValue::Number(Decimal::from_str("1000000.00").expect("decimal"))),
        ]);

        assert!(text.contains(r#"<c r="A2" s="4" t="inlineStr"><is><t>AAPL</t></is></c>"#));
        assert!(text.contains(r#"<c r="C2" s="7"><v>1000000</v></c>"#));
        assert!(!text.contains("<f>B2*2</f>"));
        assert!(text.contains(r#"<c r="A1" t="s"><v>0</v></c>"#));
        assert!(text.contains("<pageMargins"));
    }

    #[test]
    fn control_characters_are_written_as_escapes() {
        let text = merge(&[
            (2, 1, CellValue::from("bell\u{7}tab\tend")),
            (3, 1, CellValue::from("literal _x0041_ stays")),
        ]);

        assert!(text.contains("<t>bell_x0007_tab\tend</t>"));
        assert!(text.contains("<t>literal _x005F_x0041_ stays</t>"));
        assert!(!text.contains('\u{7}'));
    }

    #[test]
    fn inserts_missing_cells_and_rows_in_order() {
        let text = merge(&[
            (2, 2, CellValue::Integer(2023)),
            (
                5,
                1,
                CellValue::Date(PeriodEnd::parse("2023-12-31").expect("date")),
            ),
        ]);

        assert!(text.contains(r#"<c r="A2" s="4"/><c r="B2"><v>2023</v></c><c r="C2" s="7">"#));
        assert!(text.contains(r#"</row><row r="5"><c r="A5"><v>45291</v></c></row></sheetData>"#));
        assert!(text.contains(r#"<dimension ref="A1:C5"/>"#));
    }

    #[test]
    fn fills_rows_between_existing_ones_and_self_closing_rows() {
        let sheet = SHEET.replace(r#"<row r="3"><c r="A3" s="4"/></row>"#, r#"<row r="4" spans="1:3"/>"#);
        let merged = merge_cells(
            &sheet,
            &writes(&[
                (3, 1, CellValue::from("gap")),
                (4, 2, CellValue::Empty),
            ]),
        )
        .expect("merged");
        let text = String::from_utf8(merged).expect("utf-8");

        assert!(text.contains(r#"<row r="3"><c r="A3" t="inlineStr"><is><t>gap</t></is></c></row>"#));
        assert!(text.contains(r#"<row r="4" spans="1:3"><c r="B4"/></row>"#));
    }

    #[test]
    fn populates_empty_sheet_data() {
        let sheet = SHEET
            .split("<sheetData>")
            .next()
            .map(|head| format!("{head}<sheetData/></worksheet>"))
            .expect("head");
        let merged = merge_cells(&sheet, &writes(&[(2, 1, CellValue::from(" padded "))]))
            .expect("merged");
        let text = String::from_utf8(merged).expect("utf-8");

        assert!(text.contains(
            r#"<sheetData><row r="2"><c r="A2" t="inlineStr"><is><t xml:space="preserve"> padded </t></is></c></row></sheetData>"#
        ));
    }

    #[test]
    fn untouched_sheet_round_trips_verbatim() {
        let merged = merge_cells(SHEET, &CellWrites::new()).expect("merged");
        assert_eq!(String::from_utf8(merged).expect("utf-8"), SHEET);
    }
}
