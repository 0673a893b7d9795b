//! Shared fixtures: configuration documents and synthesized `.xlsx` templates.

#![allow(dead_code)]

use std::io::{Cursor, Read, Write};

use loom_core::workbook::{column_letters, DATA_COLUMNS, NARRATIVE_COLUMNS};
use loom_core::{ConfigBundle, MappingConfig, MetricsCatalog, TemplateSpec};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

pub const CATALOG: &str = r#"
version: 1
metrics:
  - key: revenue
    unit: USD
    kind: currency
    policies:
      - { strategy: operating, policy: required }
      - { strategy: insurance, policy: warn_if_missing }
    constraints: { min: 0, allow_negative: false }
  - key: net_income
    unit: USD
    kind: currency
    policies:
      - { strategy: operating, from_year: 2020, policy: warn_if_missing }
  - key: gross_margin
    unit: ratio
    kind: ratio
    constraints: { ratio_bounds: [-1, 1] }
  - key: combined_ratio
    unit: ratio
    kind: ratio
    policies:
      - { strategy: insurance, policy: required }
    constraints: { ratio_bounds: [0, 2], allow_negative: false }
"#;

pub const MAPPING: &str = r#"
version: 1
mappings:
  revenue:
    fmp: [revenue, totalRevenue]
    sec: [Revenues, RevenueFromContractWithCustomerExcludingAssessedTax]
  net_income:
    fmp: [netIncome]
    sec: [NetIncomeLoss]
  gross_margin:
    fmp: [grossProfitRatio]
  combined_ratio:
    sec: [CombinedRatio]
"#;

pub const TEMPLATE_SPEC: &str = r#"
version: 1
tables:
  - { name: tbl_data, max_rows: 40 }
  - { name: tbl_narrative, max_rows: 12, required: false }
"#;

pub fn bundle() -> ConfigBundle {
    bundle_with(TEMPLATE_SPEC)
}

pub fn bundle_with(template_spec: &str) -> ConfigBundle {
    let catalog = MetricsCatalog::from_yaml_str(CATALOG).expect("catalog fixture");
    let mapping = MappingConfig::from_yaml_str(MAPPING, &catalog).expect("mapping fixture");
    let template = TemplateSpec::from_yaml_str(template_spec).expect("template spec fixture");
    ConfigBundle::new(catalog, mapping, template).expect("consistent fixtures")
}

/// Rows the synthesized templates pre-format below each table header.
pub const SAFE_ZONE_ROWS: u32 = 40;

/// Builds a minimal but well-formed workbook with a data sheet and an optional narrative sheet.
#[derive(Debug, Clone)]
pub struct TemplateBuilder {
    data_headers: Vec<String>,
    data_rows: u32,
    narrative_rows: Option<u32>,
}

impl Default for TemplateBuilder {
    fn default() -> Self {
        Self {
            data_headers: DATA_COLUMNS.iter().map(|h| (*h).to_owned()).collect(),
            data_rows: 1,
            narrative_rows: None,
        }
    }
}

impl TemplateBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Data rows currently covered by the data table reference.
    pub fn data_rows(mut self, rows: u32) -> Self {
        self.data_rows = rows;
        self
    }

    pub fn data_headers(mut self, headers: &[&str]) -> Self {
        self.data_headers = headers.iter().map(|h| (*h).to_owned()).collect();
        self
    }

    pub fn with_narrative(mut self, rows: u32) -> Self {
        self.narrative_rows = Some(rows);
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut parts = vec![
            ("[Content_Types].xml".to_owned(), self.content_types()),
            ("_rels/.rels".to_owned(), ROOT_RELS.to_owned()),
            ("xl/workbook.xml".to_owned(), self.workbook()),
            ("xl/_rels/workbook.xml.rels".to_owned(), self.workbook_rels()),
            ("xl/styles.xml".to_owned(), STYLES.to_owned()),
            (
                "xl/worksheets/sheet1.xml".to_owned(),
                sheet(&self.data_headers, true),
            ),
            (
                "xl/worksheets/_rels/sheet1.xml.rels".to_owned(),
                sheet_rels("table1.xml"),
            ),
            (
                "xl/tables/table1.xml".to_owned(),
                table(1, "tbl_data", &self.data_headers, self.data_rows),
            ),
        ];

        if let Some(rows) = self.narrative_rows {
            let headers = NARRATIVE_COLUMNS
                .iter()
                .map(|h| (*h).to_owned())
                .collect::<Vec<_>>();
            parts.push(("xl/worksheets/sheet2.xml".to_owned(), sheet(&headers, false)));
            parts.push((
                "xl/worksheets/_rels/sheet2.xml.rels".to_owned(),
                sheet_rels("table2.xml"),
            ));
            parts.push((
                "xl/tables/table2.xml".to_owned(),
                table(2, "tbl_narrative", &headers, rows),
            ));
        }

        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, content) in parts {
            let options = FileOptions::default().compression_method(CompressionMethod::Deflated);
            writer.start_file(name, options).expect("zip entry");
            writer.write_all(content.as_bytes()).expect("zip write");
        }
        writer.finish().expect("zip finish").into_inner()
    }

    fn content_types(&self) -> String {
        let mut overrides = String::from(
            r#"<Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/><Override PartName="/xl/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml"/><Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/><Override PartName="/xl/tables/table1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.table+xml"/>"#,
        );
        if self.narrative_rows.is_some() {
            overrides.push_str(
                r#"<Override PartName="/xl/worksheets/sheet2.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/><Override PartName="/xl/tables/table2.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.table+xml"/>"#,
            );
        }
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/>{overrides}</Types>"#
        )
    }

    fn workbook(&self) -> String {
        let narrative = if self.narrative_rows.is_some() {
            r#"<sheet name="Narrative" sheetId="2" r:id="rId2"/>"#
        } else {
            ""
        };
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets><sheet name="Data" sheetId="1" r:id="rId1"/>{narrative}</sheets></workbook>"#
        )
    }

    fn workbook_rels(&self) -> String {
        let narrative = if self.narrative_rows.is_some() {
            r#"<Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet2.xml"/>"#
        } else {
            ""
        };
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/>{narrative}<Relationship Id="rId9" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/></Relationships>"#
        )
    }
}

const ROOT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/></Relationships>"#;

const STYLES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><numFmts count="1"><numFmt numFmtId="164" formatCode="yyyy-mm-dd"/></numFmts><fonts count="1"><font><sz val="11"/><name val="Calibri"/></font></fonts><fills count="1"><fill><patternFill patternType="none"/></fill></fills><borders count="1"><border/></borders><cellStyleXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0"/></cellStyleXfs><cellXfs count="3"><xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0"/><xf numFmtId="4" fontId="0" fillId="0" borderId="0" xfId="0" applyNumberFormat="1"/><xf numFmtId="164" fontId="0" fillId="0" borderId="0" xfId="0" applyNumberFormat="1"/></cellXfs></styleSheet>"#;

fn sheet_rels(table_file: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/table" Target="../tables/{table_file}"/></Relationships>"#
    )
}

/// Header row, then `SAFE_ZONE_ROWS` pre-styled empty rows. The data sheet also carries a
/// formula cell to the right of the table.
fn sheet(headers: &[String], with_formula: bool) -> String {
    let last_column = column_letters(headers.len() as u32);
    let last_row = SAFE_ZONE_ROWS + 1;

    let mut rows = String::from(r#"<row r="1">"#);
    for (index, header) in headers.iter().enumerate() {
        let reference = format!("{}1", column_letters(index as u32 + 1));
        rows.push_str(&format!(
            r#"<c r="{reference}" t="inlineStr"><is><t>{header}</t></is></c>"#
        ));
    }
    if with_formula {
        rows.push_str(r#"<c r="J1"><f>COUNTA(A:A)-1</f><v>0</v></c>"#);
    }
    rows.push_str("</row>");

    for row in 2..=last_row {
        rows.push_str(&format!(r#"<row r="{row}">"#));
        for index in 0..headers.len() {
            let letters = column_letters(index as u32 + 1);
            let style = if headers[index] == "Period End" { 2 } else { 1 };
            rows.push_str(&format!(r#"<c r="{letters}{row}" s="{style}"/>"#));
        }
        rows.push_str("</row>");
    }

    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><dimension ref="A1:{last_column}{last_row}"/><sheetViews><sheetView workbookViewId="0"/></sheetViews><sheetFormatPr defaultRowHeight="15"/><sheetData>{rows}</sheetData><pageMargins left="0.7" right="0.7" top="0.75" bottom="0.75" header="0.3" footer="0.3"/><tableParts count="1"><tablePart r:id="rId1"/></tableParts></worksheet>"#
    )
}

fn table(id: u32, name: &str, headers: &[String], data_rows: u32) -> String {
    let reference = format!("A1:{}{}", column_letters(headers.len() as u32), data_rows + 1);
    let columns = headers
        .iter()
        .enumerate()
        .map(|(index, header)| format!(r#"<tableColumn id="{}" name="{header}"/>"#, index + 1))
        .collect::<String>();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<table xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" id="{id}" name="{name}" displayName="{name}" ref="{reference}" totalsRowShown="0"><autoFilter ref="{reference}"/><tableColumns count="{count}">{columns}</tableColumns><tableStyleInfo name="TableStyleMedium2" showFirstColumn="0" showLastColumn="0" showRowStripes="1" showColumnStripes="0"/></table>"#,
        count = headers.len()
    )
}

// =============================================================================
// Readers
// =============================================================================

pub fn read_part(workbook: &[u8], name: &str) -> String {
    let mut archive = ZipArchive::new(Cursor::new(workbook)).expect("valid zip");
    let mut file = archive.by_name(name).expect("part exists");
    let mut text = String::new();
    file.read_to_string(&mut text).expect("utf-8 part");
    text
}

pub fn part_names(workbook: &[u8]) -> Vec<String> {
    let mut archive = ZipArchive::new(Cursor::new(workbook)).expect("valid zip");
    (0..archive.len())
        .map(|index| archive.by_index(index).expect("entry").name().to_owned())
        .collect()
}

/// Value of the first `ref="..."` attribute on the `<table>` element.
pub fn table_ref(table_xml: &str) -> String {
    let start = table_xml.find("<table ").expect("table element");
    attribute_after(&table_xml[start..], "ref")
}

pub fn autofilter_ref(table_xml: &str) -> String {
    let start = table_xml.find("<autoFilter ").expect("autoFilter element");
    attribute_after(&table_xml[start..], "ref")
}

fn attribute_after(xml: &str, name: &str) -> String {
    let marker = format!(r#" {name}=""#);
    let start = xml.find(&marker).expect("attribute present") + marker.len();
    let end = xml[start..].find('"').expect("closing quote") + start;
    xml[start..end].to_owned()
}

/// The full `<c>` element for `reference`, self-closing or not.
pub fn cell(sheet_xml: &str, reference: &str) -> Option<String> {
    let marker = format!(r#"<c r="{reference}""#);
    let start = sheet_xml.find(&marker)?;
    let rest = &sheet_xml[start..];
    let open_end = rest.find('>')?;
    if rest[..open_end].ends_with('/') {
        return Some(rest[..=open_end].to_owned());
    }
    let close = rest.find("</c>")? + "</c>".len();
    Some(rest[..close].to_owned())
}

/// Inline string text of a cell, if it holds one.
pub fn cell_text(sheet_xml: &str, reference: &str) -> Option<String> {
    let cell = cell(sheet_xml, reference)?;
    let start = cell.find("<t")?;
    let text_start = cell[start..].find('>')? + start + 1;
    let text_end = cell.find("</t>")?;
    Some(cell[text_start..text_end].to_owned())
}

/// `<v>` content of a cell, if it has one.
pub fn cell_value(sheet_xml: &str, reference: &str) -> Option<String> {
    let cell = cell(sheet_xml, reference)?;
    let start = cell.find("<v>")? + "<v>".len();
    let end = cell.find("</v>")?;
    Some(cell[start..end].to_owned())
}
