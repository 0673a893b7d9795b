use std::collections::BTreeMap;
use std::io::{Cursor, Read, Write};

use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::WriteError;

/// Read-only view of an OOXML package held in memory.
pub(crate) struct Package<'a> {
    archive: ZipArchive<Cursor<&'a [u8]>>,
}

impl<'a> Package<'a> {
    pub(crate) fn open(bytes: &'a [u8]) -> Result<Self, WriteError> {
        let archive = ZipArchive::new(Cursor::new(bytes))?;
        Ok(Self { archive })
    }

    pub(crate) fn read_part(&mut self, name: &str) -> Result<Option<String>, WriteError> {
        let mut file = match self.archive.by_name(name) {
            Ok(file) => file,
            Err(zip::result::ZipError::FileNotFound) => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let mut text = String::new();
        file.read_to_string(&mut text)?;
        Ok(Some(text))
    }

    pub(crate) fn require_part(&mut self, name: &str) -> Result<String, WriteError> {
        self.read_part(name)?
            .ok_or_else(|| WriteError::Template(format!("package part '{name}' is missing")))
    }

    /// Rebuild the archive with `replacements` substituted for their parts.
    ///
    /// Untouched entries are copied raw, rewritten entries keep their original compression
    /// method and timestamp, so equal inputs give byte-identical output.
    pub(crate) fn repack(
        mut self,
        replacements: &BTreeMap<String, Vec<u8>>,
    ) -> Result<Vec<u8>, WriteError> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));

        for index in 0..self.archive.len() {
            let file = self.archive.by_index_raw(index)?;
            let Some(content) = replacements.get(file.name()) else {
                writer.raw_copy_file(file)?;
                continue;
            };

            let compression = match file.compression() {
                CompressionMethod::Stored => CompressionMethod::Stored,
                _ => CompressionMethod::Deflated,
            };
            let options = FileOptions::default()
                .compression_method(compression)
                .last_modified_time(file.last_modified());
            let name = file.name().to_owned();
            drop(file);

            writer.start_file(name, options)?;
            writer.write_all(content)?;
        }

        Ok(writer.finish()?.into_inner())
    }
}

/// Resolve a relationship `Target` against the directory of the part that owns it.
pub(crate) fn resolve_target(base_part: &str, target: &str) -> String {
    if let Some(absolute) = target.strip_prefix('/') {
        return absolute.to_owned();
    }

    let mut segments = base_part.split('/').collect::<Vec<_>>();
    segments.pop();
    for segment in target.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    segments.join("/")
}

/// Relationship part for `part`: `xl/worksheets/sheet1.xml` -> `xl/worksheets/_rels/sheet1.xml.rels`.
pub(crate) fn rels_part_for(part: &str) -> String {
    match part.rsplit_once('/') {
        Some((dir, file)) => format!("{dir}/_rels/{file}.rels"),
        None => format!("_rels/{part}.rels"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_relative_targets() {
        assert_eq!(
            resolve_target("xl/worksheets/sheet1.xml", "../tables/table1.xml"),
            "xl/tables/table1.xml"
        );
        assert_eq!(
            resolve_target("xl/workbook.xml", "worksheets/sheet2.xml"),
            "xl/worksheets/sheet2.xml"
        );
        assert_eq!(
            resolve_target("xl/workbook.xml", "/xl/worksheets/sheet3.xml"),
            "xl/worksheets/sheet3.xml"
        );
    }

    #[test]
    fn derives_relationship_part_names() {
        assert_eq!(
            rels_part_for("xl/worksheets/sheet1.xml"),
            "xl/worksheets/_rels/sheet1.xml.rels"
        );
        assert_eq!(rels_part_for("xl/workbook.xml"), "xl/_rels/workbook.xml.rels");
    }
}
