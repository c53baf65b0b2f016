//! Part access on the zip container of an xlsx package.

use crate::error::RoiSheetError;
use crate::helpers::xml::XmlReader;
use crate::spreadsheet::SpreadsheetError;
use std::io::BufReader;
use std::io::Read;
use std::io::Seek;
use zip::read::ZipFile;
use zip::ZipArchive;

pub(crate) type PartReader<'a, R> = XmlReader<BufReader<ZipFile<'a, R>>>;

/// XML part lookup on a package. Part names match regardless of ASCII case
/// and of `\` or `/` separators, as some writers differ on both.
pub(crate) trait PackageParts<R: Read + Seek> {
    /// Stored name of the part `name`, if the package has it.
    fn part_name(&self, name: &str) -> Option<String>;

    /// Reader over a part that may be absent, like the shared string table.
    fn optional_part(&mut self, name: &str) -> Result<Option<PartReader<'_, R>>, RoiSheetError>;

    /// Reader over a part the package must contain.
    fn required_part(&mut self, name: &str) -> Result<PartReader<'_, R>, RoiSheetError> {
        match self.optional_part(name)? {
            Some(reader) => Ok(reader),
            None => Err(SpreadsheetError::FileError(name.to_owned()).into()),
        }
    }
}

impl<R: Read + Seek> PackageParts<R> for ZipArchive<R> {
    fn part_name(&self, name: &str) -> Option<String> {
        let wanted = name.replace('\\', "/");
        self.file_names()
            .find(|stored| stored.replace('\\', "/").eq_ignore_ascii_case(&wanted))
            .map(str::to_owned)
    }

    fn optional_part(&mut self, name: &str) -> Result<Option<PartReader<'_, R>>, RoiSheetError> {
        let Some(stored) = self.part_name(name) else {
            return Ok(None);
        };
        let file = self.by_name(&stored)?;
        Ok(Some(XmlReader::new(&stored, BufReader::new(file))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::io::Write;
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    fn archive() -> ZipArchive<Cursor<Vec<u8>>> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        writer.start_file("xl/workbook.xml", SimpleFileOptions::default()).unwrap();
        writer.write_all(b"<workbook/>").unwrap();
        let cursor = writer.finish().unwrap();
        ZipArchive::new(cursor).unwrap()
    }

    #[test]
    fn part_lookup_ignores_case_and_separator() {
        let zip = archive();
        assert_eq!(zip.part_name("XL\\Workbook.xml").as_deref(), Some("xl/workbook.xml"));
        assert_eq!(zip.part_name("xl/styles.xml"), None);
    }

    #[test]
    fn optional_part_may_be_missing() {
        let mut zip = archive();
        assert!(zip.optional_part("xl/sharedStrings.xml").unwrap().is_none());
        assert!(zip.optional_part("xl/workbook.xml").unwrap().is_some());
    }

    #[test]
    fn missing_required_part_is_reported_by_name() {
        let mut zip = archive();
        assert!(zip.required_part("xl/workbook.xml").is_ok());
        assert!(matches!(
            zip.required_part("xl/worksheets/sheet1.xml"),
            Err(RoiSheetError::SpreadsheetError(SpreadsheetError::FileError(ref part))) if part == "xl/worksheets/sheet1.xml"
        ));
    }
}
