use crate::error::RoiSheetError;
use crate::helpers::xml::push_reference;
use crate::helpers::xml::XmlAttributes;
use crate::helpers::xml::XmlReader;
use crate::helpers::zip::PackageParts;
use crate::match_xml_events;
use crate::spreadsheet::cell::Cell;
use crate::spreadsheet::cell::CellType;
use crate::spreadsheet::excel::load_relationships;
use crate::spreadsheet::reference::reference_to_index;
use crate::spreadsheet::SpreadsheetError;
use crate::table::Table;
use crate::table::Value;
use log::debug;
use quick_xml::events::Event;
use quick_xml::name::QName;
use std::borrow::Cow;
use std::io::BufRead;
use std::io::Read;
use std::io::Seek;
use zip::ZipArchive;

// XML tag names for parsing SpreadsheetML parts
const TAG_SHARED_STRING_ITEM: QName = QName(b"si");   // Shared string table item
const TAG_PHONETIC_TEXT: QName = QName(b"rPh");       // Phonetic text for Asian languages
const TAG_TEXT: QName = QName(b"t");                  // Text content within strings
const TAG_WORKBOOK_VIEW: QName = QName(b"workbookView"); // Window settings, holds the active tab
const TAG_SHEET: QName = QName(b"sheet");             // Worksheet definition
const TAG_ROW: QName = QName(b"row");                 // Row in worksheet
const TAG_CELL: QName = QName(b"c");                  // Cell in worksheet
const TAG_INLINE_STRING: QName = QName(b"is");        // Inline string value
const TAG_VALUE: QName = QName(b"v");                 // Cell value content

/// An opened xlsx package
pub(crate) struct XlsxWorkbook<R: Read + Seek> {
    /// ZIP archive containing the package parts
    zip: ZipArchive<R>,
    /// Worksheets as (name, zip_path) pairs in workbook order
    sheets: Vec<(String, String)>,
    /// Index of the sheet selected when the workbook was saved
    active_sheet: usize,
}

impl<R: Read + Seek> XlsxWorkbook<R> {
    /// Opens an xlsx package and parses its sheet list
    pub(crate) fn open(reader: R) -> Result<XlsxWorkbook<R>, RoiSheetError> {
        let mut zip = ZipArchive::new(reader)?;
        let (sheets, active_sheet) = load_workbook(&mut zip)?;
        if sheets.is_empty() {
            Err(SpreadsheetError::SpreadsheetEmptyError("xl/workbook.xml".to_owned()))?
        }
        let active_sheet = if active_sheet < sheets.len() { active_sheet } else { 0 };
        Ok(XlsxWorkbook {
            zip,
            sheets,
            active_sheet,
        })
    }

    pub(crate) fn sheet_names(&self) -> Vec<&str> {
        self.sheets.iter().map(|(name, _)| name.as_str()).collect()
    }

    pub(crate) fn active_sheet(&self) -> usize {
        self.active_sheet
    }

    /// Loads the whole shared string table, empty when the part is absent
    fn load_shared_strings(&mut self) -> Result<Vec<String>, RoiSheetError> {
        let mut shared_strings = Vec::<String>::new();
        let mut reader = match self.zip.optional_part("xl/sharedStrings.xml")? {
            Some(reader) => reader,
            None => return Ok(shared_strings),
        };

        match_xml_events!(reader => {
            Event::Start(event) if event.name() == TAG_SHARED_STRING_ITEM => {
                let string = read_string_value(&mut reader, TAG_SHARED_STRING_ITEM, false)?;
                shared_strings.push(string);
            }
        });
        Ok(shared_strings)
    }

    /// Reads a worksheet into a dense table anchored at A1
    ///
    /// # Panics
    /// Panics if `index` is not a sheet index of this workbook
    pub(crate) fn read_table(&mut self, index: usize) -> Result<Table, RoiSheetError> {
        let shared_strings = self.load_shared_strings()?;
        let (sheet_name, zip_path) = self.sheets[index].clone();
        let mut reader = self.zip.required_part(&zip_path)?;

        let mut cells = Vec::<Cell>::new();
        let mut row_count = 0usize;
        let mut col_count = 0usize;
        let mut row = 0usize;
        let mut col = 0usize;
        let mut kind = CellType::default();
        let mut value = String::new();
        match_xml_events!(reader => {
            Event::Start(event) if event.name() == TAG_ROW => {
                if let Some(number) = event.parsed_attribute::<usize>("r")? {
                    row_count = number.saturating_sub(1);
                }
                col_count = 0;
            }
            Event::End(event) if event.name() == TAG_ROW => {
                row_count += 1;
                col_count = 0;
            }
            Event::Start(event) if event.name() == TAG_CELL => {
                (row, col) = event.attribute("r")?
                    .and_then(|reference| reference_to_index(&reference))
                    .unwrap_or((row_count, col_count));
                col_count = col + 1;
                kind = CellType::parse(event.attribute("t")?.as_deref());
                value.clear();
            }
            Event::Start(event) if kind != CellType::Empty && event.name() == TAG_INLINE_STRING => {
                value = read_string_value(&mut reader, TAG_INLINE_STRING, false)?;
            }
            Event::Start(event) if kind != CellType::Empty && event.name() == TAG_VALUE => {
                value = read_string_value(&mut reader, TAG_VALUE, true)?;
            }
            Event::End(event) if event.name() == TAG_CELL => {
                if !value.is_empty() {
                    cells.push(Cell {
                        row,
                        col,
                        kind,
                        value: std::mem::take(&mut value),
                    });
                }
                kind = CellType::Empty;
            }
        });

        let max_row = cells.iter().map(|cell| cell.row + 1).max().unwrap_or(0);
        let max_col = cells.iter().map(|cell| cell.col + 1).max().unwrap_or(0);
        let mut rows = vec![vec![Value::Empty; max_col]; max_row];
        for cell in &cells {
            rows[cell.row][cell.col] = cell.to_value(&shared_strings)?;
        }
        debug!("sheet '{}' holds {} rows and {} columns", sheet_name, max_row, max_col);
        Ok(Table::new(rows))
    }
}

/// Loads the worksheet list and the active tab from `xl/workbook.xml`
///
/// # Returns
/// Tuple of (worksheets, active_tab) where worksheets are (name, zip_path) pairs
fn load_workbook<R: Read + Seek>(zip: &mut ZipArchive<R>) -> Result<(Vec<(String, String)>, usize), RoiSheetError> {
    let relationships = load_relationships(zip, "xl/_rels/workbook.xml.rels")?;
    let mut reader = zip.required_part("xl/workbook.xml")?;
    let mut sheets: Vec<(String, String)> = Vec::new();
    let mut active_sheet = None::<usize>;
    match_xml_events!(reader => {
        Event::Start(event) if event.name() == TAG_SHEET => {
            let mut name = None::<Cow<str>>;
            let mut id = None::<Cow<str>>;
            for result in event.attributes() {
                let attribute = result?;
                match attribute.key.local_name().as_ref() {
                    b"name" => name = Some(attribute.unescape_value()?),
                    b"id" => id = Some(attribute.unescape_value()?),
                    _ => (),
                }
            }
            if let Some((name, id)) = name.zip(id) {
                if let Some(path) = relationships.get(&id.to_string()) {
                    sheets.push((name.to_string(), path.to_owned()));
                }
            }
        }
        Event::Start(event) if active_sheet.is_none() && event.name() == TAG_WORKBOOK_VIEW => {
            active_sheet = Some(event.parsed_attribute::<usize>("activeTab")?.unwrap_or(0));
        }
    });
    Ok((sheets, active_sheet.unwrap_or(0)))
}

/// Reads string content up to `end_tag`, skipping phonetic runs
///
/// # Arguments
/// * `reader` - XML reader positioned just after the opening tag
/// * `end_tag` - XML tag that marks the end of the string content
/// * `is_text_content` - Whether text directly under the element counts (true for `<v>`)
fn read_string_value<B: BufRead>(
    reader: &mut XmlReader<B>,
    end_tag: QName,
    is_text_content: bool,
) -> Result<String, RoiSheetError> {
    let mut is_phonetic_text = false;
    let mut is_text = is_text_content;
    let mut text = String::new();
    match_xml_events!(reader => {
        Event::End(event) if event.name() == end_tag => break,
        Event::Start(event) if event.name() == TAG_PHONETIC_TEXT => is_phonetic_text = true,
        Event::End(event) if event.name() == TAG_PHONETIC_TEXT => is_phonetic_text = false,
        Event::Start(event) if !is_phonetic_text && event.name() == TAG_TEXT => is_text = true,
        Event::End(event) if is_text && event.name() == TAG_TEXT => is_text = false,
        Event::Text(event) if is_text => text.push_str(&event.xml_content()?),
        Event::CData(event) if is_text => text.push_str(&event.xml_content()?),
        Event::GeneralRef(event) if is_text => push_reference(&mut text, &event)?,
    });
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::io::Write;
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    const WORKBOOK: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">
<bookViews><workbookView activeTab="1"/></bookViews>
<sheets><sheet name="Notes" sheetId="1" r:id="rId1"/><sheet name="Data" sheetId="2" r:id="rId2"/></sheets>
</workbook>"#;

    const RELATIONSHIPS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/>
<Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="/xl/worksheets/sheet2.xml"/>
<Relationship Id="rId3" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/>
</Relationships>"#;

    const SHARED_STRINGS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<sst xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
<si><t>Label</t></si>
<si><r><t>RO</t></r><r><t>I1</t></r><rPh><t>ignored</t></rPh></si>
</sst>"#;

    const NOTES: &str = r#"<worksheet><sheetData><row r="1"><c r="A1" t="inlineStr"><is><t>notes</t></is></c></row></sheetData></worksheet>"#;

    const DATA: &str = r#"<worksheet><sheetData>
<row r="1"><c r="A1" t="s"><v>0</v></c><c r="B1" t="s"><v>1</v></c><c r="C1" t="inlineStr"><is><t>ROI &amp; 2</t></is></c></row>
<row r="2"><c r="A2" t="str"><v>t1</v></c><c r="B2"><v>1.5</v></c><c r="C2" s="3"/></row>
<row r="4"><c t="str"><v>t3</v></c><c><v>-2</v></c><c t="b"><v>1</v></c></row>
</sheetData></worksheet>"#;

    fn package(parts: &[(&str, &str)]) -> Cursor<Vec<u8>> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, content) in parts {
            writer.start_file(*name, SimpleFileOptions::default()).unwrap();
            writer.write_all(content.as_bytes()).unwrap();
        }
        writer.finish().unwrap()
    }

    fn sample() -> Cursor<Vec<u8>> {
        package(&[
            ("xl/workbook.xml", WORKBOOK),
            ("xl/_rels/workbook.xml.rels", RELATIONSHIPS),
            ("xl/sharedStrings.xml", SHARED_STRINGS),
            ("xl/worksheets/sheet1.xml", NOTES),
            ("xl/worksheets/sheet2.xml", DATA),
        ])
    }

    #[test]
    fn xlsx_sheet_list_and_active_tab() {
        let workbook = XlsxWorkbook::open(sample()).unwrap();
        assert_eq!(workbook.sheet_names(), vec!["Notes", "Data"]);
        assert_eq!(workbook.active_sheet(), 1);
    }

    #[test]
    fn xlsx_read_dense_table() {
        let mut workbook = XlsxWorkbook::open(sample()).unwrap();
        let table = workbook.read_table(1).unwrap();

        assert_eq!(table.max_row(), 4);
        assert_eq!(table.max_column(), 3);
        assert_eq!(table.cell(1, 1), &Value::from("Label"));
        assert_eq!(table.cell(1, 2), &Value::from("ROI1"));
        assert_eq!(table.cell(1, 3), &Value::from("ROI & 2"));
        assert_eq!(table.cell(2, 1), &Value::from("t1"));
        assert_eq!(table.cell(2, 2), &Value::Number(1.5));
        assert_eq!(table.cell(2, 3), &Value::Empty);
        assert_eq!(table.cell(3, 1), &Value::Empty);
        assert_eq!(table.cell(4, 1), &Value::from("t3"));
        assert_eq!(table.cell(4, 2), &Value::Number(-2.0));
        assert_eq!(table.cell(4, 3), &Value::Bool(true));
    }

    #[test]
    fn xlsx_without_sheets_is_rejected() {
        let workbook = r#"<workbook><sheets/></workbook>"#;
        let relationships = r#"<Relationships/>"#;
        let result = XlsxWorkbook::open(package(&[
            ("xl/workbook.xml", workbook),
            ("xl/_rels/workbook.xml.rels", relationships),
        ]));
        assert!(matches!(
            result,
            Err(RoiSheetError::SpreadsheetError(SpreadsheetError::SpreadsheetEmptyError(_)))
        ));
    }

    #[test]
    fn xlsx_missing_workbook_part() {
        let result = XlsxWorkbook::open(package(&[("xl/_rels/workbook.xml.rels", RELATIONSHIPS)]));
        assert!(matches!(
            result,
            Err(RoiSheetError::SpreadsheetError(SpreadsheetError::FileError(_)))
        ));
    }
}
