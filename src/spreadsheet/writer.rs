//! Persists tables as sheets of a new xlsx package.
//!
//! Only what the loader reads back is emitted: inline strings, numbers,
//! booleans and error literals for non-finite numbers. A minimal style part is
//! included so spreadsheet applications open the file without repair prompts.
use crate::error::RoiSheetError;
use crate::spreadsheet::reference::index_to_reference;
use crate::spreadsheet::SpreadsheetError;
use crate::table::Table;
use crate::table::Value;
use log::debug;
use quick_xml::events::BytesDecl;
use quick_xml::events::BytesEnd;
use quick_xml::events::BytesStart;
use quick_xml::events::BytesText;
use quick_xml::events::Event;
use quick_xml::Writer;
use std::collections::HashSet;
use std::fs::File;
use std::io::BufWriter;
use std::io::Seek;
use std::io::Write;
use std::path::Path;
use zip::write::SimpleFileOptions;
use zip::CompressionMethod;
use zip::ZipWriter;

const NS_MAIN: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
const NS_RELATIONSHIPS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const NS_PACKAGE_RELATIONSHIPS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";
const REL_WORKSHEET: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet";
const REL_STYLES: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles";

/// Error literal written for infinite or NaN numbers
const DIVISION_ERROR: &str = "#DIV/0!";

/// Characters Excel refuses in sheet names
const INVALID_SHEET_CHARACTERS: [char; 7] = ['[', ']', ':', '*', '?', '/', '\\'];

const CONTENT_TYPES_HEAD: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    r#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">"#,
    r#"<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>"#,
    r#"<Default Extension="xml" ContentType="application/xml"/>"#,
    r#"<Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>"#,
    r#"<Override PartName="/xl/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml"/>"#,
);

const PACKAGE_RELATIONSHIPS: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
    r#"<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/>"#,
    r#"</Relationships>"#,
);

const STYLES: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    r#"<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">"#,
    r#"<fonts count="1"><font><sz val="11"/><name val="Calibri"/></font></fonts>"#,
    r#"<fills count="2"><fill><patternFill patternType="none"/></fill><fill><patternFill patternType="gray125"/></fill></fills>"#,
    r#"<borders count="1"><border><left/><right/><top/><bottom/><diagonal/></border></borders>"#,
    r#"<cellStyleXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0"/></cellStyleXfs>"#,
    r#"<cellXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0"/></cellXfs>"#,
    r#"<cellStyles count="1"><cellStyle name="Normal" xfId="0" builtinId="0"/></cellStyles>"#,
    r#"</styleSheet>"#,
);

/// Writes named tables as the sheets of a new workbook file.
/// The first sheet is the active one.
pub fn write_workbook<P: AsRef<Path>>(path: P, sheets: &[(&str, &Table)]) -> Result<(), RoiSheetError> {
    check_sheet_names(sheets)?;
    let path = path.as_ref();
    let file = File::create(path)?;
    let mut writer = write_workbook_to(BufWriter::new(file), sheets)?;
    writer.flush()?;
    debug!("wrote {} sheet(s) to '{}'", sheets.len(), path.display());
    Ok(())
}

/// Writes named tables as a workbook into any seekable sink and returns the sink.
pub fn write_workbook_to<W: Write + Seek>(writer: W, sheets: &[(&str, &Table)]) -> Result<W, RoiSheetError> {
    check_sheet_names(sheets)?;
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut zip = ZipWriter::new(writer);

    zip.start_file("[Content_Types].xml", options)?;
    zip.write_all(CONTENT_TYPES_HEAD.as_bytes())?;
    for index in 1..=sheets.len() {
        write!(
            zip,
            r#"<Override PartName="/xl/worksheets/sheet{}.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>"#,
            index
        )?;
    }
    zip.write_all(b"</Types>")?;

    zip.start_file("_rels/.rels", options)?;
    zip.write_all(PACKAGE_RELATIONSHIPS.as_bytes())?;

    zip.start_file("xl/workbook.xml", options)?;
    write_workbook_part(&mut zip, sheets)?;

    zip.start_file("xl/_rels/workbook.xml.rels", options)?;
    write_workbook_relationships(&mut zip, sheets.len())?;

    zip.start_file("xl/styles.xml", options)?;
    zip.write_all(STYLES.as_bytes())?;

    for (index, (_, table)) in sheets.iter().enumerate() {
        zip.start_file(format!("xl/worksheets/sheet{}.xml", index + 1), options)?;
        write_worksheet(&mut zip, table)?;
    }

    Ok(zip.finish()?)
}

/// Validates sheet names: 1 to 31 characters, no reserved character,
/// unique ignoring case, and at least one sheet.
fn check_sheet_names(sheets: &[(&str, &Table)]) -> Result<(), SpreadsheetError> {
    if sheets.is_empty() {
        return Err(SpreadsheetError::SpreadsheetEmptyError("new workbook".to_owned()));
    }
    let mut seen = HashSet::new();
    for (name, _) in sheets {
        let length = name.chars().count();
        let valid = (1..=31).contains(&length)
            && !name.contains(INVALID_SHEET_CHARACTERS)
            && seen.insert(name.to_lowercase());
        if !valid {
            return Err(SpreadsheetError::SheetNameError(name.to_string()));
        }
    }
    Ok(())
}

fn write_workbook_part<W: Write>(sink: W, sheets: &[(&str, &Table)]) -> Result<(), RoiSheetError> {
    let mut writer = Writer::new(sink);
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))))?;
    writer.write_event(Event::Start(
        BytesStart::new("workbook").with_attributes([("xmlns", NS_MAIN), ("xmlns:r", NS_RELATIONSHIPS)]),
    ))?;
    writer.write_event(Event::Start(BytesStart::new("bookViews")))?;
    writer.write_event(Event::Empty(BytesStart::new("workbookView").with_attributes([("activeTab", "0")])))?;
    writer.write_event(Event::End(BytesEnd::new("bookViews")))?;
    writer.write_event(Event::Start(BytesStart::new("sheets")))?;
    for (index, (name, _)) in sheets.iter().enumerate() {
        let sheet_id = (index + 1).to_string();
        let relationship_id = format!("rId{}", index + 1);
        writer.write_event(Event::Empty(BytesStart::new("sheet").with_attributes([
            ("name", *name),
            ("sheetId", sheet_id.as_str()),
            ("r:id", relationship_id.as_str()),
        ])))?;
    }
    writer.write_event(Event::End(BytesEnd::new("sheets")))?;
    writer.write_event(Event::End(BytesEnd::new("workbook")))?;
    Ok(())
}

fn write_workbook_relationships<W: Write>(sink: W, sheet_count: usize) -> Result<(), RoiSheetError> {
    let mut writer = Writer::new(sink);
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))))?;
    writer.write_event(Event::Start(
        BytesStart::new("Relationships").with_attributes([("xmlns", NS_PACKAGE_RELATIONSHIPS)]),
    ))?;
    for index in 1..=sheet_count {
        let id = format!("rId{}", index);
        let target = format!("worksheets/sheet{}.xml", index);
        writer.write_event(Event::Empty(BytesStart::new("Relationship").with_attributes([
            ("Id", id.as_str()),
            ("Type", REL_WORKSHEET),
            ("Target", target.as_str()),
        ])))?;
    }
    let id = format!("rId{}", sheet_count + 1);
    writer.write_event(Event::Empty(BytesStart::new("Relationship").with_attributes([
        ("Id", id.as_str()),
        ("Type", REL_STYLES),
        ("Target", "styles.xml"),
    ])))?;
    writer.write_event(Event::End(BytesEnd::new("Relationships")))?;
    Ok(())
}

fn write_worksheet<W: Write>(sink: W, table: &Table) -> Result<(), RoiSheetError> {
    let mut writer = Writer::new(sink);
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))))?;
    writer.write_event(Event::Start(BytesStart::new("worksheet").with_attributes([("xmlns", NS_MAIN)])))?;
    writer.write_event(Event::Start(BytesStart::new("sheetData")))?;
    for (row_index, row) in table.rows().enumerate() {
        if row.iter().all(Value::is_empty) {
            continue;
        }
        let number = (row_index + 1).to_string();
        writer.write_event(Event::Start(BytesStart::new("row").with_attributes([("r", number.as_str())])))?;
        for (col_index, value) in row.iter().enumerate() {
            let reference = index_to_reference(row_index, col_index);
            write_cell(&mut writer, &reference, value)?;
        }
        writer.write_event(Event::End(BytesEnd::new("row")))?;
    }
    writer.write_event(Event::End(BytesEnd::new("sheetData")))?;
    writer.write_event(Event::End(BytesEnd::new("worksheet")))?;
    Ok(())
}

fn write_cell<W: Write>(writer: &mut Writer<W>, reference: &str, value: &Value) -> Result<(), RoiSheetError> {
    let cell = BytesStart::new("c").with_attributes([("r", reference)]);
    match value {
        Value::Empty => return Ok(()),
        Value::Number(number) if number.is_finite() => {
            writer.write_event(Event::Start(cell))?;
            write_value(writer, &number.to_string())?;
        }
        Value::Number(_) => {
            writer.write_event(Event::Start(cell.with_attributes([("t", "e")])))?;
            write_value(writer, DIVISION_ERROR)?;
        }
        Value::Bool(flag) => {
            writer.write_event(Event::Start(cell.with_attributes([("t", "b")])))?;
            write_value(writer, if *flag { "1" } else { "0" })?;
        }
        Value::Text(text) => {
            writer.write_event(Event::Start(cell.with_attributes([("t", "inlineStr")])))?;
            writer.write_event(Event::Start(BytesStart::new("is")))?;
            let mut element = BytesStart::new("t");
            if text.trim() != text {
                element.push_attribute(("xml:space", "preserve"));
            }
            writer.write_event(Event::Start(element))?;
            writer.write_event(Event::Text(BytesText::new(text)))?;
            writer.write_event(Event::End(BytesEnd::new("t")))?;
            writer.write_event(Event::End(BytesEnd::new("is")))?;
        }
    }
    writer.write_event(Event::End(BytesEnd::new("c")))?;
    Ok(())
}

fn write_value<W: Write>(writer: &mut Writer<W>, text: &str) -> Result<(), RoiSheetError> {
    writer.write_event(Event::Start(BytesStart::new("v")))?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    writer.write_event(Event::End(BytesEnd::new("v")))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spreadsheet::read_sheet;
    use crate::spreadsheet::read_table;
    use std::io::Cursor;

    fn sample() -> Table {
        Table::new(vec![
            vec!["Label".into(), "ROI <1>".into(), " padded ".into()],
            vec!["t1".into(), 1.5.into(), Value::Empty],
            vec![Value::Empty, Value::Empty, Value::Empty],
            vec!["t3".into(), f64::INFINITY.into(), true.into()],
        ])
    }

    #[test]
    fn writer_output_reads_back() {
        let other = Table::new(vec![vec!["x".into()]]);
        let cursor = write_workbook_to(Cursor::new(Vec::new()), &[("good", &sample()), ("wrong", &other)]).unwrap();

        let table = read_table(Cursor::new(cursor.into_inner())).unwrap();
        assert_eq!(table.max_column(), 3);
        assert_eq!(table.cell(1, 2), &Value::from("ROI <1>"));
        assert_eq!(table.cell(1, 3), &Value::from(" padded "));
        assert_eq!(table.cell(2, 2), &Value::Number(1.5));
        assert_eq!(table.cell(2, 3), &Value::Empty);
        assert_eq!(table.cell(4, 2), &Value::from(DIVISION_ERROR));
        assert_eq!(table.cell(4, 3), &Value::Bool(true));
    }

    #[test]
    fn writer_sheets_are_addressable_by_name() {
        let other = Table::new(vec![vec!["x".into()]]);
        let cursor = write_workbook_to(Cursor::new(Vec::new()), &[("good", &sample()), ("wrong", &other)]).unwrap();

        let table = read_sheet(Cursor::new(cursor.into_inner()), "wrong").unwrap();
        assert_eq!(table.max_row(), 1);
        assert_eq!(table.cell(1, 1), &Value::from("x"));
    }

    #[test]
    fn writer_rejects_bad_sheet_names() {
        let table = sample();
        for sheets in [
            vec![],
            vec![("", &table)],
            vec![("a/b", &table)],
            vec![("good", &table), ("GOOD", &table)],
            vec![("this name is far too long for a sheet", &table)],
        ] {
            let result = write_workbook_to(Cursor::new(Vec::new()), &sheets);
            assert!(matches!(result, Err(RoiSheetError::SpreadsheetError(_))));
        }
    }

    #[test]
    fn writer_empty_table_gives_empty_sheet() {
        let empty = Table::new(vec![]);
        let cursor = write_workbook_to(Cursor::new(Vec::new()), &[("empty", &empty)]).unwrap();
        let table = read_table(Cursor::new(cursor.into_inner())).unwrap();
        assert!(table.is_empty());
    }
}
