//! # Spreadsheet Module
//!
//! Loads the active sheet of an Excel workbook (`.xlsx`, `.xlsm`) into a
//! [`Table`] and persists tables back as workbooks. Only raw cell values are
//! handled: cached formula results are read as values and styles are ignored.
use crate::error::RoiSheetError;
use crate::spreadsheet::xlsx::XlsxWorkbook;
use crate::table::Table;
use log::debug;
use std::fs::File;
use std::io::BufReader;
use std::io::Read;
use std::io::Seek;
use std::path::Path;
use thiserror::Error;

pub(crate) mod cell;
pub(crate) mod excel;
pub mod reference;
pub mod writer;
pub(crate) mod xlsx;

pub use writer::write_workbook;
pub use writer::write_workbook_to;

/// Workbook extensions the loader accepts.
pub const EXCEL_EXTENSIONS: [&str; 2] = ["xlsx", "xlsm"];

/// Custom error types for spreadsheet operations.
#[derive(Error, Debug)]
pub enum SpreadsheetError {
    #[error("File extension is missing or '{0}' is not an excel file. Should be a .xlsx or .xlsm file")]
    FileExtensionError(String),

    #[error("Legacy binary workbook '{0}' is not supported. Save it as .xlsx first")]
    LegacyFormatError(String),

    #[error("Missing part '{0}' in workbook")]
    FileError(String),

    #[error("Spreadsheet '{0}' contains no sheet")]
    SpreadsheetEmptyError(String),

    #[error("Sheet '{0}' not found")]
    SheetNotFoundError(String),

    #[error("Invalid sheet name '{0}': 1 to 31 characters, none of []:*?/\\ and unique within the workbook")]
    SheetNameError(String),

    #[error("Invalid cell value at '{0}': '{1}'")]
    CellValueError(String, String),

    #[error("Shared string index {0} out of range")]
    SharedStringError(usize),
}

/// Checks that a path names a workbook the loader can read.
pub fn check_file_extension(path: &Path) -> Result<(), SpreadsheetError> {
    let extension = path
        .extension()
        .and_then(|extension| extension.to_str())
        .map(|extension| extension.to_ascii_lowercase());
    match extension.as_deref() {
        Some(extension) if EXCEL_EXTENSIONS.contains(&extension) => Ok(()),
        Some("xls") => Err(SpreadsheetError::LegacyFormatError(path.display().to_string())),
        _ => Err(SpreadsheetError::FileExtensionError(path.display().to_string())),
    }
}

/// Reads the active sheet of a workbook file.
pub fn open_table<P: AsRef<Path>>(path: P) -> Result<Table, RoiSheetError> {
    let path = path.as_ref();
    check_file_extension(path)?;
    let file = File::open(path)?;
    read_table(BufReader::new(file))
}

/// Reads the named sheet of a workbook file.
pub fn open_sheet<P: AsRef<Path>>(path: P, sheet_name: &str) -> Result<Table, RoiSheetError> {
    let path = path.as_ref();
    check_file_extension(path)?;
    let file = File::open(path)?;
    read_sheet(BufReader::new(file), sheet_name)
}

/// Reads the active sheet of a workbook from any seekable source.
pub fn read_table<R: Read + Seek>(reader: R) -> Result<Table, RoiSheetError> {
    let mut workbook = XlsxWorkbook::open(reader)?;
    let index = workbook.active_sheet();
    debug!("reading active sheet '{}'", workbook.sheet_names()[index]);
    workbook.read_table(index)
}

/// Reads the named sheet of a workbook from any seekable source.
pub fn read_sheet<R: Read + Seek>(reader: R, sheet_name: &str) -> Result<Table, RoiSheetError> {
    let mut workbook = XlsxWorkbook::open(reader)?;
    let index = workbook
        .sheet_names()
        .iter()
        .position(|name| *name == sheet_name)
        .ok_or_else(|| SpreadsheetError::SheetNotFoundError(sheet_name.to_owned()))?;
    workbook.read_table(index)
}
