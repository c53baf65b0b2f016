use crate::spreadsheet::reference::index_to_reference;
use crate::spreadsheet::SpreadsheetError;
use crate::table::Value;

/// Types of cell data in SpreadsheetML worksheets.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub(crate) enum CellType {
    #[default]
    Empty,
    /// Boolean values (1/0)
    Boolean,
    /// Numeric values, including dates stored as serial numbers
    Number,
    /// ISO 8601 date/time strings
    IsoDateTime,
    /// Inline string values
    InlineString,
    /// Shared string table references
    SharedString,
    /// Error literals such as #DIV/0!
    Error,
}

impl CellType {
    /// Maps the `t` attribute of a `<c>` element to a cell type.
    pub(crate) fn parse(kind: Option<&str>) -> Self {
        match kind {
            Some("inlineStr") | Some("str") => CellType::InlineString,
            Some("s") => CellType::SharedString,
            Some("d") => CellType::IsoDateTime,
            Some("b") => CellType::Boolean,
            Some("e") => CellType::Error,
            _ => CellType::Number,
        }
    }
}

/// Represents a single cell read from a worksheet.
#[derive(Clone, Debug)]
pub(crate) struct Cell {
    /// Row index (0-based)
    pub(crate) row: usize,
    /// Column index (0-based)
    pub(crate) col: usize,
    /// Cell data type
    pub(crate) kind: CellType,
    /// Cell value as stored in the XML
    pub(crate) value: String,
}

impl Cell {
    /// Returns the Excel-style cell reference (e.g., "A1", "B2").
    pub(crate) fn reference(&self) -> String {
        index_to_reference(self.row, self.col)
    }

    /// Converts the stored text into a raw table value.
    /// Shared strings are resolved against the workbook string table.
    pub(crate) fn to_value(&self, shared_strings: &[String]) -> Result<Value, SpreadsheetError> {
        let invalid = || SpreadsheetError::CellValueError(self.reference(), self.value.to_owned());
        match self.kind {
            CellType::Empty => Ok(Value::Empty),
            CellType::Boolean => Ok(Value::Bool(self.value.trim() == "1" || self.value.trim() == "true")),
            CellType::Number => self.value
                .trim()
                .parse::<f64>()
                .map(Value::Number)
                .map_err(|_| invalid()),
            CellType::SharedString => {
                let index = self.value.trim().parse::<usize>().map_err(|_| invalid())?;
                shared_strings
                    .get(index)
                    .map(|text| Value::Text(text.to_owned()))
                    .ok_or(SpreadsheetError::SharedStringError(index))
            }
            CellType::IsoDateTime | CellType::InlineString | CellType::Error => Ok(Value::Text(self.value.to_owned())),
        }
    }
}
