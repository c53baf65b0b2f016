//! In-memory cell grid shared by every pipeline stage.
//!
//! Rows and columns are addressed 1-based like spreadsheet coordinates: row 1
//! holds the ROI names and column 1 holds the row labels.
use std::fmt::Display;

pub mod range;

pub use range::RowRange;

/// Raw value of a single cell.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Value {
    #[default]
    Empty,
    Number(f64),
    Text(String),
    Bool(bool),
}

impl Value {
    /// Returns the numeric payload, `None` for every other kind.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(value) => Some(*value),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Value::Empty)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Number(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_owned())
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Empty => Ok(()),
            Value::Number(value) => write!(f, "{}", value),
            Value::Text(value) => write!(f, "{}", value),
            Value::Bool(value) => write!(f, "{}", if *value { "TRUE" } else { "FALSE" }),
        }
    }
}

/// Rectangular table of cells.
///
/// Every row holds exactly `max_column` cells. The only operation that changes
/// the column layout is column deletion, which shifts later columns left.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Table {
    rows: Vec<Vec<Value>>,
    max_column: usize,
}

impl Table {
    /// Builds a table from rows, padding short rows with empty cells.
    pub fn new(rows: Vec<Vec<Value>>) -> Self {
        let max_column = rows.iter().map(Vec::len).max().unwrap_or(0);
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(max_column, Value::Empty);
                row
            })
            .collect();
        Self { rows, max_column }
    }

    pub fn max_row(&self) -> usize {
        self.rows.len()
    }

    pub fn max_column(&self) -> usize {
        self.max_column
    }

    /// Number of columns excluding the label column.
    pub fn data_column_count(&self) -> usize {
        self.max_column.saturating_sub(1)
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty() || self.max_column == 0
    }

    /// Iterates over rows in order, each as a slice of `max_column` cells.
    pub fn rows(&self) -> impl Iterator<Item = &[Value]> {
        self.rows.iter().map(Vec::as_slice)
    }

    /// Returns the cell at the 1-based position.
    ///
    /// # Panics
    ///
    /// Panics if the position lies outside the table.
    pub fn cell(&self, row: usize, column: usize) -> &Value {
        self.check_position(row, column);
        &self.rows[row - 1][column - 1]
    }

    /// Replaces the cell at the 1-based position.
    ///
    /// # Panics
    ///
    /// Panics if the position lies outside the table.
    pub fn set(&mut self, row: usize, column: usize, value: Value) {
        self.check_position(row, column);
        self.rows[row - 1][column - 1] = value;
    }

    /// Header cell of a column.
    pub fn header(&self, column: usize) -> &Value {
        self.cell(1, column)
    }

    /// Header text of a column, used as the ROI name.
    pub fn column_name(&self, column: usize) -> String {
        self.header(column).to_string()
    }

    /// Removes one column and shifts every column to its right left by one.
    pub fn delete_column(&mut self, index: usize) {
        self.check_column(index);
        for row in &mut self.rows {
            row.remove(index - 1);
        }
        self.max_column -= 1;
    }

    /// Removes a batch of columns given by their original indices.
    ///
    /// Indices are applied in ascending order and the k-th deletion targets
    /// `index - (k - 1)`, since every earlier deletion shifted the remaining
    /// columns left by one. Returns the number of removed columns.
    pub fn delete_columns(&mut self, indices: &[usize]) -> usize {
        let mut indices = indices.to_vec();
        indices.sort_unstable();
        indices.dedup();
        for (offset, index) in indices.iter().enumerate() {
            self.delete_column(index - offset);
        }
        indices.len()
    }

    /// Numeric values of a column over an inclusive row span.
    pub fn column_values(&self, index: usize, row_start: usize, row_end: usize) -> Vec<Option<f64>> {
        (row_start..=row_end)
            .map(|row| self.cell(row, index).as_number())
            .collect()
    }

    fn check_position(&self, row: usize, column: usize) {
        if row == 0 || row > self.max_row() {
            panic!("row {} is outside of table with {} rows", row, self.max_row());
        }
        self.check_column(column);
    }

    fn check_column(&self, column: usize) {
        if column == 0 || column > self.max_column {
            panic!("column {} is outside of table with {} columns", column, self.max_column);
        }
    }
}
