use crate::pipeline::config::FIRST_DATA_ROW;
use crate::pipeline::config::FIRST_ROI_COLUMN;
use crate::pipeline::numeric_cell;
use crate::pipeline::PipelineError;
use crate::spreadsheet::reference::position;
use crate::table::Table;
use crate::table::Value;
use log::debug;
use log::info;

/// Subtracts the background column from every data column, row by row, then
/// deletes the background column.
///
/// The label column and empty cells are left as they are. A data column whose
/// difference is exactly zero in any row is a copy of the background and
/// fails with [`PipelineError::BackgroundDuplicate`]. The table is left
/// partially rewritten on error, so callers pass a copy they can discard.
pub fn subtract_background(table: &mut Table, background_column: usize) -> Result<(), PipelineError> {
    info!("subtracting background...");
    if table.max_row() < FIRST_DATA_ROW || table.max_column() < background_column.max(FIRST_ROI_COLUMN) {
        return Err(PipelineError::TableTooSmall {
            rows: table.max_row(),
            columns: table.max_column(),
        });
    }

    let background = (FIRST_DATA_ROW..=table.max_row())
        .map(|row| numeric_cell(table, row, background_column))
        .collect::<Result<Vec<_>, _>>()?;

    for column in FIRST_ROI_COLUMN..=table.max_column() {
        if column == background_column {
            continue;
        }
        for (row, background) in (FIRST_DATA_ROW..).zip(&background) {
            let Some(value) = numeric_cell(table, row, column)? else {
                continue;
            };
            let Some(background) = background else {
                return Err(PipelineError::NonNumericCell {
                    position: position(row, background_column),
                    value: String::new(),
                });
            };
            let difference = value - background;
            if difference == 0.0 {
                return Err(PipelineError::BackgroundDuplicate {
                    column: table.column_name(column),
                    position: position(row, column),
                });
            }
            table.set(row, column, Value::Number(difference));
        }
    }

    table.delete_column(background_column);
    debug!("background column {} removed, {} columns left", background_column, table.max_column());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::tests::numeric_table;

    fn numbers(table: &Table, column: usize) -> Vec<Option<f64>> {
        table.column_values(column, 2, table.max_row())
    }

    #[test]
    fn background_is_subtracted_and_removed() {
        let mut table = numeric_table(
            &["Label", "BG", "ROI1", "ROI2"],
            &[&[1.0, 2.0, 0.5], &[2.0, 3.0, 4.0], &[5.0, 5.0, 5.0]],
        );
        subtract_background(&mut table, 2).unwrap();

        assert_eq!(table.max_column(), 3);
        assert_eq!(table.column_name(1), "Label");
        assert_eq!(table.column_name(2), "ROI1");
        assert_eq!(table.column_name(3), "ROI2");
        assert_eq!(numbers(&table, 2), vec![Some(1.0), Some(1.0), Some(3.5)]);
        assert_eq!(numbers(&table, 3), vec![Some(4.0), Some(3.0), Some(4.5)]);
        assert_eq!(table.cell(2, 1), &Value::from("t1"));
    }

    #[test]
    fn duplicate_of_background_aborts() {
        // Background [1,1,1], ROI1 [2,3,4], ROI2 [1,1,1]
        let mut table = numeric_table(
            &["Label", "BG", "ROI1", "ROI2"],
            &[&[1.0, 1.0, 1.0], &[2.0, 3.0, 4.0], &[1.0, 1.0, 1.0]],
        );
        let error = subtract_background(&mut table, 2).unwrap_err();

        assert!(error.is_fatal());
        assert!(matches!(
            error,
            PipelineError::BackgroundDuplicate { ref column, ref position } if column == "ROI2" && position == "D2"
        ));
        // ROI1 was already rewritten when the duplicate was found
        assert_eq!(numbers(&table, 3), vec![Some(1.0), Some(2.0), Some(3.0)]);
    }

    #[test]
    fn single_zero_row_is_a_duplicate() {
        let mut table = numeric_table(&["Label", "BG", "ROI1"], &[&[1.0, 2.0], &[3.0, 2.0]]);
        let error = subtract_background(&mut table, 2).unwrap_err();
        assert!(matches!(error, PipelineError::BackgroundDuplicate { ref position, .. } if position == "C3"));
    }

    #[test]
    fn empty_cells_stay_empty() {
        let mut table = numeric_table(&["Label", "BG", "ROI1"], &[&[1.0, 1.0, 1.0], &[3.0, 4.0, 6.0]]);
        table.set(3, 3, Value::Empty);
        table.set(4, 2, Value::Empty);
        table.set(4, 3, Value::Empty);
        subtract_background(&mut table, 2).unwrap();

        assert_eq!(numbers(&table, 2), vec![Some(2.0), None, None]);
    }

    #[test]
    fn empty_background_with_data_is_rejected() {
        let mut table = numeric_table(&["Label", "BG", "ROI1"], &[&[1.0], &[3.0]]);
        table.set(2, 2, Value::Empty);
        let error = subtract_background(&mut table, 2).unwrap_err();
        assert!(matches!(error, PipelineError::NonNumericCell { ref position, .. } if position == "B2"));
    }

    #[test]
    fn text_cell_is_rejected() {
        let mut table = numeric_table(&["Label", "BG", "ROI1"], &[&[1.0], &[3.0]]);
        table.set(2, 3, Value::from("3,0"));
        let error = subtract_background(&mut table, 2).unwrap_err();
        assert_eq!(error.to_string(), "Cell C2 holds '3,0', expected a number");
    }
}
