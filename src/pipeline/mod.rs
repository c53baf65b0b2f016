//! # Pipeline Module
//!
//! The numeric core: background subtraction, threshold classification,
//! column partitioning and mean normalization over an in-memory [`Table`].
//!
//! Every run owns its own context. [`Pipeline::run`] takes the loaded table by
//! value, keeps it untouched as `original` and works on clones, so runs over
//! different files share nothing and may execute in parallel.
use crate::spreadsheet::reference::position;
use crate::table::RowRange;
use crate::table::Table;
use crate::table::Value;
use log::info;
use thiserror::Error;

pub mod background;
pub mod classifier;
pub mod config;
pub mod normalizer;
pub mod partition;

pub use background::subtract_background;
pub use classifier::calculate_percentage_difference;
pub use classifier::ClassificationResult;
pub use classifier::ColumnClassifier;
pub use classifier::ColumnMetric;
pub use config::ClassificationMode;
pub use config::ThresholdConfig;
pub use config::ZeroMeanPolicy;
pub use normalizer::BaselineMean;
pub use normalizer::Normalizer;
pub use partition::partition;
pub use partition::Partition;

use config::BACKGROUND_COLUMN_INDEX;
use config::FIRST_DATA_ROW;

/// Errors raised while transforming a table.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Table has {rows} rows and {columns} columns, expected a header row, a data row, a label column and a data column")]
    TableTooSmall { rows: usize, columns: usize },

    #[error("Column '{column}' duplicates the background column: subtraction gives 0 at {position}")]
    BackgroundDuplicate { column: String, position: String },

    #[error("Cell {position} holds '{value}', expected a number")]
    NonNumericCell { position: String, value: String },

    #[error("Window '{window}' is outside of the table with {rows} rows")]
    WindowOutOfBounds { window: RowRange, rows: usize },

    #[error("Window '{window}' of column '{column}' holds no number")]
    EmptyWindow { column: String, window: RowRange },

    #[error("Baseline mean of column '{column}' is zero")]
    ZeroBaselineMean { column: String },
}

impl PipelineError {
    /// A column duplicating the background means the whole batch was
    /// exported wrongly, so it stops the invocation instead of one file.
    pub fn is_fatal(&self) -> bool {
        matches!(self, PipelineError::BackgroundDuplicate { .. })
    }
}

/// Good and wrong tables after normalization, with their baseline means.
#[derive(Clone, Debug, PartialEq)]
pub struct NormalizedPartition {
    pub good: Table,
    pub wrong: Table,
    pub good_means: Vec<BaselineMean>,
    pub wrong_means: Vec<BaselineMean>,
}

/// Everything one run derives from a table.
#[derive(Debug)]
pub struct PipelineOutput {
    /// The table as loaded
    pub original: Table,
    /// The table after background subtraction, when it ran
    pub background_subtracted: Option<Table>,
    /// The table the classifier read
    pub classified: Table,
    pub classification: ClassificationResult,
    /// `None` when no column was classified wrong
    pub partition: Option<Partition>,
    /// `None` when normalization is disabled or nothing was partitioned.
    /// A failed normalization keeps its error here so the earlier steps
    /// can still be written.
    pub normalized: Option<Result<NormalizedPartition, PipelineError>>,
}

/// One configured pipeline, reusable across files.
#[derive(Clone, Debug)]
pub struct Pipeline {
    config: ThresholdConfig,
}

impl Pipeline {
    pub fn new(config: ThresholdConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ThresholdConfig {
        &self.config
    }

    pub fn run(&self, table: Table) -> Result<PipelineOutput, PipelineError> {
        if table.max_row() < FIRST_DATA_ROW || table.max_column() < BACKGROUND_COLUMN_INDEX {
            return Err(PipelineError::TableTooSmall {
                rows: table.max_row(),
                columns: table.max_column(),
            });
        }

        let mut working = table.clone();
        let background_subtracted = if self.config.subtract_background {
            subtract_background(&mut working, BACKGROUND_COLUMN_INDEX)?;
            Some(working.clone())
        } else {
            None
        };

        let classification = ColumnClassifier::from_config(&self.config).classify(&working)?;
        let partition = partition(&working, &classification);

        let normalized = match &partition {
            Some(partition) if self.config.normalize => Some(self.normalize(partition)),
            _ => None,
        };

        Ok(PipelineOutput {
            original: table,
            background_subtracted,
            classified: working,
            classification,
            partition,
            normalized,
        })
    }

    /// Normalizes the good and wrong tables independently.
    fn normalize(&self, partition: &Partition) -> Result<NormalizedPartition, PipelineError> {
        info!("normalizing good and wrong columns...");
        let normalizer = Normalizer::new(self.config.baseline_window(), self.config.zero_mean_policy);
        let mut good = partition.good.clone();
        let mut wrong = partition.wrong.clone();
        let good_means = normalizer.normalize(&mut good)?;
        let wrong_means = normalizer.normalize(&mut wrong)?;
        Ok(NormalizedPartition {
            good,
            wrong,
            good_means,
            wrong_means,
        })
    }
}

/// Reads a cell as a number: `None` when empty, an error for text or booleans.
pub(crate) fn numeric_cell(table: &Table, row: usize, column: usize) -> Result<Option<f64>, PipelineError> {
    match table.cell(row, column) {
        Value::Empty => Ok(None),
        Value::Number(value) => Ok(Some(*value)),
        value => Err(PipelineError::NonNumericCell {
            position: position(row, column),
            value: value.to_string(),
        }),
    }
}

pub(crate) fn check_window(table: &Table, window: RowRange) -> Result<(), PipelineError> {
    if window.end > table.max_row() {
        Err(PipelineError::WindowOutOfBounds {
            window,
            rows: table.max_row(),
        })
    } else {
        Ok(())
    }
}

/// Arithmetic mean of a column over a window.
///
/// The header row, cells equal to the column title and empty cells are left
/// out. Returns `None` when nothing numeric remains.
pub(crate) fn window_mean(table: &Table, column: usize, window: RowRange) -> Result<Option<f64>, PipelineError> {
    let header = table.header(column);
    let mut sum = 0.0;
    let mut count = 0usize;
    for row in window.rows().filter(|row| *row >= FIRST_DATA_ROW) {
        if table.cell(row, column) == header {
            continue;
        }
        if let Some(value) = numeric_cell(table, row, column)? {
            sum += value;
            count += 1;
        }
    }
    Ok((count > 0).then(|| sum / count as f64))
}
