use crate::output::format_number;
use crate::pipeline::check_window;
use crate::pipeline::config::ZeroMeanPolicy;
use crate::pipeline::config::FIRST_DATA_ROW;
use crate::pipeline::config::FIRST_ROI_COLUMN;
use crate::pipeline::numeric_cell;
use crate::pipeline::window_mean;
use crate::pipeline::PipelineError;
use crate::table::RowRange;
use crate::table::Table;
use crate::table::Value;
use log::debug;
use log::warn;
use std::fmt::Display;

/// Baseline mean of one ROI column.
#[derive(Clone, Debug, PartialEq)]
pub struct BaselineMean {
    pub name: String,
    pub mean: f64,
}

impl Display for BaselineMean {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.name, format_number(self.mean))
    }
}

/// Rewrites ROI columns relative to their baseline mean.
#[derive(Clone, Debug)]
pub struct Normalizer {
    baseline_window: RowRange,
    policy: ZeroMeanPolicy,
}

impl Normalizer {
    pub fn new(baseline_window: RowRange, policy: ZeroMeanPolicy) -> Self {
        Self {
            baseline_window,
            policy,
        }
    }

    /// Rewrites every data cell of every ROI column as `(value - mean) / mean`,
    /// with the mean taken over the baseline window.
    ///
    /// All data rows are rewritten, not only the baseline window. Cells equal
    /// to the column title and empty cells are skipped. Returns the means in
    /// column order.
    pub fn normalize(&self, table: &mut Table) -> Result<Vec<BaselineMean>, PipelineError> {
        check_window(table, self.baseline_window)?;
        let mut means = Vec::with_capacity(table.data_column_count());
        for column in FIRST_ROI_COLUMN..=table.max_column() {
            let name = table.column_name(column);
            let mean = window_mean(table, column, self.baseline_window)?.ok_or_else(|| PipelineError::EmptyWindow {
                column: name.clone(),
                window: self.baseline_window,
            })?;

            if mean == 0.0 {
                match self.policy {
                    ZeroMeanPolicy::Fail => return Err(PipelineError::ZeroBaselineMean { column: name }),
                    ZeroMeanPolicy::Skip => {
                        warn!("baseline mean of '{}' is zero, column left as is", name);
                        means.push(BaselineMean { name, mean });
                        continue;
                    }
                    ZeroMeanPolicy::Propagate => warn!("baseline mean of '{}' is zero, dividing anyway", name),
                }
            }

            let header = table.header(column).clone();
            for row in FIRST_DATA_ROW..=table.max_row() {
                if *table.cell(row, column) == header {
                    continue;
                }
                if let Some(value) = numeric_cell(table, row, column)? {
                    table.set(row, column, Value::Number((value - mean) / mean));
                }
            }
            debug!("normalized '{}' with mean {}", name, mean);
            means.push(BaselineMean { name, mean });
        }
        Ok(means)
    }
}
