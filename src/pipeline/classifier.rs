use crate::output::format_number;
use crate::pipeline::check_window;
use crate::pipeline::config::ClassificationMode;
use crate::pipeline::config::ThresholdConfig;
use crate::pipeline::config::FIRST_ROI_COLUMN;
use crate::pipeline::numeric_cell;
use crate::pipeline::window_mean;
use crate::pipeline::PipelineError;
use crate::table::RowRange;
use crate::table::Table;
use log::debug;
use log::info;
use std::fmt::Display;

/// Percentage change of `first` relative to `second`.
///
/// A zero `second` yields exactly `0`. The denominator keeps its sign.
pub fn calculate_percentage_difference(first: f64, second: f64) -> f64 {
    if second == 0.0 {
        0.0
    } else {
        (first - second).abs() / second * 100.0
    }
}

/// Percentage difference measured for one ROI column.
#[derive(Clone, Debug, PartialEq)]
pub struct ColumnMetric {
    pub name: String,
    pub difference: f64,
    /// The reference value was zero and `difference` holds the 0 sentinel
    pub zero_baseline: bool,
}

impl Display for ColumnMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.zero_baseline {
            write!(f, "{}: 0", self.name)
        } else {
            write!(f, "{}: {}", self.name, format_number(self.difference))
        }
    }
}

/// Disjoint good and wrong column sets, ascending, with their metrics in
/// column order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ClassificationResult {
    pub good: Vec<usize>,
    pub wrong: Vec<usize>,
    pub good_metrics: Vec<ColumnMetric>,
    pub wrong_metrics: Vec<ColumnMetric>,
}

/// Labels ROI columns good or wrong against a percentage threshold.
#[derive(Clone, Debug)]
pub struct ColumnClassifier {
    threshold: f64,
    mode: ClassificationMode,
    first_window: RowRange,
    second_window: RowRange,
}

impl ColumnClassifier {
    pub fn new(threshold: u8, mode: ClassificationMode, first_window: RowRange, second_window: RowRange) -> Self {
        Self {
            threshold: f64::from(threshold),
            mode,
            first_window,
            second_window,
        }
    }

    pub fn from_config(config: &ThresholdConfig) -> Self {
        Self::new(config.threshold, config.mode, config.first_window, config.second_window)
    }

    /// Classifies every column right of the label column. Never mutates the table.
    pub fn classify(&self, table: &Table) -> Result<ClassificationResult, PipelineError> {
        info!("calculating threshold for every ROI...");
        check_window(table, self.first_window)?;
        check_window(table, self.second_window)?;

        let mut result = ClassificationResult::default();
        for column in FIRST_ROI_COLUMN..=table.max_column() {
            let metric = self.column_metric(table, column)?;
            // NaN compares false both ways and lands in good
            if metric.difference > self.threshold || metric.difference < 0.0 {
                debug!("wrong {}", metric);
                result.wrong.push(column);
                result.wrong_metrics.push(metric);
            } else {
                debug!("good {}", metric);
                result.good.push(column);
                result.good_metrics.push(metric);
            }
        }
        info!("{} good and {} wrong columns", result.good.len(), result.wrong.len());
        Ok(result)
    }

    /// Computes the percentage difference of one column.
    pub fn column_metric(&self, table: &Table, column: usize) -> Result<ColumnMetric, PipelineError> {
        let name = table.column_name(column);
        let (first, second) = match self.mode {
            ClassificationMode::TwoPoint => (
                self.point(table, column, self.first_window.start, &name)?,
                self.point(table, column, self.second_window.end, &name)?,
            ),
            ClassificationMode::TwoMean => (
                self.mean(table, column, self.first_window, &name)?,
                self.mean(table, column, self.second_window, &name)?,
            ),
        };
        Ok(ColumnMetric {
            difference: calculate_percentage_difference(first, second),
            zero_baseline: second == 0.0,
            name,
        })
    }

    fn point(&self, table: &Table, column: usize, row: usize, name: &str) -> Result<f64, PipelineError> {
        numeric_cell(table, row, column)?.ok_or_else(|| PipelineError::EmptyWindow {
            column: name.to_owned(),
            window: RowRange { start: row, end: row },
        })
    }

    fn mean(&self, table: &Table, column: usize, window: RowRange, name: &str) -> Result<f64, PipelineError> {
        window_mean(table, column, window)?.ok_or_else(|| PipelineError::EmptyWindow {
            column: name.to_owned(),
            window,
        })
    }
}
