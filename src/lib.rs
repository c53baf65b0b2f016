//! # ROI Spreadsheet Pipeline
//!
//! Cleans time series of regions of interest (ROI) exported as Excel
//! workbooks, one column per ROI.
//!
//! ## Pipeline
//!
//! 1. **Background subtraction**: column 2 holds a background signal that is
//!    subtracted from every other column, row by row, and then removed.
//! 2. **Classification**: every ROI column gets a percentage difference between
//!    two row windows and is labelled *wrong* above the threshold.
//! 3. **Partition**: good-only and wrong-only copies of the table.
//! 4. **Normalization**: both copies rewritten as `(value - mean) / mean`
//!    against a per-column baseline mean.
//!
//! The numeric core ([`table`], [`pipeline`]) works on in-memory tables only.
//! [`spreadsheet`] loads and writes `.xlsx` workbooks, [`output`] names and
//! writes the derived files and [`cli`] drives a batch of inputs.
//!
//! ```no_run
//! use roi_sheet::pipeline::{Pipeline, ThresholdConfig};
//! use roi_sheet::spreadsheet::open_table;
//!
//! let table = open_table("run1.xlsx")?;
//! let output = Pipeline::new(ThresholdConfig::default()).run(table)?;
//! println!("{} wrong columns", output.classification.wrong.len());
//! # Ok::<(), roi_sheet::error::RoiSheetError>(())
//! ```
pub mod cli;
pub mod error;
pub(crate) mod helpers;
pub mod output;
pub mod pipeline;
pub mod spreadsheet;
pub mod table;
