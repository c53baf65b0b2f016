//! # Output Module
//!
//! Names and writes the files derived from one input workbook: the
//! background-subtracted workbook, the filtered workbook with its good and
//! wrong sheets, and the `name: value` text reports.
use crate::error::RoiSheetError;
use crate::pipeline::PipelineOutput;
use crate::spreadsheet::write_workbook;
use crate::table::Table;
use log::info;
use log::warn;
use std::fmt::Display;
use std::fs::File;
use std::io::BufWriter;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;

const BACKGROUND_SUBTRACTED: &str = "bg-subtracted";
const FILTERED: &str = "filtered_";
const THRESHOLD: &str = "threshold-";
const GOOD: &str = "_good_";
const WRONG: &str = "_wrong_";
const BASELINE: &str = "_baseline_";
const XLSX: &str = ".xlsx";
const TXT: &str = ".txt";

/// Formats a number the way the reports print it: integral values keep a
/// trailing `.0`, others use the shortest round-trip form. Magnitudes below
/// `1e-4` or from `1e16` up switch to exponent notation with a signed, at
/// least two digit exponent (`1e-05`, `1.5e+16`).
pub fn format_number(value: f64) -> String {
    let magnitude = value.abs();
    if value.is_nan() {
        "nan".to_owned()
    } else if value.is_infinite() {
        let sign = if value > 0.0 { "" } else { "-" };
        format!("{}inf", sign)
    } else if magnitude != 0.0 && !(1e-4..1e16).contains(&magnitude) {
        let formatted = format!("{:e}", value);
        match formatted.split_once('e') {
            Some((mantissa, exponent)) => {
                let (sign, digits) = match exponent.strip_prefix('-') {
                    Some(digits) => ('-', digits),
                    None => ('+', exponent),
                };
                format!("{}e{}{:0>2}", mantissa, sign, digits)
            }
            None => formatted,
        }
    } else if value.fract() == 0.0 {
        format!("{:.1}", value)
    } else {
        value.to_string()
    }
}

/// Paths of every file derived from one input workbook.
#[derive(Clone, Debug, PartialEq)]
pub struct OutputFiles {
    pub background_subtracted: PathBuf,
    pub filtered: PathBuf,
    pub good_report: PathBuf,
    pub wrong_report: PathBuf,
    pub baseline_report: PathBuf,
}

impl OutputFiles {
    /// Derives output paths from the input file name and the threshold.
    /// Files land next to the input unless `output_dir` is given.
    pub fn new(input: &Path, threshold: u8, output_dir: Option<&Path>) -> Self {
        let name = input
            .file_stem()
            .map(|stem| stem.to_string_lossy().to_string())
            .unwrap_or_default();
        let directory = output_dir
            .map(Path::to_path_buf)
            .or_else(|| input.parent().map(Path::to_path_buf))
            .unwrap_or_default();
        let threshold = format!("{}{}", THRESHOLD, threshold);
        Self {
            background_subtracted: directory.join(format!("{}_{}{}", name, BACKGROUND_SUBTRACTED, XLSX)),
            filtered: directory.join(format!("{}_{}{}{}", name, FILTERED, threshold, XLSX)),
            good_report: directory.join(format!("{}{}{}{}", name, GOOD, threshold, TXT)),
            wrong_report: directory.join(format!("{}{}{}{}", name, WRONG, threshold, TXT)),
            baseline_report: directory.join(format!("{}{}{}{}", name, BASELINE, threshold, TXT)),
        }
    }

    pub fn paths(&self) -> [&Path; 5] {
        [
            self.background_subtracted.as_path(),
            self.filtered.as_path(),
            self.good_report.as_path(),
            self.wrong_report.as_path(),
            self.baseline_report.as_path(),
        ]
    }
}

/// Writes one `name: value` line per entry.
pub fn write_report<P: AsRef<Path>, T: Display>(path: P, entries: &[T]) -> Result<(), RoiSheetError> {
    let mut writer = BufWriter::new(File::create(path)?);
    for entry in entries {
        writeln!(writer, "{}", entry)?;
    }
    writer.flush()?;
    Ok(())
}

/// Writes every file a pipeline run produced and returns their paths.
///
/// Without a partition only the background-subtracted workbook is written.
/// A failed normalization drops the normalized sheets and the baseline report.
pub fn write_outputs(files: &OutputFiles, output: &PipelineOutput) -> Result<Vec<PathBuf>, RoiSheetError> {
    let mut written = Vec::new();

    if let Some(table) = &output.background_subtracted {
        info!("writing background filtered file: '{}'", files.background_subtracted.display());
        write_workbook(&files.background_subtracted, &[("background_subtracted", table)])?;
        written.push(files.background_subtracted.clone());
    }

    let Some(partition) = &output.partition else {
        return Ok(written);
    };

    info!(
        "writing report files: '{}' and '{}'",
        files.good_report.display(),
        files.wrong_report.display()
    );
    write_report(&files.good_report, &output.classification.good_metrics)?;
    write_report(&files.wrong_report, &output.classification.wrong_metrics)?;
    written.push(files.good_report.clone());
    written.push(files.wrong_report.clone());

    let mut sheets: Vec<(&str, &Table)> = vec![
        ("original", &output.classified),
        ("good", &partition.good),
        ("wrong", &partition.wrong),
    ];
    match &output.normalized {
        Some(Ok(normalized)) => {
            sheets.push(("good_normalized", &normalized.good));
            sheets.push(("wrong_normalized", &normalized.wrong));

            info!("writing baseline report: '{}'", files.baseline_report.display());
            let means: Vec<_> = normalized.good_means.iter().chain(&normalized.wrong_means).collect();
            write_report(&files.baseline_report, &means)?;
            written.push(files.baseline_report.clone());
        }
        Some(Err(error)) => warn!("normalization failed, writing the other outputs only: {}", error),
        None => (),
    }

    info!("writing filtered file: '{}'", files.filtered.display());
    write_workbook(&files.filtered, &sheets)?;
    written.push(files.filtered.clone());
    Ok(written)
}
