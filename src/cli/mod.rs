//! Command-line interface for the ROI spreadsheet pipeline.

use crate::error::ResultMessage;
use crate::error::RoiSheetError;
use crate::output::write_outputs;
use crate::output::OutputFiles;
use crate::pipeline::config::parse_threshold;
use crate::pipeline::config::ConfigError;
use crate::pipeline::ClassificationMode;
use crate::pipeline::Pipeline;
use crate::pipeline::ThresholdConfig;
use crate::pipeline::ZeroMeanPolicy;
use crate::spreadsheet::check_file_extension;
use crate::spreadsheet::open_table;
use crate::table::range::RangeError;
use crate::table::RowRange;
use anyhow::Context;
use chrono::Local;
use clap::{ArgAction, ArgGroup, Parser};
use log::{error, info, warn, LevelFilter};
use rayon::prelude::*;
use std::collections::HashMap;
use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

const STARS: &str = "******************************************************";

#[derive(Parser, Debug)]
#[command(name = "roi-sheet")]
#[command(about = "Background subtraction, threshold filtering and normalization of ROI time series", version)]
#[command(group(ArgGroup::new("input").required(true).args(["excel", "list"])))]
pub struct Cli {
    /// Excel workbooks to process (.xlsx or .xlsm), glob patterns allowed
    #[arg(short, long, num_args = 1.., value_parser = valid_arg_excel)]
    pub excel: Vec<PathBuf>,

    /// Text file listing one workbook per line
    #[arg(short, long, value_parser = valid_arg_list)]
    pub list: Option<PathBuf>,

    /// Threshold percentage between 0 and 100 [default: 25]
    #[arg(short, long, value_parser = valid_arg_threshold)]
    pub threshold: Option<u8>,

    /// Skip the background subtraction step
    #[arg(short = 's', long)]
    pub skip_bg: bool,

    /// Skip the normalization step
    #[arg(short = 'n', long)]
    pub skip_norm: bool,

    /// Classification mode: two-point or two-mean [default: two-point]
    #[arg(short, long, value_parser = ClassificationMode::parse)]
    pub mode: Option<ClassificationMode>,

    /// First comparison window as start:end [default: 2:2]
    #[arg(long, value_parser = parse_window)]
    pub first_window: Option<RowRange>,

    /// Second comparison window as start:end [default: 27:27]
    #[arg(long, value_parser = parse_window)]
    pub second_window: Option<RowRange>,

    /// Normalization baseline window as start:end [default: first window]
    #[arg(long, value_parser = parse_window)]
    pub baseline_window: Option<RowRange>,

    /// What to do with a zero baseline mean: fail, skip or propagate [default: fail]
    #[arg(long, value_parser = ZeroMeanPolicy::parse)]
    pub zero_mean: Option<ZeroMeanPolicy>,

    /// Directory for output files, next to each input when omitted
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Path to YAML config file, flags take precedence over it
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Process input files in parallel
    #[arg(short, long)]
    pub parallel: bool,

    /// Increase verbosity
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

fn valid_arg_excel(value: &str) -> Result<PathBuf, String> {
    let path = PathBuf::from(value);
    check_file_extension(&path).map_err(|error| error.to_string())?;
    Ok(path)
}

fn valid_arg_list(value: &str) -> Result<PathBuf, String> {
    if value.to_ascii_lowercase().ends_with(".txt") {
        Ok(PathBuf::from(value))
    } else {
        Err(format!("{} is not a valid list. Should be a .txt file", value))
    }
}

fn valid_arg_threshold(value: &str) -> Result<u8, String> {
    parse_threshold(value).map_err(|error| error.to_string())
}

fn parse_window(value: &str) -> Result<RowRange, RangeError> {
    RowRange::try_from(value)
}

impl Cli {
    /// Builds the run configuration: defaults, then the YAML file, then flags.
    pub fn threshold_config(&self) -> Result<ThresholdConfig, RoiSheetError> {
        let mut config = match &self.config {
            Some(path) => {
                let config = ThresholdConfig::from_yaml(path)
                    .with_prefix(&format!("Config file '{}'", path.display()))?;
                info!("loaded config from: {}", path.display());
                config
            }
            None => ThresholdConfig::default(),
        };

        if let Some(threshold) = self.threshold {
            config.threshold = threshold;
        }
        if let Some(mode) = self.mode {
            config.mode = mode;
        }
        if let Some(window) = self.first_window {
            config.first_window = window;
        }
        if let Some(window) = self.second_window {
            config.second_window = window;
        }
        if let Some(window) = self.baseline_window {
            config.baseline_window = Some(window);
        }
        if let Some(policy) = self.zero_mean {
            config.zero_mean_policy = policy;
        }
        if self.skip_bg {
            config.subtract_background = false;
        }
        if self.skip_norm {
            config.normalize = false;
        }

        config.validate()?;
        Ok(config)
    }
}

/// What one successfully processed workbook produced.
#[derive(Debug)]
pub struct FileReport {
    pub input: PathBuf,
    pub good: usize,
    pub wrong: usize,
    pub written: Vec<PathBuf>,
}

/// Outcome of a whole invocation that was not aborted.
#[derive(Debug, Default)]
pub struct BatchSummary {
    pub reports: Vec<FileReport>,
    pub failures: Vec<(PathBuf, RoiSheetError)>,
}

/// Initializes `env_logger`, `-v` raising the level from info to debug and trace.
pub fn init_logging(verbose: u8) {
    env_logger::Builder::new()
        .filter_level(match verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        })
        .format(|buf, record| {
            writeln!(buf, "{} - {}", Local::now().format("%Y-%m-%d %H:%M:%S,%3f"), record.args())
        })
        .init();
}

/// Expands the inputs: list file lines or `--excel` values, glob patterns
/// resolved to the workbooks they match.
pub fn resolve_inputs(cli: &Cli) -> Result<Vec<PathBuf>, RoiSheetError> {
    let entries = match &cli.list {
        Some(list) => read_list(list)?,
        None => cli.excel.clone(),
    };

    let mut inputs = Vec::new();
    for entry in entries {
        let pattern = entry.to_string_lossy().to_string();
        if !pattern.contains(['*', '?', '[']) {
            inputs.push(entry);
            continue;
        }
        let mut matched = 0usize;
        for path in glob::glob(&pattern)? {
            let path = path?;
            match check_file_extension(&path) {
                Ok(()) => {
                    inputs.push(path);
                    matched += 1;
                }
                Err(error) => warn!("skipping '{}': {}", path.display(), error),
            }
        }
        if matched == 0 {
            warn!("pattern '{}' matches no workbook", pattern);
        }
    }
    Ok(inputs)
}

/// Reads a list file, one path per line; blank lines are ignored.
fn read_list(path: &Path) -> Result<Vec<PathBuf>, RoiSheetError> {
    let content = std::fs::read_to_string(path)
        .map_err(RoiSheetError::from)
        .with_prefix(&format!("List file '{}'", path.display()))?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(PathBuf::from)
        .collect())
}

/// Pairs every input with its output files. Repeated inputs are processed
/// once; two inputs sharing an output path are rejected before anything runs.
pub fn plan_outputs(
    inputs: Vec<PathBuf>,
    threshold: u8,
    output_dir: Option<&Path>,
) -> Result<Vec<(PathBuf, OutputFiles)>, RoiSheetError> {
    let mut seen = HashSet::new();
    let mut owners: HashMap<PathBuf, PathBuf> = HashMap::new();
    let mut planned = Vec::with_capacity(inputs.len());
    for input in inputs {
        if !seen.insert(input.clone()) {
            warn!("'{}' is given more than once, processing it once", input.display());
            continue;
        }
        let files = OutputFiles::new(&input, threshold, output_dir);
        for path in files.paths() {
            if let Some(first) = owners.insert(path.to_path_buf(), input.clone()) {
                Err(ConfigError::OutputCollisionError {
                    first: first.display().to_string(),
                    second: input.display().to_string(),
                    output: path.display().to_string(),
                })?
            }
        }
        planned.push((input, files));
    }
    Ok(planned)
}

/// Loads one workbook, runs the pipeline on it and writes its outputs.
///
/// A failed normalization is returned after the other outputs are written.
pub fn process_file(path: &Path, files: &OutputFiles, pipeline: &Pipeline) -> Result<FileReport, RoiSheetError> {
    info!("********* {} *********", path.display());
    info!("opening file...");
    let table = open_table(path)?;
    let output = pipeline.run(table)?;
    let written = write_outputs(files, &output)?;
    if let Some(Err(error)) = output.normalized {
        return Err(error.into());
    }
    info!("{}", STARS);
    Ok(FileReport {
        input: path.to_path_buf(),
        good: output.classification.good.len(),
        wrong: output.classification.wrong.len(),
        written,
    })
}

/// Processes every input independently.
///
/// A failing file is logged and recorded, and the batch goes on. A fatal
/// error stops the batch and is returned.
pub fn execute(cli: &Cli) -> Result<BatchSummary, RoiSheetError> {
    let config = cli.threshold_config()?;
    info!("************** THRESHOLD IS SET TO: {}% **************", config.threshold);
    if !config.subtract_background {
        info!("************** BACKGROUND SUBTRACTION STEP WILL BE SKIPPED **************");
    }
    if !config.normalize {
        info!("************** NORMALIZATION STEP WILL BE SKIPPED **************");
    }
    info!("{}", STARS);

    let output_dir = cli.output_dir.as_deref();
    let inputs = plan_outputs(resolve_inputs(cli)?, config.threshold, output_dir)?;
    if let Some(directory) = output_dir {
        std::fs::create_dir_all(directory)?;
    }

    let pipeline = Pipeline::new(config);
    let process = |(path, files): &(PathBuf, OutputFiles)| match process_file(path, files, &pipeline) {
        Ok(report) => Ok(Ok(report)),
        Err(error) if error.is_fatal() => {
            error!("{}: {}", path.display(), error);
            Err(error)
        }
        Err(error) => {
            error!("{}: {}", path.display(), error);
            Ok(Err((path.clone(), error)))
        }
    };

    let outcomes = if cli.parallel {
        inputs.par_iter().map(&process).collect::<Result<Vec<_>, _>>()?
    } else {
        inputs.iter().map(&process).collect::<Result<Vec<_>, _>>()?
    };

    let mut summary = BatchSummary::default();
    for outcome in outcomes {
        match outcome {
            Ok(report) => summary.reports.push(report),
            Err(failure) => summary.failures.push(failure),
        }
    }
    info!(
        "{} file(s) processed, {} failed",
        summary.reports.len(),
        summary.failures.len()
    );
    Ok(summary)
}

pub fn run() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let summary = execute(&cli).context("Processing aborted")?;
    if summary.failures.is_empty() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}
