//! Run parameters of one pipeline invocation.
//!
//! Values come from command line flags layered over an optional YAML file and
//! are validated once, before any workbook is opened.
use crate::error::RoiSheetError;
use crate::table::RowRange;
use serde::Deserialize;
use std::fmt::Display;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

/// Column holding the background signal.
pub const BACKGROUND_COLUMN_INDEX: usize = 2;
/// First row below the header.
pub const FIRST_DATA_ROW: usize = 2;
/// First column after the row labels.
pub const FIRST_ROI_COLUMN: usize = 2;

pub const DEFAULT_THRESHOLD: u8 = 25;
pub const DEFAULT_FIRST_WINDOW: RowRange = RowRange { start: 2, end: 2 };
pub const DEFAULT_SECOND_WINDOW: RowRange = RowRange { start: 27, end: 27 };

/// Errors related to run parameter parsing and validation.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Threshold value should be a number between 0 and 100, got '{0}'")]
    ThresholdError(String),

    #[error("Invalid classification mode '{0}', expected 'two-point' or 'two-mean'")]
    ModeError(String),

    #[error("Invalid zero mean policy '{0}', expected 'fail', 'skip' or 'propagate'")]
    ZeroMeanPolicyError(String),

    #[error("Window '{0}' includes the header row, data rows start at 2")]
    HeaderWindowError(RowRange),

    #[error("Inputs '{first}' and '{second}' would both write '{output}'")]
    OutputCollisionError { first: String, second: String, output: String },
}

/// How the two values compared by the classifier are taken from a column.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub enum ClassificationMode {
    /// Cell at the first row of the first window against the cell at the
    /// last row of the second window
    #[default]
    TwoPoint,
    /// Mean of the first window against mean of the second window
    TwoMean,
}

impl ClassificationMode {
    pub const fn as_str(&self) -> &'static str {
        match self {
            ClassificationMode::TwoPoint => "two-point",
            ClassificationMode::TwoMean => "two-mean",
        }
    }

    /// Parses a mode name; case, `_` and `-` are not significant.
    pub fn parse(name: &str) -> Result<Self, ConfigError> {
        match name.trim().replace(['_', '-'], "").to_ascii_uppercase().as_str() {
            "TWOPOINT" | "POINT" | "POINTS" => Ok(Self::TwoPoint),
            "TWOMEAN" | "MEAN" | "MEANS" => Ok(Self::TwoMean),
            _ => Err(ConfigError::ModeError(name.to_string())),
        }
    }
}

/// Behaviour of the normalizer when a baseline mean is exactly zero.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub enum ZeroMeanPolicy {
    /// Abort the file with a zero baseline error
    #[default]
    Fail,
    /// Leave the column untouched
    Skip,
    /// Divide anyway, yielding infinities and NaN
    Propagate,
}

impl ZeroMeanPolicy {
    pub const fn as_str(&self) -> &'static str {
        match self {
            ZeroMeanPolicy::Fail => "fail",
            ZeroMeanPolicy::Skip => "skip",
            ZeroMeanPolicy::Propagate => "propagate",
        }
    }

    pub fn parse(name: &str) -> Result<Self, ConfigError> {
        match name.trim().to_ascii_uppercase().as_str() {
            "FAIL" | "ERROR" => Ok(Self::Fail),
            "SKIP" | "IGNORE" => Ok(Self::Skip),
            "PROPAGATE" | "DIVIDE" => Ok(Self::Propagate),
            _ => Err(ConfigError::ZeroMeanPolicyError(name.to_string())),
        }
    }
}

macro_rules! impl_parsed_enum {
    ($name:ident) => {
        impl TryFrom<String> for $name {
            type Error = ConfigError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                $name::parse(&value)
            }
        }

        impl FromStr for $name {
            type Err = ConfigError;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                $name::parse(value)
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

impl_parsed_enum!(ClassificationMode);
impl_parsed_enum!(ZeroMeanPolicy);

/// Parses a threshold percentage, accepting integers from 0 to 100.
pub fn parse_threshold(value: &str) -> Result<u8, ConfigError> {
    value
        .trim()
        .parse::<u8>()
        .ok()
        .filter(|threshold| *threshold <= 100)
        .ok_or_else(|| ConfigError::ThresholdError(value.to_string()))
}

/// Immutable parameters of one pipeline run.
///
/// Windows are written as `"start:end"` strings in YAML, e.g.
///
/// ```yaml
/// threshold: 30
/// mode: two-mean
/// first_window: "2:6"
/// second_window: "23:27"
/// zero_mean_policy: skip
/// ```
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ThresholdConfig {
    /// Maximum accepted percentage difference
    pub threshold: u8,
    pub first_window: RowRange,
    pub second_window: RowRange,
    /// Rows averaged into the normalization baseline, the first window when unset
    pub baseline_window: Option<RowRange>,
    pub subtract_background: bool,
    pub normalize: bool,
    pub mode: ClassificationMode,
    pub zero_mean_policy: ZeroMeanPolicy,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            first_window: DEFAULT_FIRST_WINDOW,
            second_window: DEFAULT_SECOND_WINDOW,
            baseline_window: None,
            subtract_background: true,
            normalize: true,
            mode: ClassificationMode::default(),
            zero_mean_policy: ZeroMeanPolicy::default(),
        }
    }
}

impl ThresholdConfig {
    /// Loads and validates a configuration file.
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> Result<Self, RoiSheetError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self, RoiSheetError> {
        let config: ThresholdConfig = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn baseline_window(&self) -> RowRange {
        self.baseline_window.unwrap_or(self.first_window)
    }

    /// Checks the threshold range and that no window reaches into the header row.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.threshold > 100 {
            return Err(ConfigError::ThresholdError(self.threshold.to_string()));
        }
        for window in [self.first_window, self.second_window, self.baseline_window()] {
            if window.start < FIRST_DATA_ROW {
                return Err(ConfigError::HeaderWindowError(window));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = ThresholdConfig::default();
        assert_eq!(config.threshold, 25);
        assert_eq!(config.first_window, RowRange::single(2).unwrap());
        assert_eq!(config.second_window, RowRange::single(27).unwrap());
        assert_eq!(config.baseline_window(), config.first_window);
        assert!(config.subtract_background);
        assert!(config.normalize);
        assert_eq!(config.mode, ClassificationMode::TwoPoint);
        assert_eq!(config.zero_mean_policy, ZeroMeanPolicy::Fail);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn threshold_parsing() {
        assert_eq!(parse_threshold("0").unwrap(), 0);
        assert_eq!(parse_threshold(" 100 ").unwrap(), 100);
        assert!(matches!(parse_threshold("101"), Err(ConfigError::ThresholdError(_))));
        assert!(matches!(parse_threshold("-1"), Err(ConfigError::ThresholdError(_))));
        assert!(matches!(parse_threshold("ten"), Err(ConfigError::ThresholdError(_))));
    }

    #[test]
    fn mode_and_policy_aliases() {
        assert_eq!(ClassificationMode::parse("two-point").unwrap(), ClassificationMode::TwoPoint);
        assert_eq!(ClassificationMode::parse("TWO_MEAN").unwrap(), ClassificationMode::TwoMean);
        assert_eq!("mean".parse::<ClassificationMode>().unwrap(), ClassificationMode::TwoMean);
        assert!(ClassificationMode::parse("median").is_err());
        assert_eq!(ZeroMeanPolicy::parse("Skip").unwrap(), ZeroMeanPolicy::Skip);
        assert_eq!(ZeroMeanPolicy::Propagate.to_string(), "propagate");
        assert!(ZeroMeanPolicy::parse("retry").is_err());
    }

    #[test]
    fn yaml_overrides_defaults() {
        let config = ThresholdConfig::from_yaml_str(
            "threshold: 30\nmode: two-mean\nfirst_window: \"2:6\"\nsecond_window: \"23:27\"\nnormalize: false\n",
        )
        .unwrap();
        assert_eq!(config.threshold, 30);
        assert_eq!(config.mode, ClassificationMode::TwoMean);
        assert_eq!(config.first_window, RowRange::new(2, 6).unwrap());
        assert_eq!(config.baseline_window(), RowRange::new(2, 6).unwrap());
        assert!(!config.normalize);
        assert!(config.subtract_background);
    }

    #[test]
    fn yaml_rejects_invalid_values() {
        for content in [
            "threshold: 101\n",
            "first_window: \"1:3\"\n",
            "second_window: \"9:3\"\n",
            "mode: median\n",
            "unknown_key: 1\n",
        ] {
            assert!(ThresholdConfig::from_yaml_str(content).is_err(), "{}", content);
        }
    }

    #[test]
    fn header_window_is_rejected() {
        let config = ThresholdConfig {
            baseline_window: Some(RowRange::new(1, 4).unwrap()),
            ..ThresholdConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::HeaderWindowError(_))));
    }
}
