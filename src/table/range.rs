use regex::Regex;
use serde::Deserialize;
use std::fmt::Display;
use std::str::FromStr;
use thiserror::Error;

/// Errors related to row range parsing.
#[derive(Error, Debug)]
pub enum RangeError {
    #[error("Invalid row range format '{0}', expected 'start:end' or 'row'")]
    FormatError(String),

    #[error("Invalid row range '{0}': rows start at 1 and start must not exceed end")]
    BoundsError(String),
}

/// Inclusive span of 1-based rows.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub struct RowRange {
    pub start: usize,
    pub end: usize,
}

impl RowRange {
    pub fn new(start: usize, end: usize) -> Result<Self, RangeError> {
        if start == 0 || start > end {
            Err(RangeError::BoundsError(format!("{start}:{end}")))
        } else {
            Ok(RowRange { start, end })
        }
    }

    /// Range covering a single row.
    pub fn single(row: usize) -> Result<Self, RangeError> {
        Self::new(row, row)
    }

    pub fn rows(&self) -> std::ops::RangeInclusive<usize> {
        self.start..=self.end
    }
}

impl TryFrom<&str> for RowRange {
    type Error = RangeError;

    /// Parses "start:end" (e.g. "2:27") or a single row ("5").
    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let pattern = Regex::new(r"^\s*(\d+)\s*(:\s*(\d+)\s*)?$").expect("Hardcode regex pattern");
        let captures = pattern
            .captures(value)
            .ok_or(RangeError::FormatError(value.to_owned()))?;
        let parse = |text: &str| {
            text.parse::<usize>()
                .map_err(|_| RangeError::FormatError(value.to_owned()))
        };
        let start = parse(&captures[1])?;
        let end = match captures.get(3) {
            Some(matcher) => parse(matcher.as_str())?,
            None => start,
        };
        RowRange::new(start, end)
    }
}

impl TryFrom<String> for RowRange {
    type Error = RangeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        RowRange::try_from(value.as_str())
    }
}

impl FromStr for RowRange {
    type Err = RangeError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        RowRange::try_from(value)
    }
}

impl Display for RowRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.start, self.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_parse_span() {
        let range = RowRange::try_from("2:27").unwrap();
        assert_eq!(range, RowRange { start: 2, end: 27 });
        assert_eq!(range.rows().count(), 26);
    }

    #[test]
    fn range_parse_single_row() {
        let range: RowRange = "5".parse().unwrap();
        assert_eq!(range, RowRange { start: 5, end: 5 });
        assert_eq!(range.to_string(), "5:5");
    }

    #[test]
    fn range_parse_rejects_garbage() {
        assert!(matches!(RowRange::try_from("A1:B2"), Err(RangeError::FormatError(_))));
        assert!(matches!(RowRange::try_from("2:"), Err(RangeError::FormatError(_))));
        assert!(matches!(RowRange::try_from(""), Err(RangeError::FormatError(_))));
    }

    #[test]
    fn range_parse_rejects_reversed_or_zero() {
        assert!(matches!(RowRange::try_from("10:2"), Err(RangeError::BoundsError(_))));
        assert!(matches!(RowRange::try_from("0:3"), Err(RangeError::BoundsError(_))));
    }

    #[test]
    fn range_deserialize_from_string() {
        let range: RowRange = serde_yaml::from_str("\"3:7\"").unwrap();
        assert_eq!(range, RowRange { start: 3, end: 7 });
    }
}
