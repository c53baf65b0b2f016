use thiserror::Error;

/// Main error type of the crate.
/// Aggregates errors from the standard library, dependencies and internal modules.
#[derive(Error, Debug)]
pub enum RoiSheetError {
    #[error("{0}")]
    WithContextError(String),

    // Standard library errors
    #[error("{0}")]
    IoError(#[from] std::io::Error),

    // Third-party library errors
    #[error("{0}")]
    PatternError(#[from] glob::PatternError),

    #[error("{0}")]
    GlobError(#[from] glob::GlobError),

    #[error("{0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("{0}")]
    XmlError(#[from] quick_xml::Error),

    #[error("{0}")]
    XmlEncodingError(#[from] quick_xml::encoding::EncodingError),

    #[error("{0}")]
    XmlAttributeError(#[from] quick_xml::events::attributes::AttrError),

    #[error("{0}")]
    YamlError(#[from] serde_yaml::Error),

    // Helper module errors
    #[error("{0}")]
    XmlHelperError(#[from] crate::helpers::xml::XmlError),

    // Spreadsheet module errors
    #[error("{0}")]
    SpreadsheetError(#[from] crate::spreadsheet::SpreadsheetError),

    // Table module errors
    #[error("{0}")]
    RangeError(#[from] crate::table::range::RangeError),

    // Pipeline module errors
    #[error("{0}")]
    ConfigError(#[from] crate::pipeline::config::ConfigError),

    #[error("{0}")]
    PipelineError(#[from] crate::pipeline::PipelineError),
}

impl RoiSheetError {
    /// Returns true for errors that must abort the whole invocation
    /// instead of only the file being processed.
    pub fn is_fatal(&self) -> bool {
        match self {
            RoiSheetError::PipelineError(error) => error.is_fatal(),
            _ => false,
        }
    }
}

pub(crate) trait ResultMessage {
    fn with_prefix(self, message: &str) -> Self;
}

impl<T> ResultMessage for Result<T, RoiSheetError> {
    fn with_prefix(self, message: &str) -> Self {
        self.map_err(|e| RoiSheetError::WithContextError(format!("{}: {}", message, e)))
    }
}
