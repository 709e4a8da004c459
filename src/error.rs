//! Error types for table parsing, rendering and export.

use thiserror::Error;

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while reading pages, building options or exporting charts.
#[derive(Debug, Error)]
pub enum Error {
    /// The page or graphic markup could not be read.
    #[error("markup error: {0}")]
    Markup(String),

    /// A settings profile could not be (de)serialized.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A chart export failed.
    #[error("export failed: {0}")]
    Export(#[from] ExportError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<quick_xml::Error> for Error {
    fn from(err: quick_xml::Error) -> Self {
        Error::Markup(err.to_string())
    }
}

impl From<quick_xml::events::attributes::AttrError> for Error {
    fn from(err: quick_xml::events::attributes::AttrError) -> Self {
        Error::Markup(err.to_string())
    }
}

/// Failures of a single export action.
///
/// None of these affect other charts on the page; the action that raised
/// one simply ends.
#[derive(Debug, Error)]
pub enum ExportError {
    /// The host cannot build binary blobs.
    #[error("binary blobs are not supported by this environment")]
    UnsupportedEnvironment,

    /// No single drawable `svg` element could be resolved from the source.
    #[error("no drawable svg element found")]
    MissingSource,

    #[error("invalid data URI: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("failed to decode svg: {0}")]
    Svg(#[from] resvg::usvg::Error),

    #[error("invalid raster size {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    #[error("failed to encode image: {0}")]
    Encode(#[from] image::ImageError),

    /// The host refused to store the file.
    #[error("failed to save {filename}: {reason}")]
    Save { filename: String, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn export_error_converts_into_error() {
        let err: Error = ExportError::MissingSource.into();
        assert!(matches!(err, Error::Export(ExportError::MissingSource)));
        assert_eq!(err.to_string(), "export failed: no drawable svg element found");
    }

    #[test]
    fn invalid_dimensions_display() {
        let err = ExportError::InvalidDimensions { width: 0, height: 10 };
        assert_eq!(err.to_string(), "invalid raster size 0x10");
    }
}
