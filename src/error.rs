//! Error types for the webp-forge library

use thiserror::Error;

/// Error type for WebP encoding operations
#[derive(Error, Debug)]
pub enum EncodingError {
    /// Invalid image dimensions
    #[error("Invalid image dimensions: {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    /// Pixel buffer shorter than width * height * bytes per pixel
    #[error("Pixel buffer too small: need {required} bytes, got {provided}")]
    BufferTooSmall { required: usize, provided: usize },

    /// Unsupported target MIME type
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// The codec could not produce a byte stream
    #[error("WebP encoding failed: {0}")]
    EncodingFailed(String),

    /// Invalid quality parameter
    #[error("Invalid quality parameter: {0} (must be 0-100)")]
    InvalidQuality(u8),

    /// Invalid compression method
    #[error("Invalid compression method: {0} (must be 0-6)")]
    InvalidMethod(u8),

    /// Other encoding errors
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Error type for loading a resource or waiting for an element to decode
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    /// Nothing is served at the identity
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// The resource exists but is not a decodable image
    #[error("Failed to decode {id}: {reason}")]
    Decode { id: String, reason: String },

    /// The load did not settle within the configured bound
    #[error("Load timeout: {id} exceeded {timeout_ms}ms")]
    Timeout { id: String, timeout_ms: u64 },

    /// The loader went away before answering
    #[error("Loader disconnected while loading {0}")]
    Disconnected(String),
}

/// Error type for a single conversion (batch file or page element)
#[derive(Error, Debug)]
pub enum ConversionError {
    /// Input file is missing
    #[error("Source not found: {0}")]
    SourceNotFound(String),

    /// Input suffix is not one of the supported raster formats
    #[error("Unsupported input format: {0}")]
    UnsupportedFormat(String),

    /// Decoding the source failed
    #[error("Decode error: {0}")]
    Decode(#[from] image::ImageError),

    /// Encoding error
    #[error("Encoding error: {0}")]
    Encoding(#[from] EncodingError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Other errors
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type for encoding operations
pub type EncodingResult<T> = Result<T, EncodingError>;

/// Result type for resource loads
pub type LoadResult<T> = Result<T, LoadError>;

/// Result type for conversions
pub type ConversionResult<T> = Result<T, ConversionError>;

impl EncodingError {
    /// Check if the error is related to invalid parameters
    pub fn is_parameter_error(&self) -> bool {
        matches!(
            self,
            EncodingError::InvalidDimensions { .. }
                | EncodingError::BufferTooSmall { .. }
                | EncodingError::InvalidQuality(_)
                | EncodingError::InvalidMethod(_)
        )
    }
}

impl LoadError {
    /// A missing resource is an expected answer to a probe, not a fault
    pub fn is_expected(&self) -> bool {
        matches!(self, LoadError::NotFound(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encoding_error_display() {
        let err = EncodingError::InvalidQuality(150);
        assert_eq!(
            err.to_string(),
            "Invalid quality parameter: 150 (must be 0-100)"
        );
    }

    #[test]
    fn test_load_error_display() {
        let err = LoadError::Timeout {
            id: "a.webp".to_string(),
            timeout_ms: 250,
        };
        assert_eq!(err.to_string(), "Load timeout: a.webp exceeded 250ms");
    }

    #[test]
    fn test_is_expected() {
        assert!(LoadError::NotFound("x.webp".into()).is_expected());
        assert!(!LoadError::Disconnected("x.webp".into()).is_expected());
    }

    #[test]
    fn test_conversion_error_from_encoding() {
        let err: ConversionError = EncodingError::InvalidMethod(9).into();
        assert!(err.to_string().starts_with("Encoding error:"));
    }
}
