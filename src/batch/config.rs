use crate::{
    error::{EncodingError, EncodingResult},
    types::{ImageFormat, WebPConfig},
};
use std::path::{Path, PathBuf};

/// Batch conversion settings
#[derive(Debug, Clone, PartialEq)]
pub struct BatchConfig {
    /// Directory scanned for sources (direct entries only)
    pub input_dir: PathBuf,
    /// Directory receiving `.webp` outputs
    pub output_dir: PathBuf,
    /// Accepted input formats
    pub supported_formats: Vec<ImageFormat>,
    /// Encoder settings for whole-file conversion
    pub webp: WebPConfig,
    /// Encoder settings for responsive variants
    pub responsive_webp: WebPConfig,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("./images"),
            output_dir: PathBuf::from("./images/webp"),
            supported_formats: ImageFormat::INPUTS.to_vec(),
            webp: WebPConfig::batch(),
            responsive_webp: WebPConfig::responsive(),
        }
    }
}

impl BatchConfig {
    /// Default settings for a given pair of directories
    pub fn new(input_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            input_dir: input_dir.into(),
            output_dir: output_dir.into(),
            ..Default::default()
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> EncodingResult<()> {
        if let Some(format) = self.supported_formats.iter().find(|f| !f.is_input()) {
            return Err(EncodingError::UnsupportedFormat(format.to_string()));
        }
        self.webp.validate()?;
        self.responsive_webp.validate()
    }

    /// Whether `path` carries a supported suffix (case-insensitive)
    pub fn is_supported(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(ImageFormat::from_extension)
            .is_some_and(|format| self.supported_formats.contains(&format))
    }

    /// Output path for a source: same base name, `.webp` extension
    pub fn output_path_for(&self, input: &Path) -> PathBuf {
        let stem = input.file_stem().unwrap_or(input.as_os_str());
        let mut name = stem.to_os_string();
        name.push(".webp");
        self.output_dir.join(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = BatchConfig::default();
        assert_eq!(config.input_dir, PathBuf::from("./images"));
        assert_eq!(config.output_dir, PathBuf::from("./images/webp"));
        assert_eq!(config.webp, WebPConfig::batch());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_suffix_filter_is_case_insensitive() {
        let config = BatchConfig::default();
        assert!(config.is_supported(Path::new("a.JPG")));
        assert!(config.is_supported(Path::new("a.jpeg")));
        assert!(config.is_supported(Path::new("a.PnG")));
        assert!(!config.is_supported(Path::new("a.webp")));
        assert!(!config.is_supported(Path::new("notes.txt")));
        assert!(!config.is_supported(Path::new("jpg")));
    }

    #[test]
    fn test_output_path_keeps_base_name() {
        let config = BatchConfig::new("in", "out");
        assert_eq!(
            config.output_path_for(Path::new("in/gem.JPEG")),
            PathBuf::from("out/gem.webp")
        );
        assert_eq!(
            config.output_path_for(Path::new("in/a.b.png")),
            PathBuf::from("out/a.b.webp")
        );
    }

    #[test]
    fn test_webp_input_rejected() {
        let config = BatchConfig {
            supported_formats: vec![ImageFormat::WebP],
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(EncodingError::UnsupportedFormat(_))));
    }

    #[test]
    fn test_out_of_range_effort_rejected() {
        let config = BatchConfig {
            webp: WebPConfig {
                method: 9,
                ..WebPConfig::batch()
            },
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(EncodingError::InvalidMethod(9))));
    }
}
