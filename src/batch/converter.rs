use super::{
    codec::{EncodeRequest, ImageCodec, RasterCodec},
    config::BatchConfig,
    markup::MarkupTemplate,
};
use crate::types::{ConversionOutcome, ConversionSummary};

use std::{
    fs,
    path::{Path, PathBuf},
};

/// Converts every supported image in a directory to WebP, one file at a time
pub struct BatchConverter {
    config: BatchConfig,
    codec: Box<dyn RasterCodec>,
}

impl Default for BatchConverter {
    fn default() -> Self {
        Self::new(BatchConfig::default())
    }
}

impl BatchConverter {
    pub fn new(config: BatchConfig) -> Self {
        Self::with_codec(config, Box::new(ImageCodec::new()))
    }

    pub fn with_codec(config: BatchConfig, codec: Box<dyn RasterCodec>) -> Self {
        Self { config, codec }
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    pub(crate) fn codec(&self) -> &dyn RasterCodec {
        self.codec.as_ref()
    }

    /// Create the output directory (and parents) if absent
    pub fn ensure_output_dir(&self) -> std::io::Result<()> {
        fs::create_dir_all(&self.config.output_dir)
    }

    /// Supported files directly inside the input directory, sorted by name.
    ///
    /// Empty when the input directory does not exist.
    pub fn image_files(&self) -> Vec<PathBuf> {
        let entries = match fs::read_dir(&self.config.input_dir) {
            Ok(entries) => entries,
            Err(_) => {
                log::info!(
                    "Input directory {} does not exist",
                    self.config.input_dir.display()
                );
                return Vec::new();
            }
        };

        let mut files: Vec<PathBuf> = entries
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| path.is_file() && self.config.is_supported(path))
            .collect();
        files.sort();
        files
    }

    /// Convert one file, logging the result
    pub fn convert_image(&self, input: &Path, output: &Path) -> ConversionOutcome {
        let request = EncodeRequest::new(self.config.webp.clone());
        let result = match self.codec.convert(input, output, &request) {
            Ok(written) => {
                log::info!("Converted: {} -> {}", file_name(input), file_name(output));
                Ok(written.bytes)
            }
            Err(e) => {
                log::error!("Failed to convert {}: {}", input.display(), e);
                Err(e.to_string())
            }
        };

        ConversionOutcome {
            source: input.to_path_buf(),
            target: output.to_path_buf(),
            result,
        }
    }

    /// Convert every supported file in the input directory.
    ///
    /// Never fails. The output directory is created first, even when the
    /// input directory is missing; a missing input or an empty match set is
    /// logged and yields an empty summary, and per-file failures are tallied.
    pub fn convert_all(&self) -> ConversionSummary {
        log::info!("Starting WebP conversion with {}", self.codec.name());
        let mut summary = ConversionSummary::default();

        if let Err(e) = self.ensure_output_dir() {
            log::error!(
                "Cannot create output directory {}: {}",
                self.config.output_dir.display(),
                e
            );
            return summary;
        }

        let files = self.image_files();
        if files.is_empty() {
            log::info!("No images found to convert");
            return summary;
        }
        log::info!("Found {} images to convert", files.len());

        for input in &files {
            let output = self.config.output_path_for(input);
            summary.record(self.convert_image(input, &output));
        }

        log::info!(
            "Conversion complete: {} succeeded, {} failed",
            summary.succeeded,
            summary.failed
        );
        summary
    }

    /// Picture-element markup for `files` using the default template
    pub fn generate_picture_elements<S: AsRef<str>>(&self, files: &[S]) -> String {
        MarkupTemplate::default().picture_elements(files)
    }
}

pub(crate) fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::codec::CodecOutput;
    use crate::error::{ConversionError, ConversionResult};
    use parking_lot::Mutex;
    use std::sync::Arc;
    use tempfile::TempDir;

    /// Records calls, fails on names containing "bad"
    struct ScriptedCodec {
        calls: Arc<Mutex<Vec<PathBuf>>>,
    }

    impl RasterCodec for ScriptedCodec {
        fn convert(
            &self,
            input: &Path,
            output: &Path,
            _request: &EncodeRequest,
        ) -> ConversionResult<CodecOutput> {
            self.calls.lock().push(input.to_path_buf());
            if file_name(input).contains("bad") {
                return Err(ConversionError::Other(anyhow::anyhow!("corrupt header")));
            }
            fs::write(output, b"RIFF")?;
            Ok(CodecOutput {
                width: 1,
                height: 1,
                bytes: 4,
            })
        }

        fn name(&self) -> &str {
            "ScriptedCodec"
        }
    }

    fn touch(dir: &Path, name: &str) {
        fs::write(dir.join(name), b"x").unwrap();
    }

    #[test]
    fn test_attempts_only_matching_files() {
        let dir = TempDir::new().unwrap();
        for name in ["a.jpg", "b.JPEG", "c.png", "bad.png", "notes.txt", "d.webp", "e.gif"] {
            touch(dir.path(), name);
        }
        fs::create_dir(dir.path().join("nested.jpg")).unwrap();

        let calls = Arc::new(Mutex::new(Vec::new()));
        let config = BatchConfig::new(dir.path(), dir.path().join("webp"));
        let codec = ScriptedCodec {
            calls: calls.clone(),
        };
        let converter = BatchConverter::with_codec(config, Box::new(codec));

        let summary = converter.convert_all();
        assert_eq!(calls.lock().len(), 4);
        assert_eq!(summary.attempted(), 4);
        assert_eq!((summary.succeeded, summary.failed), (3, 1));
        assert!(dir.path().join("webp/a.webp").exists());
        assert!(dir.path().join("webp/b.webp").exists());
        assert!(!dir.path().join("webp/bad.webp").exists());
    }

    #[test]
    fn test_missing_input_dir_still_creates_output() {
        let dir = TempDir::new().unwrap();
        let config = BatchConfig::new(dir.path().join("images"), dir.path().join("webp"));
        let summary = BatchConverter::new(config).convert_all();

        assert_eq!(summary, ConversionSummary::default());
        assert!(!dir.path().join("images").exists());
        assert!(dir.path().join("webp").is_dir());
    }

    #[test]
    fn test_empty_match_set() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "readme.md");
        let config = BatchConfig::new(dir.path(), dir.path().join("out"));
        let summary = BatchConverter::new(config).convert_all();

        assert_eq!(summary.attempted(), 0);
        assert!(dir.path().join("out").is_dir());
    }

    #[test]
    fn test_image_files_sorted() {
        let dir = TempDir::new().unwrap();
        for name in ["z.png", "a.jpg", "m.jpeg"] {
            touch(dir.path(), name);
        }
        let converter = BatchConverter::new(BatchConfig::new(dir.path(), dir.path().join("webp")));
        let names: Vec<String> = converter.image_files().iter().map(|p| file_name(p)).collect();
        assert_eq!(names, vec!["a.jpg", "m.jpeg", "z.png"]);
    }
}
