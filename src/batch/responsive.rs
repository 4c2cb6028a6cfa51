//! Fixed-width responsive WebP variants of a single source

use super::{codec::EncodeRequest, converter::file_name, BatchConverter};
use crate::types::{ConversionOutcome, ResponsiveVariant, RESPONSIVE_VARIANTS};

use std::{
    fs,
    path::{Path, PathBuf},
};

/// `<base><suffix>.webp`, e.g. `gem-md.webp`
pub fn variant_file_name(base: &str, variant: &ResponsiveVariant) -> String {
    format!("{}{}.webp", base, variant.suffix)
}

impl BatchConverter {
    /// Write one variant per entry of [`RESPONSIVE_VARIANTS`] into `output_dir`.
    ///
    /// Each variant is attempted independently; a failure is logged and the
    /// remaining widths are still produced. Sources narrower than a target
    /// width are kept at their natural size.
    pub fn generate_responsive_images(
        &self,
        input: &Path,
        output_dir: &Path,
    ) -> Vec<ConversionOutcome> {
        let base = input
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();

        if let Err(e) = fs::create_dir_all(output_dir) {
            log::warn!("Cannot create {}: {}", output_dir.display(), e);
        }

        RESPONSIVE_VARIANTS
            .iter()
            .map(|variant| {
                let output: PathBuf = output_dir.join(variant_file_name(&base, variant));
                let request = EncodeRequest::new(self.config().responsive_webp.clone())
                    .with_max_width(variant.width);

                let result = match self.codec().convert(input, &output, &request) {
                    Ok(written) => {
                        log::info!(
                            "Generated: {} ({}px, {}x{})",
                            file_name(&output),
                            variant.width,
                            written.width,
                            written.height
                        );
                        Ok(written.bytes)
                    }
                    Err(e) => {
                        log::error!("Failed to generate {}: {}", output.display(), e);
                        Err(e.to_string())
                    }
                };

                ConversionOutcome {
                    source: input.to_path_buf(),
                    target: output,
                    result,
                }
            })
            .collect()
    }
}
