//! WebP Conversion Library
//!
//! Produces WebP representations of raster images, preferring a pre-existing
//! WebP asset and falling back to on-demand re-encoding. Two paths share that
//! contract:
//!
//! - [`BatchConverter`] converts a directory of JPEG/PNG files at build time,
//!   and can emit responsive width variants plus `<picture>` markup.
//! - [`ConversionCoordinator`] drives a page session: it probes the asset host
//!   for pre-built twins, re-encodes decoded images into page-local blobs
//!   otherwise, and follows lazy-loaded and dynamically inserted images.
//!
//! # Example
//!
//! ```no_run
//! use webp_forge::{BatchConfig, BatchConverter};
//!
//! let converter = BatchConverter::new(BatchConfig::new("./images", "./images/webp"));
//! let summary = converter.convert_all();
//! println!("{} converted, {} failed", summary.succeeded, summary.failed);
//! ```

#![allow(missing_docs)]

pub mod batch;
pub mod canvas;
pub mod coordinator;
pub mod encoder;
pub mod error;
pub mod page;
pub mod probe;
pub mod types;

// Re-export main types
pub use batch::{BatchConfig, BatchConverter, ImageCodec, MarkupTemplate, RasterCodec};
pub use canvas::{webp_supported, BlobStore, CanvasReencoder, Surface};
pub use coordinator::{
    ConversionCoordinator, ConversionRecord, CoordinatorConfig, ElementState, RecordEntry,
    ScanReport,
};
pub use encoder::WebPEncoder;
pub use error::{
    ConversionError, ConversionResult, EncodingError, EncodingResult, LoadError, LoadResult,
};
pub use page::{ImageElement, IntersectionEntry, Node, Page, PreloadHint};
pub use probe::{FsLoader, HostAllowList, MemoryLoader, Prober, ResourceLoader};
pub use types::{
    ConversionOutcome, ConversionSummary, ImageFormat, PixelFormat, RawImage, ResourceId,
    ResponsiveVariant, WebPConfig, RESPONSIVE_VARIANTS,
};

/// Library version information
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// Get library capabilities
pub fn capabilities() -> String {
    let mut caps = vec!["Batch WebP conversion", "Responsive variants", "Picture markup"];

    if webp_supported() {
        caps.push("In-page re-encoding");
    }

    caps.join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        let version = version();
        assert!(!version.is_empty());
    }

    #[test]
    fn test_capabilities() {
        let caps = capabilities();
        assert!(caps.contains("Batch WebP conversion"));
        assert!(caps.contains("In-page re-encoding"));
    }

    #[test]
    fn test_config_creation() {
        let config = BatchConfig::default();
        assert_eq!(config.webp.quality, 85);
        assert_eq!(config.webp.method, 6);
        assert!(!config.webp.lossless);
    }
}
