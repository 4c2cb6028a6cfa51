//! Core types shared by the batch converter and the page coordinator

use crate::error::{EncodingError, EncodingResult};

use std::fmt;
use std::path::PathBuf;

/// Raster formats the pipeline understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageFormat {
    /// JPEG, `.jpg` spelling
    Jpg,
    /// JPEG, `.jpeg` spelling
    Jpeg,
    /// PNG
    Png,
    /// WebP, the conversion target
    WebP,
}

impl ImageFormat {
    /// Formats accepted as conversion inputs
    pub const INPUTS: [ImageFormat; 3] = [ImageFormat::Jpg, ImageFormat::Jpeg, ImageFormat::Png];

    /// File extension without the leading dot
    pub fn extension(&self) -> &'static str {
        match self {
            ImageFormat::Jpg => "jpg",
            ImageFormat::Jpeg => "jpeg",
            ImageFormat::Png => "png",
            ImageFormat::WebP => "webp",
        }
    }

    /// MIME type
    pub fn mime_type(&self) -> &'static str {
        match self {
            ImageFormat::Jpg | ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::Png => "image/png",
            ImageFormat::WebP => "image/webp",
        }
    }

    /// Parse an extension, ignoring case and an optional leading dot
    pub fn from_extension(ext: &str) -> Option<Self> {
        let ext = ext.strip_prefix('.').unwrap_or(ext);
        [
            ImageFormat::Jpg,
            ImageFormat::Jpeg,
            ImageFormat::Png,
            ImageFormat::WebP,
        ]
        .into_iter()
        .find(|f| f.extension().eq_ignore_ascii_case(ext))
    }

    /// Whether this format is a conversion input
    pub fn is_input(&self) -> bool {
        !matches!(self, ImageFormat::WebP)
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, ".{}", self.extension())
    }
}

/// Case-insensitive `strip_suffix` for ASCII suffixes
fn strip_suffix_ignore_case<'a>(s: &'a str, suffix: &str) -> Option<&'a str> {
    let split = s.len().checked_sub(suffix.len())?;
    if !s.is_char_boundary(split) {
        return None;
    }
    let (head, tail) = s.split_at(split);
    tail.eq_ignore_ascii_case(suffix).then_some(head)
}

/// Locator of an image resource: a filesystem path, a URL or a blob handle.
///
/// Identities are never edited in place; suffix substitution derives a new one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(String);

impl ResourceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Format named by the trailing suffix
    pub fn format(&self) -> Option<ImageFormat> {
        [
            ImageFormat::Jpeg,
            ImageFormat::Jpg,
            ImageFormat::Png,
            ImageFormat::WebP,
        ]
        .into_iter()
        .find(|f| strip_suffix_ignore_case(&self.0, &f.to_string()).is_some())
    }

    /// Whether the identity ends in `.jpg`, `.jpeg` or `.png` (any case)
    pub fn has_input_suffix(&self) -> bool {
        self.format().is_some_and(|f| f.is_input())
    }

    /// Same identity with the trailing input suffix swapped for `.webp`
    pub fn with_webp_suffix(&self) -> Option<ResourceId> {
        ImageFormat::INPUTS.iter().find_map(|f| {
            strip_suffix_ignore_case(&self.0, &f.to_string())
                .map(|stem| ResourceId(format!("{}.webp", stem)))
        })
    }

    /// Last path segment without its extension
    pub fn base_name(&self) -> &str {
        let name = self.0.rsplit(&['/', '\\'][..]).next().unwrap_or(&self.0);
        match name.rfind('.') {
            Some(0) | None => name,
            Some(dot) => &name[..dot],
        }
    }

    /// Whether the identity is a page-local blob handle
    pub fn is_blob(&self) -> bool {
        self.0.starts_with("blob:")
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ResourceId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ResourceId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Pixel format for raw image data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// Red, Green, Blue, Alpha (8 bits per channel)
    RGBA8,
    /// Blue, Green, Red, Alpha (8 bits per channel)
    BGRA8,
    /// Red, Green, Blue (8 bits per channel)
    RGB8,
    /// Blue, Green, Red (8 bits per channel)
    BGR8,
}

impl PixelFormat {
    /// Get the number of bytes per pixel
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            PixelFormat::RGBA8 | PixelFormat::BGRA8 => 4,
            PixelFormat::RGB8 | PixelFormat::BGR8 => 3,
        }
    }

    /// Check if the format has an alpha channel
    pub fn has_alpha(&self) -> bool {
        matches!(self, PixelFormat::RGBA8 | PixelFormat::BGRA8)
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PixelFormat::RGBA8 => write!(f, "RGBA8"),
            PixelFormat::BGRA8 => write!(f, "BGRA8"),
            PixelFormat::RGB8 => write!(f, "RGB8"),
            PixelFormat::BGR8 => write!(f, "BGR8"),
        }
    }
}

/// Decoded image pixels
#[derive(Debug, Clone)]
pub struct RawImage {
    /// Pixel data
    pub data: Vec<u8>,
    /// Natural width in pixels
    pub width: u32,
    /// Natural height in pixels
    pub height: u32,
    /// Pixel format
    pub format: PixelFormat,
    /// Stride (bytes per row, may include padding)
    pub stride: usize,
}

impl RawImage {
    /// Create a new RawImage with a tightly packed stride
    pub fn new(data: Vec<u8>, width: u32, height: u32, format: PixelFormat) -> Self {
        let stride = (width as usize) * format.bytes_per_pixel();
        Self {
            data,
            width,
            height,
            format,
            stride,
        }
    }

    /// Solid-colour RGBA image
    pub fn solid(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let data = rgba
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * 4)
            .collect();
        Self::new(data, width, height, PixelFormat::RGBA8)
    }

    /// Get the total size in bytes
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Check if the image data covers every row
    pub fn is_valid(&self) -> bool {
        let expected_size = self.stride * (self.height as usize);
        self.data.len() >= expected_size
    }

    /// Get a pixel at the given coordinates
    pub fn get_pixel(&self, x: u32, y: u32) -> Option<&[u8]> {
        if x >= self.width || y >= self.height {
            return None;
        }

        let pixel_size = self.format.bytes_per_pixel();
        let offset = (y as usize) * self.stride + (x as usize) * pixel_size;

        self.data.get(offset..offset + pixel_size)
    }
}

impl From<image::DynamicImage> for RawImage {
    /// Opaque sources stay three-channel; anything with alpha becomes RGBA
    fn from(img: image::DynamicImage) -> Self {
        let (width, height) = (img.width(), img.height());
        if img.color().has_alpha() {
            RawImage::new(img.to_rgba8().into_raw(), width, height, PixelFormat::RGBA8)
        } else {
            RawImage::new(img.to_rgb8().into_raw(), width, height, PixelFormat::RGB8)
        }
    }
}

/// WebP encoding configuration
#[derive(Debug, Clone, PartialEq)]
pub struct WebPConfig {
    /// Quality factor (0-100, where 100 is best quality)
    pub quality: u8,
    /// Compression effort (0-6, where 0 is fastest, 6 is best compression)
    pub method: u8,
    /// Enable lossless compression
    pub lossless: bool,
}

impl Default for WebPConfig {
    fn default() -> Self {
        Self {
            quality: 80,
            method: 4,
            lossless: false,
        }
    }
}

impl WebPConfig {
    /// Settings used for whole-directory conversion
    pub fn batch() -> Self {
        Self {
            quality: 85,
            method: 6,
            lossless: false,
        }
    }

    /// Settings used for responsive variants (codec default effort)
    pub fn responsive() -> Self {
        Self {
            quality: 85,
            ..Default::default()
        }
    }

    /// Settings used by the in-page re-encoder
    pub fn canvas() -> Self {
        Self::from_unit_quality(0.85)
    }

    /// Build a lossy config from a `0.0..=1.0` quality, as canvas serializers take it
    pub fn from_unit_quality(quality: f32) -> Self {
        let quality = (quality.clamp(0.0, 1.0) * 100.0).round() as u8;
        Self {
            quality,
            ..Default::default()
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> EncodingResult<()> {
        if self.quality > 100 {
            return Err(EncodingError::InvalidQuality(self.quality));
        }
        if self.method > 6 {
            return Err(EncodingError::InvalidMethod(self.method));
        }
        Ok(())
    }
}

/// Result of converting one source
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionOutcome {
    pub source: PathBuf,
    pub target: PathBuf,
    /// Bytes written, or the reason the conversion failed
    pub result: Result<u64, String>,
}

impl ConversionOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Tally of a batch run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConversionSummary {
    pub outcomes: Vec<ConversionOutcome>,
    pub succeeded: usize,
    pub failed: usize,
}

impl ConversionSummary {
    pub fn record(&mut self, outcome: ConversionOutcome) {
        if outcome.is_success() {
            self.succeeded += 1;
        } else {
            self.failed += 1;
        }
        self.outcomes.push(outcome);
    }

    /// Number of conversions attempted
    pub fn attempted(&self) -> usize {
        self.succeeded + self.failed
    }

    /// Total bytes written by successful conversions
    pub fn bytes_written(&self) -> u64 {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().ok())
            .sum()
    }
}

/// One entry of the responsive set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponsiveVariant {
    /// Target width in pixels
    pub width: u32,
    /// Appended to the base filename
    pub suffix: &'static str,
}

/// Responsive widths, smallest first
pub const RESPONSIVE_VARIANTS: [ResponsiveVariant; 4] = [
    ResponsiveVariant { width: 400, suffix: "-sm" },
    ResponsiveVariant { width: 800, suffix: "-md" },
    ResponsiveVariant { width: 1200, suffix: "-lg" },
    ResponsiveVariant { width: 1600, suffix: "-xl" },
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_webp_suffix_substitution() {
        let cases = [
            ("images/gem.jpg", "images/gem.webp"),
            ("images/gem.JPEG", "images/gem.webp"),
            ("https://host/a/b.PnG", "https://host/a/b.webp"),
            ("x.y.jpeg", "x.y.webp"),
        ];
        for (input, expected) in cases {
            let id = ResourceId::new(input);
            assert_eq!(id.with_webp_suffix(), Some(ResourceId::new(expected)));
        }
    }

    #[test]
    fn test_no_substitution_without_input_suffix() {
        assert_eq!(ResourceId::new("a.webp").with_webp_suffix(), None);
        assert_eq!(ResourceId::new("a.gif").with_webp_suffix(), None);
        assert_eq!(ResourceId::new("a.jpg?v=2").with_webp_suffix(), None);
        assert_eq!(ResourceId::new("jpg").with_webp_suffix(), None);
    }

    #[test]
    fn test_format_detection() {
        assert_eq!(ResourceId::new("a.JPG").format(), Some(ImageFormat::Jpg));
        assert_eq!(ResourceId::new("a.jpeg").format(), Some(ImageFormat::Jpeg));
        assert_eq!(ResourceId::new("a.webp").format(), Some(ImageFormat::WebP));
        assert!(!ResourceId::new("a.webp").has_input_suffix());
        assert!(ResourceId::new("a.Png").has_input_suffix());
    }

    #[test]
    fn test_base_name() {
        assert_eq!(ResourceId::new("https://h/x/raw-emerald.jpg").base_name(), "raw-emerald");
        assert_eq!(ResourceId::new("gem").base_name(), "gem");
        assert_eq!(ResourceId::new("dir\\.hidden").base_name(), ".hidden");
    }

    #[test]
    fn test_from_extension() {
        assert_eq!(ImageFormat::from_extension(".JPG"), Some(ImageFormat::Jpg));
        assert_eq!(ImageFormat::from_extension("png"), Some(ImageFormat::Png));
        assert_eq!(ImageFormat::from_extension("txt"), None);
    }

    #[test]
    fn test_webp_config_presets() {
        let batch = WebPConfig::batch();
        assert_eq!((batch.quality, batch.method, batch.lossless), (85, 6, false));
        assert_eq!(WebPConfig::canvas().quality, 85);
        assert_eq!(WebPConfig::from_unit_quality(2.0).quality, 100);
        assert!(matches!(
            WebPConfig { method: 7, ..Default::default() }.validate(),
            Err(EncodingError::InvalidMethod(7))
        ));
        assert!(matches!(
            WebPConfig { quality: 101, ..Default::default() }.validate(),
            Err(EncodingError::InvalidQuality(101))
        ));
    }

    #[test]
    fn test_opaque_sources_stay_three_channel() {
        let jpeg_like = image::DynamicImage::ImageRgb8(image::RgbImage::new(4, 2));
        let raw = RawImage::from(jpeg_like);
        assert_eq!(raw.format, PixelFormat::RGB8);
        assert_eq!(raw.size(), 4 * 2 * 3);

        let with_alpha = image::DynamicImage::ImageRgba8(image::RgbaImage::new(4, 2));
        assert_eq!(RawImage::from(with_alpha).format, PixelFormat::RGBA8);

        let grey = image::DynamicImage::ImageLuma8(image::GrayImage::new(2, 2));
        assert_eq!(RawImage::from(grey).format, PixelFormat::RGB8);
    }

    #[test]
    fn test_responsive_variants_fixed() {
        let widths: Vec<u32> = RESPONSIVE_VARIANTS.iter().map(|v| v.width).collect();
        assert_eq!(widths, vec![400, 800, 1200, 1600]);
        assert_eq!(RESPONSIVE_VARIANTS[3].suffix, "-xl");
    }

    #[test]
    fn test_summary_tally() {
        let mut summary = ConversionSummary::default();
        summary.record(ConversionOutcome {
            source: "a.jpg".into(),
            target: "a.webp".into(),
            result: Ok(10),
        });
        summary.record(ConversionOutcome {
            source: "b.jpg".into(),
            target: "b.webp".into(),
            result: Err("corrupt".into()),
        });
        assert_eq!(summary.attempted(), 2);
        assert_eq!(summary.bytes_written(), 10);
    }

    #[test]
    fn test_raw_image_pixel_access() {
        let image = RawImage::solid(4, 3, [1, 2, 3, 255]);
        assert_eq!(image.get_pixel(3, 2).unwrap(), &[1, 2, 3, 255]);
        assert!(image.get_pixel(4, 0).is_none());
        assert!(image.is_valid());
    }
}
