//! Load → resize → re-encode → write

use crate::{
    encoder::{EncoderStats, WebPEncoder},
    error::{ConversionError, ConversionResult},
    types::{ImageFormat, RawImage, WebPConfig},
};

use image::imageops::FilterType;
use parking_lot::Mutex;
use std::{fs, path::Path};

/// What to produce from one source
#[derive(Debug, Clone, PartialEq)]
pub struct EncodeRequest {
    pub webp: WebPConfig,
    /// Constrain to this width, keeping aspect ratio and never enlarging
    pub max_width: Option<u32>,
}

impl EncodeRequest {
    pub fn new(webp: WebPConfig) -> Self {
        Self {
            webp,
            max_width: None,
        }
    }

    pub fn with_max_width(mut self, width: u32) -> Self {
        self.max_width = Some(width);
        self
    }
}

/// What the codec wrote
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodecOutput {
    pub width: u32,
    pub height: u32,
    pub bytes: u64,
}

/// Raster codec used by the batch converter
pub trait RasterCodec: Send + Sync {
    /// Convert `input` into a WebP file at `output`
    fn convert(
        &self,
        input: &Path,
        output: &Path,
        request: &EncodeRequest,
    ) -> ConversionResult<CodecOutput>;

    /// Get the implementation name
    fn name(&self) -> &str;
}

/// Dimensions after fitting inside `max_width` without enlargement
pub fn fit_width(width: u32, height: u32, max_width: u32) -> (u32, u32) {
    if width <= max_width || width == 0 {
        return (width, height);
    }
    let scaled = (height as f64 * max_width as f64 / width as f64).round() as u32;
    (max_width, scaled.max(1))
}

/// Codec backed by the `image` decoder and libwebp
#[derive(Default)]
pub struct ImageCodec {
    encoder: Mutex<WebPEncoder>,
}

impl ImageCodec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> EncoderStats {
        self.encoder.lock().stats().clone()
    }
}

impl RasterCodec for ImageCodec {
    fn convert(
        &self,
        input: &Path,
        output: &Path,
        request: &EncodeRequest,
    ) -> ConversionResult<CodecOutput> {
        if !input.is_file() {
            return Err(ConversionError::SourceNotFound(input.display().to_string()));
        }
        let readable = input
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(ImageFormat::from_extension)
            .is_some_and(|format| format.is_input());
        if !readable {
            return Err(ConversionError::UnsupportedFormat(input.display().to_string()));
        }

        let mut img = image::open(input)?;
        if let Some(max_width) = request.max_width {
            let (width, height) = fit_width(img.width(), img.height(), max_width);
            if (width, height) != (img.width(), img.height()) {
                img = img.resize_exact(width, height, FilterType::Lanczos3);
            }
        }

        let raw = RawImage::from(img);
        let data = self.encoder.lock().encode(&raw, &request.webp)?;
        fs::write(output, &data)?;

        Ok(CodecOutput {
            width: raw.width,
            height: raw.height,
            bytes: data.len() as u64,
        })
    }

    fn name(&self) -> &str {
        "ImageCodec"
    }
}
