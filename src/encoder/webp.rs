//! WebP encoder implementation using libwebp

use crate::{
    encoder::EncoderStats,
    error::{EncodingError, EncodingResult},
    types::{PixelFormat, RawImage, WebPConfig},
};

use std::time::Instant;

/// WebP encoder using the webp crate
pub struct WebPEncoder {
    stats: EncoderStats,
}

impl Default for WebPEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl WebPEncoder {
    /// Create a new WebP encoder
    pub fn new() -> Self {
        Self {
            stats: EncoderStats::default(),
        }
    }

    /// Get encoder statistics
    pub fn stats(&self) -> &EncoderStats {
        &self.stats
    }

    /// Encode an image to WebP format
    pub fn encode(&mut self, image: &RawImage, config: &WebPConfig) -> EncodingResult<Vec<u8>> {
        let start_time = Instant::now();

        config.validate()?;

        if image.width == 0 || image.height == 0 {
            return Err(EncodingError::InvalidDimensions {
                width: image.width,
                height: image.height,
            });
        }
        let row_len = image.width as usize * image.format.bytes_per_pixel();
        if !image.is_valid() || image.stride < row_len {
            return Err(EncodingError::BufferTooSmall {
                required: row_len * image.height as usize,
                provided: image.data.len(),
            });
        }

        let result = self.encode_with_format(image, config)?;

        let encoding_time_ms = start_time.elapsed().as_secs_f64() * 1000.0;
        self.stats.update(image.size(), result.len(), encoding_time_ms);

        Ok(result)
    }

    /// Encode after normalising the pixel layout to RGB(A)
    fn encode_with_format(&self, image: &RawImage, config: &WebPConfig) -> EncodingResult<Vec<u8>> {
        let packed = self.packed_pixels(image);

        let encoder = if image.format.has_alpha() {
            webp::Encoder::from_rgba(&packed, image.width, image.height)
        } else {
            webp::Encoder::from_rgb(&packed, image.width, image.height)
        };

        let mut advanced = webp::WebPConfig::new().map_err(|_| {
            EncodingError::EncodingFailed("libwebp rejected the default configuration".to_string())
        })?;
        advanced.quality = f32::from(config.quality);
        advanced.method = i32::from(config.method);
        advanced.lossless = i32::from(config.lossless);

        let encoded = encoder
            .encode_advanced(&advanced)
            .map_err(|e| EncodingError::EncodingFailed(format!("{:?}", e)))?;

        if encoded.is_empty() {
            return Err(EncodingError::EncodingFailed("codec produced no data".to_string()));
        }

        Ok(encoded.to_vec())
    }

    /// Copy rows into a tightly packed RGB or RGBA buffer
    fn packed_pixels(&self, image: &RawImage) -> Vec<u8> {
        let row_len = image.width as usize * image.format.bytes_per_pixel();
        let mut packed = Vec::with_capacity(row_len * image.height as usize);
        for row in image.data.chunks(image.stride).take(image.height as usize) {
            packed.extend_from_slice(&row[..row_len]);
        }

        match image.format {
            PixelFormat::BGRA8 => self.convert_bgra_to_rgba_inplace(&mut packed),
            PixelFormat::BGR8 => self.convert_bgr_to_rgb_inplace(&mut packed),
            PixelFormat::RGBA8 | PixelFormat::RGB8 => {}
        }
        packed
    }

    /// Convert BGRA to RGBA in-place
    fn convert_bgra_to_rgba_inplace(&self, data: &mut [u8]) {
        for chunk in data.chunks_exact_mut(4) {
            chunk.swap(0, 2); // Swap B and R
        }
    }

    /// Convert BGR to RGB in-place
    fn convert_bgr_to_rgb_inplace(&self, data: &mut [u8]) {
        for chunk in data.chunks_exact_mut(3) {
            chunk.swap(0, 2); // Swap B and R
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::is_webp;

    #[test]
    fn test_encoder_creation() {
        let encoder = WebPEncoder::new();
        assert_eq!(encoder.stats.images_encoded, 0);
    }

    #[test]
    fn test_encode_rgba() {
        let mut encoder = WebPEncoder::new();
        let test_image = RawImage::solid(100, 100, [200, 30, 30, 255]);

        let webp_data = encoder.encode(&test_image, &WebPConfig::batch()).unwrap();
        assert!(is_webp(&webp_data));
        assert_eq!(encoder.stats().images_encoded, 1);
    }

    #[test]
    fn test_encode_bgr_with_padded_stride() {
        let mut encoder = WebPEncoder::new();
        let mut image = RawImage::new(vec![90u8; 16 * 8], 5, 8, PixelFormat::BGR8);
        image.stride = 16;

        let webp_data = encoder.encode(&image, &WebPConfig::default()).unwrap();
        let decoded = webp::Decoder::new(&webp_data).decode().unwrap();
        assert_eq!((decoded.width(), decoded.height()), (5, 8));
    }

    #[test]
    fn test_rejects_zero_dimensions() {
        let mut encoder = WebPEncoder::new();
        let image = RawImage::new(Vec::new(), 0, 10, PixelFormat::RGBA8);
        assert!(matches!(
            encoder.encode(&image, &WebPConfig::default()),
            Err(EncodingError::InvalidDimensions { .. })
        ));
    }

    #[test]
    fn test_rejects_short_buffer() {
        let mut encoder = WebPEncoder::new();
        let image = RawImage::new(vec![0; 10], 4, 4, PixelFormat::RGBA8);
        let err = encoder.encode(&image, &WebPConfig::default()).unwrap_err();
        assert!(err.is_parameter_error());
    }

    #[test]
    fn test_rejects_invalid_config() {
        let mut encoder = WebPEncoder::new();
        let image = RawImage::solid(2, 2, [0, 0, 0, 255]);
        let config = WebPConfig {
            method: 9,
            ..Default::default()
        };
        assert!(matches!(
            encoder.encode(&image, &config),
            Err(EncodingError::InvalidMethod(9))
        ));
    }
}
