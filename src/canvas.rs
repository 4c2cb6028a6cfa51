//! Off-screen raster surface and the in-page WebP re-encoder
//!
//! A decoded image is painted 1:1 onto a surface sized to its natural
//! dimensions, serialized to WebP at quality 0.85 and registered in a
//! [`BlobStore`] under a page-local `blob:` handle.

use crate::{
    encoder::{is_webp, EncoderStats, WebPEncoder},
    error::{EncodingError, EncodingResult},
    types::{ImageFormat, PixelFormat, RawImage, ResourceId, WebPConfig},
};

use bytes::Bytes;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

/// MIME type requested from the serializer
pub const WEBP_MIME: &str = "image/webp";

/// Quality passed to the serializer, on the `0.0..=1.0` scale
pub const CANVAS_QUALITY: f32 = 0.85;

/// RGBA raster surface
#[derive(Debug, Clone)]
pub struct Surface {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl Surface {
    /// Transparent surface of the given size
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![0; width as usize * height as usize * 4],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Paint `image` unscaled with its top-left corner at (`dx`, `dy`), clipped to the surface
    pub fn draw_image(&mut self, image: &RawImage, dx: u32, dy: u32) {
        let bpp = image.format.bytes_per_pixel();
        let cols = image.width.min(self.width.saturating_sub(dx)) as usize;
        let rows = image.height.min(self.height.saturating_sub(dy)) as usize;

        for y in 0..rows {
            let src_row = y * image.stride;
            let dst_row = ((dy as usize + y) * self.width as usize + dx as usize) * 4;
            for x in 0..cols {
                let Some(src) = image.data.get(src_row + x * bpp..src_row + (x + 1) * bpp) else {
                    return;
                };
                let rgba = match image.format {
                    PixelFormat::RGBA8 => [src[0], src[1], src[2], src[3]],
                    PixelFormat::BGRA8 => [src[2], src[1], src[0], src[3]],
                    PixelFormat::RGB8 => [src[0], src[1], src[2], 255],
                    PixelFormat::BGR8 => [src[2], src[1], src[0], 255],
                };
                let dst = dst_row + x * 4;
                self.pixels[dst..dst + 4].copy_from_slice(&rgba);
            }
        }
    }

    /// Pixel at (`x`, `y`) as RGBA
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = (y as usize * self.width as usize + x as usize) * 4;
        Some([
            self.pixels[i],
            self.pixels[i + 1],
            self.pixels[i + 2],
            self.pixels[i + 3],
        ])
    }

    /// Serialize with a throwaway encoder
    pub fn to_blob(&self, mime: &str, quality: f32) -> EncodingResult<Blob> {
        self.encode_with(&mut WebPEncoder::new(), mime, quality)
    }

    /// Serialize through `encoder`; only `image/webp` is produced
    pub fn encode_with(
        &self,
        encoder: &mut WebPEncoder,
        mime: &str,
        quality: f32,
    ) -> EncodingResult<Blob> {
        if !mime.eq_ignore_ascii_case(WEBP_MIME) {
            return Err(EncodingError::UnsupportedFormat(mime.to_string()));
        }
        let image = RawImage::new(self.pixels.clone(), self.width, self.height, PixelFormat::RGBA8);
        let data = encoder.encode(&image, &WebPConfig::from_unit_quality(quality))?;
        Ok(Blob {
            data: Bytes::from(data),
            mime: ImageFormat::WebP.mime_type(),
        })
    }
}

/// Encoded bytes held in page memory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob {
    pub data: Bytes,
    pub mime: &'static str,
}

impl Blob {
    pub fn size(&self) -> usize {
        self.data.len()
    }
}

/// Page-lifetime registry of blob handles
#[derive(Debug, Default)]
pub struct BlobStore {
    blobs: Mutex<HashMap<ResourceId, Blob>>,
    next_id: AtomicU64,
}

impl BlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `blob` and return its `blob:` handle
    pub fn create_object_url(&self, blob: Blob) -> ResourceId {
        let n = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let url = ResourceId::new(format!("blob:webp-forge/{}", n));
        self.blobs.lock().insert(url.clone(), blob);
        url
    }

    pub fn get(&self, url: &ResourceId) -> Option<Blob> {
        self.blobs.lock().get(url).cloned()
    }

    pub fn revoke(&self, url: &ResourceId) -> bool {
        self.blobs.lock().remove(url).is_some()
    }

    pub fn len(&self) -> usize {
        self.blobs.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bytes held by all live handles
    pub fn total_bytes(&self) -> usize {
        self.blobs.lock().values().map(Blob::size).sum()
    }
}

/// Re-encodes decoded images to WebP blobs
pub struct CanvasReencoder {
    encoder: Mutex<WebPEncoder>,
    quality: f32,
    blobs: Arc<BlobStore>,
}

impl CanvasReencoder {
    pub fn new(blobs: Arc<BlobStore>) -> Self {
        Self::with_quality(blobs, CANVAS_QUALITY)
    }

    pub fn with_quality(blobs: Arc<BlobStore>, quality: f32) -> Self {
        Self {
            encoder: Mutex::new(WebPEncoder::new()),
            quality,
            blobs,
        }
    }

    /// Paint `image` at natural size, encode, and hand back a blob handle
    pub fn reencode(&self, image: &RawImage) -> EncodingResult<ResourceId> {
        let mut surface = Surface::new(image.width, image.height);
        surface.draw_image(image, 0, 0);
        let blob = surface.encode_with(&mut self.encoder.lock(), WEBP_MIME, self.quality)?;
        Ok(self.blobs.create_object_url(blob))
    }

    pub fn blobs(&self) -> &Arc<BlobStore> {
        &self.blobs
    }

    pub fn stats(&self) -> EncoderStats {
        self.encoder.lock().stats().clone()
    }
}

static WEBP_SUPPORT: Lazy<bool> = Lazy::new(detect_webp_support);

/// Whether the runtime can produce WebP; probed once per process
pub fn webp_supported() -> bool {
    *WEBP_SUPPORT
}

/// Encode a 1x1 surface and inspect the output signature
pub fn detect_webp_support() -> bool {
    match Surface::new(1, 1).to_blob(WEBP_MIME, CANVAS_QUALITY) {
        Ok(blob) => blob.mime == WEBP_MIME && is_webp(&blob.data),
        Err(e) => {
            log::debug!("WebP capability probe failed: {}", e);
            false
        }
    }
}
