//! WebP encoding module

pub mod webp;

pub use webp::WebPEncoder;

/// Encoder statistics
#[derive(Debug, Clone, Default)]
pub struct EncoderStats {
    /// Total images encoded
    pub images_encoded: u64,
    /// Total bytes processed
    pub bytes_processed: u64,
    /// Total bytes output
    pub bytes_output: u64,
    /// Average compression ratio
    pub average_compression_ratio: f64,
    /// Average encoding time in milliseconds
    pub average_encoding_time_ms: f64,
}

impl EncoderStats {
    /// Update statistics with a new encoding
    pub fn update(&mut self, input_size: usize, output_size: usize, time_ms: f64) {
        self.images_encoded += 1;
        self.bytes_processed += input_size as u64;
        self.bytes_output += output_size as u64;

        let compression_ratio = if input_size == 0 {
            0.0
        } else {
            output_size as f64 / input_size as f64
        };
        let n = self.images_encoded as f64;
        self.average_compression_ratio =
            (self.average_compression_ratio * (n - 1.0) + compression_ratio) / n;
        self.average_encoding_time_ms = (self.average_encoding_time_ms * (n - 1.0) + time_ms) / n;
    }
}

/// Check for the `RIFF....WEBP` container signature
pub fn is_webp(data: &[u8]) -> bool {
    data.len() >= 12 && &data[0..4] == b"RIFF" && &data[8..12] == b"WEBP"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_update() {
        let mut stats = EncoderStats::default();
        stats.update(100, 25, 2.0);
        stats.update(100, 75, 4.0);
        assert_eq!(stats.images_encoded, 2);
        assert!((stats.average_compression_ratio - 0.5).abs() < 1e-9);
        assert!((stats.average_encoding_time_ms - 3.0).abs() < 1e-9);
        assert_eq!((stats.bytes_processed, stats.bytes_output), (200, 100));
    }

    #[test]
    fn test_is_webp_signature() {
        assert!(is_webp(b"RIFF\x10\x00\x00\x00WEBPVP8 "));
        assert!(!is_webp(b"\x89PNG\r\n\x1a\n\0\0\0\0"));
        assert!(!is_webp(b"RIFF"));
    }
}
