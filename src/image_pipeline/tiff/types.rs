//! TIFF output types

/// TIFF compression methods
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TiffCompression {
    /// No compression (fastest, largest file)
    None,
    /// LZW compression (slow, good compression)
    Lzw,
    /// Deflate compression - fast level (good speed/size balance)
    DeflateFast,
    /// Deflate compression - best compression (slower)
    DeflateBest,
    /// Deflate compression - balanced
    DeflateBalanced,
}

/// Encoder settings for one TIFF file
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TiffWriteOptions {
    pub compression: TiffCompression,
    /// Predictor value for compression (2 for horizontal differencing).
    /// Ignored for float rasters.
    pub predictor: Option<u16>,
}

impl Default for TiffWriteOptions {
    fn default() -> Self {
        Self {
            compression: TiffCompression::None,
            predictor: None,
        }
    }
}
