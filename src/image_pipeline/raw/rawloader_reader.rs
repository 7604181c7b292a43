//! RAW image reader implementation using the rawloader library.
//!
//! Camera RAW files (ARW, CR2, NEF, DNG, etc.) are decoded to the undemosaiced
//! sensor mosaic, which is a single-channel 16-bit raster. That is the form a
//! flat field and a sample taken on the same sensor are compared in.

use std::io::Cursor;

use tracing::debug;
use rawloader::RawImageData as RawloaderImageData;
use crate::image_pipeline::common::error::{Result, PipelineError};
use crate::image_pipeline::raster::Raster;
use crate::image_pipeline::raw::reader::RasterReader;

/// RAW image reader that uses the rawloader library for decoding.
pub struct RawLoaderReader;

/// The bit width of the u16 data type, used for calculating actual bits per sample.
const U16_BITS: u32 = 16;

impl RawLoaderReader {
    /// Sensor bit depth implied by the white level, e.g. 4095 -> 12 bits.
    pub fn bits_per_sample(white_level: u16) -> u32 {
        if white_level == 0 {
            U16_BITS
        } else {
            U16_BITS - white_level.leading_zeros()
        }
    }
}

impl RasterReader for RawLoaderReader {
    /// Reads the sensor mosaic as a 16-bit raster.
    ///
    /// Float RAW data (normalized 0.0-1.0) is scaled to the u16 range. The
    /// display range is set to the sensor's white level so depth conversions
    /// scale over the sensor range rather than the data range.
    fn read_raster(&self, data: &[u8], title: &str) -> Result<Raster> {
        debug!("Decoding RAW image, {} bytes", data.len());

        let decoded = rawloader::decode(&mut Cursor::new(data))
            .map_err(|e| PipelineError::DecodeError(e.to_string()))?;

        if decoded.cpp != 1 {
            return Err(PipelineError::UnsupportedFormat(format!(
                "RAW with {} components per pixel",
                decoded.cpp
            )));
        }

        let width = decoded.width;
        let height = decoded.height;
        debug!("Decoded image: {}x{}", width, height);

        let data: Vec<u16> = match decoded.data {
            RawloaderImageData::Integer(values) => values,
            RawloaderImageData::Float(values) => {
                values.iter().map(|&v| (v.clamp(0.0, 1.0) * u16::MAX as f32) as u16).collect()
            }
        };

        let max_white_level = decoded.whitelevels.iter().max().copied().unwrap_or(u16::MAX);
        let bits_per_sample = Self::bits_per_sample(max_white_level);
        debug!("Calculated bits_per_sample: {} (max white level: {})", bits_per_sample, max_white_level);

        let mut raster = Raster::from_u16(title, width, height, data)?;
        raster.set_display_range(0.0, ((1u32 << bits_per_sample) - 1) as f64);
        Ok(raster)
    }
}
