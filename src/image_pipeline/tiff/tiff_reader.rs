//! Grayscale TIFF decoding into rasters.

use std::io::Cursor;

use tiff::ColorType;
use tiff::decoder::{Decoder, DecodingResult};
use tracing::debug;

use crate::image_pipeline::common::error::{PipelineError, Result};
use crate::image_pipeline::raster::{PixelData, Raster};
use crate::image_pipeline::raw::RasterReader;

/// Reads single-channel 8-bit, 16-bit and 32-bit float TIFF files.
pub struct TiffRasterReader;

impl RasterReader for TiffRasterReader {
    fn read_raster(&self, data: &[u8], title: &str) -> Result<Raster> {
        debug!("Decoding TIFF image, {} bytes", data.len());

        let mut decoder = Decoder::new(Cursor::new(data)).map_err(|e| PipelineError::DecodeError(e.to_string()))?;
        let (width, height) = decoder
            .dimensions()
            .map_err(|e| PipelineError::DecodeError(e.to_string()))?;
        let color_type = decoder
            .colortype()
            .map_err(|e| PipelineError::DecodeError(e.to_string()))?;

        if !matches!(color_type, ColorType::Gray(8 | 16 | 32)) {
            return Err(PipelineError::UnsupportedFormat(format!(
                "{:?}, only grayscale images are supported",
                color_type
            )));
        }

        let pixels = match decoder
            .read_image()
            .map_err(|e| PipelineError::DecodeError(e.to_string()))?
        {
            DecodingResult::U8(v) => PixelData::U8(v),
            DecodingResult::U16(v) => PixelData::U16(v),
            DecodingResult::F32(v) => PixelData::F32(v),
            _ => {
                return Err(PipelineError::UnsupportedFormat(format!(
                    "{:?} sample format",
                    color_type
                )));
            }
        };

        debug!("Decoded {}x{} {:?}", width, height, color_type);
        Raster::new(title, width as usize, height as usize, pixels)
    }
}
