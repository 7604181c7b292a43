use std::io::Write;
use crate::image_pipeline::common::error::Result;
use crate::image_pipeline::raster::Raster;
use crate::image_pipeline::tiff::types::TiffWriteOptions;

pub trait TiffWriter {
    /// Encodes `raster` as a single-channel TIFF in its own bit depth.
    fn write_tiff(&self, raster: &Raster, output: &mut dyn Write, options: &TiffWriteOptions) -> Result<()>;
}
