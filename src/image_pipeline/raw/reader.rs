use crate::image_pipeline::common::error::Result;
use crate::image_pipeline::raster::Raster;

pub trait RasterReader {
    /// Decodes an encoded image file into a grayscale raster titled `title`.
    fn read_raster(&self, data: &[u8], title: &str) -> Result<Raster>;
}
