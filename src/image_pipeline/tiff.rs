//! TIFF module
//!
//! Reads grayscale TIFF files into rasters and writes rasters back out with
//! various compression options.

mod writer;
mod standard_tiff_writer;
mod tiff_reader;
pub mod types;

#[cfg(test)]
mod tests;

pub use writer::TiffWriter;
pub use standard_tiff_writer::StandardTiffWriter;
pub use tiff_reader::TiffRasterReader;
pub use types::{TiffCompression, TiffWriteOptions};
