//! Raster module
//!
//! Grayscale image buffers, binary masks and the conversions that reconcile
//! two rasters before they are combined.

mod convert;
mod mask;
pub mod types;

#[cfg(test)]
mod tests;

pub use convert::{are_images_compatible, convert_bit_depth, convert_to_match, resize_bilinear};
pub use mask::BinaryMask;
pub use types::{BitDepth, DisplayRange, PixelData, Raster};
