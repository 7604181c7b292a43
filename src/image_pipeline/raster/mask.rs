//! Binary masks backed by an 8-bit image buffer.

use image::{GrayImage, Luma};
use imageproc::distance_transform::Norm;
use imageproc::morphology::erode;

use crate::image_pipeline::common::error::{PipelineError, Result};
use crate::image_pipeline::raster::types::Raster;

/// Image restricted to `0` and [`BinaryMask::FOREGROUND`].
#[derive(Debug, Clone, PartialEq)]
pub struct BinaryMask {
    image: GrayImage,
}

impl BinaryMask {
    pub const FOREGROUND: u8 = 255;

    pub fn empty(width: usize, height: usize) -> Self {
        Self {
            image: GrayImage::new(width as u32, height as u32),
        }
    }

    pub fn from_fn(width: usize, height: usize, f: impl Fn(usize, usize) -> bool) -> Self {
        let image = GrayImage::from_fn(width as u32, height as u32, |x, y| {
            if f(x as usize, y as usize) {
                Luma([Self::FOREGROUND])
            } else {
                Luma([0])
            }
        });
        Self { image }
    }

    /// Wraps an 8-bit image; any nonzero sample becomes foreground.
    pub fn from_gray_image(mut image: GrayImage) -> Self {
        for pixel in image.pixels_mut() {
            if pixel.0[0] != 0 {
                pixel.0[0] = Self::FOREGROUND;
            }
        }
        Self { image }
    }

    pub fn width(&self) -> usize {
        self.image.width() as usize
    }

    pub fn height(&self) -> usize {
        self.image.height() as usize
    }

    pub fn as_image(&self) -> &GrayImage {
        &self.image
    }

    pub fn pixels(&self) -> &[u8] {
        self.image.as_raw()
    }

    #[inline]
    pub fn is_foreground(&self, x: usize, y: usize) -> bool {
        self.image.as_raw()[y * self.width() + x] != 0
    }

    pub fn foreground_count(&self) -> usize {
        self.pixels().iter().filter(|&&p| p != 0).count()
    }

    /// Mean sample value over all pixels, foreground and background alike.
    pub fn mean(&self) -> f64 {
        let len = self.pixels().len();
        if len == 0 {
            return 0.0;
        }
        self.pixels().iter().map(|&p| p as f64).sum::<f64>() / len as f64
    }

    pub fn xor(&self, other: &BinaryMask) -> Result<BinaryMask> {
        self.ensure_same_size(other)?;
        let data = self
            .pixels()
            .iter()
            .zip(other.pixels())
            .map(|(&a, &b)| if (a != 0) != (b != 0) { Self::FOREGROUND } else { 0 })
            .collect();
        let image = GrayImage::from_raw(self.image.width(), self.image.height(), data)
            .ok_or(PipelineError::InvalidDimensions(self.width(), self.height()))?;
        Ok(Self { image })
    }

    /// 3x3 binary erosion of the foreground applied `steps` times.
    ///
    /// Pixels outside the image do not erode the border. Repeated 3x3 erosion
    /// equals a single chessboard-distance erosion of radius `steps`.
    pub fn eroded(&self, steps: usize) -> BinaryMask {
        // distances saturate at 255, so a single pass may cover at most 254
        const MAX_PASS: usize = u8::MAX as usize - 1;

        let mut image = self.image.clone();
        let mut remaining = steps;
        while remaining > 0 {
            let k = remaining.min(MAX_PASS);
            image = erode(&image, Norm::LInf, k as u8);
            remaining -= k;
        }
        Self { image }
    }

    /// 8-bit raster view for debug output.
    pub fn to_raster(&self, title: impl Into<String>) -> Result<Raster> {
        Raster::from_u8(title, self.width(), self.height(), self.pixels().to_vec())
    }

    fn ensure_same_size(&self, other: &BinaryMask) -> Result<()> {
        if self.image.dimensions() != other.image.dimensions() {
            return Err(PipelineError::InvalidDimensions(other.width(), other.height()));
        }
        Ok(())
    }
}
