//! Raster data types

use std::borrow::Cow;

use crate::image_pipeline::common::error::{PipelineError, Result};

/// Sample width of a grayscale raster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BitDepth {
    Eight,
    Sixteen,
    /// 32-bit IEEE float samples
    ThirtyTwo,
}

impl BitDepth {
    pub fn bits(self) -> u32 {
        match self {
            BitDepth::Eight => 8,
            BitDepth::Sixteen => 16,
            BitDepth::ThirtyTwo => 32,
        }
    }
}

/// Row-major pixel storage in the raster's original bit depth.
#[derive(Debug, Clone, PartialEq)]
pub enum PixelData {
    U8(Vec<u8>),
    U16(Vec<u16>),
    F32(Vec<f32>),
}

impl PixelData {
    pub fn len(&self) -> usize {
        match self {
            PixelData::U8(v) => v.len(),
            PixelData::U16(v) => v.len(),
            PixelData::F32(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn bit_depth(&self) -> BitDepth {
        match self {
            PixelData::U8(_) => BitDepth::Eight,
            PixelData::U16(_) => BitDepth::Sixteen,
            PixelData::F32(_) => BitDepth::ThirtyTwo,
        }
    }

    #[inline]
    pub fn value(&self, index: usize) -> f32 {
        match self {
            PixelData::U8(v) => v[index] as f32,
            PixelData::U16(v) => v[index] as f32,
            PixelData::F32(v) => v[index],
        }
    }
}

/// Window of sample values mapped to the full display scale.
///
/// Depth conversions with scaling read it, so it is part of the image state
/// even though nothing is displayed here.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplayRange {
    pub min: f64,
    pub max: f64,
}

/// A single-channel image. Dimensions are fixed at construction; every
/// transformation returns a new raster.
#[derive(Debug, Clone, PartialEq)]
pub struct Raster {
    title: String,
    width: usize,
    height: usize,
    pixels: PixelData,
    display_range: DisplayRange,
}

impl Raster {
    pub fn new(title: impl Into<String>, width: usize, height: usize, pixels: PixelData) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(PipelineError::InvalidDimensions(width, height));
        }
        let expected = width
            .checked_mul(height)
            .ok_or(PipelineError::InvalidDimensions(width, height))?;
        if pixels.len() != expected {
            return Err(PipelineError::BufferSizeMismatch {
                expected,
                actual: pixels.len(),
            });
        }

        let mut raster = Self {
            title: title.into(),
            width,
            height,
            pixels,
            display_range: DisplayRange { min: 0.0, max: 255.0 },
        };
        if raster.bit_depth() != BitDepth::Eight {
            raster.reset_display_range();
        }
        Ok(raster)
    }

    pub fn from_u8(title: impl Into<String>, width: usize, height: usize, data: Vec<u8>) -> Result<Self> {
        Self::new(title, width, height, PixelData::U8(data))
    }

    pub fn from_u16(title: impl Into<String>, width: usize, height: usize, data: Vec<u16>) -> Result<Self> {
        Self::new(title, width, height, PixelData::U16(data))
    }

    pub fn from_f32(title: impl Into<String>, width: usize, height: usize, data: Vec<f32>) -> Result<Self> {
        Self::new(title, width, height, PixelData::F32(data))
    }

    /// Builds a float raster by evaluating `f(x, y)` for every pixel.
    pub fn from_fn(
        title: impl Into<String>,
        width: usize,
        height: usize,
        f: impl Fn(usize, usize) -> f32,
    ) -> Result<Self> {
        let mut data = Vec::with_capacity(width.saturating_mul(height));
        for y in 0..height {
            for x in 0..width {
                data.push(f(x, y));
            }
        }
        Self::from_f32(title, width, height, data)
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn len(&self) -> usize {
        self.width * self.height
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn bit_depth(&self) -> BitDepth {
        self.pixels.bit_depth()
    }

    pub fn pixels(&self) -> &PixelData {
        &self.pixels
    }

    pub fn into_pixels(self) -> PixelData {
        self.pixels
    }

    pub fn display_range(&self) -> DisplayRange {
        self.display_range
    }

    pub fn set_display_range(&mut self, min: f64, max: f64) {
        self.display_range = DisplayRange { min, max };
    }

    /// Sets the display range to the finite data minimum and maximum.
    pub fn reset_display_range(&mut self) {
        let (min, max) = match &self.pixels {
            PixelData::U8(v) => min_max(v.iter().map(|&p| p as f64)),
            PixelData::U16(v) => min_max(v.iter().map(|&p| p as f64)),
            PixelData::F32(v) => min_max(v.iter().map(|&p| p as f64)),
        };
        self.display_range = DisplayRange { min, max };
    }

    #[inline]
    pub fn get(&self, index: usize) -> f32 {
        self.pixels.value(index)
    }

    #[inline]
    pub fn value_at(&self, x: usize, y: usize) -> f32 {
        self.pixels.value(y * self.width + x)
    }

    /// Pixel values as floats, borrowed when the raster is already 32-bit.
    pub fn float_view(&self) -> Cow<'_, [f32]> {
        match &self.pixels {
            PixelData::F32(v) => Cow::Borrowed(v.as_slice()),
            PixelData::U8(v) => Cow::Owned(v.iter().map(|&p| p as f32).collect()),
            PixelData::U16(v) => Cow::Owned(v.iter().map(|&p| p as f32).collect()),
        }
    }

    /// Float copy with identical values and metadata.
    pub fn to_float(&self) -> Raster {
        let mut converted = Raster {
            title: self.title.clone(),
            width: self.width,
            height: self.height,
            pixels: PixelData::F32(self.float_view().into_owned()),
            display_range: self.display_range,
        };
        converted.reset_display_range();
        converted
    }

    /// Copy carrying this raster's title and geometry but new pixel data.
    pub fn with_pixels(&self, pixels: PixelData) -> Result<Raster> {
        Raster::new(self.title.clone(), self.width, self.height, pixels)
    }

    /// Copy with values mirrored: full type range for integer depths,
    /// the data range for float.
    pub fn inverted(&self) -> Raster {
        let pixels = match &self.pixels {
            PixelData::U8(v) => PixelData::U8(v.iter().map(|&p| u8::MAX - p).collect()),
            PixelData::U16(v) => PixelData::U16(v.iter().map(|&p| u16::MAX - p).collect()),
            PixelData::F32(v) => {
                let (min, max) = min_max(v.iter().map(|&p| p as f64));
                PixelData::F32(v.iter().map(|&p| (max - (p as f64 - min)) as f32).collect())
            }
        };
        let mut inverted = Raster {
            title: self.title.clone(),
            width: self.width,
            height: self.height,
            pixels,
            display_range: self.display_range,
        };
        if inverted.bit_depth() != BitDepth::Eight {
            inverted.reset_display_range();
        }
        inverted
    }

    /// Arithmetic mean over every pixel. NaN samples propagate.
    pub fn mean(&self) -> f64 {
        let sum: f64 = match &self.pixels {
            PixelData::U8(v) => v.iter().map(|&p| p as f64).sum(),
            PixelData::U16(v) => v.iter().map(|&p| p as f64).sum(),
            PixelData::F32(v) => v.iter().map(|&p| p as f64).sum(),
        };
        sum / self.len() as f64
    }
}

/// Minimum and maximum of the finite values, or `(0, 0)` when there are none.
pub(crate) fn min_max(values: impl Iterator<Item = f64>) -> (f64, f64) {
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for v in values.filter(|v| v.is_finite()) {
        min = min.min(v);
        max = max.max(v);
    }
    if min > max { (0.0, 0.0) } else { (min, max) }
}
