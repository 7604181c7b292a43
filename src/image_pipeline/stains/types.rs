//! Stain removal data types

use crate::image_pipeline::common::error::Result;
use crate::image_pipeline::raster::Raster;

/// Mean of a raster restricted to a mask. An empty selection has mean 0.0.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegionStatistic {
    pub mean: f64,
    pub count: usize,
}

/// Stain and surrounding-ring means measured on one raster.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegionMeans {
    pub stain: f64,
    pub surround: f64,
}

impl RegionMeans {
    pub fn contrast(&self) -> f64 {
        self.stain - self.surround
    }
}

/// Multiplier applied to the flattened flat field before it is added to the sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CorrectionFactor {
    /// Always >= 0
    pub value: f64,
    /// Set when `value` is the neutral 1.0 fallback rather than an estimate
    pub degenerate: bool,
}

impl CorrectionFactor {
    pub const NEUTRAL: f64 = 1.0;

    pub fn fallback() -> Self {
        Self {
            value: Self::NEUTRAL,
            degenerate: true,
        }
    }
}

/// Intermediate raster captured in debug mode.
#[derive(Debug, Clone)]
pub struct DebugImage {
    pub label: String,
    pub raster: Raster,
}

/// Collector for intermediate rasters, inert unless enabled.
#[derive(Debug, Clone, Default)]
pub struct Intermediates {
    enabled: bool,
    images: Vec<DebugImage>,
}

impl Intermediates {
    pub fn enabled() -> Self {
        Self {
            enabled: true,
            images: Vec::new(),
        }
    }

    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Stores the raster produced by `make` under `label`. `make` only runs when enabled.
    pub fn record(&mut self, label: impl Into<String>, make: impl FnOnce() -> Result<Raster>) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }
        let label = label.into();
        let raster = make()?.with_title(label.clone());
        self.images.push(DebugImage { label, raster });
        Ok(())
    }

    pub fn images(&self) -> &[DebugImage] {
        &self.images
    }

    pub fn into_images(self) -> Vec<DebugImage> {
        self.images
    }
}

/// Parameters of one stain removal run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StainParams {
    /// Ring width control, nominally within [0, 1]
    pub expand_ratio: f64,
    /// Share of distinct particle areas kept, 0-100
    pub percentile: u8,
    pub debug: bool,
}

impl Default for StainParams {
    fn default() -> Self {
        Self {
            expand_ratio: 0.1,
            percentile: 80,
            debug: false,
        }
    }
}

/// Everything one stain removal run produced.
#[derive(Debug, Clone)]
pub struct StainRemovalOutput {
    /// Float raster titled `Cleaned_<sample title>`
    pub cleaned: Raster,
    pub correction_factor: CorrectionFactor,
    /// Measured on the flattened flat field; `None` when measurement failed
    pub flat_means: Option<RegionMeans>,
    /// Measured on the sample; `None` when measurement failed
    pub sample_means: Option<RegionMeans>,
    pub intermediates: Vec<DebugImage>,
}
