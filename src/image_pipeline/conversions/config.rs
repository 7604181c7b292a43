//! Stain removal pipeline configuration types

use crate::image_pipeline::common::error::{PipelineError, Result};
use crate::image_pipeline::pffc::{MIN_BLUR_RADIUS, PffcParams};
use crate::image_pipeline::stains::StainParams;
use crate::image_pipeline::tiff::{TiffCompression, TiffWriteOptions};

/// Configuration for the stain removal pipeline
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Ring width control: erosion steps are `max(1, floor(width * ratio / 10))`
    pub expand_ratio: f64,
    /// Share (0-100) of distinct particle areas kept in the stain mask
    pub percentile: u8,
    /// Run pseudo flat-field correction on the cleaned image
    pub pffc: bool,
    /// Gaussian sigma of the pseudo flat field
    pub pffc_radius: f64,
    /// Suppress the blurred background preview
    pub hide_background: bool,
    /// Resize and depth-convert the flat field when it does not match the sample
    pub auto_convert: bool,
    /// Collect intermediate images
    pub debug: bool,
    /// Compression method to use
    pub compression: TiffCompression,
    /// Predictor value for compression (typically 2 for horizontal differencing)
    pub predictor: Option<u16>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            expand_ratio: 0.1,
            percentile: 80,
            pffc: false,
            pffc_radius: 50.0,
            hide_background: true,
            auto_convert: true,
            debug: false,
            compression: TiffCompression::None,
            predictor: None,
        }
    }
}

impl PipelineConfig {
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder::default()
    }

    /// Rejects parameters outside their valid ranges.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.expand_ratio) {
            return Err(PipelineError::InvalidParameter(format!(
                "expand ratio {} outside [0, 1]",
                self.expand_ratio
            )));
        }
        if self.percentile > 100 {
            return Err(PipelineError::InvalidParameter(format!(
                "percentile {} outside [0, 100]",
                self.percentile
            )));
        }
        if self.pffc && !(self.pffc_radius >= MIN_BLUR_RADIUS && self.pffc_radius.is_finite()) {
            return Err(PipelineError::InvalidParameter(format!(
                "pffc radius {} below {}",
                self.pffc_radius, MIN_BLUR_RADIUS
            )));
        }
        Ok(())
    }

    pub fn stain_params(&self) -> StainParams {
        StainParams {
            expand_ratio: self.expand_ratio,
            percentile: self.percentile,
            debug: self.debug,
        }
    }

    pub fn pffc_params(&self) -> PffcParams {
        PffcParams {
            blur_radius: self.pffc_radius,
            hide_background: self.hide_background,
            preview_mode: false,
            debug: self.debug,
        }
    }

    pub fn tiff_options(&self) -> TiffWriteOptions {
        TiffWriteOptions {
            compression: self.compression,
            predictor: self.predictor,
        }
    }
}

/// Builder for PipelineConfig
#[derive(Default)]
pub struct PipelineConfigBuilder {
    expand_ratio: Option<f64>,
    percentile: Option<u8>,
    pffc: Option<bool>,
    pffc_radius: Option<f64>,
    hide_background: Option<bool>,
    auto_convert: Option<bool>,
    debug: Option<bool>,
    compression: Option<TiffCompression>,
    predictor: Option<Option<u16>>,
}

impl PipelineConfigBuilder {
    pub fn expand_ratio(mut self, ratio: f64) -> Self {
        self.expand_ratio = Some(ratio);
        self
    }

    pub fn percentile(mut self, percentile: u8) -> Self {
        self.percentile = Some(percentile);
        self
    }

    pub fn pffc(mut self, enable: bool) -> Self {
        self.pffc = Some(enable);
        self
    }

    pub fn pffc_radius(mut self, radius: f64) -> Self {
        self.pffc_radius = Some(radius);
        self
    }

    pub fn hide_background(mut self, hide: bool) -> Self {
        self.hide_background = Some(hide);
        self
    }

    pub fn auto_convert(mut self, enable: bool) -> Self {
        self.auto_convert = Some(enable);
        self
    }

    pub fn debug(mut self, enable: bool) -> Self {
        self.debug = Some(enable);
        self
    }

    pub fn compression(mut self, compression: TiffCompression) -> Self {
        self.compression = Some(compression);
        self
    }

    pub fn predictor(mut self, predictor: Option<u16>) -> Self {
        self.predictor = Some(predictor);
        self
    }

    pub fn build(self) -> PipelineConfig {
        let default = PipelineConfig::default();
        PipelineConfig {
            expand_ratio: self.expand_ratio.unwrap_or(default.expand_ratio),
            percentile: self.percentile.unwrap_or(default.percentile),
            pffc: self.pffc.unwrap_or(default.pffc),
            pffc_radius: self.pffc_radius.unwrap_or(default.pffc_radius),
            hide_background: self.hide_background.unwrap_or(default.hide_background),
            auto_convert: self.auto_convert.unwrap_or(default.auto_convert),
            debug: self.debug.unwrap_or(default.debug),
            compression: self.compression.unwrap_or(default.compression),
            predictor: self.predictor.unwrap_or(default.predictor),
        }
    }
}
