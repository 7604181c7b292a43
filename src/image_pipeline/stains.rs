//! Stain removal module
//!
//! Removes stains of the optical path (dust, smudges) that appear in both a
//! sample image and a flat-field reference. The flat field is flattened so only
//! stains remain, the stains are segmented, and the flattened flat field is
//! added to the sample scaled by a factor estimated from both images.

pub mod background;
pub mod correction;
pub mod mask;
pub mod ring;
pub mod threshold;
pub mod types;


use tracing::{info, instrument, warn};

use crate::image_pipeline::common::error::{PipelineError, Result};
use crate::image_pipeline::raster::{BinaryMask, Raster, are_images_compatible};

pub use background::BackgroundFlattener;
pub use correction::{apply_correction, estimate_correction_factor};
pub use mask::{DirtyMaskExtractor, filter_small_particles};
pub use ring::{RingRegionSampler, masked_mean};
pub use threshold::{max_entropy_mask, max_entropy_threshold};
pub use types::{
    CorrectionFactor, DebugImage, Intermediates, RegionMeans, RegionStatistic, StainParams, StainRemovalOutput,
};

/// Runs flatten, extract, measure, estimate and apply in order.
#[derive(Debug, Clone, Default)]
pub struct StainRemover {
    params: StainParams,
    flattener: BackgroundFlattener,
}

impl StainRemover {
    pub fn new(params: StainParams) -> Self {
        Self {
            params,
            flattener: BackgroundFlattener::default(),
        }
    }

    pub fn with_flattener(params: StainParams, flattener: BackgroundFlattener) -> Self {
        Self { params, flattener }
    }

    pub fn params(&self) -> &StainParams {
        &self.params
    }

    /// Both rasters must already be compatible. Neither input is modified.
    #[instrument(skip_all, fields(sample = sample.title(), flat = flat.title()))]
    pub fn run(&self, sample: &Raster, flat: &Raster) -> Result<StainRemovalOutput> {
        if !are_images_compatible(sample, flat) {
            return Err(PipelineError::IncompatibleImages {
                sample: describe(sample),
                flat: describe(flat),
            });
        }

        let mut intermediates = if self.params.debug {
            Intermediates::enabled()
        } else {
            Intermediates::disabled()
        };

        let flattened = self.flattener.flatten(flat, &mut intermediates)?;
        let mask = DirtyMaskExtractor::new(self.params.percentile).extract(&flattened, &mut intermediates)?;
        info!("Stain mask covers {} pixels", mask.foreground_count());

        let sampler = RingRegionSampler::new(self.params.expand_ratio);
        let (correction_factor, flat_means, sample_means) =
            match measure_both(&sampler, &flattened, sample, &mask, &mut intermediates) {
                Ok((flat_means, sample_means)) => (
                    estimate_correction_factor(flat_means, sample_means),
                    Some(flat_means),
                    Some(sample_means),
                ),
                Err(e) => {
                    warn!("Region measurement failed ({}), using neutral factor", e);
                    (CorrectionFactor::fallback(), None, None)
                }
            };
        info!("Correction factor k = {:.6}", correction_factor.value);

        let cleaned = apply_correction(sample, &flattened, correction_factor.value)?;
        Ok(StainRemovalOutput {
            cleaned,
            correction_factor,
            flat_means,
            sample_means,
            intermediates: intermediates.into_images(),
        })
    }
}

fn measure_both(
    sampler: &RingRegionSampler,
    flattened: &Raster,
    sample: &Raster,
    mask: &BinaryMask,
    intermediates: &mut Intermediates,
) -> Result<(RegionMeans, RegionMeans)> {
    let flat_means = sampler.sample(flattened, mask, intermediates)?;
    // the ring is the same for both images, keep only one copy of its debug views
    let sample_means = sampler.sample(sample, mask, &mut Intermediates::disabled())?;
    Ok((flat_means, sample_means))
}

pub(crate) fn describe(raster: &Raster) -> String {
    format!(
        "{} {}x{} {}-bit",
        raster.title(),
        raster.width(),
        raster.height(),
        raster.bit_depth().bits()
    )
}

/// Removes the stains visible in `flat` from `sample`.
///
/// Returns a float raster titled `Cleaned_<sample title>`.
pub fn remove_stains(sample: &Raster, flat: &Raster, expand_ratio: f64, percentile: u8) -> Result<Raster> {
    let params = StainParams {
        expand_ratio,
        percentile,
        debug: false,
    };
    Ok(StainRemover::new(params).run(sample, flat)?.cleaned)
}
