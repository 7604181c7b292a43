//! Stain and ring region measurements.

use tracing::{debug, instrument};

use crate::image_pipeline::common::error::{PipelineError, Result};
use crate::image_pipeline::raster::{BinaryMask, Raster};
use crate::image_pipeline::stains::types::{Intermediates, RegionMeans, RegionStatistic};

/// Measures the stain mask and a band of pixels next to its boundary.
///
/// The band is the mask minus its erosion by `max(1, floor(width * ratio / 10))`
/// steps, so it lies just inside each stain's outline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RingRegionSampler {
    pub expand_ratio: f64,
}

impl RingRegionSampler {
    pub fn new(expand_ratio: f64) -> Self {
        Self { expand_ratio }
    }

    pub fn erosion_steps(&self, width: usize) -> usize {
        let steps = (width as f64 * self.expand_ratio / 10.0).floor();
        if steps.is_nan() || steps < 1.0 {
            1
        } else {
            steps as usize
        }
    }

    pub fn ring_mask(&self, mask: &BinaryMask, intermediates: &mut Intermediates) -> Result<BinaryMask> {
        let steps = self.erosion_steps(mask.width());
        let eroded = mask.eroded(steps);
        intermediates.record("Debug_Expanded_Mask_in_Measure", || eroded.to_raster(""))?;
        let ring = eroded.xor(mask)?;
        intermediates.record("Debug_XOR_Ring_Mask_in_Measure", || ring.to_raster(""))?;
        debug!("Ring of {} pixels after {} erosion steps", ring.foreground_count(), steps);
        Ok(ring)
    }

    /// Stain and ring means of `raster`. An empty ring falls back to the stain mean.
    #[instrument(skip_all, fields(image = raster.title()))]
    pub fn sample(&self, raster: &Raster, mask: &BinaryMask, intermediates: &mut Intermediates) -> Result<RegionMeans> {
        let ring = self.ring_mask(mask, intermediates)?;
        let stain = masked_mean(raster, mask)?;
        let surround = if ring.mean() == 0.0 {
            debug!("Ring is empty, using stain mean as surround");
            stain
        } else {
            masked_mean(raster, &ring)?
        };
        Ok(RegionMeans {
            stain: stain.mean,
            surround: surround.mean,
        })
    }
}

/// Mean of `raster` over the foreground of `mask`; 0.0 when the mask is empty.
pub fn masked_mean(raster: &Raster, mask: &BinaryMask) -> Result<RegionStatistic> {
    if raster.width() != mask.width() || raster.height() != mask.height() {
        return Err(PipelineError::InvalidDimensions(mask.width(), mask.height()));
    }
    let (sum, count) = mask
        .pixels()
        .iter()
        .enumerate()
        .filter(|&(_, &m)| m != 0)
        .fold((0.0f64, 0usize), |(sum, count), (i, _)| (sum + raster.get(i) as f64, count + 1));
    let mean = if count == 0 { 0.0 } else { sum / count as f64 };
    Ok(RegionStatistic { mean, count })
}
