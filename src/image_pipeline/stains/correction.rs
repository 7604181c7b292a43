//! Correction factor estimation and application.

use tracing::{debug, warn};

use crate::image_pipeline::common::error::{PipelineError, Result};
use crate::image_pipeline::raster::Raster;
use crate::image_pipeline::stains::types::{CorrectionFactor, RegionMeans};

/// Below this flat-field contrast the factor is not estimated.
pub const MIN_FLAT_CONTRAST: f64 = 1e-6;

/// `k = max(0, -(sample contrast) / (flat contrast))`, with the neutral
/// fallback when the flat contrast is too small or not a number.
pub fn estimate_correction_factor(flat: RegionMeans, sample: RegionMeans) -> CorrectionFactor {
    let denominator = flat.contrast();
    if denominator.is_nan() || denominator.abs() < MIN_FLAT_CONTRAST {
        warn!(
            "Flat-field stain contrast {:e} too small, using factor {}",
            denominator,
            CorrectionFactor::NEUTRAL
        );
        return CorrectionFactor::fallback();
    }

    let k = -sample.contrast() / denominator;
    if k.is_nan() {
        warn!("Correction factor is not a number, using {}", CorrectionFactor::NEUTRAL);
        return CorrectionFactor::fallback();
    }
    let value = if k > 0.0 { k } else { 0.0 };
    debug!("Correction factor {:.6} (raw {:.6})", value, k);
    CorrectionFactor {
        value,
        degenerate: false,
    }
}

/// `sample + k * flattened` as a float raster titled `Cleaned_<sample title>`.
pub fn apply_correction(sample: &Raster, flattened: &Raster, k: f64) -> Result<Raster> {
    if sample.width() != flattened.width() || sample.height() != flattened.height() {
        return Err(PipelineError::InvalidDimensions(flattened.width(), flattened.height()));
    }
    let k = k as f32;
    let flat = flattened.float_view();
    let data = sample
        .float_view()
        .iter()
        .zip(flat.iter())
        .map(|(&s, &f)| s + k * f)
        .collect();
    let mut cleaned = Raster::from_f32(format!("Cleaned_{}", sample.title()), sample.width(), sample.height(), data)?;
    cleaned.reset_display_range();
    Ok(cleaned)
}
