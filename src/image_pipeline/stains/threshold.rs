//! Maximum-entropy automatic thresholding.

use tracing::debug;

use crate::image_pipeline::raster::types::min_max;
use crate::image_pipeline::raster::{BinaryMask, Raster};

pub const HISTOGRAM_BINS: usize = 256;

/// Kapur-Sahoo-Wong threshold: the bin `t` maximising the summed entropies of
/// the `[0, t]` and `(t, 255]` distributions. `None` for an empty histogram.
pub fn max_entropy_threshold(histogram: &[u64; HISTOGRAM_BINS]) -> Option<usize> {
    let total: u64 = histogram.iter().sum();
    if total == 0 {
        return None;
    }
    let total = total as f64;
    let norm: Vec<f64> = histogram.iter().map(|&h| h as f64 / total).collect();

    let mut p1 = [0.0f64; HISTOGRAM_BINS];
    let mut p2 = [0.0f64; HISTOGRAM_BINS];
    p1[0] = norm[0];
    p2[0] = 1.0 - p1[0];
    for ih in 1..HISTOGRAM_BINS {
        p1[ih] = p1[ih - 1] + norm[ih];
        p2[ih] = 1.0 - p1[ih];
    }

    // first and last bins where the cumulative sums are not degenerate
    let first_bin = (0..HISTOGRAM_BINS)
        .find(|&ih| p1[ih].abs() >= f64::EPSILON)
        .unwrap_or(0);
    let last_bin = (first_bin..HISTOGRAM_BINS)
        .rev()
        .find(|&ih| p2[ih].abs() >= f64::EPSILON)
        .unwrap_or(HISTOGRAM_BINS - 1);

    let mut threshold = None;
    let mut max_entropy = f64::MIN;
    for it in first_bin..=last_bin {
        let mut ent_back = 0.0;
        for ih in 0..=it {
            if histogram[ih] != 0 {
                let q = norm[ih] / p1[it];
                ent_back -= q * q.ln();
            }
        }
        let mut ent_obj = 0.0;
        for ih in it + 1..HISTOGRAM_BINS {
            if histogram[ih] != 0 {
                let q = norm[ih] / p2[it];
                ent_obj -= q * q.ln();
            }
        }
        let total_ent = ent_back + ent_obj;
        if max_entropy < total_ent {
            max_entropy = total_ent;
            threshold = Some(it);
        }
    }
    threshold
}

/// Foreground = pixels brighter than the maximum-entropy threshold.
///
/// Values are binned on an 8-bit scale spanning the finite data range, and the
/// chosen bin is mapped back to a level in the original units. A raster with
/// no finite spread yields an empty mask.
pub fn max_entropy_mask(raster: &Raster) -> BinaryMask {
    let values = raster.float_view();
    let (min, max) = min_max(values.iter().map(|&v| v as f64));
    if max <= min {
        debug!("No dynamic range to threshold, mask is empty");
        return BinaryMask::empty(raster.width(), raster.height());
    }

    let scale = 255.0 / (max - min);
    let mut histogram = [0u64; HISTOGRAM_BINS];
    for &v in values.iter().filter(|v| v.is_finite()) {
        let bin = ((v as f64 - min) * scale + 0.5) as usize;
        histogram[bin.min(HISTOGRAM_BINS - 1)] += 1;
    }

    let Some(threshold) = max_entropy_threshold(&histogram) else {
        return BinaryMask::empty(raster.width(), raster.height());
    };
    let lower = min + (threshold as f64 + 1.0) / 255.0 * (max - min);
    debug!("MaxEntropy threshold bin {} -> level {:.4}", threshold, lower);

    let width = raster.width();
    BinaryMask::from_fn(width, raster.height(), |x, y| {
        let v = values[y * width + x] as f64;
        v >= lower && v <= max
    })
}
