//! Stain mask extraction: threshold, then drop the smallest particles.

use std::collections::BTreeSet;

use image::{GrayImage, Luma};
use imageproc::region_labelling::{Connectivity, connected_components};
use tracing::{debug, instrument};

use crate::image_pipeline::common::error::Result;
use crate::image_pipeline::raster::{BinaryMask, Raster};
use crate::image_pipeline::stains::threshold::max_entropy_mask;
use crate::image_pipeline::stains::types::Intermediates;

/// Builds the binary stain mask from a flattened flat field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DirtyMaskExtractor {
    /// Share (0-100) of the distinct particle areas that survive
    pub percentile: u8,
}

impl DirtyMaskExtractor {
    pub fn new(percentile: u8) -> Self {
        Self {
            percentile: percentile.min(100),
        }
    }

    #[instrument(skip_all, fields(percentile = self.percentile))]
    pub fn extract(&self, flattened: &Raster, intermediates: &mut Intermediates) -> Result<BinaryMask> {
        let thresholded = max_entropy_mask(flattened);
        debug!("Thresholded mask has {} foreground pixels", thresholded.foreground_count());
        intermediates.record("Debug_2.1-Thresholded_Mask", || thresholded.to_raster(""))?;

        let filtered = filter_small_particles(&thresholded, self.percentile);
        intermediates.record("Debug_2.2-Small_Particle_Filtered_Mask", || filtered.to_raster(""))?;
        Ok(filtered)
    }
}

/// 8-connected particles of a mask, labelled from 1, with their pixel areas.
pub struct Particles {
    labels: image::ImageBuffer<Luma<u32>, Vec<u32>>,
    /// Indexed by label; entry 0 is the background
    areas: Vec<usize>,
}

impl Particles {
    pub fn find(mask: &BinaryMask) -> Self {
        let labels = connected_components(mask.as_image(), Connectivity::Eight, Luma([0u8]));
        let count = labels.pixels().map(|p| p.0[0]).max().unwrap_or(0) as usize;
        let mut areas = vec![0usize; count + 1];
        for p in labels.pixels() {
            areas[p.0[0] as usize] += 1;
        }
        Self { labels, areas }
    }

    pub fn len(&self) -> usize {
        self.areas.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn areas(&self) -> &[usize] {
        &self.areas[1..]
    }

    /// Mask of the particles whose area is at least `min_area`.
    pub fn keep_at_least(&self, min_area: usize) -> BinaryMask {
        let (width, height) = self.labels.dimensions();
        let image = GrayImage::from_fn(width, height, |x, y| {
            let label = self.labels.get_pixel(x, y).0[0] as usize;
            if label != 0 && self.areas[label] >= min_area {
                Luma([BinaryMask::FOREGROUND])
            } else {
                Luma([0])
            }
        });
        BinaryMask::from_gray_image(image)
    }
}

/// Smallest area kept at `percentile` given the distinct areas in ascending order.
///
/// The cut index is `floor(n * (100 - percentile) / 100)`; past the end nothing
/// is cut.
pub fn minimum_area(distinct_areas: &[usize], percentile: u8) -> usize {
    let percentile = percentile.min(100) as usize;
    let cutoff = distinct_areas.len() * (100 - percentile) / 100;
    distinct_areas.get(cutoff).copied().unwrap_or(0)
}

/// Removes particles smaller than the percentile cut of distinct areas.
/// A mask without particles is returned unchanged.
pub fn filter_small_particles(mask: &BinaryMask, percentile: u8) -> BinaryMask {
    let particles = Particles::find(mask);
    if particles.is_empty() {
        debug!("No particles to filter");
        return mask.clone();
    }

    let distinct: Vec<usize> = particles.areas().iter().copied().collect::<BTreeSet<_>>().into_iter().collect();
    let min_area = minimum_area(&distinct, percentile);
    debug!(
        "{} particles, {} distinct areas, keeping area >= {}",
        particles.len(),
        distinct.len(),
        min_area
    );
    particles.keep_at_least(min_area)
}
