//! Pseudo flat-field correction module
//!
//! Evens out illumination without a reference image: a wide Gaussian blur of
//! the image itself stands in for the flat field, and every pixel is scaled by
//! `mean(background) / background`.

pub mod gaussian;


use tracing::{debug, info, instrument, warn};

use crate::image_pipeline::common::error::Result;
use crate::image_pipeline::raster::Raster;

pub use gaussian::GaussianBlur;

/// Radii below this are raised to it.
pub const MIN_BLUR_RADIUS: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PffcParams {
    pub blur_radius: f64,
    /// Suppress the blurred background preview
    pub hide_background: bool,
    /// Interactive preview run; debug output is off in this mode
    pub preview_mode: bool,
    pub debug: bool,
}

impl Default for PffcParams {
    fn default() -> Self {
        Self {
            blur_radius: 50.0,
            hide_background: true,
            preview_mode: false,
            debug: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PffcOutput {
    pub corrected: Raster,
    /// Blurred background titled `PFFC_Blurred_Background_<title>`
    pub background_preview: Option<Raster>,
    pub background_mean: f64,
}

#[derive(Debug, Clone, Default)]
pub struct PseudoFlatFieldCorrector {
    params: PffcParams,
}

impl PseudoFlatFieldCorrector {
    pub fn new(params: PffcParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &PffcParams {
        &self.params
    }

    #[instrument(skip_all, fields(image = image.title(), radius = self.params.blur_radius))]
    pub fn correct(&self, image: &Raster) -> Result<PffcOutput> {
        let radius = if self.params.blur_radius < MIN_BLUR_RADIUS || self.params.blur_radius.is_nan() {
            debug!("Blur radius {} raised to {}", self.params.blur_radius, MIN_BLUR_RADIUS);
            MIN_BLUR_RADIUS
        } else {
            self.params.blur_radius
        };

        let background = GaussianBlur::new(radius).apply(image)?;
        let mean = background.mean();
        if mean == 0.0 {
            warn!("Blurred background has zero mean, returning the image unchanged");
            return Ok(PffcOutput {
                corrected: image.clone(),
                background_preview: None,
                background_mean: mean,
            });
        }
        if mean.is_nan() {
            warn!("Blurred background mean is not a number");
        }
        info!("Background mean {:.4}", mean);

        let blurred = background.float_view();
        let data = image
            .float_view()
            .iter()
            .zip(blurred.iter())
            .map(|(&orig, &blur)| {
                if blur != 0.0 && !blur.is_nan() {
                    (orig as f64 * mean / blur as f64) as f32
                } else {
                    orig
                }
            })
            .collect();
        let mut corrected = Raster::from_f32(
            format!("PFFC_Applied_to_{}", image.title()),
            image.width(),
            image.height(),
            data,
        )?;
        corrected.reset_display_range();

        let show_background =
            !self.params.hide_background || (self.params.debug && !self.params.preview_mode);
        let background_preview = show_background.then(|| {
            let mut preview = background.clone().with_title(format!("PFFC_Blurred_Background_{}", image.title()));
            preview.reset_display_range();
            preview
        });

        Ok(PffcOutput {
            corrected,
            background_preview,
            background_mean: mean,
        })
    }
}

/// Divides `image` by its own Gaussian-blurred background, rescaled to the
/// background mean. The result is a float raster titled `PFFC_Applied_to_<title>`.
pub fn pseudo_flat_field_correct(
    image: &Raster,
    blur_radius: f64,
    hide_background: bool,
    preview_mode: bool,
) -> Result<PffcOutput> {
    PseudoFlatFieldCorrector::new(PffcParams {
        blur_radius,
        hide_background,
        preview_mode,
        debug: false,
    })
    .correct(image)
}
