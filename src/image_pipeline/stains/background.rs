//! Large-scale background removal for the flat field.
//!
//! The flat field is inverted so contamination becomes bright on a dark
//! background, then a sliding paraboloid (the rolling-ball variant with a
//! curvature of `1 / (2 * radius)`) estimates the background from below and
//! it is subtracted. Only local bright structure remains: the stains.

use tracing::{debug, instrument};

use crate::image_pipeline::common::error::Result;
use crate::image_pipeline::raster::Raster;
use crate::image_pipeline::stains::types::Intermediates;

/// Inverts a flat field and subtracts its rolling-ball background.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackgroundFlattener {
    /// Ball radius in pixels; `None` uses the image width
    pub radius: Option<f64>,
    /// The (inverted) image has a light background
    pub light_background: bool,
    /// 3x3 maximum then 3x3 mean before estimating
    pub presmooth: bool,
    /// Keep particles in the image corners from being taken as background
    pub correct_corners: bool,
}

impl Default for BackgroundFlattener {
    fn default() -> Self {
        Self {
            radius: None,
            light_background: false,
            presmooth: true,
            correct_corners: true,
        }
    }
}

impl BackgroundFlattener {
    /// Returns a new float raster; `flat` is left untouched.
    #[instrument(skip_all, fields(width = flat.width(), height = flat.height()))]
    pub fn flatten(&self, flat: &Raster, intermediates: &mut Intermediates) -> Result<Raster> {
        let inverted = flat.inverted();
        intermediates.record("Debug_1.1-Inverted", || Ok(inverted.clone()))?;

        let width = flat.width();
        let height = flat.height();
        let radius = self.radius.unwrap_or(width as f64) as f32;
        debug!("Estimating background with radius {}", radius);

        let source = inverted.float_view().into_owned();
        let mut background = source.clone();
        SlidingParaboloid::new(width, height, radius).estimate(
            &mut background,
            self.light_background,
            self.presmooth,
            self.correct_corners,
        );

        let subtracted = source.iter().zip(&background).map(|(&s, &b)| s - b).collect();
        let mut flattened = Raster::from_f32(flat.title(), width, height, subtracted)?;
        flattened.reset_display_range();
        intermediates.record("Debug_1.2-BackgroundSubtracted", || Ok(flattened.clone()))?;

        Ok(flattened)
    }
}

#[derive(Debug, Clone, Copy)]
enum Direction {
    X,
    Y,
    /// down-right, lines starting on the top row
    Diagonal1A,
    /// down-right, lines starting on the left column
    Diagonal1B,
    /// down-left, lines starting on the top row
    Diagonal2A,
    /// down-left, lines starting on the right column
    Diagonal2B,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Filter3 {
    Maximum,
    Mean,
}

struct SlidingParaboloid {
    width: usize,
    height: usize,
    radius: f32,
    cache: Vec<f32>,
    next_point: Vec<usize>,
}

impl SlidingParaboloid {
    fn new(width: usize, height: usize, radius: f32) -> Self {
        let longest = width.max(height);
        Self {
            width,
            height,
            radius: radius.max(f32::MIN_POSITIVE),
            cache: vec![0.0; longest],
            next_point: vec![0; longest],
        }
    }

    /// Replaces `pixels` with the background estimate.
    fn estimate(&mut self, pixels: &mut [f32], invert: bool, presmooth: bool, correct_corners: bool) {
        let coeff2 = 0.5 / self.radius;
        let coeff2_diag = 1.0 / self.radius;

        if invert {
            pixels.iter_mut().for_each(|p| *p = -*p);
        }

        let mut shift_by = 0.0f32;
        if presmooth {
            // the maximum removes dark outliers, the mean removes noise
            shift_by = self.filter3x3(pixels, Filter3::Maximum) as f32;
            self.filter3x3(pixels, Filter3::Mean);
        }
        if correct_corners {
            self.correct_corners(pixels, coeff2);
        }

        self.filter1d(pixels, Direction::X, coeff2);
        self.filter1d(pixels, Direction::Y, coeff2);
        self.filter1d(pixels, Direction::X, coeff2);
        self.filter1d(pixels, Direction::Diagonal1A, coeff2_diag);
        self.filter1d(pixels, Direction::Diagonal1B, coeff2_diag);
        self.filter1d(pixels, Direction::Diagonal2A, coeff2_diag);
        self.filter1d(pixels, Direction::Diagonal2B, coeff2_diag);
        self.filter1d(pixels, Direction::Diagonal1A, coeff2_diag);
        self.filter1d(pixels, Direction::Diagonal1B, coeff2_diag);

        if invert {
            pixels.iter_mut().for_each(|p| *p = -(*p - shift_by));
        } else if presmooth {
            pixels.iter_mut().for_each(|p| *p -= shift_by);
        }
    }

    /// Separable 3x3 filter. Returns the mean upward shift a maximum filter caused.
    fn filter3x3(&self, pixels: &mut [f32], filter: Filter3) -> f64 {
        let (width, height) = (self.width, self.height);
        let mut shift_by = 0.0;
        for y in 0..height {
            shift_by += filter3(pixels, width, y * width, 1, filter);
        }
        for x in 0..width {
            shift_by += filter3(pixels, height, x, width, filter);
        }
        shift_by / width as f64 / height as f64
    }

    fn filter1d(&mut self, pixels: &mut [f32], direction: Direction, coeff2: f32) {
        let (width, height) = (self.width, self.height);
        let w = width as isize;

        let (start_line, n_lines, line_inc, point_inc) = match direction {
            Direction::X => (0, height, width, 1),
            Direction::Y => (0, width, 1, w),
            Direction::Diagonal1A => (0, width.saturating_sub(2), 1, w + 1),
            Direction::Diagonal1B => (1, height.saturating_sub(2), width, w + 1),
            Direction::Diagonal2A => (2, width, 1, w - 1),
            Direction::Diagonal2B => (1, height.saturating_sub(2), width, w - 1),
        };

        for i in start_line..n_lines {
            let mut start = i * line_inc;
            if matches!(direction, Direction::Diagonal2B) {
                start += width - 1;
            }
            let length = match direction {
                Direction::X => width,
                Direction::Y => height,
                Direction::Diagonal1A => height.min(width - i),
                Direction::Diagonal1B => width.min(height - i),
                Direction::Diagonal2A => height.min(i + 1),
                Direction::Diagonal2B => width.min(height - i),
            };
            self.line_slide_parabola(pixels, start, point_inc, length, coeff2, None);
        }
    }

    /// Lowers corner pixels that sit on particles to the value extrapolated
    /// from the edge lines and diagonals through that corner.
    fn correct_corners(&mut self, pixels: &mut [f32], coeff2: f32) {
        let (width, height) = (self.width, self.height);
        let w = width as isize;
        let mut corners = [0.0f32; 4];
        let mut edges = [0.0f32; 2];

        self.line_slide_parabola(pixels, 0, 1, width, coeff2, Some(&mut edges));
        corners[0] = edges[0];
        corners[1] = edges[1];
        self.line_slide_parabola(pixels, (height - 1) * width, 1, width, coeff2, Some(&mut edges));
        corners[2] = edges[0];
        corners[3] = edges[1];
        self.line_slide_parabola(pixels, 0, w, height, coeff2, Some(&mut edges));
        corners[0] += edges[0];
        corners[2] += edges[1];
        self.line_slide_parabola(pixels, width - 1, w, height, coeff2, Some(&mut edges));
        corners[1] += edges[0];
        corners[3] += edges[1];

        let diag_length = width.min(height);
        let coeff2_diag = 2.0 * coeff2;
        self.line_slide_parabola(pixels, 0, 1 + w, diag_length, coeff2_diag, Some(&mut edges));
        corners[0] += edges[0];
        self.line_slide_parabola(pixels, width - 1, w - 1, diag_length, coeff2_diag, Some(&mut edges));
        corners[1] += edges[0];
        self.line_slide_parabola(pixels, (height - 1) * width, 1 - w, diag_length, coeff2_diag, Some(&mut edges));
        corners[2] += edges[0];
        self.line_slide_parabola(pixels, width * height - 1, -1 - w, diag_length, coeff2_diag, Some(&mut edges));
        corners[3] += edges[0];

        let corner_pixels = [0, width - 1, (height - 1) * width, width * height - 1];
        for (&p, &sum) in corner_pixels.iter().zip(&corners) {
            if pixels[p] > sum / 3.0 {
                pixels[p] = sum / 3.0;
            }
        }
    }

    /// Slides a parabola of curvature `coeff2` along one line from below and
    /// replaces the line by the parabola hull. With `corrected_edges`, also
    /// estimates the two end values as if no particle touched the line ends.
    fn line_slide_parabola(
        &mut self,
        pixels: &mut [f32],
        start: usize,
        inc: isize,
        length: usize,
        coeff2: f32,
        corrected_edges: Option<&mut [f32; 2]>,
    ) -> f32 {
        if length == 0 {
            return f32::MAX;
        }
        let cache = &mut self.cache;
        let next_point = &mut self.next_point;
        let at = |i: usize| (start as isize + i as isize * inc) as usize;

        let mut min_value = f32::MAX;
        let mut last_point = 0;
        let mut first_corner = length - 1;
        let mut last_corner = 0;
        let mut v_previous1 = 0.0f32;
        let mut v_previous2 = 0.0f32;

        // chain the points that a parabola of this curvature can touch at all
        for i in 0..length {
            let v = pixels[at(i)];
            cache[i] = v;
            if v < min_value {
                min_value = v;
            }
            if i >= 2 && 2.0 * v_previous1 - v_previous2 - v <= 2.0 * coeff2 {
                next_point[last_point] = i - 1;
                last_point = i - 1;
            }
            v_previous2 = v_previous1;
            v_previous1 = v;
        }
        next_point[last_point] = length - 1;
        next_point[length - 1] = usize::MAX;

        let mut i1 = 0;
        while i1 + 1 < length {
            let v1 = cache[i1];
            let mut min_slope = f32::MAX;
            let mut i2 = i1;
            let mut search_to = length;
            let mut recalculate_limit_now = 0i32;

            let mut j = next_point[i1];
            while j < search_to {
                let d = (j - i1) as f32;
                let slope = (cache[j] - v1) / d + coeff2 * d;
                if slope < min_slope {
                    min_slope = slope;
                    i2 = j;
                    recalculate_limit_now = -3;
                }
                if recalculate_limit_now == 0 {
                    let b = 0.5 * min_slope as f64 / coeff2 as f64;
                    let reach = b + (b * b + (v1 - min_value) as f64 / coeff2 as f64).sqrt() + 1.0;
                    if reach.is_finite() && reach > 0.0 {
                        let max_search = i1 + reach as usize;
                        if max_search < search_to {
                            search_to = max_search;
                        }
                    }
                }
                j = next_point[j];
                recalculate_limit_now += 1;
            }
            if i2 == i1 {
                // NaN data: no slope compares, leave the rest of the line as is
                break;
            }

            if i1 == 0 {
                first_corner = i2;
            }
            if i2 == length - 1 {
                last_corner = i1;
            }
            for j in i1 + 1..i2 {
                let d = (j - i1) as f32;
                pixels[at(j)] = v1 + d * (min_slope - d * coeff2);
            }
            i1 = i2;
        }

        if let Some(edges) = corrected_edges {
            // particles touching an edge must be smaller than a quarter of the line
            if 4 * first_corner >= length {
                first_corner = 0;
            }
            if 4 * (length - 1 - last_corner) >= length {
                last_corner = length - 1;
            }
            let v1 = cache[first_corner];
            let v2 = cache[last_corner];
            let span = (last_corner as f32) - (first_corner as f32);
            let slope = (v2 - v1) / span;
            let value0 = v1 - slope * first_corner as f32;
            let mid = 0.5 * (last_corner + first_corner) as f32;

            // vignetting modelled as a 6th-order polynomial, zero at both corners
            let poly6 = |i: f32| {
                let dx = (i - mid) * 2.0 / span;
                dx.powi(6) - 1.0
            };
            let mut coeff6 = 0.0f32;
            for i in (length + 2) / 3..=(2 * length) / 3 {
                let p6 = poly6(i as f32);
                let line = value0 + slope * i as f32;
                if cache[i] < line + coeff6 * p6 {
                    coeff6 = -(line - cache[i]) / p6;
                }
            }

            let fc = first_corner as f32;
            let tail = (length - 1 - last_corner) as f32;
            edges[0] = value0 + coeff6 * poly6(fc) + coeff2 * fc * fc;
            edges[1] = value0 + (length - 1) as f32 * slope + coeff6 * poly6(last_corner as f32) + coeff2 * tail * tail;
        }

        min_value
    }
}

/// Three-point filter along one line. Returns the summed shift for a maximum.
fn filter3(pixels: &mut [f32], length: usize, pixel0: usize, inc: usize, filter: Filter3) -> f64 {
    let mut shift_by = 0.0f64;
    let mut v3 = pixels[pixel0];
    let mut v2 = v3;
    let mut p = pixel0;
    for i in 0..length {
        let v1 = v2;
        v2 = v3;
        if i + 1 < length {
            v3 = pixels[p + inc];
        }
        match filter {
            Filter3::Maximum => {
                let max = v1.max(v2).max(v3);
                shift_by += (max - v2) as f64;
                pixels[p] = max;
            }
            Filter3::Mean => pixels[p] = (v1 + v2 + v3) * 0.333_333_34,
        }
        p += inc;
    }
    shift_by
}
