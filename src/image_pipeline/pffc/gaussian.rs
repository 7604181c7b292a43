//! Separable Gaussian blur on float rasters.
//!
//! The kernel reaches to where the Gaussian drops below `accuracy` of its peak
//! and its tail is bent smoothly to zero. Pixels beyond the image edge take
//! the value of the nearest edge pixel.

use crate::image_pipeline::common::error::Result;
use crate::image_pipeline::raster::Raster;

/// Kernel accuracy used for pseudo flat-field backgrounds.
pub const DEFAULT_ACCURACY: f64 = 0.02;

const MIN_MAX_RADIUS: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GaussianBlur {
    pub sigma: f64,
    pub accuracy: f64,
}

impl GaussianBlur {
    pub fn new(sigma: f64) -> Self {
        Self {
            sigma,
            accuracy: DEFAULT_ACCURACY,
        }
    }

    /// Float raster blurred along x then y, keeping the source title.
    pub fn apply(&self, raster: &Raster) -> Result<Raster> {
        let (width, height) = (raster.width(), raster.height());
        let mut data = raster.float_view().into_owned();

        let kernel_x = self.kernel(width);
        let mut line = vec![0.0f32; width];
        for row in data.chunks_exact_mut(width) {
            convolve_line(row, &mut line, &kernel_x);
            row.copy_from_slice(&line);
        }

        let kernel_y = self.kernel(height);
        let mut column = vec![0.0f32; height];
        let mut blurred = vec![0.0f32; height];
        for x in 0..width {
            for (y, c) in column.iter_mut().enumerate() {
                *c = data[y * width + x];
            }
            convolve_line(&column, &mut blurred, &kernel_y);
            for (y, &v) in blurred.iter().enumerate() {
                data[y * width + x] = v;
            }
        }

        Raster::from_f32(raster.title(), width, height, data)
    }

    /// One-sided normalized kernel: `k[0]` is the centre weight.
    pub fn kernel(&self, line_length: usize) -> Vec<f32> {
        let sigma = self.sigma;
        let max_radius = line_length.max(MIN_MAX_RADIUS);
        // capped in f64 so huge or infinite sigmas cannot overflow the cast
        let reach = (sigma * (-2.0 * self.accuracy.ln()).sqrt()).ceil() + 1.0;
        let k_radius = reach.min(max_radius as f64).max(1.0) as usize;

        let mut kernel: Vec<f32> = (0..k_radius)
            .map(|i| {
                let i = i as f64;
                (-0.5 * i * i / sigma / sigma).exp() as f32
            })
            .collect();

        // bend the tail to reach zero with zero slope at the kernel edge
        if k_radius < max_radius && k_radius > 3 {
            let mut sqrt_slope = f64::MAX;
            let mut r = k_radius;
            while r > k_radius / 2 {
                r -= 1;
                let a = (kernel[r] as f64).sqrt() / (k_radius - r) as f64;
                if a < sqrt_slope {
                    sqrt_slope = a;
                } else {
                    break;
                }
            }
            for r1 in r + 2..k_radius {
                let d = (k_radius - r1) as f64;
                kernel[r1] = (d * d * sqrt_slope * sqrt_slope) as f32;
            }
        }

        let sum: f64 = kernel.first().map_or(0.0, |&k| k as f64)
            + 2.0 * kernel.iter().skip(1).map(|&k| k as f64).sum::<f64>();
        kernel.iter_mut().for_each(|k| *k = (*k as f64 / sum) as f32);
        kernel
    }
}

fn convolve_line(input: &[f32], output: &mut [f32], kernel: &[f32]) {
    let last = input.len() - 1;
    for (i, out) in output.iter_mut().enumerate() {
        let mut acc = kernel[0] as f64 * input[i] as f64;
        for (k, &weight) in kernel.iter().enumerate().skip(1) {
            let left = input[i.saturating_sub(k)];
            let right = input[(i + k).min(last)];
            acc += weight as f64 * (left as f64 + right as f64);
        }
        *out = acc as f32;
    }
}
