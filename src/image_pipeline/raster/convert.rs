//! Geometry and bit-depth reconciliation between rasters.

use tracing::{debug, instrument};

use crate::image_pipeline::common::error::Result;
use crate::image_pipeline::raster::types::{BitDepth, PixelData, Raster};

/// True when both rasters share width, height and bit depth.
///
/// Only grayscale rasters exist, so the pixel type is fully determined by the
/// bit depth.
pub fn are_images_compatible(a: &Raster, b: &Raster) -> bool {
    a.width() == b.width() && a.height() == b.height() && a.bit_depth() == b.bit_depth()
}

/// Resizes and depth-converts `source` so it is compatible with `target`.
///
/// Resizing is bilinear. Depth conversion scales over the source display
/// range, except 8-bit to 16-bit which widens values unchanged. The source
/// title is kept.
#[instrument(skip_all, fields(source = source.title(), target = target.title()))]
pub fn convert_to_match(source: &Raster, target: &Raster) -> Result<Raster> {
    let mut converted = source.clone();

    if source.width() != target.width() || source.height() != target.height() {
        debug!(
            "Resizing {}x{} -> {}x{}",
            source.width(),
            source.height(),
            target.width(),
            target.height()
        );
        converted = resize_bilinear(&converted, target.width(), target.height())?;
    }

    if converted.bit_depth() != target.bit_depth() {
        debug!(
            "Converting {}-bit -> {}-bit",
            converted.bit_depth().bits(),
            target.bit_depth().bits()
        );
        converted = convert_bit_depth(&converted, target.bit_depth())?;
    }

    Ok(converted)
}

/// Converts to `depth`, scaling over the display range where precision shrinks.
pub fn convert_bit_depth(source: &Raster, depth: BitDepth) -> Result<Raster> {
    let range = source.display_range();
    let (min, max) = (range.min, range.max);

    let pixels = match (source.pixels(), depth) {
        (PixelData::U8(_), BitDepth::Eight)
        | (PixelData::U16(_), BitDepth::Sixteen)
        | (PixelData::F32(_), BitDepth::ThirtyTwo) => return Ok(source.clone()),

        (_, BitDepth::ThirtyTwo) => PixelData::F32(source.float_view().into_owned()),

        (PixelData::U16(v), BitDepth::Eight) => {
            let scale = 256.0 / (max - min + 1.0);
            PixelData::U8(
                v.iter()
                    .map(|&p| {
                        let shifted = (p as f64 - min).max(0.0);
                        (shifted * scale + 0.5).min(255.0) as u8
                    })
                    .collect(),
            )
        }
        (PixelData::F32(v), BitDepth::Eight) => {
            let scale = if max > min { 255.0 / (max - min) } else { 1.0 };
            PixelData::U8(
                v.iter()
                    .map(|&p| scale_clamped(p as f64, min, scale, 255.0) as u8)
                    .collect(),
            )
        }
        (PixelData::U8(v), BitDepth::Sixteen) => {
            PixelData::U16(v.iter().map(|&p| p as u16).collect())
        }
        (PixelData::F32(v), BitDepth::Sixteen) => {
            let scale = if max > min { 65535.0 / (max - min) } else { 1.0 };
            PixelData::U16(
                v.iter()
                    .map(|&p| scale_clamped(p as f64, min, scale, 65535.0) as u16)
                    .collect(),
            )
        }
    };

    source.with_pixels(pixels)
}

fn scale_clamped(value: f64, min: f64, scale: f64, limit: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    ((value - min) * scale + 0.5).clamp(0.0, limit)
}

/// Bilinear resize with pixel-centre alignment. Integer rasters are rounded
/// back to their own depth.
pub fn resize_bilinear(source: &Raster, width: usize, height: usize) -> Result<Raster> {
    let src = source.float_view();
    let (src_w, src_h) = (source.width(), source.height());

    let x_scale = width as f64 / src_w as f64;
    let y_scale = height as f64 / src_h as f64;
    let src_center_x = src_w as f64 / 2.0;
    let src_center_y = src_h as f64 / 2.0;
    let mut dst_center_x = width as f64 / 2.0;
    let mut dst_center_y = height as f64 / 2.0;
    if width != src_w {
        dst_center_x += x_scale / 4.0;
    }
    if height != src_h {
        dst_center_y += y_scale / 4.0;
    }

    let x_limit = (src_w - 1) as f64;
    let y_limit = (src_h - 1) as f64;
    let mut out = Vec::with_capacity(width * height);
    for y in 0..height {
        let ys = ((y as f64 - dst_center_y) / y_scale + src_center_y).clamp(0.0, y_limit);
        for x in 0..width {
            let xs = ((x as f64 - dst_center_x) / x_scale + src_center_x).clamp(0.0, x_limit);
            out.push(interpolate(&src, src_w, src_h, xs, ys));
        }
    }

    let pixels = match source.bit_depth() {
        BitDepth::Eight => PixelData::U8(out.iter().map(|&v| (v as f64 + 0.5).clamp(0.0, 255.0) as u8).collect()),
        BitDepth::Sixteen => {
            PixelData::U16(out.iter().map(|&v| (v as f64 + 0.5).clamp(0.0, 65535.0) as u16).collect())
        }
        BitDepth::ThirtyTwo => PixelData::F32(out),
    };
    Raster::new(source.title(), width, height, pixels)
}

fn interpolate(pixels: &[f32], width: usize, height: usize, x: f64, y: f64) -> f32 {
    let x0 = x as usize;
    let y0 = y as usize;
    let x1 = (x0 + 1).min(width - 1);
    let y1 = (y0 + 1).min(height - 1);
    let fx = x - x0 as f64;
    let fy = y - y0 as f64;

    let p00 = pixels[y0 * width + x0] as f64;
    let p10 = pixels[y0 * width + x1] as f64;
    let p01 = pixels[y1 * width + x0] as f64;
    let p11 = pixels[y1 * width + x1] as f64;

    let top = p00 + fx * (p10 - p00);
    let bottom = p01 + fx * (p11 - p01);
    (top + fy * (bottom - top)) as f32
}
