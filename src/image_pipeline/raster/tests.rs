use crate::image_pipeline::common::error::PipelineError;
use crate::image_pipeline::raster::{
    BinaryMask, BitDepth, PixelData, Raster, are_images_compatible, convert_to_match,
};

fn gradient_u16(width: usize, height: usize) -> Raster {
    let data = (0..width * height).map(|i| (i * 10) as u16).collect();
    Raster::from_u16("gradient", width, height, data).unwrap()
}

#[test]
fn test_zero_dimensions_rejected() {
    let result = Raster::from_f32("empty", 0, 10, Vec::new());
    assert!(matches!(result, Err(PipelineError::InvalidDimensions(0, 10))));
}

#[test]
fn test_buffer_length_checked() {
    let result = Raster::from_u8("short", 4, 4, vec![0; 15]);
    assert!(matches!(
        result,
        Err(PipelineError::BufferSizeMismatch { expected: 16, actual: 15 })
    ));
}

#[test]
fn test_default_display_ranges() {
    let byte = Raster::from_u8("b", 2, 1, vec![10, 20]).unwrap();
    assert_eq!(byte.display_range().min, 0.0);
    assert_eq!(byte.display_range().max, 255.0);

    let float = Raster::from_f32("f", 3, 1, vec![-2.0, f32::NAN, 7.5]).unwrap();
    assert_eq!(float.display_range().min, -2.0);
    assert_eq!(float.display_range().max, 7.5);
}

#[test]
fn test_inversion_per_depth() {
    let byte = Raster::from_u8("b", 2, 1, vec![0, 200]).unwrap().inverted();
    assert_eq!(byte.pixels(), &PixelData::U8(vec![255, 55]));

    let short = Raster::from_u16("s", 2, 1, vec![0, 1000]).unwrap().inverted();
    assert_eq!(short.pixels(), &PixelData::U16(vec![65535, 64535]));

    let float = Raster::from_f32("f", 3, 1, vec![1.0, 2.0, 5.0]).unwrap().inverted();
    assert_eq!(float.pixels(), &PixelData::F32(vec![5.0, 4.0, 1.0]));
}

#[test]
fn test_inversion_leaves_source_untouched() {
    let original = Raster::from_u8("b", 2, 1, vec![1, 2]).unwrap();
    let snapshot = original.clone();
    let _ = original.inverted();
    assert_eq!(original, snapshot);
}

#[test]
fn test_compatible_with_itself() {
    let a = gradient_u16(8, 6);
    assert!(are_images_compatible(&a, &a));
}

#[test]
fn test_incompatible_depth_or_geometry() {
    let a = gradient_u16(8, 6);
    let b = a.to_float();
    let c = gradient_u16(6, 8);
    assert!(!are_images_compatible(&a, &b));
    assert!(!are_images_compatible(&a, &c));
}

#[test]
fn test_convert_to_match_self_is_identity() {
    let a = gradient_u16(8, 6);
    let converted = convert_to_match(&a, &a).unwrap();
    assert_eq!(converted, a);
}

#[test]
fn test_convert_float_to_byte_scales_display_range() {
    let source = Raster::from_f32("f", 3, 1, vec![-1.0, 0.0, 1.0]).unwrap();
    let target = Raster::from_u8("t", 3, 1, vec![0; 3]).unwrap();
    let converted = convert_to_match(&source, &target).unwrap();

    assert_eq!(converted.bit_depth(), BitDepth::Eight);
    assert_eq!(converted.pixels(), &PixelData::U8(vec![0, 128, 255]));
    assert_eq!(converted.title(), "f");
}

#[test]
fn test_convert_byte_to_short_widens() {
    let source = Raster::from_u8("b", 2, 1, vec![3, 250]).unwrap();
    let target = Raster::from_u16("t", 2, 1, vec![0; 2]).unwrap();
    let converted = convert_to_match(&source, &target).unwrap();
    assert_eq!(converted.pixels(), &PixelData::U16(vec![3, 250]));
}

#[test]
fn test_convert_resizes_to_target_geometry() {
    let source = Raster::from_f32("f", 4, 4, vec![2.0; 16]).unwrap();
    let target = Raster::from_f32("t", 8, 2, vec![0.0; 16]).unwrap();
    let converted = convert_to_match(&source, &target).unwrap();

    assert_eq!((converted.width(), converted.height()), (8, 2));
    assert!(converted.float_view().iter().all(|&v| (v - 2.0).abs() < 1e-6));
}

#[test]
fn test_mask_xor_and_counts() {
    let a = BinaryMask::from_fn(4, 1, |x, _| x < 2);
    let b = BinaryMask::from_fn(4, 1, |x, _| x == 1 || x == 2);
    let x = a.xor(&b).unwrap();

    assert_eq!(x.pixels(), &[255, 0, 255, 0]);
    assert_eq!(x.foreground_count(), 2);
    assert!((x.mean() - 127.5).abs() < 1e-9);
}

#[test]
fn test_mask_xor_rejects_size_mismatch() {
    let a = BinaryMask::empty(4, 4);
    let b = BinaryMask::empty(4, 3);
    assert!(a.xor(&b).is_err());
}

#[test]
fn test_erosion_shrinks_square() {
    let square = BinaryMask::from_fn(20, 20, |x, y| (5..15).contains(&x) && (5..15).contains(&y));
    let eroded = square.eroded(2);
    assert_eq!(eroded.foreground_count(), 6 * 6);
    assert!(eroded.is_foreground(7, 7));
    assert!(!eroded.is_foreground(6, 6));
}

#[test]
fn test_erosion_does_not_eat_image_border() {
    let full = BinaryMask::from_fn(5, 5, |_, _| true);
    assert_eq!(full.eroded(3).foreground_count(), 25);
}

#[test]
fn test_erosion_more_steps_than_u8() {
    let square = BinaryMask::from_fn(12, 12, |x, y| (2..10).contains(&x) && (2..10).contains(&y));
    assert_eq!(square.eroded(300).foreground_count(), 0);
}
