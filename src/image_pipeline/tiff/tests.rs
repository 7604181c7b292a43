use std::io::Cursor;

use crate::image_pipeline::common::error::PipelineError;
use crate::image_pipeline::raster::{BitDepth, PixelData, Raster};
use crate::image_pipeline::raw::{RasterReader, RawLoaderReader};
use crate::image_pipeline::tiff::{StandardTiffWriter, TiffCompression, TiffRasterReader, TiffWriteOptions, TiffWriter};

fn encode(raster: &Raster, options: &TiffWriteOptions) -> Vec<u8> {
    let mut output = Vec::new();
    StandardTiffWriter.write_tiff(raster, &mut output, options).unwrap();
    output
}

#[test]
fn test_gray8_uncompressed() {
    let raster = Raster::from_u8("b", 5, 3, (0..15).collect()).unwrap();
    let bytes = encode(&raster, &TiffWriteOptions::default());
    let decoded = TiffRasterReader.read_raster(&bytes, "decoded").unwrap();

    assert_eq!(decoded.title(), "decoded");
    assert_eq!(decoded.pixels(), raster.pixels());
}

#[test]
fn test_gray16_every_compression() {
    let raster = Raster::from_u16("s", 8, 4, (0..32).map(|v| v * 1000).collect()).unwrap();
    for compression in [
        TiffCompression::None,
        TiffCompression::Lzw,
        TiffCompression::DeflateFast,
        TiffCompression::DeflateBalanced,
        TiffCompression::DeflateBest,
    ] {
        let options = TiffWriteOptions {
            compression,
            predictor: Some(2),
        };
        let decoded = TiffRasterReader.read_raster(&encode(&raster, &options), "d").unwrap();
        assert_eq!(decoded.pixels(), raster.pixels(), "{:?}", compression);
    }
}

#[test]
fn test_float_keeps_negative_values() {
    let raster = Raster::from_f32("f", 3, 2, vec![-1.5, 0.0, 2.25, 1e6, -7.0, 0.5]).unwrap();
    let options = TiffWriteOptions {
        compression: TiffCompression::Lzw,
        predictor: Some(2),
    };
    let decoded = TiffRasterReader.read_raster(&encode(&raster, &options), "d").unwrap();

    assert_eq!(decoded.bit_depth(), BitDepth::ThirtyTwo);
    assert_eq!(decoded.pixels(), &PixelData::F32(vec![-1.5, 0.0, 2.25, 1e6, -7.0, 0.5]));
}

#[test]
fn test_rgb_rejected() {
    let mut bytes = Vec::new();
    tiff::encoder::TiffEncoder::new(Cursor::new(&mut bytes))
        .unwrap()
        .write_image::<tiff::encoder::colortype::RGB8>(2, 2, &[0u8; 12])
        .unwrap();

    let result = TiffRasterReader.read_raster(&bytes, "rgb");
    assert!(matches!(result, Err(PipelineError::UnsupportedFormat(_))));
}

#[test]
fn test_garbage_is_decode_error() {
    let result = TiffRasterReader.read_raster(b"not a tiff", "x");
    assert!(matches!(result, Err(PipelineError::DecodeError(_))));

    let result = RawLoaderReader.read_raster(b"not a raw file either", "x");
    assert!(matches!(result, Err(PipelineError::DecodeError(_))));
}

#[test]
fn test_bits_per_sample_from_white_level() {
    assert_eq!(RawLoaderReader::bits_per_sample(4095), 12);
    assert_eq!(RawLoaderReader::bits_per_sample(16383), 14);
    assert_eq!(RawLoaderReader::bits_per_sample(u16::MAX), 16);
    assert_eq!(RawLoaderReader::bits_per_sample(0), 16);
}
