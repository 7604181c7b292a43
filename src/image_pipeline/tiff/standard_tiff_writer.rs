use std::io::{Cursor, Write};
use tracing::debug;
use tiff::encoder::colortype::{Gray8, Gray16, Gray32Float};
use tiff::encoder::compression::DeflateLevel;
use tiff::encoder::{Compression, TiffEncoder};
use tiff::tags::Predictor;
use crate::image_pipeline::common::error::{Result, PipelineError};
use crate::image_pipeline::raster::{PixelData, Raster};
use crate::image_pipeline::tiff::types::{TiffCompression, TiffWriteOptions};
use crate::image_pipeline::tiff::writer::TiffWriter;

pub struct StandardTiffWriter;

impl TiffWriter for StandardTiffWriter {
    fn write_tiff(&self, raster: &Raster, output: &mut dyn Write, options: &TiffWriteOptions) -> Result<()> {
        debug!(
            "Encoding TIFF image: {}x{} {}-bit",
            raster.width(),
            raster.height(),
            raster.bit_depth().bits()
        );

        let mut buffer = Vec::new();

        let compression = match options.compression {
            TiffCompression::None => Compression::Uncompressed,
            TiffCompression::Lzw => Compression::Lzw,
            TiffCompression::DeflateFast => Compression::Deflate(DeflateLevel::Fast),
            TiffCompression::DeflateBalanced => Compression::Deflate(DeflateLevel::Balanced),
            TiffCompression::DeflateBest => Compression::Deflate(DeflateLevel::Best),
        };

        let mut encoder = TiffEncoder::new(Cursor::new(&mut buffer))
            .map_err(|e| PipelineError::EncodeError(e.to_string()))?
            .with_compression(compression);

        let float = matches!(raster.pixels(), PixelData::F32(_));
        if let Some(predictor_val) = options.predictor {
            if float {
                debug!("Predictor {} skipped for float samples", predictor_val);
            } else {
                let predictor = match predictor_val {
                    2 => Predictor::Horizontal,
                    _ => Predictor::None,
                };
                encoder = encoder.with_predictor(predictor);
            }
        }

        let (width, height) = (raster.width() as u32, raster.height() as u32);
        let written = match raster.pixels() {
            PixelData::U8(data) => encoder.write_image::<Gray8>(width, height, data),
            PixelData::U16(data) => encoder.write_image::<Gray16>(width, height, data),
            PixelData::F32(data) => encoder.write_image::<Gray32Float>(width, height, data),
        };
        written.map_err(|e| PipelineError::EncodeError(e.to_string()))?;

        output.write_all(&buffer)?;

        debug!("TIFF encoding complete, {} bytes", buffer.len());
        Ok(())
    }
}
