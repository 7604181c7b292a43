//! Stain removal pipeline: decode sample and flat field, clean, optionally
//! apply pseudo flat-field correction, and encode the result as TIFF.

use std::io::Write;
use std::path::Path;
use tracing::{info, instrument, warn};

use crate::image_pipeline::{
    common::error::{PipelineError, Result},
    common::timing::PipelineTimings,
    conversions::config::PipelineConfig,
    pffc::PseudoFlatFieldCorrector,
    raster::{BitDepth, Raster, are_images_compatible, convert_to_match},
    raw::RasterReader,
    stains::{CorrectionFactor, DebugImage, RegionMeans, StainRemover, describe},
    tiff::{StandardTiffWriter, TiffRasterReader, TiffWriter},
};

/// Outcome of one pipeline run, apart from the encoded image itself.
#[derive(Debug, Clone)]
pub struct ProcessingReport {
    pub title: String,
    pub width: usize,
    pub height: usize,
    pub bit_depth: BitDepth,
    pub correction_factor: CorrectionFactor,
    pub flat_means: Option<RegionMeans>,
    pub sample_means: Option<RegionMeans>,
    /// The flat field had to be resized or depth-converted
    pub flat_converted: bool,
    pub pffc_applied: bool,
    pub debug_images: Vec<DebugImage>,
    pub background_preview: Option<Raster>,
}

/// Final raster plus its report, before encoding.
#[derive(Debug, Clone)]
pub struct ProcessedImage {
    pub image: Raster,
    pub report: ProcessingReport,
}

pub struct StainRemovalPipeline<R: RasterReader, W: TiffWriter> {
    reader: R,
    writer: W,
    config: PipelineConfig,
}

impl StainRemovalPipeline<TiffRasterReader, StandardTiffWriter> {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            reader: TiffRasterReader,
            writer: StandardTiffWriter,
            config,
        }
    }
}

impl<R: RasterReader, W: TiffWriter> StainRemovalPipeline<R, W> {
    pub fn with_custom(reader: R, writer: W, config: PipelineConfig) -> Self {
        Self {
            reader,
            writer,
            config,
        }
    }

    /// Brings the flat field to the sample's geometry and depth, or rejects it.
    fn reconcile_flat(&self, sample: &Raster, flat: &Raster) -> Result<Option<Raster>> {
        if are_images_compatible(sample, flat) {
            return Ok(None);
        }
        if !self.config.auto_convert {
            return Err(PipelineError::IncompatibleImages {
                sample: describe(sample),
                flat: describe(flat),
            });
        }
        warn!(
            sample = %describe(sample),
            flat = %describe(flat),
            "Flat field does not match sample, converting"
        );
        convert_to_match(flat, sample).map(Some)
    }

    /// Runs stain removal and the optional PFFC on decoded rasters.
    #[instrument(skip_all, fields(sample = sample.title(), flat = flat.title()))]
    pub fn process_rasters(&self, sample: &Raster, flat: &Raster) -> Result<ProcessedImage> {
        self.process_rasters_timed(sample, flat, &mut PipelineTimings::new())
    }

    fn process_rasters_timed(
        &self,
        sample: &Raster,
        flat: &Raster,
        timings: &mut PipelineTimings,
    ) -> Result<ProcessedImage> {
        self.config.validate()?;

        let converted = timings.measure("match_flat_field", || self.reconcile_flat(sample, flat))?;
        let flat_converted = converted.is_some();
        let flat = converted.as_ref().unwrap_or(flat);

        let remover = StainRemover::new(self.config.stain_params());
        let stains = timings.measure("remove_stains", || remover.run(sample, flat))?;
        let mut debug_images = stains.intermediates;
        let mut background_preview = None;

        let mut result = stains.cleaned;
        if self.config.pffc {
            if self.config.debug {
                debug_images.push(DebugImage {
                    label: format!("Cleaned_BeforePFFC_{}", sample.title()),
                    raster: result.clone().with_title(format!("Cleaned_BeforePFFC_{}", sample.title())),
                });
            }
            let corrector = PseudoFlatFieldCorrector::new(self.config.pffc_params());
            let pffc = timings.measure("pseudo_flat_field", || corrector.correct(&result))?;
            background_preview = pffc.background_preview;
            result = pffc.corrected.with_title(format!("PFFC_Cleaned_{}", sample.title()));
        }

        let title = result.title().to_string();
        let image = timings.measure("match_sample", || restore_sample_encoding(result, sample))?;

        info!(
            title = %title,
            k = stains.correction_factor.value,
            "Stain removal complete"
        );
        Ok(ProcessedImage {
            report: ProcessingReport {
                title,
                width: image.width(),
                height: image.height(),
                bit_depth: image.bit_depth(),
                correction_factor: stains.correction_factor,
                flat_means: stains.flat_means,
                sample_means: stains.sample_means,
                flat_converted,
                pffc_applied: self.config.pffc,
                debug_images,
                background_preview,
            },
            image,
        })
    }

    #[instrument(skip_all, fields(sample_size = sample_data.len(), flat_size = flat_data.len()))]
    pub fn process(&self, sample_data: &[u8], flat_data: &[u8], output: &mut dyn Write) -> Result<ProcessingReport> {
        self.process_with_timings(sample_data, flat_data, output)
            .map(|(report, _)| report)
    }

    pub fn process_with_timings(
        &self,
        sample_data: &[u8],
        flat_data: &[u8],
        output: &mut dyn Write,
    ) -> Result<(ProcessingReport, PipelineTimings)> {
        self.run(sample_data, "sample", flat_data, "flat", output)
    }

    fn run(
        &self,
        sample_data: &[u8],
        sample_title: &str,
        flat_data: &[u8],
        flat_title: &str,
        output: &mut dyn Write,
    ) -> Result<(ProcessingReport, PipelineTimings)> {
        info!("Starting stain removal");
        let mut timings = PipelineTimings::new();

        let sample = {
            let _span = tracing::info_span!("decode_sample").entered();
            timings.measure("decode_sample", || self.reader.read_raster(sample_data, sample_title))?
        };
        let flat = {
            let _span = tracing::info_span!("decode_flat").entered();
            timings.measure("decode_flat", || self.reader.read_raster(flat_data, flat_title))?
        };

        let processed = self.process_rasters_timed(&sample, &flat, &mut timings)?;

        {
            let _span = tracing::info_span!("encode_tiff").entered();
            let options = self.config.tiff_options();
            timings.measure("encode_tiff", || self.writer.write_tiff(&processed.image, output, &options))?;
        }

        info!(
            width = processed.report.width,
            height = processed.report.height,
            "Processing complete"
        );
        Ok((processed.report, timings))
    }

    #[instrument(skip(self, sample_path, flat_path, output_path))]
    pub fn process_files<P: AsRef<Path>, Q: AsRef<Path>, S: AsRef<Path>>(
        &self,
        sample_path: P,
        flat_path: Q,
        output_path: S,
    ) -> Result<ProcessingReport> {
        self.process_files_with_timings(sample_path, flat_path, output_path)
            .map(|(report, _)| report)
    }

    pub fn process_files_with_timings<P: AsRef<Path>, Q: AsRef<Path>, S: AsRef<Path>>(
        &self,
        sample_path: P,
        flat_path: Q,
        output_path: S,
    ) -> Result<(ProcessingReport, PipelineTimings)> {
        let sample_path = sample_path.as_ref();
        let flat_path = flat_path.as_ref();
        let output_path = output_path.as_ref();

        info!(
            sample = %sample_path.display(),
            flat = %flat_path.display(),
            output = %output_path.display(),
            "Processing files"
        );

        let (sample_data, flat_data) = {
            let _span = tracing::info_span!("read_input_files").entered();
            (read_input(sample_path)?, read_input(flat_path)?)
        };

        let mut output_file = {
            let _span = tracing::info_span!("create_output_file").entered();
            std::fs::File::create(output_path).map_err(|e| {
                PipelineError::OutputWriteError(format!("{}: {}", output_path.display(), e))
            })?
        };

        self.run(
            &sample_data,
            &title_of(sample_path),
            &flat_data,
            &title_of(flat_path),
            &mut output_file,
        )
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: PipelineConfig) {
        self.config = config;
    }
}

/// Converts the float result back to the sample's geometry and bit depth.
///
/// The result carries its data min/max as display range, so integer samples
/// get that range stretched over the full type range.
fn restore_sample_encoding(result: Raster, sample: &Raster) -> Result<Raster> {
    convert_to_match(&result, sample)
}

fn read_input(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).map_err(|e| PipelineError::InputReadError(format!("{}: {}", path.display(), e)))
}

fn title_of(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string())
}
