use std::io::{Cursor, Write};
use std::sync::{Arc, Mutex};

use crate::image_pipeline::common::error::{PipelineError, Result};
use crate::image_pipeline::conversions::{PipelineConfig, StainRemovalPipeline};
use crate::image_pipeline::raster::{BitDepth, Raster};
use crate::image_pipeline::raw::RasterReader;
use crate::image_pipeline::tiff::{
    StandardTiffWriter, TiffCompression, TiffRasterReader, TiffWriteOptions, TiffWriter,
};

struct MockReader {
    should_fail: bool,
    sample: Raster,
    flat: Raster,
}

impl MockReader {
    fn uniform() -> Self {
        Self {
            should_fail: false,
            sample: Raster::from_u8("ignored", 32, 32, vec![120; 1024]).unwrap(),
            flat: Raster::from_u8("ignored", 32, 32, vec![200; 1024]).unwrap(),
        }
    }
}

impl RasterReader for MockReader {
    fn read_raster(&self, _data: &[u8], title: &str) -> Result<Raster> {
        if self.should_fail {
            return Err(PipelineError::DecodeError("Mock decode error".to_string()));
        }
        let raster = if title == "flat" { &self.flat } else { &self.sample };
        Ok(raster.clone().with_title(title))
    }
}

struct MockWriter {
    should_fail: bool,
    written_data: Arc<Mutex<Vec<Raster>>>,
}

impl TiffWriter for MockWriter {
    fn write_tiff(&self, raster: &Raster, _output: &mut dyn Write, _options: &TiffWriteOptions) -> Result<()> {
        if self.should_fail {
            return Err(PipelineError::EncodeError("Mock encode error".to_string()));
        }
        self.written_data.lock().unwrap().push(raster.clone());
        Ok(())
    }
}

fn pipeline_with(
    reader: MockReader,
    config: PipelineConfig,
) -> (StainRemovalPipeline<MockReader, MockWriter>, Arc<Mutex<Vec<Raster>>>) {
    let written = Arc::new(Mutex::new(Vec::new()));
    let writer = MockWriter {
        should_fail: false,
        written_data: written.clone(),
    };
    (StainRemovalPipeline::with_custom(reader, writer, config), written)
}

#[test]
fn test_config_builder() {
    let config = PipelineConfig::builder()
        .expand_ratio(0.3)
        .percentile(50)
        .pffc(true)
        .pffc_radius(12.5)
        .hide_background(false)
        .auto_convert(false)
        .debug(true)
        .compression(TiffCompression::DeflateBest)
        .predictor(Some(2))
        .build();

    assert_eq!(config.expand_ratio, 0.3);
    assert_eq!(config.percentile, 50);
    assert!(config.pffc);
    assert_eq!(config.pffc_radius, 12.5);
    assert!(!config.hide_background);
    assert!(!config.auto_convert);
    assert!(config.debug);
    assert_eq!(config.compression, TiffCompression::DeflateBest);
    assert_eq!(config.predictor, Some(2));
}

#[test]
fn test_config_defaults() {
    let config = PipelineConfig::builder().build();
    assert_eq!(config.expand_ratio, 0.1);
    assert_eq!(config.percentile, 80);
    assert!(!config.pffc);
    assert_eq!(config.pffc_radius, 50.0);
    assert!(config.hide_background);
    assert!(config.auto_convert);
    assert!(!config.debug);
    assert_eq!(config.compression, TiffCompression::None);
    assert!(config.validate().is_ok());
}

#[test]
fn test_config_validation() {
    let invalid = [
        PipelineConfig::builder().expand_ratio(1.5).build(),
        PipelineConfig::builder().expand_ratio(-0.1).build(),
        PipelineConfig::builder().expand_ratio(f64::NAN).build(),
        PipelineConfig::builder().percentile(101).build(),
        PipelineConfig::builder().pffc(true).pffc_radius(0.2).build(),
    ];
    for config in invalid {
        assert!(matches!(config.validate(), Err(PipelineError::InvalidParameter(_))));
    }

    // radius only matters when PFFC runs
    assert!(PipelineConfig::builder().pffc_radius(0.2).build().validate().is_ok());
}

#[test]
fn test_successful_processing() {
    let (pipeline, written) = pipeline_with(MockReader::uniform(), PipelineConfig::default());

    let mut output = Cursor::new(Vec::new());
    let report = pipeline.process(b"sample", b"flat", &mut output).unwrap();

    assert_eq!(report.title, "Cleaned_sample");
    assert_eq!(report.bit_depth, BitDepth::Eight);
    assert!(report.correction_factor.degenerate);
    assert!(!report.flat_converted);
    assert!(!report.pffc_applied);
    assert!(report.debug_images.is_empty());

    let written = written.lock().unwrap();
    assert_eq!(written.len(), 1);
    assert_eq!(written[0].bit_depth(), BitDepth::Eight);
    // a constant result has no range to stretch and lands on zero
    assert!(written[0].float_view().iter().all(|&v| v == 0.0));
}

#[test]
fn test_integer_output_stretched_to_full_range() {
    let reader = MockReader {
        sample: Raster::from_u16("ignored", 32, 32, (0..1024).map(|i| 1000 + (i % 32) as u16 * 10).collect()).unwrap(),
        flat: Raster::from_u16("ignored", 32, 32, vec![4000; 1024]).unwrap(),
        ..MockReader::uniform()
    };
    let (pipeline, written) = pipeline_with(reader, PipelineConfig::default());

    let mut output = Cursor::new(Vec::new());
    pipeline.process(b"sample", b"flat", &mut output).unwrap();

    let written = written.lock().unwrap();
    let image = &written[0];
    assert_eq!(image.bit_depth(), BitDepth::Sixteen);
    assert_eq!(image.value_at(0, 5), 0.0);
    assert_eq!(image.value_at(31, 5), 65535.0);
    assert!((0..31).all(|x| image.value_at(x, 5) < image.value_at(x + 1, 5)));
}

#[test]
fn test_reader_failure() {
    let reader = MockReader {
        should_fail: true,
        ..MockReader::uniform()
    };
    let (pipeline, written) = pipeline_with(reader, PipelineConfig::default());

    let mut output = Cursor::new(Vec::new());
    let result = pipeline.process(b"sample", b"flat", &mut output);

    assert!(matches!(result.unwrap_err(), PipelineError::DecodeError(_)));
    assert!(written.lock().unwrap().is_empty());
}

#[test]
fn test_writer_failure() {
    let writer = MockWriter {
        should_fail: true,
        written_data: Arc::new(Mutex::new(Vec::new())),
    };
    let pipeline = StainRemovalPipeline::with_custom(MockReader::uniform(), writer, PipelineConfig::default());

    let mut output = Cursor::new(Vec::new());
    let result = pipeline.process(b"sample", b"flat", &mut output);

    assert!(matches!(result.unwrap_err(), PipelineError::EncodeError(_)));
}

#[test]
fn test_invalid_parameters_rejected_before_processing() {
    let config = PipelineConfig::builder().percentile(150).build();
    let (pipeline, written) = pipeline_with(MockReader::uniform(), config);

    let mut output = Cursor::new(Vec::new());
    let result = pipeline.process(b"sample", b"flat", &mut output);

    assert!(matches!(result.unwrap_err(), PipelineError::InvalidParameter(_)));
    assert!(written.lock().unwrap().is_empty());
}

#[test]
fn test_incompatible_without_auto_convert() {
    let reader = MockReader {
        flat: Raster::from_u8("ignored", 16, 16, vec![200; 256]).unwrap(),
        ..MockReader::uniform()
    };
    let config = PipelineConfig::builder().auto_convert(false).build();
    let (pipeline, _) = pipeline_with(reader, config);

    let mut output = Cursor::new(Vec::new());
    let result = pipeline.process(b"sample", b"flat", &mut output);
    assert!(matches!(result.unwrap_err(), PipelineError::IncompatibleImages { .. }));
}

#[test]
fn test_incompatible_with_auto_convert() {
    let reader = MockReader {
        sample: Raster::from_u16("ignored", 32, 32, vec![3000; 1024]).unwrap(),
        flat: Raster::from_u8("ignored", 16, 16, vec![200; 256]).unwrap(),
        ..MockReader::uniform()
    };
    let (pipeline, written) = pipeline_with(reader, PipelineConfig::default());

    let mut output = Cursor::new(Vec::new());
    let report = pipeline.process(b"sample", b"flat", &mut output).unwrap();

    assert!(report.flat_converted);
    assert_eq!(report.bit_depth, BitDepth::Sixteen);
    assert_eq!((report.width, report.height), (32, 32));
    let written = written.lock().unwrap();
    assert_eq!(written[0].bit_depth(), BitDepth::Sixteen);
    assert!(written[0].float_view().iter().all(|&v| v == 0.0));
}

#[test]
fn test_pffc_stage() {
    let config = PipelineConfig::builder().pffc(true).pffc_radius(5.0).build();
    let (pipeline, written) = pipeline_with(MockReader::uniform(), config);

    let mut output = Cursor::new(Vec::new());
    let report = pipeline.process(b"sample", b"flat", &mut output).unwrap();

    assert!(report.pffc_applied);
    assert_eq!(report.title, "PFFC_Cleaned_sample");
    assert!(report.background_preview.is_none());
    let written = written.lock().unwrap();
    assert_eq!(written[0].bit_depth(), BitDepth::Eight);
    assert_eq!(written[0].title(), "PFFC_Cleaned_sample");
}

#[test]
fn test_debug_images_and_preview() {
    let config = PipelineConfig::builder().pffc(true).debug(true).build();
    let (pipeline, _) = pipeline_with(MockReader::uniform(), config);

    let mut output = Cursor::new(Vec::new());
    let report = pipeline.process(b"sample", b"flat", &mut output).unwrap();

    let labels: Vec<&str> = report.debug_images.iter().map(|d| d.label.as_str()).collect();
    assert_eq!(labels.len(), 7);
    assert_eq!(labels[0], "Debug_1.1-Inverted");
    assert_eq!(labels[6], "Cleaned_BeforePFFC_sample");

    let preview = report.background_preview.unwrap();
    assert_eq!(preview.title(), "PFFC_Blurred_Background_Cleaned_sample");
}

#[test]
fn test_timings_recorded() {
    let (pipeline, _) = pipeline_with(MockReader::uniform(), PipelineConfig::default());

    let mut output = Cursor::new(Vec::new());
    let (_, timings) = pipeline.process_with_timings(b"sample", b"flat", &mut output).unwrap();

    for step in ["decode_sample", "decode_flat", "remove_stains", "encode_tiff"] {
        assert!(timings.get_step(step).is_some(), "missing step {}", step);
    }
    assert!(timings.get_step("pseudo_flat_field").is_none());
}

#[test]
fn test_process_files_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let sample_path = dir.path().join("sample_img.tif");
    let flat_path = dir.path().join("flat_img.tif");
    let output_path = dir.path().join("cleaned.tif");

    let options = TiffWriteOptions {
        compression: TiffCompression::Lzw,
        predictor: Some(2),
    };
    let sample = Raster::from_u16("s", 24, 16, (0..24 * 16).map(|i| 1200 + (i % 24) as u16 * 10).collect()).unwrap();
    let flat = Raster::from_u16("f", 24, 16, vec![4000; 24 * 16]).unwrap();
    for (raster, path) in [(&sample, &sample_path), (&flat, &flat_path)] {
        let mut file = std::fs::File::create(path).unwrap();
        StandardTiffWriter.write_tiff(raster, &mut file, &options).unwrap();
    }

    let pipeline = StainRemovalPipeline::new(PipelineConfig::default());
    let report = pipeline.process_files(&sample_path, &flat_path, &output_path).unwrap();
    assert_eq!(report.title, "Cleaned_sample_img");

    let bytes = std::fs::read(&output_path).unwrap();
    let cleaned = TiffRasterReader.read_raster(&bytes, "cleaned").unwrap();
    assert_eq!((cleaned.width(), cleaned.height()), (24, 16));
    assert_eq!(cleaned.bit_depth(), BitDepth::Sixteen);
    assert_eq!(cleaned.value_at(0, 3), 0.0);
    assert_eq!(cleaned.value_at(23, 3), 65535.0);
}

#[test]
fn test_process_files_missing_input() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = StainRemovalPipeline::new(PipelineConfig::default());
    let result = pipeline.process_files(
        dir.path().join("missing.tif"),
        dir.path().join("also_missing.tif"),
        dir.path().join("out.tif"),
    );
    assert!(matches!(result.unwrap_err(), PipelineError::InputReadError(_)));
}
