use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};

use stainclean_rs::image_pipeline::{
    PipelineConfig, ProcessingReport, RasterReader, RawLoaderReader, Raster, StainRemovalPipeline,
    StandardTiffWriter, TiffCompression, TiffWriter,
};
use stainclean_rs::logger::{self, error, info};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum InputFormat {
    /// Grayscale TIFF (8-bit, 16-bit or 32-bit float)
    Tiff,
    /// Camera RAW, read as the 16-bit sensor mosaic
    Raw,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Compression {
    None,
    Lzw,
    DeflateFast,
    DeflateBalanced,
    DeflateBest,
}

impl From<Compression> for TiffCompression {
    fn from(c: Compression) -> Self {
        match c {
            Compression::None => TiffCompression::None,
            Compression::Lzw => TiffCompression::Lzw,
            Compression::DeflateFast => TiffCompression::DeflateFast,
            Compression::DeflateBalanced => TiffCompression::DeflateBalanced,
            Compression::DeflateBest => TiffCompression::DeflateBest,
        }
    }
}

/// Remove optical-path stains from an image using a flat-field reference.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Image to clean
    sample: PathBuf,
    /// Flat-field reference taken through the same optics
    flat: PathBuf,
    /// Output TIFF path
    output: PathBuf,

    /// Ring width control within [0, 1]
    #[arg(long, default_value_t = 0.1)]
    expand_ratio: f64,

    /// Share of distinct stain sizes kept, 0-100
    #[arg(long, default_value_t = 80)]
    percentile: u8,

    /// Apply pseudo flat-field correction to the cleaned image
    #[arg(long)]
    pffc: bool,

    /// Gaussian radius of the pseudo flat field
    #[arg(long, default_value_t = 50.0)]
    pffc_radius: f64,

    /// Write the blurred PFFC background next to the output
    #[arg(long)]
    show_background: bool,

    /// Fail instead of converting a flat field that does not match the sample
    #[arg(long)]
    no_auto_convert: bool,

    /// Collect intermediate images
    #[arg(long)]
    debug: bool,

    /// Directory for intermediate images; defaults to the output's directory
    #[arg(long)]
    debug_dir: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = Compression::None)]
    compression: Compression,

    /// Horizontal differencing predictor for integer output
    #[arg(long)]
    predictor: bool,

    #[arg(long, value_enum, default_value_t = InputFormat::Tiff)]
    input_format: InputFormat,

    /// Log per-stage durations
    #[arg(long)]
    timings: bool,
}

impl Args {
    fn config(&self) -> PipelineConfig {
        PipelineConfig::builder()
            .expand_ratio(self.expand_ratio)
            .percentile(self.percentile)
            .pffc(self.pffc)
            .pffc_radius(self.pffc_radius)
            .hide_background(!self.show_background)
            .auto_convert(!self.no_auto_convert)
            .debug(self.debug)
            .compression(self.compression.into())
            .predictor(self.predictor.then_some(2))
            .build()
    }
}

fn main() {
    logger::init();

    let args = Args::parse();
    if let Err(e) = run(&args) {
        error!("Stain removal failed: {:#}", e);
        std::process::exit(1);
    }
}

fn run(args: &Args) -> Result<()> {
    info!("Starting stainclean...");
    let config = args.config();
    info!(
        "Expand ratio {}, percentile {}, PFFC {}",
        config.expand_ratio,
        config.percentile,
        if config.pffc { "enabled" } else { "disabled" }
    );

    let report = match args.input_format {
        InputFormat::Tiff => process(&StainRemovalPipeline::new(config), args)?,
        InputFormat::Raw => process(
            &StainRemovalPipeline::with_custom(RawLoaderReader, StandardTiffWriter, config),
            args,
        )?,
    };

    info!(
        "Correction factor {:.6}{}",
        report.correction_factor.value,
        if report.correction_factor.degenerate { " (fallback)" } else { "" }
    );
    info!("Wrote {} to {}", report.title, args.output.display());
    Ok(())
}

fn process<R: RasterReader, W: TiffWriter>(
    pipeline: &StainRemovalPipeline<R, W>,
    args: &Args,
) -> Result<ProcessingReport> {
    let (report, timings) = pipeline
        .process_files_with_timings(&args.sample, &args.flat, &args.output)
        .with_context(|| format!("processing {}", args.sample.display()))?;

    if args.timings {
        timings.log_summary();
    }

    let side_dir = args
        .output
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();

    if let Some(preview) = &report.background_preview {
        write_raster(preview, &side_dir)?;
    }

    if !report.debug_images.is_empty() {
        let debug_dir = args.debug_dir.clone().unwrap_or(side_dir);
        std::fs::create_dir_all(&debug_dir)
            .with_context(|| format!("creating {}", debug_dir.display()))?;
        for image in &report.debug_images {
            write_raster(&image.raster, &debug_dir)?;
        }
        info!("Wrote {} debug images to {}", report.debug_images.len(), debug_dir.display());
    }

    Ok(report)
}

fn write_raster(raster: &Raster, dir: &Path) -> Result<()> {
    let path = dir.join(format!("{}.tif", raster.title()));
    let mut file = File::create(&path).with_context(|| format!("creating {}", path.display()))?;
    StandardTiffWriter
        .write_tiff(raster, &mut file, &Default::default())
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}
