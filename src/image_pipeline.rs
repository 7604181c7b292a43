//! Image processing pipeline module
//!
//! Stain removal against a flat-field reference and pseudo flat-field
//! correction, with separate modules for raster types, the two algorithms,
//! RAW and TIFF input/output, and the orchestration that ties them together.

pub mod common;
pub mod raster;
pub mod stains;
pub mod pffc;
pub mod raw;
pub mod tiff;
pub mod conversions;

pub use common::{
    PipelineError,
    PipelineTimings,
    Result,
};

pub use raster::{
    BinaryMask,
    BitDepth,
    PixelData,
    Raster,
    are_images_compatible,
    convert_to_match,
};

pub use stains::{
    CorrectionFactor,
    DebugImage,
    RegionMeans,
    StainParams,
    StainRemovalOutput,
    StainRemover,
    remove_stains,
};

pub use pffc::{
    PffcOutput,
    PffcParams,
    PseudoFlatFieldCorrector,
    pseudo_flat_field_correct,
};

pub use raw::{
    RasterReader,
    RawLoaderReader,
};

pub use tiff::{
    StandardTiffWriter,
    TiffCompression,
    TiffRasterReader,
    TiffWriteOptions,
    TiffWriter,
};

pub use conversions::{
    PipelineConfig,
    PipelineConfigBuilder,
    ProcessedImage,
    ProcessingReport,
    StainRemovalPipeline,
};
