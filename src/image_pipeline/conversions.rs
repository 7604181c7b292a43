//! Pipeline conversions module
//!
//! Orchestrates decoding a sample and a flat field, stain removal, optional
//! pseudo flat-field correction and TIFF encoding of the result.

mod config;
mod stain_removal;

#[cfg(test)]
mod tests;

pub use config::{PipelineConfig, PipelineConfigBuilder};
pub use stain_removal::{ProcessedImage, ProcessingReport, StainRemovalPipeline};
