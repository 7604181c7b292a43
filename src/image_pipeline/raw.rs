//! RAW image reading module
//!
//! Defines the reader abstraction the pipeline decodes its inputs through and
//! a camera RAW implementation of it.

mod reader;
mod rawloader_reader;

pub use reader::RasterReader;
pub use rawloader_reader::RawLoaderReader;
