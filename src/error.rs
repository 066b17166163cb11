//! Error types for the source sheet library

use thiserror::Error;

use crate::codec::CodecError;
use crate::page::RasterizeError;
use crate::region::RegionError;

/// Library-wide result type
pub type Result<T> = std::result::Result<T, SheetError>;

/// Session and sheet errors
#[derive(Error, Debug)]
pub enum SheetError {
    #[error("Region error: {0}")]
    Region(#[from] RegionError),

    #[error("Could not read the document: {0}")]
    Rasterize(#[from] RasterizeError),

    #[error("Image codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Invalid sheet document: {0}")]
    InvalidDocument(String),

    #[error("No raster available for region {0}")]
    MissingRaster(String),

    #[error("Failed to save sheet: {0}")]
    Persistence(String),
}
