//! Page rasters
//!
//! Pages arrive already rasterized from an external collaborator. This module
//! defines the page type, the collaborator trait, and a rasterizer for sources
//! that are plain image files.

use std::sync::Arc;

use image::RgbaImage;

/// One rasterized page. Immutable once loaded.
#[derive(Debug, Clone)]
pub struct Page {
    raster: Arc<RgbaImage>,
}

impl Page {
    pub fn new(raster: RgbaImage) -> Self {
        Self {
            raster: Arc::new(raster),
        }
    }

    pub fn raster(&self) -> &RgbaImage {
        &self.raster
    }

    pub fn width(&self) -> u32 {
        self.raster.width()
    }

    pub fn height(&self) -> u32 {
        self.raster.height()
    }
}

/// Rasterization errors
#[derive(Debug, thiserror::Error)]
pub enum RasterizeError {
    #[error("Unsupported source format: {0}")]
    UnsupportedFormat(String),

    #[error("Failed to decode source: {0}")]
    Decode(String),

    #[error("Source produced no pages")]
    Empty,
}

/// Turns a source file into ordered page rasters
pub trait PageRasterizer: Send + Sync {
    /// Rasterize `source`. An unreadable source is an error, never an empty list.
    fn rasterize(&self, source: &[u8]) -> Result<Vec<Page>, RasterizeError>;
}

/// Rasterizer for single-image sources (PNG, JPEG)
#[derive(Debug, Default, Clone, Copy)]
pub struct ImageRasterizer;

impl PageRasterizer for ImageRasterizer {
    fn rasterize(&self, source: &[u8]) -> Result<Vec<Page>, RasterizeError> {
        if source.is_empty() {
            return Err(RasterizeError::Empty);
        }

        let format = image::guess_format(source)
            .map_err(|e| RasterizeError::UnsupportedFormat(e.to_string()))?;

        let decoded = image::load_from_memory_with_format(source, format)
            .map_err(|e| RasterizeError::Decode(e.to_string()))?;

        let raster = decoded.to_rgba8();
        if raster.width() == 0 || raster.height() == 0 {
            return Err(RasterizeError::Empty);
        }

        tracing::debug!(
            width = raster.width(),
            height = raster.height(),
            format = ?format,
            "Decoded page raster"
        );
        Ok(vec![Page::new(raster)])
    }
}
