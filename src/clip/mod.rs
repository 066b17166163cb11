//! Clip Module
//!
//! Geometric clipping engine: extracts a rotation-correct raster for a box or
//! polygon region, and bakes rotation into rasters that were clipped earlier.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use source_sheet::clip::{bake_rotation, clip};
//!
//! let raster = clip(&page, region.shape(), region.rotation());
//! let upright = bake_rotation(&saved_raster, 90.0);
//! ```

mod engine;
mod transform;

pub use engine::{bake_rotation, clip, clip_region, pixel_rect, rotated_bounds, PixelRect};
pub use transform::Affine;
