//! Region Module
//!
//! The region model the editor mutates: boxes and polygons on a page, plus the
//! store that applies drag, resize, rotate, split and grid operations.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use source_sheet::region::{BoxRect, RegionStore, ResizeHandle};
//!
//! let mut store = RegionStore::new(page_count);
//! let id = store.add_box(0, BoxRect::new(5.0, 10.0, 45.0, 20.0))?;
//! store.resize(&id, ResizeHandle::BottomRight, 5.0, 0.0)?;
//! let (upper, lower) = store.split(&id)?;
//! ```

mod store;
mod types;

pub use store::RegionStore;
pub use types::{
    clamp_display_size, normalize_rotation, placeholder_name, polygon_area, BoxRect, ClippedImage,
    Point, Region, RegionError, ResizeHandle, Shape, GRID_MARGIN, MAX_DISPLAY_SIZE, MAX_GRID_ROWS,
    MIN_DISPLAY_SIZE, MIN_DRAW_SIZE, MIN_RESIZE_SIZE,
};
