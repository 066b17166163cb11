//! Region Types
//!
//! Geometry and entity types for the regions a user carves out of a page.
//! All coordinates are percentages of the page dimensions (0-100, origin top-left).

use image::RgbaImage;
use serde::{Deserialize, Serialize};

/// Smallest box (percent of page) accepted from a manual draw
pub const MIN_DRAW_SIZE: f64 = 3.0;

/// Floor applied to width/height while resizing
pub const MIN_RESIZE_SIZE: f64 = 5.0;

/// Horizontal margin (percent) used by grid layouts
pub const GRID_MARGIN: f64 = 5.0;

/// Upper bound on grid rows
pub const MAX_GRID_ROWS: usize = 50;

pub const MIN_DISPLAY_SIZE: u8 = 25;
pub const MAX_DISPLAY_SIZE: u8 = 100;

/// A point in percentage coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Clamp both coordinates into the page
    pub fn clamped(self) -> Self {
        Self {
            x: clamp_percent(self.x),
            y: clamp_percent(self.y),
        }
    }
}

/// Axis-aligned rectangle in percentage coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoxRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoxRect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    /// The whole page
    pub fn full_page() -> Self {
        Self::new(0.0, 0.0, 100.0, 100.0)
    }

    /// Build a rectangle from two opposite corners in any order
    pub fn from_corners(a: Point, b: Point) -> Self {
        Self {
            x: a.x.min(b.x),
            y: a.y.min(b.y),
            width: (a.x - b.x).abs(),
            height: (a.y - b.y).abs(),
        }
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Flip negative extents and pull the rectangle inside the page.
    ///
    /// Non-finite values collapse to zero so the caller's size check rejects them.
    pub fn clamped(&self) -> Self {
        let a = Point::new(finite_or_zero(self.x), finite_or_zero(self.y));
        let b = Point::new(
            finite_or_zero(self.x + self.width),
            finite_or_zero(self.y + self.height),
        );
        Self::from_corners(a.clamped(), b.clamped())
    }

    /// Whether the rectangle lies within [0, 100] on both axes
    pub fn is_within_page(&self) -> bool {
        self.x >= 0.0 && self.y >= 0.0 && self.right() <= 100.0 && self.bottom() <= 100.0
    }
}

/// Region geometry: exactly one of a box or a closed polygon
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Shape {
    Box(BoxRect),
    Polygon { points: Vec<Point> },
}

impl Shape {
    /// Axis-aligned bounds of the shape, in percentage coordinates
    pub fn bounds(&self) -> BoxRect {
        match self {
            Shape::Box(rect) => *rect,
            Shape::Polygon { points } => {
                let mut min_x = f64::INFINITY;
                let mut min_y = f64::INFINITY;
                let mut max_x = f64::NEG_INFINITY;
                let mut max_y = f64::NEG_INFINITY;
                for p in points {
                    min_x = min_x.min(p.x);
                    min_y = min_y.min(p.y);
                    max_x = max_x.max(p.x);
                    max_y = max_y.max(p.y);
                }
                if points.is_empty() {
                    return BoxRect::new(0.0, 0.0, 0.0, 0.0);
                }
                BoxRect::new(min_x, min_y, max_x - min_x, max_y - min_y)
            }
        }
    }

    pub fn as_box(&self) -> Option<&BoxRect> {
        match self {
            Shape::Box(rect) => Some(rect),
            Shape::Polygon { .. } => None,
        }
    }
}

/// Signed area of a closed polygon (shoelace)
pub fn polygon_area(points: &[Point]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let mut twice = 0.0;
    for (i, a) in points.iter().enumerate() {
        let b = points[(i + 1) % points.len()];
        twice += a.x * b.y - b.x * a.y;
    }
    twice / 2.0
}

/// Corner handle used by resize
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ResizeHandle {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

impl ResizeHandle {
    pub(crate) fn moves_left(self) -> bool {
        matches!(self, Self::TopLeft | Self::BottomLeft)
    }

    pub(crate) fn moves_top(self) -> bool {
        matches!(self, Self::TopLeft | Self::TopRight)
    }
}

/// Cached raster for a region
#[derive(Debug, Clone)]
pub struct ClippedImage {
    /// Clipped pixels
    pub raster: RgbaImage,
    /// Rotation (degrees) already present in the pixels
    pub baked_rotation: f64,
}

impl ClippedImage {
    pub fn new(raster: RgbaImage, baked_rotation: f64) -> Self {
        Self {
            raster,
            baked_rotation: normalize_rotation(baked_rotation),
        }
    }
}

/// A user- or detector-defined area of a page that becomes one source
#[derive(Debug, Clone)]
pub struct Region {
    pub(crate) id: String,
    pub(crate) page_index: usize,
    pub(crate) shape: Shape,
    pub(crate) rotation: f64,
    pub(crate) name: String,
    pub(crate) reference: Option<String>,
    pub(crate) display_size: u8,
    pub(crate) recognized_text: Option<String>,
    pub(crate) clipped: Option<ClippedImage>,
    pub(crate) revision: u64,
}

impl Region {
    pub(crate) fn new(page_index: usize, shape: Shape, name: String) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            page_index,
            shape,
            rotation: 0.0,
            name,
            reference: None,
            display_size: MAX_DISPLAY_SIZE,
            recognized_text: None,
            clipped: None,
            revision: 0,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn page_index(&self) -> usize {
        self.page_index
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    /// Rotation in degrees, normalized to (-180, 180]
    pub fn rotation(&self) -> f64 {
        self.rotation
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn reference(&self) -> Option<&str> {
        self.reference.as_deref()
    }

    pub fn display_size(&self) -> u8 {
        self.display_size
    }

    /// Text recognized for this region by the detection service
    pub fn recognized_text(&self) -> Option<&str> {
        self.recognized_text.as_deref()
    }

    pub fn clipped_image(&self) -> Option<&ClippedImage> {
        self.clipped.as_ref()
    }

    /// Geometry revision, bumped on every shape or rotation change that drops the clip
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub(crate) fn invalidate_clip(&mut self) {
        self.revision += 1;
        self.clipped = None;
    }
}

/// Default label for the n-th region (1-based)
pub fn placeholder_name(position: usize) -> String {
    format!("Source {}", position)
}

/// Normalize an angle in degrees to (-180, 180]
pub fn normalize_rotation(degrees: f64) -> f64 {
    if !degrees.is_finite() {
        return 0.0;
    }
    let mut r = degrees % 360.0;
    if r <= -180.0 {
        r += 360.0;
    } else if r > 180.0 {
        r -= 360.0;
    }
    // -0.0 reads back as 0
    if r == 0.0 {
        0.0
    } else {
        r
    }
}

pub fn clamp_display_size(size: u8) -> u8 {
    size.clamp(MIN_DISPLAY_SIZE, MAX_DISPLAY_SIZE)
}

pub(crate) fn clamp_percent(value: f64) -> f64 {
    finite_or_zero(value).clamp(0.0, 100.0)
}

pub(crate) fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

/// Region errors
#[derive(Debug, thiserror::Error)]
pub enum RegionError {
    #[error("Region not found: {0}")]
    NotFound(String),

    #[error("Page {0} does not exist")]
    PageOutOfRange(usize),

    #[error("Page {0} is not loaded")]
    PageUnavailable(usize),

    #[error("Region too small: {0}")]
    TooSmall(String),

    #[error("Invalid polygon: {0}")]
    InvalidPolygon(String),

    #[error("Operation requires a box region: {0}")]
    NotABox(String),

    #[error("Invalid grid row count: {0}")]
    InvalidGrid(usize),

    #[error("Clip is stale for region {0}")]
    StaleClip(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_rotation() {
        assert_eq!(normalize_rotation(0.0), 0.0);
        assert_eq!(normalize_rotation(180.0), 180.0);
        assert_eq!(normalize_rotation(-180.0), 180.0);
        assert_eq!(normalize_rotation(270.0), -90.0);
        assert_eq!(normalize_rotation(-450.0), -90.0);
        assert_eq!(normalize_rotation(360.0), 0.0);
        assert_eq!(normalize_rotation(f64::NAN), 0.0);
    }

    #[test]
    fn test_box_clamped_flips_and_bounds() {
        let rect = BoxRect::new(90.0, 50.0, 20.0, -10.0).clamped();
        assert_eq!(rect, BoxRect::new(90.0, 40.0, 10.0, 10.0));
        assert!(rect.is_within_page());
    }

    #[test]
    fn test_polygon_bounds_and_area() {
        let points = vec![
            Point::new(10.0, 10.0),
            Point::new(30.0, 10.0),
            Point::new(30.0, 20.0),
            Point::new(10.0, 20.0),
        ];
        assert_eq!(polygon_area(&points).abs(), 200.0);
        let shape = Shape::Polygon { points };
        assert_eq!(shape.bounds(), BoxRect::new(10.0, 10.0, 20.0, 10.0));
    }

    #[test]
    fn test_shape_serde_tagging() {
        let json = serde_json::to_value(Shape::Box(BoxRect::new(1.0, 2.0, 3.0, 4.0))).unwrap();
        assert_eq!(json["type"], "box");
        assert_eq!(json["width"], 3.0);
    }

    #[test]
    fn test_display_size_clamp() {
        assert_eq!(clamp_display_size(10), 25);
        assert_eq!(clamp_display_size(60), 60);
        assert_eq!(clamp_display_size(200), 100);
    }
}
