//! Clipping engine
//!
//! Pure functions turning a page raster and a region's geometry into a
//! standalone, rotation-corrected raster.
//!
//! Rotation is always applied the same way: the unrotated shape is cut out
//! first, then the cut-out is rotated by [`bake_rotation`]. Clipping a live page
//! and baking a previously clipped image therefore agree pixel for pixel.

use image::{imageops, GrayImage, Luma, Rgba, RgbaImage};
use imageproc::drawing::draw_polygon_mut;
use imageproc::point::Point as PixelPoint;

use crate::page::Page;
use crate::region::{normalize_rotation, BoxRect, Point, Region, Shape};

use super::transform::Affine;

const TRANSPARENT: Rgba<u8> = Rgba([0, 0, 0, 0]);

/// Tolerance (degrees) for treating an angle as a quarter turn
const QUARTER_TURN_EPSILON: f64 = 1e-9;

/// Pixel-space rectangle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Map a percentage rectangle onto a `page_width` x `page_height` raster.
/// Returns `None` when nothing of the rectangle survives.
pub fn pixel_rect(rect: &BoxRect, page_width: u32, page_height: u32) -> Option<PixelRect> {
    let (x0, x1) = pixel_span(rect.x, rect.right(), page_width);
    let (y0, y1) = pixel_span(rect.y, rect.bottom(), page_height);
    if x1 <= x0 || y1 <= y0 {
        return None;
    }
    Some(PixelRect {
        x: x0,
        y: y0,
        width: x1 - x0,
        height: y1 - y0,
    })
}

fn pixel_span(start_pct: f64, end_pct: f64, extent: u32) -> (u32, u32) {
    let to_px = |pct: f64| -> u32 {
        let px = (pct / 100.0 * extent as f64).round();
        if px.is_finite() {
            px.clamp(0.0, extent as f64) as u32
        } else {
            0
        }
    };
    (to_px(start_pct), to_px(end_pct))
}

/// Size of the axis-aligned canvas that fully contains a `width` x `height`
/// raster rotated by `degrees`.
pub fn rotated_bounds(width: u32, height: u32, degrees: f64) -> (u32, u32) {
    match quarter_turns(degrees) {
        Some(0) | Some(2) => (width, height),
        Some(_) => (height, width),
        None => {
            let (sin, cos) = degrees.to_radians().sin_cos();
            let (w, h) = (width as f64, height as f64);
            let new_w = w * cos.abs() + h * sin.abs();
            let new_h = w * sin.abs() + h * cos.abs();
            (
                new_w.round().max(1.0) as u32,
                new_h.round().max(1.0) as u32,
            )
        }
    }
}

/// Number of clockwise quarter turns (0-3) when `degrees` is a multiple of 90
fn quarter_turns(degrees: f64) -> Option<u8> {
    let normalized = normalize_rotation(degrees);
    let turns = (normalized / 90.0).round();
    if (normalized - turns * 90.0).abs() < QUARTER_TURN_EPSILON {
        Some(turns.rem_euclid(4.0) as u8)
    } else {
        None
    }
}

/// Clip a shape out of a page and apply `rotation` (degrees, about the shape's center).
///
/// Returns `None` when the shape is degenerate at the page's resolution.
pub fn clip(page: &Page, shape: &Shape, rotation: f64) -> Option<RgbaImage> {
    let unrotated = match shape {
        Shape::Box(rect) => clip_box(page, rect)?,
        Shape::Polygon { points } => clip_polygon(page, points)?,
    };
    Some(bake_rotation(&unrotated, rotation))
}

/// Clip a region from the document's pages; `None` when its page is not loaded.
pub fn clip_region(pages: &[Page], region: &Region) -> Option<RgbaImage> {
    let page = pages.get(region.page_index())?;
    clip(page, region.shape(), region.rotation())
}

fn clip_box(page: &Page, rect: &BoxRect) -> Option<RgbaImage> {
    let px = pixel_rect(rect, page.width(), page.height())?;
    Some(imageops::crop_imm(page.raster(), px.x, px.y, px.width, px.height).to_image())
}

fn clip_polygon(page: &Page, points: &[Point]) -> Option<RgbaImage> {
    if points.len() < 3 {
        return None;
    }
    let (page_w, page_h) = (page.width() as f64, page.height() as f64);
    let pixel_points: Vec<(f64, f64)> = points
        .iter()
        .map(|p| (p.x / 100.0 * page_w, p.y / 100.0 * page_h))
        .collect();

    let bounds = Shape::Polygon {
        points: points.to_vec(),
    }
    .bounds();
    let px = pixel_rect(&bounds, page.width(), page.height())?;

    // Polygon in canvas-local coordinates
    let mut local: Vec<PixelPoint<i32>> = pixel_points
        .iter()
        .map(|(x, y)| {
            PixelPoint::new(
                (x - px.x as f64).round() as i32,
                (y - px.y as f64).round() as i32,
            )
        })
        .collect();
    local.dedup();
    if local.len() > 1 && local.first() == local.last() {
        local.pop();
    }
    if local.len() < 3 {
        return None;
    }

    let mut mask = GrayImage::new(px.width, px.height);
    draw_polygon_mut(&mut mask, &local, Luma([255u8]));

    let mut out = imageops::crop_imm(page.raster(), px.x, px.y, px.width, px.height).to_image();
    for (x, y, pixel) in out.enumerate_pixels_mut() {
        if mask.get_pixel(x, y)[0] == 0 {
            *pixel = TRANSPARENT;
        }
    }
    Some(out)
}

/// Rotate an already-clipped raster by `rotation` degrees onto a canvas sized
/// to contain it. Quarter turns are lossless; other angles are resampled
/// bilinearly onto a transparent background.
pub fn bake_rotation(image: &RgbaImage, rotation: f64) -> RgbaImage {
    match quarter_turns(rotation) {
        Some(0) => image.clone(),
        Some(1) => imageops::rotate90(image),
        Some(2) => imageops::rotate180(image),
        Some(_) => imageops::rotate270(image),
        None => rotate_resampled(image, normalize_rotation(rotation)),
    }
}

fn rotate_resampled(image: &RgbaImage, degrees: f64) -> RgbaImage {
    let (w, h) = image.dimensions();
    let (new_w, new_h) = rotated_bounds(w, h, degrees);
    let forward = Affine::center_rotation(w as f64, h as f64, new_w as f64, new_h as f64, degrees);
    let Some(inverse) = forward.inverse() else {
        return image.clone();
    };

    RgbaImage::from_fn(new_w, new_h, |ox, oy| {
        let (sx, sy) = inverse.apply(ox as f64 + 0.5, oy as f64 + 0.5);
        sample_bilinear(image, sx - 0.5, sy - 0.5)
    })
}

/// Bilinear sample with premultiplied alpha; outside the raster is transparent
fn sample_bilinear(image: &RgbaImage, x: f64, y: f64) -> Rgba<u8> {
    let (w, h) = (image.width() as i64, image.height() as i64);
    if x <= -1.0 || y <= -1.0 || x >= w as f64 || y >= h as f64 {
        return TRANSPARENT;
    }

    let x0 = x.floor() as i64;
    let y0 = y.floor() as i64;
    let fx = x - x0 as f64;
    let fy = y - y0 as f64;

    let mut acc = [0.0f64; 4];
    for (dx, dy, weight) in [
        (0, 0, (1.0 - fx) * (1.0 - fy)),
        (1, 0, fx * (1.0 - fy)),
        (0, 1, (1.0 - fx) * fy),
        (1, 1, fx * fy),
    ] {
        let (px, py) = (x0 + dx, y0 + dy);
        if weight == 0.0 || px < 0 || py < 0 || px >= w || py >= h {
            continue;
        }
        let Rgba([r, g, b, a]) = *image.get_pixel(px as u32, py as u32);
        let alpha = a as f64 / 255.0 * weight;
        acc[0] += r as f64 * alpha;
        acc[1] += g as f64 * alpha;
        acc[2] += b as f64 * alpha;
        acc[3] += alpha;
    }

    if acc[3] <= f64::EPSILON {
        return TRANSPARENT;
    }
    let channel = |v: f64| (v / acc[3]).round().clamp(0.0, 255.0) as u8;
    Rgba([
        channel(acc[0]),
        channel(acc[1]),
        channel(acc[2]),
        (acc[3] * 255.0).round().clamp(0.0, 255.0) as u8,
    ])
}
