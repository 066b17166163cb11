//! Sheet Composer
//!
//! Serializes the region store into a sheet document at save time and renders
//! the optional composite preview.

use image::{imageops, Rgba, RgbaImage};
use imageproc::drawing::draw_filled_rect_mut;
use imageproc::rect::Rect;

use crate::clip::{bake_rotation, clip_region};
use crate::codec::to_data_url;
use crate::error::{Result, SheetError};
use crate::page::Page;
use crate::region::{normalize_rotation, Region, RegionStore, MAX_DISPLAY_SIZE};

use super::document::{SheetDocument, SheetEntry};

const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);
const BADGE_BACKGROUND: Rgba<u8> = Rgba([33, 37, 41, 255]);

/// 3x5 bitmaps for the digits 0-9, one row per byte, high bit on the left
const DIGIT_GLYPHS: [[u8; 5]; 10] = [
    [0b111, 0b101, 0b101, 0b101, 0b111],
    [0b010, 0b110, 0b010, 0b010, 0b111],
    [0b111, 0b001, 0b111, 0b100, 0b111],
    [0b111, 0b001, 0b111, 0b001, 0b111],
    [0b101, 0b101, 0b111, 0b001, 0b001],
    [0b111, 0b100, 0b111, 0b001, 0b111],
    [0b111, 0b100, 0b111, 0b101, 0b111],
    [0b111, 0b001, 0b001, 0b001, 0b001],
    [0b111, 0b101, 0b111, 0b101, 0b111],
    [0b111, 0b101, 0b111, 0b001, 0b111],
];

/// Composer settings
#[derive(Debug, Clone)]
pub struct SheetComposer {
    /// Preview width of a region at display size 100
    pub preview_width: u32,
    /// Vertical gap and outer margin of the preview
    pub preview_gap: u32,
    /// Pixel size of one glyph cell in the number badges
    pub badge_scale: u32,
}

impl Default for SheetComposer {
    fn default() -> Self {
        Self {
            preview_width: 800,
            preview_gap: 24,
            badge_scale: 4,
        }
    }
}

impl SheetComposer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the persisted document, one entry per region in store order
    pub fn compose(&self, store: &RegionStore, pages: &[Page]) -> Result<SheetDocument> {
        let mut entries = Vec::with_capacity(store.len());
        for region in store.regions() {
            let raster = final_raster(region, pages)?;
            entries.push(SheetEntry {
                id: region.id().to_string(),
                name: region.name().to_string(),
                image: to_data_url(&raster)?,
                rotation: 0.0,
                reference: region.reference().map(str::to_string),
                display_size: region.display_size(),
            });
        }
        Ok(SheetDocument { entries })
    }

    /// Render all regions stacked top to bottom with numbered badges.
    ///
    /// Returns `None` for an empty store.
    pub fn render_preview(&self, store: &RegionStore, pages: &[Page]) -> Result<Option<RgbaImage>> {
        if store.is_empty() {
            return Ok(None);
        }

        let mut tiles = Vec::with_capacity(store.len());
        for region in store.regions() {
            let raster = final_raster(region, pages)?;
            tiles.push(self.scale_tile(&raster, region.display_size()));
        }

        let gap = self.preview_gap;
        let height = tiles.iter().map(|t| t.height() + gap).sum::<u32>() + gap;
        let width = self.preview_width + 2 * gap;
        let mut canvas = RgbaImage::from_pixel(width, height, WHITE);

        let mut y = gap;
        for (index, tile) in tiles.iter().enumerate() {
            let x = gap + self.preview_width.saturating_sub(tile.width()) / 2;
            imageops::overlay(&mut canvas, tile, x as i64, y as i64);
            self.draw_badge(&mut canvas, index + 1, x, y);
            y += tile.height() + gap;
        }
        Ok(Some(canvas))
    }

    fn scale_tile(&self, raster: &RgbaImage, display_size: u8) -> RgbaImage {
        let target_w = (self.preview_width as f64 * display_size as f64 / MAX_DISPLAY_SIZE as f64)
            .round()
            .max(1.0) as u32;
        let (w, h) = raster.dimensions();
        let target_h = ((h as f64 * target_w as f64 / w.max(1) as f64).round() as u32).max(1);
        imageops::resize(raster, target_w, target_h, imageops::FilterType::Triangle)
    }

    fn draw_badge(&self, canvas: &mut RgbaImage, number: usize, x: u32, y: u32) {
        let scale = self.badge_scale.max(1);
        let digits: Vec<usize> = number
            .to_string()
            .bytes()
            .map(|b| (b - b'0') as usize)
            .collect();
        let pad = scale * 2;
        let glyph_w = 3 * scale;
        let badge_w = pad * 2 + digits.len() as u32 * glyph_w + (digits.len() as u32 - 1) * scale;
        let badge_h = pad * 2 + 5 * scale;

        draw_filled_rect_mut(
            canvas,
            Rect::at(x as i32, y as i32).of_size(badge_w, badge_h),
            BADGE_BACKGROUND,
        );

        for (i, digit) in digits.iter().enumerate() {
            let origin_x = x + pad + i as u32 * (glyph_w + scale);
            for (row, bits) in DIGIT_GLYPHS[*digit].iter().enumerate() {
                for col in 0..3u32 {
                    if bits & (0b100 >> col) == 0 {
                        continue;
                    }
                    let cell = Rect::at(
                        (origin_x + col * scale) as i32,
                        (y + pad + row as u32 * scale) as i32,
                    )
                    .of_size(scale, scale);
                    draw_filled_rect_mut(canvas, cell, WHITE);
                }
            }
        }
    }
}

/// The raster a region is saved with: rotation fully baked in
pub(crate) fn final_raster(region: &Region, pages: &[Page]) -> Result<RgbaImage> {
    if let Some(cached) = region.clipped_image() {
        let remaining = normalize_rotation(region.rotation() - cached.baked_rotation);
        return Ok(bake_rotation(&cached.raster, remaining));
    }
    clip_region(pages, region).ok_or_else(|| SheetError::MissingRaster(region.id().to_string()))
}
