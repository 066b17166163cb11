//! Region Store
//!
//! In-memory collection of regions for the active document. Every editing
//! operation is synchronous and applied completely before returning.

use crate::detect::Proposal;

use super::types::{
    clamp_display_size, finite_or_zero, normalize_rotation, placeholder_name, polygon_area, BoxRect, ClippedImage,
    Point, Region, RegionError, ResizeHandle, Shape, GRID_MARGIN, MAX_GRID_ROWS, MIN_DRAW_SIZE,
    MIN_RESIZE_SIZE,
};

/// Ordered region collection for one document
#[derive(Debug, Default)]
pub struct RegionStore {
    regions: Vec<Region>,
    /// Number of pages whose rasters are loaded (pages 0..page_count)
    page_count: usize,
}

impl RegionStore {
    /// Create an empty store for a document with `page_count` loaded pages
    pub fn new(page_count: usize) -> Self {
        Self {
            regions: Vec::new(),
            page_count,
        }
    }

    /// Create a store whose regions have no live page behind them
    pub(crate) fn detached(regions: Vec<Region>) -> Self {
        Self {
            regions,
            page_count: 0,
        }
    }

    pub fn page_count(&self) -> usize {
        self.page_count
    }

    /// Whether the raster for `page_index` is available for re-clipping
    pub fn has_live_page(&self, page_index: usize) -> bool {
        page_index < self.page_count
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    /// Regions in sheet order
    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    pub fn get(&self, id: &str) -> Option<&Region> {
        self.regions.iter().find(|r| r.id == id)
    }

    pub fn regions_on_page(&self, page_index: usize) -> impl Iterator<Item = &Region> {
        self.regions.iter().filter(move |r| r.page_index == page_index)
    }

    // ========================================================================
    // Creation
    // ========================================================================

    /// Add a manually drawn box. Tiny boxes (accidental clicks) are rejected.
    pub fn add_box(&mut self, page_index: usize, rect: BoxRect) -> Result<String, RegionError> {
        self.check_page(page_index)?;

        let rect = rect.clamped();
        if rect.width <= MIN_DRAW_SIZE || rect.height <= MIN_DRAW_SIZE {
            return Err(RegionError::TooSmall(format!(
                "{:.1}x{:.1} is below the {}% minimum",
                rect.width, rect.height, MIN_DRAW_SIZE
            )));
        }

        Ok(self.push(page_index, Shape::Box(rect)))
    }

    /// Add a closed polygon (at least three points, non-zero area)
    pub fn add_polygon(
        &mut self,
        page_index: usize,
        points: Vec<Point>,
    ) -> Result<String, RegionError> {
        self.check_page(page_index)?;

        let mut points: Vec<Point> = points.into_iter().map(Point::clamped).collect();
        // An explicitly closed path repeats its first point
        if points.len() > 1 && points.first() == points.last() {
            points.pop();
        }
        points.dedup();

        if points.len() < 3 {
            return Err(RegionError::InvalidPolygon(format!(
                "{} distinct points, need at least 3",
                points.len()
            )));
        }
        if polygon_area(&points).abs() < f64::EPSILON {
            return Err(RegionError::InvalidPolygon("zero area".to_string()));
        }

        Ok(self.push(page_index, Shape::Polygon { points }))
    }

    /// Insert detector proposals for a page, in the order received
    pub fn seed_detected(&mut self, page_index: usize, proposals: &[Proposal]) -> Vec<String> {
        if !self.has_live_page(page_index) {
            tracing::warn!(page = page_index, "Ignoring proposals for a page that is not loaded");
            return Vec::new();
        }

        let insert_at = self.page_insert_index(page_index);
        let mut ids = Vec::with_capacity(proposals.len());
        for proposal in proposals {
            let rect = proposal.rect.clamped();
            if rect.width <= 0.0 || rect.height <= 0.0 {
                tracing::debug!(page = page_index, "Skipping degenerate proposal");
                continue;
            }
            let at = insert_at + ids.len();
            let mut region = Region::new(page_index, Shape::Box(rect), placeholder_name(at + 1));
            region.reference = proposal.reference.clone();
            region.recognized_text = proposal.text.clone();
            ids.push(region.id.clone());
            self.regions.insert(at, region);
        }
        ids
    }

    // ========================================================================
    // Geometry edits
    // ========================================================================

    /// Translate a box, keeping it on the page
    pub fn drag(&mut self, id: &str, dx: f64, dy: f64) -> Result<(), RegionError> {
        let region = self.editable_box(id)?;
        let Shape::Box(rect) = &mut region.shape else {
            return Err(RegionError::NotABox(id.to_string()));
        };

        rect.x = (rect.x + finite_or_zero(dx)).clamp(0.0, (100.0 - rect.width).max(0.0));
        rect.y = (rect.y + finite_or_zero(dy)).clamp(0.0, (100.0 - rect.height).max(0.0));
        region.invalidate_clip();
        Ok(())
    }

    /// Move the two edges adjacent to `handle`, enforcing the minimum size
    pub fn resize(
        &mut self,
        id: &str,
        handle: ResizeHandle,
        dx: f64,
        dy: f64,
    ) -> Result<(), RegionError> {
        let region = self.editable_box(id)?;
        let Shape::Box(rect) = &mut region.shape else {
            return Err(RegionError::NotABox(id.to_string()));
        };
        let (dx, dy) = (finite_or_zero(dx), finite_or_zero(dy));

        let (left, right) = if handle.moves_left() {
            resolve_low_edge(rect.x + dx, rect.right())
        } else {
            resolve_high_edge(rect.x, rect.right() + dx)
        };
        let (top, bottom) = if handle.moves_top() {
            resolve_low_edge(rect.y + dy, rect.bottom())
        } else {
            resolve_high_edge(rect.y, rect.bottom() + dy)
        };

        *rect = BoxRect::new(left, top, right - left, bottom - top);
        region.invalidate_clip();
        Ok(())
    }

    /// Set the rotation. The clip is only dropped when the page can re-derive it;
    /// otherwise the existing clip is kept and the rotation is applied at bake-in.
    pub fn rotate(&mut self, id: &str, degrees: f64) -> Result<(), RegionError> {
        let live = {
            let region = self.find(id)?;
            self.has_live_page(region.page_index)
        };
        let region = self.find_mut(id)?;
        region.rotation = normalize_rotation(degrees);
        if live {
            region.invalidate_clip();
        } else {
            tracing::debug!(region_id = %id, "Page not loaded, deferring rotation to bake-in");
        }
        Ok(())
    }

    /// Halve a box along its height. Both halves inherit the rotation and
    /// take the original's list position.
    pub fn split(&mut self, id: &str) -> Result<(String, String), RegionError> {
        let index = self.index_of(id)?;
        let live = self.has_live_page(self.regions[index].page_index);
        let original = &self.regions[index];
        if !live {
            return Err(RegionError::PageUnavailable(original.page_index));
        }
        let Shape::Box(rect) = original.shape else {
            return Err(RegionError::NotABox(id.to_string()));
        };

        let mid = rect.y + rect.height / 2.0;
        let end = rect.bottom();
        let upper_rect = BoxRect::new(rect.x, rect.y, rect.width, mid - rect.y);
        let lower_rect = BoxRect::new(rect.x, mid, rect.width, end - mid);

        let mut upper = Region::new(original.page_index, Shape::Box(upper_rect), original.name.clone());
        upper.rotation = original.rotation;
        upper.reference = original.reference.clone();
        upper.display_size = original.display_size;
        upper.recognized_text = original.recognized_text.clone();

        let mut lower = Region::new(
            original.page_index,
            Shape::Box(lower_rect),
            placeholder_name(index + 2),
        );
        lower.rotation = original.rotation;
        lower.display_size = original.display_size;

        let ids = (upper.id.clone(), lower.id.clone());
        self.regions[index] = lower;
        self.regions.insert(index, upper);
        Ok(ids)
    }

    // ========================================================================
    // Removal and layout
    // ========================================================================

    pub fn delete(&mut self, id: &str) -> Result<Region, RegionError> {
        let index = self.index_of(id)?;
        Ok(self.regions.remove(index))
    }

    /// Remove every region on a page, returning how many were removed
    pub fn clear_page(&mut self, page_index: usize) -> usize {
        let before = self.regions.len();
        self.regions.retain(|r| r.page_index != page_index);
        before - self.regions.len()
    }

    /// Replace the page's regions with `rows` equal-height boxes
    pub fn apply_grid(&mut self, page_index: usize, rows: usize) -> Result<Vec<String>, RegionError> {
        self.check_page(page_index)?;
        if rows == 0 || rows > MAX_GRID_ROWS {
            return Err(RegionError::InvalidGrid(rows));
        }

        self.clear_page(page_index);
        let insert_at = self.page_insert_index(page_index);

        let row_height = 100.0 / rows as f64;
        let mut ids = Vec::with_capacity(rows);
        for row in 0..rows {
            let y = row as f64 * row_height;
            let height = if row + 1 == rows { 100.0 - y } else { row_height };
            let rect = BoxRect::new(GRID_MARGIN, y, 100.0 - 2.0 * GRID_MARGIN, height);
            let region = Region::new(
                page_index,
                Shape::Box(rect),
                placeholder_name(insert_at + row + 1),
            );
            ids.push(region.id.clone());
            self.regions.insert(insert_at + row, region);
        }
        Ok(ids)
    }

    /// Move a region to a new position in sheet order
    pub fn move_to(&mut self, id: &str, new_index: usize) -> Result<(), RegionError> {
        let index = self.index_of(id)?;
        let region = self.regions.remove(index);
        let new_index = new_index.min(self.regions.len());
        self.regions.insert(new_index, region);
        Ok(())
    }

    // ========================================================================
    // Metadata
    // ========================================================================

    pub fn rename(&mut self, id: &str, name: impl Into<String>) -> Result<(), RegionError> {
        self.find_mut(id)?.name = name.into();
        Ok(())
    }

    pub fn set_reference(&mut self, id: &str, reference: Option<String>) -> Result<(), RegionError> {
        self.find_mut(id)?.reference = reference.filter(|r| !r.trim().is_empty());
        Ok(())
    }

    pub fn set_display_size(&mut self, id: &str, size: u8) -> Result<(), RegionError> {
        self.find_mut(id)?.display_size = clamp_display_size(size);
        Ok(())
    }

    /// Install a clip computed for `revision`. Clips computed against an older
    /// geometry are refused.
    pub fn store_clip(
        &mut self,
        id: &str,
        revision: u64,
        clip: ClippedImage,
    ) -> Result<(), RegionError> {
        let region = self.find_mut(id)?;
        if region.revision != revision {
            return Err(RegionError::StaleClip(id.to_string()));
        }
        region.clipped = Some(clip);
        Ok(())
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn push(&mut self, page_index: usize, shape: Shape) -> String {
        let region = Region::new(page_index, shape, placeholder_name(self.regions.len() + 1));
        let id = region.id.clone();
        self.regions.push(region);
        id
    }

    fn check_page(&self, page_index: usize) -> Result<(), RegionError> {
        if self.has_live_page(page_index) {
            Ok(())
        } else {
            Err(RegionError::PageOutOfRange(page_index))
        }
    }

    /// Index just past the last region belonging to this page or an earlier one
    fn page_insert_index(&self, page_index: usize) -> usize {
        self.regions
            .iter()
            .rposition(|r| r.page_index <= page_index)
            .map(|i| i + 1)
            .unwrap_or(0)
    }

    fn index_of(&self, id: &str) -> Result<usize, RegionError> {
        self.regions
            .iter()
            .position(|r| r.id == id)
            .ok_or_else(|| RegionError::NotFound(id.to_string()))
    }

    fn find(&self, id: &str) -> Result<&Region, RegionError> {
        self.get(id).ok_or_else(|| RegionError::NotFound(id.to_string()))
    }

    fn find_mut(&mut self, id: &str) -> Result<&mut Region, RegionError> {
        self.regions
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| RegionError::NotFound(id.to_string()))
    }

    /// A box region whose page is live; detached clips are authoritative and
    /// cannot be re-derived after a geometry edit.
    fn editable_box(&mut self, id: &str) -> Result<&mut Region, RegionError> {
        let page_count = self.page_count;
        let region = self.find_mut(id)?;
        if region.page_index >= page_count {
            return Err(RegionError::PageUnavailable(region.page_index));
        }
        if region.shape.as_box().is_none() {
            return Err(RegionError::NotABox(id.to_string()));
        }
        Ok(region)
    }
}

/// Resolve a span whose low edge moved
fn resolve_low_edge(moving: f64, fixed: f64) -> (f64, f64) {
    let low = moving.min(fixed - MIN_RESIZE_SIZE).max(0.0);
    let high = fixed.max(low + MIN_RESIZE_SIZE).min(100.0);
    (low, high)
}

/// Resolve a span whose high edge moved
fn resolve_high_edge(fixed: f64, moving: f64) -> (f64, f64) {
    let high = moving.max(fixed + MIN_RESIZE_SIZE).min(100.0);
    let low = fixed.min(high - MIN_RESIZE_SIZE).max(0.0);
    (low, high)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbaImage;

    fn store_with_box(rect: BoxRect) -> (RegionStore, String) {
        let mut store = RegionStore::new(2);
        let id = store.add_box(0, rect).unwrap();
        (store, id)
    }

    fn rect_of(store: &RegionStore, id: &str) -> BoxRect {
        *store.get(id).unwrap().shape().as_box().unwrap()
    }

    fn give_clip(store: &mut RegionStore, id: &str) {
        let revision = store.get(id).unwrap().revision();
        store
            .store_clip(id, revision, ClippedImage::new(RgbaImage::new(4, 4), 0.0))
            .unwrap();
        assert!(store.get(id).unwrap().clipped_image().is_some());
    }

    #[test]
    fn test_add_box_rejects_accidental_click() {
        let mut store = RegionStore::new(1);
        let result = store.add_box(0, BoxRect::new(10.0, 10.0, 2.0, 40.0));
        assert!(matches!(result, Err(RegionError::TooSmall(_))));
        assert!(store.is_empty());
    }

    #[test]
    fn test_add_box_checks_page() {
        let mut store = RegionStore::new(1);
        let result = store.add_box(3, BoxRect::new(10.0, 10.0, 20.0, 20.0));
        assert!(matches!(result, Err(RegionError::PageOutOfRange(3))));
    }

    #[test]
    fn test_add_box_assigns_placeholder_names() {
        let mut store = RegionStore::new(1);
        let a = store.add_box(0, BoxRect::new(0.0, 0.0, 20.0, 20.0)).unwrap();
        let b = store.add_box(0, BoxRect::new(0.0, 30.0, 20.0, 20.0)).unwrap();
        assert_ne!(a, b);
        assert_eq!(store.get(&a).unwrap().name(), "Source 1");
        assert_eq!(store.get(&b).unwrap().name(), "Source 2");
        assert!(store.get(&a).unwrap().clipped_image().is_none());
    }

    #[test]
    fn test_add_polygon_validation() {
        let mut store = RegionStore::new(1);
        let two = vec![Point::new(0.0, 0.0), Point::new(10.0, 10.0)];
        assert!(matches!(store.add_polygon(0, two), Err(RegionError::InvalidPolygon(_))));

        let collinear = vec![
            Point::new(0.0, 0.0),
            Point::new(10.0, 10.0),
            Point::new(20.0, 20.0),
        ];
        assert!(store.add_polygon(0, collinear).is_err());

        let closed = vec![
            Point::new(10.0, 10.0),
            Point::new(40.0, 10.0),
            Point::new(25.0, 40.0),
            Point::new(10.0, 10.0),
        ];
        let id = store.add_polygon(0, closed).unwrap();
        match store.get(&id).unwrap().shape() {
            Shape::Polygon { points } => assert_eq!(points.len(), 3),
            other => panic!("unexpected shape {:?}", other),
        }
    }

    #[test]
    fn test_drag_stays_on_page() {
        let (mut store, id) = store_with_box(BoxRect::new(10.0, 10.0, 30.0, 20.0));
        store.drag(&id, 500.0, -500.0).unwrap();
        let rect = rect_of(&store, &id);
        assert_eq!(rect.x, 70.0);
        assert_eq!(rect.y, 0.0);
        assert!(rect.is_within_page());

        store.drag(&id, -1000.0, 1000.0).unwrap();
        let rect = rect_of(&store, &id);
        assert_eq!((rect.x, rect.y), (0.0, 80.0));
    }

    #[test]
    fn test_non_finite_deltas_are_ignored() {
        let (mut store, id) = store_with_box(BoxRect::new(10.0, 10.0, 30.0, 20.0));
        store.drag(&id, f64::NAN, 5.0).unwrap();
        assert_eq!(rect_of(&store, &id), BoxRect::new(10.0, 15.0, 30.0, 20.0));

        store.drag(&id, f64::INFINITY, f64::NEG_INFINITY).unwrap();
        assert_eq!(rect_of(&store, &id), BoxRect::new(10.0, 15.0, 30.0, 20.0));

        store
            .resize(&id, ResizeHandle::TopLeft, f64::NAN, f64::INFINITY)
            .unwrap();
        let rect = rect_of(&store, &id);
        assert_eq!(rect, BoxRect::new(10.0, 15.0, 30.0, 20.0));
        assert!(rect.is_within_page());
    }

    #[test]
    fn test_resize_handles() {
        let (mut store, id) = store_with_box(BoxRect::new(20.0, 20.0, 40.0, 40.0));
        store.resize(&id, ResizeHandle::BottomRight, 10.0, -10.0).unwrap();
        assert_eq!(rect_of(&store, &id), BoxRect::new(20.0, 20.0, 50.0, 30.0));

        store.resize(&id, ResizeHandle::TopLeft, -5.0, 5.0).unwrap();
        assert_eq!(rect_of(&store, &id), BoxRect::new(15.0, 25.0, 55.0, 25.0));
    }

    #[test]
    fn test_resize_enforces_floor_and_bounds() {
        let (mut store, id) = store_with_box(BoxRect::new(20.0, 20.0, 40.0, 40.0));
        store.resize(&id, ResizeHandle::TopRight, -100.0, 100.0).unwrap();
        let rect = rect_of(&store, &id);
        assert_eq!(rect.width, MIN_RESIZE_SIZE);
        assert_eq!(rect.height, MIN_RESIZE_SIZE);
        assert_eq!(rect.x, 20.0);

        store.resize(&id, ResizeHandle::BottomLeft, -500.0, 500.0).unwrap();
        let rect = rect_of(&store, &id);
        assert_eq!(rect.x, 0.0);
        assert_eq!(rect.bottom(), 100.0);
        assert!(rect.is_within_page());
    }

    #[test]
    fn test_geometry_edits_null_the_clip() {
        let (mut store, id) = store_with_box(BoxRect::new(20.0, 20.0, 40.0, 40.0));

        give_clip(&mut store, &id);
        store.drag(&id, 1.0, 1.0).unwrap();
        assert!(store.get(&id).unwrap().clipped_image().is_none());

        give_clip(&mut store, &id);
        store.resize(&id, ResizeHandle::BottomRight, 1.0, 1.0).unwrap();
        assert!(store.get(&id).unwrap().clipped_image().is_none());

        give_clip(&mut store, &id);
        store.rotate(&id, 45.0).unwrap();
        assert!(store.get(&id).unwrap().clipped_image().is_none());

        give_clip(&mut store, &id);
        let (upper, lower) = store.split(&id).unwrap();
        assert!(store.get(&upper).unwrap().clipped_image().is_none());
        assert!(store.get(&lower).unwrap().clipped_image().is_none());
    }

    #[test]
    fn test_stale_clip_refused() {
        let (mut store, id) = store_with_box(BoxRect::new(20.0, 20.0, 40.0, 40.0));
        let revision = store.get(&id).unwrap().revision();
        store.drag(&id, 5.0, 0.0).unwrap();
        let result = store.store_clip(&id, revision, ClippedImage::new(RgbaImage::new(1, 1), 0.0));
        assert!(matches!(result, Err(RegionError::StaleClip(_))));
    }

    #[test]
    fn test_rotate_normalizes() {
        let (mut store, id) = store_with_box(BoxRect::new(20.0, 20.0, 40.0, 40.0));
        store.rotate(&id, 540.0).unwrap();
        assert_eq!(store.get(&id).unwrap().rotation(), 180.0);
        store.rotate(&id, -90.0).unwrap();
        assert_eq!(store.get(&id).unwrap().rotation(), -90.0);
    }

    #[test]
    fn test_split_halves_in_place() {
        let mut store = RegionStore::new(1);
        let first = store.add_box(0, BoxRect::new(5.0, 0.0, 90.0, 10.0)).unwrap();
        let id = store.add_box(0, BoxRect::new(10.0, 20.0, 50.0, 40.0)).unwrap();
        let last = store.add_box(0, BoxRect::new(5.0, 80.0, 90.0, 10.0)).unwrap();
        store.rotate(&id, 30.0).unwrap();

        let (upper, lower) = store.split(&id).unwrap();
        let order: Vec<&str> = store.regions().iter().map(|r| r.id()).collect();
        assert_eq!(order, vec![first.as_str(), upper.as_str(), lower.as_str(), last.as_str()]);
        assert!(store.get(&id).is_none());

        let a = rect_of(&store, &upper);
        let b = rect_of(&store, &lower);
        assert_eq!(a.height, 20.0);
        assert_eq!(b.height, 20.0);
        assert_eq!(a.y, 20.0);
        assert_eq!(a.bottom(), b.y);
        assert_eq!(b.bottom(), 60.0);
        assert_eq!(store.get(&upper).unwrap().rotation(), 30.0);
        assert_eq!(store.get(&lower).unwrap().rotation(), 30.0);
    }

    #[test]
    fn test_split_rejects_polygon() {
        let mut store = RegionStore::new(1);
        let id = store
            .add_polygon(
                0,
                vec![Point::new(0.0, 0.0), Point::new(50.0, 0.0), Point::new(0.0, 50.0)],
            )
            .unwrap();
        assert!(matches!(store.split(&id), Err(RegionError::NotABox(_))));
        assert!(matches!(store.drag(&id, 1.0, 1.0), Err(RegionError::NotABox(_))));
    }

    #[test]
    fn test_apply_grid_replaces_page_regions() {
        let mut store = RegionStore::new(2);
        let other = store.add_box(1, BoxRect::new(10.0, 10.0, 20.0, 20.0)).unwrap();
        store.add_box(0, BoxRect::new(10.0, 10.0, 20.0, 20.0)).unwrap();

        let ids = store.apply_grid(0, 4).unwrap();
        assert_eq!(ids.len(), 4);
        assert_eq!(store.regions_on_page(0).count(), 4);
        // Page 0 rows come before the page 1 region
        assert_eq!(store.regions().last().unwrap().id(), other);

        let rects: Vec<BoxRect> = ids.iter().map(|id| rect_of(&store, id)).collect();
        assert_eq!(rects[0].y, 0.0);
        assert_eq!(rects[3].bottom(), 100.0);
        for pair in rects.windows(2) {
            assert_eq!(pair[0].bottom(), pair[1].y);
        }
        assert!(rects.iter().all(|r| r.x == GRID_MARGIN && r.width == 90.0));

        assert!(matches!(store.apply_grid(0, 0), Err(RegionError::InvalidGrid(0))));
    }

    #[test]
    fn test_delete_and_clear_page() {
        let mut store = RegionStore::new(2);
        let a = store.add_box(0, BoxRect::new(10.0, 10.0, 20.0, 20.0)).unwrap();
        store.add_box(1, BoxRect::new(10.0, 10.0, 20.0, 20.0)).unwrap();
        store.add_box(1, BoxRect::new(10.0, 50.0, 20.0, 20.0)).unwrap();

        let removed = store.delete(&a).unwrap();
        assert_eq!(removed.id(), a);
        assert!(matches!(store.delete(&a), Err(RegionError::NotFound(_))));
        assert_eq!(store.clear_page(1), 2);
        assert!(store.is_empty());
    }

    #[test]
    fn test_metadata_edits() {
        let (mut store, id) = store_with_box(BoxRect::new(20.0, 20.0, 40.0, 40.0));
        store.rename(&id, "Genesis 1").unwrap();
        store.set_reference(&id, Some("Genesis 1:1".to_string())).unwrap();
        store.set_display_size(&id, 5).unwrap();

        let region = store.get(&id).unwrap();
        assert_eq!(region.name(), "Genesis 1");
        assert_eq!(region.reference(), Some("Genesis 1:1"));
        assert_eq!(region.display_size(), 25);

        store.set_reference(&id, Some("  ".to_string())).unwrap();
        assert_eq!(store.get(&id).unwrap().reference(), None);
    }

    #[test]
    fn test_move_to() {
        let mut store = RegionStore::new(1);
        let a = store.add_box(0, BoxRect::new(0.0, 0.0, 20.0, 20.0)).unwrap();
        let b = store.add_box(0, BoxRect::new(0.0, 30.0, 20.0, 20.0)).unwrap();
        store.move_to(&a, 10).unwrap();
        assert_eq!(store.regions()[0].id(), b);
        assert_eq!(store.regions()[1].id(), a);
    }

    #[test]
    fn test_seed_detected_keeps_page_order() {
        let mut store = RegionStore::new(2);
        store.add_box(1, BoxRect::new(10.0, 10.0, 20.0, 20.0)).unwrap();

        let proposals = vec![
            Proposal {
                rect: BoxRect::new(0.0, 0.0, 1.0, 1.0),
                text: Some("first".to_string()),
                reference: Some("Ref 1".to_string()),
                confidence: None,
            },
            Proposal {
                rect: BoxRect::new(0.0, 50.0, 40.0, 10.0),
                text: None,
                reference: None,
                confidence: Some(0.9),
            },
        ];
        let ids = store.seed_detected(0, &proposals);
        assert_eq!(ids.len(), 2);
        assert_eq!(store.regions()[0].id(), ids[0]);
        assert_eq!(store.regions()[1].id(), ids[1]);
        assert_eq!(store.regions()[0].recognized_text(), Some("first"));
        assert_eq!(store.regions()[0].reference(), Some("Ref 1"));
        assert_eq!(store.regions()[2].page_index(), 1);
    }

    #[test]
    fn test_seeded_names_follow_position() {
        let mut store = RegionStore::new(2);
        store.add_box(1, BoxRect::new(10.0, 10.0, 20.0, 20.0)).unwrap();

        let proposal = Proposal {
            rect: BoxRect::new(0.0, 0.0, 40.0, 10.0),
            text: None,
            reference: None,
            confidence: None,
        };
        store.seed_detected(0, &[proposal.clone(), proposal]);
        let names: Vec<&str> = store.regions().iter().map(|r| r.name()).collect();
        assert_eq!(names, vec!["Source 1", "Source 2", "Source 1"]);
    }

    #[test]
    fn test_detached_regions_defer_rotation() {
        let mut live = RegionStore::new(1);
        let id = live.add_box(0, BoxRect::new(0.0, 0.0, 50.0, 50.0)).unwrap();
        let mut region = live.delete(&id).unwrap();
        region.clipped = Some(ClippedImage::new(RgbaImage::new(3, 2), 0.0));

        let mut store = RegionStore::detached(vec![region]);
        store.rotate(&id, 90.0).unwrap();
        let region = store.get(&id).unwrap();
        assert_eq!(region.rotation(), 90.0);
        assert!(region.clipped_image().is_some());
        assert!(matches!(store.drag(&id, 1.0, 1.0), Err(RegionError::PageUnavailable(0))));
    }
}
