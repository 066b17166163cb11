//! Sheet Document
//!
//! The persisted form of a sheet: a JSON array of entries, each carrying a
//! self-contained PNG data URL with rotation already baked in.

use serde::{Deserialize, Serialize};

use crate::codec::from_data_url;
use crate::error::{Result, SheetError};
use crate::region::{
    clamp_display_size, normalize_rotation, BoxRect, ClippedImage, Region, RegionStore, Shape,
    MAX_DISPLAY_SIZE,
};

/// One persisted source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SheetEntry {
    pub id: String,
    pub name: String,
    /// `data:image/png;base64,...`
    pub image: String,
    /// Reads back as 0 unless a consumer re-applies a rotation on purpose
    #[serde(default)]
    pub rotation: f64,
    #[serde(default)]
    pub reference: Option<String>,
    #[serde(default = "default_display_size")]
    pub display_size: u8,
}

fn default_display_size() -> u8 {
    MAX_DISPLAY_SIZE
}

/// Ordered list of entries, serialized as a bare JSON array
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SheetDocument {
    pub entries: Vec<SheetEntry>,
}

impl SheetDocument {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| SheetError::InvalidDocument(e.to_string()))
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| SheetError::InvalidDocument(e.to_string()))
    }
}

impl RegionStore {
    /// Rebuild a store from a saved sheet.
    ///
    /// The original pages are not available, so every entry's image becomes the
    /// region's authoritative clip and its geometry covers that whole image.
    pub fn from_sheet(document: &SheetDocument) -> Result<Self> {
        let mut regions = Vec::with_capacity(document.entries.len());
        for entry in &document.entries {
            let raster = from_data_url(&entry.image)?;

            let mut region = Region::new(0, Shape::Box(BoxRect::full_page()), entry.name.clone());
            if !entry.id.trim().is_empty() {
                region.id = entry.id.clone();
            }
            region.rotation = normalize_rotation(entry.rotation);
            region.reference = entry
                .reference
                .as_deref()
                .map(str::trim)
                .filter(|r| !r.is_empty())
                .map(str::to_string);
            region.display_size = clamp_display_size(entry.display_size);
            region.clipped = Some(ClippedImage::new(raster, 0.0));
            regions.push(region);
        }

        tracing::debug!(regions = regions.len(), "Loaded sheet document");
        Ok(RegionStore::detached(regions))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::to_data_url;
    use image::RgbaImage;

    fn entry(id: &str, name: &str) -> SheetEntry {
        SheetEntry {
            id: id.to_string(),
            name: name.to_string(),
            image: to_data_url(&RgbaImage::new(4, 2)).unwrap(),
            rotation: 0.0,
            reference: Some("Genesis 1:1".to_string()),
            display_size: 60,
        }
    }

    #[test]
    fn test_json_shape() {
        let doc = SheetDocument {
            entries: vec![entry("a", "Source 1")],
        };
        let value: serde_json::Value = serde_json::from_str(&doc.to_json().unwrap()).unwrap();
        let first = &value.as_array().unwrap()[0];
        assert_eq!(first["displaySize"], 60);
        assert_eq!(first["reference"], "Genesis 1:1");
        assert_eq!(first["rotation"], 0.0);
        assert!(first["image"].as_str().unwrap().starts_with("data:image/png;base64,"));
    }

    #[test]
    fn test_defaults_for_missing_fields() {
        let json = format!(
            r#"[{{"id": "x", "name": "n", "image": "{}"}}]"#,
            to_data_url(&RgbaImage::new(1, 1)).unwrap()
        );
        let doc = SheetDocument::from_json(&json).unwrap();
        assert_eq!(doc.entries[0].display_size, 100);
        assert_eq!(doc.entries[0].reference, None);
    }

    #[test]
    fn test_from_sheet_builds_detached_store() {
        let doc = SheetDocument {
            entries: vec![entry("a", "First"), entry("b", "Second")],
        };
        let store = RegionStore::from_sheet(&doc).unwrap();
        assert_eq!(store.page_count(), 0);
        assert_eq!(store.len(), 2);

        let first = store.get("a").unwrap();
        assert_eq!(first.name(), "First");
        assert_eq!(first.display_size(), 60);
        assert_eq!(first.clipped_image().unwrap().raster.dimensions(), (4, 2));
        assert_eq!(store.regions()[1].id(), "b");
    }

    #[test]
    fn test_from_sheet_rejects_bad_image() {
        let mut bad = entry("a", "First");
        bad.image = "not a data url".to_string();
        let doc = SheetDocument { entries: vec![bad] };
        assert!(matches!(
            RegionStore::from_sheet(&doc),
            Err(SheetError::Codec(_))
        ));
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(
            SheetDocument::from_json(r#"{"not": "an array"}"#),
            Err(SheetError::InvalidDocument(_))
        ));
    }
}
