//! Sheet Module
//!
//! Persisted sheet format and the composer that produces it.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use source_sheet::sheet::{SheetComposer, SheetDocument};
//!
//! let composer = SheetComposer::new();
//! let document = composer.compose(&store, &pages)?;
//! let json = document.to_json()?;
//!
//! // Later, without the original pages
//! let store = RegionStore::from_sheet(&SheetDocument::from_json(&json)?)?;
//! ```

mod composer;
mod document;

pub(crate) use composer::final_raster;
pub use composer::SheetComposer;
pub use document::{SheetDocument, SheetEntry};
