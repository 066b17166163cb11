//! Sheet Session
//!
//! One editing session over one document: the loaded pages, the region store,
//! and the calls that move a document from upload through detection, lazy
//! clipping, identification and save.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use source_sheet::{config::Config, page::ImageRasterizer, session::SheetSession};
//!
//! let config = Config::from_env();
//! let mut session = SheetSession::open(&ImageRasterizer, &upload_bytes)?;
//!
//! if let Some(adapter) = config.detection_adapter() {
//!     session.detect_all(&adapter, |p| println!("page {}/{}", p.page + 1, p.total)).await;
//! }
//! session.materialize_clips().await;
//!
//! let outcome = session.identify(&region_id, &config.identification_pipeline()).await?;
//! session.save(&storage).await?;
//! ```

use async_trait::async_trait;
use futures::future::join_all;
use image::RgbaImage;

use crate::clip::clip;
use crate::codec::encode_png;
use crate::detect::DetectionAdapter;
use crate::error::{Result, SheetError};
use crate::identify::{Candidate, IdentificationPipeline, IdentifyOutcome};
use crate::page::{Page, PageRasterizer};
use crate::region::{ClippedImage, RegionError, RegionStore};
use crate::sheet::{final_raster, SheetComposer, SheetDocument};

/// Progress report after each detected page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetectionProgress {
    /// Zero-based index of the page just processed
    pub page: usize,
    pub total: usize,
    /// Regions seeded from this page
    pub regions: usize,
}

/// Storage failure, reported to the user verbatim
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct StorageError(pub String);

/// Persistence boundary for finished sheets
#[async_trait]
pub trait SheetStorage: Send + Sync {
    async fn save(&self, document: &SheetDocument) -> std::result::Result<(), StorageError>;
}

/// Editing session for one document
pub struct SheetSession {
    pages: Vec<Page>,
    store: RegionStore,
    composer: SheetComposer,
}

impl SheetSession {
    /// Rasterize an uploaded source. An unreadable source is an error; the
    /// caller returns to the upload state.
    pub fn open(rasterizer: &dyn PageRasterizer, source: &[u8]) -> Result<Self> {
        let pages = rasterizer.rasterize(source)?;
        tracing::info!(pages = pages.len(), "Document rasterized");
        Ok(Self::with_pages(pages))
    }

    pub fn with_pages(pages: Vec<Page>) -> Self {
        Self {
            store: RegionStore::new(pages.len()),
            pages,
            composer: SheetComposer::default(),
        }
    }

    /// Resume editing a saved sheet without its original pages
    pub fn from_sheet(document: &SheetDocument) -> Result<Self> {
        Ok(Self {
            pages: Vec::new(),
            store: RegionStore::from_sheet(document)?,
            composer: SheetComposer::default(),
        })
    }

    pub fn with_composer(mut self, composer: SheetComposer) -> Self {
        self.composer = composer;
        self
    }

    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    pub fn store(&self) -> &RegionStore {
        &self.store
    }

    /// Mutable access for the editing operations
    pub fn store_mut(&mut self) -> &mut RegionStore {
        &mut self.store
    }

    // ========================================================================
    // Detection
    // ========================================================================

    /// Detect regions page by page, reporting progress after each page.
    /// Returns the number of regions seeded.
    pub async fn detect_all<F>(&mut self, adapter: &DetectionAdapter, mut on_progress: F) -> usize
    where
        F: FnMut(DetectionProgress),
    {
        let total = self.pages.len();
        let mut seeded = 0;
        for (index, page) in self.pages.iter().enumerate() {
            let outcome = adapter.detect_page(page).await;
            let ids = self.store.seed_detected(index, &outcome.proposals);
            seeded += ids.len();
            tracing::debug!(page = index, regions = ids.len(), "Page detected");
            on_progress(DetectionProgress {
                page: index,
                total,
                regions: ids.len(),
            });
        }
        seeded
    }

    // ========================================================================
    // Clipping
    // ========================================================================

    /// Clip every region on a loaded page that has no cached clip, in parallel
    /// blocking tasks. Returns the number of clips installed.
    pub async fn materialize_clips(&mut self) -> usize {
        let tasks: Vec<_> = self
            .store
            .regions()
            .iter()
            .filter(|r| r.clipped_image().is_none())
            .filter_map(|region| {
                let page = self.pages.get(region.page_index())?.clone();
                let id = region.id().to_string();
                let revision = region.revision();
                let shape = region.shape().clone();
                let rotation = region.rotation();
                Some(tokio::task::spawn_blocking(move || {
                    let raster = clip(&page, &shape, rotation);
                    (id, revision, rotation, raster)
                }))
            })
            .collect();

        let mut installed = 0;
        for joined in join_all(tasks).await {
            let (id, revision, rotation, raster) = match joined {
                Ok(result) => result,
                Err(e) => {
                    tracing::warn!(error = %e, "Clip task failed");
                    continue;
                }
            };
            let Some(raster) = raster else {
                tracing::debug!(region_id = %id, "Region is degenerate at page resolution");
                continue;
            };
            match self.store.store_clip(&id, revision, ClippedImage::new(raster, rotation)) {
                Ok(()) => installed += 1,
                Err(e) => tracing::debug!(region_id = %id, error = %e, "Discarding clip"),
            }
        }
        installed
    }

    /// The region's raster with its rotation applied, clipping and caching it
    /// on first use
    pub fn region_raster(&mut self, id: &str) -> Result<RgbaImage> {
        let region = self
            .store
            .get(id)
            .ok_or_else(|| RegionError::NotFound(id.to_string()))?;
        let raster = final_raster(region, &self.pages)?;

        if region.clipped_image().is_none() {
            let (revision, rotation) = (region.revision(), region.rotation());
            self.store
                .store_clip(id, revision, ClippedImage::new(raster.clone(), rotation))?;
        }
        Ok(raster)
    }

    // ========================================================================
    // Identification
    // ========================================================================

    /// Run the identification pipeline on one region. The store is not changed
    /// apart from caching the region's clip.
    pub async fn identify(
        &mut self,
        id: &str,
        pipeline: &IdentificationPipeline,
    ) -> Result<IdentifyOutcome> {
        let raster = self.region_raster(id)?;
        let png = encode_png(&raster)?;
        let recognized = self
            .store
            .get(id)
            .and_then(|r| r.recognized_text())
            .map(str::to_string);

        Ok(pipeline.identify(&png, recognized.as_deref()).await)
    }

    /// Write an accepted candidate's name and reference onto a region
    pub fn accept_candidate(&mut self, id: &str, candidate: &Candidate) -> Result<()> {
        self.store.rename(id, candidate.display_name.clone())?;
        self.store
            .set_reference(id, Some(candidate.corpus_reference.clone()))?;
        tracing::info!(region_id = %id, reference = %candidate.corpus_reference, "Candidate accepted");
        Ok(())
    }

    // ========================================================================
    // Output
    // ========================================================================

    pub fn compose(&self) -> Result<SheetDocument> {
        self.composer.compose(&self.store, &self.pages)
    }

    pub fn render_preview(&self) -> Result<Option<RgbaImage>> {
        self.composer.render_preview(&self.store, &self.pages)
    }

    /// Compose and hand the document to storage. On failure nothing is
    /// discarded and the save can be retried.
    pub async fn save(&self, storage: &dyn SheetStorage) -> Result<SheetDocument> {
        let document = self.compose()?;
        if let Err(e) = storage.save(&document).await {
            tracing::error!(error = %e, regions = document.len(), "Saving sheet failed");
            return Err(SheetError::Persistence(e.0));
        }
        tracing::info!(regions = document.len(), "Sheet saved");
        Ok(document)
    }
}
