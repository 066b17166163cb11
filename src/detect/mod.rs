//! Detection Module
//!
//! Proposes a first draft of regions for a page by calling an external
//! multimodal detection service, then normalizes and clamps its response.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use source_sheet::detect::{CoordinateConvention, DetectionAdapter, HttpDetectionProvider};
//!
//! let provider = HttpDetectionProvider::new(url, Some(key), "vision-model", CoordinateConvention::PerMille);
//! let adapter = DetectionAdapter::new(Arc::new(provider), Duration::from_secs(10));
//!
//! let outcome = adapter.detect_page(&page).await;
//! store.seed_detected(0, &outcome.proposals);
//! ```

mod adapter;
mod provider;
mod types;

pub use adapter::{normalize_detection, DetectionAdapter};
pub use provider::{parse_detection_payload, DetectionProvider, HttpDetectionProvider, DETECTION_INSTRUCTION};
pub use types::{
    CoordinateConvention, DetectionError, DetectionOutcome, DetectionWarning, Proposal, RawBox,
    RawDetection, RawPageDetection,
};

#[cfg(test)]
pub(crate) use provider::MockDetectionProvider;
