//! Identification Module
//!
//! Turns a cropped region into a short list of verified corpus candidates.
//!
//! ## Features
//!
//! - Ordered (credential, model) provider rotation for multimodal classification
//! - Verification of every candidate against canonical corpus text
//! - Full-text search fallback over windows of the recognized text
//! - Explicit "unidentified" result carrying the recognized text
//!
//! ## Usage
//!
//! ```rust,ignore
//! use source_sheet::identify::{HttpClassifyProvider, HttpCorpusClient, IdentificationPipeline, PipelineSettings};
//!
//! let providers: Vec<Arc<dyn ClassifyProvider>> = vec![
//!     Arc::new(HttpClassifyProvider::new(url, "key-1", "vision-large")),
//!     Arc::new(HttpClassifyProvider::new(url, "key-2", "vision-large")),
//! ];
//! let corpus = Arc::new(HttpCorpusClient::new("https://corpus.example.org/api"));
//! let pipeline = IdentificationPipeline::new(providers, corpus, PipelineSettings::default());
//!
//! match pipeline.identify(&png, Some(ocr_text)).await {
//!     IdentifyOutcome::Identified { candidates } => show(candidates),
//!     IdentifyOutcome::Unidentified { recognized_text } => offer_manual_search(recognized_text),
//! }
//! ```

mod corpus;
mod pipeline;
mod provider;
mod types;
mod verify;

pub use corpus::{CorpusService, HttpCorpusClient};
pub use pipeline::{IdentificationPipeline, PipelineSettings, DEFAULT_ACCEPT_THRESHOLD};
pub use provider::{parse_classify_payload, ClassifyProvider, HttpClassifyProvider};
pub use types::{
    Candidate, ClassifyResponse, CorpusError, IdentifyOutcome, ProviderError, RawCandidate,
    SearchHit, StrategySource,
};
pub use verify::{verification_score, Script, TextNormalizer};

#[cfg(test)]
pub(crate) use corpus::MockCorpus;
#[cfg(test)]
pub(crate) use provider::MockClassifyProvider;
