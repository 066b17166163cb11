//! Identification Types
//!
//! Wire types for the classify and corpus services, the candidates the
//! pipeline produces, and the error types of its collaborators.

use serde::{Deserialize, Serialize};

/// Candidate as proposed by a classify provider, before verification
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawCandidate {
    #[serde(default, alias = "source_name", alias = "name")]
    pub source_name: String,
    #[serde(default, alias = "corpus_reference", alias = "reference", alias = "ref")]
    pub corpus_reference: Option<String>,
    #[serde(default, alias = "preview_text", alias = "text")]
    pub preview_text: Option<String>,
}

/// Classify service response
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClassifyResponse {
    #[serde(default)]
    pub candidates: Vec<RawCandidate>,
}

/// Full-text search hit from the corpus service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    #[serde(alias = "ref")]
    pub reference: String,
    #[serde(default, alias = "highlight")]
    pub snippet: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

/// Strategy that produced a candidate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "camelCase")]
pub enum StrategySource {
    /// Multimodal classification by the named provider
    Classifier { provider: String },
    /// Corpus full-text search with the given query window
    FullTextSearch { query: String },
}

/// A verified, unconfirmed corpus match. Never persisted.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub display_name: String,
    pub corpus_reference: String,
    pub preview_text: String,
    pub strategy_source: StrategySource,
    /// Verification score (0-1)
    pub score: f64,
}

/// Result of identifying one region
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum IdentifyOutcome {
    /// Candidates in the order the successful strategy produced them
    Identified { candidates: Vec<Candidate> },
    /// Nothing survived; the recognized text is returned for manual search
    #[serde(rename_all = "camelCase")]
    Unidentified { recognized_text: String },
}

impl IdentifyOutcome {
    pub fn candidates(&self) -> &[Candidate] {
        match self {
            Self::Identified { candidates } => candidates,
            Self::Unidentified { .. } => &[],
        }
    }

    pub fn is_identified(&self) -> bool {
        matches!(self, Self::Identified { .. })
    }
}

/// Classify provider errors
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Model not found: {0}")]
    NotFound(String),

    #[error("Request failed: {0}")]
    Request(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("Unparseable response: {0}")]
    Parse(String),

    #[error("Timed out after {0} seconds")]
    Timeout(u64),
}

impl ProviderError {
    /// Errors that mean "this credential/model pair is unusable right now"
    pub fn is_rotation_signal(&self) -> bool {
        matches!(
            self,
            Self::RateLimited(_) | Self::Unauthorized(_) | Self::NotFound(_)
        )
    }

    pub(crate) fn from_status(status: reqwest::StatusCode, body: String) -> Self {
        match status.as_u16() {
            429 => Self::RateLimited(body),
            401 | 403 => Self::Unauthorized(body),
            404 => Self::NotFound(body),
            _ => Self::Api(format!("{}: {}", status, body)),
        }
    }
}

/// Corpus service errors
#[derive(Debug, thiserror::Error)]
pub enum CorpusError {
    #[error("Reference not found: {0}")]
    NotFound(String),

    #[error("Corpus request failed: {0}")]
    Request(String),

    #[error("Corpus API error: {0}")]
    Api(String),

    #[error("Failed to parse corpus response: {0}")]
    Parse(String),

    #[error("Corpus call timed out after {0} seconds")]
    Timeout(u64),
}
