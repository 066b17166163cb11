//! Detection Types
//!
//! Wire rows returned by the detection service and the normalized proposals
//! handed to the region store.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::region::BoxRect;

/// Numeric convention a provider uses for box coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CoordinateConvention {
    /// 0-100
    Percent,
    /// 0-1000
    #[serde(rename = "permille")]
    PerMille,
    /// 0-1
    Fraction,
}

impl CoordinateConvention {
    /// Largest raw value the convention allows
    pub fn max_raw(self) -> f64 {
        match self {
            Self::Percent => 100.0,
            Self::PerMille => 1000.0,
            Self::Fraction => 1.0,
        }
    }

    /// Convert a raw value to percent
    pub fn to_percent(self, raw: f64) -> f64 {
        raw * 100.0 / self.max_raw()
    }
}

impl Default for CoordinateConvention {
    fn default() -> Self {
        Self::Percent
    }
}

impl FromStr for CoordinateConvention {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "percent" | "pct" => Ok(Self::Percent),
            "permille" | "per-mille" | "per_mille" => Ok(Self::PerMille),
            "fraction" | "normalized" => Ok(Self::Fraction),
            other => Err(format!("unknown coordinate convention: {}", other)),
        }
    }
}

/// Box as `{x, y, width, height}`
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct RawBox {
    pub x: f64,
    pub y: f64,
    #[serde(alias = "w")]
    pub width: f64,
    #[serde(alias = "h")]
    pub height: f64,
}

/// One region row as sent by the service
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawDetection {
    #[serde(rename = "box", default)]
    pub bbox: Option<RawBox>,
    /// `[ymin, xmin, ymax, xmax]`
    #[serde(default)]
    pub box_2d: Option<Vec<f64>>,
    #[serde(default, alias = "ocr_text", alias = "ocrText")]
    pub text: Option<String>,
    #[serde(default, alias = "ref")]
    pub reference: Option<String>,
    #[serde(default)]
    pub confidence: Option<f64>,
}

/// Parsed service response for one page
#[derive(Debug, Clone, Default)]
pub struct RawPageDetection {
    /// Rows that deserialized, with their index in the payload
    pub rows: Vec<(usize, RawDetection)>,
    /// Full-page recognized text, when the service returns it
    pub page_text: Option<String>,
    /// Rows that could not be read
    pub warnings: Vec<DetectionWarning>,
}

/// A normalized region proposal (percent coordinates, clamped)
#[derive(Debug, Clone, PartialEq)]
pub struct Proposal {
    pub rect: BoxRect,
    pub text: Option<String>,
    pub reference: Option<String>,
    pub confidence: Option<f64>,
}

/// Something in the service response that did not fit the declared contract
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionWarning {
    /// Row index in the payload
    pub row: usize,
    pub message: String,
}

impl fmt::Display for DetectionWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "row {}: {}", self.row, self.message)
    }
}

/// Result of detecting one page. Empty proposals mean manual annotation.
#[derive(Debug, Clone, Default)]
pub struct DetectionOutcome {
    pub proposals: Vec<Proposal>,
    pub page_text: Option<String>,
    pub warnings: Vec<DetectionWarning>,
}

impl DetectionOutcome {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.proposals.is_empty()
    }
}

/// Detection errors. Never surfaced past the adapter.
#[derive(Debug, thiserror::Error)]
pub enum DetectionError {
    #[error("Detection request failed: {0}")]
    Request(String),

    #[error("Detection API error: {0}")]
    Api(String),

    #[error("Failed to parse detection response: {0}")]
    Parse(String),

    #[error("Detection timed out after {0} seconds")]
    Timeout(u64),

    #[error("Failed to encode page: {0}")]
    Encode(String),
}
