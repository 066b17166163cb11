//! Detection Providers
//!
//! Provider trait for the external region-detection service, the HTTP
//! implementation, and tolerant parsing of the response body.

use async_trait::async_trait;
use base64::Engine;
use serde_json::Value;

use crate::codec::strip_code_fence;

use super::types::{CoordinateConvention, DetectionError, DetectionWarning, RawDetection, RawPageDetection};

/// Fixed instruction sent with every page
pub const DETECTION_INSTRUCTION: &str = "Identify every distinct source text on this scanned page. \
For each one return its bounding box, the text it contains, and a reference to the canonical \
work if you recognize it. Respond with JSON: {\"regions\": [{\"box\": {\"x\", \"y\", \"width\", \
\"height\"}, \"text\", \"reference\", \"confidence\"}], \"text\": \"<full page text>\"}.";

/// Region detection provider trait
#[async_trait]
pub trait DetectionProvider: Send + Sync {
    /// Provider name for logs
    fn name(&self) -> &str;

    /// Coordinate convention this integration declares
    fn convention(&self) -> CoordinateConvention;

    /// Propose regions for one PNG-encoded page
    async fn detect(&self, page_png: &[u8]) -> Result<RawPageDetection, DetectionError>;
}

/// Detection over an HTTP JSON endpoint
pub struct HttpDetectionProvider {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    model: String,
    convention: CoordinateConvention,
}

impl HttpDetectionProvider {
    pub fn new(
        endpoint: &str,
        api_key: Option<&str>,
        model: &str,
        convention: CoordinateConvention,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.to_string(),
            api_key: api_key.filter(|k| !k.is_empty()).map(str::to_string),
            model: model.to_string(),
            convention,
        }
    }
}

#[async_trait]
impl DetectionProvider for HttpDetectionProvider {
    fn name(&self) -> &str {
        &self.model
    }

    fn convention(&self) -> CoordinateConvention {
        self.convention
    }

    async fn detect(&self, page_png: &[u8]) -> Result<RawPageDetection, DetectionError> {
        let image_base64 = base64::engine::general_purpose::STANDARD.encode(page_png);

        let request = serde_json::json!({
            "model": self.model,
            "instruction": DETECTION_INSTRUCTION,
            "image": {
                "mimeType": "image/png",
                "data": image_base64,
            },
        });

        let mut builder = self.client.post(&self.endpoint).json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| DetectionError::Request(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(DetectionError::Api(format!("{}: {}", status, body)));
        }

        let body = response
            .text()
            .await
            .map_err(|e| DetectionError::Request(e.to_string()))?;

        parse_detection_payload(&body)
    }
}

/// Parse a detection response body.
///
/// Accepts a bare array of rows, an object with a `regions` array, or either of
/// those wrapped in a Markdown code fence. Malformed rows are skipped and
/// reported as warnings.
pub fn parse_detection_payload(body: &str) -> Result<RawPageDetection, DetectionError> {
    let value: Value = serde_json::from_str(strip_code_fence(body))
        .map_err(|e| DetectionError::Parse(e.to_string()))?;

    // Some services wrap model output in a string field
    let wrapped = match &value {
        Value::Object(map) if !map.contains_key("regions") => map
            .get("response")
            .and_then(Value::as_str)
            .map(str::to_string),
        _ => None,
    };
    let value = match wrapped {
        Some(inner) => serde_json::from_str(strip_code_fence(&inner))
            .map_err(|e| DetectionError::Parse(e.to_string()))?,
        None => value,
    };

    let (rows, page_text) = match value {
        Value::Array(rows) => (rows, None),
        Value::Object(mut map) => {
            let rows = match map.remove("regions") {
                Some(Value::Array(rows)) => rows,
                Some(Value::Null) | None => Vec::new(),
                Some(other) => {
                    return Err(DetectionError::Parse(format!(
                        "`regions` is not an array: {}",
                        other
                    )))
                }
            };
            let page_text = map
                .get("text")
                .or_else(|| map.get("ocr_text"))
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string);
            (rows, page_text)
        }
        other => {
            return Err(DetectionError::Parse(format!(
                "unexpected response shape: {}",
                other
            )))
        }
    };

    let mut parsed = RawPageDetection {
        page_text,
        ..Default::default()
    };
    for (index, row) in rows.into_iter().enumerate() {
        match serde_json::from_value::<RawDetection>(row) {
            Ok(detection) => parsed.rows.push((index, detection)),
            Err(e) => {
                tracing::debug!(row = index, error = %e, "Skipping unreadable detection row");
                parsed.warnings.push(DetectionWarning {
                    row: index,
                    message: format!("unreadable row: {}", e),
                });
            }
        }
    }
    Ok(parsed)
}

/// Mock provider for testing
#[cfg(test)]
pub struct MockDetectionProvider {
    pub body: Result<String, String>,
    pub convention: CoordinateConvention,
    /// Simulated service latency
    pub delay: std::time::Duration,
}

#[cfg(test)]
#[async_trait]
impl DetectionProvider for MockDetectionProvider {
    fn name(&self) -> &str {
        "mock"
    }

    fn convention(&self) -> CoordinateConvention {
        self.convention
    }

    async fn detect(&self, _page_png: &[u8]) -> Result<RawPageDetection, DetectionError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match &self.body {
            Ok(body) => parse_detection_payload(body),
            Err(message) => Err(DetectionError::Api(message.clone())),
        }
    }
}
