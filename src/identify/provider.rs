//! Classify Providers
//!
//! Multimodal classification of a cropped region. Each provider is one
//! (credential, model) pair; the pipeline walks an ordered list of them.

use async_trait::async_trait;
use base64::Engine;
use serde_json::Value;

use crate::codec::strip_code_fence;

use super::types::{ClassifyResponse, ProviderError, RawCandidate};

const CLASSIFY_INSTRUCTION: &str = "Identify the canonical work this excerpt is taken from. \
Respond with JSON: {\"candidates\": [{\"sourceName\", \"corpusReference\", \"previewText\"}]}, \
most likely first. previewText is the text you read in the image.";

/// Classify provider trait
#[async_trait]
pub trait ClassifyProvider: Send + Sync {
    /// Provider label for logs and `StrategySource::Classifier`
    fn name(&self) -> &str;

    /// Propose candidates for a PNG-encoded region
    async fn classify(
        &self,
        image_png: &[u8],
        hint: Option<&str>,
    ) -> Result<ClassifyResponse, ProviderError>;
}

/// Classification over an HTTP JSON endpoint
pub struct HttpClassifyProvider {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    label: String,
}

impl HttpClassifyProvider {
    pub fn new(endpoint: &str, api_key: &str, model: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            label: model.to_string(),
        }
    }

    /// Override the label, which defaults to the model name
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }
}

#[async_trait]
impl ClassifyProvider for HttpClassifyProvider {
    fn name(&self) -> &str {
        &self.label
    }

    async fn classify(
        &self,
        image_png: &[u8],
        hint: Option<&str>,
    ) -> Result<ClassifyResponse, ProviderError> {
        let request = serde_json::json!({
            "model": self.model,
            "instruction": CLASSIFY_INSTRUCTION,
            "hint": hint,
            "image": {
                "mimeType": "image/png",
                "data": base64::engine::general_purpose::STANDARD.encode(image_png),
            },
        });

        let mut builder = self.client.post(&self.endpoint).json(&request);
        if !self.api_key.is_empty() {
            builder = builder.bearer_auth(&self.api_key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| ProviderError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::from_status(status, body));
        }

        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::Request(e.to_string()))?;

        parse_classify_payload(&body)
    }
}

/// Parse a classify response body.
///
/// Accepts `{"candidates": [...]}`, a bare candidate array, or either inside a
/// Markdown fence or a `{"response": "..."}` string wrapper. Candidates without
/// a name and a reference are dropped.
pub fn parse_classify_payload(body: &str) -> Result<ClassifyResponse, ProviderError> {
    let mut value: Value = serde_json::from_str(strip_code_fence(body))
        .map_err(|e| ProviderError::Parse(e.to_string()))?;

    if let Some(inner) = value
        .get("response")
        .and_then(Value::as_str)
        .map(str::to_string)
    {
        value = serde_json::from_str(strip_code_fence(&inner))
            .map_err(|e| ProviderError::Parse(e.to_string()))?;
    }

    let rows = match value {
        Value::Array(rows) => rows,
        Value::Object(mut map) => match map.remove("candidates") {
            Some(Value::Array(rows)) => rows,
            _ => return Err(ProviderError::Parse("missing `candidates` array".to_string())),
        },
        other => {
            return Err(ProviderError::Parse(format!(
                "unexpected response shape: {}",
                other
            )))
        }
    };

    let candidates = rows
        .into_iter()
        .filter_map(|row| serde_json::from_value::<RawCandidate>(row).ok())
        .filter(|c| {
            c.corpus_reference
                .as_deref()
                .map(|r| !r.trim().is_empty())
                .unwrap_or(false)
                || !c.source_name.trim().is_empty()
        })
        .collect();

    Ok(ClassifyResponse { candidates })
}

/// Mock provider for testing
#[cfg(test)]
pub struct MockClassifyProvider {
    pub name: String,
    pub reply: Result<String, fn(String) -> ProviderError>,
    pub calls: std::sync::atomic::AtomicUsize,
    /// Simulated latency before replying
    pub delay: std::time::Duration,
}

#[cfg(test)]
impl MockClassifyProvider {
    pub fn replying(name: &str, body: &str) -> Self {
        Self {
            name: name.to_string(),
            reply: Ok(body.to_string()),
            calls: Default::default(),
            delay: std::time::Duration::ZERO,
        }
    }

    pub fn delayed(mut self, delay: std::time::Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn failing(name: &str, error: fn(String) -> ProviderError) -> Self {
        Self {
            name: name.to_string(),
            reply: Err(error),
            calls: Default::default(),
            delay: std::time::Duration::ZERO,
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(test)]
#[async_trait]
impl ClassifyProvider for MockClassifyProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn classify(
        &self,
        _image_png: &[u8],
        _hint: Option<&str>,
    ) -> Result<ClassifyResponse, ProviderError> {
        self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match &self.reply {
            Ok(body) => parse_classify_payload(body),
            Err(error) => Err(error(self.name.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_provider_label() {
        let provider = HttpClassifyProvider::new("http://identify.local", "k1", "large");
        assert_eq!(provider.name(), "large");
        assert_eq!(provider.with_label("large#k2").name(), "large#k2");
    }

    #[test]
    fn test_parse_candidates_object() {
        let parsed = parse_classify_payload(
            r#"{"candidates": [{"sourceName": "Genesis", "corpusReference": "Genesis 1:1", "previewText": "In the beginning"}]}"#,
        )
        .unwrap();
        assert_eq!(parsed.candidates.len(), 1);
        assert_eq!(parsed.candidates[0].corpus_reference.as_deref(), Some("Genesis 1:1"));
    }

    #[test]
    fn test_parse_fenced_array() {
        let parsed = parse_classify_payload(
            "```json\n[{\"name\": \"Rashi\", \"reference\": \"Rashi on Genesis 1:1\"}, {}]\n```",
        )
        .unwrap();
        assert_eq!(parsed.candidates.len(), 1);
        assert_eq!(parsed.candidates[0].source_name, "Rashi");
    }

    #[test]
    fn test_parse_wrapped_response() {
        let body = r#"{"response": "{\"candidates\": [{\"sourceName\": \"A\", \"corpusReference\": \"A 1\"}]}"}"#;
        assert_eq!(parse_classify_payload(body).unwrap().candidates.len(), 1);
    }

    #[test]
    fn test_parse_rejects_prose() {
        assert!(matches!(
            parse_classify_payload("This looks like a passage from Genesis."),
            Err(ProviderError::Parse(_))
        ));
        assert!(matches!(
            parse_classify_payload(r#"{"answer": "Genesis"}"#),
            Err(ProviderError::Parse(_))
        ));
    }

    #[tokio::test]
    async fn test_mock_counts_calls() {
        let mock = MockClassifyProvider::failing("k1/m1", ProviderError::RateLimited);
        assert!(mock.classify(&[], None).await.is_err());
        assert_eq!(mock.call_count(), 1);
    }
}
