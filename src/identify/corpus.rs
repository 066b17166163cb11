//! Corpus Service
//!
//! Canonical text lookup and full-text search against the reference corpus.

use async_trait::async_trait;
use lol_html::html_content::ContentType;
use lol_html::{element, rewrite_str, RewriteStrSettings};
use serde::Deserialize;
use serde_json::Value;

use super::types::{CorpusError, SearchHit};

/// Corpus service trait
#[async_trait]
pub trait CorpusService: Send + Sync {
    /// Canonical plain text for a reference
    async fn lookup(&self, reference: &str) -> Result<String, CorpusError>;

    /// Ranked full-text search hits
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>, CorpusError>;
}

/// Corpus client over HTTP
///
/// - `GET {base}/texts/{reference}` returns `{"text": ...}` where text may be a
///   string or nested arrays of strings (chapter/verse segments).
/// - `POST {base}/search` with `{"query", "limit"}` returns `{"hits": [...]}`.
pub struct HttpCorpusClient {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default, alias = "results")]
    hits: Vec<SearchHit>,
}

impl HttpCorpusClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl CorpusService for HttpCorpusClient {
    async fn lookup(&self, reference: &str) -> Result<String, CorpusError> {
        let url = format!(
            "{}/texts/{}",
            self.base_url,
            urlencoding::encode(reference.trim())
        );

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| CorpusError::Request(e.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(CorpusError::NotFound(reference.to_string()));
        }
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(CorpusError::Api(format!("{}: {}", status, body)));
        }

        let value: Value = response
            .json()
            .await
            .map_err(|e| CorpusError::Parse(e.to_string()))?;

        let mut segments = Vec::new();
        flatten_text(value.get("text").unwrap_or(&Value::Null), &mut segments)?;
        let text = segments.join(" ");
        if text.trim().is_empty() {
            return Err(CorpusError::NotFound(reference.to_string()));
        }
        Ok(text)
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>, CorpusError> {
        let response = self
            .client
            .post(format!("{}/search", self.base_url))
            .json(&serde_json::json!({ "query": query, "limit": limit }))
            .send()
            .await
            .map_err(|e| CorpusError::Request(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(CorpusError::Api(format!("{}: {}", status, body)));
        }

        let parsed: SearchResponse = response
            .json()
            .await
            .map_err(|e| CorpusError::Parse(e.to_string()))?;

        parsed
            .hits
            .into_iter()
            .take(limit)
            .map(|hit| {
                Ok(SearchHit {
                    snippet: strip_markup(&hit.snippet)?,
                    ..hit
                })
            })
            .collect()
    }
}

/// Collect the string leaves of a (possibly nested) text field, markup removed
fn flatten_text(value: &Value, out: &mut Vec<String>) -> Result<(), CorpusError> {
    match value {
        Value::String(s) => {
            let clean = strip_markup(s)?;
            if !clean.is_empty() {
                out.push(clean);
            }
        }
        Value::Array(items) => {
            for item in items {
                flatten_text(item, out)?;
            }
        }
        _ => {}
    }
    Ok(())
}

/// Remove HTML tags and decode entities.
///
/// Element boundaries become spaces so adjacent block contents do not fuse.
fn strip_markup(html: &str) -> Result<String, CorpusError> {
    let text = rewrite_str(
        html,
        RewriteStrSettings {
            element_content_handlers: vec![element!("*", |el| {
                el.before(" ", ContentType::Text);
                el.after(" ", ContentType::Text);
                el.remove_and_keep_content();
                Ok(())
            })],
            ..RewriteStrSettings::default()
        },
    )
    .map_err(|e| CorpusError::Parse(e.to_string()))?;

    let decoded = html_escape::decode_html_entities(&text);
    Ok(decoded.split_whitespace().collect::<Vec<_>>().join(" "))
}

/// In-memory corpus for tests
#[cfg(test)]
#[derive(Default)]
pub struct MockCorpus {
    pub texts: std::collections::HashMap<String, String>,
    pub search_calls: std::sync::Mutex<Vec<String>>,
    pub fail_search: bool,
}

#[cfg(test)]
impl MockCorpus {
    pub fn with_texts(entries: &[(&str, &str)]) -> Self {
        Self {
            texts: entries
                .iter()
                .map(|(r, t)| (r.to_string(), t.to_string()))
                .collect(),
            ..Default::default()
        }
    }
}

#[cfg(test)]
#[async_trait]
impl CorpusService for MockCorpus {
    async fn lookup(&self, reference: &str) -> Result<String, CorpusError> {
        self.texts
            .get(reference)
            .cloned()
            .ok_or_else(|| CorpusError::NotFound(reference.to_string()))
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>, CorpusError> {
        if let Ok(mut calls) = self.search_calls.lock() {
            calls.push(query.to_string());
        }
        if self.fail_search {
            return Err(CorpusError::Api("search unavailable".to_string()));
        }
        let needle = query.to_lowercase();
        let mut hits: Vec<SearchHit> = self
            .texts
            .iter()
            .filter(|(_, text)| text.to_lowercase().contains(&needle))
            .map(|(reference, text)| SearchHit {
                reference: reference.clone(),
                snippet: text.clone(),
                title: None,
            })
            .collect();
        hits.sort_by(|a, b| a.reference.cmp(&b.reference));
        hits.truncate(limit);
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_markup() {
        assert_eq!(
            strip_markup("<b>In the</b>  beginning&nbsp;God <i>created</i>").unwrap(),
            "In the beginning God created"
        );
        assert_eq!(strip_markup("a &amp; b").unwrap(), "a & b");
        assert_eq!(strip_markup("<p>one</p><p>two</p>").unwrap(), "one two");
    }

    #[test]
    fn test_strip_markup_keeps_bare_angle_brackets() {
        assert_eq!(
            strip_markup("if 1 < 2 then the verse continues > here").unwrap(),
            "if 1 < 2 then the verse continues > here"
        );
    }

    #[test]
    fn test_flatten_nested_text() {
        let value = serde_json::json!([["one", "<b>two</b>"], "three", 4, [[]]]);
        let mut out = Vec::new();
        flatten_text(&value, &mut out).unwrap();
        assert_eq!(out, vec!["one", "two", "three"]);
    }

    #[tokio::test]
    async fn test_mock_corpus_search() {
        let corpus = MockCorpus::with_texts(&[("A 1", "alpha beta"), ("B 1", "beta gamma")]);
        let hits = corpus.search("beta", 10).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert!(corpus.lookup("C 1").await.is_err());
    }
}
