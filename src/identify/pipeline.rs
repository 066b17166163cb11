//! Identification Pipeline
//!
//! Strategy chain for one cropped region:
//!
//! 1. Classify with each configured provider in order until one answers with a
//!    parseable candidate list.
//! 2. Verify every proposed reference against canonical corpus text and drop
//!    anything under the acceptance threshold.
//! 3. If nothing survived, search the corpus with windows of the recognized
//!    text and verify those hits the same way.
//! 4. Otherwise report the region as unidentified.
//!
//! The pipeline is stateless per call and never touches the region store.

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use super::corpus::CorpusService;
use super::provider::ClassifyProvider;
use super::types::{
    Candidate, ClassifyResponse, CorpusError, IdentifyOutcome, ProviderError, RawCandidate,
    SearchHit, StrategySource,
};
use super::verify::{verification_score, Script, TextNormalizer};

/// Default minimum verification score
pub const DEFAULT_ACCEPT_THRESHOLD: f64 = 0.3;

/// Pipeline tuning
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Candidates scoring below this are discarded
    pub accept_threshold: f64,
    /// Bound on each provider attempt and each corpus call
    pub attempt_timeout: Duration,
    /// Maximum characters per full-text search window
    pub search_window_chars: usize,
    /// Maximum hits requested per search
    pub search_limit: usize,
    pub script: Script,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            accept_threshold: DEFAULT_ACCEPT_THRESHOLD,
            attempt_timeout: Duration::from_secs(10),
            search_window_chars: 40,
            search_limit: 10,
            script: Script::default(),
        }
    }
}

/// Identification pipeline over an ordered provider list and a corpus
pub struct IdentificationPipeline {
    providers: Vec<Arc<dyn ClassifyProvider>>,
    corpus: Arc<dyn CorpusService>,
    settings: PipelineSettings,
    normalizer: TextNormalizer,
}

impl IdentificationPipeline {
    pub fn new(
        providers: Vec<Arc<dyn ClassifyProvider>>,
        corpus: Arc<dyn CorpusService>,
        settings: PipelineSettings,
    ) -> Self {
        let normalizer = TextNormalizer::new(settings.script);
        Self {
            providers,
            corpus,
            settings,
            normalizer,
        }
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Identify a PNG-encoded region. Never fails.
    pub async fn identify(&self, image_png: &[u8], recognized_text: Option<&str>) -> IdentifyOutcome {
        let recognized = recognized_text
            .map(str::trim)
            .filter(|t| !t.is_empty());

        let classified = self.classify(image_png, recognized).await;

        // Without OCR text, verify against what the classifier read
        let input_text = recognized
            .map(str::to_string)
            .or_else(|| {
                classified.as_ref().and_then(|(_, response)| {
                    response
                        .candidates
                        .iter()
                        .filter_map(|c| c.preview_text.as_deref())
                        .map(str::trim)
                        .find(|t| !t.is_empty())
                        .map(str::to_string)
                })
            })
            .unwrap_or_default();
        let normalized_input = self.normalizer.normalize(&input_text);

        if let Some((provider, response)) = classified {
            let accepted = self
                .verify_classified(&provider, response.candidates, &normalized_input)
                .await;
            if !accepted.is_empty() {
                return IdentifyOutcome::Identified {
                    candidates: accepted,
                };
            }
        }

        if !normalized_input.is_empty() {
            let accepted = self.search_fallback(&input_text, &normalized_input).await;
            if !accepted.is_empty() {
                return IdentifyOutcome::Identified {
                    candidates: accepted,
                };
            }
        }

        tracing::info!("No verified candidates, region left unidentified");
        IdentifyOutcome::Unidentified {
            recognized_text: input_text,
        }
    }

    // ========================================================================
    // Primary strategy
    // ========================================================================

    /// First parseable response, paired with the provider that produced it
    async fn classify(
        &self,
        image_png: &[u8],
        hint: Option<&str>,
    ) -> Option<(String, ClassifyResponse)> {
        for provider in &self.providers {
            let attempt = tokio::time::timeout(
                self.settings.attempt_timeout,
                provider.classify(image_png, hint),
            )
            .await
            .unwrap_or_else(|_| Err(ProviderError::Timeout(self.settings.attempt_timeout.as_secs())));

            match attempt {
                Ok(response) => {
                    tracing::debug!(
                        provider = provider.name(),
                        candidates = response.candidates.len(),
                        "Classifier answered"
                    );
                    return Some((provider.name().to_string(), response));
                }
                Err(e) if e.is_rotation_signal() => {
                    tracing::warn!(provider = provider.name(), error = %e, "Provider unavailable, rotating");
                }
                Err(e) => {
                    tracing::warn!(provider = provider.name(), error = %e, "Provider attempt failed");
                }
            }
        }

        if !self.providers.is_empty() {
            tracing::warn!(
                attempts = self.providers.len(),
                "All classify providers failed"
            );
        }
        None
    }

    async fn verify_classified(
        &self,
        provider: &str,
        candidates: Vec<RawCandidate>,
        normalized_input: &str,
    ) -> Vec<Candidate> {
        let mut seen = HashSet::new();
        let mut accepted = Vec::new();

        for raw in candidates {
            let Some(reference) = raw
                .corpus_reference
                .as_deref()
                .map(str::trim)
                .filter(|r| !r.is_empty())
                .map(str::to_string)
            else {
                tracing::debug!(source = %raw.source_name, "Candidate without a reference skipped");
                continue;
            };
            if !seen.insert(reference.clone()) {
                continue;
            }

            let canonical = match self.bounded(self.corpus.lookup(&reference)).await {
                Ok(text) => text,
                Err(e) => {
                    tracing::info!(reference = %reference, error = %e, "Canonical text unavailable, candidate dropped");
                    continue;
                }
            };

            let Some(score) = self.accept(&reference, normalized_input, &canonical) else {
                continue;
            };

            let display_name = if raw.source_name.trim().is_empty() {
                reference.clone()
            } else {
                raw.source_name.trim().to_string()
            };
            accepted.push(Candidate {
                display_name,
                preview_text: raw
                    .preview_text
                    .filter(|t| !t.trim().is_empty())
                    .unwrap_or(canonical),
                corpus_reference: reference,
                strategy_source: StrategySource::Classifier {
                    provider: provider.to_string(),
                },
                score,
            });
        }
        accepted
    }

    // ========================================================================
    // Fallback strategy
    // ========================================================================

    async fn search_fallback(&self, input_text: &str, normalized_input: &str) -> Vec<Candidate> {
        let Some((query, hits)) = self.first_search_hits(input_text).await else {
            return Vec::new();
        };

        let mut seen = HashSet::new();
        let mut accepted = Vec::new();
        for hit in hits {
            let reference = hit.reference.trim().to_string();
            if reference.is_empty() || !seen.insert(reference.clone()) {
                continue;
            }

            let canonical = match self.bounded(self.corpus.lookup(&reference)).await {
                Ok(text) => text,
                Err(e) => {
                    tracing::debug!(reference = %reference, error = %e, "Scoring search hit against its snippet");
                    hit.snippet.clone()
                }
            };

            let Some(score) = self.accept(&reference, normalized_input, &canonical) else {
                continue;
            };

            accepted.push(Candidate {
                display_name: hit
                    .title
                    .filter(|t| !t.trim().is_empty())
                    .unwrap_or_else(|| reference.clone()),
                corpus_reference: reference,
                preview_text: hit.snippet,
                strategy_source: StrategySource::FullTextSearch {
                    query: query.clone(),
                },
                score,
            });
        }
        accepted
    }

    /// Search successive windows until one returns hits
    async fn first_search_hits(&self, input_text: &str) -> Option<(String, Vec<SearchHit>)> {
        for query in search_windows(input_text, self.settings.search_window_chars) {
            match self
                .bounded(self.corpus.search(&query, self.settings.search_limit))
                .await
            {
                Ok(hits) if !hits.is_empty() => return Some((query, hits)),
                Ok(_) => {
                    tracing::debug!(query = %query, "Search window returned no hits");
                }
                Err(e) => {
                    tracing::warn!(query = %query, error = %e, "Corpus search failed");
                }
            }
        }
        None
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    fn accept(&self, reference: &str, normalized_input: &str, canonical: &str) -> Option<f64> {
        let score = verification_score(normalized_input, &self.normalizer.normalize(canonical));
        if score < self.settings.accept_threshold {
            tracing::info!(
                reference = %reference,
                score,
                threshold = self.settings.accept_threshold,
                "Candidate rejected by verification"
            );
            return None;
        }
        Some(score)
    }

    async fn bounded<T>(
        &self,
        call: impl Future<Output = Result<T, CorpusError>>,
    ) -> Result<T, CorpusError> {
        tokio::time::timeout(self.settings.attempt_timeout, call)
            .await
            .unwrap_or_else(|_| Err(CorpusError::Timeout(self.settings.attempt_timeout.as_secs())))
    }
}

/// Leading, middle and trailing windows of at most `max_chars` characters,
/// cut on word boundaries. Text that fits in one window is returned whole.
pub(crate) fn search_windows(text: &str, max_chars: usize) -> Vec<String> {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.is_empty() {
        return Vec::new();
    }
    let joined = words.join(" ");
    let total = joined.chars().count();
    if total <= max_chars {
        return vec![joined];
    }

    // Character offset of each word in the joined text
    let mut offsets = Vec::with_capacity(words.len());
    let mut offset = 0;
    for word in &words {
        offsets.push(offset);
        offset += word.chars().count() + 1;
    }

    let last_start = (0..words.len())
        .rev()
        .take_while(|&i| total - offsets[i] <= max_chars)
        .last()
        .unwrap_or(words.len() - 1);
    let middle_target = (total - max_chars) / 2;
    let middle_start = offsets
        .iter()
        .position(|&o| o >= middle_target)
        .unwrap_or(0);

    let mut windows: Vec<String> = Vec::with_capacity(3);
    for start in [0, middle_start, last_start] {
        let window = window_from(&words[start..], max_chars);
        if !windows.contains(&window) {
            windows.push(window);
        }
    }
    windows
}

/// Words from the front of `words` joined up to `max_chars`, at least one word
fn window_from(words: &[&str], max_chars: usize) -> String {
    let mut out = String::new();
    let mut len = 0;
    for word in words {
        let word_len = word.chars().count();
        if len > 0 && len + 1 + word_len > max_chars {
            break;
        }
        if len > 0 {
            out.push(' ');
            len += 1;
        }
        out.push_str(word);
        len += word_len;
    }
    out
}
