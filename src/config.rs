//! Configuration for the source sheet services
//!
//! Values come from the environment (optionally a `.env` file). Everything has
//! a default, so a bare environment yields a configuration with detection
//! disabled and identification pointed at local services.

use std::collections::HashMap;
use std::env;
use std::sync::Arc;
use std::time::Duration;

use crate::detect::{CoordinateConvention, DetectionAdapter, HttpDetectionProvider};
use crate::identify::{
    ClassifyProvider, HttpClassifyProvider, HttpCorpusClient, IdentificationPipeline,
    PipelineSettings, Script, DEFAULT_ACCEPT_THRESHOLD,
};

const MIN_TIMEOUT_SECS: u64 = 1;
const MAX_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Clone)]
pub struct Config {
    pub detection: DetectionConfig,
    pub identification: IdentificationConfig,
    pub corpus: CorpusConfig,
    /// Per-attempt bound on every external call
    pub timeout_secs: u64,
}

#[derive(Debug, Clone)]
pub struct DetectionConfig {
    /// Detection is disabled when unset
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    pub model: String,
    pub convention: CoordinateConvention,
}

#[derive(Debug, Clone)]
pub struct IdentificationConfig {
    pub endpoint: Option<String>,
    pub api_keys: Vec<String>,
    pub models: Vec<String>,
    pub script: Script,
    pub accept_threshold: f64,
    pub search_window_chars: usize,
}

#[derive(Debug, Clone)]
pub struct CorpusConfig {
    pub base_url: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            detection: DetectionConfig {
                endpoint: None,
                api_key: None,
                model: "region-detector".to_string(),
                convention: CoordinateConvention::Percent,
            },
            identification: IdentificationConfig {
                endpoint: None,
                api_keys: Vec::new(),
                models: vec!["source-classifier".to_string()],
                script: Script::Hebrew,
                accept_threshold: DEFAULT_ACCEPT_THRESHOLD,
                search_window_chars: 40,
            },
            corpus: CorpusConfig {
                base_url: "http://localhost:8080/api".to_string(),
            },
            timeout_secs: 10,
        }
    }
}

impl Config {
    /// Load from the process environment, reading `.env` first if present
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        let vars: HashMap<String, String> = env::vars().collect();
        Self::from_vars(&vars)
    }

    /// Load from an explicit variable map; unset or unparseable values keep
    /// their defaults
    pub fn from_vars(vars: &HashMap<String, String>) -> Self {
        let defaults = Config::default();
        let get = |key: &str| {
            vars.get(key)
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        let convention = match get("SOURCE_SHEET_DETECT_CONVENTION") {
            Some(value) => value.parse().unwrap_or_else(|e| {
                tracing::warn!(value = %value, error = %e, "Ignoring detection convention");
                defaults.detection.convention
            }),
            None => defaults.detection.convention,
        };
        let script = match get("SOURCE_SHEET_SCRIPT") {
            Some(value) => value.parse().unwrap_or_else(|e| {
                tracing::warn!(value = %value, error = %e, "Ignoring script");
                defaults.identification.script
            }),
            None => defaults.identification.script,
        };
        let models = get("SOURCE_SHEET_IDENTIFY_MODELS")
            .map(|v| split_list(&v))
            .filter(|m| !m.is_empty())
            .unwrap_or(defaults.identification.models);

        Config {
            detection: DetectionConfig {
                endpoint: get("SOURCE_SHEET_DETECT_URL"),
                api_key: get("SOURCE_SHEET_DETECT_API_KEY"),
                model: get("SOURCE_SHEET_DETECT_MODEL").unwrap_or(defaults.detection.model),
                convention,
            },
            identification: IdentificationConfig {
                endpoint: get("SOURCE_SHEET_IDENTIFY_URL"),
                api_keys: get("SOURCE_SHEET_IDENTIFY_API_KEYS")
                    .map(|v| split_list(&v))
                    .unwrap_or_default(),
                models,
                script,
                accept_threshold: get("SOURCE_SHEET_ACCEPT_THRESHOLD")
                    .and_then(|v| v.parse::<f64>().ok())
                    .filter(|t| (0.0..=1.0).contains(t))
                    .unwrap_or(defaults.identification.accept_threshold),
                search_window_chars: get("SOURCE_SHEET_SEARCH_WINDOW")
                    .and_then(|v| v.parse::<usize>().ok())
                    .filter(|w| *w > 0)
                    .unwrap_or(defaults.identification.search_window_chars),
            },
            corpus: CorpusConfig {
                base_url: get("SOURCE_SHEET_CORPUS_URL").unwrap_or(defaults.corpus.base_url),
            },
            timeout_secs: get("SOURCE_SHEET_TIMEOUT_SECS")
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(defaults.timeout_secs)
                .clamp(MIN_TIMEOUT_SECS, MAX_TIMEOUT_SECS),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Detection adapter, or `None` when no detection endpoint is configured
    pub fn detection_adapter(&self) -> Option<DetectionAdapter> {
        let endpoint = self.detection.endpoint.as_deref()?;
        let provider = HttpDetectionProvider::new(
            endpoint,
            self.detection.api_key.as_deref(),
            &self.detection.model,
            self.detection.convention,
        );
        Some(DetectionAdapter::new(Arc::new(provider), self.timeout()))
    }

    /// Ordered (key, model) pairs: every model with the first key, then every
    /// model with the next key
    pub fn credential_pairs(&self) -> Vec<(String, String)> {
        let keys = if self.identification.api_keys.is_empty() {
            vec![String::new()]
        } else {
            self.identification.api_keys.clone()
        };
        keys.iter()
            .flat_map(|key| {
                self.identification
                    .models
                    .iter()
                    .map(move |model| (key.clone(), model.clone()))
            })
            .collect()
    }

    /// Classify providers in rotation order; empty without an endpoint
    pub fn classify_providers(&self) -> Vec<Arc<dyn ClassifyProvider>> {
        let Some(endpoint) = self.identification.endpoint.as_deref() else {
            return Vec::new();
        };
        let per_key = self.identification.models.len().max(1);
        self.credential_pairs()
            .into_iter()
            .enumerate()
            .map(|(i, (key, model))| {
                // Same model under different keys must stay distinguishable in logs
                let label = format!("{}#k{}", model, i / per_key + 1);
                Arc::new(HttpClassifyProvider::new(endpoint, &key, &model).with_label(label))
                    as Arc<dyn ClassifyProvider>
            })
            .collect()
    }

    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            accept_threshold: self.identification.accept_threshold,
            attempt_timeout: self.timeout(),
            search_window_chars: self.identification.search_window_chars,
            script: self.identification.script,
            ..Default::default()
        }
    }

    pub fn identification_pipeline(&self) -> IdentificationPipeline {
        IdentificationPipeline::new(
            self.classify_providers(),
            Arc::new(HttpCorpusClient::new(&self.corpus.base_url)),
            self.pipeline_settings(),
        )
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
