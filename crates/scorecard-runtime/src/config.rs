//! Runtime configuration.
//!
//! Values are layered: built-in defaults, then an optional YAML/JSON file,
//! then `SCORECARD_*` environment variables. The CLI applies its flags last.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use scorecard_core::{WeightTable, DEFAULT_EVIDENCE_K, DEFAULT_EVIDENCE_TOKEN_BUDGET};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;

use crate::providers::{ApiCredential, CompletionConfig, API_KEY_ENV};

/// Environment override for the endpoint URL.
pub const ENDPOINT_ENV: &str = "SCORECARD_ENDPOINT";
/// Environment override for the model identifier.
pub const MODEL_ENV: &str = "SCORECARD_MODEL";
/// Environment override for the concurrency ceiling.
pub const CONCURRENCY_ENV: &str = "SCORECARD_CONCURRENCY";
/// Environment override for the request timeout (humantime, e.g. `90s`).
pub const TIMEOUT_ENV: &str = "SCORECARD_TIMEOUT";

const CREDENTIAL_NAME: &str = "Scoring API key";
const API_KEY_FIELD: &str = "api_key";

/// Persona that opens every instruction turn.
pub const DEFAULT_PERSONA: &str = "你是一位中国高校创新创业大赛评委。";

/// Errors from loading or validating configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse YAML config: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON config: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid value for {key}: {message}")]
    InvalidEnv { key: String, message: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Everything a scoring run can be tuned with.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Chat-completions endpoint URL
    pub endpoint: String,

    /// Model identifier
    pub model: String,

    /// Sampling temperature; 0 keeps verdicts reproducible
    pub temperature: f32,

    /// Maximum simultaneously outstanding oracle requests
    pub concurrency: usize,

    /// Candidate sentences per criterion
    pub evidence_k: usize,

    /// Token budget of one evidence bundle
    pub evidence_token_budget: usize,

    /// Wall-clock ceiling for one oracle request
    #[serde(with = "humantime_duration")]
    pub request_timeout: Duration,

    /// Completion token cap; provider default when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Persona line of the instruction turn
    pub persona: String,

    /// Dimension weights
    pub weights: WeightTable,

    /// Resolved endpoint key; read from `api_key` or `SCORECARD_API_KEY`
    #[serde(skip)]
    pub credential: Option<Arc<ApiCredential>>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.deepseek.com/v1/chat/completions".to_string(),
            model: "deepseek-chat".to_string(),
            temperature: 0.0,
            concurrency: 6,
            evidence_k: DEFAULT_EVIDENCE_K,
            evidence_token_budget: DEFAULT_EVIDENCE_TOKEN_BUDGET,
            request_timeout: Duration::from_secs(120),
            max_tokens: None,
            persona: DEFAULT_PERSONA.to_string(),
            weights: WeightTable::default(),
            credential: None,
        }
    }
}

impl RuntimeConfig {
    /// Parse a YAML config. JSON is accepted too, being a YAML subset.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let mut config: RuntimeConfig = serde_yaml::from_str(yaml)?;
        let raw: JsonValue = serde_yaml::from_str(yaml)?;
        config.attach_file_credential(&raw);
        Ok(config)
    }

    /// Parse a JSON config.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let mut config: RuntimeConfig = serde_json::from_str(json)?;
        let raw: JsonValue = serde_json::from_str(json)?;
        config.attach_file_credential(&raw);
        Ok(config)
    }

    /// Load a config file; `.json` is read as JSON, anything else as YAML.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json(&contents),
            _ => Self::from_yaml(&contents),
        }
    }

    fn attach_file_credential(&mut self, raw: &JsonValue) {
        self.credential = resolve_credential(raw, |_| None).or(self.credential.take());
    }

    /// Apply `SCORECARD_*` environment overrides.
    pub fn apply_env(self) -> Result<Self, ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary variable lookup.
    pub fn apply_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(endpoint) = lookup(ENDPOINT_ENV) {
            self.endpoint = endpoint;
        }
        if let Some(model) = lookup(MODEL_ENV) {
            self.model = model;
        }
        if let Some(raw) = lookup(CONCURRENCY_ENV) {
            self.concurrency = raw.trim().parse().map_err(|e| ConfigError::InvalidEnv {
                key: CONCURRENCY_ENV.to_string(),
                message: format!("{} ({})", raw, e),
            })?;
        }
        if let Some(raw) = lookup(TIMEOUT_ENV) {
            self.request_timeout =
                humantime::parse_duration(raw.trim()).map_err(|e| ConfigError::InvalidEnv {
                    key: TIMEOUT_ENV.to_string(),
                    message: format!("{} ({})", raw, e),
                })?;
        }
        if self.credential.is_none() {
            self.credential = resolve_credential(&JsonValue::Null, lookup);
        }
        Ok(self)
    }

    /// Check every field for a usable value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.concurrency == 0 {
            return Err(ConfigError::Invalid(
                "concurrency must be at least 1".to_string(),
            ));
        }
        if !self.endpoint.starts_with("http://") && !self.endpoint.starts_with("https://") {
            return Err(ConfigError::Invalid(format!(
                "endpoint must start with http:// or https://, got '{}'",
                self.endpoint
            )));
        }
        if self.model.trim().is_empty() {
            return Err(ConfigError::Invalid("model must not be empty".to_string()));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::Invalid(format!(
                "temperature must be within [0, 2], got {}",
                self.temperature
            )));
        }
        if self.request_timeout.is_zero() {
            return Err(ConfigError::Invalid(
                "request_timeout must be positive".to_string(),
            ));
        }
        self.weights
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        Ok(())
    }

    /// Per-request settings handed to the provider.
    pub fn completion_config(&self) -> CompletionConfig {
        CompletionConfig {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            timeout: self.request_timeout,
        }
    }
}

/// A missing key is not an error here; the orchestrator reports it when a
/// provider actually needs one.
fn resolve_credential<F>(raw: &JsonValue, lookup: F) -> Option<Arc<ApiCredential>>
where
    F: Fn(&str) -> Option<String>,
{
    ApiCredential::from_config_or_lookup(raw, API_KEY_FIELD, API_KEY_ENV, CREDENTIAL_NAME, lookup)
        .ok()
        .map(Arc::new)
}

mod humantime_duration {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&humantime::format_duration(*value).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(deserializer)?;
        humantime::parse_duration(&raw).map_err(serde::de::Error::custom)
    }
}
