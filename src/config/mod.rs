//! Configuration system (layered: defaults > TOML file > env > code).

use std::fmt;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{BatonError, Result};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Engine and endpoint configuration.
///
/// Resolution order:
/// 1. [`BatonConfig::default`]
/// 2. A TOML file ([`BatonConfig::load`] / [`BatonConfig::from_toml_str`])
/// 3. Environment variables ([`BatonConfig::apply_env`]), `.env` included
/// 4. `with_*` setters in code
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct BatonConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub default_model: String,
    pub request_timeout_secs: u64,
    /// Attempts for non-streaming requests, including the first.
    pub max_retries: u32,
    pub retry_initial_backoff_ms: u64,
    /// Sliding window applied to history before it is sent.
    pub max_history_messages: usize,
    /// Optional token budget for the window (rough chars/3 estimate).
    pub max_context_tokens: Option<u32>,
    pub max_steps: usize,
    pub default_temperature: f64,
    pub default_max_tokens: u32,
    /// Step budget for a delegated worker agent.
    pub worker_max_steps: usize,
}

impl Default for BatonConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            default_model: DEFAULT_MODEL.to_string(),
            request_timeout_secs: 600,
            max_retries: 3,
            retry_initial_backoff_ms: 1000,
            max_history_messages: 10,
            max_context_tokens: None,
            max_steps: 15,
            default_temperature: 0.7,
            default_max_tokens: 2048,
            worker_max_steps: 5,
        }
    }
}

impl fmt::Debug for BatonConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatonConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| ".."))
            .field("base_url", &self.base_url)
            .field("default_model", &self.default_model)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("max_retries", &self.max_retries)
            .field("max_history_messages", &self.max_history_messages)
            .field("max_steps", &self.max_steps)
            .finish_non_exhaustive()
    }
}

impl BatonConfig {
    /// Parse a TOML document. Missing keys keep their defaults.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        toml::from_str(raw).map_err(|e| BatonError::Configuration(format!("invalid config: {e}")))
    }

    /// Load a TOML config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&raw)
    }

    /// Defaults overridden by environment variables (and `.env`, if present).
    pub fn from_env() -> Self {
        Self::default().apply_env()
    }

    /// Override fields from environment variables.
    pub fn apply_env(mut self) -> Self {
        let _ = dotenvy::dotenv(); // load .env if present, ignore error

        if let Some(key) = env_first(&["BATON_API_KEY", "OPENAI_API_KEY"]) {
            self.api_key = Some(key);
        }
        if let Some(url) = env_first(&["BATON_BASE_URL", "OPENAI_BASE_URL"]) {
            self.base_url = url;
        }
        if let Some(model) = env_first(&["BATON_MODEL"]) {
            self.default_model = model;
        }
        if let Some(secs) = env_parsed("BATON_TIMEOUT_SECS") {
            self.request_timeout_secs = secs;
        }
        if let Some(retries) = env_parsed("BATON_MAX_RETRIES") {
            self.max_retries = retries;
        }
        if let Some(window) = env_parsed("BATON_MAX_HISTORY") {
            self.max_history_messages = window;
        }
        if let Some(steps) = env_parsed("BATON_MAX_STEPS") {
            self.max_steps = steps;
        }
        self
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn with_default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout_secs = timeout.as_secs().max(1);
        self
    }

    pub fn with_max_retries(mut self, attempts: u32) -> Self {
        self.max_retries = attempts;
        self
    }

    pub fn with_retry_initial_backoff(mut self, backoff: Duration) -> Self {
        self.retry_initial_backoff_ms = backoff.as_millis() as u64;
        self
    }

    pub fn with_max_history_messages(mut self, window: usize) -> Self {
        self.max_history_messages = window;
        self
    }

    pub fn with_max_context_tokens(mut self, tokens: u32) -> Self {
        self.max_context_tokens = Some(tokens);
        self
    }

    pub fn with_max_steps(mut self, steps: usize) -> Self {
        self.max_steps = steps;
        self
    }

    pub fn with_worker_max_steps(mut self, steps: usize) -> Self {
        self.worker_max_steps = steps;
        self
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn retry_initial_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_initial_backoff_ms)
    }

    /// Check values that would make every request fail.
    pub fn validate(&self) -> Result<()> {
        match self.api_key.as_deref() {
            Some(key) if !key.trim().is_empty() => {}
            _ => {
                return Err(BatonError::Configuration(
                    "missing API key (set BATON_API_KEY or OPENAI_API_KEY)".to_string(),
                ))
            }
        }
        if self.base_url.trim().is_empty() {
            return Err(BatonError::Configuration("base_url is empty".to_string()));
        }
        if self.max_steps == 0 {
            return Err(BatonError::Configuration(
                "max_steps must be at least 1".to_string(),
            ));
        }
        if self.max_history_messages == 0 {
            return Err(BatonError::Configuration(
                "max_history_messages must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

fn env_first(names: &[&str]) -> Option<String> {
    names
        .iter()
        .filter_map(|name| std::env::var(name).ok())
        .find(|value| !value.trim().is_empty())
}

fn env_parsed<T: std::str::FromStr>(name: &str) -> Option<T> {
    let raw = std::env::var(name).ok()?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(var = name, value = %raw, "ignoring unparseable env override");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_follow_engine_expectations() {
        let config = BatonConfig::default();
        assert_eq!(config.max_steps, 15);
        assert_eq!(config.max_history_messages, 10);
        assert_eq!(config.request_timeout(), Duration::from_secs(600));
        assert_eq!(config.retry_initial_backoff(), Duration::from_secs(1));
    }

    #[test]
    fn toml_overrides_only_named_keys() {
        let config = BatonConfig::from_toml_str(
            r#"
            api_key = "sk-test"
            max_steps = 4
            "#,
        )
        .unwrap();
        assert_eq!(config.api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.max_steps, 4);
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn invalid_toml_is_a_configuration_error() {
        let err = BatonConfig::from_toml_str("max_steps = \"many\"").unwrap_err();
        assert!(matches!(err, BatonError::Configuration(_)));
    }

    #[test]
    fn validate_requires_api_key() {
        let err = BatonConfig::default().validate().unwrap_err();
        assert!(err.to_string().contains("API key"));
        assert!(BatonConfig::default().with_api_key("k").validate().is_ok());
    }

    #[test]
    fn validate_rejects_zero_step_budget() {
        let config = BatonConfig::default().with_api_key("k").with_max_steps(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn debug_output_hides_api_key() {
        let config = BatonConfig::default().with_api_key("sk-secret");
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("sk-secret"));
    }
}
