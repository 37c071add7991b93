//! # Analyzer Configuration Module
//!
//! Every option the pipeline reads lives in [`AnalyzerConfig`], which is
//! passed explicitly into each component's constructor. There is no shared
//! global settings object.
//!
//! ## Sources
//!
//! - `AnalyzerConfig::default()` for sensible defaults
//! - `AnalyzerConfig::from_env()` to layer `TASKLENS_*` environment variables
//! - `AnalyzerConfigBuilder` for programmatic overrides (the CLI uses this)

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::fetch::FetchConfig;
use crate::llm::validate_api_key;

/// Prefix every accepted API key starts with
pub const API_KEY_PREFIX: &str = "sk-";

/// Configuration for the task analysis pipeline
#[derive(Debug, Clone)]
pub struct AnalyzerConfig {
    /// API key for the chat-completion provider
    pub api_key: String,

    /// Model name sent with every request
    pub model: String,

    /// Base URL of the OpenAI-compatible API (without `/chat/completions`)
    pub base_url: String,

    /// Maximum tokens per completion
    pub max_tokens: u32,

    /// Sampling temperature
    pub temperature: f32,

    /// How long a cached summary stays valid
    pub cache_ttl: Duration,

    /// Whether summaries are cached at all
    pub cache_enabled: bool,

    /// Optional file the cache is persisted to between runs
    pub cache_path: Option<PathBuf>,

    /// Whether URL summaries are tailored to the task that references them
    pub context_sensitive_summaries: bool,

    /// Client-side limit on LLM requests per minute
    pub requests_per_minute: u32,

    /// Timeout for a single LLM call
    pub llm_timeout: Duration,

    /// Upper bound on extracted characters sent for summarisation
    pub max_content_chars: usize,

    /// Outbound HTTP settings for content extraction
    pub fetch: FetchConfig,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: "gpt-4o-mini".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            max_tokens: 1000,
            temperature: 0.3,
            cache_ttl: Duration::from_secs(24 * 60 * 60),
            cache_enabled: true,
            cache_path: None,
            context_sensitive_summaries: false,
            requests_per_minute: 60,
            llm_timeout: Duration::from_secs(60),
            max_content_chars: 6000,
            fetch: FetchConfig::default(),
        }
    }
}

impl AnalyzerConfig {
    /// Create a new builder
    pub fn builder() -> AnalyzerConfigBuilder {
        AnalyzerConfigBuilder::new()
    }

    /// Defaults overridden by `TASKLENS_*` environment variables.
    ///
    /// The API key is read from `TASKLENS_API_KEY`, falling back to
    /// `OPENAI_API_KEY`. A malformed numeric value is a configuration error
    /// rather than being silently ignored.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(key) = lookup("TASKLENS_API_KEY").or_else(|| lookup("OPENAI_API_KEY")) {
            config.api_key = key.trim().to_string();
        }
        if let Some(model) = lookup("TASKLENS_MODEL") {
            config.model = model;
        }
        if let Some(base_url) = lookup("TASKLENS_BASE_URL") {
            config.base_url = base_url.trim_end_matches('/').to_string();
        }
        if let Some(value) = lookup("TASKLENS_MAX_TOKENS") {
            config.max_tokens = parse_value("TASKLENS_MAX_TOKENS", &value)?;
        }
        if let Some(value) = lookup("TASKLENS_TEMPERATURE") {
            config.temperature = parse_value("TASKLENS_TEMPERATURE", &value)?;
        }
        if let Some(value) = lookup("TASKLENS_CACHE_TTL_SECS") {
            config.cache_ttl =
                Duration::from_secs(parse_value("TASKLENS_CACHE_TTL_SECS", &value)?);
        }
        if let Some(value) = lookup("TASKLENS_CACHE_ENABLED") {
            config.cache_enabled = parse_value("TASKLENS_CACHE_ENABLED", &value)?;
        }
        if let Some(path) = lookup("TASKLENS_CACHE_PATH") {
            config.cache_path = Some(PathBuf::from(path));
        }
        if let Some(value) = lookup("TASKLENS_REQUESTS_PER_MINUTE") {
            config.requests_per_minute = parse_value("TASKLENS_REQUESTS_PER_MINUTE", &value)?;
        }

        Ok(config)
    }

    /// Check the values a run cannot start without, API key first
    pub fn validate(&self) -> Result<()> {
        validate_api_key(&self.api_key)?;
        if self.model.trim().is_empty() {
            return Err(Error::Config("model must not be empty".to_string()));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(Error::Config(format!(
                "temperature {} is outside 0.0..=2.0",
                self.temperature
            )));
        }
        if self.max_tokens == 0 {
            return Err(Error::Config("max_tokens must be positive".to_string()));
        }
        if self.requests_per_minute == 0 {
            return Err(Error::Config(
                "requests_per_minute must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_value<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::Config(format!("invalid value for {}: '{}'", name, value)))
}

/// Builder for AnalyzerConfig
#[derive(Debug, Default)]
pub struct AnalyzerConfigBuilder {
    config: AnalyzerConfig,
}

impl AnalyzerConfigBuilder {
    /// Create a new builder with default configuration
    pub fn new() -> Self {
        Self {
            config: AnalyzerConfig::default(),
        }
    }

    /// Start from an existing configuration
    pub fn from_config(config: AnalyzerConfig) -> Self {
        Self { config }
    }

    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.config.api_key = api_key.into();
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.config.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.config.max_tokens = max_tokens;
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.config.temperature = temperature;
        self
    }

    pub fn cache_ttl(mut self, cache_ttl: Duration) -> Self {
        self.config.cache_ttl = cache_ttl;
        self
    }

    pub fn cache_enabled(mut self, cache_enabled: bool) -> Self {
        self.config.cache_enabled = cache_enabled;
        self
    }

    pub fn cache_path(mut self, cache_path: impl Into<PathBuf>) -> Self {
        self.config.cache_path = Some(cache_path.into());
        self
    }

    pub fn context_sensitive_summaries(mut self, enabled: bool) -> Self {
        self.config.context_sensitive_summaries = enabled;
        self
    }

    pub fn requests_per_minute(mut self, requests_per_minute: u32) -> Self {
        self.config.requests_per_minute = requests_per_minute;
        self
    }

    pub fn llm_timeout(mut self, llm_timeout: Duration) -> Self {
        self.config.llm_timeout = llm_timeout;
        self
    }

    pub fn max_content_chars(mut self, max_content_chars: usize) -> Self {
        self.config.max_content_chars = max_content_chars;
        self
    }

    pub fn fetch(mut self, fetch: FetchConfig) -> Self {
        self.config.fetch = fetch;
        self
    }

    /// Build the configuration
    pub fn build(self) -> AnalyzerConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::LlmError;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = AnalyzerConfig::default();
        assert_eq!(config.max_tokens, 1000);
        assert!(config.cache_enabled);
        assert_eq!(config.cache_ttl, Duration::from_secs(86_400));
        assert!(config.cache_path.is_none());
    }

    #[test]
    fn test_validation_requires_api_key() {
        let missing = AnalyzerConfig::default();
        assert!(matches!(missing.validate(), Err(Error::Llm(LlmError::Auth(_)))));

        let malformed = AnalyzerConfig::builder().api_key("not-a-key").build();
        assert!(matches!(malformed.validate(), Err(Error::Llm(LlmError::Auth(_)))));

        let valid = AnalyzerConfig::builder().api_key("sk-test").build();
        assert!(valid.validate().is_ok());
    }

    #[test]
    fn test_env_overrides() {
        let config = AnalyzerConfig::from_lookup(lookup_from(&[
            ("OPENAI_API_KEY", " sk-fallback "),
            ("TASKLENS_MODEL", "gpt-4o"),
            ("TASKLENS_BASE_URL", "http://localhost:9000/v1/"),
            ("TASKLENS_CACHE_TTL_SECS", "60"),
            ("TASKLENS_CACHE_ENABLED", "false"),
        ]))
        .unwrap();

        assert_eq!(config.api_key, "sk-fallback");
        assert_eq!(config.model, "gpt-4o");
        assert_eq!(config.base_url, "http://localhost:9000/v1");
        assert_eq!(config.cache_ttl, Duration::from_secs(60));
        assert!(!config.cache_enabled);
    }

    #[test]
    fn test_primary_key_wins_over_fallback() {
        let config = AnalyzerConfig::from_lookup(lookup_from(&[
            ("TASKLENS_API_KEY", "sk-primary"),
            ("OPENAI_API_KEY", "sk-fallback"),
        ]))
        .unwrap();
        assert_eq!(config.api_key, "sk-primary");
    }

    #[test]
    fn test_malformed_number_is_an_error() {
        let result =
            AnalyzerConfig::from_lookup(lookup_from(&[("TASKLENS_MAX_TOKENS", "lots")]));
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_builder_and_validation() {
        let config = AnalyzerConfig::builder()
            .api_key("sk-test")
            .model("test-model")
            .temperature(3.5)
            .build();
        assert_eq!(config.model, "test-model");
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }
}
