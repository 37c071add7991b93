//! # LLM Client Module
//!
//! Wraps an OpenAI-compatible chat-completion API behind the [`Complete`]
//! trait, so the pipeline can be driven by the real client, a rate-limited
//! wrapper, or a mock in tests.
//!
//! ## Key Components
//!
//! - `AnalysisRequest`: prompt plus model settings, built fresh per call
//! - `ChatClient`: reqwest implementation with client-side key validation
//! - `RateLimitedClient`: `governor` wrapper spacing calls out
//! - `LlmError`: classified failures
//!
//! Structured output is requested with `response_format: json_object` but is
//! advisory; callers still run the text through the response parser.

mod error;
#[cfg(test)]
pub(crate) mod mock;
mod ratelimited;
mod types;

pub use error::{DEFAULT_RETRY_AFTER_SECS, LlmError};
pub use ratelimited::RateLimitedClient;
pub use types::{ChatMessage, ChatRequest, ChatResponse, ResponseFormat};

use std::future::Future;
use std::time::Duration;

use reqwest::Client as ReqwestClient;
use tracing::{debug, error, instrument};

use crate::config::{API_KEY_PREFIX, AnalyzerConfig};
use types::ApiErrorBody;

/// One model call
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisRequest {
    /// User prompt
    pub prompt: String,

    /// Optional system instruction
    pub system: Option<String>,

    /// Ask the provider for JSON-only output
    pub require_structured_output: bool,

    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl AnalysisRequest {
    /// Build a plain-text request using the configured model settings
    pub fn new(config: &AnalyzerConfig, prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            system: None,
            require_structured_output: false,
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        }
    }

    /// Request JSON-only output
    pub fn structured(mut self) -> Self {
        self.require_structured_output = true;
        self
    }

    /// Attach a system instruction
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    fn into_chat_request(self) -> ChatRequest {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = self.system {
            messages.push(ChatMessage::system(system));
        }
        messages.push(ChatMessage::user(self.prompt));
        ChatRequest {
            model: self.model,
            messages,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            response_format: self
                .require_structured_output
                .then(ResponseFormat::json_object),
        }
    }
}

/// Something that can complete a prompt
pub trait Complete: Send + Sync {
    /// Run one completion and return the raw response text
    fn complete(
        &self,
        request: AnalysisRequest,
    ) -> impl Future<Output = Result<String, LlmError>> + Send;
}

/// Check the key's minimal shape before any network call
pub fn validate_api_key(api_key: &str) -> Result<(), LlmError> {
    let api_key = api_key.trim();
    if api_key.is_empty() {
        return Err(LlmError::Auth("API key is not configured".to_string()));
    }
    if !api_key.starts_with(API_KEY_PREFIX) || api_key.len() <= API_KEY_PREFIX.len() {
        return Err(LlmError::Auth(format!(
            "API key should start with '{}'",
            API_KEY_PREFIX
        )));
    }
    Ok(())
}

/// Chat-completion client for OpenAI-compatible providers
#[derive(Clone)]
pub struct ChatClient {
    client: ReqwestClient,
    base_url: String,
    api_key: String,
}

impl std::fmt::Debug for ChatClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatClient")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

impl ChatClient {
    /// Create a client from the analyzer configuration
    pub fn new(config: &AnalyzerConfig) -> Result<Self, LlmError> {
        Self::with_timeout(&config.base_url, &config.api_key, config.llm_timeout)
    }

    /// Create a client for a given endpoint
    pub fn with_timeout(
        base_url: &str,
        api_key: &str,
        timeout: Duration,
    ) -> Result<Self, LlmError> {
        let client = ReqwestClient::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LlmError::Unknown(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.trim().to_string(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

impl Complete for ChatClient {
    #[instrument(skip(self, request), fields(model = %request.model, structured = request.require_structured_output))]
    async fn complete(&self, request: AnalysisRequest) -> Result<String, LlmError> {
        validate_api_key(&self.api_key)?;

        let body = request.into_chat_request();
        debug!("Sending chat completion with {} messages", body.messages.len());

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|h| h.to_str().ok())
            .and_then(|s| s.trim().parse::<u64>().ok());
        let text = response.text().await?;

        if status.is_success() {
            let parsed: ChatResponse = serde_json::from_str(&text).map_err(|e| {
                error!("Failed to parse completion response: {}", e);
                LlmError::Unknown(format!("unparseable completion response: {}", e))
            })?;
            return parsed
                .into_text()
                .ok_or_else(|| LlmError::Unknown("response contained no choices".to_string()));
        }

        error!("LLM API error: {} - {}", status, text);
        let detail = serde_json::from_str::<ApiErrorBody>(&text)
            .map(|body| body.error)
            .unwrap_or_default();
        let message = if detail.message.is_empty() {
            text.clone()
        } else {
            detail.message.clone()
        };
        Err(LlmError::from_response(
            status.as_u16(),
            &message,
            detail.code_str().as_deref(),
            detail.kind.as_deref(),
            retry_after,
        ))
    }
}
