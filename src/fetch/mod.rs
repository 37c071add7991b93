//! # HTTP Fetch Module
//!
//! Outbound HTTP for the extraction cascade. Every request resolves to a
//! [`FetchOutcome`]: success (possibly with an empty body), client error,
//! server error, or network error. None of these are Rust errors, so an
//! extractor can inspect the outcome and hand over to the next strategy.
//!
//! ## Key Components
//!
//! - `Fetch`: the seam the extractors are generic over
//! - `HttpFetcher`: reqwest-backed implementation with explicit timeouts
//! - `validate_url`: scheme/host check run before any network call
//!
//! No retries happen here. A 5xx is reported once and the caller decides.

mod config;
mod error;
#[cfg(test)]
pub(crate) mod mock;

pub use config::{DEFAULT_USER_AGENT, FetchConfig, FetchConfigBuilder};
pub use error::FetchError;

use std::future::Future;

use reqwest::Client as ReqwestClient;
use reqwest::redirect::Policy;
use tracing::{debug, instrument, warn};
use url::Url;

/// HTTP method for a fetch request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// A single outbound request
#[derive(Debug, Clone)]
pub struct FetchRequest {
    /// Absolute URL
    pub url: String,

    /// HTTP method
    pub method: Method,

    /// Extra headers, applied in order
    pub headers: Vec<(String, String)>,

    /// Request body, sent as-is
    pub body: Option<String>,
}

impl FetchRequest {
    /// Create a GET request
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: Method::Get,
            headers: Vec::new(),
            body: None,
        }
    }

    /// Create a POST request with a JSON body
    pub fn post_json(url: impl Into<String>, body: &serde_json::Value) -> Self {
        Self {
            url: url.into(),
            method: Method::Post,
            headers: vec![("Content-Type".to_string(), "application/json".to_string())],
            body: Some(body.to_string()),
        }
    }

    /// Add a header
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// A successful response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    /// HTTP status code (2xx)
    pub status: u16,

    /// Response body decoded as text
    pub body: String,

    /// URL after redirects
    pub final_url: String,
}

/// Classified result of one fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// 2xx; the body may be empty
    Success(FetchResponse),

    /// 4xx (and any other non-2xx, non-5xx status); not retryable
    ClientError(u16),

    /// 5xx; transient but not retried within a run
    ServerError(u16),

    /// DNS, connect, TLS, timeout, or body read failure
    NetworkError(String),
}

impl FetchOutcome {
    /// Classify a status code with its body
    pub fn from_status(status: u16, body: String, final_url: String) -> Self {
        match status {
            200..=299 => FetchOutcome::Success(FetchResponse {
                status,
                body,
                final_url,
            }),
            500..=599 => FetchOutcome::ServerError(status),
            _ => FetchOutcome::ClientError(status),
        }
    }

    /// Body of a successful response with non-blank content
    pub fn into_body(self) -> Option<String> {
        match self {
            FetchOutcome::Success(response) if !response.body.trim().is_empty() => {
                Some(response.body)
            }
            _ => None,
        }
    }

    /// Successful response, including blank bodies
    pub fn into_response(self) -> Option<FetchResponse> {
        match self {
            FetchOutcome::Success(response) => Some(response),
            _ => None,
        }
    }

    /// Short human-readable description for logs and failure reasons
    pub fn describe(&self) -> String {
        match self {
            FetchOutcome::Success(response) if response.body.trim().is_empty() => {
                format!("HTTP {} with empty body", response.status)
            }
            FetchOutcome::Success(response) => format!("HTTP {}", response.status),
            FetchOutcome::ClientError(status) => format!("client error HTTP {}", status),
            FetchOutcome::ServerError(status) => format!("server error HTTP {}", status),
            FetchOutcome::NetworkError(message) => format!("network error: {}", message),
        }
    }
}

/// Something that can perform outbound HTTP requests
pub trait Fetch: Send + Sync {
    /// Perform one request. Never fails; failures are classified in the outcome.
    fn fetch(&self, request: FetchRequest) -> impl Future<Output = FetchOutcome> + Send;
}

/// Validate that a URL is absolute http(s) with a plausible host.
///
/// Runs before any network call; an invalid URL never reaches the wire.
pub fn validate_url(url: &str) -> Result<Url, FetchError> {
    let parsed = Url::parse(url.trim())?;
    match parsed.scheme() {
        "http" | "https" => {}
        other => {
            return Err(FetchError::InvalidUrl(format!(
                "unsupported scheme '{}' in {}",
                other, url
            )));
        }
    }
    match parsed.host_str() {
        Some(host) if host.len() > 2 => Ok(parsed),
        _ => Err(FetchError::InvalidUrl(format!("missing or short host in {}", url))),
    }
}

/// reqwest-backed fetcher
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: ReqwestClient,
    config: FetchConfig,
}

impl HttpFetcher {
    /// Create a fetcher with the given configuration
    pub fn new(config: FetchConfig) -> Result<Self, FetchError> {
        let client = ReqwestClient::builder()
            .timeout(config.timeout())
            .connect_timeout(config.connect_timeout())
            .user_agent(config.user_agent.clone())
            .redirect(Policy::limited(config.max_redirects))
            .build()?;
        Ok(Self { client, config })
    }

    /// The configuration this fetcher was built with
    pub fn config(&self) -> &FetchConfig {
        &self.config
    }
}

impl Fetch for HttpFetcher {
    #[instrument(skip(self, request), fields(url = %request.url, method = ?request.method))]
    async fn fetch(&self, request: FetchRequest) -> FetchOutcome {
        let url = match validate_url(&request.url) {
            Ok(url) => url,
            Err(e) => {
                warn!("Refusing to fetch: {}", e);
                return FetchOutcome::NetworkError(e.to_string());
            }
        };

        let mut builder = match request.method {
            Method::Get => self.client.get(url),
            Method::Post => self.client.post(url),
        };
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = match builder.send().await {
            Ok(response) => response,
            Err(e) if e.is_timeout() => {
                warn!("Request timed out after {}s", self.config.timeout_secs);
                return FetchOutcome::NetworkError(format!(
                    "timed out after {}s",
                    self.config.timeout_secs
                ));
            }
            Err(e) => {
                warn!("Request failed: {}", e);
                return FetchOutcome::NetworkError(e.to_string());
            }
        };

        let status = response.status().as_u16();
        let final_url = response.url().to_string();
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                warn!("Failed to read response body: {}", e);
                return FetchOutcome::NetworkError(format!("failed to read body: {}", e));
            }
        };

        let outcome = FetchOutcome::from_status(status, body, final_url);
        debug!("Fetch finished: {}", outcome.describe());
        outcome
    }
}
