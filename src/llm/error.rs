//! # LLM Error Taxonomy
//!
//! Failures of the chat-completion call, classified so callers can decide
//! between skipping a task and aborting a batch.

use thiserror::Error;

/// Classified LLM client failure
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LlmError {
    /// Missing, malformed or rejected API key
    #[error("Authentication error: {0}")]
    Auth(String),

    /// Provider rate limit hit
    #[error("Rate limit exceeded. Please wait {retry_after_secs} seconds and retry")]
    RateLimited {
        /// Seconds to wait before retrying
        retry_after_secs: u64,
    },

    /// Provider overloaded or down, or the call timed out upstream
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Account quota or billing limit reached
    #[error("Quota exceeded: {0}")]
    QuotaExceeded(String),

    /// Requested model does not exist or is not accessible
    #[error("Model not found: {0}")]
    ModelNotFound(String),

    /// DNS, connect or timeout failure before a response arrived
    #[error("Network error: {0}")]
    Network(String),

    /// Anything else, including unexpected response shapes
    #[error("Unexpected LLM failure: {0}")]
    Unknown(String),
}

/// Default wait suggested when the provider sends no Retry-After header
pub const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

impl LlmError {
    /// Errors no other task in the same run can succeed past
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            LlmError::Auth(_) | LlmError::QuotaExceeded(_) | LlmError::ModelNotFound(_)
        )
    }

    /// Classify a non-success HTTP response.
    ///
    /// `code` and `kind` come from the provider's `{error: {code, type}}`
    /// payload when present.
    pub fn from_response(
        status: u16,
        message: &str,
        code: Option<&str>,
        kind: Option<&str>,
        retry_after_secs: Option<u64>,
    ) -> Self {
        let message = if message.trim().is_empty() {
            format!("HTTP {}", status)
        } else {
            message.trim().to_string()
        };
        let is_quota = code == Some("insufficient_quota") || kind == Some("insufficient_quota");

        match status {
            401 | 403 => LlmError::Auth(message),
            402 => LlmError::QuotaExceeded(message),
            429 if is_quota => LlmError::QuotaExceeded(message),
            429 => LlmError::RateLimited {
                retry_after_secs: retry_after_secs.unwrap_or(DEFAULT_RETRY_AFTER_SECS),
            },
            404 => LlmError::ModelNotFound(message),
            _ if code == Some("model_not_found") => LlmError::ModelNotFound(message),
            500 | 502 | 503 | 504 | 529 => LlmError::ServiceUnavailable(message),
            _ => LlmError::Unknown(format!("HTTP {}: {}", status, message)),
        }
    }
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            LlmError::Network(format!("request timed out: {}", err))
        } else if err.is_connect() || err.is_request() {
            LlmError::Network(err.to_string())
        } else {
            LlmError::Unknown(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert!(matches!(
            LlmError::from_response(401, "bad key", None, None, None),
            LlmError::Auth(_)
        ));
        assert_eq!(
            LlmError::from_response(429, "slow down", None, None, Some(12)),
            LlmError::RateLimited {
                retry_after_secs: 12
            }
        );
        assert_eq!(
            LlmError::from_response(429, "", None, None, None),
            LlmError::RateLimited {
                retry_after_secs: DEFAULT_RETRY_AFTER_SECS
            }
        );
        assert!(matches!(
            LlmError::from_response(429, "quota", Some("insufficient_quota"), None, None),
            LlmError::QuotaExceeded(_)
        ));
        assert!(matches!(
            LlmError::from_response(404, "no such model", None, None, None),
            LlmError::ModelNotFound(_)
        ));
        assert!(matches!(
            LlmError::from_response(400, "nope", Some("model_not_found"), None, None),
            LlmError::ModelNotFound(_)
        ));
        assert!(matches!(
            LlmError::from_response(503, "overloaded", None, None, None),
            LlmError::ServiceUnavailable(_)
        ));
        assert_eq!(
            LlmError::from_response(418, "", None, None, None),
            LlmError::Unknown("HTTP 418: HTTP 418".to_string())
        );
    }

    #[test]
    fn test_fatal_errors() {
        assert!(LlmError::Auth("x".into()).is_fatal());
        assert!(LlmError::QuotaExceeded("x".into()).is_fatal());
        assert!(!LlmError::RateLimited { retry_after_secs: 1 }.is_fatal());
        assert!(!LlmError::Network("x".into()).is_fatal());
    }

    #[test]
    fn test_rate_limit_message_tells_user_to_wait() {
        let message = LlmError::RateLimited {
            retry_after_secs: 30,
        }
        .to_string();
        assert!(message.contains("wait 30 seconds"));
    }
}
