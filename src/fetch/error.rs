//! Error types for the fetch module

use thiserror::Error;

/// Error type for fetcher setup and URL validation.
///
/// Transport and status failures are not errors; they are reported through
/// [`FetchOutcome`](super::FetchOutcome).
#[derive(Debug, Error)]
pub enum FetchError {
    /// URL failed validation before any network call
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// URL parsing error
    #[error("URL parsing error: {0}")]
    UrlParse(#[from] url::ParseError),

    /// The underlying HTTP client could not be built
    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),
}
