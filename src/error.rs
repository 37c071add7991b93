//! Error types for the tasklens crate

use thiserror::Error;

use crate::analyzer::AnalyzeError;
use crate::cache::StorageError;
use crate::extractor::ExtractError;
use crate::fetch::FetchError;
use crate::llm::LlmError;

/// Result type for tasklens operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for tasklens operations
#[derive(Debug, Error)]
pub enum Error {
    /// Outbound fetch could not be set up
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// Content extraction fault outside the modeled cascade outcomes
    #[error("Extraction error: {0}")]
    Extract(#[from] ExtractError),

    /// Language model call failed
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    /// Cache persistence failed
    #[error("Cache storage error: {0}")]
    Storage(#[from] StorageError),

    /// Invalid configuration value
    #[error("Configuration error: {0}")]
    Config(String),

    /// Terminal rendering error
    #[error("Output error: {0}")]
    Output(#[from] std::io::Error),
}

impl From<AnalyzeError> for Error {
    fn from(err: AnalyzeError) -> Self {
        match err {
            AnalyzeError::Llm(e) => Error::Llm(e),
        }
    }
}
