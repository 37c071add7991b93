//! Error types for the extractor module

use thiserror::Error;

use crate::fetch::FetchError;

/// Unexpected extraction faults.
///
/// Expected failures (HTTP errors, empty pages, missing captions) are reported
/// as [`super::ExtractionResult`] values instead.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// The URL failed validation before any request was made
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] FetchError),

    /// A blocking parse task panicked or was cancelled
    #[error("Extraction worker failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}
