//! # tasklens - Task Analysis with URL Content Extraction
//!
//! This crate turns free-form task lists into structured analyses produced by
//! a large language model. Each task's linked URLs are resolved through a
//! cascade of content extractors, summarised, cached, and fed into a prompt
//! whose reply is parsed into a [`response::TaskAnalysis`].
//!
//! ## Features
//!
//! - Markdown checkbox task scanning with tags and links
//! - Extraction cascade for Reddit posts, video transcripts, readable
//!   articles and plain HTML
//! - TTL content cache with an optional XML snapshot on disk
//! - OpenAI-compatible chat client with a classified error taxonomy and
//!   client-side rate limiting
//! - Prompt templates for tasks, questions and several kinds of video
//! - A response parser that recovers from malformed JSON and never fails
//! - Async API with Tokio
//!
//! ## Example
//!
//! ```rust,no_run
//! use tasklens::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
//!     let analyzer = TaskAnalyzer::from_config(AnalyzerConfig::from_env()?)?;
//!
//!     let document = "- [ ] read this #research https://example.com/article";
//!     for task in parse_tasks(document, false) {
//!         let analysis = analyzer.analyze(&task).await?;
//!         println!("{}: {:?}", analysis.context, analysis.next_steps);
//!     }
//!     Ok(())
//! }
//! ```

pub mod analyzer;
pub mod cache;
pub mod config;
pub mod error;
pub mod extractor;
pub mod fetch;
pub mod llm;
pub mod markdown;
pub mod pipeline;
pub mod prompt;
pub mod response;
pub mod task;

pub use error::Error;
pub use markdown::{format_markdown, render_card};

/// Re-export of the types most callers need
pub mod prelude {
    pub use crate::analyzer::{AnalyzeError, AnalyzedTask, BatchReport, TaskAnalyzer};
    pub use crate::config::AnalyzerConfig;
    pub use crate::error::Error;
    pub use crate::error::Result;
    pub use crate::extractor::{ContentExtractor, ExtractionResult, Strategy};
    pub use crate::response::TaskAnalysis;
    pub use crate::task::{ExtractedTask, parse_tasks};
}
