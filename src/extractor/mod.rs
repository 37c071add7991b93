//! # Content Extraction Module
//!
//! Turns a URL into text through an ordered cascade of strategies:
//!
//! 1. site-specific extractors (Reddit JSON, video transcripts)
//! 2. readability over the fetched page
//! 3. naive tag stripping of the same page
//!
//! Each tier returns an [`ExtractionResult`]. The cascade stops at the first
//! `Content`; a later tier runs only if every earlier applicable tier reported
//! `Empty` or `Failed`. The generic page is fetched at most once and shared
//! by the last two tiers.

mod error;
pub mod fallback;
pub mod readability;
pub mod reddit;
pub mod video;

pub use error::ExtractError;
pub use video::{
    Chapter, ContentRichness, TranscriptSegment, VideoContent, VideoMetadata, VideoTranscript,
};

use std::fmt;

use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::fetch::{DEFAULT_USER_AGENT, Fetch, FetchRequest, FetchResponse, validate_url};

/// Marker appended when content is cut to the size limit
pub const TRUNCATION_MARKER: &str = "\n\n[Content truncated]";

/// Strategy that produced a piece of content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strategy {
    Reddit,
    VideoTranscript,
    /// Video details without captions
    VideoMetadata,
    Readability,
    PlainText,
}

impl Strategy {
    /// Tiers in the order they are tried. `VideoMetadata` is produced by the
    /// transcript tier and has no tier of its own.
    pub const CASCADE: [Strategy; 4] = [
        Strategy::Reddit,
        Strategy::VideoTranscript,
        Strategy::Readability,
        Strategy::PlainText,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Strategy::Reddit => "reddit",
            Strategy::VideoTranscript => "video_transcript",
            Strategy::VideoMetadata => "video_metadata",
            Strategy::Readability => "readability",
            Strategy::PlainText => "plain_text",
        }
    }

    /// Whether this tier applies to the URL at all
    pub fn applies_to(&self, url: &Url) -> bool {
        match self {
            Strategy::Reddit => reddit::is_reddit_url(url),
            Strategy::VideoTranscript | Strategy::VideoMetadata => video::video_id(url).is_some(),
            Strategy::Readability | Strategy::PlainText => true,
        }
    }

    pub fn is_video(&self) -> bool {
        matches!(self, Strategy::VideoTranscript | Strategy::VideoMetadata)
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Content found by one strategy
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedContent {
    pub text: String,
    pub strategy: Strategy,
    pub title: Option<String>,

    /// Video details, for the video strategies
    pub video: Option<VideoContent>,
}

/// Outcome of one strategy, or of the whole cascade
#[derive(Debug, Clone, PartialEq)]
pub enum ExtractionResult {
    Content(ExtractedContent),
    /// Nothing usable, without a specific failure
    Empty,
    Failed(String),
}

impl ExtractionResult {
    pub fn content(self) -> Option<ExtractedContent> {
        match self {
            ExtractionResult::Content(content) => Some(content),
            _ => None,
        }
    }
}

/// First `max_chars` characters of `text`, ending in `…` when cut
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let keep = max_chars.saturating_sub(1);
    let mut out: String = text.chars().take(keep).collect();
    out.push('…');
    out
}

/// Hard-cut content to `max_chars` characters and append the truncation
/// marker. No attempt is made to end on a sentence.
pub fn truncate_content(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}{}", &text[..cut], TRUNCATION_MARKER),
        None => text.to_string(),
    }
}

/// Runs the extraction cascade for a URL
#[derive(Debug, Clone)]
pub struct ContentExtractor<F: Fetch> {
    fetcher: F,
    user_agent: String,
}

impl<F: Fetch> ContentExtractor<F> {
    pub fn new(fetcher: F) -> Self {
        Self {
            fetcher,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }

    /// Override the user agent sent to site-specific endpoints
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    /// Run the cascade. Only an invalid URL or a crashed parse worker is an
    /// `Err`; everything else is reported in the result.
    #[instrument(skip(self))]
    pub async fn extract(&self, url: &str) -> Result<ExtractionResult, ExtractError> {
        let parsed = validate_url(url)?;
        let mut page: Option<Result<FetchResponse, String>> = None;
        let mut last_failure: Option<String> = None;

        for strategy in Strategy::CASCADE {
            if !strategy.applies_to(&parsed) {
                continue;
            }
            debug!("Trying {} strategy", strategy);

            let result = match strategy {
                Strategy::Reddit => reddit::extract(&self.fetcher, &parsed, &self.user_agent).await,
                Strategy::VideoTranscript | Strategy::VideoMetadata => match video::video_id(&parsed) {
                    Some(id) => video::extract(&self.fetcher, &id, &self.user_agent).await,
                    None => ExtractionResult::Empty,
                },
                Strategy::Readability | Strategy::PlainText => {
                    if page.is_none() {
                        page = Some(self.fetch_page(parsed.as_str()).await);
                    }
                    match page.as_ref() {
                        Some(Ok(response)) => {
                            self.run_page_strategy(strategy, parsed.as_str(), response)
                                .await?
                        }
                        Some(Err(reason)) => ExtractionResult::Failed(reason.clone()),
                        None => ExtractionResult::Empty,
                    }
                }
            };

            match result {
                ExtractionResult::Content(content) => {
                    info!(
                        "Extracted {} chars with {} strategy",
                        content.text.chars().count(),
                        content.strategy
                    );
                    return Ok(ExtractionResult::Content(content));
                }
                ExtractionResult::Empty => debug!("{} strategy found nothing", strategy),
                ExtractionResult::Failed(reason) => {
                    warn!("{} strategy failed: {}", strategy, reason);
                    last_failure = Some(reason);
                }
            }
        }

        Ok(match last_failure {
            Some(reason) => ExtractionResult::Failed(reason),
            None => ExtractionResult::Empty,
        })
    }

    async fn fetch_page(&self, url: &str) -> Result<FetchResponse, String> {
        let outcome = self
            .fetcher
            .fetch(
                FetchRequest::get(url)
                    .header("User-Agent", self.user_agent.as_str())
                    .header("Accept", "text/html,application/xhtml+xml"),
            )
            .await;
        let description = outcome.describe();
        match outcome.into_response() {
            Some(response) if !response.body.trim().is_empty() => Ok(response),
            _ => Err(format!("page fetch: {}", description)),
        }
    }

    /// DOM parsing is CPU-bound and the parsed tree is not `Send`, so the
    /// page tiers run on the blocking pool.
    async fn run_page_strategy(
        &self,
        strategy: Strategy,
        url: &str,
        response: &FetchResponse,
    ) -> Result<ExtractionResult, ExtractError> {
        let url = url.to_string();
        let html = response.body.clone();
        let result = tokio::task::spawn_blocking(move || match strategy {
            Strategy::Readability => match readability::extract(&url, &html) {
                Some(article) => ExtractionResult::Content(ExtractedContent {
                    text: article_text(&article),
                    strategy,
                    title: article.title,
                    video: None,
                }),
                None => ExtractionResult::Empty,
            },
            _ => {
                let text = fallback::strip_html(&html);
                if text.is_empty() {
                    ExtractionResult::Empty
                } else {
                    ExtractionResult::Content(ExtractedContent {
                        text,
                        strategy: Strategy::PlainText,
                        title: None,
                        video: None,
                    })
                }
            }
        })
        .await?;
        Ok(result)
    }
}

fn article_text(article: &readability::Article) -> String {
    let mut header = Vec::new();
    if let Some(title) = &article.title {
        header.push(format!("Title: {}", title));
    }
    if let Some(byline) = &article.byline {
        header.push(format!("By: {}", byline));
    }
    if let Some(site) = &article.site_name {
        header.push(format!("Site: {}", site));
    }
    if header.is_empty() {
        article.text_content.clone()
    } else {
        format!("{}\n\n{}", header.join("\n"), article.text_content)
    }
}
