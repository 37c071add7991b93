//! # Extraction Orchestrator
//!
//! Resolves one URL into context text for a task analysis:
//!
//! 1. cache lookup, keyed by URL (or URL plus a task hash when summaries are
//!    context-sensitive)
//! 2. the extraction cascade
//! 3. hard truncation of the extracted text
//! 4. summarisation by the model, with a typed template for videos
//! 5. cache write of the summary
//!
//! Extraction failures never leave this module; the URL is simply dropped
//! from the task's context. Model failures that a later call cannot fix
//! ([`LlmError::is_fatal`]) are returned, everything else degrades to the raw
//! truncated content.

use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use crate::cache::{ContentCache, cache_key};
use crate::config::AnalyzerConfig;
use crate::extractor::{ContentExtractor, ExtractedContent, ExtractionResult, Strategy, truncate_content};
use crate::fetch::Fetch;
use crate::llm::{AnalysisRequest, Complete, LlmError};
use crate::prompt::{SYSTEM_PROMPT, VideoContentType, build_summary_prompt, build_video_prompt};
use crate::response::insights::SUMMARY_LIMIT;
use crate::response::{VideoInsights, parse_video_insights, truncate_sentence_aware};

/// Where resolved text came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentSource {
    /// A summary stored by an earlier run
    Cache,
    /// A fresh model summary
    Summary,
    /// Extracted text used as-is because summarising failed
    RawContent,
}

/// Context text resolved for one URL
#[derive(Debug, Clone)]
pub struct ResolvedContent {
    pub url: String,
    pub text: String,
    pub source: ContentSource,
    /// Winning strategy; unknown for cache hits
    pub strategy: Option<Strategy>,
    pub title: Option<String>,
    pub insights: Option<VideoInsights>,
}

/// Runs cache, cascade and summarisation for each URL of a task
#[derive(Debug)]
pub struct Orchestrator<F: Fetch, C: Complete> {
    extractor: ContentExtractor<F>,
    client: Arc<C>,
    cache: Arc<ContentCache>,
    config: Arc<AnalyzerConfig>,
}

impl<F: Fetch, C: Complete> Orchestrator<F, C> {
    pub fn new(
        extractor: ContentExtractor<F>,
        client: Arc<C>,
        cache: Arc<ContentCache>,
        config: Arc<AnalyzerConfig>,
    ) -> Self {
        Self {
            extractor,
            client,
            cache,
            config,
        }
    }

    pub fn extractor(&self) -> &ContentExtractor<F> {
        &self.extractor
    }

    pub fn cache(&self) -> &ContentCache {
        &self.cache
    }

    /// Resolve a URL referenced by the task with text `subject`.
    ///
    /// `Ok(None)` means nothing usable was found. `Err` only carries fatal
    /// model errors.
    #[instrument(skip(self, subject))]
    pub async fn resolve(&self, url: &str, subject: &str) -> Result<Option<ResolvedContent>, LlmError> {
        let task_context = self.config.context_sensitive_summaries.then_some(subject);
        let key = cache_key(url, task_context);

        if let Some(text) = self.cache.get(&key) {
            debug!("Cache hit");
            return Ok(Some(ResolvedContent {
                url: url.to_string(),
                text,
                source: ContentSource::Cache,
                strategy: None,
                title: None,
                insights: None,
            }));
        }

        let content = match self.extractor.extract(url).await {
            Ok(ExtractionResult::Content(content)) => content,
            Ok(ExtractionResult::Empty) => {
                info!("No content found");
                return Ok(None);
            }
            Ok(ExtractionResult::Failed(reason)) => {
                info!("Extraction failed: {}", reason);
                return Ok(None);
            }
            Err(e) => {
                warn!("Skipping URL: {}", e);
                return Ok(None);
            }
        };

        let text = truncate_content(&content.text, self.config.max_content_chars);
        match self.summarise(url, &content, &text, task_context).await {
            Ok((summary, insights)) => {
                self.cache.set(key, summary.clone());
                Ok(Some(ResolvedContent {
                    url: url.to_string(),
                    text: summary,
                    source: ContentSource::Summary,
                    strategy: Some(content.strategy),
                    title: content.title,
                    insights,
                }))
            }
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                warn!("Summarising failed, using extracted text: {}", e);
                Ok(Some(ResolvedContent {
                    url: url.to_string(),
                    text,
                    source: ContentSource::RawContent,
                    strategy: Some(content.strategy),
                    title: content.title,
                    insights: None,
                }))
            }
        }
    }

    async fn summarise(
        &self,
        url: &str,
        content: &ExtractedContent,
        text: &str,
        task_context: Option<&str>,
    ) -> Result<(String, Option<VideoInsights>), LlmError> {
        match &content.video {
            Some(video) => {
                let content_type = VideoContentType::for_video(video);
                debug!("Summarising video as {}", content_type);
                let prompt = build_video_prompt(video, content_type, text, task_context);
                let request = AnalysisRequest::new(&self.config, prompt)
                    .with_system(SYSTEM_PROMPT)
                    .structured();
                let reply = self.client.complete(request).await?;
                let insights = parse_video_insights(&reply, content_type, text);
                Ok((insights.to_context_text(), Some(insights)))
            }
            None => {
                let prompt = build_summary_prompt(url, content, text, task_context);
                let reply = self
                    .client
                    .complete(AnalysisRequest::new(&self.config, prompt))
                    .await?;
                let summary = truncate_sentence_aware(&reply, SUMMARY_LIMIT);
                if summary.is_empty() {
                    return Err(LlmError::Unknown("empty summary".to_string()));
                }
                Ok((summary, None))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::fetch::FetchOutcome;
    use crate::fetch::mock::MockFetcher;
    use crate::llm::mock::MockCompletion;

    const URL: &str = "https://example.com/article";
    const ARTICLE_HTML: &str = r#"<html><head><title>Ownership in Practice</title></head><body>
        <article>
          <p>Ownership is the set of rules that govern how a Rust program manages memory, without a garbage collector.</p>
          <p>Each value has a single owner, and when the owner goes out of scope, the value is dropped automatically.</p>
        </article></body></html>"#;

    fn orchestrator(
        fetcher: MockFetcher,
        client: MockCompletion,
        config: AnalyzerConfig,
    ) -> Orchestrator<MockFetcher, MockCompletion> {
        Orchestrator::new(
            ContentExtractor::new(fetcher),
            Arc::new(client),
            Arc::new(ContentCache::new(Duration::from_secs(3600))),
            Arc::new(config),
        )
    }

    #[tokio::test]
    async fn test_summary_is_cached() {
        let fetcher = MockFetcher::new();
        fetcher.respond_ok(URL, ARTICLE_HTML);
        let client = MockCompletion::new().with_default("Rust frees memory when owners go out of scope.");
        let orch = orchestrator(fetcher.clone(), client.clone(), AnalyzerConfig::default());

        let first = orch.resolve(URL, "read this").await.unwrap().unwrap();
        assert_eq!(first.source, ContentSource::Summary);
        assert_eq!(first.strategy, Some(Strategy::Readability));
        assert_eq!(first.text, "Rust frees memory when owners go out of scope.");
        assert!(client.prompts()[0].contains("single owner"));

        let second = orch.resolve(URL, "something else").await.unwrap().unwrap();
        assert_eq!(second.source, ContentSource::Cache);
        assert_eq!(second.text, first.text);
        assert_eq!(fetcher.call_count(URL), 1);
        assert_eq!(client.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_extraction_skips_model() {
        let fetcher = MockFetcher::new();
        fetcher.respond(URL, FetchOutcome::ServerError(503));
        let client = MockCompletion::new();
        let orch = orchestrator(fetcher, client.clone(), AnalyzerConfig::default());

        assert!(orch.resolve(URL, "t").await.unwrap().is_none());
        assert!(orch.resolve("not a url", "t").await.unwrap().is_none());
        assert!(client.requests().is_empty());
    }

    #[tokio::test]
    async fn test_transient_model_error_uses_raw_content() {
        let fetcher = MockFetcher::new();
        fetcher.respond_ok(URL, ARTICLE_HTML);
        let client = MockCompletion::new().with_error(LlmError::ServiceUnavailable("overloaded".into()));
        let orch = orchestrator(fetcher.clone(), client, AnalyzerConfig::default());

        let resolved = orch.resolve(URL, "t").await.unwrap().unwrap();
        assert_eq!(resolved.source, ContentSource::RawContent);
        assert!(resolved.text.contains("single owner"));
        // Raw content is not cached
        assert_eq!(orch.cache().stats().size, 0);
        orch.resolve(URL, "t").await.unwrap();
        assert_eq!(fetcher.call_count(URL), 2);
    }

    #[tokio::test]
    async fn test_fatal_model_error_propagates() {
        let fetcher = MockFetcher::new();
        fetcher.respond_ok(URL, ARTICLE_HTML);
        let client = MockCompletion::new().with_error(LlmError::Auth("bad key".into()));
        let orch = orchestrator(fetcher, client, AnalyzerConfig::default());

        assert!(matches!(
            orch.resolve(URL, "t").await,
            Err(LlmError::Auth(_))
        ));
    }

    #[tokio::test]
    async fn test_empty_summary_falls_back_uncached() {
        let fetcher = MockFetcher::new();
        fetcher.respond_ok(URL, ARTICLE_HTML);
        let orch = orchestrator(fetcher, MockCompletion::new(), AnalyzerConfig::default());

        let resolved = orch.resolve(URL, "t").await.unwrap().unwrap();
        assert_eq!(resolved.source, ContentSource::RawContent);
        assert_eq!(orch.cache().stats().size, 0);
    }

    #[tokio::test]
    async fn test_context_sensitive_keys() {
        let fetcher = MockFetcher::new();
        fetcher.respond_ok(URL, ARTICLE_HTML);
        let client = MockCompletion::new().with_default("A summary.");
        let config = AnalyzerConfig::builder()
            .context_sensitive_summaries(true)
            .build();
        let orch = orchestrator(fetcher, client.clone(), config);

        orch.resolve(URL, "learn ownership").await.unwrap();
        orch.resolve(URL, "learn ownership").await.unwrap();
        orch.resolve(URL, "write a blog post").await.unwrap();

        assert_eq!(client.requests().len(), 2);
        assert!(client.prompts()[1].contains("write a blog post"));
        assert_eq!(orch.cache().stats().size, 2);
    }

    #[tokio::test]
    async fn test_video_uses_typed_template() {
        use crate::extractor::video::{PLAYER_URL, WATCH_URL};

        let video_url = format!("{}?v=dQw4w9WgXcQ", WATCH_URL);
        let fetcher = MockFetcher::new();
        fetcher.respond_ok(
            &video_url,
            r#"<script>ytcfg.set({"INNERTUBE_API_KEY":"AIzaTestKey"});</script>"#,
        );
        let player = serde_json::json!({
            "videoDetails": {
                "videoId": "dQw4w9WgXcQ",
                "title": "Install Rust in the terminal, a tutorial",
                "author": "Rust Channel",
                "shortDescription": "Short intro.",
                "lengthSeconds": "300"
            }
        });
        fetcher.respond_ok(&format!("{}?key=AIzaTestKey", PLAYER_URL), &player.to_string());

        let client = MockCompletion::new().with_default(
            r#"{"summary": "Installs rustup.", "toolsAndCommands": ["rustup-init"]}"#,
        );
        let orch = orchestrator(fetcher, client.clone(), AnalyzerConfig::default());

        let resolved = orch.resolve(&video_url, "t").await.unwrap().unwrap();
        assert_eq!(resolved.strategy, Some(Strategy::VideoMetadata));
        let insights = resolved.insights.unwrap();
        assert_eq!(insights.content_type, VideoContentType::TechnicalTutorial);
        assert_eq!(insights.tools_and_commands, vec!["rustup-init"]);
        assert!(resolved.text.contains("Tools and commands:"));

        let request = &client.requests()[0];
        assert!(request.require_structured_output);
        assert!(request.prompt.contains("No transcript is available"));
    }

    #[tokio::test]
    async fn test_content_is_truncated_before_summarising() {
        let fetcher = MockFetcher::new();
        fetcher.respond_ok(URL, ARTICLE_HTML);
        let client = MockCompletion::new().with_default("Short.");
        let config = AnalyzerConfig::builder().max_content_chars(40).build();
        let orch = orchestrator(fetcher, client.clone(), config);

        orch.resolve(URL, "t").await.unwrap();
        assert!(client.prompts()[0].contains("[Content truncated]"));
        assert!(!client.prompts()[0].contains("single owner"));
    }
}
