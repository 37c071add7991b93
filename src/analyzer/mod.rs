//! # Task Analyzer
//!
//! Entry point for analysing extracted tasks. For each task it resolves the
//! referenced URLs one at a time through the [`Orchestrator`], builds the
//! prompt from whatever context was found, calls the model and parses the
//! reply into a [`TaskAnalysis`].
//!
//! ## Example
//!
//! ```rust,no_run
//! use tasklens::analyzer::TaskAnalyzer;
//! use tasklens::config::AnalyzerConfig;
//! use tasklens::task::ExtractedTask;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let analyzer = TaskAnalyzer::from_config(AnalyzerConfig::from_env()?)?;
//!     let task = ExtractedTask::from_text("read this #research https://example.com/article");
//!     let analysis = analyzer.analyze(&task).await?;
//!     println!("{:#?}", analysis.next_steps);
//!     Ok(())
//! }
//! ```

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{error, info, instrument, warn};

use crate::cache::{CacheStats, CacheStore, ContentCache};
use crate::config::AnalyzerConfig;
use crate::error::Result;
use crate::extractor::ContentExtractor;
use crate::fetch::{Fetch, HttpFetcher};
use crate::llm::{AnalysisRequest, ChatClient, Complete, LlmError, RateLimitedClient, validate_api_key};
use crate::pipeline::{Orchestrator, ResolvedContent};
use crate::prompt::{SYSTEM_PROMPT, analysis_kind, build_task_prompt};
use crate::response::{TaskAnalysis, parse_task_analysis};
use crate::task::ExtractedTask;

/// Failure of a whole task analysis
#[derive(Debug, Clone, Error)]
pub enum AnalyzeError {
    #[error(transparent)]
    Llm(#[from] LlmError),
}

impl AnalyzeError {
    /// Whether the remaining tasks of a batch should be skipped
    pub fn is_fatal(&self) -> bool {
        match self {
            AnalyzeError::Llm(e) => e.is_fatal(),
        }
    }
}

/// A task together with its analysis and the sources that fed it
#[derive(Debug, Clone)]
pub struct AnalyzedTask {
    pub task: ExtractedTask,
    pub analysis: TaskAnalysis,
    pub sources: Vec<ResolvedContent>,
}

/// A task whose analysis failed
#[derive(Debug, Clone)]
pub struct TaskFailure {
    pub task: ExtractedTask,
    pub error: AnalyzeError,
}

/// Outcome of analysing a list of tasks
#[derive(Debug, Default)]
pub struct BatchReport {
    pub analyzed: Vec<AnalyzedTask>,
    pub failed: Vec<TaskFailure>,
    /// Tasks not attempted after a fatal error
    pub skipped: Vec<ExtractedTask>,
}

impl BatchReport {
    pub fn total(&self) -> usize {
        self.analyzed.len() + self.failed.len() + self.skipped.len()
    }

    pub fn is_complete(&self) -> bool {
        self.failed.is_empty() && self.skipped.is_empty()
    }
}

/// Progress message sent once per task during a batch
#[derive(Debug, Clone)]
pub struct BatchProgress {
    pub line_number: usize,
    pub subject: String,
    pub succeeded: bool,
}

/// Analyzer over any fetcher and completion client
#[derive(Debug)]
pub struct TaskAnalyzer<F: Fetch, C: Complete> {
    orchestrator: Orchestrator<F, C>,
    client: Arc<C>,
    cache: Arc<ContentCache>,
    config: Arc<AnalyzerConfig>,
    store: Option<CacheStore>,
}

impl TaskAnalyzer<HttpFetcher, RateLimitedClient<ChatClient>> {
    /// Build the production analyzer: reqwest fetcher, rate-limited chat
    /// client, and a durable cache when `cache_path` is set
    pub fn from_config(config: AnalyzerConfig) -> Result<Self> {
        config.validate()?;
        let fetcher = HttpFetcher::new(config.fetch.clone())?;
        let client = RateLimitedClient::per_minute(ChatClient::new(&config)?, config.requests_per_minute);
        let store = config.cache_path.clone().map(CacheStore::new);
        let analyzer = Self::new(config, fetcher, client);
        Ok(match store {
            Some(store) => analyzer.with_store(store),
            None => analyzer,
        })
    }
}

impl<F: Fetch, C: Complete> TaskAnalyzer<F, C> {
    pub fn new(config: AnalyzerConfig, fetcher: F, client: C) -> Self {
        let cache = if config.cache_enabled {
            ContentCache::new(config.cache_ttl)
        } else {
            ContentCache::disabled()
        };
        let cache = Arc::new(cache);
        let client = Arc::new(client);
        let extractor = ContentExtractor::new(fetcher).with_user_agent(config.fetch.user_agent.clone());
        let config = Arc::new(config);
        let orchestrator = Orchestrator::new(extractor, client.clone(), cache.clone(), config.clone());

        Self {
            orchestrator,
            client,
            cache,
            config,
            store: None,
        }
    }

    /// Persist the cache through `store` on [`save_cache`](Self::save_cache)
    pub fn with_store(mut self, store: CacheStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    /// Load the durable cache, if any. Returns how many unexpired entries
    /// were restored.
    pub async fn load_cache(&self) -> Result<usize> {
        let Some(store) = &self.store else {
            return Ok(0);
        };
        if !self.cache.is_enabled() {
            return Ok(0);
        }
        let loaded = self.cache.restore(store.load().await?);
        info!("Restored {} cached summaries", loaded);
        Ok(loaded)
    }

    /// Write the unexpired cache entries to the durable store, if any
    pub async fn save_cache(&self) -> Result<()> {
        if let Some(store) = &self.store {
            let purged = self.cache.purge_expired();
            if purged > 0 {
                info!("Dropped {} expired summaries before saving", purged);
            }
            store.save(&self.cache.snapshot()).await?;
        }
        Ok(())
    }

    /// Drop every cached summary, including the durable snapshot
    pub async fn clear_cache(&self) -> Result<()> {
        self.cache.clear();
        if let Some(store) = &self.store {
            store.remove().await?;
        }
        Ok(())
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Analyse one task
    pub async fn analyze(&self, task: &ExtractedTask) -> std::result::Result<TaskAnalysis, AnalyzeError> {
        self.analyze_task(task).await.map(|analyzed| analyzed.analysis)
    }

    /// Analyse one task, keeping the resolved sources
    #[instrument(skip(self, task), fields(line = task.line_number, links = task.links.len()))]
    pub async fn analyze_task(&self, task: &ExtractedTask) -> std::result::Result<AnalyzedTask, AnalyzeError> {
        // A bad key would fail every summary and the task prompt alike
        validate_api_key(&self.config.api_key)?;

        let mut sources = Vec::new();
        // Sequential to keep model spend and rate-limit pressure predictable
        for link in &task.links {
            if let Some(resolved) = self.orchestrator.resolve(&link.url, task.subject()).await? {
                sources.push(resolved);
            }
        }
        if !task.links.is_empty() && sources.is_empty() {
            info!("No linked content available, analysing task text alone");
        }

        let context = context_text(&sources);
        let prompt = build_task_prompt(task, context.as_deref());
        let request = AnalysisRequest::new(&self.config, prompt)
            .with_system(SYSTEM_PROMPT)
            .structured();
        let reply = self.client.complete(request).await?;
        let analysis = parse_task_analysis(&reply, analysis_kind(task), task.subject());

        Ok(AnalyzedTask {
            task: task.clone(),
            analysis,
            sources,
        })
    }

    /// Analyse tasks one at a time.
    ///
    /// A failed task is recorded and the batch moves on, unless the error is
    /// fatal, in which case every remaining task is marked skipped.
    pub async fn analyze_batch(
        &self,
        tasks: &[ExtractedTask],
        progress_sender: Option<mpsc::Sender<BatchProgress>>,
    ) -> BatchReport {
        let mut report = BatchReport::default();

        for (index, task) in tasks.iter().enumerate() {
            let result = self.analyze_task(task).await;
            let succeeded = result.is_ok();
            let mut fatal = false;

            match result {
                Ok(analyzed) => report.analyzed.push(analyzed),
                Err(error) => {
                    fatal = error.is_fatal();
                    if fatal {
                        error!("Stopping batch at line {}: {}", task.line_number, error);
                    } else {
                        warn!("Task on line {} failed: {}", task.line_number, error);
                    }
                    report.failed.push(TaskFailure {
                        task: task.clone(),
                        error,
                    });
                }
            }

            if let Some(sender) = &progress_sender {
                let _ = sender
                    .send(BatchProgress {
                        line_number: task.line_number,
                        subject: task.subject().to_string(),
                        succeeded,
                    })
                    .await;
            }

            if fatal {
                report.skipped.extend(tasks[index + 1..].iter().cloned());
                break;
            }
        }

        info!(
            "Batch finished: {} analysed, {} failed, {} skipped",
            report.analyzed.len(),
            report.failed.len(),
            report.skipped.len()
        );
        report
    }
}

fn context_text(sources: &[ResolvedContent]) -> Option<String> {
    if sources.is_empty() {
        return None;
    }
    let blocks: Vec<String> = sources
        .iter()
        .map(|source| match &source.title {
            Some(title) => format!("[{}] {}\n{}", title, source.url, source.text),
            None => format!("{}\n{}", source.url, source.text),
        })
        .collect();
    Some(blocks.join("\n\n"))
}
