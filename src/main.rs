//! # tasklens CLI
//!
//! Command-line front end for the task analysis pipeline.
//!
//! ## Subcommands
//!
//! - `analyze`: scan a markdown file for tasks and analyse each one
//! - `extract`: run the extraction cascade on a single URL, no model calls
//! - `cache`: inspect or clear the durable content cache
//!
//! Configuration comes from `TASKLENS_*` environment variables, overridden by
//! flags. Logs go to stderr (`RUST_LOG`), optionally to a file with
//! `--log-file`, and to an OTLP collector with `--otel`.

mod telemetry;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::anyhow;
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tasklens::analyzer::{BatchProgress, BatchReport, TaskAnalyzer};
use tasklens::cache::{CacheStore, ContentCache, DEFAULT_CACHE_PATH};
use tasklens::config::{AnalyzerConfig, AnalyzerConfigBuilder};
use tasklens::extractor::{ContentExtractor, ExtractionResult, truncate_content};
use tasklens::fetch::HttpFetcher;
use tasklens::task::parse_tasks;
use tokio::sync::mpsc;
use tracing::{instrument, warn};

#[derive(Parser)]
#[command(author, version, about = "Turn task lists into actionable, LLM-backed analyses", long_about = None)]
struct Cli {
    /// Also write logs to tasklens.log in this directory
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    /// Export traces and metrics over OTLP
    #[arg(long, global = true)]
    otel: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Analyse every open task in a markdown file
    Analyze(AnalyzeArgs),

    /// Extract the content behind a URL without calling the model
    Extract(ExtractArgs),

    /// Inspect or clear the content cache
    Cache(CacheArgs),
}

#[derive(Args, Debug)]
struct AnalyzeArgs {
    /// Markdown file containing checkbox tasks
    #[arg(required = true)]
    file: PathBuf,

    /// Output format (text|json)
    #[arg(short, long, default_value = "text", value_parser = ["text", "json"])]
    format: String,

    /// Write the output to a file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Include tasks that are already checked off
    #[arg(long)]
    include_done: bool,

    /// Model to use (overrides TASKLENS_MODEL)
    #[arg(short, long)]
    model: Option<String>,

    /// Cache snapshot file
    #[arg(long, default_value = DEFAULT_CACHE_PATH)]
    cache_path: PathBuf,

    /// Disable the content cache
    #[arg(long)]
    no_cache: bool,

    /// Summarise linked pages with the task in mind, caching per task
    #[arg(long)]
    context_sensitive: bool,
}

#[derive(Args, Debug)]
struct ExtractArgs {
    /// URL to extract
    #[arg(required = true)]
    url: String,

    /// Maximum characters of content to print
    #[arg(short, long, default_value = "6000")]
    max_chars: usize,
}

#[derive(Args, Debug)]
struct CacheArgs {
    #[command(subcommand)]
    action: CacheAction,

    /// Cache snapshot file
    #[arg(long, default_value = DEFAULT_CACHE_PATH, global = true)]
    cache_path: PathBuf,
}

#[derive(Subcommand, Debug)]
enum CacheAction {
    /// Show how many entries are cached and how old they are
    Stats,
    /// Delete the cache snapshot
    Clear,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let _otel = telemetry::init_tracing_subscriber(cli.log_file.as_deref(), cli.otel)?;

    match cli.command {
        Some(Commands::Analyze(args)) => analyze_command(args).await?,
        Some(Commands::Extract(args)) => extract_command(args).await?,
        Some(Commands::Cache(args)) => cache_command(args).await?,
        None => {
            let _ = Cli::parse_from(["tasklens", "--help"]);
        }
    }

    Ok(())
}

#[instrument]
async fn analyze_command(args: AnalyzeArgs) -> anyhow::Result<()> {
    let document = tokio::fs::read_to_string(&args.file).await?;
    let tasks = parse_tasks(&document, args.include_done);
    if tasks.is_empty() {
        println!("No tasks found in {}", args.file.display());
        return Ok(());
    }

    let mut builder = AnalyzerConfigBuilder::from_config(AnalyzerConfig::from_env()?)
        .cache_path(args.cache_path.clone())
        .context_sensitive_summaries(args.context_sensitive);
    if let Some(model) = args.model.clone() {
        builder = builder.model(model);
    }
    if args.no_cache {
        builder = builder.cache_enabled(false);
    }
    let analyzer = TaskAnalyzer::from_config(builder.build())?;

    if let Err(e) = analyzer.load_cache().await {
        warn!("Ignoring unreadable cache snapshot: {}", e);
    }

    let progress_bar = ProgressBar::new(tasks.len() as u64);
    progress_bar.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")?
            .progress_chars("##-"),
    );
    progress_bar.set_message("Analysing tasks...");

    let (progress_sender, mut progress_receiver) = mpsc::channel::<BatchProgress>(16);
    let progress_handle = tokio::spawn({
        let progress_bar = progress_bar.clone();
        async move {
            while let Some(update) = progress_receiver.recv().await {
                progress_bar.inc(1);
                let status = if update.succeeded { "done" } else { "failed" };
                progress_bar.set_message(format!("line {} {}", update.line_number, status));
            }
            progress_bar.finish_and_clear();
        }
    });

    let report = analyzer.analyze_batch(&tasks, Some(progress_sender)).await;
    let _ = progress_handle.await;

    if !args.no_cache {
        if let Err(e) = analyzer.save_cache().await {
            warn!("Could not save cache snapshot: {}", e);
        }
    }

    let rendered = match args.format.as_str() {
        "json" => serde_json::to_string_pretty(&report_json(&report))?,
        _ => report
            .analyzed
            .iter()
            .map(tasklens::render_card)
            .collect::<Vec<_>>()
            .join("\n---\n\n"),
    };

    match &args.output {
        Some(path) => {
            tokio::fs::write(path, &rendered).await?;
            println!("Wrote {} analyses to {}", report.analyzed.len(), path.display());
        }
        None if args.format == "json" => println!("{}", rendered),
        None => tasklens::format_markdown(&rendered)?,
    }

    for failure in &report.failed {
        eprintln!(
            "Line {}: {} ({})",
            failure.task.line_number,
            failure.task.subject(),
            failure.error
        );
    }
    if let Some(fatal) = report.failed.iter().find(|f| f.error.is_fatal()) {
        return Err(anyhow!(
            "Stopped after a fatal error ({}); {} of {} tasks were not analysed",
            fatal.error,
            report.skipped.len(),
            report.total()
        ));
    }

    Ok(())
}

fn report_json(report: &BatchReport) -> serde_json::Value {
    serde_json::json!({
        "analyzed": report.analyzed.iter().map(|a| {
            serde_json::json!({
                "line": a.task.line_number,
                "task": a.task.subject(),
                "tags": a.task.tags,
                "links": a.task.links,
                "analysis": a.analysis,
                "sources": a.sources.iter().map(|s| {
                    serde_json::json!({
                        "url": s.url,
                        "title": s.title,
                        "strategy": s.strategy.map(|strategy| strategy.name()),
                        "insights": s.insights,
                    })
                }).collect::<Vec<_>>()
            })
        }).collect::<Vec<_>>(),
        "failed": report.failed.iter().map(|f| {
            serde_json::json!({
                "line": f.task.line_number,
                "task": f.task.subject(),
                "error": f.error.to_string(),
            })
        }).collect::<Vec<_>>(),
        "skipped": report.skipped.iter().map(|t| t.line_number).collect::<Vec<_>>(),
    })
}

#[instrument]
async fn extract_command(args: ExtractArgs) -> anyhow::Result<()> {
    let config = AnalyzerConfig::from_env()?;
    let fetcher = HttpFetcher::new(config.fetch.clone())?;
    let extractor = ContentExtractor::new(fetcher).with_user_agent(config.fetch.user_agent.clone());

    match extractor.extract(&args.url).await? {
        ExtractionResult::Content(content) => {
            println!("Strategy: {}", content.strategy);
            if let Some(title) = &content.title {
                println!("Title: {}", title);
            }
            println!();
            println!("{}", truncate_content(&content.text, args.max_chars));
        }
        ExtractionResult::Empty => println!("No content found at {}", args.url),
        ExtractionResult::Failed(reason) => println!("Extraction failed: {}", reason),
    }

    Ok(())
}

#[instrument]
async fn cache_command(args: CacheArgs) -> anyhow::Result<()> {
    let store = CacheStore::new(args.cache_path);

    match args.action {
        CacheAction::Stats => {
            let config = AnalyzerConfig::from_env()?;
            let entries = store.load().await?;
            let stored = entries.len();
            let cache = ContentCache::new(config.cache_ttl);
            cache.restore(entries);
            let stats = cache.stats();

            println!("Cache file: {}", store.path().display());
            println!("Entries: {} valid, {} expired", stats.size, stored - stats.size);
            if let Some(age) = stats.oldest_entry_age {
                println!("Oldest entry: {}", format_age(age));
            }
        }
        CacheAction::Clear => {
            store.remove().await?;
            println!("Cleared {}", store.path().display());
        }
    }

    Ok(())
}

fn format_age(age: Duration) -> String {
    let secs = age.as_secs();
    match secs {
        0..60 => format!("{}s", secs),
        60..3600 => format!("{}m", secs / 60),
        _ => format!("{}h {}m", secs / 3600, (secs % 3600) / 60),
    }
}
