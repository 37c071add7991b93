//! # Response Parser
//!
//! Turns raw model output into a [`TaskAnalysis`]. Parsing never fails: the
//! staged recovery in [`recovery`] pulls out whatever fields it can, and
//! anything still missing is filled with fixed fallback text. Every emitted
//! field goes through [`truncate_sentence_aware`].

pub mod insights;
pub mod recovery;
pub mod truncate;

pub use insights::{VideoInsights, parse_video_insights};
pub use truncate::truncate_sentence_aware;

use serde::{Deserialize, Serialize};
use tracing::debug;

use recovery::{FieldSpec, list_field, recover_object, text_field};

/// Longest context sentence kept
pub const CONTEXT_LIMIT: usize = 300;
/// Longest description kept
pub const DESCRIPTION_LIMIT: usize = 800;
/// Longest single next step kept
pub const ITEM_LIMIT: usize = 200;
/// Longest single search query kept
pub const QUERY_LIMIT: usize = 120;
/// Most search queries kept
pub const MAX_QUERIES: usize = 5;

const FALLBACK_DESCRIPTION: &str = "No analysis could be produced for this task.";

const TASK_FIELDS: &[FieldSpec] = &[
    FieldSpec::text("context", &["why", "background"]),
    FieldSpec::text("description", &["answer", "summary"]),
    FieldSpec::list("nextSteps", &["next_steps", "steps", "actions"]),
    FieldSpec::list(
        "suggestedSearchQueries",
        &[
            "suggested_search_queries",
            "searchQueries",
            "search_queries",
        ],
    ),
];

/// Whether a task was phrased as a question or as something to do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisKind {
    Task,
    Question,
}

impl AnalysisKind {
    /// Most next steps kept for this kind
    pub fn max_next_steps(&self) -> usize {
        match self {
            AnalysisKind::Task => 3,
            AnalysisKind::Question => 5,
        }
    }

    /// Next steps used when none could be recovered
    pub fn placeholder_steps(&self) -> &'static [&'static str] {
        match self {
            AnalysisKind::Task => &[
                "Review the task and any linked material",
                "Break the work into smaller steps",
                "Set aside time to start on the first step",
            ],
            AnalysisKind::Question => &[
                "Search for an authoritative answer to the question",
                "Check official documentation or primary sources",
                "Compare at least two independent explanations",
                "Write down the answer in your own words",
                "Note any follow-up questions that come up",
            ],
        }
    }
}

/// Structured analysis of one task. Every field is always populated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskAnalysis {
    pub context: String,
    pub description: String,
    pub next_steps: Vec<String>,
    pub suggested_search_queries: Vec<String>,
}

/// Parse model output for a task analysis.
///
/// `subject` is the cleaned task text, used for the fallback context and
/// search query.
pub fn parse_task_analysis(raw: &str, kind: AnalysisKind, subject: &str) -> TaskAnalysis {
    let object = match recover_object(raw, TASK_FIELDS) {
        Some((stage, object)) => {
            debug!(?stage, "Recovered analysis object");
            object
        }
        None => {
            debug!(len = raw.len(), "No analysis fields recovered from response");
            Default::default()
        }
    };
    let subject = subject.trim();

    let context = text_field(&object, &TASK_FIELDS[0])
        .unwrap_or_else(|| fallback_context(subject));

    let description = text_field(&object, &TASK_FIELDS[1])
        .or_else(|| Some(raw.trim().to_string()).filter(|s| !s.is_empty()))
        .unwrap_or_else(|| FALLBACK_DESCRIPTION.to_string());

    let mut next_steps = limit_items(
        list_field(&object, &TASK_FIELDS[2]),
        kind.max_next_steps(),
        ITEM_LIMIT,
    );
    if next_steps.is_empty() {
        next_steps = kind
            .placeholder_steps()
            .iter()
            .map(|s| s.to_string())
            .collect();
    }

    let mut suggested_search_queries = limit_items(
        list_field(&object, &TASK_FIELDS[3]),
        MAX_QUERIES,
        QUERY_LIMIT,
    );
    if suggested_search_queries.is_empty() {
        let query = if subject.is_empty() { &context } else { subject };
        suggested_search_queries.push(truncate_sentence_aware(query, QUERY_LIMIT));
    }

    TaskAnalysis {
        context: truncate_sentence_aware(&context, CONTEXT_LIMIT),
        description: truncate_sentence_aware(&description, DESCRIPTION_LIMIT),
        next_steps,
        suggested_search_queries,
    }
}

fn fallback_context(subject: &str) -> String {
    if subject.is_empty() {
        "Saved task".to_string()
    } else {
        format!("Saved task: {}", subject)
    }
}

pub(crate) fn limit_items(items: Vec<String>, max_items: usize, max_chars: usize) -> Vec<String> {
    items
        .into_iter()
        .map(|item| truncate_sentence_aware(&item, max_chars))
        .filter(|item| !item.is_empty())
        .take(max_items)
        .collect()
}
