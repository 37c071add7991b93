//! # Prompt Builder
//!
//! Pure functions from a task (and whatever context was gathered for it) to
//! the text sent to the model. The same inputs always give the same prompt.
//!
//! Tasks phrased as questions get an answer-style prompt with five follow-up
//! items; everything else gets a short context, a description and up to three
//! next steps. Video summaries use the typed templates in [`video`].

pub mod video;

pub use video::{VideoContentType, build_video_prompt};

use crate::extractor::ExtractedContent;
use crate::response::AnalysisKind;
use crate::task::ExtractedTask;

/// Words that mark a task as a question when they open it
pub const INTERROGATIVES: &[&str] = &[
    "what", "how", "why", "when", "where", "who", "which", "can", "should", "is", "are", "does",
    "do", "will", "would", "could",
];

/// System instruction for every analysis call
pub const SYSTEM_PROMPT: &str = "You help people turn saved notes and links into concrete work. Be specific and brief, and answer only with the JSON object requested.";

/// Whether text reads as a question: it ends with `?` or opens with an
/// interrogative word
pub fn is_question(text: &str) -> bool {
    let text = text.trim();
    if text.ends_with('?') {
        return true;
    }
    text.split_whitespace()
        .next()
        .map(|word| {
            word.trim_matches(|c: char| !c.is_alphanumeric())
                .to_lowercase()
        })
        .is_some_and(|word| INTERROGATIVES.contains(&word.as_str()))
}

/// Analysis kind for a task
pub fn analysis_kind(task: &ExtractedTask) -> AnalysisKind {
    if is_question(task.subject()) {
        AnalysisKind::Question
    } else {
        AnalysisKind::Task
    }
}

fn task_header(task: &ExtractedTask) -> String {
    let mut header = format!("Task: {}\n", task.subject());
    if !task.tags.is_empty() {
        let tags: Vec<String> = task.tags.iter().map(|t| format!("#{}", t)).collect();
        header.push_str(&format!("Tags: {}\n", tags.join(" ")));
    }
    let titled: Vec<&str> = task
        .links
        .iter()
        .filter_map(|link| link.title.as_deref())
        .filter(|title| !title.is_empty())
        .collect();
    if !titled.is_empty() {
        header.push_str(&format!("Linked: {}\n", titled.join("; ")));
    }
    header
}

fn context_block(context: Option<&str>) -> String {
    match context.map(str::trim).filter(|c| !c.is_empty()) {
        Some(context) => format!("\nContent from the linked pages:\n{}\n", context),
        None => "\nNo linked content is available; work from the task text alone.\n".to_string(),
    }
}

/// Prompt for analysing one task
pub fn build_task_prompt(task: &ExtractedTask, context: Option<&str>) -> String {
    match analysis_kind(task) {
        AnalysisKind::Question => build_question_prompt(task, context),
        AnalysisKind::Task => build_action_prompt(task, context),
    }
}

fn build_question_prompt(task: &ExtractedTask, context: Option<&str>) -> String {
    format!(
        "The user wrote down this question:\n{}{}
Answer it directly, then suggest 5 follow-up research or action items and a few search queries.

Respond with only a JSON object in this format:
{{
  \"context\": \"one sentence on what the question is about\",
  \"description\": \"a direct answer in 2-4 sentences\",
  \"nextSteps\": [\"5 follow-up research or action items\"],
  \"suggestedSearchQueries\": [\"2-3 search queries\"]
}}
",
        task_header(task),
        context_block(context)
    )
}

fn build_action_prompt(task: &ExtractedTask, context: Option<&str>) -> String {
    format!(
        "The user saved this task:\n{}{}
Explain what the task involves and how to move it forward.

Respond with only a JSON object in this format:
{{
  \"context\": \"one short sentence on why this matters\",
  \"description\": \"2-3 sentences describing the task\",
  \"nextSteps\": [\"up to 3 concrete next steps\"],
  \"suggestedSearchQueries\": [\"2-3 search queries\"]
}}
",
        task_header(task),
        context_block(context)
    )
}

/// Prompt for summarising one non-video page.
///
/// `task_context` is set only for context-sensitive summaries.
pub fn build_summary_prompt(
    url: &str,
    content: &ExtractedContent,
    text: &str,
    task_context: Option<&str>,
) -> String {
    let mut prompt = String::from(
        "Summarise the following content in 3-5 sentences of plain text. Keep concrete facts, names, numbers and instructions; drop navigation, ads and boilerplate.\n",
    );
    if let Some(task) = task_context {
        prompt.push_str(&format!(
            "The user saved this link for the task: \"{}\". Focus on what helps with that task.\n",
            task
        ));
    }
    prompt.push_str(&format!("\nSource: {}\n", url));
    if let Some(title) = content.title.as_deref().filter(|t| !t.is_empty()) {
        prompt.push_str(&format!("Title: {}\n", title));
    }
    prompt.push_str(&format!("Extracted with: {}\n\n{}\n", content.strategy, text));
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::Strategy;

    #[test]
    fn test_is_question() {
        assert!(is_question("Is tokio faster than async-std"));
        assert!(is_question("what does Pin actually guarantee"));
        assert!(is_question("rust vs go for CLIs?"));
        assert!(is_question("  How, exactly, does borrowck work  "));
        assert!(!is_question("read this article"));
        assert!(!is_question("Whatever happens, ship it"));
        assert!(!is_question(""));
    }

    #[test]
    fn test_task_prompt_shape() {
        let task = ExtractedTask::from_text("read this #research https://example.com/article");
        let prompt = build_task_prompt(&task, Some("Article about ownership."));

        assert!(prompt.contains("Task: read this"));
        assert!(prompt.contains("Tags: #research"));
        assert!(prompt.contains("up to 3 concrete next steps"));
        assert!(prompt.contains("Article about ownership."));
        assert_eq!(prompt, build_task_prompt(&task, Some("Article about ownership.")));
    }

    #[test]
    fn test_question_prompt_shape() {
        let task = ExtractedTask::from_text("why is my build slow?");
        let prompt = build_task_prompt(&task, None);

        assert!(prompt.contains("5 follow-up research or action items"));
        assert!(prompt.contains("work from the task text alone"));
        assert_eq!(analysis_kind(&task), AnalysisKind::Question);
    }

    #[test]
    fn test_summary_prompt() {
        let content = ExtractedContent {
            text: "raw".into(),
            strategy: Strategy::Readability,
            title: Some("A Title".into()),
            video: None,
        };
        let plain = build_summary_prompt("https://a.com", &content, "body text", None);
        assert!(plain.contains("Title: A Title"));
        assert!(plain.contains("Extracted with: readability"));
        assert!(!plain.contains("for the task"));

        let focused = build_summary_prompt("https://a.com", &content, "body text", Some("fix CI"));
        assert!(focused.contains("for the task: \"fix CI\""));
    }
}
