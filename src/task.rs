//! # Task Line Scanner
//!
//! Turns free-form markdown into [`ExtractedTask`] values. A task is a
//! checkbox list item (`- [ ] ...`, `* [ ] ...`, `+ [x] ...`). From each task
//! line the scanner collects `#tags`, markdown links and bare URLs, and
//! produces a cleaned text with those stripped.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

static TASK_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*[-*+]\s+\[([ xX])\]\s+(.*)$").expect("valid task regex"));
static MARKDOWN_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[([^\]]*)\]\((https?://[^\s)]+)\)").expect("valid markdown link regex")
});
static BARE_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"https?://[^\s<>()\[\]]+").expect("valid url regex"));
static TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|\s)#([\p{L}\p{N}_][\p{L}\p{N}_/-]*)").expect("valid tag regex"));

/// A URL referenced by a task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskLink {
    /// Absolute URL
    pub url: String,

    /// Link text when written as a markdown link
    pub title: Option<String>,
}

/// One parsed task line. Immutable once parsed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedTask {
    /// The line as written, without the checkbox prefix
    pub raw_text: String,

    /// Text with tags and URLs removed
    pub text: String,

    /// Tags without the leading `#`
    pub tags: Vec<String>,

    /// Referenced URLs, in order of appearance
    pub links: Vec<TaskLink>,

    /// 1-based source line number
    pub line_number: usize,

    /// Whether the checkbox was ticked
    pub completed: bool,
}

impl ExtractedTask {
    /// Build a task directly from text, as if it were an unchecked task line
    pub fn from_text(text: &str) -> Self {
        parse_body(text, 1, false)
    }

    /// Text used to describe the task to the model; falls back to the raw
    /// line when stripping left nothing
    pub fn subject(&self) -> &str {
        if self.text.is_empty() {
            &self.raw_text
        } else {
            &self.text
        }
    }
}

/// Parse a single line. Returns `None` for lines that are not checkbox items.
pub fn parse_task_line(line: &str, line_number: usize) -> Option<ExtractedTask> {
    let captures = TASK_LINE.captures(line)?;
    let completed = captures.get(1).is_some_and(|m| m.as_str() != " ");
    let body = captures.get(2).map(|m| m.as_str()).unwrap_or_default();
    if body.trim().is_empty() {
        return None;
    }
    Some(parse_body(body, line_number, completed))
}

/// Scan a document for task lines.
///
/// Completed tasks are skipped unless `include_completed` is set.
pub fn parse_tasks(document: &str, include_completed: bool) -> Vec<ExtractedTask> {
    document
        .lines()
        .enumerate()
        .filter_map(|(index, line)| parse_task_line(line, index + 1))
        .filter(|task| include_completed || !task.completed)
        .collect()
}

fn parse_body(body: &str, line_number: usize, completed: bool) -> ExtractedTask {
    let raw_text = body.trim().to_string();
    let mut links = Vec::new();

    for captures in MARKDOWN_LINK.captures_iter(&raw_text) {
        let title = captures[1].trim();
        links.push(TaskLink {
            url: trim_url(&captures[2]).to_string(),
            title: (!title.is_empty()).then(|| title.to_string()),
        });
    }
    // Link titles stay in the text, URLs go
    let without_markdown = MARKDOWN_LINK.replace_all(&raw_text, "$1");

    for found in BARE_URL.find_iter(&without_markdown) {
        let url = trim_url(found.as_str());
        if !links.iter().any(|link| link.url == url) {
            links.push(TaskLink {
                url: url.to_string(),
                title: None,
            });
        }
    }
    let without_urls = BARE_URL.replace_all(&without_markdown, " ");

    let tags: Vec<String> = TAG
        .captures_iter(&without_urls)
        .map(|c| c[1].to_string())
        .collect();
    let without_tags = TAG.replace_all(&without_urls, " ");

    let text = without_tags.split_whitespace().collect::<Vec<_>>().join(" ");

    ExtractedTask {
        raw_text,
        text,
        tags,
        links,
        line_number,
        completed,
    }
}

fn trim_url(url: &str) -> &str {
    url.trim_end_matches(['.', ',', ';', ':', '!', '?', '"', '\''])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_task_with_tag_and_url() {
        let task = parse_task_line("- [ ] read this #research https://example.com/article", 3)
            .unwrap();

        assert_eq!(task.text, "read this");
        assert_eq!(task.tags, vec!["research"]);
        assert_eq!(task.links.len(), 1);
        assert_eq!(task.links[0].url, "https://example.com/article");
        assert_eq!(task.links[0].title, None);
        assert_eq!(task.line_number, 3);
        assert!(!task.completed);
    }

    #[test]
    fn test_markdown_link_keeps_title() {
        let task =
            parse_task_line("* [ ] Look at [the guide](https://docs.rs/regex). #rust", 1).unwrap();

        assert_eq!(task.text, "Look at the guide.");
        assert_eq!(task.links[0].url, "https://docs.rs/regex");
        assert_eq!(task.links[0].title.as_deref(), Some("the guide"));
        assert_eq!(task.tags, vec!["rust"]);
    }

    #[test]
    fn test_trailing_punctuation_trimmed_from_url() {
        let task = parse_task_line("- [ ] see https://example.com/page.", 1).unwrap();
        assert_eq!(task.links[0].url, "https://example.com/page");
    }

    #[test]
    fn test_url_fragment_is_not_a_tag() {
        let task = parse_task_line("- [ ] docs https://example.com/a#section", 1).unwrap();
        assert!(task.tags.is_empty());
        assert_eq!(task.links[0].url, "https://example.com/a#section");
    }

    #[test]
    fn test_parse_tasks_skips_non_tasks_and_done() {
        let document = "# Inbox\n\n- [ ] first\nplain line\n- [x] done already\n  - [ ] nested #later\n- [ ]   \n";
        let tasks = parse_tasks(document, false);

        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].text, "first");
        assert_eq!(tasks[0].line_number, 3);
        assert_eq!(tasks[1].text, "nested");
        assert_eq!(tasks[1].tags, vec!["later"]);

        let all = parse_tasks(document, true);
        assert_eq!(all.len(), 3);
        assert!(all[1].completed);
    }

    #[test]
    fn test_subject_falls_back_to_raw_text() {
        let task = ExtractedTask::from_text("https://example.com/only-a-link");
        assert_eq!(task.text, "");
        assert_eq!(task.subject(), "https://example.com/only-a-link");
    }
}
