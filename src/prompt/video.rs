//! Video content classification and the structured templates used to
//! summarise each kind of video.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::extractor::{ContentRichness, VideoContent, VideoMetadata};

static TUTORIAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(tutorials?|how[ -]to|step[ -]by[ -]step|guide|walk-?through|set ?up|getting started|beginners?)\b").unwrap()
});
static TECHNICAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(terminal|command[ -]line|cli|shell|bash|install(ing|ation)?|code|coding|programming|script|api|docker|kubernetes|linux|git|npm|cargo|pip|python|javascript|typescript|rust|compile|configure|config|server|deploy(ment)?|database|sql)\b").unwrap()
});
static REVIEW: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(reviews?|vs\.?|versus|pros|cons|comparison|compared|worth it|unboxing|hands[ -]on)\b").unwrap()
});
static PRESENTATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(talk|keynote|conference|presentation|lecture|webinar|panel|summit|meetup)\b").unwrap()
});
static EDUCATIONAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(explained|explains?|learn(ing)?|course|lesson|introduction to|fundamentals|history of|science|theory|documentary|deep dive)\b").unwrap()
});
static NEWS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(news|breaking|announced|announcement|released|release notes|report|this week in)\b").unwrap()
});

/// Kind of video, decided from keywords in its title, description and
/// transcript
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VideoContentType {
    TechnicalTutorial,
    Tutorial,
    Educational,
    Review,
    Presentation,
    News,
    General,
}

impl VideoContentType {
    /// Classify combined title, description and transcript text.
    ///
    /// A tutorial that also mentions technical tooling is a technical
    /// tutorial; otherwise the first matching kind wins in the order review,
    /// tutorial, presentation, educational, news.
    pub fn classify(text: &str) -> Self {
        let tutorial = TUTORIAL.is_match(text);
        if tutorial && TECHNICAL.is_match(text) {
            VideoContentType::TechnicalTutorial
        } else if REVIEW.is_match(text) {
            VideoContentType::Review
        } else if tutorial {
            VideoContentType::Tutorial
        } else if PRESENTATION.is_match(text) {
            VideoContentType::Presentation
        } else if EDUCATIONAL.is_match(text) {
            VideoContentType::Educational
        } else if NEWS.is_match(text) {
            VideoContentType::News
        } else {
            VideoContentType::General
        }
    }

    /// Classify a video from everything known about it
    pub fn for_video(video: &VideoContent) -> Self {
        let meta = &video.metadata;
        let mut text = format!("{}\n{}\n{}", meta.title, meta.description, meta.keywords.join(" "));
        if let Some(transcript) = &video.transcript {
            text.push('\n');
            text.push_str(&transcript.full_text);
        }
        Self::classify(&text)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            VideoContentType::TechnicalTutorial => "technical_tutorial",
            VideoContentType::Tutorial => "tutorial",
            VideoContentType::Educational => "educational",
            VideoContentType::Review => "review",
            VideoContentType::Presentation => "presentation",
            VideoContentType::News => "news",
            VideoContentType::General => "general",
        }
    }

    /// What the summary should concentrate on
    pub fn focus(&self) -> &'static str {
        match self {
            VideoContentType::TechnicalTutorial => {
                "This is a technical tutorial. Capture the exact tools, commands and configuration shown, the order of the steps, and any errors or pitfalls mentioned."
            }
            VideoContentType::Tutorial => {
                "This is a tutorial. Capture the steps in order, what is needed before starting, and common mistakes."
            }
            VideoContentType::Educational => {
                "This is educational content. Capture the core concepts, how they relate, and the examples used to explain them."
            }
            VideoContentType::Review => {
                "This is a review or comparison. Capture what is reviewed, the main strengths and weaknesses, and the final verdict."
            }
            VideoContentType::Presentation => {
                "This is a talk or presentation. Capture the thesis, the main arguments, and any recommendations to the audience."
            }
            VideoContentType::News => {
                "This is news coverage. Capture what happened, who is affected, and what changes as a result."
            }
            VideoContentType::General => {
                "Capture the main points and anything the viewer is asked to do."
            }
        }
    }

    /// JSON shape the model must return for this kind of video
    pub fn template(&self) -> &'static str {
        match self {
            VideoContentType::TechnicalTutorial => {
                r#"{
  "summary": "2-4 sentences on what is built or configured and the end result",
  "keyTakeaways": ["most important lessons"],
  "toolsAndCommands": ["specific tools, packages and commands, verbatim"],
  "steps": ["ordered steps as shown"],
  "troubleshooting": ["errors, pitfalls and their fixes"]
}"#
            }
            VideoContentType::Tutorial => {
                r#"{
  "summary": "2-4 sentences on what the tutorial teaches",
  "keyTakeaways": ["most important lessons"],
  "steps": ["ordered steps"],
  "troubleshooting": ["common mistakes and how to avoid them"]
}"#
            }
            VideoContentType::Educational => {
                r#"{
  "summary": "2-4 sentences on the subject and its main idea",
  "keyTakeaways": ["core concepts explained"]
}"#
            }
            VideoContentType::Review => {
                r#"{
  "summary": "2-4 sentences on what is reviewed and how",
  "pros": ["strengths"],
  "cons": ["weaknesses"],
  "verdict": "one sentence final verdict",
  "keyTakeaways": ["points a buyer or user should know"]
}"#
            }
            VideoContentType::Presentation => {
                r#"{
  "summary": "2-4 sentences on the talk's thesis",
  "keyTakeaways": ["main arguments and recommendations"]
}"#
            }
            VideoContentType::News => {
                r#"{
  "summary": "2-4 sentences on what happened",
  "keyTakeaways": ["consequences and who is affected"]
}"#
            }
            VideoContentType::General => {
                r#"{
  "summary": "2-4 sentences on the video's content",
  "keyTakeaways": ["main points"]
}"#
            }
        }
    }
}

impl fmt::Display for VideoContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn metadata_header(meta: &VideoMetadata) -> String {
    let mut header = format!("Title: {}\n", meta.title);
    if !meta.author.is_empty() {
        header.push_str(&format!("Channel: {}\n", meta.author));
    }
    header
}

/// Prompt summarising a video with the template for its type.
///
/// `content` is the already truncated extraction text, which carries the
/// transcript when one was found.
pub fn build_video_prompt(
    video: &VideoContent,
    content_type: VideoContentType,
    content: &str,
    task_context: Option<&str>,
) -> String {
    let has_transcript = video.transcript.as_ref().is_some_and(|t| !t.is_empty());
    let mut prompt = String::from("You are summarising a video so a user can act on it later.\n");
    prompt.push_str(content_type.focus());
    prompt.push('\n');

    if !has_transcript {
        match video.metadata.richness() {
            ContentRichness::Rich => prompt.push_str(
                "No transcript is available. Work from the description and chapter list, which are detailed.\n",
            ),
            ContentRichness::Sparse => prompt.push_str(
                "No transcript is available and the description is brief. Keep the summary short and do not invent details; leave lists empty when unsure.\n",
            ),
        }
    }
    if let Some(task) = task_context {
        prompt.push_str(&format!(
            "The user saved this video for the task: \"{}\". Emphasise what matters for that task.\n",
            task
        ));
    }

    prompt.push_str(&format!(
        "\nContent type: {}\n{}\n{}\n\nRespond with only a JSON object in this format:\n{}\n",
        content_type,
        metadata_header(&video.metadata),
        content,
        content_type.template()
    ));
    prompt
}
