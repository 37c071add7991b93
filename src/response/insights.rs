//! Structured video summaries recovered from model output

use serde::{Deserialize, Serialize};

use super::recovery::{FieldSpec, list_field, recover_object, text_field};
use super::{ITEM_LIMIT, limit_items, truncate_sentence_aware};
use crate::prompt::VideoContentType;

/// Longest video summary kept
pub const SUMMARY_LIMIT: usize = 1200;

/// Most items kept per insight list
pub const MAX_INSIGHT_ITEMS: usize = 8;

const INSIGHT_FIELDS: &[FieldSpec] = &[
    FieldSpec::text("summary", &["overview", "description"]),
    FieldSpec::list("keyTakeaways", &["key_takeaways", "takeaways", "keyPoints", "key_points"]),
    FieldSpec::list("toolsAndCommands", &["tools_and_commands", "tools", "commands"]),
    FieldSpec::list("steps", &["instructions"]),
    FieldSpec::list("troubleshooting", &["pitfalls", "commonMistakes", "common_mistakes"]),
    FieldSpec::list("pros", &["strengths"]),
    FieldSpec::list("cons", &["weaknesses"]),
    FieldSpec::text("verdict", &["conclusion"]),
];

/// What a video summary extracted, shaped by the video's content type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoInsights {
    pub content_type: VideoContentType,
    pub summary: String,
    pub key_takeaways: Vec<String>,
    pub tools_and_commands: Vec<String>,
    pub steps: Vec<String>,
    pub troubleshooting: Vec<String>,
    pub pros: Vec<String>,
    pub cons: Vec<String>,
    pub verdict: Option<String>,
}

/// Parse a video summary response. Never fails: when no summary is found the
/// raw response, then `fallback`, stands in for it.
pub fn parse_video_insights(raw: &str, content_type: VideoContentType, fallback: &str) -> VideoInsights {
    let object = recover_object(raw, INSIGHT_FIELDS)
        .map(|(_, object)| object)
        .unwrap_or_default();
    let list = |index: usize| limit_items(list_field(&object, &INSIGHT_FIELDS[index]), MAX_INSIGHT_ITEMS, ITEM_LIMIT);

    let summary = text_field(&object, &INSIGHT_FIELDS[0])
        .or_else(|| {
            // Raw text only makes sense when nothing at all was recovered
            Some(raw.trim())
                .filter(|s| object.is_empty() && !s.is_empty())
                .map(str::to_string)
        })
        .unwrap_or_else(|| fallback.trim().to_string());

    VideoInsights {
        content_type,
        summary: truncate_sentence_aware(&summary, SUMMARY_LIMIT),
        key_takeaways: list(1),
        tools_and_commands: list(2),
        steps: list(3),
        troubleshooting: list(4),
        pros: list(5),
        cons: list(6),
        verdict: text_field(&object, &INSIGHT_FIELDS[7])
            .map(|v| truncate_sentence_aware(&v, ITEM_LIMIT)),
    }
}

impl VideoInsights {
    /// Plain text form used as analysis context
    pub fn to_context_text(&self) -> String {
        let mut text = self.summary.clone();
        let sections: [(&str, &[String]); 6] = [
            ("Key takeaways", &self.key_takeaways),
            ("Tools and commands", &self.tools_and_commands),
            ("Steps", &self.steps),
            ("Troubleshooting", &self.troubleshooting),
            ("Pros", &self.pros),
            ("Cons", &self.cons),
        ];
        for (heading, items) in sections {
            if items.is_empty() {
                continue;
            }
            text.push_str(&format!("\n{}:", heading));
            for item in items {
                text.push_str(&format!("\n- {}", item));
            }
        }
        if let Some(verdict) = &self.verdict {
            text.push_str(&format!("\nVerdict: {}", verdict));
        }
        text
    }
}
