//! Staged recovery of a JSON object from model output.
//!
//! Each stage takes the raw text and the expected fields and either produces
//! a JSON object or gives up. Stages run in order until one produces an
//! object holding at least one expected field.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};

/// Shape of one expected field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    List,
}

/// An expected field and the alternative names models use for it
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub key: &'static str,
    pub aliases: &'static [&'static str],
    pub kind: FieldKind,
}

impl FieldSpec {
    pub const fn text(key: &'static str, aliases: &'static [&'static str]) -> Self {
        Self {
            key,
            aliases,
            kind: FieldKind::Text,
        }
    }

    pub const fn list(key: &'static str, aliases: &'static [&'static str]) -> Self {
        Self {
            key,
            aliases,
            kind: FieldKind::List,
        }
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        std::iter::once(self.key).chain(self.aliases.iter().copied())
    }
}

/// Most items kept from a list field recovered by regex
pub const MAX_RECOVERED_ITEMS: usize = 5;

/// Which stage produced the object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Direct,
    BalancedObject,
    FieldRegex,
}

type StageFn = fn(&str, &[FieldSpec]) -> Option<Map<String, Value>>;

const STAGES: [(Stage, StageFn); 3] = [
    (Stage::Direct, parse_direct),
    (Stage::BalancedObject, parse_balanced_object),
    (Stage::FieldRegex, parse_field_regex),
];

static FENCE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"```[A-Za-z]*").unwrap());
static CONTROL_WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[\r\n\t]+").unwrap());
static QUOTED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""((?:[^"\\]|\\.)*)(?:"|$)"#).unwrap());

/// Run the stages in order and return the first object holding any of the
/// expected fields
pub fn recover_object(raw: &str, fields: &[FieldSpec]) -> Option<(Stage, Map<String, Value>)> {
    STAGES.iter().find_map(|(stage, run)| {
        run(raw, fields)
            .filter(|object| has_any_field(object, fields))
            .map(|object| (*stage, object))
    })
}

fn has_any_field(object: &Map<String, Value>, fields: &[FieldSpec]) -> bool {
    fields
        .iter()
        .flat_map(|f| f.names())
        .any(|name| object.get(name).is_some_and(|v| !v.is_null()))
}

/// Stage 1: the whole response is a JSON object
pub fn parse_direct(raw: &str, _fields: &[FieldSpec]) -> Option<Map<String, Value>> {
    match serde_json::from_str::<Value>(raw.trim()) {
        Ok(Value::Object(object)) => Some(object),
        _ => None,
    }
}

/// Stage 2: strip code fences, flatten control whitespace, and parse the
/// first balanced `{...}`
pub fn parse_balanced_object(raw: &str, _fields: &[FieldSpec]) -> Option<Map<String, Value>> {
    let cleaned = normalize(raw);
    let candidate = first_balanced_object(&cleaned)?;
    match serde_json::from_str::<Value>(candidate) {
        Ok(Value::Object(object)) => Some(object),
        _ => None,
    }
}

/// Stage 3: pull `"field": "..."` and `"field": [...]` out one at a time
pub fn parse_field_regex(raw: &str, fields: &[FieldSpec]) -> Option<Map<String, Value>> {
    let cleaned = normalize(raw);
    let mut object = Map::new();
    for field in fields {
        let names = field
            .names()
            .map(regex::escape)
            .collect::<Vec<_>>()
            .join("|");
        let value = match field.kind {
            FieldKind::Text => extract_text(&cleaned, &names).map(Value::String),
            FieldKind::List => extract_list(&cleaned, &names)
                .map(|items| Value::Array(items.into_iter().map(Value::String).collect())),
        };
        if let Some(value) = value {
            object.insert(field.key.to_string(), value);
        }
    }
    (!object.is_empty()).then_some(object)
}

fn normalize(raw: &str) -> String {
    let without_fences = FENCE.replace_all(raw, "");
    CONTROL_WHITESPACE
        .replace_all(&without_fences, " ")
        .trim()
        .to_string()
}

/// First `{...}` with balanced braces, ignoring braces inside strings
pub fn first_balanced_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, c) in text[start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Undo JSON string escapes, tolerating invalid ones
pub fn unescape(raw: &str) -> String {
    if let Ok(s) = serde_json::from_str::<String>(&format!("\"{}\"", raw)) {
        return s;
    }
    raw.replace("\\n", "\n")
        .replace("\\t", " ")
        .replace("\\\"", "\"")
        .replace("\\/", "/")
        .replace("\\\\", "\\")
}

fn extract_text(text: &str, names: &str) -> Option<String> {
    // An unterminated string at the end of the text still counts
    let pattern = format!(r#""(?:{})"\s*:\s*"((?:[^"\\]|\\.)*)(?:"|$)"#, names);
    let re = Regex::new(&pattern).ok()?;
    let caps = re.captures(text)?;
    let value = unescape(caps.get(1)?.as_str()).trim().to_string();
    (!value.is_empty()).then_some(value)
}

fn extract_list(text: &str, names: &str) -> Option<Vec<String>> {
    let pattern = format!(r#""(?:{})"\s*:\s*\[((?:[^\]"]|"(?:[^"\\]|\\.)*(?:"|$))*)(?:\]|$)"#, names);
    let re = Regex::new(&pattern).ok()?;
    let body = re.captures(text)?.get(1)?.as_str();

    let quoted: Vec<String> = QUOTED
        .captures_iter(body)
        .filter_map(|caps| caps.get(1))
        .map(|m| unescape(m.as_str()).trim().to_string())
        .collect();
    let items: Vec<String> = if quoted.is_empty() {
        body.split([',', '\n'])
            .map(|item| {
                item.trim()
                    .trim_matches(|c: char| c == '"' || c == '\'' || c == '-' || c == '*')
                    .trim()
                    .to_string()
            })
            .collect()
    } else {
        quoted
    };

    let items: Vec<String> = items
        .into_iter()
        .filter(|item| !item.is_empty())
        .take(MAX_RECOVERED_ITEMS)
        .collect();
    (!items.is_empty()).then_some(items)
}

/// Text value for a field under any of its names. Lists are joined.
pub fn text_field(object: &Map<String, Value>, field: &FieldSpec) -> Option<String> {
    field.names().find_map(|name| match object.get(name)? {
        Value::String(s) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
        Value::Array(items) => {
            let joined = items
                .iter()
                .filter_map(value_text)
                .collect::<Vec<_>>()
                .join(" ");
            (!joined.is_empty()).then_some(joined)
        }
        other => value_text(other),
    })
}

/// List value for a field under any of its names. A string is split into
/// lines.
pub fn list_field(object: &Map<String, Value>, field: &FieldSpec) -> Vec<String> {
    field
        .names()
        .find_map(|name| {
            let items: Vec<String> = match object.get(name)? {
                Value::Array(items) => items.iter().filter_map(value_text).collect(),
                Value::String(s) => s
                    .lines()
                    .map(|line| {
                        line.trim()
                            .trim_start_matches(|c: char| {
                                c == '-' || c == '*' || c == '•' || c.is_ascii_digit() || c == '.'
                            })
                            .trim()
                            .to_string()
                    })
                    .filter(|line| !line.is_empty())
                    .collect(),
                _ => return None,
            };
            (!items.is_empty()).then_some(items)
        })
        .unwrap_or_default()
}

fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Object(object) => ["text", "title", "step", "query", "description"]
            .iter()
            .find_map(|key| object.get(*key).and_then(value_text)),
        _ => None,
    }
}
