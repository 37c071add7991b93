//! # Readability Extraction
//!
//! Main-content detection is done by `spider_transformations` in readability
//! mode. This module prepares the page (a `<base>` so relative links resolve
//! against the page URL), applies the minimum-length threshold, and fills in
//! the article metadata from the page head.
//!
//! Returning `None` is the normal outcome for pages without a clear article
//! body, not an error.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{Html, Selector};
use spider_transformations::transformation::content::{
    ReturnFormat, TransformConfig, TransformInput, transform_content_input,
};
use tracing::debug;
use url::Url;

use super::fallback::collapse_whitespace;

/// Minimum article length. Deliberately low so short posts qualify.
pub const DEFAULT_CHAR_THRESHOLD: usize = 100;

/// Excerpts taken from the body stop after this many characters
const EXCERPT_CHARS: usize = 200;

static TITLE: LazyLock<Selector> = LazyLock::new(|| Selector::parse("title").unwrap());
static H1: LazyLock<Selector> = LazyLock::new(|| Selector::parse("h1").unwrap());
static META: LazyLock<Selector> = LazyLock::new(|| Selector::parse("meta[content]").unwrap());
static AUTHOR_LINK: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("[rel=author], .byline, .author").unwrap());
static TIME: LazyLock<Selector> = LazyLock::new(|| Selector::parse("time[datetime]").unwrap());

static EXISTING_BASE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<base\s[^>]*href").unwrap());
static HEAD_OPEN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)<head\b[^>]*>").unwrap());

/// Readable content of a page
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Article {
    pub title: Option<String>,

    /// Main content as markdown
    pub content: String,

    /// Main content as plain text
    pub text_content: String,

    pub excerpt: Option<String>,
    pub byline: Option<String>,
    pub site_name: Option<String>,
    pub published_time: Option<String>,

    /// Character count of `text_content`
    pub length: usize,
}

/// Extract the main article of `html`, resolving relative links against `url`
pub fn extract(url: &str, html: &str) -> Option<Article> {
    let html = inject_base(html, url);
    let page_url = Url::parse(url).ok();

    let text_content = transform(&html, page_url.as_ref(), ReturnFormat::Text)
        .trim()
        .to_string();
    let length = text_content.chars().count();
    if length < DEFAULT_CHAR_THRESHOLD {
        debug!(
            "Readable text has {} chars, below threshold {}",
            length, DEFAULT_CHAR_THRESHOLD
        );
        return None;
    }
    let content = transform(&html, page_url.as_ref(), ReturnFormat::Markdown)
        .trim()
        .to_string();

    let document = Html::parse_document(&html);
    Some(Article {
        title: page_title(&document),
        excerpt: meta_content(&document, &["description", "og:description"])
            .or_else(|| first_excerpt(&text_content)),
        byline: meta_content(&document, &["author", "article:author"]).or_else(|| {
            document
                .select(&AUTHOR_LINK)
                .map(|el| collapse_whitespace(&el.text().collect::<String>()))
                .find(|text| !text.is_empty())
        }),
        site_name: meta_content(&document, &["og:site_name"]),
        published_time: meta_content(&document, &["article:published_time"]).or_else(|| {
            document
                .select(&TIME)
                .next()
                .and_then(|el| el.value().attr("datetime"))
                .map(str::to_string)
        }),
        content,
        text_content,
        length,
    })
}

fn transform(html: &str, url: Option<&Url>, return_format: ReturnFormat) -> String {
    let config = TransformConfig {
        readability: true,
        main_content: true,
        return_format,
        filter_images: true,
        filter_svg: true,
        ..Default::default()
    };
    let input = TransformInput {
        url,
        content: html.as_bytes(),
        screenshot_bytes: None,
        encoding: None,
        selector_config: None,
        ignore_tags: None,
    };
    transform_content_input(input, &config)
}

/// Insert a `<base href>` for `url` unless the document already declares one
pub fn inject_base(html: &str, url: &str) -> String {
    if EXISTING_BASE.is_match(html) {
        return html.to_string();
    }
    let href = url.replace('&', "&amp;").replace('"', "&quot;");
    let tag = format!("<base href=\"{}\">", href);
    match HEAD_OPEN.find(html) {
        Some(head) => {
            let mut out = String::with_capacity(html.len() + tag.len());
            out.push_str(&html[..head.end()]);
            out.push_str(&tag);
            out.push_str(&html[head.end()..]);
            out
        }
        None => format!("<head>{}</head>{}", tag, html),
    }
}

fn page_title(document: &Html) -> Option<String> {
    meta_content(document, &["og:title", "twitter:title"])
        .or_else(|| {
            document
                .select(&TITLE)
                .next()
                .map(|el| collapse_whitespace(&el.text().collect::<String>()))
        })
        .or_else(|| {
            document
                .select(&H1)
                .next()
                .map(|el| collapse_whitespace(&el.text().collect::<String>()))
        })
        .filter(|title| !title.is_empty())
}

/// First non-empty `content` of a `<meta>` whose name or property is in `keys`
fn meta_content(document: &Html, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| {
        document.select(&META).find_map(|meta| {
            let el = meta.value();
            let name = el.attr("name").or_else(|| el.attr("property"))?;
            if !name.eq_ignore_ascii_case(key) {
                return None;
            }
            el.attr("content")
                .map(collapse_whitespace)
                .filter(|content| !content.is_empty())
        })
    })
}

fn first_excerpt(text: &str) -> Option<String> {
    let line = text.lines().map(str::trim).find(|line| !line.is_empty())?;
    Some(line.chars().take(EXCERPT_CHARS).collect())
}
