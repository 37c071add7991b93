//! # Reddit Extraction
//!
//! Reddit posts are read through the public JSON form of a post URL
//! (`{post}.json`), which returns a two-element array: the post listing and
//! the comment listing. Share links (`/s/...` paths and `redd.it`) are first
//! resolved to the canonical post URL by scanning the share page.

use std::sync::LazyLock;

use scraper::{Html, Selector};
use serde::Deserialize;
use tracing::{debug, instrument, warn};
use url::Url;

use super::{ExtractedContent, ExtractionResult, Strategy, truncate_chars};
use crate::fetch::{Fetch, FetchRequest};

/// Assembled text must be longer than this to count as content
pub const MIN_CONTENT_CHARS: usize = 100;

/// Number of top-level comments included
pub const MAX_COMMENTS: usize = 5;

/// Per-comment character limit
pub const MAX_COMMENT_CHARS: usize = 300;

static CANONICAL_LINK: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"link[rel="canonical"][href]"#).unwrap());
static CANONICAL_MARKER: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("shreddit-canonical-url-updater[value]").unwrap());
static OG_URL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"meta[property="og:url"][content]"#).unwrap());

#[derive(Debug, Deserialize)]
struct Listing<T> {
    data: ListingData<T>,
}

#[derive(Debug, Deserialize)]
struct ListingData<T> {
    #[serde(default = "Vec::new")]
    children: Vec<Thing<T>>,
}

#[derive(Debug, Deserialize)]
struct Thing<T> {
    #[serde(default)]
    kind: String,
    data: T,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Post {
    title: String,
    selftext: String,
    url: Option<String>,
    author: String,
    subreddit: String,
    score: i64,
    num_comments: u64,
    is_self: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Comment {
    body: Option<String>,
    author: Option<String>,
}

/// Whether the URL points at Reddit
pub fn is_reddit_url(url: &Url) -> bool {
    url.host_str().is_some_and(|host| {
        let host = host.trim_start_matches("www.");
        host == "redd.it" || host == "reddit.com" || host.ends_with(".reddit.com")
    })
}

/// Whether the URL is a share short-link that needs resolving first
pub fn is_share_url(url: &Url) -> bool {
    url.host_str() == Some("redd.it") || url.path().contains("/s/")
}

/// Find the canonical post URL in a share page.
///
/// Checks, in order, `<link rel="canonical">`, the canonical-URL marker
/// element, and `og:url`. Relative values resolve against `page_url`.
pub fn find_canonical_url(html: &str, page_url: &Url) -> Option<Url> {
    let document = Html::parse_document(html);
    let candidates = [
        (&*CANONICAL_LINK, "href"),
        (&*CANONICAL_MARKER, "value"),
        (&*OG_URL, "content"),
    ];
    candidates.iter().find_map(|(selector, attr)| {
        document
            .select(selector)
            .filter_map(|el| el.value().attr(attr))
            .map(str::trim)
            .find(|value| !value.is_empty())
            .and_then(|value| page_url.join(value).ok())
    })
}

/// JSON API form of a post URL: no query or fragment, no trailing slash,
/// `.json` appended
pub fn json_api_url(post_url: &Url) -> String {
    let mut url = post_url.clone();
    url.set_query(None);
    url.set_fragment(None);
    let base = url.as_str().trim_end_matches('/');
    if base.ends_with(".json") {
        base.to_string()
    } else {
        format!("{}.json", base)
    }
}

async fn resolve_share_url<F: Fetch>(fetcher: &F, url: &Url, user_agent: &str) -> Url {
    let outcome = fetcher
        .fetch(FetchRequest::get(url.as_str()).header("User-Agent", user_agent))
        .await;
    let Some(response) = outcome.into_response() else {
        debug!("Could not load share page, keeping original URL");
        return url.clone();
    };
    let page_url = Url::parse(&response.final_url).unwrap_or_else(|_| url.clone());
    match find_canonical_url(&response.body, &page_url) {
        Some(canonical) => {
            debug!("Resolved share link to {}", canonical);
            canonical
        }
        // A redirect may already have landed on the post
        None if page_url.path().contains("/comments/") => page_url,
        None => url.clone(),
    }
}

/// Run the Reddit strategy for one URL
#[instrument(skip(fetcher, user_agent), fields(url = %url))]
pub async fn extract<F: Fetch>(fetcher: &F, url: &Url, user_agent: &str) -> ExtractionResult {
    let post_url = if is_share_url(url) {
        resolve_share_url(fetcher, url, user_agent).await
    } else {
        url.clone()
    };

    let api_url = json_api_url(&post_url);
    let outcome = fetcher
        .fetch(
            FetchRequest::get(&api_url)
                .header("User-Agent", user_agent)
                .header("Accept", "application/json"),
        )
        .await;
    let description = outcome.describe();
    let Some(body) = outcome.into_body() else {
        warn!("Reddit JSON fetch failed: {}", description);
        return ExtractionResult::Failed(format!("reddit: {}", description));
    };

    match parse_post(&body) {
        Some((title, text)) if text.chars().count() > MIN_CONTENT_CHARS => {
            ExtractionResult::Content(ExtractedContent {
                text,
                strategy: Strategy::Reddit,
                title: Some(title),
                video: None,
            })
        }
        Some(_) => {
            debug!("Reddit post too short to use");
            ExtractionResult::Empty
        }
        None => {
            debug!("Reddit response did not have the expected shape");
            ExtractionResult::Empty
        }
    }
}

/// Parse the `[post listing, comment listing]` payload into a title and text
fn parse_post(body: &str) -> Option<(String, String)> {
    let listings: Vec<serde_json::Value> = serde_json::from_str(body).ok()?;
    let mut listings = listings.into_iter();

    let post_listing: Listing<Post> = serde_json::from_value(listings.next()?).ok()?;
    let post = post_listing.data.children.into_iter().next()?.data;

    let comments: Vec<(String, String)> = listings
        .next()
        .and_then(|value| serde_json::from_value::<Listing<Comment>>(value).ok())
        .map(|listing| {
            listing
                .data
                .children
                .into_iter()
                .filter(|thing| thing.kind.is_empty() || thing.kind == "t1")
                .filter_map(|thing| {
                    let body = thing.data.body?.trim().to_string();
                    if body.is_empty() || body == "[deleted]" || body == "[removed]" {
                        return None;
                    }
                    let author = thing.data.author.unwrap_or_else(|| "[unknown]".to_string());
                    Some((author, truncate_chars(&body, MAX_COMMENT_CHARS)))
                })
                .take(MAX_COMMENTS)
                .collect()
        })
        .unwrap_or_default();

    let mut text = String::new();
    if !post.title.is_empty() {
        text.push_str(&format!("Title: {}\n", post.title));
    }
    if !post.subreddit.is_empty() {
        text.push_str(&format!("Subreddit: r/{}\n", post.subreddit));
    }
    if !post.author.is_empty() {
        text.push_str(&format!("Author: u/{}\n", post.author));
    }
    text.push_str(&format!(
        "Score: {} | Comments: {}\n",
        post.score, post.num_comments
    ));
    if let Some(link) = post.url.as_deref().filter(|_| !post.is_self) {
        text.push_str(&format!("Link: {}\n", link));
    }
    let selftext = post.selftext.trim();
    if !selftext.is_empty() {
        text.push('\n');
        text.push_str(selftext);
        text.push('\n');
    }
    if !comments.is_empty() {
        text.push_str("\nTop comments:\n");
        for (author, body) in &comments {
            text.push_str(&format!("- u/{}: {}\n", author, body));
        }
    }

    Some((post.title, text.trim_end().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::mock::MockFetcher;
    use crate::fetch::{FetchOutcome, FetchResponse};

    const UA: &str = "test-agent";

    fn post_json(selftext: &str, comments: &[&str]) -> String {
        let children: Vec<serde_json::Value> = comments
            .iter()
            .map(|body| serde_json::json!({"kind": "t1", "data": {"body": body, "author": "commenter"}}))
            .chain(std::iter::once(
                serde_json::json!({"kind": "more", "data": {"count": 12, "children": ["abc"]}}),
            ))
            .collect();
        serde_json::json!([
            {"kind": "Listing", "data": {"children": [{"kind": "t3", "data": {
                "title": "Which async runtime should I learn first?",
                "selftext": selftext,
                "url": "https://www.reddit.com/r/rust/comments/abc123/which_async_runtime/",
                "author": "ferris",
                "subreddit": "rust",
                "score": 321,
                "num_comments": 45,
                "is_self": true
            }}]}},
            {"kind": "Listing", "data": {"children": children}}
        ])
        .to_string()
    }

    #[test]
    fn test_url_detection() {
        let post = Url::parse("https://www.reddit.com/r/rust/comments/abc123/title/").unwrap();
        let share = Url::parse("https://www.reddit.com/r/rust/s/XyZ123").unwrap();
        let short = Url::parse("https://redd.it/abc123").unwrap();
        let other = Url::parse("https://notreddit.com/r/rust").unwrap();

        assert!(is_reddit_url(&post) && !is_share_url(&post));
        assert!(is_reddit_url(&share) && is_share_url(&share));
        assert!(is_reddit_url(&short) && is_share_url(&short));
        assert!(!is_reddit_url(&other));
        assert!(is_reddit_url(&Url::parse("https://old.reddit.com/r/rust").unwrap()));
    }

    #[test]
    fn test_json_api_url() {
        let url = Url::parse("https://www.reddit.com/r/rust/comments/abc123/title/?utm_source=share#top").unwrap();
        assert_eq!(
            json_api_url(&url),
            "https://www.reddit.com/r/rust/comments/abc123/title.json"
        );
    }

    #[test]
    fn test_canonical_priority() {
        let page = Url::parse("https://www.reddit.com/r/rust/s/XyZ123").unwrap();
        let html = r#"<html><head>
            <meta property="og:url" content="https://www.reddit.com/r/rust/comments/og/">
            <link rel="canonical" href="https://www.reddit.com/r/rust/comments/canonical/">
            </head><body>
            <shreddit-canonical-url-updater value="/r/rust/comments/marker/"></shreddit-canonical-url-updater>
            </body></html>"#;
        assert_eq!(
            find_canonical_url(html, &page).unwrap().as_str(),
            "https://www.reddit.com/r/rust/comments/canonical/"
        );

        let marker_only = r#"<html><body><shreddit-canonical-url-updater value="/r/rust/comments/marker/"></shreddit-canonical-url-updater>
            <meta property="og:url" content="https://www.reddit.com/r/rust/comments/og/"></body></html>"#;
        assert_eq!(
            find_canonical_url(marker_only, &page).unwrap().as_str(),
            "https://www.reddit.com/r/rust/comments/marker/"
        );

        assert_eq!(find_canonical_url("<html></html>", &page), None);
    }

    #[tokio::test]
    async fn test_share_link_uses_canonical_url() {
        let fetcher = MockFetcher::new();
        let share = "https://www.reddit.com/r/rust/s/XyZ123";
        fetcher.respond_ok(
            share,
            r#"<html><head><link rel="canonical" href="https://www.reddit.com/r/rust/comments/abc123/which_async_runtime/"></head></html>"#,
        );
        fetcher.respond_ok(
            "https://www.reddit.com/r/rust/comments/abc123/which_async_runtime.json",
            &post_json(
                "I have been writing sync Rust for a year and want to move to async services.",
                &["Start with tokio, it has the biggest ecosystem.", "", "[deleted]"],
            ),
        );

        let result = extract(&fetcher, &Url::parse(share).unwrap(), UA).await;
        let ExtractionResult::Content(content) = result else {
            panic!("expected content, got {:?}", result);
        };
        assert_eq!(content.strategy, Strategy::Reddit);
        assert_eq!(
            content.title.as_deref(),
            Some("Which async runtime should I learn first?")
        );
        assert!(content.text.contains("r/rust"));
        assert!(content.text.contains("- u/commenter: Start with tokio"));
        assert!(!content.text.contains("[deleted]"));
        assert!(!fetcher.calls().iter().any(|u| u.contains("XyZ123.json")));
    }

    #[tokio::test]
    async fn test_comments_are_limited_and_truncated() {
        let fetcher = MockFetcher::new();
        let long = "x".repeat(500);
        let comments = ["one", "two", "three", "four", "five", "six", long.as_str()];
        let mut bodies = vec![long.as_str()];
        bodies.extend_from_slice(&comments[..6]);
        fetcher.respond_ok(
            "https://www.reddit.com/r/rust/comments/abc123.json",
            &post_json("body", &bodies),
        );

        let url = Url::parse("https://www.reddit.com/r/rust/comments/abc123").unwrap();
        let ExtractionResult::Content(content) = extract(&fetcher, &url, UA).await else {
            panic!("expected content");
        };
        let comment_lines: Vec<&str> = content
            .text
            .lines()
            .filter(|l| l.starts_with("- u/"))
            .collect();
        assert_eq!(comment_lines.len(), MAX_COMMENTS);
        assert!(comment_lines[0].chars().count() <= "- u/commenter: ".len() + MAX_COMMENT_CHARS);
        assert!(!content.text.contains("six"));
    }

    #[tokio::test]
    async fn test_short_post_is_empty() {
        let fetcher = MockFetcher::new();
        fetcher.respond_ok(
            "https://www.reddit.com/r/a/comments/x.json",
            r#"[{"data": {"children": [{"kind": "t3", "data": {"title": "Hi"}}]}}, {"data": {"children": []}}]"#,
        );
        let url = Url::parse("https://www.reddit.com/r/a/comments/x").unwrap();
        assert_eq!(extract(&fetcher, &url, UA).await, ExtractionResult::Empty);
    }

    #[tokio::test]
    async fn test_unexpected_shape_is_empty() {
        let fetcher = MockFetcher::new();
        fetcher.respond_ok("https://www.reddit.com/r/a/comments/x.json", r#"{"error": 403}"#);
        let url = Url::parse("https://www.reddit.com/r/a/comments/x").unwrap();
        assert_eq!(extract(&fetcher, &url, UA).await, ExtractionResult::Empty);
    }

    #[tokio::test]
    async fn test_http_error_is_failed() {
        let fetcher = MockFetcher::new();
        fetcher.respond(
            "https://www.reddit.com/r/a/comments/x.json",
            FetchOutcome::ClientError(404),
        );
        let url = Url::parse("https://www.reddit.com/r/a/comments/x").unwrap();
        assert!(matches!(
            extract(&fetcher, &url, UA).await,
            ExtractionResult::Failed(_)
        ));
    }

    #[tokio::test]
    async fn test_redirected_share_link_without_markers() {
        let fetcher = MockFetcher::new();
        let share = "https://redd.it/abc123";
        fetcher.respond(
            share,
            FetchOutcome::Success(FetchResponse {
                status: 200,
                body: "<html></html>".into(),
                final_url: "https://www.reddit.com/r/rust/comments/abc123/title/".into(),
            }),
        );
        fetcher.respond_ok(
            "https://www.reddit.com/r/rust/comments/abc123/title.json",
            &post_json("A self post body that is long enough to be kept by the extractor logic here.", &[]),
        );
        let result = extract(&fetcher, &Url::parse(share).unwrap(), UA).await;
        assert!(matches!(result, ExtractionResult::Content(_)));
    }
}
