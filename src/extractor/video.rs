//! # Video Transcript Extraction
//!
//! YouTube captions are reached in three calls:
//!
//! 1. `GET` the watch page and pull the embedded Innertube API key
//! 2. `POST` the player endpoint with a mobile client context, which returns
//!    the caption tracks and the video details
//! 3. `GET` the chosen track's `baseUrl` and parse the `<text start dur>` XML
//!
//! Without a transcript the video details alone are still returned when they
//! carry a title, tagged as [`Strategy::VideoMetadata`].

use std::sync::LazyLock;

use quick_xml::Reader;
use quick_xml::events::Event;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};
use url::Url;

use super::fallback::{collapse_whitespace, decode_entities};
use super::{ExtractedContent, ExtractionResult, Strategy};
use crate::fetch::{Fetch, FetchRequest};

pub const WATCH_URL: &str = "https://www.youtube.com/watch";
pub const PLAYER_URL: &str = "https://www.youtube.com/youtubei/v1/player";
const ANDROID_CLIENT_VERSION: &str = "20.10.38";

/// Descriptions at least this long count as rich
pub const RICH_DESCRIPTION_CHARS: usize = 200;

/// This many chapters or more count as rich
pub const RICH_CHAPTER_COUNT: usize = 3;

static API_KEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""INNERTUBE_API_KEY"\s*:\s*"([^"]+)""#).unwrap());
static VIDEO_ID: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]{11}$").unwrap());
static CHAPTER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s*\(?((?:\d{1,2}:)?\d{1,2}:\d{2})\)?\s*[-–:|]?\s*(\S.*?)\s*$").unwrap()
});

/// One timed caption
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TranscriptSegment {
    pub text: String,

    /// Seconds from the start of the video
    pub start: f64,
    pub end: f64,
}

/// Full caption track of a video.
///
/// Segments are ordered by start time and do not overlap.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct VideoTranscript {
    pub full_text: String,
    pub segments: Vec<TranscriptSegment>,
}

impl VideoTranscript {
    pub fn is_empty(&self) -> bool {
        self.full_text.trim().is_empty()
    }
}

/// A chapter marker parsed from the description
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Chapter {
    pub title: String,
    pub start_secs: u64,
}

/// How much material is available for a video without its transcript
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentRichness {
    Rich,
    Sparse,
}

/// Details reported by the player endpoint
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct VideoMetadata {
    pub video_id: String,
    pub title: String,
    pub author: String,
    pub description: String,
    pub duration_secs: Option<u64>,
    pub keywords: Vec<String>,
    pub chapters: Vec<Chapter>,
}

impl VideoMetadata {
    /// No title, description or chapters to work from
    pub fn is_empty(&self) -> bool {
        self.title.trim().is_empty()
            && self.description.trim().is_empty()
            && self.chapters.is_empty()
    }

    pub fn richness(&self) -> ContentRichness {
        if self.description.chars().count() >= RICH_DESCRIPTION_CHARS
            || self.chapters.len() >= RICH_CHAPTER_COUNT
        {
            ContentRichness::Rich
        } else {
            ContentRichness::Sparse
        }
    }
}

/// Everything known about a video
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct VideoContent {
    pub metadata: VideoMetadata,
    pub transcript: Option<VideoTranscript>,
}

impl VideoContent {
    /// Plain-text rendering used as extracted content
    pub fn to_text(&self) -> String {
        let meta = &self.metadata;
        let mut text = format!("Video: {}\n", meta.title);
        if !meta.author.is_empty() {
            text.push_str(&format!("Channel: {}\n", meta.author));
        }
        if let Some(secs) = meta.duration_secs {
            text.push_str(&format!("Duration: {}\n", format_timestamp(secs)));
        }
        if !meta.chapters.is_empty() {
            text.push_str("Chapters:\n");
            for chapter in &meta.chapters {
                text.push_str(&format!(
                    "- {} {}\n",
                    format_timestamp(chapter.start_secs),
                    chapter.title
                ));
            }
        }
        if !meta.description.trim().is_empty() {
            text.push_str(&format!("Description:\n{}\n", meta.description.trim()));
        }
        if let Some(transcript) = self.transcript.as_ref().filter(|t| !t.is_empty()) {
            text.push_str(&format!("\nTranscript:\n{}\n", transcript.full_text));
        }
        text.trim_end().to_string()
    }
}

/// `h:mm:ss` or `m:ss`
pub fn format_timestamp(secs: u64) -> String {
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if h > 0 {
        format!("{}:{:02}:{:02}", h, m, s)
    } else {
        format!("{}:{:02}", m, s)
    }
}

fn parse_timestamp(stamp: &str) -> Option<u64> {
    stamp
        .split(':')
        .try_fold(0u64, |acc, part| Some(acc * 60 + part.parse::<u64>().ok()?))
}

/// Chapter markers (`0:00 Intro`) in a description, kept only when they start
/// at zero and increase
pub fn parse_chapters(description: &str) -> Vec<Chapter> {
    let mut chapters: Vec<Chapter> = Vec::new();
    for caps in CHAPTER.captures_iter(description) {
        let Some(start_secs) = parse_timestamp(&caps[1]) else {
            continue;
        };
        if chapters.last().is_some_and(|last| start_secs <= last.start_secs) {
            continue;
        }
        chapters.push(Chapter {
            title: caps[2].to_string(),
            start_secs,
        });
    }
    match chapters.first() {
        Some(first) if first.start_secs == 0 => chapters,
        _ => Vec::new(),
    }
}

/// Video ID for a YouTube URL, if it is one
pub fn video_id(url: &Url) -> Option<String> {
    let host = url.host_str()?.trim_start_matches("www.");
    let id = match host {
        "youtu.be" => url.path_segments()?.next().map(str::to_string),
        "youtube.com" | "m.youtube.com" | "music.youtube.com" | "youtube-nocookie.com" => {
            let mut segments = url.path_segments()?;
            match segments.next() {
                Some("watch") => url
                    .query_pairs()
                    .find(|(key, _)| key == "v")
                    .map(|(_, value)| value.into_owned()),
                Some("shorts" | "embed" | "live" | "v") => segments.next().map(str::to_string),
                _ => None,
            }
        }
        _ => None,
    }?;
    VIDEO_ID.is_match(&id).then_some(id)
}

/// The embedded API key on a watch page
pub fn find_api_key(page: &str) -> Option<String> {
    API_KEY.captures(page).map(|caps| caps[1].to_string())
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct PlayerResponse {
    captions: Option<Captions>,
    video_details: Option<VideoDetails>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Captions {
    #[serde(rename = "playerCaptionsTracklistRenderer")]
    tracklist: Option<TrackList>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct TrackList {
    caption_tracks: Vec<CaptionTrack>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct CaptionTrack {
    base_url: String,
    language_code: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct VideoDetails {
    title: String,
    author: String,
    short_description: String,
    /// Sent as a decimal string
    length_seconds: Option<String>,
    keywords: Vec<String>,
}

impl PlayerResponse {
    fn tracks(&self) -> &[CaptionTrack] {
        self.captions
            .as_ref()
            .and_then(|c| c.tracklist.as_ref())
            .map(|t| t.caption_tracks.as_slice())
            .unwrap_or_default()
    }

    /// English track if present, else the first one
    fn select_track(&self) -> Option<&CaptionTrack> {
        let tracks = self.tracks();
        tracks
            .iter()
            .find(|t| t.language_code == "en" || t.language_code.starts_with("en-"))
            .or_else(|| tracks.first())
            .filter(|t| !t.base_url.is_empty())
    }

    fn metadata(&self, video_id: &str) -> VideoMetadata {
        let Some(details) = self.video_details.as_ref() else {
            return VideoMetadata {
                video_id: video_id.to_string(),
                ..Default::default()
            };
        };
        VideoMetadata {
            video_id: video_id.to_string(),
            title: details.title.trim().to_string(),
            author: details.author.trim().to_string(),
            description: details.short_description.clone(),
            duration_secs: details
                .length_seconds
                .as_deref()
                .and_then(|s| s.parse().ok()),
            keywords: details.keywords.clone(),
            chapters: parse_chapters(&details.short_description),
        }
    }
}

fn player_request_body(video_id: &str) -> serde_json::Value {
    serde_json::json!({
        "context": {
            "client": {
                "clientName": "ANDROID",
                "clientVersion": ANDROID_CLIENT_VERSION,
                "androidSdkVersion": 30,
                "hl": "en",
                "gl": "US"
            }
        },
        "videoId": video_id
    })
}

/// Caption URL with any `fmt` override removed, so the classic
/// `<text start dur>` format is served
fn caption_url(base_url: &str) -> String {
    let Ok(mut url) = Url::parse(base_url) else {
        return base_url.to_string();
    };
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| key != "fmt")
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    if pairs.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(pairs);
    }
    url.to_string()
}

/// Parse a timed-text caption document.
///
/// Returns `None` for malformed XML. Text is entity-decoded twice since the
/// service double-escapes apostrophes and quotes.
pub fn parse_transcript(xml: &str) -> Option<VideoTranscript> {
    let mut reader = Reader::from_str(xml);
    let mut segments: Vec<TranscriptSegment> = Vec::new();
    let mut current: Option<(f64, f64, String)> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(element)) if element.name().as_ref() == b"text" => {
                let mut start = 0.0;
                let mut duration = 0.0;
                for attr in element.attributes().flatten() {
                    let value = String::from_utf8_lossy(&attr.value);
                    match attr.key.as_ref() {
                        b"start" => start = value.parse().unwrap_or(0.0),
                        b"dur" => duration = value.parse().unwrap_or(0.0),
                        _ => {}
                    }
                }
                current = Some((start, duration, String::new()));
            }
            Ok(Event::Text(text)) => {
                if let Some((_, _, buffer)) = current.as_mut() {
                    buffer.push_str(&String::from_utf8_lossy(&text));
                }
            }
            Ok(Event::CData(text)) => {
                if let Some((_, _, buffer)) = current.as_mut() {
                    buffer.push_str(&String::from_utf8_lossy(&text));
                }
            }
            Ok(Event::End(element)) if element.name().as_ref() == b"text" => {
                if let Some((start, duration, raw)) = current.take() {
                    let text = collapse_whitespace(&decode_entities(&decode_entities(&raw)));
                    if !text.is_empty() {
                        segments.push(TranscriptSegment {
                            text,
                            start,
                            end: start + duration.max(0.0),
                        });
                    }
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                warn!("Malformed caption XML: {}", e);
                return None;
            }
        }
    }

    segments.sort_by(|a, b| a.start.total_cmp(&b.start));
    for i in 1..segments.len() {
        let next_start = segments[i].start;
        let previous = &mut segments[i - 1];
        if previous.end > next_start {
            previous.end = next_start;
        }
    }

    let full_text = segments
        .iter()
        .map(|s| s.text.as_str())
        .collect::<Vec<_>>()
        .join(" ");
    Some(VideoTranscript {
        full_text,
        segments,
    })
}

async fn fetch_transcript<F: Fetch>(
    fetcher: &F,
    track: &CaptionTrack,
    user_agent: &str,
) -> Option<VideoTranscript> {
    let outcome = fetcher
        .fetch(FetchRequest::get(caption_url(&track.base_url)).header("User-Agent", user_agent))
        .await;
    let description = outcome.describe();
    let Some(xml) = outcome.into_body() else {
        warn!("Caption track fetch failed: {}", description);
        return None;
    };
    parse_transcript(&xml).filter(|t| !t.is_empty())
}

/// Run the video strategy for one video ID
#[instrument(skip(fetcher, user_agent))]
pub async fn extract<F: Fetch>(fetcher: &F, video_id: &str, user_agent: &str) -> ExtractionResult {
    let watch_url = format!("{}?v={}", WATCH_URL, video_id);
    let outcome = fetcher
        .fetch(
            FetchRequest::get(&watch_url)
                .header("User-Agent", user_agent)
                .header("Accept-Language", "en-US,en;q=0.9"),
        )
        .await;
    let description = outcome.describe();
    let Some(page) = outcome.into_body() else {
        warn!("Watch page fetch failed: {}", description);
        return ExtractionResult::Failed(format!("video page: {}", description));
    };

    let Some(api_key) = find_api_key(&page) else {
        debug!("No API key on watch page");
        return ExtractionResult::Failed("video: API key not found on watch page".to_string());
    };

    let player_url = format!("{}?key={}", PLAYER_URL, api_key);
    let outcome = fetcher
        .fetch(
            FetchRequest::post_json(&player_url, &player_request_body(video_id)).header(
                "User-Agent",
                format!(
                    "com.google.android.youtube/{} (Linux; U; Android 11) gzip",
                    ANDROID_CLIENT_VERSION
                ),
            ),
        )
        .await;
    let description = outcome.describe();
    let Some(body) = outcome.into_body() else {
        warn!("Player request failed: {}", description);
        return ExtractionResult::Failed(format!("video player: {}", description));
    };
    let player: PlayerResponse = match serde_json::from_str(&body) {
        Ok(player) => player,
        Err(e) => {
            warn!("Unexpected player response: {}", e);
            return ExtractionResult::Failed("video player: unexpected response".to_string());
        }
    };

    let metadata = player.metadata(video_id);
    let transcript = match player.select_track() {
        Some(track) => {
            debug!("Using caption track '{}'", track.language_code);
            fetch_transcript(fetcher, track, user_agent).await
        }
        None => {
            debug!("Video has no caption tracks");
            None
        }
    };

    content_result(VideoContent {
        metadata,
        transcript,
    })
}

fn content_result(video: VideoContent) -> ExtractionResult {
    let strategy = match &video.transcript {
        Some(_) => Strategy::VideoTranscript,
        None if !video.metadata.is_empty() => Strategy::VideoMetadata,
        None => return ExtractionResult::Empty,
    };
    ExtractionResult::Content(ExtractedContent {
        text: video.to_text(),
        strategy,
        title: Some(video.metadata.title.clone()).filter(|t| !t.is_empty()),
        video: Some(video),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::FetchOutcome;
    use crate::fetch::mock::MockFetcher;

    const ID: &str = "dQw4w9WgXcQ";
    const UA: &str = "test-agent";

    fn player_json(tracks: serde_json::Value) -> String {
        serde_json::json!({
            "playabilityStatus": {"status": "OK"},
            "captions": {"playerCaptionsTracklistRenderer": {"captionTracks": tracks}},
            "videoDetails": {
                "videoId": ID,
                "title": "Install Rust in the terminal",
                "author": "Rust Channel",
                "shortDescription": "0:00 Intro\n1:30 Installing rustup\n4:05 First build",
                "lengthSeconds": "612",
                "keywords": ["rust", "tutorial"]
            }
        })
        .to_string()
    }

    fn mock_watch_and_player(fetcher: &MockFetcher, player: &str) {
        fetcher.respond_ok(
            &format!("{}?v={}", WATCH_URL, ID),
            r#"<script>ytcfg.set({"INNERTUBE_API_KEY":"AIzaTestKey","OTHER":1});</script>"#,
        );
        fetcher.respond_ok(&format!("{}?key=AIzaTestKey", PLAYER_URL), player);
    }

    #[test]
    fn test_video_id() {
        let id = |s: &str| video_id(&Url::parse(s).unwrap());
        assert_eq!(id("https://www.youtube.com/watch?v=dQw4w9WgXcQ&t=10s").as_deref(), Some(ID));
        assert_eq!(id("https://youtu.be/dQw4w9WgXcQ?si=abc").as_deref(), Some(ID));
        assert_eq!(id("https://youtube.com/shorts/dQw4w9WgXcQ").as_deref(), Some(ID));
        assert_eq!(id("https://m.youtube.com/embed/dQw4w9WgXcQ").as_deref(), Some(ID));
        assert_eq!(id("https://www.youtube.com/live/dQw4w9WgXcQ").as_deref(), Some(ID));
        assert_eq!(id("https://www.youtube.com/channel/UC123"), None);
        assert_eq!(id("https://www.youtube.com/watch?v=short"), None);
        assert_eq!(id("https://vimeo.com/12345"), None);
    }

    #[test]
    fn test_parse_transcript() {
        let xml = r#"<?xml version="1.0" encoding="utf-8" ?><transcript>
            <text start="3.5" dur="2.0">second &amp;amp; last</text>
            <text start="0.0" dur="4.2">It&amp;#39;s the &lt;first&gt; line</text>
            <text start="5.0" dur="1.0">   </text>
            </transcript>"#;
        let transcript = parse_transcript(xml).unwrap();

        assert_eq!(transcript.segments.len(), 2);
        assert_eq!(transcript.segments[0].text, "It's the <first> line");
        assert_eq!(transcript.segments[1].text, "second & last");
        // Clipped so segments do not overlap
        assert_eq!(transcript.segments[0].end, 3.5);
        assert_eq!(transcript.segments[1].end, 5.5);
        assert_eq!(transcript.full_text, "It's the <first> line second & last");
    }

    #[test]
    fn test_parse_transcript_malformed() {
        assert_eq!(parse_transcript("<transcript><text start=\"1\">a</p></transcript>"), None);
    }

    #[test]
    fn test_chapters_and_richness() {
        let chapters = parse_chapters("Intro text\n0:00 Intro\n(1:30) Setup\n1:02:03 - Wrap up\n");
        assert_eq!(chapters.len(), 3);
        assert_eq!(chapters[1].title, "Setup");
        assert_eq!(chapters[2].start_secs, 3723);

        // Must start at zero
        assert!(parse_chapters("1:00 Late start\n2:00 Next").is_empty());

        let sparse = VideoMetadata {
            title: "x".into(),
            ..Default::default()
        };
        assert_eq!(sparse.richness(), ContentRichness::Sparse);
        let rich = VideoMetadata {
            chapters,
            ..sparse.clone()
        };
        assert_eq!(rich.richness(), ContentRichness::Rich);
        let long_description = VideoMetadata {
            description: "d".repeat(RICH_DESCRIPTION_CHARS),
            ..sparse
        };
        assert_eq!(long_description.richness(), ContentRichness::Rich);
    }

    #[test]
    fn test_caption_url_drops_format() {
        assert_eq!(
            caption_url("https://www.youtube.com/api/timedtext?v=abc&lang=en&fmt=srv3"),
            "https://www.youtube.com/api/timedtext?v=abc&lang=en"
        );
        assert_eq!(
            caption_url("https://www.youtube.com/api/timedtext?fmt=srv3"),
            "https://www.youtube.com/api/timedtext"
        );
    }

    #[tokio::test]
    async fn test_transcript_prefers_english_track() {
        let fetcher = MockFetcher::new();
        mock_watch_and_player(
            &fetcher,
            &player_json(serde_json::json!([
                {"baseUrl": "https://www.youtube.com/api/timedtext?v=x&lang=de", "languageCode": "de"},
                {"baseUrl": "https://www.youtube.com/api/timedtext?v=x&lang=en&fmt=srv3", "languageCode": "en"}
            ])),
        );
        fetcher.respond_ok(
            "https://www.youtube.com/api/timedtext?v=x&lang=en",
            r#"<transcript><text start="0" dur="1">run cargo install</text></transcript>"#,
        );

        let ExtractionResult::Content(content) = extract(&fetcher, ID, UA).await else {
            panic!("expected content");
        };
        assert_eq!(content.strategy, Strategy::VideoTranscript);
        assert_eq!(content.title.as_deref(), Some("Install Rust in the terminal"));
        assert!(content.text.contains("Transcript:\nrun cargo install"));
        assert!(content.text.contains("Duration: 10:12"));
        let video = content.video.unwrap();
        assert_eq!(video.metadata.chapters.len(), 3);
        assert_eq!(fetcher.call_count("https://www.youtube.com/api/timedtext?v=x&lang=de"), 0);
    }

    #[tokio::test]
    async fn test_no_tracks_falls_back_to_metadata() {
        let fetcher = MockFetcher::new();
        mock_watch_and_player(&fetcher, &player_json(serde_json::json!([])));

        let ExtractionResult::Content(content) = extract(&fetcher, ID, UA).await else {
            panic!("expected metadata content");
        };
        assert_eq!(content.strategy, Strategy::VideoMetadata);
        assert!(!content.text.contains("Transcript:"));
    }

    #[tokio::test]
    async fn test_caption_fetch_failure_falls_back_to_metadata() {
        let fetcher = MockFetcher::new();
        mock_watch_and_player(
            &fetcher,
            &player_json(serde_json::json!([
                {"baseUrl": "https://www.youtube.com/api/timedtext?v=x&lang=fr", "languageCode": "fr"}
            ])),
        );
        fetcher.respond(
            "https://www.youtube.com/api/timedtext?v=x&lang=fr",
            FetchOutcome::ServerError(500),
        );

        let ExtractionResult::Content(content) = extract(&fetcher, ID, UA).await else {
            panic!("expected metadata content");
        };
        assert_eq!(content.strategy, Strategy::VideoMetadata);
    }

    #[tokio::test]
    async fn test_missing_api_key_fails() {
        let fetcher = MockFetcher::new();
        fetcher.respond_ok(&format!("{}?v={}", WATCH_URL, ID), "<html>consent page</html>");

        assert!(matches!(
            extract(&fetcher, ID, UA).await,
            ExtractionResult::Failed(reason) if reason.contains("API key")
        ));
    }

    #[tokio::test]
    async fn test_no_details_and_no_tracks_is_empty() {
        let fetcher = MockFetcher::new();
        mock_watch_and_player(&fetcher, r#"{"playabilityStatus": {"status": "ERROR"}}"#);
        assert_eq!(extract(&fetcher, ID, UA).await, ExtractionResult::Empty);
    }

    #[test]
    fn test_untitled_video_with_description_is_metadata() {
        let untitled = VideoMetadata {
            video_id: ID.to_string(),
            description: "Walkthrough of the borrow checker with examples.".to_string(),
            ..Default::default()
        };
        assert!(!untitled.is_empty());
        assert!(VideoMetadata::default().is_empty());

        let result = content_result(VideoContent {
            metadata: untitled,
            transcript: None,
        });
        let content = result.content().unwrap();
        assert_eq!(content.strategy, Strategy::VideoMetadata);
        assert_eq!(content.title, None);
    }
}
