//! YouTube Data API v3 wire types, URL parsing and conversion.

use std::sync::LazyLock;

use lifehub_core::{Item, ItemType};
use regex::Regex;
use serde::Deserialize;

use crate::provider::ProviderKind;
use crate::text::truncate;

/// Longest description kept as the note body.
pub const MAX_DESCRIPTION_CHARS: usize = 5_000;

static VIDEO_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^(?:https?://)?(?:(?:www|m|music)\.)?(?:youtube\.com/(?:watch\?(?:[^#]*&)?v=|embed/|shorts/|live/|v/)|youtube-nocookie\.com/embed/|youtu\.be/)([A-Za-z0-9_-]{11})(?:[?&#/].*)?$",
    )
    .expect("Invalid video URL regex")
});

static BARE_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]{11}$").expect("Invalid video id regex"));

static ISO_DURATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^P(?:(\d+)D)?T?(?:(\d+)H)?(?:(\d+)M)?(?:(\d+)S)?$").expect("Invalid duration regex")
});

/// Extracts the video id from a watch, short, embed or shorts URL, or
/// accepts a bare 11-character id.
pub fn parse_video_id(input: &str) -> Option<String> {
    let input = input.trim();
    if BARE_ID.is_match(input) {
        return Some(input.to_string());
    }
    VIDEO_URL
        .captures(input)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Parses an ISO 8601 duration such as `PT1H2M3S` into seconds.
pub fn parse_duration_secs(raw: &str) -> Option<u64> {
    let caps = ISO_DURATION.captures(raw)?;
    let part = |i: usize| {
        caps.get(i)
            .and_then(|m| m.as_str().parse::<u64>().ok())
            .unwrap_or(0)
    };
    Some(part(1) * 86_400 + part(2) * 3_600 + part(3) * 60 + part(4))
}

/// Canonical watch URL for a video.
pub fn watch_url(video_id: &str) -> String {
    format!("https://www.youtube.com/watch?v={}", video_id)
}

#[derive(Debug, Deserialize)]
pub struct VideoListResponse {
    #[serde(default)]
    pub items: Vec<Video>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Thumbnail {
    pub url: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Thumbnails {
    #[serde(default)]
    pub high: Option<Thumbnail>,
    #[serde(default)]
    pub medium: Option<Thumbnail>,
    #[serde(default)]
    pub default: Option<Thumbnail>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snippet {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub channel_title: Option<String>,
    #[serde(default)]
    pub published_at: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub thumbnails: Thumbnails,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContentDetails {
    #[serde(default)]
    pub duration: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Video {
    pub id: String,
    pub snippet: Snippet,
    #[serde(default)]
    pub content_details: Option<ContentDetails>,
}

impl Video {
    /// Converts to a note item holding the description.
    pub fn into_item(self) -> Item {
        let url = watch_url(&self.id);
        let snippet = self.snippet;
        let thumbnail = snippet
            .thumbnails
            .high
            .or(snippet.thumbnails.medium)
            .or(snippet.thumbnails.default)
            .map(|t| t.url);
        let duration = self
            .content_details
            .and_then(|d| d.duration)
            .as_deref()
            .and_then(parse_duration_secs);

        let mut item = Item::new(ProviderKind::YouTube.as_str(), self.id, ItemType::Note, snippet.title)
            .with_body(truncate(snippet.description.trim(), MAX_DESCRIPTION_CHARS))
            .with_extra("url", url)
            .with_extra("channel", snippet.channel_title)
            .with_extra("published_at", snippet.published_at)
            .with_extra("thumbnail", thumbnail)
            .with_extra("duration_seconds", duration);
        if !snippet.tags.is_empty() {
            item = item.with_extra("tags", snippet.tags);
        }
        item
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_video_urls() {
        let id = Some("dQw4w9WgXcQ".to_string());
        for input in [
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
            "https://youtube.com/watch?feature=share&v=dQw4w9WgXcQ&t=42",
            "youtube.com/watch?v=dQw4w9WgXcQ",
            "https://m.youtube.com/watch?v=dQw4w9WgXcQ",
            "https://youtu.be/dQw4w9WgXcQ?si=abc",
            "https://www.youtube.com/embed/dQw4w9WgXcQ",
            "https://www.youtube.com/shorts/dQw4w9WgXcQ",
            "https://www.youtube-nocookie.com/embed/dQw4w9WgXcQ",
            "  dQw4w9WgXcQ ",
        ] {
            assert_eq!(parse_video_id(input), id, "{input}");
        }
    }

    #[test]
    fn rejects_non_video_urls() {
        for input in [
            "https://www.youtube.com/channel/UC123",
            "https://vimeo.com/123456789",
            "https://www.youtube.com/watch?v=short",
            "",
        ] {
            assert_eq!(parse_video_id(input), None, "{input}");
        }
    }

    #[test]
    fn parses_durations() {
        assert_eq!(parse_duration_secs("PT4M13S"), Some(253));
        assert_eq!(parse_duration_secs("PT1H"), Some(3600));
        assert_eq!(parse_duration_secs("P1DT2S"), Some(86_402));
        assert_eq!(parse_duration_secs("4 minutes"), None);
    }

    #[test]
    fn converts_video() {
        let video: Video = serde_json::from_value(json!({
            "id": "dQw4w9WgXcQ",
            "snippet": {
                "title": "Never Gonna Give You Up",
                "description": "The official video",
                "channelTitle": "Rick Astley",
                "publishedAt": "2009-10-25T06:57:33Z",
                "tags": ["80s"],
                "thumbnails": {"default": {"url": "https://i.ytimg.com/vi/x/default.jpg"}}
            },
            "contentDetails": {"duration": "PT3M33S"}
        }))
        .unwrap();

        let item = video.into_item();
        assert_eq!(item.id, "youtube-dQw4w9WgXcQ");
        assert_eq!(item.item_type, ItemType::Note);
        assert_eq!(item.extra_str("channel"), Some("Rick Astley"));
        assert_eq!(item.extra_str("url"), Some("https://www.youtube.com/watch?v=dQw4w9WgXcQ"));
        assert_eq!(item.metadata.extra["duration_seconds"], 213);
        assert_eq!(item.extra_str("thumbnail"), Some("https://i.ytimg.com/vi/x/default.jpg"));
    }
}
