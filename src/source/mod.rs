//! Item resolution: turning a channel, playlist, or id file into work items.

mod file;
mod youtube;

pub use file::FileResolver;
pub use youtube::YtDlpResolver;

use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::LazyLock;

static VIDEO_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?x)
        (?:
            # Full YouTube URLs
            (?:https?://)?
            (?:www\.|m\.)?
            (?:youtube\.com/watch\?(?:.*&)?v=|youtu\.be/|youtube\.com/embed/|youtube\.com/shorts/|youtube\.com/v/)
            ([a-zA-Z0-9_-]{11})
        )
        |
        # Bare video ID (11 characters)
        ^([a-zA-Z0-9_-]{11})$
    ",
    )
    .expect("Invalid regex")
});

/// One unit of work: a single video.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    /// Stable external identifier (the video id).
    pub id: String,
    pub title: String,
    pub canonical_url: String,
    pub published_at: Option<DateTime<Utc>>,
}

impl Item {
    /// An item known only by id.
    pub fn from_id(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            canonical_url: watch_url(&id),
            id,
            title: String::new(),
            published_at: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_published_at(mut self, published_at: Option<DateTime<Utc>>) -> Self {
        self.published_at = published_at;
        self
    }
}

/// Where the items of a run come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceSpec {
    /// A channel id such as `UCxxxxxxxxxxxxxxxxxxxxxx`.
    Channel(String),
    /// A playlist id such as `PLxxxx`.
    Playlist(String),
    /// Any channel, playlist, or video URL yt-dlp understands.
    Url(String),
    /// A text file with one video id or URL per line.
    File(PathBuf),
}

impl SourceSpec {
    /// URL handed to yt-dlp for list-style sources.
    pub fn listing_url(&self) -> Option<String> {
        match self {
            SourceSpec::Channel(id) => Some(format!("https://www.youtube.com/channel/{}/videos", id)),
            SourceSpec::Playlist(id) => {
                Some(format!("https://www.youtube.com/playlist?list={}", id))
            }
            SourceSpec::Url(url) => Some(url.clone()),
            SourceSpec::File(_) => None,
        }
    }
}

impl std::fmt::Display for SourceSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceSpec::Channel(id) => write!(f, "channel {}", id),
            SourceSpec::Playlist(id) => write!(f, "playlist {}", id),
            SourceSpec::Url(url) => write!(f, "{}", url),
            SourceSpec::File(path) => write!(f, "file {}", path.display()),
        }
    }
}

/// Trait for item resolvers.
#[async_trait]
pub trait ItemResolver: Send + Sync {
    /// Whether this resolver understands the given source.
    fn can_handle(&self, spec: &SourceSpec) -> bool;

    /// Resolve a source into an ordered, deduplicated list of at most `limit` items.
    async fn resolve(&self, spec: &SourceSpec, limit: Option<usize>) -> Result<Vec<Item>>;
}

/// Pick the resolver for a source.
pub fn resolver_for(spec: &SourceSpec) -> Box<dyn ItemResolver> {
    if FileResolver.can_handle(spec) {
        Box::new(FileResolver)
    } else {
        Box::new(YtDlpResolver::new())
    }
}

/// Canonical watch URL for a video id.
pub fn watch_url(video_id: &str) -> String {
    format!("https://www.youtube.com/watch?v={}", video_id)
}

/// Extract a video id from a YouTube URL or bare id.
pub fn parse_video_id(input: &str) -> Option<String> {
    let caps = VIDEO_ID.captures(input.trim())?;

    // Try group 1 (URL format) then group 2 (bare ID)
    caps.get(1)
        .or_else(|| caps.get(2))
        .map(|m| m.as_str().to_string())
}

/// Drop repeated ids (first occurrence wins) and cap the list.
pub fn dedupe_and_cap(items: Vec<Item>, limit: Option<usize>) -> Vec<Item> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.id.clone()))
        .take(limit.unwrap_or(usize::MAX))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_video_id() {
        assert_eq!(
            parse_video_id("https://www.youtube.com/watch?v=dQw4w9WgXcQ"),
            Some("dQw4w9WgXcQ".to_string())
        );
        assert_eq!(
            parse_video_id("https://www.youtube.com/watch?feature=share&v=dQw4w9WgXcQ"),
            Some("dQw4w9WgXcQ".to_string())
        );
        assert_eq!(
            parse_video_id("https://youtu.be/dQw4w9WgXcQ?t=42"),
            Some("dQw4w9WgXcQ".to_string())
        );
        assert_eq!(
            parse_video_id("https://youtube.com/embed/dQw4w9WgXcQ"),
            Some("dQw4w9WgXcQ".to_string())
        );
        assert_eq!(
            parse_video_id("https://www.youtube.com/shorts/dQw4w9WgXcQ"),
            Some("dQw4w9WgXcQ".to_string())
        );
        assert_eq!(parse_video_id("  dQw4w9WgXcQ "), Some("dQw4w9WgXcQ".to_string()));

        assert_eq!(parse_video_id("not-a-video-id"), None);
        assert_eq!(parse_video_id(""), None);
    }

    #[test]
    fn test_dedupe_and_cap() {
        let items = vec![
            Item::from_id("aaaaaaaaaaa"),
            Item::from_id("bbbbbbbbbbb"),
            Item::from_id("aaaaaaaaaaa"),
            Item::from_id("ccccccccccc"),
        ];

        let ids: Vec<String> = dedupe_and_cap(items.clone(), None)
            .into_iter()
            .map(|i| i.id)
            .collect();
        assert_eq!(ids, vec!["aaaaaaaaaaa", "bbbbbbbbbbb", "ccccccccccc"]);

        assert_eq!(dedupe_and_cap(items, Some(2)).len(), 2);
    }

    #[test]
    fn test_listing_url() {
        assert_eq!(
            SourceSpec::Playlist("PLabc".into()).listing_url().unwrap(),
            "https://www.youtube.com/playlist?list=PLabc"
        );
        assert!(SourceSpec::File("ids.txt".into()).listing_url().is_none());
    }

    #[test]
    fn test_item_from_id() {
        let item = Item::from_id("dQw4w9WgXcQ");
        assert_eq!(item.canonical_url, "https://www.youtube.com/watch?v=dQw4w9WgXcQ");
        assert!(item.title.is_empty());
    }
}
