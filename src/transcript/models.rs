//! Data models for transcripts.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

static BRACKET_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[[^\]]*\]").expect("valid tag regex"));

/// Which acquisition strategy produced a transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceStrategy {
    /// Caption tracks scraped from the watch page.
    WatchPage,
    /// Subtitles downloaded through yt-dlp.
    YtDlp,
    /// Loaded from transcript artifacts of an earlier run.
    Cached,
}

impl std::fmt::Display for SourceStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceStrategy::WatchPage => write!(f, "watch_page"),
            SourceStrategy::YtDlp => write!(f, "yt_dlp"),
            SourceStrategy::Cached => write!(f, "cached"),
        }
    }
}

/// A single timed caption segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptSegment {
    /// Start offset in seconds.
    pub start: f64,
    /// Duration in seconds.
    pub duration: f64,
    /// Caption text.
    pub text: String,
}

impl TranscriptSegment {
    pub fn new(start: f64, duration: f64, text: impl Into<String>) -> Self {
        Self {
            start,
            duration,
            text: text.into(),
        }
    }

    pub fn end(&self) -> f64 {
        self.start + self.duration
    }
}

/// How a caption track was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackKind {
    /// Uploaded by the creator.
    Manual,
    /// Automatic speech recognition.
    Generated,
}

/// A caption track advertised for a video.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackInfo {
    /// BCP-47-ish language code as reported by the transport (e.g. "ja", "en-US").
    pub language_code: String,
    pub kind: TrackKind,
    /// Whether the transport can translate this track into another language.
    pub translatable: bool,
    /// Transport-specific handle used to fetch the track (e.g. a URL).
    pub locator: Option<String>,
}

impl TrackInfo {
    pub fn new(language_code: impl Into<String>, kind: TrackKind) -> Self {
        Self {
            language_code: language_code.into(),
            kind,
            translatable: false,
            locator: None,
        }
    }

    pub fn translatable(mut self, translatable: bool) -> Self {
        self.translatable = translatable;
        self
    }

    pub fn with_locator(mut self, locator: impl Into<String>) -> Self {
        self.locator = Some(locator.into());
        self
    }
}

/// A negotiated fetch: one source track, optionally translated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackRequest {
    pub track: TrackInfo,
    pub translate_to: Option<String>,
}

impl TrackRequest {
    /// Language of the text that will be returned.
    pub fn output_language(&self) -> &str {
        self.translate_to
            .as_deref()
            .unwrap_or(&self.track.language_code)
    }
}

/// A transcript acquired for one item.
#[derive(Debug, Clone)]
pub struct TranscriptResult {
    pub video_id: String,
    pub segments: Vec<TranscriptSegment>,
    /// Negotiated language tag of `segments`.
    pub language: String,
    /// Source language when the text is a machine translation.
    pub translated_from: Option<String>,
    pub source_strategy: SourceStrategy,
    /// Segment texts joined with single spaces.
    text: String,
}

impl TranscriptResult {
    pub fn new(
        video_id: impl Into<String>,
        segments: Vec<TranscriptSegment>,
        language: impl Into<String>,
        source_strategy: SourceStrategy,
    ) -> Self {
        let text = flatten(&segments);
        Self {
            video_id: video_id.into(),
            segments,
            language: language.into(),
            translated_from: None,
            source_strategy,
            text,
        }
    }

    pub fn with_translated_from(mut self, source_language: Option<String>) -> Self {
        self.translated_from = source_language;
        self
    }

    /// The flattened transcript text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Length of the flattened text in characters.
    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }

    /// Language label for the ledger, marking translations.
    pub fn language_label(&self) -> String {
        match &self.translated_from {
            Some(from) => format!("{} (translated from {})", self.language, from),
            None => self.language.clone(),
        }
    }

    /// Start time of the segment containing flattened-text offset `char_pos`.
    pub fn timestamp_at_char(&self, char_pos: usize) -> f64 {
        let mut offset = 0usize;
        for segment in &self.segments {
            // +1 for the joining space.
            let next = offset + segment.text.chars().count() + 1;
            if char_pos < next {
                return segment.start;
            }
            offset = next;
        }
        self.segments.last().map(|s| s.start).unwrap_or(0.0)
    }
}

/// Join segment texts with single spaces.
pub fn flatten(segments: &[TranscriptSegment]) -> String {
    segments
        .iter()
        .map(|s| s.text.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Normalise caption text: collapse whitespace and optionally drop
/// bracketed annotations such as `[Music]`.
pub fn clean_caption_text(text: &str, strip_tags: bool) -> String {
    let text = if strip_tags {
        BRACKET_TAG.replace_all(text, " ").into_owned()
    } else {
        text.to_string()
    };
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Clean every segment and drop the ones left empty.
pub fn clean_segments(segments: Vec<TranscriptSegment>, strip_tags: bool) -> Vec<TranscriptSegment> {
    segments
        .into_iter()
        .filter_map(|mut s| {
            s.text = clean_caption_text(&s.text, strip_tags);
            (!s.text.is_empty()).then_some(s)
        })
        .collect()
}

/// Format seconds as MM:SS or HH:MM:SS.
pub fn format_timestamp(seconds: f64) -> String {
    let total_seconds = seconds.max(0.0) as u32;
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let secs = total_seconds % 60;

    if hours > 0 {
        format!("{:02}:{:02}:{:02}", hours, minutes, secs)
    } else {
        format!("{:02}:{:02}", minutes, secs)
    }
}
