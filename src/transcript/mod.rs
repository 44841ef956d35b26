//! Transcript acquisition.
//!
//! A [`TranscriptTransport`] knows how to list and fetch caption tracks from
//! one backend. The [`TranscriptAcquirer`] negotiates the language, applies
//! the shared rate limit and retry policy, and falls back to a secondary
//! transport when the primary one is blocked.
//!
//! # Strategies
//!
//! - **Watch page** (primary): caption tracks advertised on the YouTube watch
//!   page, fetched as JSON3 timed text.
//! - **yt-dlp** (secondary): subtitles downloaded by the `yt-dlp` tool.

mod acquirer;
mod format;
mod models;
mod watch_page;
mod ytdlp;

pub use acquirer::{negotiate, Acquisition, TranscriptAcquirer};
pub use format::{parse_json3, parse_vtt};
pub use models::{
    clean_caption_text, clean_segments, flatten, format_timestamp, SourceStrategy, TrackInfo,
    TrackKind, TrackRequest, TranscriptResult, TranscriptSegment,
};
pub use watch_page::WatchPageTransport;
pub use ytdlp::YtDlpTransport;

use crate::error::Result;
use async_trait::async_trait;

/// Trait for transcript backends.
///
/// Failures must be reported through the shared taxonomy:
/// `Unavailable` when the video has no captions, `AccessBlocked` when the
/// backend refuses service, `TransientNetwork`/`RateLimited` for conditions
/// worth retrying.
#[async_trait]
pub trait TranscriptTransport: Send + Sync {
    /// The strategy this transport implements.
    fn strategy(&self) -> SourceStrategy;

    /// List the caption tracks available for a video.
    async fn list_tracks(&self, video_id: &str) -> Result<Vec<TrackInfo>>;

    /// Fetch the segments of one negotiated track.
    async fn fetch_track(
        &self,
        video_id: &str,
        request: &TrackRequest,
    ) -> Result<Vec<TranscriptSegment>>;
}
