//! Channel and playlist listing through yt-dlp.

use super::{dedupe_and_cap, parse_video_id, Item, ItemResolver, SourceSpec};
use crate::error::{Result, YtsumError};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use tracing::{debug, instrument};

/// Lists the videos of a channel or playlist with `yt-dlp --flat-playlist`.
pub struct YtDlpResolver {
    binary: String,
}

impl YtDlpResolver {
    pub fn new() -> Self {
        Self {
            binary: "yt-dlp".to_string(),
        }
    }
}

impl Default for YtDlpResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ItemResolver for YtDlpResolver {
    fn can_handle(&self, spec: &SourceSpec) -> bool {
        spec.listing_url().is_some()
    }

    #[instrument(skip(self), fields(source = %spec))]
    async fn resolve(&self, spec: &SourceSpec, limit: Option<usize>) -> Result<Vec<Item>> {
        let url = spec.listing_url().ok_or_else(|| {
            YtsumError::InvalidInput(format!("yt-dlp cannot list {}", spec))
        })?;

        // A single-video URL needs no listing.
        if let Some(id) = parse_video_id(&url) {
            return Ok(vec![Item::from_id(id)]);
        }

        let mut cmd = tokio::process::Command::new(&self.binary);
        cmd.args(["--dump-json", "--no-download", "--no-warnings", "--flat-playlist"]);
        if let Some(limit) = limit {
            cmd.arg("--playlist-end").arg(limit.to_string());
        }
        cmd.arg(&url);

        let output = cmd.output().await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                YtsumError::ToolNotFound(self.binary.clone())
            } else {
                YtsumError::ToolFailed(format!("Failed to run yt-dlp: {}", e))
            }
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(YtsumError::ToolFailed(format!(
                "Failed to list videos for {}: {}",
                spec,
                stderr.trim()
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let items = parse_flat_playlist(&stdout);
        debug!("yt-dlp listed {} videos", items.len());

        Ok(dedupe_and_cap(items, limit))
    }
}

/// Parse `--dump-json --flat-playlist` output (one JSON object per line).
fn parse_flat_playlist(stdout: &str) -> Vec<Item> {
    let mut items = Vec::new();

    for line in stdout.lines() {
        if line.trim().is_empty() {
            continue;
        }
        let Ok(json) = serde_json::from_str::<serde_json::Value>(line) else {
            continue;
        };

        let id = json["id"]
            .as_str()
            .and_then(parse_video_id)
            .or_else(|| json["url"].as_str().and_then(parse_video_id));
        let Some(id) = id else {
            continue;
        };

        let published_at = json["timestamp"]
            .as_i64()
            .and_then(|ts| DateTime::<Utc>::from_timestamp(ts, 0))
            .or_else(|| json["upload_date"].as_str().and_then(parse_upload_date));

        items.push(
            Item::from_id(id)
                .with_title(json["title"].as_str().unwrap_or_default())
                .with_published_at(published_at),
        );
    }

    items
}

/// yt-dlp reports dates as YYYYMMDD.
fn parse_upload_date(date: &str) -> Option<DateTime<Utc>> {
    NaiveDate::parse_from_str(date, "%Y%m%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}
