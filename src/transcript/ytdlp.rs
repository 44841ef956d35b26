//! Secondary transport: subtitles downloaded with yt-dlp.

use super::{
    parse_json3, parse_vtt, SourceStrategy, TrackInfo, TrackKind, TrackRequest,
    TranscriptSegment, TranscriptTransport,
};
use crate::error::{Result, YtsumError};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, instrument};

/// Downloads subtitles through the `yt-dlp` tool.
pub struct YtDlpTransport {
    binary: String,
    proxy: Option<String>,
    cookies_file: Option<PathBuf>,
    timeout: Duration,
}

impl YtDlpTransport {
    pub fn new(timeout: Duration) -> Self {
        Self {
            binary: "yt-dlp".to_string(),
            proxy: None,
            cookies_file: None,
            timeout,
        }
    }

    pub fn with_proxy(mut self, proxy: Option<String>) -> Self {
        self.proxy = proxy;
        self
    }

    pub fn with_cookies_file(mut self, cookies_file: Option<PathBuf>) -> Self {
        self.cookies_file = cookies_file;
        self
    }

    fn watch_url(video_id: &str) -> String {
        format!("https://www.youtube.com/watch?v={}", video_id)
    }

    fn base_command(&self) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.arg("--no-warnings").arg("--no-playlist");
        if let Some(proxy) = &self.proxy {
            cmd.arg("--proxy").arg(proxy);
        }
        if let Some(cookies) = &self.cookies_file {
            cmd.arg("--cookies").arg(cookies);
        }
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }

    async fn execute(&self, mut cmd: Command) -> Result<Output> {
        let output = match tokio::time::timeout(self.timeout, cmd.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(YtsumError::ToolNotFound(self.binary.clone()));
            }
            Ok(Err(e)) => {
                return Err(YtsumError::ToolFailed(format!("yt-dlp execution failed: {e}")));
            }
            Err(_) => {
                return Err(YtsumError::TransientNetwork(format!(
                    "yt-dlp timed out after {}s",
                    self.timeout.as_secs()
                )));
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(classify_stderr(&stderr));
        }
        Ok(output)
    }
}

#[async_trait]
impl TranscriptTransport for YtDlpTransport {
    fn strategy(&self) -> SourceStrategy {
        SourceStrategy::YtDlp
    }

    #[instrument(skip(self))]
    async fn list_tracks(&self, video_id: &str) -> Result<Vec<TrackInfo>> {
        let mut cmd = self.base_command();
        cmd.arg("--skip-download")
            .arg("--list-subs")
            .arg(Self::watch_url(video_id));

        let output = self.execute(cmd).await?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        let tracks = parse_list_subs(&stdout);
        debug!("yt-dlp lists {} subtitle tracks", tracks.len());

        if tracks.is_empty() {
            return Err(YtsumError::Unavailable(format!(
                "yt-dlp found no subtitles for {}",
                video_id
            )));
        }
        Ok(tracks)
    }

    #[instrument(skip(self, request), fields(lang = %request.output_language()))]
    async fn fetch_track(
        &self,
        video_id: &str,
        request: &TrackRequest,
    ) -> Result<Vec<TranscriptSegment>> {
        let workdir = tempfile::tempdir()?;
        let template = workdir.path().join("%(id)s.%(ext)s");

        let write_flag = match request.track.kind {
            TrackKind::Manual => "--write-sub",
            TrackKind::Generated => "--write-auto-sub",
        };

        let mut cmd = self.base_command();
        cmd.arg("--skip-download")
            .arg(write_flag)
            .arg("--sub-langs")
            .arg(request.output_language())
            .arg("--sub-format")
            .arg("json3/vtt/best")
            .arg("--output")
            .arg(&template)
            .arg(Self::watch_url(video_id));

        self.execute(cmd).await?;

        let path = find_subtitle_file(workdir.path())?.ok_or_else(|| {
            YtsumError::Unavailable(format!(
                "yt-dlp wrote no {} subtitle file for {}",
                request.output_language(),
                video_id
            ))
        })?;

        let body = tokio::fs::read_to_string(&path).await?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json3") => parse_json3(&body),
            _ => parse_vtt(&body),
        }
    }
}

/// Map yt-dlp stderr onto the failure taxonomy.
fn classify_stderr(stderr: &str) -> YtsumError {
    let lower = stderr.to_lowercase();
    let message = stderr.trim().lines().last().unwrap_or("").to_string();

    if lower.contains("not a bot") || lower.contains("http error 429") || lower.contains("too many requests") {
        YtsumError::AccessBlocked(message)
    } else if lower.contains("video unavailable")
        || lower.contains("private video")
        || lower.contains("has been removed")
    {
        YtsumError::Unavailable(message)
    } else if lower.contains("timed out") || lower.contains("connection reset") {
        YtsumError::TransientNetwork(message)
    } else {
        YtsumError::ToolFailed(format!("yt-dlp failed: {}", message))
    }
}

/// Parse the tables printed by `yt-dlp --list-subs`.
fn parse_list_subs(stdout: &str) -> Vec<TrackInfo> {
    let mut tracks = Vec::new();
    let mut section: Option<TrackKind> = None;

    for line in stdout.lines() {
        if line.contains("Available automatic captions") {
            section = Some(TrackKind::Generated);
            continue;
        }
        if line.contains("Available subtitles") {
            section = Some(TrackKind::Manual);
            continue;
        }
        if line.starts_with('[') || line.contains("has no ") {
            section = None;
            continue;
        }

        let Some(kind) = section else {
            continue;
        };
        let Some(code) = line.split_whitespace().next() else {
            continue;
        };
        if code == "Language" {
            continue;
        }
        if !tracks
            .iter()
            .any(|t: &TrackInfo| t.kind == kind && t.language_code == code)
        {
            tracks.push(TrackInfo::new(code, kind));
        }
    }

    tracks
}

fn find_subtitle_file(dir: &Path) -> Result<Option<PathBuf>> {
    let mut found = None;
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        match path.extension().and_then(|e| e.to_str()) {
            Some("json3") => return Ok(Some(path)),
            Some("vtt") => found = Some(path),
            _ => {}
        }
    }
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIST_SUBS: &str = "\
[youtube] Extracting URL: https://www.youtube.com/watch?v=abcdefghijk
[youtube] abcdefghijk: Downloading webpage
[info] Available automatic captions for abcdefghijk:
Language Name                  Formats
ja       Japanese              vtt, ttml, srv3, srv2, srv1, json3
en       English               vtt, ttml, srv3, srv2, srv1, json3
[info] Available subtitles for abcdefghijk:
Language Name                  Formats
en       English               vtt, ttml, srv3, srv2, srv1, json3
";

    #[test]
    fn test_parse_list_subs() {
        let tracks = parse_list_subs(LIST_SUBS);
        assert_eq!(tracks.len(), 3);
        assert_eq!(tracks[0], TrackInfo::new("ja", TrackKind::Generated));
        assert_eq!(tracks[2], TrackInfo::new("en", TrackKind::Manual));
    }

    #[test]
    fn test_parse_list_subs_none() {
        let out = "[info] abcdefghijk has no automatic captions\nabcdefghijk has no subtitles\n";
        assert!(parse_list_subs(out).is_empty());
    }

    #[test]
    fn test_classify_stderr() {
        assert!(classify_stderr("ERROR: Sign in to confirm you're not a bot").is_access_blocked());
        assert!(classify_stderr("ERROR: Unable to download: HTTP Error 429: Too Many Requests")
            .is_access_blocked());
        assert!(classify_stderr("ERROR: [youtube] x: Video unavailable").is_unavailable());
        assert!(classify_stderr("ERROR: read timed out").is_retryable());
        assert!(matches!(
            classify_stderr("ERROR: something odd"),
            YtsumError::ToolFailed(_)
        ));
    }

    #[test]
    fn test_find_subtitle_file_prefers_json3() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("abc.en.vtt"), "WEBVTT").unwrap();
        std::fs::write(dir.path().join("abc.en.json3"), "{}").unwrap();

        let path = find_subtitle_file(dir.path()).unwrap().unwrap();
        assert!(path.to_string_lossy().ends_with(".json3"));
    }

    #[tokio::test]
    async fn test_missing_binary_reports_tool_not_found() {
        let mut transport = YtDlpTransport::new(Duration::from_secs(5));
        transport.binary = "ytsum-test-no-such-binary".into();

        let result = transport.list_tracks("abcdefghijk").await;
        assert!(matches!(result, Err(YtsumError::ToolNotFound(_))));
    }
}
