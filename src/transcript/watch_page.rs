//! Primary transport: caption tracks advertised on the YouTube watch page.

use super::{
    parse_json3, SourceStrategy, TrackInfo, TrackKind, TrackRequest, TranscriptSegment,
    TranscriptTransport,
};
use crate::error::{Result, YtsumError};
use async_trait::async_trait;
use reqwest::{header, Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

const WATCH_URL: &str = "https://www.youtube.com/watch";
const USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

/// Markers of the interstitial pages YouTube serves to clients it refuses.
const BLOCK_MARKERS: &[&str] = &[
    "unusual traffic",
    "www.google.com/recaptcha",
    "g-recaptcha",
    "consent.youtube.com",
    "Sign in to confirm you",
];

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CaptionTrack {
    base_url: String,
    language_code: String,
    #[serde(default)]
    kind: Option<String>,
    #[serde(default)]
    is_translatable: bool,
}

impl From<CaptionTrack> for TrackInfo {
    fn from(track: CaptionTrack) -> Self {
        let kind = match track.kind.as_deref() {
            Some("asr") => TrackKind::Generated,
            _ => TrackKind::Manual,
        };
        TrackInfo::new(track.language_code, kind)
            .translatable(track.is_translatable)
            .with_locator(track.base_url)
    }
}

/// Scrapes caption tracks from the watch page and fetches JSON3 timed text.
pub struct WatchPageTransport {
    client: Client,
    accept_language: String,
}

impl WatchPageTransport {
    /// Create a transport. `proxy` applies to every request (http, https).
    pub fn new(proxy: Option<&str>, timeout: Duration, languages: &[String]) -> Result<Self> {
        let mut builder = Client::builder().user_agent(USER_AGENT).timeout(timeout);
        if let Some(proxy) = proxy {
            let proxy = reqwest::Proxy::all(proxy)
                .map_err(|e| YtsumError::Config(format!("Invalid proxy '{}': {}", proxy, e)))?;
            builder = builder.proxy(proxy);
        }

        let accept_language = if languages.is_empty() {
            "en".to_string()
        } else {
            languages.join(",")
        };

        Ok(Self {
            client: builder.build()?,
            accept_language,
        })
    }

    async fn get_text(&self, url: &str) -> Result<String> {
        let response = self
            .client
            .get(url)
            .header(header::ACCEPT_LANGUAGE, &self.accept_language)
            .send()
            .await
            .map_err(classify_send_error)?;

        let status = response.status();
        let body = response.text().await.map_err(classify_send_error)?;

        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(YtsumError::AccessBlocked(format!("HTTP 429 from {}", host_of(url))));
        }
        if !status.is_success() {
            return Err(YtsumError::from_status(status, &body));
        }
        Ok(body)
    }
}

#[async_trait]
impl TranscriptTransport for WatchPageTransport {
    fn strategy(&self) -> SourceStrategy {
        SourceStrategy::WatchPage
    }

    async fn list_tracks(&self, video_id: &str) -> Result<Vec<TrackInfo>> {
        let url = format!("{}?v={}&hl=en", WATCH_URL, video_id);
        let page = self.get_text(&url).await?;

        if let Some(marker) = detect_block(&page) {
            return Err(YtsumError::AccessBlocked(format!(
                "watch page returned an interstitial ({})",
                marker
            )));
        }

        let tracks = extract_caption_tracks(&page)?;
        debug!("Watch page lists {} caption tracks for {}", tracks.len(), video_id);
        if tracks.is_empty() {
            return Err(YtsumError::Unavailable(format!(
                "no captions published for {}",
                video_id
            )));
        }
        Ok(tracks)
    }

    async fn fetch_track(
        &self,
        video_id: &str,
        request: &TrackRequest,
    ) -> Result<Vec<TranscriptSegment>> {
        let base_url = request.track.locator.as_deref().ok_or_else(|| {
            YtsumError::InvalidInput(format!("caption track for {} has no URL", video_id))
        })?;

        let url = timed_text_url(base_url, request.translate_to.as_deref())?;
        let body = self.get_text(&url).await?;

        // YouTube answers blocked timed-text requests with 200 and no body.
        if body.trim().is_empty() {
            return Err(YtsumError::AccessBlocked(
                "timed-text endpoint returned an empty body".into(),
            ));
        }
        parse_json3(&body)
    }
}

fn classify_send_error(e: reqwest::Error) -> YtsumError {
    if e.is_timeout() || e.is_connect() || e.is_request() || e.is_body() {
        YtsumError::TransientNetwork(e.to_string())
    } else {
        YtsumError::Http(e)
    }
}

fn host_of(url: &str) -> String {
    url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_else(|| url.to_string())
}

/// Return the first interstitial marker found in a watch page, if any.
fn detect_block(page: &str) -> Option<&'static str> {
    if page.contains("\"captionTracks\"") {
        return None;
    }
    BLOCK_MARKERS.iter().copied().find(|m| page.contains(m))
}

/// Extract the `captionTracks` array embedded in the player response.
fn extract_caption_tracks(page: &str) -> Result<Vec<TrackInfo>> {
    const KEY: &str = "\"captionTracks\":";
    let Some(pos) = page.find(KEY) else {
        return Ok(Vec::new());
    };

    let rest = &page[pos + KEY.len()..];
    let tracks = serde_json::Deserializer::from_str(rest)
        .into_iter::<Vec<CaptionTrack>>()
        .next()
        .ok_or_else(|| YtsumError::InvalidInput("captionTracks without a value".into()))??;

    Ok(tracks.into_iter().map(TrackInfo::from).collect())
}

/// Build the JSON3 timed-text URL for a track, optionally translated.
fn timed_text_url(base_url: &str, translate_to: Option<&str>) -> Result<String> {
    let mut url = url::Url::parse(base_url)
        .map_err(|e| YtsumError::InvalidInput(format!("Bad caption URL: {}", e)))?;

    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| k != "fmt" && k != "tlang")
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    {
        let mut query = url.query_pairs_mut();
        query.clear();
        for (k, v) in &kept {
            query.append_pair(k, v);
        }
        query.append_pair("fmt", "json3");
        if let Some(lang) = translate_to {
            query.append_pair("tlang", lang);
        }
    }
    Ok(url.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<html><script>var ytInitialPlayerResponse = {"captions":{"playerCaptionsTracklistRenderer":{"captionTracks":[{"baseUrl":"https://www.youtube.com/api/timedtext?v=abc&lang=ja","name":{"simpleText":"Japanese"},"languageCode":"ja","kind":"asr","isTranslatable":true},{"baseUrl":"https://www.youtube.com/api/timedtext?v=abc&lang=en","languageCode":"en","isTranslatable":false}],"audioTracks":[]}}};</script></html>"#;

    #[test]
    fn test_extract_caption_tracks() {
        let tracks = extract_caption_tracks(PAGE).unwrap();
        assert_eq!(tracks.len(), 2);

        assert_eq!(tracks[0].language_code, "ja");
        assert_eq!(tracks[0].kind, TrackKind::Generated);
        assert!(tracks[0].translatable);
        assert_eq!(
            tracks[0].locator.as_deref(),
            Some("https://www.youtube.com/api/timedtext?v=abc&lang=ja")
        );

        assert_eq!(tracks[1].kind, TrackKind::Manual);
        assert!(!tracks[1].translatable);
    }

    #[test]
    fn test_page_without_captions() {
        let tracks = extract_caption_tracks("<html>no player response</html>").unwrap();
        assert!(tracks.is_empty());
    }

    #[test]
    fn test_detect_block() {
        let captcha = "<html>Our systems have detected unusual traffic from your computer</html>";
        assert_eq!(detect_block(captcha), Some("unusual traffic"));
        assert_eq!(detect_block(PAGE), None);
        assert_eq!(detect_block("<html>ordinary page</html>"), None);
    }

    #[test]
    fn test_timed_text_url() {
        let url = timed_text_url("https://www.youtube.com/api/timedtext?v=abc&lang=en&fmt=srv3", None)
            .unwrap();
        assert_eq!(url, "https://www.youtube.com/api/timedtext?v=abc&lang=en&fmt=json3");

        let url = timed_text_url("https://www.youtube.com/api/timedtext?v=abc&lang=en", Some("ja"))
            .unwrap();
        assert!(url.ends_with("fmt=json3&tlang=ja"));
    }
}
