//! Multi-strategy transcript acquisition with language negotiation.

use super::{
    clean_segments, TrackInfo, TrackKind, TrackRequest, TranscriptResult, TranscriptTransport,
};
use crate::error::{Result, YtsumError};
use crate::ratelimit::RateLimiter;
use crate::retry::RetryPolicy;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Outcome of acquiring a transcript for one item.
#[derive(Debug, Clone)]
pub enum Acquisition {
    Acquired(TranscriptResult),
    /// No strategy produced a transcript. This is a terminal outcome, not an error.
    Unavailable(String),
}

/// Pick a track for the preferred languages.
///
/// Manually created tracks win over generated ones for every preferred
/// language; if nothing matches, the first translatable track is translated
/// into the first preferred language.
pub fn negotiate(tracks: &[TrackInfo], preferred: &[String]) -> Option<TrackRequest> {
    let matches = |track: &TrackInfo, lang: &str| track.language_code.eq_ignore_ascii_case(lang);

    for kind in [TrackKind::Manual, TrackKind::Generated] {
        for lang in preferred {
            if let Some(track) = tracks.iter().find(|t| t.kind == kind && matches(t, lang)) {
                return Some(TrackRequest {
                    track: track.clone(),
                    translate_to: None,
                });
            }
        }
    }

    let target = preferred.first()?;
    tracks
        .iter()
        .filter(|t| t.translatable)
        .min_by_key(|t| t.kind != TrackKind::Manual)
        .map(|track| TrackRequest {
            track: track.clone(),
            translate_to: Some(target.clone()),
        })
}

/// Obtains transcripts through one or two transports.
pub struct TranscriptAcquirer {
    primary: Arc<dyn TranscriptTransport>,
    secondary: Option<Arc<dyn TranscriptTransport>>,
    prefer_secondary: bool,
    languages: Vec<String>,
    strip_tags: bool,
    limiter: Arc<RateLimiter>,
    retry: RetryPolicy,
}

impl TranscriptAcquirer {
    pub fn new(
        primary: Arc<dyn TranscriptTransport>,
        languages: Vec<String>,
        limiter: Arc<RateLimiter>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            primary,
            secondary: None,
            prefer_secondary: false,
            languages,
            strip_tags: false,
            limiter,
            retry,
        }
    }

    /// Register the fallback transport. With `prefer` set it is tried first.
    pub fn with_secondary(mut self, secondary: Arc<dyn TranscriptTransport>, prefer: bool) -> Self {
        self.secondary = Some(secondary);
        self.prefer_secondary = prefer;
        self
    }

    pub fn with_tag_stripping(mut self, strip_tags: bool) -> Self {
        self.strip_tags = strip_tags;
        self
    }

    pub fn languages(&self) -> &[String] {
        &self.languages
    }

    fn strategies(&self) -> Vec<&Arc<dyn TranscriptTransport>> {
        match &self.secondary {
            Some(secondary) if self.prefer_secondary => vec![secondary, &self.primary],
            Some(secondary) => vec![&self.primary, secondary],
            None => vec![&self.primary],
        }
    }

    /// Acquire a transcript for `video_id`.
    ///
    /// Strategies are tried in order. A strategy reporting `AccessBlocked` or
    /// `Unavailable` hands over to the next one. The result is `Unavailable`
    /// when any strategy said so (or all were blocked); a hard error from a
    /// strategy only surfaces if nothing reported the video as unavailable.
    #[instrument(skip(self), fields(video_id = %video_id))]
    pub async fn acquire(&self, video_id: &str) -> Result<Acquisition> {
        let mut reasons = Vec::new();
        let mut saw_unavailable = false;
        let mut hard_error: Option<YtsumError> = None;

        for transport in self.strategies() {
            let strategy = transport.strategy();
            match self.try_strategy(transport.as_ref(), video_id).await {
                Ok(result) => {
                    info!(
                        "Acquired transcript via {} ({}, {} chars)",
                        strategy,
                        result.language_label(),
                        result.char_count()
                    );
                    return Ok(Acquisition::Acquired(result));
                }
                Err(YtsumError::AccessBlocked(reason)) => {
                    warn!("{} blocked for {}: {}; falling back", strategy, video_id, reason);
                    reasons.push(format!("{}: access blocked ({})", strategy, reason));
                }
                Err(YtsumError::Unavailable(reason)) => {
                    debug!("{} has no transcript for {}: {}", strategy, video_id, reason);
                    saw_unavailable = true;
                    reasons.push(format!("{}: {}", strategy, reason));
                }
                Err(e) => {
                    warn!("{} failed for {}: {}", strategy, video_id, e);
                    reasons.push(format!("{}: {}", strategy, e));
                    hard_error.get_or_insert(e);
                }
            }
        }

        match hard_error {
            Some(e) if !saw_unavailable => Err(e),
            _ => Ok(Acquisition::Unavailable(reasons.join("; "))),
        }
    }

    async fn try_strategy(
        &self,
        transport: &dyn TranscriptTransport,
        video_id: &str,
    ) -> Result<TranscriptResult> {
        let strategy = transport.strategy();

        let tracks = self
            .retry
            .run_throttled(&self.limiter, "list caption tracks", || {
                transport.list_tracks(video_id)
            })
            .await?;
        debug!("{} advertises {} tracks", strategy, tracks.len());

        let request = negotiate(&tracks, &self.languages).ok_or_else(|| {
            YtsumError::Unavailable(format!(
                "no transcript in [{}] and no translation path",
                self.languages.join(", ")
            ))
        })?;

        let segments = self
            .retry
            .run_throttled(&self.limiter, "fetch caption track", || {
                transport.fetch_track(video_id, &request)
            })
            .await?;

        let segments = clean_segments(segments, self.strip_tags);
        if segments.is_empty() {
            return Err(YtsumError::Unavailable("caption track is empty".into()));
        }

        let translated_from = request
            .translate_to
            .as_ref()
            .map(|_| request.track.language_code.clone());

        Ok(
            TranscriptResult::new(video_id, segments, request.output_language(), strategy)
                .with_translated_from(translated_from),
        )
    }
}
