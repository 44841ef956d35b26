//! Parsers for the timed-text formats YouTube serves (JSON3 and WebVTT).

use super::TranscriptSegment;
use crate::error::{Result, YtsumError};
use regex::Regex;
use serde::Deserialize;
use std::sync::LazyLock;

static VTT_CUE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^((?:\d+:)?\d{1,2}:\d{2}[.,]\d{3})\s*-->\s*((?:\d+:)?\d{1,2}:\d{2}[.,]\d{3})")
        .expect("valid cue regex")
});
static MARKUP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]+>|\{[^}]+\}").expect("valid markup regex"));

#[derive(Debug, Deserialize)]
struct Json3Document {
    #[serde(default)]
    events: Vec<Json3Event>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Json3Event {
    #[serde(default)]
    t_start_ms: u64,
    #[serde(default)]
    d_duration_ms: u64,
    segs: Option<Vec<Json3Seg>>,
}

#[derive(Debug, Deserialize)]
struct Json3Seg {
    #[serde(default)]
    utf8: String,
}

/// Parse a JSON3 timed-text document.
pub fn parse_json3(body: &str) -> Result<Vec<TranscriptSegment>> {
    let doc: Json3Document = serde_json::from_str(body)?;

    Ok(doc
        .events
        .into_iter()
        .filter_map(|event| {
            let text: String = event.segs?.into_iter().map(|s| s.utf8).collect();
            if text.trim().is_empty() {
                return None;
            }
            Some(TranscriptSegment::new(
                event.t_start_ms as f64 / 1000.0,
                event.d_duration_ms as f64 / 1000.0,
                text,
            ))
        })
        .collect())
}

/// Parse a WebVTT document.
///
/// Auto-generated YouTube VTT repeats the previous line in each rolling cue;
/// consecutive duplicate texts are collapsed into one segment.
pub fn parse_vtt(body: &str) -> Result<Vec<TranscriptSegment>> {
    let mut segments: Vec<TranscriptSegment> = Vec::new();
    let mut lines = body.lines().peekable();

    while let Some(line) = lines.next() {
        let Some(caps) = VTT_CUE.captures(line.trim()) else {
            continue;
        };
        let start = parse_vtt_time(&caps[1])?;
        let end = parse_vtt_time(&caps[2])?;

        let mut text_lines = Vec::new();
        while let Some(next) = lines.peek() {
            if next.trim().is_empty() || next.contains("-->") {
                break;
            }
            text_lines.push(next.trim());
            lines.next();
        }

        let joined = text_lines.join(" ");
        let text = MARKUP.replace_all(&joined, "");
        let text = text.trim();
        if text.is_empty() {
            continue;
        }

        let fresh = strip_repeated(text, segments.last().map(|s| s.text.as_str()));
        if let Some(fresh) = fresh {
            segments.push(TranscriptSegment::new(start, (end - start).max(0.0), fresh));
        }
    }

    Ok(segments)
}

/// Drop text already emitted by the previous cue.
fn strip_repeated(text: &str, previous: Option<&str>) -> Option<String> {
    match previous {
        Some(prev) if prev == text => None,
        Some(prev) if text.starts_with(prev) => {
            let rest = text[prev.len()..].trim();
            (!rest.is_empty()).then(|| rest.to_string())
        }
        _ => Some(text.to_string()),
    }
}

fn parse_vtt_time(value: &str) -> Result<f64> {
    let normalized = value.replace(',', ".");
    let parts: Vec<&str> = normalized.split(':').collect();
    let parse = |s: &str| {
        s.parse::<f64>()
            .map_err(|_| YtsumError::InvalidInput(format!("Bad VTT timestamp: {}", value)))
    };
    match parts.as_slice() {
        [h, m, s] => Ok(parse(h)? * 3600.0 + parse(m)? * 60.0 + parse(s)?),
        [m, s] => Ok(parse(m)? * 60.0 + parse(s)?),
        _ => Err(YtsumError::InvalidInput(format!("Bad VTT timestamp: {}", value))),
    }
}
