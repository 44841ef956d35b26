//! Summary schema and helpers shared by the map and reduce steps.

use crate::error::{Result, YtsumError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Maximum number of highlights kept in a summary.
pub const MAX_HIGHLIGHTS: usize = 10;

/// A quote with its approximate position in the video.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotableQuote {
    /// `MM:SS` or `HH:MM:SS`.
    #[serde(alias = "t", default)]
    pub timestamp: String,
    #[serde(default)]
    pub text: String,
}

/// What the map step extracts from one chunk.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PartialSummary {
    pub key_points: Vec<String>,
    pub quotes: Vec<NotableQuote>,
    pub insights: Vec<String>,
}

impl PartialSummary {
    /// Parse a map response.
    ///
    /// Accepts the JSON object the prompt asks for; a plain bullet list is
    /// taken as key points.
    pub fn from_response(response: &str) -> Result<Self> {
        if let Some(json) = extract_json_object(response) {
            if let Ok(partial) = serde_json::from_str::<PartialSummary>(json) {
                if !partial.is_empty() {
                    return Ok(partial);
                }
            }
        }

        let key_points: Vec<String> = response
            .lines()
            .filter_map(strip_bullet)
            .map(str::to_string)
            .collect();
        if key_points.is_empty() {
            return Err(YtsumError::ModelOutput(format!(
                "no key points in map response: {}",
                preview(response)
            )));
        }
        Ok(Self {
            key_points,
            ..Default::default()
        })
    }

    pub fn is_empty(&self) -> bool {
        self.key_points.is_empty() && self.quotes.is_empty() && self.insights.is_empty()
    }

    /// Render as a section of the reduce prompt.
    pub fn render(&self, heading: &str) -> String {
        let mut out = format!("### {}\n", heading);
        for point in &self.key_points {
            out.push_str(&format!("- {}\n", point));
        }
        if !self.insights.is_empty() {
            out.push_str("Insights:\n");
            for insight in &self.insights {
                out.push_str(&format!("- {}\n", insight));
            }
        }
        if !self.quotes.is_empty() {
            out.push_str("Quotes:\n");
            for quote in &self.quotes {
                out.push_str(&format!("- [{}] {}\n", quote.timestamp, quote.text));
            }
        }
        out
    }
}

/// Fields the reduce step asks the model for.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ReduceOutput {
    pub summary: String,
    pub highlights: Vec<String>,
    pub new_insights: Vec<String>,
    pub notable_quotes: Vec<NotableQuote>,
}

impl ReduceOutput {
    pub fn from_response(response: &str) -> Result<Self> {
        let json = extract_json_object(response).ok_or_else(|| {
            YtsumError::ModelOutput(format!("no JSON object in reduce response: {}", preview(response)))
        })?;
        let output: ReduceOutput = serde_json::from_str(json)
            .map_err(|e| YtsumError::ModelOutput(format!("reduce response: {}", e)))?;
        if output.summary.trim().is_empty() {
            return Err(YtsumError::ModelOutput("reduce response has no summary".into()));
        }
        Ok(output)
    }
}

/// The final structured summary of one item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub video_id: String,
    pub title: String,
    pub url: String,
    pub published_at: Option<DateTime<Utc>>,
    pub language: String,
    pub summary: String,
    pub highlights: Vec<String>,
    pub new_insights: Vec<String>,
    pub notable_quotes: Vec<NotableQuote>,
    pub tokens_estimate: usize,
}

impl Summary {
    /// Human-readable Markdown rendering.
    pub fn to_markdown(&self) -> String {
        let date = self
            .published_at
            .map(|dt| dt.format("%Y-%m-%d").to_string())
            .unwrap_or_default();
        let title = if self.title.is_empty() {
            self.video_id.as_str()
        } else {
            self.title.as_str()
        };

        let mut md = format!(
            "# {}\n\n- Published: {}\n- URL: {}\n- Language: {}\n\n## TL;DR\n\n{}\n\n## Highlights\n\n",
            title, date, self.url, self.language, self.summary
        );
        for highlight in &self.highlights {
            md.push_str(&format!("- {}\n", highlight));
        }

        md.push_str("\n## New insights\n\n");
        for insight in &self.new_insights {
            md.push_str(&format!("- {}\n", insight));
        }

        if !self.notable_quotes.is_empty() {
            md.push_str("\n## Notable quotes\n\n");
            for quote in &self.notable_quotes {
                let t = if quote.timestamp.is_empty() {
                    "??:??"
                } else {
                    quote.timestamp.as_str()
                };
                md.push_str(&format!("- [{}] {}\n", t, quote.text));
            }
        }

        md
    }
}

/// Estimate tokens from the transcript length.
///
/// CJK scripts pack roughly two characters per token, other languages four.
pub fn tokens_estimate(transcript_chars: usize, language: &str) -> usize {
    transcript_chars / chars_per_token(language)
}

fn chars_per_token(language: &str) -> usize {
    let primary = language
        .split(['-', '_', ' '])
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase();
    match primary.as_str() {
        "ja" | "zh" | "ko" => 2,
        _ => 4,
    }
}

/// Find the outermost JSON object in a model response, ignoring code fences
/// and surrounding prose.
pub fn extract_json_object(response: &str) -> Option<&str> {
    let start = response.find('{')?;
    let end = response.rfind('}')?;
    (end > start).then(|| &response[start..=end])
}

fn strip_bullet(line: &str) -> Option<&str> {
    let line = line.trim();
    let rest = line
        .strip_prefix("- ")
        .or_else(|| line.strip_prefix("* "))
        .or_else(|| line.strip_prefix("• "))
        .or_else(|| line.strip_prefix("・"))
        .or_else(|| {
            let digits = line.find(|c: char| !c.is_ascii_digit())?;
            if digits == 0 {
                return None;
            }
            line[digits..].strip_prefix(". ")
        })?;
    let rest = rest.trim();
    (!rest.is_empty()).then_some(rest)
}

fn preview(text: &str) -> String {
    let cut: String = text.chars().take(120).collect();
    if cut.len() < text.len() {
        format!("{}...", cut)
    } else {
        cut
    }
}
