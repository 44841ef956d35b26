//! Configuration settings for ytsum.

use crate::chunking::ChunkingConfig;
use crate::error::{Result, YtsumError};
use crate::retry::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub general: GeneralSettings,
    pub transcript: TranscriptSettings,
    pub summary: SummarySettings,
    pub rate: RateSettings,
    pub retry: RetrySettings,
    pub run: RunSettings,
    pub prompts: PromptSettings,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// Directory receiving transcripts, summaries, and the ledger.
    pub output_dir: String,
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            output_dir: "./out".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// Transcript acquisition settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriptSettings {
    /// Preferred languages, most preferred first.
    pub languages: Vec<String>,
    /// Try yt-dlp before the watch page instead of only as fallback.
    pub use_ytdlp: bool,
    /// Proxy URL for transcript requests.
    pub proxy: Option<String>,
    /// Netscape cookies file passed to yt-dlp.
    pub cookies_file: Option<String>,
    /// Remove bracketed annotations such as `[Music]`.
    pub clean_tags: bool,
    /// Timeout for a single transcript request, in seconds.
    pub request_timeout_secs: u64,
}

impl Default for TranscriptSettings {
    fn default() -> Self {
        Self {
            languages: vec!["ja".to_string(), "ja-JP".to_string(), "en".to_string()],
            use_ytdlp: false,
            proxy: None,
            cookies_file: None,
            clean_tags: false,
            request_timeout_secs: 60,
        }
    }
}

/// Language-model provider.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    #[default]
    Anthropic,
    OpenAi,
}

impl Provider {
    pub fn default_model(&self) -> &'static str {
        match self {
            Provider::Anthropic => "claude-3-5-sonnet-latest",
            Provider::OpenAi => "gpt-4o-mini",
        }
    }

    /// Environment variable holding the API key.
    pub fn api_key_var(&self) -> &'static str {
        match self {
            Provider::Anthropic => "ANTHROPIC_API_KEY",
            Provider::OpenAi => "OPENAI_API_KEY",
        }
    }
}

impl std::str::FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "anthropic" | "claude" => Ok(Provider::Anthropic),
            "openai" => Ok(Provider::OpenAi),
            _ => Err(format!("Unknown provider: {}", s)),
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Provider::Anthropic => write!(f, "anthropic"),
            Provider::OpenAi => write!(f, "openai"),
        }
    }
}

/// Summarization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SummarySettings {
    pub provider: Provider,
    /// Model name; empty means the provider's default.
    pub model: String,
    /// Maximum characters per chunk.
    pub chunk_chars: usize,
    /// Characters shared by consecutive chunks.
    pub chunk_overlap: usize,
    pub map_max_tokens: u32,
    pub reduce_max_tokens: u32,
    /// Map calls in flight per item.
    pub map_concurrency: usize,
    /// Language tag the summaries are written in.
    pub output_language: String,
    /// Timeout for a single model call, in seconds.
    pub request_timeout_secs: u64,
}

impl Default for SummarySettings {
    fn default() -> Self {
        Self {
            provider: Provider::Anthropic,
            model: String::new(),
            chunk_chars: 6000,
            chunk_overlap: 300,
            map_max_tokens: 500,
            reduce_max_tokens: 2000,
            map_concurrency: 2,
            output_language: "ja".to_string(),
            request_timeout_secs: 120,
        }
    }
}

impl SummarySettings {
    /// The configured model, or the provider default.
    pub fn effective_model(&self) -> String {
        if self.model.trim().is_empty() {
            self.provider.default_model().to_string()
        } else {
            self.model.clone()
        }
    }

    pub fn chunking(&self) -> Result<ChunkingConfig> {
        ChunkingConfig::new(self.chunk_chars, self.chunk_overlap)
    }
}

/// Call rates for the two external API surfaces.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateSettings {
    /// Transcript requests per second, shared by all items.
    pub transcript_rps: f64,
    /// Model calls per second, shared by all items.
    pub summary_rps: f64,
    /// Calls allowed back to back before throttling starts.
    pub burst: u32,
}

impl Default for RateSettings {
    fn default() -> Self {
        Self {
            transcript_rps: 0.8,
            summary_rps: 0.8,
            burst: 1,
        }
    }
}

/// Retry settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    /// Total attempts including the first.
    pub max_attempts: u32,
    pub base_delay_secs: f64,
    pub max_delay_secs: f64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_secs: 4.0,
            max_delay_secs: 10.0,
        }
    }
}

impl RetrySettings {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_attempts,
            Duration::from_secs_f64(self.base_delay_secs.max(0.0)),
            Duration::from_secs_f64(self.max_delay_secs.max(0.0)),
        )
    }
}

/// Run settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunSettings {
    /// Maximum items resolved per run.
    pub max_items: usize,
    /// Items processed in parallel.
    pub concurrency: usize,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            max_items: 50,
            concurrency: 1,
        }
    }
}

/// Prompt customization settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptSettings {
    /// Directory for custom prompts (overrides defaults).
    pub custom_dir: Option<String>,
    /// Custom variables available in all prompts as {{variable_name}}.
    pub variables: HashMap<String, String>,
}

/// Command-line overrides; `None` keeps the file value.
#[derive(Debug, Clone, Default)]
pub struct SettingsOverrides {
    pub output_dir: Option<String>,
    pub languages: Option<Vec<String>>,
    pub use_ytdlp: bool,
    pub proxy: Option<String>,
    pub cookies_file: Option<String>,
    pub clean_tags: bool,
    pub provider: Option<Provider>,
    pub model: Option<String>,
    pub chunk_chars: Option<usize>,
    pub chunk_overlap: Option<usize>,
    pub reduce_max_tokens: Option<u32>,
    pub rps: Option<f64>,
    pub max_items: Option<usize>,
    pub concurrency: Option<usize>,
}

impl Settings {
    /// Load settings from the default configuration file.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load settings from a specific path, or default location if None.
    pub fn load_from(path: Option<&PathBuf>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p.clone(),
            None => Self::default_config_path(),
        };

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let settings: Settings = toml::from_str(&content)?;
            Ok(settings)
        } else if path.is_some() {
            Err(YtsumError::Config(format!(
                "Config file not found: {}",
                config_path.display()
            )))
        } else {
            Ok(Settings::default())
        }
    }

    /// Save settings to a specific path.
    pub fn save_to(&self, path: &PathBuf) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| YtsumError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("ytsum")
            .join("config.toml")
    }

    /// Expand shell variables in paths (e.g., ~).
    pub fn expand_path(path: &str) -> PathBuf {
        PathBuf::from(shellexpand::tilde(path).to_string())
    }

    /// Get the expanded output directory path.
    pub fn output_dir(&self) -> PathBuf {
        Self::expand_path(&self.general.output_dir)
    }

    /// Get the expanded cookies file path, if configured.
    pub fn cookies_file(&self) -> Option<PathBuf> {
        self.transcript
            .cookies_file
            .as_deref()
            .map(Self::expand_path)
    }

    /// Apply command-line overrides on top of the loaded file.
    pub fn apply_overrides(&mut self, o: &SettingsOverrides) {
        if let Some(dir) = &o.output_dir {
            self.general.output_dir = dir.clone();
        }
        if let Some(languages) = &o.languages {
            self.transcript.languages = languages.clone();
        }
        if o.use_ytdlp {
            self.transcript.use_ytdlp = true;
        }
        if o.proxy.is_some() {
            self.transcript.proxy = o.proxy.clone();
        }
        if o.cookies_file.is_some() {
            self.transcript.cookies_file = o.cookies_file.clone();
        }
        if o.clean_tags {
            self.transcript.clean_tags = true;
        }
        if let Some(provider) = o.provider {
            if provider != self.summary.provider && o.model.is_none() {
                // A model name from the file belongs to the other provider.
                self.summary.model.clear();
            }
            self.summary.provider = provider;
        }
        if let Some(model) = &o.model {
            self.summary.model = model.clone();
        }
        if let Some(chars) = o.chunk_chars {
            self.summary.chunk_chars = chars;
        }
        if let Some(overlap) = o.chunk_overlap {
            self.summary.chunk_overlap = overlap;
        }
        if let Some(tokens) = o.reduce_max_tokens {
            self.summary.reduce_max_tokens = tokens;
        }
        if let Some(rps) = o.rps {
            self.rate.transcript_rps = rps;
            self.rate.summary_rps = rps;
        }
        if let Some(max) = o.max_items {
            self.run.max_items = max;
        }
        if let Some(concurrency) = o.concurrency {
            self.run.concurrency = concurrency;
        }
    }

    /// Reject settings the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        self.summary.chunking()?;

        if self.transcript.languages.iter().all(|l| l.trim().is_empty()) {
            return Err(YtsumError::Config(
                "at least one preferred language is required".into(),
            ));
        }
        for (name, rps) in [
            ("rate.transcript_rps", self.rate.transcript_rps),
            ("rate.summary_rps", self.rate.summary_rps),
        ] {
            if !rps.is_finite() || rps <= 0.0 {
                return Err(YtsumError::Config(format!("{} must be positive, got {}", name, rps)));
            }
        }
        if self.retry.max_attempts == 0 {
            return Err(YtsumError::Config("retry.max_attempts must be at least 1".into()));
        }
        if self.run.concurrency == 0 || self.summary.map_concurrency == 0 {
            return Err(YtsumError::Config("concurrency must be at least 1".into()));
        }
        Ok(())
    }
}
