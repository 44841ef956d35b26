//! Error types for ytsum.

use thiserror::Error;

/// Library-level error type for ytsum operations.
///
/// The first group of variants is the failure taxonomy shared by every
/// external call; the retry controller and the transcript acquirer dispatch
/// on it. The rest are plumbing errors.
#[derive(Error, Debug)]
pub enum YtsumError {
    #[error("Transient network error: {0}")]
    TransientNetwork(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Access blocked: {0}")]
    AccessBlocked(String),

    #[error("Transcript unavailable: {0}")]
    Unavailable(String),

    #[error("Malformed request: {0}")]
    MalformedRequest(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Unusable model output: {0}")]
    ModelOutput(String),

    #[error("All {0} map calls failed; last error: {1}")]
    PartialReduce(usize, String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Ledger error: {0}")]
    Ledger(String),

    #[error("Artifact error: {0}")]
    Artifact(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("External tool not found: {0}. Please install it and ensure it's in your PATH.")]
    ToolNotFound(String),

    #[error("External tool failed: {0}")]
    ToolFailed(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Cancelled")]
    Cancelled,
}

impl YtsumError {
    /// Whether the retry controller may try the operation again.
    pub fn is_retryable(&self) -> bool {
        match self {
            YtsumError::TransientNetwork(_) | YtsumError::RateLimited(_) => true,
            YtsumError::Http(e) => {
                e.is_timeout()
                    || e.is_connect()
                    || e.status().is_some_and(|s| {
                        s == reqwest::StatusCode::TOO_MANY_REQUESTS || s.is_server_error()
                    })
            }
            _ => false,
        }
    }

    pub fn is_access_blocked(&self) -> bool {
        matches!(self, YtsumError::AccessBlocked(_))
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, YtsumError::Unavailable(_))
    }

    /// Map an HTTP status from an external API onto the taxonomy.
    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let msg = format!("{}: {}", status, truncate(body, 300));
        match status.as_u16() {
            429 => YtsumError::RateLimited(msg),
            401 | 403 => YtsumError::Auth(msg),
            408 => YtsumError::TransientNetwork(msg),
            s if s >= 500 => YtsumError::TransientNetwork(msg),
            _ => YtsumError::MalformedRequest(msg),
        }
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max_chars).collect();
        format!("{}...", cut)
    }
}

/// Result type alias for ytsum operations.
pub type Result<T> = std::result::Result<T, YtsumError>;
