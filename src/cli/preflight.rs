//! Pre-flight checks before a run.
//!
//! Validates that required tools and configuration are available
//! before starting a batch that would otherwise fail on every item.

use crate::config::{Provider, Settings};
use crate::error::{Result, YtsumError};
use crate::source::SourceSpec;
use std::process::Command;

/// Run pre-flight checks for a run over `source`.
///
/// Returns Ok(()) if all checks pass, or an error describing what's missing.
pub fn check_run(settings: &Settings, source: &SourceSpec) -> Result<()> {
    check_api_key(settings.summary.provider)?;
    // Channel and playlist listings always go through yt-dlp.
    if !matches!(source, SourceSpec::File(_)) || settings.transcript.use_ytdlp {
        check_tool("yt-dlp")?;
    }
    Ok(())
}

/// Check that the provider's API key is configured.
pub fn check_api_key(provider: Provider) -> Result<()> {
    let var = provider.api_key_var();
    match std::env::var(var) {
        Ok(key) if !key.trim().is_empty() => Ok(()),
        Ok(_) => Err(YtsumError::Auth(format!(
            "{} is empty. Set it with: export {}='...'",
            var, var
        ))),
        Err(_) => Err(YtsumError::Auth(format!(
            "{} not set. Set it with: export {}='...'",
            var, var
        ))),
    }
}

/// Check if an external tool is available.
pub fn check_tool(name: &str) -> Result<()> {
    match Command::new(name).arg("--version").output() {
        Ok(output) if output.status.success() => Ok(()),
        Ok(_) => Err(YtsumError::ToolNotFound(format!(
            "{} is installed but not working correctly",
            name
        ))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(YtsumError::ToolNotFound(name.to_string()))
        }
        Err(e) => Err(YtsumError::ToolNotFound(format!("{}: {}", name, e))),
    }
}
