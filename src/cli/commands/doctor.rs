//! Doctor command - verify system requirements and configuration.

use crate::cli::Output;
use crate::config::{Provider, Settings};
use console::style;
use std::path::Path;
use std::process::Command;

/// Check result for a single item.
#[derive(Debug)]
pub struct CheckResult {
    pub name: String,
    pub status: CheckStatus,
    pub message: String,
    pub hint: Option<String>,
}

#[derive(Debug, PartialEq)]
pub enum CheckStatus {
    Ok,
    Warning,
    Error,
}

impl CheckResult {
    fn ok(name: &str, message: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Ok,
            message: message.to_string(),
            hint: None,
        }
    }

    fn warning(name: &str, message: &str, hint: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Warning,
            message: message.to_string(),
            hint: Some(hint.to_string()),
        }
    }

    fn error(name: &str, message: &str, hint: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Error,
            message: message.to_string(),
            hint: Some(hint.to_string()),
        }
    }

    fn print(&self) {
        let icon = match self.status {
            CheckStatus::Ok => style("✓").green(),
            CheckStatus::Warning => style("!").yellow(),
            CheckStatus::Error => style("✗").red(),
        };

        println!("  {} {} - {}", icon, style(&self.name).bold(), self.message);

        if let Some(hint) = &self.hint {
            println!("    {} {}", style("→").dim(), style(hint).dim());
        }
    }
}

/// Run all diagnostic checks.
pub fn run_doctor(config_path: Option<&str>, settings: &Settings) -> anyhow::Result<()> {
    Output::header("ytsum doctor");
    println!();

    let mut checks = Vec::new();

    println!("{}", style("External Tools").bold());
    checks.push(section(check_ytdlp(settings.transcript.use_ytdlp)));
    println!();

    println!("{}", style("Language Model").bold());
    checks.push(section(check_api_key(settings.summary.provider)));
    checks.push(section(CheckResult::ok(
        "Model",
        &format!("{} / {}", settings.summary.provider, settings.summary.effective_model()),
    )));
    println!();

    println!("{}", style("Output").bold());
    checks.push(section(check_output_dir(&settings.output_dir())));
    println!();

    println!("{}", style("Configuration").bold());
    checks.push(section(check_config_file(config_path)));
    checks.push(section(match settings.validate() {
        Ok(()) => CheckResult::ok("Settings", "valid"),
        Err(e) => CheckResult::error("Settings", &e.to_string(), "Fix the value in the config file"),
    }));
    println!();

    let errors = checks.iter().filter(|c| c.status == CheckStatus::Error).count();
    let warnings = checks.iter().filter(|c| c.status == CheckStatus::Warning).count();

    if errors > 0 {
        Output::error(&format!(
            "{} error(s) found. Please fix them before running ytsum.",
            errors
        ));
        std::process::exit(1);
    } else if warnings > 0 {
        Output::warning(&format!("All checks passed with {} warning(s).", warnings));
    } else {
        Output::success("All checks passed! ytsum is ready to use.");
    }

    Ok(())
}

fn section(check: CheckResult) -> CheckResult {
    check.print();
    check
}

/// yt-dlp lists channels and playlists and serves as the fallback transport.
fn check_ytdlp(required: bool) -> CheckResult {
    match Command::new("yt-dlp").arg("--version").output() {
        Ok(output) if output.status.success() => {
            let version = String::from_utf8_lossy(&output.stdout).trim().to_string();
            CheckResult::ok("yt-dlp", &version)
        }
        Ok(_) => CheckResult::error("yt-dlp", "installed but not working", install_hint_ytdlp()),
        Err(_) if required => {
            CheckResult::error("yt-dlp", "not found (transcript.use_ytdlp is set)", install_hint_ytdlp())
        }
        Err(_) => CheckResult::warning(
            "yt-dlp",
            "not found; only --video-ids-file sources work and there is no fallback transport",
            install_hint_ytdlp(),
        ),
    }
}

fn check_api_key(provider: Provider) -> CheckResult {
    let var = provider.api_key_var();
    match std::env::var(var) {
        Ok(key) if key.trim().is_empty() => {
            CheckResult::error(var, "empty", &format!("Set with: export {}='...'", var))
        }
        Ok(key) => CheckResult::ok(var, &format!("configured ({})", mask_key(&key))),
        Err(_) => CheckResult::error(var, "not set", &format!("Set with: export {}='...'", var)),
    }
}

fn check_output_dir(dir: &Path) -> CheckResult {
    if let Err(e) = std::fs::create_dir_all(dir) {
        return CheckResult::error(
            "Output directory",
            &format!("{} ({})", dir.display(), e),
            "Choose another directory with --outdir",
        );
    }
    match tempfile::NamedTempFile::new_in(dir) {
        Ok(_) => {
            let ledger = dir.join("ledger.db");
            let note = if ledger.exists() { "ledger present" } else { "no ledger yet" };
            CheckResult::ok("Output directory", &format!("{} ({})", dir.display(), note))
        }
        Err(e) => CheckResult::error(
            "Output directory",
            &format!("{} is not writable ({})", dir.display(), e),
            "Choose another directory with --outdir",
        ),
    }
}

fn check_config_file(config_path: Option<&str>) -> CheckResult {
    let path = config_path
        .map(Settings::expand_path)
        .unwrap_or_else(Settings::default_config_path);
    if path.exists() {
        CheckResult::ok("Config file", &path.display().to_string())
    } else {
        CheckResult::warning(
            "Config file",
            "using defaults",
            "Create with: ytsum config init",
        )
    }
}

/// Show only the first and last four characters of a key.
fn mask_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 12 {
        return "****".to_string();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}...{}", head, tail)
}

/// Platform-specific install hint for yt-dlp.
fn install_hint_ytdlp() -> &'static str {
    if cfg!(target_os = "macos") {
        "Install with: brew install yt-dlp"
    } else if cfg!(target_os = "linux") {
        "Install with: pip install yt-dlp (or your package manager)"
    } else {
        "Install from: https://github.com/yt-dlp/yt-dlp"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_result_error() {
        let result = CheckResult::error("test", "failed", "fix it");
        assert_eq!(result.status, CheckStatus::Error);
        assert_eq!(result.hint, Some("fix it".to_string()));
    }

    #[test]
    fn test_mask_key() {
        assert_eq!(mask_key("short"), "****");
        assert_eq!(mask_key("sk-ant-abcdefghijklmn"), "sk-a...klmn");
    }

    #[test]
    fn test_output_dir_writable() {
        let dir = tempfile::tempdir().unwrap();
        let check = check_output_dir(&dir.path().join("out"));
        assert_eq!(check.status, CheckStatus::Ok);
        assert!(check.message.contains("no ledger yet"));
    }
}
