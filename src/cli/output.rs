//! CLI output formatting utilities.

use crate::ledger::{LedgerRecord, LedgerStatus, RunReport};
use console::{style, StyledObject};
use indicatif::{ProgressBar, ProgressStyle};

/// Output helper for CLI formatting.
pub struct Output;

impl Output {
    /// Print an info message.
    pub fn info(msg: &str) {
        println!("{} {}", style(">>").cyan().bold(), msg);
    }

    /// Print a success message.
    pub fn success(msg: &str) {
        println!("{} {}", style(">>").green().bold(), msg);
    }

    /// Print a warning message.
    pub fn warning(msg: &str) {
        eprintln!("{} {}", style(">>").yellow().bold(), msg);
    }

    /// Print an error message.
    pub fn error(msg: &str) {
        eprintln!("{} {}", style(">>").red().bold(), msg);
    }

    /// Print a header.
    pub fn header(msg: &str) {
        println!("\n{}", style(msg).bold().underlined());
    }

    /// Print a key-value pair.
    pub fn kv(key: &str, value: &str) {
        println!("  {}: {}", style(key).dim(), value);
    }

    /// One line of a dry run.
    pub fn planned(id: &str, title: &str, exists: bool) {
        let tag = if exists {
            style("EXISTS").dim()
        } else {
            style("NEW   ").green().bold()
        };
        println!("  {} {} {}", tag, id, style(title).dim());
    }

    /// One ledger row.
    pub fn record(record: &LedgerRecord) {
        let title = if record.title.is_empty() {
            record.url.as_str()
        } else {
            record.title.as_str()
        };
        println!(
            "  {} {} {}",
            status_style(record.status),
            style(&record.id).bold(),
            content_preview(title, 60)
        );
        if let Some(error) = &record.error {
            println!("      {}", style(content_preview(error, 120)).dim());
        }
    }

    /// Totals at the end of a run.
    pub fn report(report: &RunReport) {
        Output::header("Run summary");
        Output::kv("summarized", &report.summarized.to_string());
        Output::kv("transcript unavailable", &report.transcript_unavailable.to_string());
        Output::kv("failed", &report.failed.to_string());
        if report.pending > 0 {
            Output::kv("not finished", &report.pending.to_string());
        }
        Output::kv("skipped (already done)", &report.skipped.to_string());
    }

    /// Create a progress bar.
    pub fn progress_bar(len: u64, msg: &str) -> ProgressBar {
        let pb = ProgressBar::new(len);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        pb.set_message(msg.to_string());
        pb
    }

    /// Create a spinner.
    pub fn spinner(msg: &str) -> ProgressBar {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_message(msg.to_string());
        pb.enable_steady_tick(std::time::Duration::from_millis(100));
        pb
    }
}

fn status_style(status: LedgerStatus) -> StyledObject<String> {
    let label = format!("{:<22}", status.as_str());
    match status {
        LedgerStatus::Summarized => style(label).green(),
        LedgerStatus::TranscriptUnavailable => style(label).yellow(),
        LedgerStatus::Failed => style(label).red(),
        LedgerStatus::Pending => style(label).dim(),
    }
}

/// Truncate content with ellipsis.
fn content_preview(content: &str, max_chars: usize) -> String {
    let content = content.replace('\n', " ");
    if content.chars().count() <= max_chars {
        content
    } else {
        let cut: String = content.chars().take(max_chars).collect();
        format!("{}...", cut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_preview_is_char_safe() {
        assert_eq!(content_preview("short", 10), "short");
        assert_eq!(content_preview("日本語のタイトル", 3), "日本語...");
        assert_eq!(content_preview("a\nb", 10), "a b");
    }
}
