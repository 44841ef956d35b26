//! Show command - print a stored summary.

use super::with_outdir;
use crate::artifacts::ArtifactStore;
use crate::cli::Output;
use crate::config::Settings;
use crate::source::parse_video_id;
use anyhow::{anyhow, Result};

/// Run the show command.
pub fn run_show(video: &str, outdir: Option<&str>, json: bool, settings: Settings) -> Result<()> {
    let settings = with_outdir(settings, outdir);
    let id = parse_video_id(video).unwrap_or_else(|| video.trim().to_string());
    let store = ArtifactStore::new(settings.output_dir())?;

    let rendered = if json {
        store
            .read_summary(&id)?
            .map(|summary| serde_json::to_string_pretty(&summary))
            .transpose()?
    } else {
        store.read_summary_markdown(&id)?
    };

    match rendered {
        Some(text) => {
            println!("{}", text);
            Ok(())
        }
        None => {
            Output::error(&format!("No summary for {} in {}", id, store.root().display()));
            Output::info("Check 'ytsum status' to see why it was not summarized.");
            Err(anyhow!("summary not found: {}", id))
        }
    }
}
