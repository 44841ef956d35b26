//! Status command - show the ledger.

use super::{open_ledger, with_outdir};
use crate::cli::Output;
use crate::config::Settings;
use crate::ledger::{Ledger, LedgerStatus};
use anyhow::Result;

/// Run the status command.
pub async fn run_status(
    outdir: Option<&str>,
    status: Option<&str>,
    settings: Settings,
) -> Result<()> {
    let settings = with_outdir(settings, outdir);
    let filter = status.map(|s| s.parse::<LedgerStatus>()).transpose()?;

    let Some(ledger) = open_ledger(&settings)? else {
        Output::info(&format!(
            "No ledger in {} yet. Start with: ytsum run --channel-id <id>",
            settings.output_dir().display()
        ));
        return Ok(());
    };

    let records = ledger.records().await?;
    Output::header(&format!("Ledger ({})", settings.output_dir().display()));
    for record in records
        .iter()
        .filter(|r| filter.map_or(true, |status| r.status == status))
    {
        Output::record(record);
    }

    Output::header("Totals");
    for (status, count) in ledger.status_counts().await? {
        Output::kv(status.as_str(), &count.to_string());
    }
    Output::kv("total", &records.len().to_string());

    Ok(())
}
