//! Run command implementation.

use super::open_ledger;
use crate::cli::preflight;
use crate::cli::{Output, RunArgs};
use crate::config::Settings;
use crate::ledger::MemoryLedger;
use crate::orchestrator::{plan, Orchestrator};
use crate::source::resolver_for;
use anyhow::{anyhow, Result};
use tokio_util::sync::CancellationToken;

/// Run the run command.
pub async fn run_run(args: &RunArgs, mut settings: Settings) -> Result<()> {
    settings.apply_overrides(&args.overrides());
    settings.validate()?;

    let source = args
        .source()
        .ok_or_else(|| anyhow!("one of --channel-id, --playlist-id, --url, --video-ids-file is required"))?;

    if !args.dry_run {
        if let Err(e) = preflight::check_run(&settings, &source) {
            Output::error(&format!("{}", e));
            Output::info("Run 'ytsum doctor' for detailed diagnostics.");
            return Err(e.into());
        }
    }

    let limit = (settings.run.max_items > 0).then_some(settings.run.max_items);
    let spinner = Output::spinner(&format!("Resolving {}", source));
    let resolved = resolver_for(&source).resolve(&source, limit).await;
    spinner.finish_and_clear();
    let items = resolved?;

    if items.is_empty() {
        Output::warning(&format!("No videos found for {}", source));
        return Ok(());
    }
    Output::info(&format!("{} videos from {}", items.len(), source));

    if args.dry_run {
        let planned = match open_ledger(&settings)? {
            Some(ledger) => plan(&ledger, &items, args.force).await?,
            None => plan(&MemoryLedger::new(), &items, args.force).await?,
        };
        for entry in &planned {
            Output::planned(&entry.item.id, &entry.item.title, entry.exists);
        }
        let new = planned.iter().filter(|p| !p.exists).count();
        Output::info(&format!("{} new, {} already done", new, planned.len() - new));
        return Ok(());
    }

    let orchestrator = Orchestrator::new(&settings)?;

    let cancel = CancellationToken::new();
    let watcher = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        })
    };

    let pb = Output::progress_bar(items.len() as u64, "summarizing");
    let report = orchestrator
        .run(&items, args.force, cancel.clone(), |done| {
            pb.set_message(format!("{} {}", done.id, done.outcome.label()));
            pb.inc(1);
        })
        .await;
    watcher.abort();
    pb.finish_and_clear();
    let report = report?;

    Output::report(&report);
    Output::kv("output", &orchestrator.artifacts().root().display().to_string());

    if cancel.is_cancelled() {
        Output::warning("Interrupted. Run the same command again to pick up where it stopped.");
    } else if report.failed > 0 {
        Output::warning("Some videos failed; run again to retry them, or see 'ytsum status --status failed'.");
    } else {
        Output::success("Done.");
    }

    Ok(())
}
