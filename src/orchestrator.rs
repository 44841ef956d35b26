//! Pipeline orchestrator for ytsum.
//!
//! Drives each item through acquire → chunk → map → reduce, records exactly
//! one ledger row per terminal state, and fans out across the item list.

use crate::artifacts::ArtifactStore;
use crate::config::{Prompts, Settings};
use crate::error::{Result, YtsumError};
use crate::ledger::{Ledger, LedgerRecord, LedgerStatus, RunReport, SqliteLedger};
use crate::ratelimit::RateLimiter;
use crate::source::Item;
use crate::summarize::{create_model, tokens_estimate, MapReduceSummarizer, SummarizerOptions};
use crate::transcript::{
    Acquisition, TranscriptAcquirer, TranscriptResult, WatchPageTransport, YtDlpTransport,
};
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, info_span, instrument, warn, Instrument};

/// How one item's processing ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome {
    /// Already complete in the ledger; nothing was called.
    Skipped,
    Summarized,
    TranscriptUnavailable(String),
    Failed(String),
    /// The run was cancelled before the item reached a terminal state.
    Cancelled,
}

impl ItemOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            ItemOutcome::Skipped => "skipped",
            ItemOutcome::Summarized => "summarized",
            ItemOutcome::TranscriptUnavailable(_) => "transcript_unavailable",
            ItemOutcome::Failed(_) => "failed",
            ItemOutcome::Cancelled => "cancelled",
        }
    }
}

/// Outcome of one item within a run.
#[derive(Debug, Clone)]
pub struct ItemReport {
    pub id: String,
    pub outcome: ItemOutcome,
}

/// Whether a dry run would process an item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedItem {
    pub item: Item,
    /// The ledger already has the item complete, so a run would skip it.
    pub exists: bool,
}

/// Classify items as new or existing without calling any transport.
pub async fn plan(ledger: &dyn Ledger, items: &[Item], force: bool) -> Result<Vec<PlannedItem>> {
    let mut planned = Vec::with_capacity(items.len());
    for item in items {
        planned.push(PlannedItem {
            item: item.clone(),
            exists: ledger.has_completed(&item.id, force).await?,
        });
    }
    Ok(planned)
}

/// The main orchestrator for the ytsum pipeline.
pub struct Orchestrator {
    acquirer: Arc<TranscriptAcquirer>,
    summarizer: Arc<MapReduceSummarizer>,
    ledger: Arc<dyn Ledger>,
    artifacts: ArtifactStore,
    concurrency: usize,
}

impl Orchestrator {
    /// Create an orchestrator wired from settings.
    pub fn new(settings: &Settings) -> Result<Self> {
        settings.validate()?;

        let retry = settings.retry.policy();
        let transcript_limiter = Arc::new(RateLimiter::new(
            "transcript",
            settings.rate.transcript_rps,
            settings.rate.burst,
        )?);
        let summary_limiter = Arc::new(RateLimiter::new(
            "summary",
            settings.rate.summary_rps,
            settings.rate.burst,
        )?);

        let languages: Vec<String> = settings
            .transcript
            .languages
            .iter()
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty())
            .collect();
        let timeout = Duration::from_secs(settings.transcript.request_timeout_secs);

        let primary = Arc::new(WatchPageTransport::new(
            settings.transcript.proxy.as_deref(),
            timeout,
            &languages,
        )?);
        let secondary = Arc::new(
            YtDlpTransport::new(timeout)
                .with_proxy(settings.transcript.proxy.clone())
                .with_cookies_file(settings.cookies_file().filter(|p| p.exists())),
        );
        info!(
            "Transcript strategies: {}",
            if settings.transcript.use_ytdlp {
                "yt-dlp, then watch page"
            } else {
                "watch page, then yt-dlp"
            }
        );
        let acquirer = TranscriptAcquirer::new(primary, languages, transcript_limiter, retry.clone())
            .with_secondary(secondary, settings.transcript.use_ytdlp)
            .with_tag_stripping(settings.transcript.clean_tags);

        let prompts = Prompts::load(
            settings.prompts.custom_dir.as_deref(),
            Some(&settings.prompts.variables),
        )?;
        let model = create_model(&settings.summary)?;
        info!("Summarizing with {}", model.name());

        let summarizer = MapReduceSummarizer::new(
            model,
            summary_limiter,
            retry,
            prompts,
            SummarizerOptions {
                chunking: settings.summary.chunking()?,
                map_max_tokens: settings.summary.map_max_tokens,
                reduce_max_tokens: settings.summary.reduce_max_tokens,
                map_concurrency: settings.summary.map_concurrency,
                output_language: settings.summary.output_language.clone(),
            },
        );

        let artifacts = ArtifactStore::new(settings.output_dir())?;
        let ledger = Arc::new(SqliteLedger::new(&artifacts.ledger_path())?);

        Ok(Self::with_components(
            Arc::new(acquirer),
            Arc::new(summarizer),
            ledger,
            artifacts,
            settings.run.concurrency,
        ))
    }

    /// Create an orchestrator with custom components.
    pub fn with_components(
        acquirer: Arc<TranscriptAcquirer>,
        summarizer: Arc<MapReduceSummarizer>,
        ledger: Arc<dyn Ledger>,
        artifacts: ArtifactStore,
        concurrency: usize,
    ) -> Self {
        Self {
            acquirer,
            summarizer,
            ledger,
            artifacts,
            concurrency: concurrency.max(1),
        }
    }

    pub fn ledger(&self) -> Arc<dyn Ledger> {
        self.ledger.clone()
    }

    pub fn artifacts(&self) -> &ArtifactStore {
        &self.artifacts
    }

    /// Process every item, at most `concurrency` at a time.
    ///
    /// A failing item never stops the run. After `cancel` fires no new item
    /// starts and in-flight items stop at their next suspension point without
    /// touching the ledger. `on_item` is called as each item finishes.
    pub async fn run<F>(
        &self,
        items: &[Item],
        force: bool,
        cancel: CancellationToken,
        on_item: F,
    ) -> Result<RunReport>
    where
        F: Fn(&ItemReport) + Sync,
    {
        let run_id = uuid::Uuid::new_v4();
        let span = info_span!("run", %run_id, items = items.len(), force);

        async {
            info!("Processing {} items", items.len());

            let reports: Vec<ItemReport> = stream::iter(items)
                .map(|item| {
                    let cancel = cancel.clone();
                    let on_item = &on_item;
                    async move {
                        let outcome = if cancel.is_cancelled() {
                            ItemOutcome::Cancelled
                        } else {
                            tokio::select! {
                                biased;
                                _ = cancel.cancelled() => ItemOutcome::Cancelled,
                                result = self.process_item(item, force) => match result {
                                    Ok(outcome) => outcome,
                                    Err(e) => {
                                        error!("Could not record {}: {}", item.id, e);
                                        ItemOutcome::Failed(e.to_string())
                                    }
                                },
                            }
                        };
                        let report = ItemReport {
                            id: item.id.clone(),
                            outcome,
                        };
                        on_item(&report);
                        report
                    }
                })
                .buffer_unordered(self.concurrency)
                .collect()
                .await;

            let ids: Vec<String> = items.iter().map(|i| i.id.clone()).collect();
            let mut report = self.ledger.report(&ids).await?;
            report.skipped = reports
                .iter()
                .filter(|r| r.outcome == ItemOutcome::Skipped)
                .count();

            let cancelled = reports
                .iter()
                .filter(|r| r.outcome == ItemOutcome::Cancelled)
                .count();
            if cancelled > 0 {
                warn!("Run cancelled; {} items not finished", cancelled);
            }
            info!(
                "Run finished: {} summarized, {} unavailable, {} failed, {} skipped",
                report.summarized, report.transcript_unavailable, report.failed, report.skipped
            );
            Ok(report)
        }
        .instrument(span)
        .await
    }

    /// Drive one item to a terminal state and record it.
    ///
    /// Item failures are outcomes, not errors; `Err` means the ledger itself
    /// could not be read or written.
    #[instrument(skip(self, item), fields(video_id = %item.id))]
    pub async fn process_item(&self, item: &Item, force: bool) -> Result<ItemOutcome> {
        if self.ledger.has_completed(&item.id, force).await? {
            info!("Already complete, skipping");
            return Ok(ItemOutcome::Skipped);
        }

        let mut record = LedgerRecord::pending(&item.id);
        record.title = item.title.clone();
        record.url = item.canonical_url.clone();
        record.published_at = item.published_at;

        let outcome = self.advance(item, force, &mut record).await;
        match &outcome {
            ItemOutcome::Summarized => {
                record.status = LedgerStatus::Summarized;
                record.error = None;
            }
            ItemOutcome::TranscriptUnavailable(reason) => {
                record.status = LedgerStatus::TranscriptUnavailable;
                record.error = Some(reason.clone());
            }
            ItemOutcome::Failed(reason) => {
                record.status = LedgerStatus::Failed;
                record.error = Some(reason.clone());
            }
            ItemOutcome::Skipped | ItemOutcome::Cancelled => return Ok(outcome),
        }

        // Files from an earlier run must not outlive a worse outcome.
        if record.status != LedgerStatus::Summarized {
            self.artifacts.remove_summary(&item.id)?;
        }
        if record.status == LedgerStatus::TranscriptUnavailable {
            self.artifacts.remove_transcript(&item.id)?;
        }

        self.ledger.upsert(&record).await?;
        match &outcome {
            ItemOutcome::Summarized => info!("Summarized"),
            other => warn!("{}: {}", other.label(), record.error.as_deref().unwrap_or("")),
        }
        Ok(outcome)
    }

    /// Run acquisition and summarization, filling in `record` on the way.
    async fn advance(&self, item: &Item, force: bool, record: &mut LedgerRecord) -> ItemOutcome {
        let transcript = match self.transcript_for(item, force).await {
            Ok(Acquisition::Acquired(transcript)) => transcript,
            Ok(Acquisition::Unavailable(reason)) => {
                return ItemOutcome::TranscriptUnavailable(reason)
            }
            Err(e) => return ItemOutcome::Failed(e.to_string()),
        };

        record.language = Some(transcript.language_label());
        record.transcript_chars = transcript.char_count();
        record.tokens_estimate = tokens_estimate(transcript.char_count(), &transcript.language);

        if transcript.char_count() == 0 {
            return ItemOutcome::TranscriptUnavailable("transcript is empty".into());
        }

        let summary = match self.summarizer.summarize(item, &transcript).await {
            Ok(summary) => summary,
            Err(e) => return ItemOutcome::Failed(e.to_string()),
        };

        match self.artifacts.write_summary(&summary) {
            Ok(()) => ItemOutcome::Summarized,
            Err(e) => ItemOutcome::Failed(e.to_string()),
        }
    }

    /// Reuse transcript artifacts from an earlier run unless forced;
    /// otherwise acquire and persist a fresh transcript.
    async fn transcript_for(&self, item: &Item, force: bool) -> Result<Acquisition> {
        if !force {
            match self.artifacts.load_transcript(&item.id) {
                Ok(Some(cached)) if cached.char_count() > 0 => {
                    info!("Reusing transcript from an earlier run");
                    return Ok(Acquisition::Acquired(cached));
                }
                Ok(_) => {}
                Err(e) => warn!("Ignoring unreadable transcript artifact: {}", e),
            }
        }

        let acquisition = self
            .acquirer
            .acquire(&item.id)
            .instrument(info_span!("acquire"))
            .await?;
        if let Acquisition::Acquired(transcript) = &acquisition {
            self.persist_transcript(transcript)?;
        }
        Ok(acquisition)
    }

    fn persist_transcript(&self, transcript: &TranscriptResult) -> Result<()> {
        self.artifacts
            .write_transcript(transcript)
            .map_err(|e| YtsumError::Artifact(format!("transcript for {}: {}", transcript.video_id, e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_labels_match_ledger_status() {
        assert_eq!(
            ItemOutcome::Summarized.label(),
            LedgerStatus::Summarized.as_str()
        );
        assert_eq!(
            ItemOutcome::TranscriptUnavailable(String::new()).label(),
            LedgerStatus::TranscriptUnavailable.as_str()
        );
        assert_eq!(ItemOutcome::Failed(String::new()).label(), LedgerStatus::Failed.as_str());
    }
}
