//! Map-reduce summarization over transcript chunks.

use super::{
    tokens_estimate, CompletionRequest, LanguageModel, PartialSummary, ReduceOutput, Summary,
    MAX_HIGHLIGHTS,
};
use crate::chunking::{chunk_text, Chunk, ChunkingConfig};
use crate::config::Prompts;
use crate::error::{Result, YtsumError};
use crate::ratelimit::RateLimiter;
use crate::retry::RetryPolicy;
use crate::source::Item;
use crate::transcript::{format_timestamp, TranscriptResult};
use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Token limits and fan-out for the summarizer.
#[derive(Debug, Clone)]
pub struct SummarizerOptions {
    pub chunking: ChunkingConfig,
    pub map_max_tokens: u32,
    pub reduce_max_tokens: u32,
    /// Map calls in flight per item. The shared limiter still bounds the rate.
    pub map_concurrency: usize,
    /// Language tag the final summary is written in.
    pub output_language: String,
}

impl Default for SummarizerOptions {
    fn default() -> Self {
        Self {
            chunking: ChunkingConfig::default(),
            map_max_tokens: 500,
            reduce_max_tokens: 2000,
            map_concurrency: 2,
            output_language: "ja".to_string(),
        }
    }
}

/// Summarizes a transcript by extracting points per chunk, then merging them.
pub struct MapReduceSummarizer {
    model: Arc<dyn LanguageModel>,
    limiter: Arc<RateLimiter>,
    retry: RetryPolicy,
    prompts: Prompts,
    options: SummarizerOptions,
}

impl MapReduceSummarizer {
    pub fn new(
        model: Arc<dyn LanguageModel>,
        limiter: Arc<RateLimiter>,
        retry: RetryPolicy,
        prompts: Prompts,
        options: SummarizerOptions,
    ) -> Self {
        Self {
            model,
            limiter,
            retry,
            prompts,
            options,
        }
    }

    pub fn model_name(&self) -> String {
        self.model.name()
    }

    /// Chunk, map, and reduce one transcript.
    ///
    /// Fails with `PartialReduce` when no map call survives; otherwise the
    /// summary is built from whatever partials succeeded.
    #[instrument(skip_all, fields(video_id = %item.id))]
    pub async fn summarize(&self, item: &Item, transcript: &TranscriptResult) -> Result<Summary> {
        let chunks: Vec<Chunk> = chunk_text(transcript.text(), &self.options.chunking)?.collect();
        info!("Summarizing {} chars in {} chunks", transcript.char_count(), chunks.len());

        let (partials, last_error) = self.map(&chunks, item, transcript).await;

        let survivors: Vec<PartialSummary> = partials.into_iter().flatten().collect();
        if survivors.is_empty() {
            return Err(YtsumError::PartialReduce(
                chunks.len(),
                last_error
                    .map(|e| e.to_string())
                    .unwrap_or_else(|| "transcript produced no chunks".to_string()),
            ));
        }
        if survivors.len() < chunks.len() {
            warn!(
                "Reducing with {}/{} partial summaries",
                survivors.len(),
                chunks.len()
            );
        }

        self.reduce(&survivors, item, transcript).await
    }

    /// Run the map step for every chunk.
    ///
    /// The result is aligned to chunk index: `None` marks a chunk whose call
    /// failed after retries. The last such error is returned alongside.
    pub async fn map(
        &self,
        chunks: &[Chunk],
        item: &Item,
        transcript: &TranscriptResult,
    ) -> (Vec<Option<PartialSummary>>, Option<YtsumError>) {
        let total = chunks.len();

        let mut results: Vec<(usize, Result<PartialSummary>)> = stream::iter(chunks)
            .map(|chunk| async move {
                (chunk.index, self.map_chunk(chunk, total, item, transcript).await)
            })
            .buffer_unordered(self.options.map_concurrency.max(1))
            .collect()
            .await;
        results.sort_by_key(|(index, _)| *index);

        let mut last_error = None;
        let partials = results
            .into_iter()
            .map(|(index, result)| match result {
                Ok(partial) => Some(partial),
                Err(e) => {
                    warn!("Map call for chunk {} failed: {}", index + 1, e);
                    last_error = Some(e);
                    None
                }
            })
            .collect();

        (partials, last_error)
    }

    /// Extract a partial summary from one chunk.
    pub async fn map_chunk(
        &self,
        chunk: &Chunk,
        total: usize,
        item: &Item,
        transcript: &TranscriptResult,
    ) -> Result<PartialSummary> {
        let mut vars = self.item_vars(item, transcript);
        vars.insert("index".to_string(), (chunk.index + 1).to_string());
        vars.insert("total".to_string(), total.to_string());
        vars.insert(
            "start".to_string(),
            format_timestamp(transcript.timestamp_at_char(chunk.char_start)),
        );
        vars.insert(
            "end".to_string(),
            format_timestamp(transcript.timestamp_at_char(chunk.char_end.saturating_sub(1))),
        );
        vars.insert("chunk".to_string(), chunk.text.clone());

        let request = CompletionRequest {
            system: self.prompts.map.system.clone(),
            prompt: self.prompts.render_with_custom(&self.prompts.map.user, &vars),
            max_tokens: self.options.map_max_tokens,
            json: true,
        };

        let response = self
            .retry
            .run_throttled(&self.limiter, "map call", || self.model.complete(&request))
            .await?;
        debug!("Chunk {}/{} mapped", chunk.index + 1, total);

        PartialSummary::from_response(&response)
    }

    /// Merge ordered partial summaries into the final summary.
    pub async fn reduce(
        &self,
        partials: &[PartialSummary],
        item: &Item,
        transcript: &TranscriptResult,
    ) -> Result<Summary> {
        let combined = partials
            .iter()
            .enumerate()
            .map(|(i, p)| p.render(&format!("Part {}", i + 1)))
            .collect::<Vec<_>>()
            .join("\n");

        let mut vars = self.item_vars(item, transcript);
        vars.insert("partials".to_string(), combined);

        let request = CompletionRequest {
            system: self.prompts.reduce.system.clone(),
            prompt: self.prompts.render_with_custom(&self.prompts.reduce.user, &vars),
            max_tokens: self.options.reduce_max_tokens,
            json: true,
        };

        let response = self
            .retry
            .run_throttled(&self.limiter, "reduce call", || self.model.complete(&request))
            .await?;
        let output = ReduceOutput::from_response(&response)?;

        let mut highlights = output.highlights;
        highlights.truncate(MAX_HIGHLIGHTS);

        Ok(Summary {
            video_id: item.id.clone(),
            title: item.title.clone(),
            url: item.canonical_url.clone(),
            published_at: item.published_at,
            language: transcript.language_label(),
            summary: output.summary.trim().to_string(),
            highlights,
            new_insights: output.new_insights,
            notable_quotes: output.notable_quotes,
            tokens_estimate: tokens_estimate(transcript.char_count(), &transcript.language),
        })
    }

    fn item_vars(&self, item: &Item, transcript: &TranscriptResult) -> HashMap<String, String> {
        let title = if item.title.is_empty() {
            item.id.clone()
        } else {
            item.title.clone()
        };
        HashMap::from([
            ("title".to_string(), title),
            ("video_id".to_string(), item.id.clone()),
            ("url".to_string(), item.canonical_url.clone()),
            ("language".to_string(), transcript.language_label()),
            (
                "output_language".to_string(),
                self.options.output_language.clone(),
            ),
        ])
    }
}
