//! Map-reduce summarization.
//!
//! Each transcript chunk is condensed into a [`PartialSummary`] by one model
//! call (map); the ordered partials are then merged into the final
//! [`Summary`] by one more call (reduce).

mod mapreduce;
mod model;
mod types;

pub use mapreduce::{MapReduceSummarizer, SummarizerOptions};
pub use model::{AnthropicModel, CompletionRequest, LanguageModel, OpenAiModel};
pub use types::{
    extract_json_object, tokens_estimate, NotableQuote, PartialSummary, ReduceOutput, Summary,
    MAX_HIGHLIGHTS,
};

use crate::config::{Provider, SummarySettings};
use crate::error::Result;
use std::sync::Arc;
use std::time::Duration;

/// Build the language model selected in the settings.
pub fn create_model(settings: &SummarySettings) -> Result<Arc<dyn LanguageModel>> {
    let timeout = Duration::from_secs(settings.request_timeout_secs);
    let model = settings.effective_model();
    Ok(match settings.provider {
        Provider::OpenAi => Arc::new(OpenAiModel::new(&model, timeout)?),
        Provider::Anthropic => Arc::new(AnthropicModel::from_env(&model, timeout)?),
    })
}
