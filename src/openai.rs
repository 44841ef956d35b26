//! OpenAI client configuration.

use crate::error::Result;
use async_openai::{config::OpenAIConfig, Client};
use std::time::Duration;

/// Create an OpenAI client with a custom timeout.
///
/// The key is read from `OPENAI_API_KEY` by `OpenAIConfig`. The client's own
/// retry loop is switched off; rate limiting and retries happen in the
/// summarizer so that every attempt goes through the shared limiter.
pub fn create_client_with_timeout(timeout: Duration) -> Result<Client<OpenAIConfig>> {
    let http_client = reqwest::Client::builder().timeout(timeout).build()?;

    Ok(Client::with_config(OpenAIConfig::default())
        .with_http_client(http_client)
        .with_backoff(no_backoff()))
}

/// A backoff whose elapsed-time budget is already spent, so the first
/// failure is returned immediately.
fn no_backoff() -> backoff::ExponentialBackoff {
    backoff::ExponentialBackoffBuilder::new()
        .with_max_elapsed_time(Some(Duration::ZERO))
        .build()
}
