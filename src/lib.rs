//! ytsum - Resumable batch summarizer for YouTube transcripts
//!
//! Turns a channel, playlist, or list of videos into one structured summary
//! per video. Every video ends in a durable ledger row, so an interrupted or
//! repeated run only does the work that is still missing.
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - `config` - Configuration management and prompt templates
//! - `source` - Item resolution (channel, playlist, id file)
//! - `transcript` - Transcript acquisition over watch-page and yt-dlp transports
//! - `chunking` - Overlapping fixed-size chunking
//! - `summarize` - Map-reduce summarization over a language model
//! - `ratelimit` / `retry` - Throttling and backoff for external calls
//! - `ledger` - Per-item processing state
//! - `artifacts` - Transcript and summary files
//! - `orchestrator` - Pipeline coordination
//!
//! # Example
//!
//! ```rust,no_run
//! use ytsum::config::Settings;
//! use ytsum::orchestrator::Orchestrator;
//! use ytsum::source::Item;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     let orchestrator = Orchestrator::new(&settings)?;
//!
//!     let items = vec![Item::from_id("dQw4w9WgXcQ")];
//!     let report = orchestrator
//!         .run(&items, false, CancellationToken::new(), |_| {})
//!         .await?;
//!     println!("{} summarized", report.summarized);
//!
//!     Ok(())
//! }
//! ```

pub mod artifacts;
pub mod chunking;
pub mod cli;
pub mod config;
pub mod error;
pub mod ledger;
pub mod openai;
pub mod orchestrator;
pub mod ratelimit;
pub mod retry;
pub mod source;
pub mod summarize;
pub mod transcript;

pub use error::{Result, YtsumError};
