//! CLI module for ytsum.

pub mod commands;
mod output;
pub mod preflight;

pub use output::Output;

use crate::config::{Provider, SettingsOverrides};
use crate::source::SourceSpec;
use clap::{ArgGroup, Args, Parser, Subcommand};
use std::path::PathBuf;

/// ytsum - Resumable batch summarizer for YouTube transcripts
///
/// Fetches transcripts for a channel, playlist, or list of videos, summarizes
/// each one with a language model, and remembers what is already done.
#[derive(Parser, Debug)]
#[command(name = "ytsum")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true, env = "YTSUM_CONFIG")]
    pub config: Option<String>,

    /// Also write logs to this file
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fetch transcripts and summarize every new video from a source
    Run(RunArgs),

    /// Show the ledger: per-video status and totals
    Status {
        /// Output directory holding the ledger
        #[arg(long)]
        outdir: Option<String>,

        /// Only show rows with this status (summarized, transcript_unavailable, failed, pending)
        #[arg(long)]
        status: Option<String>,
    },

    /// Print the Markdown summary of a video
    Show {
        /// Video ID or URL
        video: String,

        /// Output directory holding the summaries
        #[arg(long)]
        outdir: Option<String>,

        /// Print the JSON summary instead of Markdown
        #[arg(long)]
        json: bool,
    },

    /// Check system requirements and configuration
    Doctor,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Arguments of `ytsum run`.
#[derive(Args, Debug, Default)]
#[command(group(
    ArgGroup::new("source")
        .required(true)
        .args(["channel_id", "playlist_id", "url", "video_ids_file"]),
))]
pub struct RunArgs {
    /// YouTube channel ID (UC...)
    #[arg(long)]
    pub channel_id: Option<String>,

    /// YouTube playlist ID (PL...)
    #[arg(long)]
    pub playlist_id: Option<String>,

    /// Channel, playlist, or video URL
    #[arg(long)]
    pub url: Option<String>,

    /// Text file with one video ID or URL per line
    #[arg(long)]
    pub video_ids_file: Option<PathBuf>,

    /// Maximum number of videos to take from the source
    #[arg(long)]
    pub max_items: Option<usize>,

    /// Reprocess videos that are already complete
    #[arg(short, long)]
    pub force: bool,

    /// List what would be processed without fetching anything
    #[arg(long)]
    pub dry_run: bool,

    /// Preferred transcript languages, in order (comma-separated)
    #[arg(long, value_delimiter = ',')]
    pub languages: Option<Vec<String>>,

    /// Try yt-dlp before the watch page
    #[arg(long)]
    pub use_ytdlp: bool,

    /// Proxy URL for transcript requests
    #[arg(long, env = "YTSUM_PROXY")]
    pub proxy: Option<String>,

    /// Netscape cookies file passed to yt-dlp
    #[arg(long)]
    pub cookies_file: Option<String>,

    /// Remove bracketed annotations such as [Music] from captions
    #[arg(long)]
    pub clean_tags: bool,

    /// Language-model provider (anthropic, openai)
    #[arg(long)]
    pub provider: Option<Provider>,

    /// Model name
    #[arg(short, long)]
    pub model: Option<String>,

    /// Characters per transcript chunk
    #[arg(long)]
    pub chunk_chars: Option<usize>,

    /// Characters shared by consecutive chunks
    #[arg(long)]
    pub chunk_overlap: Option<usize>,

    /// Token limit of the final summary call
    #[arg(long)]
    pub reduce_max_tokens: Option<u32>,

    /// Calls per second for both transcript and model requests
    #[arg(long)]
    pub rps: Option<f64>,

    /// Videos processed at the same time
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Output directory
    #[arg(short, long)]
    pub outdir: Option<String>,
}

impl RunArgs {
    /// The source selected on the command line.
    pub fn source(&self) -> Option<SourceSpec> {
        if let Some(id) = &self.channel_id {
            Some(SourceSpec::Channel(id.clone()))
        } else if let Some(id) = &self.playlist_id {
            Some(SourceSpec::Playlist(id.clone()))
        } else if let Some(url) = &self.url {
            Some(SourceSpec::Url(url.clone()))
        } else {
            self.video_ids_file.clone().map(SourceSpec::File)
        }
    }

    pub fn overrides(&self) -> SettingsOverrides {
        SettingsOverrides {
            output_dir: self.outdir.clone(),
            languages: self.languages.clone(),
            use_ytdlp: self.use_ytdlp,
            proxy: self.proxy.clone(),
            cookies_file: self.cookies_file.clone(),
            clean_tags: self.clean_tags,
            provider: self.provider,
            model: self.model.clone(),
            chunk_chars: self.chunk_chars,
            chunk_overlap: self.chunk_overlap,
            reduce_max_tokens: self.reduce_max_tokens,
            rps: self.rps,
            max_items: self.max_items,
            concurrency: self.concurrency,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,

    /// Write the current configuration to the config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}
