//! ytsum CLI entry point.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};
use ytsum::cli::{commands, Cli, Commands};
use ytsum::config::Settings;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let settings = match &cli.config {
        Some(path) => Settings::load_from(Some(&PathBuf::from(path)))?,
        None => Settings::load()?,
    };

    // Initialize logging
    let console_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let console_filter = EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| format!("ytsum={}", console_level)),
    );

    let file_layer = match &cli.log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("cannot open log file {}", path.display()))?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file))
                    .with_filter(EnvFilter::new(format!("ytsum={}", settings.general.log_level))),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr)
                .with_filter(console_filter),
        )
        .with(file_layer)
        .init();

    // Execute command
    match &cli.command {
        Commands::Run(args) => {
            commands::run_run(args, settings).await?;
        }

        Commands::Status { outdir, status } => {
            commands::run_status(outdir.as_deref(), status.as_deref(), settings).await?;
        }

        Commands::Show { video, outdir, json } => {
            commands::run_show(video, outdir.as_deref(), *json, settings)?;
        }

        Commands::Doctor => {
            commands::run_doctor(cli.config.as_deref(), &settings)?;
        }

        Commands::Config { action } => {
            commands::run_config(action, cli.config.as_deref(), settings)?;
        }
    }

    Ok(())
}
