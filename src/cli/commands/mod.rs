//! CLI command implementations.

mod config;
mod doctor;
mod run;
mod show;
mod status;

pub use config::run_config;
pub use doctor::run_doctor;
pub use run::run_run;
pub use show::run_show;
pub use status::run_status;

use crate::config::Settings;
use crate::ledger::SqliteLedger;

/// Open the ledger of the configured output directory without creating it.
fn open_ledger(settings: &Settings) -> crate::Result<Option<SqliteLedger>> {
    let path = settings.output_dir().join("ledger.db");
    if !path.exists() {
        return Ok(None);
    }
    SqliteLedger::new(&path).map(Some)
}

/// Point the settings at `outdir` when one was given.
fn with_outdir(mut settings: Settings, outdir: Option<&str>) -> Settings {
    if let Some(dir) = outdir {
        settings.general.output_dir = dir.to_string();
    }
    settings
}
