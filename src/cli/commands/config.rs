//! Config command implementation.

use crate::cli::{ConfigAction, Output};
use crate::config::Settings;
use anyhow::Result;
use std::path::PathBuf;

/// Run the config command.
pub fn run_config(action: &ConfigAction, config_path: Option<&str>, settings: Settings) -> Result<()> {
    let path = config_path
        .map(Settings::expand_path)
        .unwrap_or_else(Settings::default_config_path);

    match action {
        ConfigAction::Show => {
            let toml_str = toml::to_string_pretty(&settings)
                .map_err(|e| anyhow::anyhow!("Failed to serialize config: {}", e))?;
            println!("{}", toml_str);
        }

        ConfigAction::Path => {
            println!("{}", path.display());
        }

        ConfigAction::Init { force } => init_config(&path, *force, &settings)?,
    }

    Ok(())
}

fn init_config(path: &PathBuf, force: bool, settings: &Settings) -> Result<()> {
    if path.exists() && !force {
        Output::warning(&format!(
            "{} already exists. Use --force to overwrite it.",
            path.display()
        ));
        return Ok(());
    }
    settings.save_to(path)?;
    Output::success(&format!("Wrote {}", path.display()));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_writes_loadable_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        init_config(&path, false, &Settings::default()).unwrap();
        let loaded = Settings::load_from(Some(&path)).unwrap();
        assert_eq!(loaded.general.output_dir, Settings::default().general.output_dir);
    }

    #[test]
    fn test_init_keeps_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[run]\nmax_items = 3\n").unwrap();

        init_config(&path, false, &Settings::default()).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "[run]\nmax_items = 3\n");
    }
}
