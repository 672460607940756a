// Configuration loader
// Loads settings from an explicit path or ~/.palisade/config.toml

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use super::settings::Settings;

/// Load settings.
///
/// An explicit path must exist and parse. Without one, the default path is
/// tried; a missing file is not an error, the host just gets an empty
/// server map.
pub fn load_settings(path: Option<&Path>) -> Result<Settings> {
    if let Some(path) = path {
        return read_settings(path);
    }

    let default_path = default_config_path()?;
    if !default_path.exists() {
        tracing::debug!(
            "No config file at {}, using defaults",
            default_path.display()
        );
        return Ok(Settings::default());
    }
    read_settings(&default_path)
}

fn read_settings(path: &Path) -> Result<Settings> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    toml::from_str(&contents).with_context(|| format!("Failed to parse {}", path.display()))
}

fn default_config_path() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home.join(".palisade/config.toml"))
}
