//! Persisted user settings.
//!
//! Settings live in `<config_dir>/clipmark/settings.json` unless a path is
//! given explicitly. A missing default file means defaults; a missing
//! explicit file is an error.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use clipmark_core::ConversionSettings;
use tracing::debug;

const APP_DIR: &str = "clipmark";
const SETTINGS_FILE: &str = "settings.json";

/// Location of the settings file when `--settings` is not given.
pub fn default_settings_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_DIR).join(SETTINGS_FILE))
}

/// Loads settings from `explicit`, or from the default location.
pub fn load(explicit: Option<&Path>) -> anyhow::Result<ConversionSettings> {
    let path = match explicit {
        Some(path) if !path.exists() => bail!("Settings file not found: {}", path.display()),
        Some(path) => path.to_path_buf(),
        None => match default_settings_path() {
            Some(path) if path.exists() => path,
            _ => {
                debug!("no settings file, using defaults");
                return Ok(ConversionSettings::default());
            }
        },
    };

    let raw = fs::read_to_string(&path).with_context(|| format!("Failed to read settings: {}", path.display()))?;
    let settings =
        serde_json::from_str(&raw).with_context(|| format!("Invalid settings file: {}", path.display()))?;
    debug!(path = %path.display(), "loaded settings");
    Ok(settings)
}

/// Writes `settings` as pretty JSON, creating parent directories.
pub fn save(path: &Path, settings: &ConversionSettings) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(settings)?;
    fs::write(path, json).with_context(|| format!("Failed to write settings: {}", path.display()))
}
