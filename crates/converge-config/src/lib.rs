//! Settings discovery and loading for Converge

pub mod error;
pub mod settings;

pub use error::*;
pub use settings::{OperationOverride, RetrySettings, Settings};

use std::path::PathBuf;

const CONFIG_ENV: &str = "CONVERGE_CONFIG_PATH";
const CANDIDATES: [&str; 2] = ["converge.local.yaml", "converge.yaml"];

/// Per-user config directory (~/.config/converge)
pub fn get_config_dir() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|dir| dir.join("converge"))
        .ok_or(ConfigError::ConfigDirNotFound)
}

/// Locate the settings file.
///
/// Search order:
/// 1. `CONVERGE_CONFIG_PATH` (direct path)
/// 2. current directory: converge.local.yaml, converge.yaml
/// 3. ~/.config/converge/converge.yaml
pub fn find_settings_file() -> Result<PathBuf> {
    if let Ok(config_path) = std::env::var(CONFIG_ENV) {
        let path = PathBuf::from(config_path);
        if path.exists() {
            return Ok(path);
        }
        tracing::warn!("{} points to a missing file: {}", CONFIG_ENV, path.display());
    }

    let current_dir = std::env::current_dir()?;
    for filename in &CANDIDATES {
        let path = current_dir.join(filename);
        if path.exists() {
            return Ok(path);
        }
    }

    if let Ok(config_dir) = get_config_dir() {
        let global = config_dir.join("converge.yaml");
        if global.exists() {
            return Ok(global);
        }
    }

    Err(ConfigError::SettingsFileNotFound)
}

/// Load settings from the first file found, or defaults if there is none
pub fn load_settings() -> Result<Settings> {
    match find_settings_file() {
        Ok(path) => {
            tracing::debug!("Loading settings from {}", path.display());
            Settings::from_path(&path)
        }
        Err(ConfigError::SettingsFileNotFound) => {
            tracing::debug!("No settings file found, using defaults");
            Ok(Settings::default())
        }
        Err(e) => Err(e),
    }
}
