//! Configuration loading for Shipyard.
//!
//! Reads `config.toml` from the data directory (`~/.shipyard/` in
//! production) into [`ShipyardConfig`]. Missing or malformed files fall
//! back to defaults.

use std::path::{Path, PathBuf};

use shipyard_types::config::ShipyardConfig;

/// Environment variable overriding the data directory.
pub const DATA_DIR_ENV: &str = "SHIPYARD_DATA_DIR";

/// Resolve the data directory.
///
/// Priority:
/// 1. `SHIPYARD_DATA_DIR` environment variable
/// 2. `~/.shipyard`
pub fn resolve_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
        return PathBuf::from(dir);
    }

    if let Some(home) = dirs::home_dir() {
        return home.join(".shipyard");
    }

    // Last resort: current directory
    PathBuf::from(".shipyard")
}

/// Load configuration from `{data_dir}/config.toml`.
///
/// - Missing file: defaults.
/// - Unreadable or unparseable file: a warning and defaults.
pub async fn load_config(data_dir: &Path) -> ShipyardConfig {
    let config_path = data_dir.join("config.toml");

    let content = match tokio::fs::read_to_string(&config_path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config.toml found at {}, using defaults", config_path.display());
            return ShipyardConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", config_path.display());
            return ShipyardConfig::default();
        }
    };

    match toml::from_str::<ShipyardConfig>(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!(
                "Failed to parse {}: {err}, using defaults",
                config_path.display()
            );
            ShipyardConfig::default()
        }
    }
}
