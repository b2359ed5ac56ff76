use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};
use crate::models::AppConfig;

const CONFIG_FILE: &str = "config.json";
const CONFIG_ENV: &str = "FCORS_CONFIG";

/// Get the data directory (`~/.fcors`), creating it if needed
pub fn get_data_dir() -> AppResult<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| AppError::Config("Failed to get Home directory".to_string()))?;
    let data_dir = home.join(".fcors");

    if !data_dir.exists() {
        fs::create_dir_all(&data_dir)?;
    }

    Ok(data_dir)
}

/// Config file location: `$FCORS_CONFIG`, else `<data dir>/config.json`
pub fn get_config_path() -> AppResult<PathBuf> {
    match std::env::var_os(CONFIG_ENV) {
        Some(path) if !path.is_empty() => Ok(PathBuf::from(path)),
        _ => Ok(get_data_dir()?.join(CONFIG_FILE)),
    }
}

/// Load application config; a missing file yields defaults
pub fn load_app_config_from(config_path: &Path) -> AppResult<AppConfig> {
    if !config_path.exists() {
        return Ok(AppConfig::new());
    }

    let content = fs::read_to_string(config_path)?;

    serde_json::from_str(&content).map_err(|e| {
        AppError::Config(format!(
            "Failed to parse config file {}: {}",
            config_path.display(),
            e
        ))
    })
}

/// Save application config
pub fn save_app_config_to(config: &AppConfig, config_path: &Path) -> AppResult<()> {
    if let Some(parent) = config_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)?;
        }
    }

    let content = serde_json::to_string_pretty(config)
        .map_err(|e| AppError::Config(format!("Failed to serialize config: {}", e)))?;

    fs::write(config_path, content)?;
    Ok(())
}
