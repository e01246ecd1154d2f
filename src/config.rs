//! Settings file and application directories.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

const APP_DIR_NAME: &str = "NgiraInama";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not determine the {0} directory for this platform")]
    NoPlatformDir(&'static str),
    #[error("failed to create directory `{path}`: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write settings to `{path}`: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to encode settings: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct AppConfig {
    /// Overrides the platform data directory.
    pub data_dir: Option<PathBuf>,
    /// Simulated thinking time before the assistant replies.
    pub response_delay_ms: u64,
    pub currency: String,
    pub log: LogConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
    pub json: bool,
    pub file: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            response_delay_ms: 1500,
            currency: "Rwf".to_string(),
            log: LogConfig::default(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file: true,
        }
    }
}

impl AppConfig {
    /// Data directory from the settings, or the platform default.
    pub fn resolve_data_dir(&self) -> Result<PathBuf, ConfigError> {
        let dir = match &self.data_dir {
            Some(dir) => dir.clone(),
            None => dirs_next::data_dir()
                .ok_or(ConfigError::NoPlatformDir("data"))?
                .join(APP_DIR_NAME)
                .join("data"),
        };
        ensure_dir(&dir)?;
        Ok(dir)
    }
}

fn ensure_dir(dir: &Path) -> Result<(), ConfigError> {
    if !dir.exists() {
        fs::create_dir_all(dir).map_err(|source| ConfigError::CreateDir {
            path: dir.to_path_buf(),
            source,
        })?;
    }
    Ok(())
}

pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    let config_dir = dirs_next::config_dir()
        .ok_or(ConfigError::NoPlatformDir("config"))?
        .join(APP_DIR_NAME)
        .join("configuration");
    Ok(config_dir.join("settings.json"))
}

fn write_config(path: &Path, config: &AppConfig) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }
    let content = serde_json::to_string_pretty(config)?;
    fs::write(path, content).map_err(|source| ConfigError::Write {
        path: path.to_path_buf(),
        source,
    })
}

/// Reads the settings at `path`. A missing file is created with defaults;
/// an unreadable one is replaced by them.
pub fn load_or_initialize_config(path: &Path) -> Result<AppConfig, ConfigError> {
    if !path.exists() {
        let config = AppConfig::default();
        write_config(path, &config)?;
        return Ok(config);
    }

    let content = fs::read_to_string(path).unwrap_or_default();
    match serde_json::from_str(&content) {
        Ok(config) => Ok(config),
        Err(e) => {
            // Logging is not up yet at this point.
            eprintln!(
                "warning: settings at {} are invalid ({e}), using defaults",
                path.display()
            );
            let config = AppConfig::default();
            if let Err(e) = write_config(path, &config) {
                eprintln!("warning: failed to rewrite settings file: {e}");
            }
            Ok(config)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_path() -> PathBuf {
        std::env::temp_dir()
            .join(format!("ngira-inama-config-{}", uuid::Uuid::now_v7()))
            .join("settings.json")
    }

    #[test]
    fn missing_settings_are_created_with_defaults() {
        let path = scratch_path();
        let config = load_or_initialize_config(&path).unwrap();
        assert_eq!(config, AppConfig::default());
        assert!(path.exists());
        let written: AppConfig =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written, config);
        let _ = fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn partial_settings_fill_in_defaults() {
        let path = scratch_path();
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, r#"{"responseDelayMs": 0, "log": {"json": true}}"#).unwrap();
        let config = load_or_initialize_config(&path).unwrap();
        assert_eq!(config.response_delay_ms, 0);
        assert!(config.log.json);
        assert_eq!(config.log.level, "info");
        assert_eq!(config.currency, "Rwf");
        let _ = fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn broken_settings_fall_back_to_defaults() {
        let path = scratch_path();
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "responseDelayMs = 3").unwrap();
        assert_eq!(load_or_initialize_config(&path).unwrap(), AppConfig::default());
        let _ = fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn data_dir_override_is_created() {
        let dir = std::env::temp_dir().join(format!("ngira-inama-data-{}", uuid::Uuid::now_v7()));
        let config = AppConfig {
            data_dir: Some(dir.clone()),
            ..AppConfig::default()
        };
        assert_eq!(config.resolve_data_dir().unwrap(), dir);
        assert!(dir.is_dir());
        let _ = fs::remove_dir_all(dir);
    }
}
