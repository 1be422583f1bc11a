//! Persisted warden configuration.
//!
//! A single JSON record, `{meta: {version}, data_path}`, stored in the
//! per-user config directory. The `data_path` is the root under which every
//! server gets its own data directory.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Version of the configuration record format. A mismatch is fatal at load.
pub const CONFIG_VERSION: i64 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigMeta {
    pub version: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub meta: ConfigMeta,
    pub data_path: PathBuf,
}

impl AppConfig {
    /// Per-user configuration directory (`<config dir>/warden`).
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("warden")
    }

    /// Default location of the configuration record.
    pub fn default_path() -> PathBuf {
        Self::config_dir().join("config.json")
    }

    /// Default location of the image catalog directory.
    pub fn image_dir() -> PathBuf {
        Self::config_dir().join("images")
    }

    /// Load the configuration record from the default location.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::default_path())
    }

    /// Load the configuration record from an explicit path.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(Error::NoConfiguration);
        }

        let content = std::fs::read_to_string(path).map_err(|e| Error::Read {
            path: path.display().to_string(),
            source: e,
        })?;

        let config: AppConfig = serde_json::from_str(&content).map_err(|e| Error::Parse {
            file: path.display().to_string(),
            reason: e.to_string(),
        })?;

        if config.meta.version != CONFIG_VERSION {
            return Err(Error::ConfigVersionMismatch {
                found: config.meta.version,
                expected: CONFIG_VERSION,
            });
        }

        Ok(config)
    }

    /// Write a fresh configuration record, creating the data path.
    pub fn write(path: &Path, data_path: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&data_path)
            .map_err(|e| Error::Write(format!("could not create data path: {}", e)))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::Write(format!("could not create config directory: {}", e)))?;
        }

        let config = AppConfig {
            meta: ConfigMeta {
                version: CONFIG_VERSION,
            },
            data_path,
        };
        std::fs::write(path, serde_json::to_string_pretty(&config)?)
            .map_err(|e| Error::Write(format!("could not write config: {}", e)))?;
        Ok(config)
    }
}
