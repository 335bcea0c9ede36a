//! Application configuration.
//!
//! Values are resolved in this order, later sources winning:
//! 1. Built-in defaults.
//! 2. `config.toml` in the data directory.
//! 3. Environment variables (a `.env` file is honoured):
//!    - `TIMESHEET_API_URL`: REST API base URL
//!    - `TIMESHEET_API_KEY`: static API key sent as `x-api-key`
//!    - `TIMESHEET_REMOTE_URL`: hosted backend project URL
//!    - `TIMESHEET_REMOTE_KEY`: hosted backend anonymous key
//!    - `TIMESHEET_HOME`: data directory override

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::errors::{Error, Result};

pub const DEFAULT_API_URL: &str = "http://localhost:3536/timesheet/api";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub api_base_url: String,
    pub api_key: Option<String>,
    pub remote_url: Option<String>,
    pub remote_key: Option<String>,
    pub data_dir: PathBuf,
}

/// Shape of `config.toml`. Every key is optional.
#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    api_url: Option<String>,
    api_key: Option<String>,
    remote_url: Option<String>,
    remote_key: Option<String>,
}

impl AppConfig {
    /// Loads `.env`, the config file and the environment.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();
        let data_dir = data_dir();
        let file = load_file(&data_dir.join("config.toml"))?;
        Ok(Self::resolve(data_dir, file, |k| std::env::var(k).ok()))
    }

    fn resolve<F>(data_dir: PathBuf, file: FileConfig, env: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let pick = |key: &str, file_value: Option<String>| {
            env(key).filter(|v| !v.trim().is_empty()).or(file_value)
        };
        Self {
            api_base_url: pick("TIMESHEET_API_URL", file.api_url)
                .unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            api_key: pick("TIMESHEET_API_KEY", file.api_key),
            remote_url: pick("TIMESHEET_REMOTE_URL", file.remote_url),
            remote_key: pick("TIMESHEET_REMOTE_KEY", file.remote_key),
            data_dir,
        }
    }

    /// The API key, or a configuration error naming the variable to set.
    pub fn require_api_key(&self) -> Result<&str> {
        self.api_key
            .as_deref()
            .ok_or_else(|| Error::Config("TIMESHEET_API_KEY is not set".to_string()))
    }

    pub fn require_remote(&self) -> Result<(&str, &str)> {
        match (self.remote_url.as_deref(), self.remote_key.as_deref()) {
            (Some(url), Some(key)) => Ok((url, key)),
            _ => Err(Error::Config(
                "TIMESHEET_REMOTE_URL and TIMESHEET_REMOTE_KEY must both be set".to_string(),
            )),
        }
    }
}

/// Returns the data directory.
///
/// 1. `TIMESHEET_HOME` environment variable.
/// 2. `~/.local/share/timesheet` (on Linux).
/// 3. `./.timesheet` (fallback).
pub fn data_dir() -> PathBuf {
    std::env::var("TIMESHEET_HOME").map(PathBuf::from).unwrap_or_else(|_| {
        let mut p = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
        p.push("timesheet");
        p
    })
}

fn load_file(path: &Path) -> Result<FileConfig> {
    if !path.exists() {
        return Ok(FileConfig::default());
    }
    let raw = fs::read_to_string(path)?;
    let parsed: FileConfig = toml::from_str(&raw)?;
    tracing::debug!(path = %path.display(), "Loaded config file");
    Ok(parsed)
}
