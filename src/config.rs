use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::chat::CompareConfig;
use crate::scroll::ScrollConfig;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub sync: SyncConfig,
    pub compare: CompareConfig,
    pub scroll: ScrollConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub base_url: String,
    /// Bearer token sent with every request.
    pub token: Option<String>,
    pub timeout_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000/api/".to_string(),
            token: None,
            timeout_ms: 15_000,
        }
    }
}

/// Polling and paging parameters of a room session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub tail_interval_ms: u64,
    pub compare_interval_ms: u64,
    /// Messages requested when a room is first opened.
    pub first_page: u64,
    /// Messages requested per scroll-triggered page.
    pub page_size: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            tail_interval_ms: 4000,
            compare_interval_ms: 8000,
            first_page: 20,
            page_size: 10,
        }
    }
}

impl SyncConfig {
    pub fn tail_interval(&self) -> Duration {
        Duration::from_millis(self.tail_interval_ms.max(1))
    }

    pub fn compare_interval(&self) -> Duration {
        Duration::from_millis(self.compare_interval_ms.max(1))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// `tracing` filter directive, e.g. `chatsync=debug`.
    pub level: String,
    pub file: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

impl LogConfig {
    pub fn file_path(&self) -> PathBuf {
        self.file
            .clone()
            .unwrap_or_else(|| app_dir(dirs::cache_dir()).join("chatsync.log"))
    }
}

impl Config {
    /// Default location of the config file.
    pub fn default_path() -> PathBuf {
        app_dir(dirs::config_dir()).join("config.toml")
    }

    /// Load from `path`, or the default location. A missing file yields the
    /// defaults; a malformed one is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path.map(Path::to_path_buf).unwrap_or_else(Self::default_path);
        match std::fs::read_to_string(&path) {
            Ok(content) => Self::from_toml(&content)
                .with_context(|| format!("Invalid config file {}", path.display())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => {
                Err(e).with_context(|| format!("Failed to read config file {}", path.display()))
            }
        }
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }
}

fn app_dir(base: Option<PathBuf>) -> PathBuf {
    base.or_else(|| dirs::home_dir().map(|h| h.join(".config")))
        .unwrap_or_else(|| PathBuf::from("."))
        .join("chatsync")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let config = Config::from_toml(
            r#"
            [server]
            base_url = "https://chat.example.org/api/"

            [compare]
            sample_probability = 0.5

            [sync]
            tail_interval_ms = 1000
            "#,
        )
        .unwrap();
        assert_eq!(config.server.base_url, "https://chat.example.org/api/");
        assert_eq!(config.server.timeout_ms, 15_000);
        assert_eq!(config.compare.mandatory, 20);
        assert_eq!(config.compare.sample_probability, 0.5);
        assert_eq!(config.sync.tail_interval(), Duration::from_millis(1000));
        assert_eq!(config.sync.compare_interval_ms, 8000);
        assert_eq!(config.scroll, ScrollConfig::default());
    }

    #[test]
    fn missing_file_is_default() {
        let config = Config::load(Some(Path::new("/nonexistent/chatsync/config.toml"))).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn malformed_file_is_an_error() {
        assert!(Config::from_toml("[server\nbase_url = 1").is_err());
    }
}
