//! Configuration loaded from a TOML file, with serde defaults throughout so
//! a missing or partial file always yields a usable `Config`.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use crate::store::{FileStore, DEFAULT_SYNC_INTERVAL_DAYS};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub sync: SyncConfig,

    #[serde(default)]
    pub llm: LlmConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory for the file-backed store (default: platform data dir)
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Days between syncs recorded via `sync mark`
    #[serde(default = "default_interval_days")]
    pub interval_days: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_model")]
    pub model: String,

    /// Primary local runtime base URL (OpenAI-compatible)
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Tried in order after the primary endpoint fails
    #[serde(default = "default_fallback_endpoints")]
    pub fallback_endpoints: Vec<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            interval_days: default_interval_days(),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            endpoint: default_endpoint(),
            fallback_endpoints: default_fallback_endpoints(),
        }
    }
}

fn default_data_dir() -> String {
    FileStore::default_dir().display().to_string()
}

fn default_interval_days() -> i64 {
    DEFAULT_SYNC_INTERVAL_DAYS
}

fn default_model() -> String {
    "gemma3".to_string()
}

fn default_endpoint() -> String {
    "http://localhost:11434/v1".to_string()
}

fn default_fallback_endpoints() -> Vec<String> {
    vec![
        "http://localhost:11435/v1".to_string(),
        "http://127.0.0.1:11434/v1".to_string(),
    ]
}

impl Config {
    /// Load from `path`, or from the default config path when `None`. A
    /// missing file yields the defaults.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let path = match path {
            Some(p) => PathBuf::from(p),
            None => Self::default_path(),
        };

        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config = toml::from_str(&content)
            .with_context(|| format!("failed to parse config {}", path.display()))?;
        Ok(config)
    }

    pub fn default_path() -> PathBuf {
        directories::ProjectDirs::from("app", "SharedLM", "sharedlm-local")
            .map(|dirs| dirs.config_dir().join("config.toml"))
            .unwrap_or_else(|| PathBuf::from(".sharedlm-local").join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.llm.model, "gemma3");
        assert_eq!(config.llm.endpoint, "http://localhost:11434/v1");
        assert_eq!(config.llm.fallback_endpoints.len(), 2);
        assert_eq!(config.sync.interval_days, 10);
        assert!(!config.storage.data_dir.is_empty());
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let config = Config::load(Some("/nonexistent/config.toml")).unwrap();
        assert_eq!(config.llm.model, "gemma3");
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[llm]\nmodel = \"llama3\"\nfallback_endpoints = [\"http://127.0.0.1:11500/v1\"]"
        )
        .unwrap();

        let config = Config::load(file.path().to_str()).unwrap();
        assert_eq!(config.llm.model, "llama3");
        assert_eq!(
            config.llm.fallback_endpoints,
            vec!["http://127.0.0.1:11500/v1".to_string()]
        );
        // Untouched sections keep their defaults
        assert_eq!(config.llm.endpoint, "http://localhost:11434/v1");
        assert_eq!(config.sync.interval_days, 10);
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "not = [valid").unwrap();
        assert!(Config::load(file.path().to_str()).is_err());
    }
}
