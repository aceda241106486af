//! Tool configuration management.

use crate::error::{Result, StackError};
use crate::paths;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Persistent configuration for the cartstack tool itself.
///
/// This is distinct from [`crate::StackSettings`], which holds the values a
/// stack is declared from.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub docker_binary: String,
    pub command_timeout_secs: u64,
    pub log_level: String,
    pub data_dir: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            docker_binary: "docker".to_string(),
            command_timeout_secs: 600,
            log_level: "info".to_string(),
            data_dir: paths::data_dir().to_string_lossy().to_string(),
        }
    }
}

impl Config {
    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        paths::config_path()
    }

    /// Load configuration from disk.
    pub fn load() -> Result<Self> {
        Self::load_from(Self::config_path())
    }

    /// Load configuration from an explicit path; a missing file yields defaults.
    pub fn load_from(path: PathBuf) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(&path)
            .map_err(|e| StackError::ConfigRead { path: path.clone(), reason: e.to_string() })?;
        serde_json::from_str(&content)
            .map_err(|e| StackError::ConfigRead { path, reason: format!("Failed to parse: {}", e) })
    }

    /// Save configuration to disk.
    pub fn save(&self) -> Result<()> {
        self.save_to(Self::config_path())
    }

    /// Save configuration to an explicit path, creating its directory.
    pub fn save_to(&self, path: PathBuf) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| StackError::IoError { path: parent.to_path_buf(), source: e })?;
        }
        let content = serde_json::to_string_pretty(self).map_err(StackError::internal)?;
        std::fs::write(&path, content).map_err(|e| StackError::IoError { path, source: e })
    }

    /// State database location under the configured data directory.
    pub fn db_path(&self) -> PathBuf {
        PathBuf::from(&self.data_dir).join("state.db")
    }

    /// Timeout applied to each container-runtime command.
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(dir.path().join("config.json")).unwrap();
        assert_eq!(config.docker_binary, "docker");
        assert_eq!(config.command_timeout(), Duration::from_secs(600));
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"docker_binary": "podman", "data_dir": "/srv/cartstack"}"#)
            .unwrap();

        let config = Config::load_from(path).unwrap();
        assert_eq!(config.docker_binary, "podman");
        assert_eq!(config.log_level, "info");
        assert_eq!(config.db_path(), PathBuf::from("/srv/cartstack/state.db"));
    }

    #[test]
    fn test_saved_file_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let config = Config { docker_binary: "podman".to_string(), ..Config::default() };

        config.save_to(path.clone()).unwrap();

        let loaded = Config::load_from(path).unwrap();
        assert_eq!(loaded.docker_binary, "podman");
        assert_eq!(loaded.command_timeout_secs, config.command_timeout_secs);
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(Config::load_from(path), Err(StackError::ConfigRead { .. })));
    }
}
