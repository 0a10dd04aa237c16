//! Configuration loading for the block runtime

use crate::error::{BlocksError, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Main configuration structure
#[derive(Clone, Debug, Default, Deserialize)]
pub struct BlocksConfig {
    #[serde(default)]
    pub connection: ConnectionConfig,
    #[serde(default)]
    pub session: SessionConfig,
}

/// Bridge connection settings
#[derive(Clone, Debug, Deserialize)]
pub struct ConnectionConfig {
    /// Bridge WebSocket URL (default: ws://127.0.0.1:8081)
    #[serde(default = "default_url")]
    pub url: String,

    /// Pause between reconnect attempts in milliseconds (default: 1000)
    #[serde(default = "default_reconnect_delay")]
    pub reconnect_delay_ms: u64,

    /// Socket read timeout in milliseconds (default: 20)
    #[serde(default = "default_read_timeout")]
    pub read_timeout_ms: u64,
}

/// Command path settings
#[derive(Clone, Debug, Deserialize)]
pub struct SessionConfig {
    /// Minimum spacing between two transmitted frames (default: 5)
    #[serde(default = "default_min_send_interval")]
    pub min_send_interval_ms: u64,
}

// Default value functions
fn default_url() -> String {
    "ws://127.0.0.1:8081".to_string()
}
fn default_reconnect_delay() -> u64 {
    1000
}
fn default_read_timeout() -> u64 {
    20
}
fn default_min_send_interval() -> u64 {
    5
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            reconnect_delay_ms: default_reconnect_delay(),
            read_timeout_ms: default_read_timeout(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            min_send_interval_ms: default_min_send_interval(),
        }
    }
}

impl ConnectionConfig {
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}

impl SessionConfig {
    pub fn min_send_interval(&self) -> Duration {
        Duration::from_millis(self.min_send_interval_ms)
    }
}

impl BlocksConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| BlocksError::Config(format!("Failed to read config file: {}", e)))?;
        let config: BlocksConfig = toml::from_str(&content)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = BlocksConfig::default();
        assert_eq!(config.connection.url, "ws://127.0.0.1:8081");
        assert_eq!(config.connection.reconnect_delay(), Duration::from_secs(1));
        assert_eq!(config.session.min_send_interval(), Duration::from_millis(5));
    }

    #[test]
    fn test_load_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blocks.toml");
        std::fs::write(&path, "[connection]\nurl = \"ws://10.0.0.2:8081\"\n").unwrap();

        let config = BlocksConfig::load(&path).unwrap();
        assert_eq!(config.connection.url, "ws://10.0.0.2:8081");
        assert_eq!(config.connection.read_timeout_ms, 20);
        assert_eq!(config.session.min_send_interval_ms, 5);
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let err = BlocksConfig::load(Path::new("/nonexistent/blocks.toml")).unwrap_err();
        assert!(matches!(err, BlocksError::Config(_)));
    }
}
