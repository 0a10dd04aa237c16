//! Configuration for the Setu bridge daemon
//!
//! Loads configuration from a TOML file. Every field has a default, so a
//! partial file (or no file at all) yields a working setup for the standard
//! kit firmware.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Baud rate used by the kit firmware, for both probing and the main link
pub const DEFAULT_BAUD_RATE: u32 = 250_000;

/// Literal the firmware prints once its serial port is ready
pub const DEFAULT_HANDSHAKE: &str = "ArduinoScratch";

/// Top-level bridge configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub serial: SerialConfig,
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub relay: RelayConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Serial link and discovery settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SerialConfig {
    /// Fixed port path; when set, discovery is skipped
    #[serde(default)]
    pub port: Option<String>,

    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    /// Token expected on a port that hosts the device
    #[serde(default = "default_handshake")]
    pub handshake: String,

    /// How long every probe listens for the handshake
    #[serde(default = "default_discovery_timeout_ms")]
    pub discovery_timeout_ms: u64,

    /// Serial read timeout; bounds how quickly reader threads notice shutdown
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,
}

/// WebSocket server settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NetworkConfig {
    /// Bind address for client connections
    ///
    /// Examples:
    /// - `0.0.0.0:8081` - all interfaces
    /// - `127.0.0.1:8081` - localhost only
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
}

/// Relay behavior between clients and the serial link
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RelayConfig {
    /// Write every client payload a second time after `repeat_delay_ms`
    #[serde(default = "default_repeat_writes")]
    pub repeat_writes: bool,

    #[serde(default = "default_repeat_delay_ms")]
    pub repeat_delay_ms: u64,

    /// Client payload answered with `pong_token` instead of being forwarded
    #[serde(default = "default_ping_token")]
    pub ping_token: String,

    #[serde(default = "default_pong_token")]
    pub pong_token: String,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error); `RUST_LOG` wins when set
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_baud_rate() -> u32 {
    DEFAULT_BAUD_RATE
}

fn default_handshake() -> String {
    DEFAULT_HANDSHAKE.to_string()
}

fn default_discovery_timeout_ms() -> u64 {
    2000
}

fn default_read_timeout_ms() -> u64 {
    50
}

fn default_bind_address() -> String {
    "0.0.0.0:8081".to_string()
}

fn default_repeat_writes() -> bool {
    true
}

fn default_repeat_delay_ms() -> u64 {
    10
}

fn default_ping_token() -> String {
    "__ping__".to_string()
}

fn default_pong_token() -> String {
    "__pong__".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: None,
            baud_rate: default_baud_rate(),
            handshake: default_handshake(),
            discovery_timeout_ms: default_discovery_timeout_ms(),
            read_timeout_ms: default_read_timeout_ms(),
        }
    }
}

impl SerialConfig {
    pub fn discovery_timeout(&self) -> Duration {
        Duration::from_millis(self.discovery_timeout_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
        }
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            repeat_writes: default_repeat_writes(),
            repeat_delay_ms: default_repeat_delay_ms(),
            ping_token: default_ping_token(),
            pong_token: default_pong_token(),
        }
    }
}

impl RelayConfig {
    /// Delay before the duplicate write, `None` when repeats are disabled
    pub fn repeat_delay(&self) -> Option<Duration> {
        self.repeat_writes
            .then(|| Duration::from_millis(self.repeat_delay_ms))
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Example
    /// ```no_run
    /// use setu_bridge::config::Config;
    ///
    /// let config = Config::load("setu-bridge.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.serial.port, None);
        assert_eq!(config.serial.baud_rate, 250_000);
        assert_eq!(config.serial.handshake, "ArduinoScratch");
        assert_eq!(config.serial.discovery_timeout(), Duration::from_secs(2));
        assert_eq!(config.network.bind_address, "0.0.0.0:8081");
        assert_eq!(
            config.relay.repeat_delay(),
            Some(Duration::from_millis(10))
        );
        assert_eq!(config.relay.ping_token, "__ping__");
        assert_eq!(config.relay.pong_token, "__pong__");
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let toml_content = r#"
[serial]
port = "/dev/ttyACM0"

[relay]
repeat_writes = false
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert_eq!(config.serial.port.as_deref(), Some("/dev/ttyACM0"));
        assert_eq!(config.serial.baud_rate, 250_000);
        assert_eq!(config.relay.repeat_delay(), None);
        assert_eq!(config.network.bind_address, "0.0.0.0:8081");
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bridge.toml");
        fs::write(
            &path,
            "[network]\nbind_address = \"127.0.0.1:9000\"\n[logging]\nlevel = \"debug\"\n",
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.network.bind_address, "127.0.0.1:9000");
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.toml");
        fs::write(&path, "[serial\nport = 3").unwrap();

        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, crate::error::Error::Config(_)));
    }
}
