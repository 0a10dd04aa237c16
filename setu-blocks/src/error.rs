//! Error types for the Setu block runtime

use thiserror::Error;

/// Block runtime error type
#[derive(Error, Debug)]
pub enum BlocksError {
    #[error("Connection failed: {0}")]
    Connection(#[from] std::io::Error),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),

    #[error("Not connected to the bridge")]
    NotConnected,

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl From<serde_json::Error> for BlocksError {
    fn from(e: serde_json::Error) -> Self {
        BlocksError::Protocol(e.to_string())
    }
}

impl From<toml::de::Error> for BlocksError {
    fn from(e: toml::de::Error) -> Self {
        BlocksError::Config(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, BlocksError>;
