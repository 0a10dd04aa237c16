//! Error types for the Setu bridge

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Bridge error types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Serial port error
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// WebSocket protocol error
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),

    /// No serial port answered the handshake within the discovery window
    #[error(
        "No device answered the handshake on any serial port (probed: {probed:?}). \
         Check the USB cable and that the firmware is flashed, or set `serial.port` in the config"
    )]
    DiscoveryFailed {
        /// Ports that were probed
        probed: Vec<String>,
    },

    /// Client payload is not a comma-separated byte list
    #[error("Invalid client payload: {0}")]
    InvalidPayload(String),

    /// A client connection is gone
    #[error("Client disconnected")]
    Disconnected,

    /// Serial link already failed or closed
    #[error("Serial link unavailable: {0}")]
    LinkDown(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl From<toml::de::Error> for Error {
    fn from(e: toml::de::Error) -> Self {
        Error::Config(e.to_string())
    }
}
