//! Setu bridge - serial-to-WebSocket relay for the block-programming kit
//!
//! The bridge finds the serial port hosting the device, owns that port for
//! its lifetime, and relays between the device and any number of WebSocket
//! clients.

pub mod bridge;
pub mod config;
pub mod discovery;
pub mod error;
pub mod link;
pub mod registry;
pub mod splitter;
pub mod streaming;
pub mod transport;

// Re-export commonly used types
pub use bridge::SerialBridge;
pub use config::Config;
pub use error::{Error, Result};
