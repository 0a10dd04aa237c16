//! Connection from the block runtime to the bridge
//!
//! Uses synchronous `tungstenite`. The socket gets a short read timeout so
//! [`BridgeLink::try_recv`] can be polled between commands. A dropped
//! connection is reopened on the next use once the reconnect delay elapsed.
//! Only plain `ws://` URLs are accepted; the read timeout is set on the TCP
//! stream, which a TLS wrapper would hide.

use crate::config::ConnectionConfig;
use crate::error::{BlocksError, Result};
use std::net::TcpStream;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use tungstenite::stream::MaybeTlsStream;
use tungstenite::{Message, WebSocket};

/// Message-oriented link to the bridge
pub trait BridgeLink {
    /// Send one text payload
    fn send_text(&mut self, text: &str) -> Result<()>;

    /// Next pending text message, `None` when nothing is waiting
    fn try_recv(&mut self) -> Result<Option<String>>;

    /// Whether the link is currently open
    fn is_open(&self) -> bool;
}

type Socket = WebSocket<MaybeTlsStream<TcpStream>>;

/// WebSocket link with automatic reconnection
pub struct WsLink {
    url: String,
    read_timeout: Duration,
    reconnect_delay: Duration,
    socket: Option<Socket>,
    last_attempt: Option<Instant>,
}

impl WsLink {
    /// Create a link; the first connection attempt happens on first use
    pub fn new(config: &ConnectionConfig) -> Result<Self> {
        match config.url.split_once("://") {
            Some((scheme, _)) if scheme.eq_ignore_ascii_case("ws") => {}
            _ => {
                return Err(BlocksError::Config(format!(
                    "bridge url {:?} must start with ws://",
                    config.url
                )));
            }
        }
        Ok(Self {
            url: config.url.clone(),
            read_timeout: config.read_timeout(),
            reconnect_delay: config.reconnect_delay(),
            socket: None,
            last_attempt: None,
        })
    }

    /// Create a link and connect right away
    pub fn connect(config: &ConnectionConfig) -> Result<Self> {
        let mut link = Self::new(config)?;
        link.open()?;
        Ok(link)
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn open(&mut self) -> Result<()> {
        self.last_attempt = Some(Instant::now());
        let (socket, _) = tungstenite::connect(self.url.as_str())?;
        let MaybeTlsStream::Plain(stream) = socket.get_ref() else {
            return Err(BlocksError::Config(format!(
                "{} did not yield a plain TCP stream",
                self.url
            )));
        };
        stream.set_read_timeout(Some(self.read_timeout))?;
        info!("Connected to bridge at {}", self.url);
        self.socket = Some(socket);
        Ok(())
    }

    /// Reopen a dropped connection if the reconnect delay has passed
    fn ensure_open(&mut self) -> Option<&mut Socket> {
        if self.socket.is_none() {
            let due = self
                .last_attempt
                .is_none_or(|t| t.elapsed() >= self.reconnect_delay);
            if due && let Err(e) = self.open() {
                debug!("Reconnect to {} failed: {}", self.url, e);
            }
        }
        self.socket.as_mut()
    }

    fn drop_connection(&mut self, reason: &dyn std::fmt::Display) {
        if self.socket.take().is_some() {
            warn!("Bridge connection lost: {}", reason);
        }
    }
}

impl BridgeLink for WsLink {
    fn send_text(&mut self, text: &str) -> Result<()> {
        let socket = self.ensure_open().ok_or(BlocksError::NotConnected)?;
        match socket.send(Message::Text(text.to_string())) {
            Ok(()) => Ok(()),
            Err(e) => {
                self.drop_connection(&e);
                Err(e.into())
            }
        }
    }

    fn try_recv(&mut self) -> Result<Option<String>> {
        let Some(socket) = self.ensure_open() else {
            return Ok(None);
        };

        loop {
            match socket.read() {
                Ok(Message::Text(text)) => return Ok(Some(text)),
                Ok(Message::Binary(data)) => match String::from_utf8(data) {
                    Ok(text) => return Ok(Some(text)),
                    Err(_) => continue,
                },
                Ok(Message::Close(_)) => {
                    self.drop_connection(&"closed by bridge");
                    return Ok(None);
                }
                Ok(_) => continue,
                Err(tungstenite::Error::Io(ref e))
                    if matches!(
                        e.kind(),
                        std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
                    ) =>
                {
                    return Ok(None);
                }
                Err(e) => {
                    self.drop_connection(&e);
                    return Ok(None);
                }
            }
        }
    }

    fn is_open(&self) -> bool {
        self.socket.as_ref().is_some_and(|s| s.can_write())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(url: &str) -> ConnectionConfig {
        ConnectionConfig {
            url: url.to_string(),
            ..ConnectionConfig::default()
        }
    }

    #[test]
    fn test_plain_ws_url_accepted() {
        let link = WsLink::new(&config("ws://127.0.0.1:8081")).unwrap();
        assert_eq!(link.url(), "ws://127.0.0.1:8081");
        assert!(!link.is_open());
    }

    #[test]
    fn test_other_schemes_rejected() {
        for url in ["wss://bridge.local:8081", "http://127.0.0.1:8081", "127.0.0.1:8081"] {
            assert!(
                matches!(WsLink::new(&config(url)), Err(BlocksError::Config(_))),
                "{}",
                url
            );
        }
    }

    #[test]
    fn test_unreachable_bridge_is_not_connected() {
        // Port 9 (discard) is closed on test machines; nothing listens there
        let mut link = WsLink::new(&config("ws://127.0.0.1:9")).unwrap();
        assert!(matches!(link.send_text("__ping__"), Err(BlocksError::NotConnected)));
        assert_eq!(link.try_recv().unwrap(), None);
    }
}
