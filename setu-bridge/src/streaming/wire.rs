//! Bridge↔client wire format
//!
//! # Bridge → client
//!
//! Each serial message is wrapped in a JSON envelope and sent as a WebSocket
//! text frame:
//!
//! ```text
//! {"type":"Buffer","data":[91,48,44,49,93]}
//! ```
//!
//! The reply to a liveness probe is the bare JSON string `"__pong__"`.
//!
//! # Client → bridge
//!
//! A text frame holding comma-separated decimal byte values, e.g. a servo
//! frame `240,242,1,90,0,0,0,247,139,50`. Whitespace around tokens is
//! tolerated. The configured ping token is answered instead of forwarded.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Message broadcast to every connected client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Envelope {
    /// One delimited message from the device, delimiter removed
    Buffer { data: Vec<u8> },
}

impl Envelope {
    pub fn buffer(data: Vec<u8>) -> Self {
        Envelope::Buffer { data }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Serialized liveness reply for `token`
pub fn pong_message(token: &str) -> Result<String> {
    Ok(serde_json::to_string(token)?)
}

/// Decoded client payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientRequest {
    /// Liveness probe; answered with a pong broadcast
    Ping,
    /// Bytes to write to the device
    Write(Vec<u8>),
}

/// Parse one client text payload
///
/// Every token must be an integer in `0..=255`; a single bad token rejects
/// the whole payload so a partial frame never reaches the device.
pub fn parse_client_payload(text: &str, ping_token: &str) -> Result<ClientRequest> {
    let trimmed = text.trim();
    if trimmed == ping_token {
        return Ok(ClientRequest::Ping);
    }
    if trimmed.is_empty() {
        return Err(Error::InvalidPayload("empty payload".to_string()));
    }

    let bytes = trimmed
        .split(',')
        .map(|token| {
            let token = token.trim();
            token
                .parse::<u8>()
                .map_err(|_| Error::InvalidPayload(format!("bad byte value {:?}", token)))
        })
        .collect::<Result<Vec<u8>>>()?;

    Ok(ClientRequest::Write(bytes))
}
