//! Relay core between the serial link and the network clients
//!
//! ```text
//!  device ──serial──▶ SerialLink ─on_data─▶ SerialBridge ─broadcast─▶ clients
//!  device ◀─serial─── SerialLink ◀─channel── SerialBridge ◀─payload─── clients
//! ```
//!
//! Inbound bytes are split into messages and every message is broadcast to
//! every registered client unmodified, wrapped in the JSON envelope. Client
//! payloads are validated and queued for the link's writer thread. Frame
//! checksums are not inspected in either direction.

use crate::config::RelayConfig;
use crate::error::{Error, Result};
use crate::link::{LinkEvents, LinkState};
use crate::registry::{ConnectionId, ConnectionRegistry};
use crate::splitter::MessageSplitter;
use crate::streaming::wire::{ClientRequest, Envelope, parse_client_payload, pong_message};
use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;
use std::sync::Arc;

/// Relay between one serial link and all connected clients
pub struct SerialBridge {
    registry: Arc<ConnectionRegistry>,
    splitter: Mutex<MessageSplitter>,
    outbound: Sender<Vec<u8>>,
    state: Mutex<LinkState>,
    ping_token: String,
    pong_token: String,
}

impl SerialBridge {
    /// Create the relay and the receiving end of its outbound queue
    ///
    /// The receiver is handed to [`crate::link::SerialLink::start`].
    pub fn new(registry: Arc<ConnectionRegistry>, relay: &RelayConfig) -> (Self, Receiver<Vec<u8>>) {
        let (outbound, outbound_rx) = crossbeam_channel::unbounded();
        let bridge = Self {
            registry,
            splitter: Mutex::new(MessageSplitter::new()),
            outbound,
            state: Mutex::new(LinkState::Connecting),
            ping_token: relay.ping_token.clone(),
            pong_token: relay.pong_token.clone(),
        };
        (bridge, outbound_rx)
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    pub fn link_state(&self) -> LinkState {
        *self.state.lock()
    }

    /// Split a chunk from the device and broadcast every completed message
    ///
    /// Returns the number of messages broadcast.
    pub fn on_serial_data(&self, chunk: &[u8]) -> usize {
        let messages = self.splitter.lock().push(chunk);
        let count = messages.len();

        for message in messages {
            let envelope = Envelope::buffer(message);
            match envelope.to_json() {
                Ok(json) => {
                    let delivered = self.registry.broadcast(&json);
                    log::trace!("Relayed device message to {} clients", delivered);
                }
                Err(e) => log::error!("Failed to serialize envelope: {}", e),
            }
        }
        count
    }

    /// Handle one text payload received from client `id`
    pub fn on_client_payload(&self, id: ConnectionId, payload: &str) -> Result<()> {
        match parse_client_payload(payload, &self.ping_token)? {
            ClientRequest::Ping => {
                log::trace!("Ping from {}", id);
                let pong = pong_message(&self.pong_token)?;
                self.registry.broadcast(&pong);
                Ok(())
            }
            ClientRequest::Write(bytes) => {
                let state = self.link_state();
                if matches!(state, LinkState::Closed | LinkState::Failed) {
                    return Err(Error::LinkDown(format!("link is {:?}", state)));
                }
                log::debug!("{} -> device: {:?}", id, bytes);
                self.outbound
                    .send(bytes)
                    .map_err(|_| Error::LinkDown("writer stopped".to_string()))
            }
        }
    }
}

impl LinkEvents for SerialBridge {
    fn on_open(&self, port: &str) {
        log::info!("Relaying {} to network clients", port);
        *self.state.lock() = LinkState::Open;
    }

    fn on_data(&self, chunk: &[u8]) {
        self.on_serial_data(chunk);
    }

    fn on_close(&self) {
        *self.state.lock() = LinkState::Closed;
    }

    fn on_error(&self, error: &Error) {
        log::error!("Serial link error, relay stopped: {}", error);
        *self.state.lock() = LinkState::Failed;
    }
}
