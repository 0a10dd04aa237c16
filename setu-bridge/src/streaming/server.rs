//! WebSocket server for bridge clients
//!
//! # Connection lifecycle
//!
//! ```text
//! 1. Client connects to network.bind_address (default 0.0.0.0:8081)
//! 2. Accept loop spawns a thread for the connection
//! 3. WebSocket handshake, then the client is registered for broadcasts
//! 4. Loop: flush queued broadcasts, read one client frame (10ms timeout)
//! 5. On close or error the client is unregistered
//! ```
//!
//! Any number of clients may be connected at once. Frames from one client are
//! relayed in arrival order; there is no ordering across clients.

use crate::bridge::SerialBridge;
use crate::error::{Error, Result};
use crate::link::LinkState;
use crate::registry::{ClientSink, ConnectionId};
use crossbeam_channel::{Receiver, Sender};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tungstenite::{Message, WebSocket};

/// Read timeout on client sockets; bounds broadcast latency and shutdown checks
const CLIENT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Sleep of the accept loop when no connection is pending
const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Registry sink that queues messages for a connection thread
pub struct WsSink {
    tx: Sender<String>,
}

impl ClientSink for WsSink {
    fn deliver(&self, message: &str) -> Result<()> {
        self.tx
            .send(message.to_string())
            .map_err(|_| Error::Disconnected)
    }
}

/// Accepts WebSocket clients and wires them to the bridge
pub struct WsServer {
    listener: TcpListener,
    bridge: Arc<SerialBridge>,
    /// Global running flag (daemon shutdown)
    running: Arc<AtomicBool>,
}

impl WsServer {
    pub fn bind(bind_address: &str, bridge: Arc<SerialBridge>, running: Arc<AtomicBool>) -> Result<Self> {
        let listener = TcpListener::bind(bind_address)
            .map_err(|e| Error::Other(format!("Failed to bind to {}: {}", bind_address, e)))?;
        listener.set_nonblocking(true)?;
        Ok(Self {
            listener,
            bridge,
            running,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Serve clients until shutdown is requested or the serial link fails
    pub fn run(&self) -> Result<()> {
        log::info!("WebSocket server listening on {}", self.local_addr()?);
        let mut handles: Vec<JoinHandle<()>> = Vec::new();

        let result = loop {
            if !self.running.load(Ordering::Relaxed) {
                break Ok(());
            }
            if self.bridge.link_state() == LinkState::Failed {
                break Err(Error::LinkDown("serial link failed".to_string()));
            }

            match self.listener.accept() {
                Ok((stream, addr)) => {
                    handles.retain(|h| !h.is_finished());
                    let bridge = Arc::clone(&self.bridge);
                    let running = Arc::clone(&self.running);
                    let spawned = thread::Builder::new()
                        .name("ws-client".to_string())
                        .spawn(move || {
                            if let Err(e) = serve_client(stream, addr, bridge, running) {
                                log::warn!("Client {} error: {}", addr, e);
                            }
                        });
                    match spawned {
                        Ok(handle) => handles.push(handle),
                        Err(e) => log::error!("Failed to spawn client thread for {}: {}", addr, e),
                    }
                }
                Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    thread::sleep(ACCEPT_POLL_INTERVAL);
                }
                Err(e) => {
                    log::error!("Accept error: {}", e);
                }
            }
        };

        // Client threads exit on their own once the running flag drops
        self.running.store(false, Ordering::Relaxed);
        for handle in handles {
            let _ = handle.join();
        }
        result
    }
}

fn serve_client(
    stream: TcpStream,
    addr: SocketAddr,
    bridge: Arc<SerialBridge>,
    running: Arc<AtomicBool>,
) -> Result<()> {
    stream.set_nonblocking(false)?;
    let mut ws = tungstenite::accept(stream)
        .map_err(|e| Error::Other(format!("WebSocket handshake with {} failed: {}", addr, e)))?;
    ws.get_ref().set_read_timeout(Some(CLIENT_POLL_INTERVAL))?;

    let (tx, rx) = crossbeam_channel::unbounded();
    let id = bridge.registry().add(Box::new(WsSink { tx }));
    log::info!("Client connected: {} as {}", addr, id);

    let result = client_loop(&mut ws, &rx, id, &bridge, &running);

    bridge.registry().remove(id);
    let _ = ws.close(None);
    let _ = ws.flush();
    log::info!("Client disconnected: {} ({})", addr, id);
    result
}

fn client_loop(
    ws: &mut WebSocket<TcpStream>,
    outbound: &Receiver<String>,
    id: ConnectionId,
    bridge: &SerialBridge,
    running: &AtomicBool,
) -> Result<()> {
    while running.load(Ordering::Relaxed) {
        for message in outbound.try_iter() {
            ws.send(Message::Text(message))?;
        }

        let text = match ws.read() {
            Ok(Message::Text(text)) => text,
            Ok(Message::Binary(data)) => match String::from_utf8(data) {
                Ok(text) => text,
                Err(_) => {
                    log::warn!("Ignoring non-UTF-8 binary frame from {}", id);
                    continue;
                }
            },
            Ok(Message::Close(_)) => return Ok(()),
            Ok(_) => continue,
            Err(tungstenite::Error::Io(ref e))
                if matches!(
                    e.kind(),
                    std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
                ) =>
            {
                continue;
            }
            Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed) => {
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        if let Err(e) = bridge.on_client_payload(id, &text) {
            log::warn!("Dropped payload from {}: {}", id, e);
        }
    }
    Ok(())
}
