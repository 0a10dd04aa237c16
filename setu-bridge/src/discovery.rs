//! Serial port discovery
//!
//! The device announces itself by printing a fixed handshake literal once its
//! serial port is up. Discovery opens every enumerable port at once, one probe
//! thread per port, and returns the first port on which the literal shows up.
//!
//! # Probe lifecycle
//!
//! ```text
//! open ──▶ read/scan ──▶ handshake seen ──▶ claim winner slot ──▶ cancel others
//!              │
//!              └──▶ deadline reached or cancelled ──▶ close
//! ```
//!
//! Every probe has closed its port by the time [`PortDiscovery::discover`]
//! returns, so the winning port can be reopened for the main link right away.

use crate::config::SerialConfig;
use crate::error::{Error, Result};
use crate::transport::{SerialTransport, Transport};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

/// Idle sleep of a probe when its port returned no data
const PROBE_POLL_INTERVAL: Duration = Duration::from_millis(2);

/// Source of candidate ports
pub trait PortProber: Send + Sync {
    /// Names of all ports worth probing
    fn list_ports(&self) -> Result<Vec<String>>;

    /// Open `port` for probing
    fn open(&self, port: &str, baud_rate: u32) -> Result<Box<dyn Transport>>;
}

/// [`PortProber`] backed by the OS serial ports
pub struct SerialProber {
    read_timeout: Duration,
}

impl SerialProber {
    pub fn new(read_timeout: Duration) -> Self {
        Self { read_timeout }
    }
}

impl PortProber for SerialProber {
    fn list_ports(&self) -> Result<Vec<String>> {
        SerialTransport::enumerate()
    }

    fn open(&self, port: &str, baud_rate: u32) -> Result<Box<dyn Transport>> {
        Ok(Box::new(SerialTransport::open(port, baud_rate, self.read_timeout)?))
    }
}

/// Streaming matcher for the handshake literal
///
/// Only the last `token.len() - 1` bytes are carried between chunks, so a
/// literal split across reads is still found.
#[derive(Debug, Clone)]
pub struct HandshakeDetector {
    token: Vec<u8>,
    window: Vec<u8>,
}

impl HandshakeDetector {
    pub fn new(token: &str) -> Self {
        Self {
            token: token.as_bytes().to_vec(),
            window: Vec::with_capacity(token.len() * 2),
        }
    }

    /// Feed received bytes; true once the literal has been seen
    pub fn feed(&mut self, chunk: &[u8]) -> bool {
        if self.token.is_empty() {
            return true;
        }
        self.window.extend_from_slice(chunk);
        if self
            .window
            .windows(self.token.len())
            .any(|w| w == self.token.as_slice())
        {
            return true;
        }
        let keep = self.token.len() - 1;
        if self.window.len() > keep {
            let cut = self.window.len() - keep;
            self.window.drain(..cut);
        }
        false
    }
}

/// Finds the port hosting the device
pub struct PortDiscovery {
    prober: Arc<dyn PortProber>,
    handshake: String,
    baud_rate: u32,
    timeout: Duration,
}

impl PortDiscovery {
    pub fn new(prober: Arc<dyn PortProber>, serial: &SerialConfig) -> Self {
        Self {
            prober,
            handshake: serial.handshake.clone(),
            baud_rate: serial.baud_rate,
            timeout: serial.discovery_timeout(),
        }
    }

    /// Probe all ports; `None` when nothing answered before the deadline
    pub fn discover(&self) -> Option<String> {
        self.probe_all().0
    }

    /// Like [`discover`](Self::discover) but a miss becomes
    /// [`Error::DiscoveryFailed`] listing the probed ports
    pub fn discover_or_fail(&self) -> Result<String> {
        match self.probe_all() {
            (Some(port), _) => Ok(port),
            (None, probed) => Err(Error::DiscoveryFailed { probed }),
        }
    }

    fn probe_all(&self) -> (Option<String>, Vec<String>) {
        let ports = match self.prober.list_ports() {
            Ok(ports) => ports,
            Err(e) => {
                log::warn!("Failed to enumerate serial ports: {}", e);
                Vec::new()
            }
        };
        log::info!(
            "Probing {} serial ports for {:?} ({:?} window)",
            ports.len(),
            self.handshake,
            self.timeout
        );

        let winner: Arc<Mutex<Option<String>>> = Arc::new(Mutex::new(None));
        let cancel = Arc::new(AtomicBool::new(false));
        let deadline = Instant::now() + self.timeout;

        let mut handles = Vec::with_capacity(ports.len());
        for port in &ports {
            let probe = Probe {
                prober: Arc::clone(&self.prober),
                port: port.clone(),
                baud_rate: self.baud_rate,
                detector: HandshakeDetector::new(&self.handshake),
                deadline,
                cancel: Arc::clone(&cancel),
                winner: Arc::clone(&winner),
            };
            match thread::Builder::new()
                .name(format!("probe-{}", port))
                .spawn(move || probe.run())
            {
                Ok(handle) => handles.push(handle),
                Err(e) => log::warn!("Failed to spawn probe for {}: {}", port, e),
            }
        }

        for handle in handles {
            if handle.join().is_err() {
                log::error!("Probe thread panicked");
            }
        }

        let found = winner.lock().take();
        match &found {
            Some(port) => log::info!("Device found on {}", port),
            None => log::warn!("No port answered the handshake"),
        }
        (found, ports)
    }
}

struct Probe {
    prober: Arc<dyn PortProber>,
    port: String,
    baud_rate: u32,
    detector: HandshakeDetector,
    deadline: Instant,
    cancel: Arc<AtomicBool>,
    winner: Arc<Mutex<Option<String>>>,
}

impl Probe {
    fn run(mut self) {
        let mut transport = match self.prober.open(&self.port, self.baud_rate) {
            Ok(t) => t,
            Err(e) => {
                log::debug!("Skipping {}: {}", self.port, e);
                return;
            }
        };

        let mut buf = [0u8; 256];
        while !self.cancel.load(Ordering::Relaxed) && Instant::now() < self.deadline {
            match transport.read(&mut buf) {
                Ok(0) => thread::sleep(PROBE_POLL_INTERVAL),
                Ok(n) => {
                    if self.detector.feed(&buf[..n]) {
                        self.claim();
                        break;
                    }
                }
                Err(e) => {
                    log::debug!("Probe on {} stopped: {}", self.port, e);
                    break;
                }
            }
        }
        // Port closes when `transport` drops here
    }

    fn claim(&self) {
        let mut winner = self.winner.lock();
        if winner.is_none() {
            log::debug!("Handshake seen on {}", self.port);
            *winner = Some(self.port.clone());
            self.cancel.store(true, Ordering::Relaxed);
        } else {
            log::debug!("Handshake seen on {} after another port won", self.port);
        }
    }
}
