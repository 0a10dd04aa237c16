//! In-memory transport standing in for the device in tests

use super::Transport;
use crate::error::{Error, Result};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;

/// Mock transport for unit and integration testing
///
/// Clones share the same buffers, so a test keeps one handle while the code
/// under test owns another.
#[derive(Clone, Default)]
pub struct MockTransport {
    inner: Arc<Mutex<MockTransportInner>>,
}

#[derive(Default)]
struct MockTransportInner {
    read_buffer: VecDeque<u8>,
    write_buffer: Vec<u8>,
    /// Individual `write` calls with the time they happened, in order
    writes: Vec<(Instant, Vec<u8>)>,
    fail_io: bool,
}

impl MockTransport {
    /// Create a new mock transport
    pub fn new() -> Self {
        Self::default()
    }

    /// Inject data to be read
    pub fn inject_read(&self, data: &[u8]) {
        self.inner.lock().read_buffer.extend(data);
    }

    /// Get all written data
    pub fn get_written(&self) -> Vec<u8> {
        self.inner.lock().write_buffer.clone()
    }

    /// Get written data split by `write` call
    pub fn get_writes(&self) -> Vec<Vec<u8>> {
        self.inner
            .lock()
            .writes
            .iter()
            .map(|(_, data)| data.clone())
            .collect()
    }

    /// Like [`get_writes`](Self::get_writes), with the instant of each call
    pub fn get_timed_writes(&self) -> Vec<(Instant, Vec<u8>)> {
        self.inner.lock().writes.clone()
    }

    /// Make every subsequent read and write fail, as an unplugged device would
    pub fn disconnect(&self) {
        self.inner.lock().fail_io = true;
    }
}

fn unplugged() -> Error {
    std::io::Error::new(std::io::ErrorKind::BrokenPipe, "mock device unplugged").into()
}

impl Transport for MockTransport {
    fn read(&mut self, buffer: &mut [u8]) -> Result<usize> {
        let mut inner = self.inner.lock();
        if inner.fail_io {
            return Err(unplugged());
        }
        let count = inner.read_buffer.len().min(buffer.len());
        for (slot, byte) in buffer.iter_mut().zip(inner.read_buffer.drain(..count)) {
            *slot = byte;
        }
        Ok(count)
    }

    fn write(&mut self, data: &[u8]) -> Result<usize> {
        let mut inner = self.inner.lock();
        if inner.fail_io {
            return Err(unplugged());
        }
        inner.write_buffer.extend_from_slice(data);
        inner.writes.push((Instant::now(), data.to_vec()));
        Ok(data.len())
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    fn available(&mut self) -> Result<usize> {
        let inner = self.inner.lock();
        if inner.fail_io {
            return Err(unplugged());
        }
        Ok(inner.read_buffer.len())
    }
}
