//! Serial link to the device
//!
//! [`SerialLink`] is the single owner of the serial handle. It runs two
//! threads:
//!
//! 1. **Reader**: polls the port and hands every received chunk to
//!    [`LinkEvents::on_data`] in arrival order.
//! 2. **Writer**: drains the outbound channel in order. When a repeat delay
//!    is configured every payload is written a second time once that delay
//!    has passed, without holding back the payloads queued behind it. The
//!    firmware has no acknowledgement and occasionally misses a frame right
//!    after it transmitted a snapshot.
//!
//! Any I/O failure is reported once through [`LinkEvents::on_error`] and stops
//! both threads. The link never reopens the port on its own.

use crate::error::{Error, Result};
use crate::transport::Transport;
use crossbeam_channel::{Receiver, RecvTimeoutError};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Idle sleep of the reader when the port has nothing buffered
const READ_POLL_INTERVAL: Duration = Duration::from_millis(2);

/// How often the writer re-checks the shutdown flag while idle
const WRITE_POLL_INTERVAL: Duration = Duration::from_millis(50);

const READ_CHUNK_SIZE: usize = 512;

/// Lifecycle of the serial link
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Connecting,
    Open,
    Closed,
    Failed,
}

/// Observer of serial link activity
pub trait LinkEvents: Send + Sync {
    /// Threads are running and the port is usable
    fn on_open(&self, port: &str);

    /// Bytes received from the device, in arrival order
    fn on_data(&self, chunk: &[u8]);

    /// The link was shut down on request
    fn on_close(&self);

    /// A read or write failed; the link is unusable from now on
    fn on_error(&self, error: &Error);
}

/// Owner of the serial handle and its I/O threads
pub struct SerialLink {
    port_name: String,
    /// Set to stop both threads
    shutdown: Arc<AtomicBool>,
    /// Set once the first I/O error was reported
    failed: Arc<AtomicBool>,
    events: Arc<dyn LinkEvents>,
    reader_handle: Option<JoinHandle<()>>,
    writer_handle: Option<JoinHandle<()>>,
}

impl SerialLink {
    /// Start the reader and writer threads on `transport`
    ///
    /// Payloads sent into the channel paired with `outbound` are written to
    /// the device in order.
    pub fn start(
        port_name: &str,
        transport: Box<dyn Transport>,
        outbound: Receiver<Vec<u8>>,
        repeat_delay: Option<Duration>,
        events: Arc<dyn LinkEvents>,
    ) -> Result<Self> {
        let port = Arc::new(Mutex::new(transport));
        let shutdown = Arc::new(AtomicBool::new(false));
        let failed = Arc::new(AtomicBool::new(false));

        let reader_handle = {
            let port = Arc::clone(&port);
            let shutdown = Arc::clone(&shutdown);
            let failed = Arc::clone(&failed);
            let events = Arc::clone(&events);
            thread::Builder::new()
                .name("serial-reader".to_string())
                .spawn(move || reader_loop(port, shutdown, failed, events))
                .map_err(|e| Error::Other(format!("Failed to spawn reader thread: {}", e)))?
        };

        let mut link = Self {
            port_name: port_name.to_string(),
            shutdown: Arc::clone(&shutdown),
            failed: Arc::clone(&failed),
            events: Arc::clone(&events),
            reader_handle: Some(reader_handle),
            writer_handle: None,
        };

        let writer_handle = {
            let events = Arc::clone(&events);
            thread::Builder::new()
                .name("serial-writer".to_string())
                .spawn(move || writer_loop(port, outbound, repeat_delay, shutdown, failed, events))
                .map_err(|e| Error::Other(format!("Failed to spawn writer thread: {}", e)))?
        };
        link.writer_handle = Some(writer_handle);

        log::info!("Serial link open on {}", link.port_name);
        link.events.on_open(&link.port_name);
        Ok(link)
    }

    pub fn port_name(&self) -> &str {
        &self.port_name
    }

    /// True once an I/O error stopped the link
    pub fn has_failed(&self) -> bool {
        self.failed.load(Ordering::Relaxed)
    }

    /// Stop both threads and wait for them
    pub fn shutdown(&mut self) {
        if self.reader_handle.is_none() && self.writer_handle.is_none() {
            return;
        }
        log::info!("Closing serial link on {}", self.port_name);
        self.shutdown.store(true, Ordering::Relaxed);

        for handle in [self.reader_handle.take(), self.writer_handle.take()]
            .into_iter()
            .flatten()
        {
            if handle.join().is_err() {
                log::error!("Serial I/O thread panicked");
            }
        }

        if !self.has_failed() {
            self.events.on_close();
        }
    }
}

impl Drop for SerialLink {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Report `error` unless another thread already did, then stop the link
fn fail(error: Error, shutdown: &AtomicBool, failed: &AtomicBool, events: &dyn LinkEvents) {
    shutdown.store(true, Ordering::Relaxed);
    if !failed.swap(true, Ordering::Relaxed) {
        log::error!("Serial link failed: {}", error);
        events.on_error(&error);
    }
}

fn reader_loop(
    port: Arc<Mutex<Box<dyn Transport>>>,
    shutdown: Arc<AtomicBool>,
    failed: Arc<AtomicBool>,
    events: Arc<dyn LinkEvents>,
) {
    let mut buf = [0u8; READ_CHUNK_SIZE];

    while !shutdown.load(Ordering::Relaxed) {
        // Only read what is already buffered so the writer never waits on a
        // blocking read holding the lock
        let result = {
            let mut port = port.lock();
            match port.available() {
                Ok(0) => Ok(0),
                Ok(n) => port.read(&mut buf[..n.min(READ_CHUNK_SIZE)]),
                Err(e) => Err(e),
            }
        };

        match result {
            Ok(0) => thread::sleep(READ_POLL_INTERVAL),
            Ok(n) => {
                log::trace!("Serial RX {} bytes", n);
                events.on_data(&buf[..n]);
            }
            Err(e) => {
                fail(e, &shutdown, &failed, events.as_ref());
                break;
            }
        }
    }

    log::debug!("Serial reader stopped");
}

fn writer_loop(
    port: Arc<Mutex<Box<dyn Transport>>>,
    outbound: Receiver<Vec<u8>>,
    repeat_delay: Option<Duration>,
    shutdown: Arc<AtomicBool>,
    failed: Arc<AtomicBool>,
    events: Arc<dyn LinkEvents>,
) {
    if let Err(e) = write_pending(&port, &outbound, repeat_delay, &shutdown) {
        fail(e, &shutdown, &failed, events.as_ref());
    }
    log::debug!("Serial writer stopped");
}

/// Write payloads as they arrive; repeats wait in a queue ordered by due time
///
/// The delay is fixed, so due times are monotonic and the queue stays FIFO.
/// A payload arriving while repeats are pending is written immediately.
fn write_pending(
    port: &Mutex<Box<dyn Transport>>,
    outbound: &Receiver<Vec<u8>>,
    repeat_delay: Option<Duration>,
    shutdown: &AtomicBool,
) -> Result<()> {
    let write = |payload: &[u8]| -> Result<()> {
        let mut port = port.lock();
        port.write_all(payload)?;
        port.flush()
    };
    let mut repeats: VecDeque<(Instant, Vec<u8>)> = VecDeque::new();
    let mut senders_gone = false;

    while !shutdown.load(Ordering::Relaxed) {
        let now = Instant::now();
        while repeats.front().is_some_and(|(due, _)| *due <= now) {
            if let Some((_, payload)) = repeats.pop_front() {
                log::trace!("Serial TX repeat {:?}", payload);
                write(&payload)?;
            }
        }

        let wait = repeats
            .front()
            .map_or(WRITE_POLL_INTERVAL, |(due, _)| {
                due.saturating_duration_since(now).min(WRITE_POLL_INTERVAL)
            });

        if senders_gone {
            if repeats.is_empty() {
                break;
            }
            thread::sleep(wait);
            continue;
        }

        match outbound.recv_timeout(wait) {
            Ok(payload) => {
                log::trace!("Serial TX {:?}", payload);
                write(&payload)?;
                if let Some(delay) = repeat_delay {
                    repeats.push_back((Instant::now() + delay, payload));
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => senders_gone = true,
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MockTransport;

    #[derive(Default)]
    struct EventLog {
        opened: Mutex<Option<String>>,
        data: Mutex<Vec<u8>>,
        closed: AtomicBool,
        errors: Mutex<Vec<String>>,
    }

    impl LinkEvents for EventLog {
        fn on_open(&self, port: &str) {
            *self.opened.lock() = Some(port.to_string());
        }
        fn on_data(&self, chunk: &[u8]) {
            self.data.lock().extend_from_slice(chunk);
        }
        fn on_close(&self) {
            self.closed.store(true, Ordering::Relaxed);
        }
        fn on_error(&self, error: &Error) {
            self.errors.lock().push(error.to_string());
        }
    }

    fn wait_until(mut cond: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(2);
        while Instant::now() < deadline {
            if cond() {
                return true;
            }
            thread::sleep(Duration::from_millis(2));
        }
        false
    }

    #[test]
    fn test_reader_forwards_bytes_in_order() {
        let mock = MockTransport::new();
        let events = Arc::new(EventLog::default());
        let (_tx, rx) = crossbeam_channel::unbounded();
        let mut link =
            SerialLink::start("mock0", Box::new(mock.clone()), rx, None, events.clone()).unwrap();

        assert_eq!(events.opened.lock().as_deref(), Some("mock0"));
        assert_eq!(link.port_name(), "mock0");
        mock.inject_read(b"[0,1");
        mock.inject_read(b",2]\t\n");
        assert!(wait_until(|| events.data.lock().len() == 9));
        assert_eq!(&*events.data.lock(), b"[0,1,2]\t\n");

        link.shutdown();
        assert!(events.closed.load(Ordering::Relaxed));
        assert!(events.errors.lock().is_empty());
    }

    #[test]
    fn test_writer_repeats_after_delay() {
        let mock = MockTransport::new();
        let events = Arc::new(EventLog::default());
        let (tx, rx) = crossbeam_channel::unbounded();
        let _link = SerialLink::start(
            "mock0",
            Box::new(mock.clone()),
            rx,
            Some(Duration::from_millis(10)),
            events,
        )
        .unwrap();

        tx.send(vec![1, 2, 3]).unwrap();
        tx.send(vec![4]).unwrap();
        assert!(wait_until(|| mock.get_writes().len() == 4));

        // Queued payloads go out first, each repeat follows once its delay ran
        let writes = mock.get_timed_writes();
        let order: Vec<Vec<u8>> = writes.iter().map(|(_, data)| data.clone()).collect();
        assert_eq!(order, vec![vec![1, 2, 3], vec![4], vec![1, 2, 3], vec![4]]);
        assert!(writes[2].0 - writes[0].0 >= Duration::from_millis(10));
        assert!(writes[3].0 - writes[1].0 >= Duration::from_millis(10));
    }

    #[test]
    fn test_repeats_do_not_delay_new_payloads() {
        const PAYLOADS: u8 = 20;
        let mock = MockTransport::new();
        let events = Arc::new(EventLog::default());
        let (tx, rx) = crossbeam_channel::unbounded();
        let _link = SerialLink::start(
            "mock0",
            Box::new(mock.clone()),
            rx,
            Some(Duration::from_millis(10)),
            events,
        )
        .unwrap();

        // One payload every 5 ms, the fastest rate clients are allowed
        let mut queued_at = Vec::new();
        for i in 0..PAYLOADS {
            queued_at.push(Instant::now());
            tx.send(vec![i]).unwrap();
            thread::sleep(Duration::from_millis(5));
        }
        assert!(wait_until(|| mock.get_writes().len() == 2 * PAYLOADS as usize));

        let writes = mock.get_timed_writes();
        for i in 0..PAYLOADS {
            let times: Vec<Instant> = writes
                .iter()
                .filter(|(_, data)| data[..] == [i])
                .map(|(at, _)| *at)
                .collect();
            assert_eq!(times.len(), 2, "payload {}", i);

            let lag = times[0] - queued_at[i as usize];
            assert!(lag < Duration::from_millis(25), "payload {} waited {:?}", i, lag);
            assert!(times[1] - times[0] >= Duration::from_millis(10));
        }
    }

    #[test]
    fn test_writer_without_repeat() {
        let mock = MockTransport::new();
        let events = Arc::new(EventLog::default());
        let (tx, rx) = crossbeam_channel::unbounded();
        let _link = SerialLink::start("mock0", Box::new(mock.clone()), rx, None, events).unwrap();

        tx.send(vec![9, 9]).unwrap();
        assert!(wait_until(|| !mock.get_writes().is_empty()));
        thread::sleep(Duration::from_millis(30));
        assert_eq!(mock.get_writes(), vec![vec![9, 9]]);
    }

    #[test]
    fn test_io_failure_reported_once() {
        let mock = MockTransport::new();
        let events = Arc::new(EventLog::default());
        let (tx, rx) = crossbeam_channel::unbounded();
        let mut link =
            SerialLink::start("mock0", Box::new(mock.clone()), rx, None, events.clone()).unwrap();

        mock.disconnect();
        let _ = tx.send(vec![1]);
        assert!(wait_until(|| link.has_failed()));

        link.shutdown();
        assert_eq!(events.errors.lock().len(), 1);
        assert!(!events.closed.load(Ordering::Relaxed));
    }
}
