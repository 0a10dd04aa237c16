//! Delimiter-based message splitting for the device byte stream
//!
//! The firmware terminates every message with `\t\n`. Serial reads arrive in
//! arbitrary chunks, so a message may straddle several reads and one read may
//! carry several messages.

/// Two-byte message terminator emitted by the firmware
pub const DELIMITER: [u8; 2] = [b'\t', b'\n'];

/// Bytes tolerated without seeing a delimiter before the buffer is dropped
pub const MAX_PENDING: usize = 4096;

/// Accumulates raw serial bytes and yields complete messages
#[derive(Debug, Default)]
pub struct MessageSplitter {
    buffer: Vec<u8>,
}

impl MessageSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and return every message it completes, delimiter removed
    ///
    /// Empty messages (back-to-back delimiters) are skipped.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Vec<u8>> {
        self.buffer.extend_from_slice(chunk);

        let mut messages = Vec::new();
        let mut start = 0;
        while let Some(offset) = find_delimiter(&self.buffer[start..]) {
            let end = start + offset;
            if end > start {
                messages.push(self.buffer[start..end].to_vec());
            }
            start = end + DELIMITER.len();
        }
        self.buffer.drain(..start);

        if self.buffer.len() > MAX_PENDING {
            log::warn!(
                "Discarding {} bytes received without a message delimiter",
                self.buffer.len() - 1
            );
            // Keep the last byte in case it is the first half of the delimiter
            let keep_from = self.buffer.len() - 1;
            self.buffer.drain(..keep_from);
        }

        messages
    }

    /// Bytes held back waiting for a delimiter
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }
}

fn find_delimiter(data: &[u8]) -> Option<usize> {
    data.windows(DELIMITER.len()).position(|w| w == DELIMITER)
}
