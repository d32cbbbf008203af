//! Partial-line buffering for the status pipe.

use memchr::memchr;
use tracing::warn;

/// Longest status line kept, in bytes. Longer lines are dropped whole.
pub const MAX_LINE_LEN: usize = 64 * 1024;

/// Accumulates raw chunks and hands out complete lines only.
///
/// A line longer than [`MAX_LINE_LEN`] is discarded up to and including
/// its terminating newline; the lines around it are unaffected.
#[derive(Debug, Default)]
pub struct LineBuffer {
    buf: Vec<u8>,
    discarding: bool,
}

impl LineBuffer {
    /// Creates an empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a chunk read from the pipe.
    pub fn push(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    /// Returns the next complete line without its terminator.
    pub fn next_line(&mut self) -> Option<String> {
        loop {
            let Some(pos) = memchr(b'\n', &self.buf) else {
                if self.buf.len() > MAX_LINE_LEN {
                    warn!(len = self.buf.len(), "discarding overlong status line");
                    self.buf.clear();
                    self.discarding = true;
                }
                return None;
            };

            let line: Vec<u8> = self.buf.drain(..=pos).collect();
            if self.discarding {
                self.discarding = false;
                continue;
            }
            if line.len() > MAX_LINE_LEN + 1 {
                warn!(len = line.len(), "discarding overlong status line");
                continue;
            }
            return Some(decode(&line[..line.len() - 1]));
        }
    }

    /// Returns the unterminated tail at end of stream, if any.
    pub fn finish(&mut self) -> Option<String> {
        let tail = std::mem::take(&mut self.buf);
        let discarding = std::mem::replace(&mut self.discarding, false);
        if tail.is_empty() || discarding || tail.len() > MAX_LINE_LEN {
            return None;
        }
        Some(decode(&tail))
    }
}

fn decode(bytes: &[u8]) -> String {
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    String::from_utf8_lossy(bytes).into_owned()
}
