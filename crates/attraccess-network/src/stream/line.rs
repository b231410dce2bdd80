//! Line reassembly and classification for the event stream.

use tracing::warn;

/// Longest line kept; anything longer is discarded.
pub const MAX_LINE_LEN: usize = 4096;

/// Collects bytes into lines. `\r` is dropped and `\n` completes a line.
#[derive(Debug, Default)]
pub struct LineBuffer {
    buf: Vec<u8>,
    overflowed: bool,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one byte, returning the completed line on `\n`.
    pub fn push(&mut self, byte: u8) -> Option<String> {
        match byte {
            b'\r' => None,
            b'\n' => {
                let line = String::from_utf8_lossy(&self.buf).into_owned();
                self.buf.clear();
                if std::mem::take(&mut self.overflowed) {
                    warn!(max = MAX_LINE_LEN, "Discarding oversized event stream line");
                    return None;
                }
                Some(line)
            }
            b => {
                if self.buf.len() < MAX_LINE_LEN {
                    self.buf.push(b);
                } else {
                    self.overflowed = true;
                }
                None
            }
        }
    }

    pub fn clear(&mut self) {
        self.buf.clear();
        self.overflowed = false;
    }
}

/// A server-sent events line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventLine<'a> {
    Blank,
    Comment(&'a str),
    Id(&'a str),
    Event(&'a str),
    /// Payload after `data:`, left-trimmed.
    Data(&'a str),
    Other(&'a str),
}

impl<'a> EventLine<'a> {
    pub fn classify(line: &'a str) -> Self {
        if line.is_empty() {
            return Self::Blank;
        }
        if let Some(comment) = line.strip_prefix(':') {
            return Self::Comment(comment);
        }
        if let Some(data) = line.strip_prefix("data:") {
            return Self::Data(data.trim_start());
        }
        if let Some(id) = line.strip_prefix("id:") {
            return Self::Id(id.trim());
        }
        if let Some(event) = line.strip_prefix("event:") {
            return Self::Event(event.trim());
        }
        Self::Other(line)
    }
}
