//! Datagram event framing and parsing
//!
//! OpenSIPS writes each event as a block of newline-terminated lines closed by
//! an empty line. A block may be split over several datagrams and one
//! datagram may carry the tail of one event plus the start of the next, so
//! the framer accumulates bytes and cuts frames at every `"\n\n"`.
//!
//! A datagram without a boundary is never an error: its bytes stay buffered
//! until a later datagram completes the frame. An unterminated event that
//! outgrows the buffer limit is discarded and framing restarts with the next
//! datagram.

use crate::{
    constants::{ATTRIBUTE_SEPARATOR, EVENT_TERMINATOR, LINE_TERMINATOR, MAX_FRAME_BUFFER_SIZE},
    event::DatagramEvent,
};
use tracing::{trace, warn};

/// Accumulating framer for the datagram event stream.
///
/// One framer belongs to one listening socket. After every call the buffer
/// holds only bytes of a not-yet-terminated event, never more than the
/// buffer limit.
#[derive(Debug)]
pub struct EventFramer {
    buffer: Vec<u8>,
    /// Offset where the next boundary search starts. Everything before it was
    /// already scanned and holds no boundary.
    scan_from: usize,
    limit: usize,
}

impl Default for EventFramer {
    fn default() -> Self {
        Self::with_limit(MAX_FRAME_BUFFER_SIZE)
    }
}

impl EventFramer {
    /// Create an empty framer with the default 16 MiB buffer limit.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty framer holding at most `limit` buffered bytes.
    pub fn with_limit(limit: usize) -> Self {
        Self {
            buffer: Vec::new(),
            scan_from: 0,
            limit,
        }
    }

    /// Append received bytes to the frame buffer.
    ///
    /// If the buffered partial event plus `data` would exceed the limit, the
    /// partial event is dropped first; `data` may start a fresh event. Data
    /// larger than the limit on its own is dropped too.
    pub fn add_data(&mut self, data: &[u8]) {
        if self
            .buffer
            .len()
            + data.len()
            > self.limit
        {
            warn!(
                "[FRAME] No event boundary within {} bytes, discarding {} buffered byte(s)",
                self.limit,
                self.buffer
                    .len()
            );
            self.clear();
            if data.len() > self.limit {
                warn!("[FRAME] Discarding oversized {} byte datagram", data.len());
                return;
            }
        }
        self.buffer
            .extend_from_slice(data);
    }

    /// Cut and parse the next complete frame, if the buffer holds one.
    ///
    /// The consumed frame, boundary included, is removed from the buffer and
    /// whatever followed it stays buffered as the start of the next event.
    pub fn next_event(&mut self) -> Option<DatagramEvent> {
        let start = self.scan_from;
        let Some(pos) = find_terminator(&self.buffer[start..]) else {
            // The last byte may be the first half of a split terminator.
            self.scan_from = self
                .buffer
                .len()
                .saturating_sub(EVENT_TERMINATOR.len() - 1);
            return None;
        };

        let end = start + pos + EVENT_TERMINATOR.len();
        let rest = self
            .buffer
            .split_off(end);
        let frame = std::mem::replace(&mut self.buffer, rest);
        self.scan_from = 0;

        let event = parse_frame(&frame);
        trace!(
            "[FRAME] Parsed event {} ({} bytes, {} buffered)",
            event.name(),
            frame.len(),
            self.buffer
                .len()
        );
        Some(event)
    }

    /// Append `data` and return every event it completes, in stream order.
    ///
    /// Usually zero or one event; a datagram carrying several terminated
    /// events yields all of them.
    pub fn feed(&mut self, data: &[u8]) -> Vec<DatagramEvent> {
        self.add_data(data);
        let mut events = Vec::new();
        while let Some(event) = self.next_event() {
            events.push(event);
        }
        events
    }

    /// Bytes buffered for the event currently being accumulated.
    pub fn pending_len(&self) -> usize {
        self.buffer
            .len()
    }

    /// Drop any partially accumulated event.
    pub fn clear(&mut self) {
        self.buffer
            .clear();
        self.scan_from = 0;
    }
}

fn find_terminator(haystack: &[u8]) -> Option<usize> {
    haystack
        .windows(EVENT_TERMINATOR.len())
        .position(|w| w == EVENT_TERMINATOR)
}

/// Parse one complete frame (ending in the terminator) into an event.
///
/// Invalid UTF-8 is replaced rather than rejected so one bad byte cannot stop
/// the receive loop.
fn parse_frame(frame: &[u8]) -> DatagramEvent {
    let text = String::from_utf8_lossy(frame);
    let mut lines = text.split(LINE_TERMINATOR as char);

    let mut event = DatagramEvent::new(
        lines
            .next()
            .unwrap_or_default(),
    );

    for line in lines {
        if line.is_empty() {
            break;
        }
        match line.split_once(ATTRIBUTE_SEPARATOR) {
            Some((key, value)) => event.set_attribute(key, value),
            None => event.push_value(line),
        }
    }

    event
}
