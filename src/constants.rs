//! Protocol constants and configuration defaults

/// Largest datagram OpenSIPS emits or accepts on its datagram interfaces.
///
/// Both the event receive buffer and the reply buffer are sized to this.
pub const MAX_DATAGRAM_SIZE: usize = 65457;

/// Marks the end of one event: an empty line.
pub const EVENT_TERMINATOR: &[u8] = b"\n\n";

/// Separates lines inside an event.
pub const LINE_TERMINATOR: u8 = b'\n';

/// Splits an attribute line into key and value.
pub const ATTRIBUTE_SEPARATOR: &str = "::";

/// Base unit of the reconnect backoff: delays are Fibonacci multiples of this.
pub const DEFAULT_BACKOFF_UNIT_MS: u64 = 1000;

/// Default number of connectors held by a [`ConnectionPool`](crate::ConnectionPool).
pub const DEFAULT_POOL_CAPACITY: usize = 10;

/// Most bytes an [`EventFramer`](crate::EventFramer) holds for one
/// unterminated event (16 MiB) before discarding it.
///
/// Real events fit in one datagram; a buffer this large means the sender
/// stopped emitting boundaries.
pub const MAX_FRAME_BUFFER_SIZE: usize = 16 * 1024 * 1024;
