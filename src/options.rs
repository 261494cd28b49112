//! Options for the event server, connectors and the connection pool
//!
//! Every option struct implements [`Default`] and deserializes with missing
//! fields filled from it, so hosts can embed them in their own config files.

use crate::constants::{
    DEFAULT_BACKOFF_UNIT_MS, DEFAULT_POOL_CAPACITY, MAX_DATAGRAM_SIZE, MAX_FRAME_BUFFER_SIZE,
};
use crate::error::DatagramError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// How many dial attempts a connector makes before giving up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaxReconnects {
    /// Keep dialing until it succeeds.
    Unlimited,
    /// Give up after this many attempts.
    Limited(u32),
}

impl MaxReconnects {
    /// Whether `attempts` dials already used up the budget.
    pub fn exhausted(&self, attempts: u32) -> bool {
        match self {
            MaxReconnects::Unlimited => false,
            MaxReconnects::Limited(max) => attempts >= *max,
        }
    }
}

impl Default for MaxReconnects {
    fn default() -> Self {
        MaxReconnects::Limited(3)
    }
}

/// Negative counts (the historical `-1`) mean unlimited.
impl From<i32> for MaxReconnects {
    fn from(n: i32) -> Self {
        u32::try_from(n)
            .map(MaxReconnects::Limited)
            .unwrap_or(MaxReconnects::Unlimited)
    }
}

impl fmt::Display for MaxReconnects {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MaxReconnects::Unlimited => write!(f, "unlimited"),
            MaxReconnects::Limited(n) => write!(f, "{}", n),
        }
    }
}

impl FromStr for MaxReconnects {
    type Err = DatagramError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("unlimited") {
            return Ok(MaxReconnects::Unlimited);
        }
        s.parse::<i32>()
            .map(MaxReconnects::from)
            .map_err(|_| DatagramError::parse_error(format!("invalid reconnect count: {}", s)))
    }
}

/// Options for [`EventServer`](crate::EventServer).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventServerOptions {
    /// Receive buffer size; datagrams longer than this are truncated by the
    /// kernel. Default: 65457.
    pub recv_buffer_size: usize,
    /// Bytes kept for an event still waiting for its terminator; beyond this
    /// the partial event is dropped. Default: 16 MiB.
    pub max_frame_buffer_size: usize,
}

impl Default for EventServerOptions {
    fn default() -> Self {
        Self {
            recv_buffer_size: MAX_DATAGRAM_SIZE,
            max_frame_buffer_size: MAX_FRAME_BUFFER_SIZE,
        }
    }
}

/// Options for [`Connector`](crate::Connector).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectorOptions {
    /// Dial attempts per reconnect. Default: 3.
    pub max_reconnects: MaxReconnects,
    /// Reconnect delays are Fibonacci multiples of this. Default: 1s.
    pub backoff_unit: Duration,
    /// Upper bound on waiting for a reply. Default: none, `send` waits
    /// until a datagram or a socket error arrives.
    pub reply_timeout: Option<Duration>,
    /// Reply buffer size. Default: 65457.
    pub recv_buffer_size: usize,
}

impl Default for ConnectorOptions {
    fn default() -> Self {
        Self {
            max_reconnects: MaxReconnects::default(),
            backoff_unit: Duration::from_millis(DEFAULT_BACKOFF_UNIT_MS),
            reply_timeout: None,
            recv_buffer_size: MAX_DATAGRAM_SIZE,
        }
    }
}

impl ConnectorOptions {
    /// Default options with the given reconnect budget.
    pub fn with_max_reconnects(max_reconnects: impl Into<MaxReconnects>) -> Self {
        Self {
            max_reconnects: max_reconnects.into(),
            ..Self::default()
        }
    }
}

/// Options for [`ConnectionPool`](crate::ConnectionPool).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolOptions {
    /// Maximum number of connectors, busy or idle. Default: 10.
    pub capacity: usize,
    /// Options for every connector the pool dials.
    pub connector: ConnectorOptions,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_POOL_CAPACITY,
            connector: ConnectorOptions::default(),
        }
    }
}
