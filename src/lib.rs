//! OpenSIPS datagram interfaces for Rust
//!
//! This crate talks to OpenSIPS over its two UDP management interfaces:
//! it receives the notifications `event_datagram` sends to subscribers, and it
//! sends `mi_datagram` commands and returns their raw replies.
//!
//! # Architecture
//!
//! - [`EventServer`] binds a UDP socket, frames the byte stream into
//!   [`DatagramEvent`]s and hands each event to the [`EventHandlers`]
//!   registered for its name, one spawned task per handler.
//! - [`Connector`] owns one connected UDP socket, serializes command/reply
//!   exchanges on it and redials with Fibonacci backoff after socket errors.
//! - [`ConnectionPool`] lends out up to `capacity` connectors so independent
//!   commands run in parallel.
//!
//! # Examples
//!
//! ## Receiving events
//!
//! ```rust,no_run
//! use opensips_datagram::{DatagramError, EventHandlers, EventName, EventServer};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), DatagramError> {
//!     let handlers = EventHandlers::new().on(EventName::AccCdr, |event| async move {
//!         println!(
//!             "{} {} from {:?}",
//!             event.attribute("method").unwrap_or("?"),
//!             event.attribute("sip_code").unwrap_or("?"),
//!             event.origin()
//!         );
//!     });
//!
//!     let server = EventServer::bind("0.0.0.0:2020", handlers).await?;
//!     let shutdown = CancellationToken::new();
//!     server.serve_until(shutdown).await
//! }
//! ```
//!
//! Subscribe OpenSIPS to the server with the `event_subscribe` MI command,
//! e.g. `:event_subscribe:\nE_ACC_CDR\nudp:127.0.0.1:2020\n`.
//!
//! ## Sending commands
//!
//! ```rust,no_run
//! use opensips_datagram::{ConnectionPool, DatagramError, MaxReconnects};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), DatagramError> {
//!     let pool = ConnectionPool::new("127.0.0.1:8020", MaxReconnects::Limited(3), 4).await?;
//!
//!     let reply = pool.send(b":uptime:\n").await?;
//!     println!("{}", String::from_utf8_lossy(&reply));
//!     Ok(())
//! }
//! ```
//!
//! # Event wire format
//!
//! ```text
//! E_ACC_CDR
//! method::INVITE
//! sip_code::200
//!
//! ```
//!
//! The first line is the event name, `key::value` lines become attributes,
//! other non-empty lines become positional values, and an empty line ends the
//! event. See [`EventFramer`] for how datagram boundaries are handled.

#[macro_use]
mod macros;

pub mod backoff;
pub mod connector;
pub mod constants;
pub mod error;
pub mod event;
pub mod handler;
pub mod listener;
pub mod names;
pub mod options;
pub mod pool;
pub mod protocol;

pub(crate) mod net;

pub use backoff::FibonacciBackoff;
pub use connector::Connector;
pub use constants::MAX_DATAGRAM_SIZE;
pub use error::{DatagramError, DatagramResult};
pub use event::DatagramEvent;
pub use handler::{EventHandler, EventHandlers};
pub use listener::{EventServer, ServerStats};
pub use names::{EventName, ParseEventNameError};
pub use options::{ConnectorOptions, EventServerOptions, MaxReconnects, PoolOptions};
pub use pool::{ConnectionPool, PooledConnector};
pub use protocol::EventFramer;
