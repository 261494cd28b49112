//! Event server: receives OpenSIPS event datagrams and dispatches them

use std::io;
use std::net::SocketAddr;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures_util::FutureExt;
use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::{
    error::{DatagramError, DatagramResult},
    event::DatagramEvent,
    handler::EventHandlers,
    net::resolve,
    options::EventServerOptions,
    protocol::EventFramer,
};

/// Counters shared between a running server and its observers.
#[derive(Debug, Default)]
struct StatsInner {
    datagrams: AtomicU64,
    dispatched: AtomicU64,
    unhandled: AtomicU64,
}

/// Cloneable view on a server's counters, usable while the server runs.
#[derive(Debug, Clone, Default)]
pub struct ServerStats {
    inner: Arc<StatsInner>,
}

impl ServerStats {
    /// Datagrams received, empty ones included.
    pub fn received_datagrams(&self) -> u64 {
        self.inner
            .datagrams
            .load(Ordering::Relaxed)
    }

    /// Events that had at least one handler.
    pub fn dispatched_events(&self) -> u64 {
        self.inner
            .dispatched
            .load(Ordering::Relaxed)
    }

    /// Events dropped because no handler was registered for their name.
    pub fn unhandled_events(&self) -> u64 {
        self.inner
            .unhandled
            .load(Ordering::Relaxed)
    }
}

/// Receives event datagrams on one UDP socket.
///
/// Bytes go through an [`EventFramer`]; every completed event is stamped with
/// the sender address and handed to each handler registered for its name, one
/// spawned task per handler. The receive loop never waits on handlers.
pub struct EventServer {
    socket: UdpSocket,
    framer: EventFramer,
    handlers: EventHandlers,
    options: EventServerOptions,
    stats: ServerStats,
}

impl std::fmt::Debug for EventServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventServer")
            .field("local_addr", &self.local_addr().ok())
            .field("handlers", &self.handlers)
            .field("pending_bytes", &self.framer.pending_len())
            .finish()
    }
}

impl EventServer {
    /// Bind to `address` (e.g. `"0.0.0.0:2020"`) with default options.
    pub async fn bind(address: &str, handlers: EventHandlers) -> DatagramResult<Self> {
        Self::bind_with_options(address, handlers, EventServerOptions::default()).await
    }

    /// Bind to `address` with custom options.
    pub async fn bind_with_options(
        address: &str,
        handlers: EventHandlers,
        options: EventServerOptions,
    ) -> DatagramResult<Self> {
        let addr = resolve(address).await?;
        let socket = UdpSocket::bind(addr)
            .await
            .map_err(|e| {
                warn!("[BIND] Cannot bind event socket {}: {}", addr, e);
                DatagramError::Io(e)
            })?;
        info!("[BIND] Event server bound to {}", socket.local_addr()?);

        Ok(Self {
            socket,
            framer: EventFramer::with_limit(options.max_frame_buffer_size),
            handlers,
            options,
            stats: ServerStats::default(),
        })
    }

    /// Address the socket is bound to.
    pub fn local_addr(&self) -> DatagramResult<SocketAddr> {
        Ok(self
            .socket
            .local_addr()?)
    }

    /// Counters for this server; stays valid after `serve` consumes it.
    pub fn stats(&self) -> ServerStats {
        self.stats
            .clone()
    }

    /// Serve until an unrecoverable socket error.
    pub async fn serve(self) -> DatagramResult<()> {
        self.run(None)
            .await
    }

    /// Serve until `shutdown` is cancelled (returns `Ok`) or an unrecoverable
    /// socket error occurs (returns the error).
    ///
    /// Cancellation interrupts a pending receive, so shutdown never waits on
    /// traffic.
    pub async fn serve_until(self, shutdown: CancellationToken) -> DatagramResult<()> {
        self.run(Some(shutdown))
            .await
    }

    async fn run(mut self, shutdown: Option<CancellationToken>) -> DatagramResult<()> {
        let mut buf = vec![0u8; self.options.recv_buffer_size.max(1)];
        info!("[SERVE] Receiving events on {}", self.socket.local_addr()?);

        loop {
            let received = match &shutdown {
                Some(token) => {
                    tokio::select! {
                        biased;
                        _ = token.cancelled() => {
                            info!("[SERVE] Shutdown requested, event server stopping");
                            return Ok(());
                        }
                        r = self.socket.recv_from(&mut buf) => r,
                    }
                }
                None => {
                    self.socket
                        .recv_from(&mut buf)
                        .await
                }
            };

            match received {
                Ok((n, from)) => {
                    self.stats
                        .inner
                        .datagrams
                        .fetch_add(1, Ordering::Relaxed);
                    if n == 0 {
                        trace!("[RECV] Empty datagram from {}", from);
                        continue;
                    }
                    trace!("[RECV] {} bytes from {}", n, from);
                    self.process_datagram(&buf[..n], from);
                }
                Err(e) if is_transient(&e) => {
                    trace!("[RECV] Transient receive error: {}", e);
                }
                Err(e) => {
                    warn!("[RECV] Event socket failed: {}", e);
                    return Err(DatagramError::Io(e));
                }
            }
        }
    }

    fn process_datagram(&mut self, data: &[u8], from: SocketAddr) {
        for mut event in self
            .framer
            .feed(data)
        {
            event.set_origin(Some(from));
            self.dispatch(event);
        }
    }

    fn dispatch(&self, event: DatagramEvent) {
        let handlers = self
            .handlers
            .handlers_for(event.name());
        if handlers.is_empty() {
            trace!("[DISPATCH] No handler for {}, dropping", event.name());
            self.stats
                .inner
                .unhandled
                .fetch_add(1, Ordering::Relaxed);
            return;
        }

        debug!(
            "[DISPATCH] {} from {:?} to {} handler(s)",
            event.name(),
            event.origin(),
            handlers.len()
        );
        self.stats
            .inner
            .dispatched
            .fetch_add(1, Ordering::Relaxed);

        let event = Arc::new(event);
        for handler in handlers {
            let handler = Arc::clone(handler);
            let event = Arc::clone(&event);
            tokio::spawn(async move {
                let name = event
                    .name()
                    .to_string();
                let run = AssertUnwindSafe(async move {
                    handler
                        .handle(event)
                        .await
                });
                if run
                    .catch_unwind()
                    .await
                    .is_err()
                {
                    warn!("[DISPATCH] Handler for {} panicked", name);
                }
            });
        }
    }
}

/// Receive errors that say nothing about the socket's health.
fn is_transient(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut | io::ErrorKind::Interrupted
    )
}
