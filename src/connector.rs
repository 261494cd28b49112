//! Command connector for the OpenSIPS mi_datagram interface
//!
//! A [`Connector`] owns one connected UDP socket. Each command is one datagram
//! and the next datagram received on that socket is its reply; there is no
//! correlation id, so exchanges on one connector are strictly serialized.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::net::UdpSocket;
use tokio::sync::Mutex;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, trace, warn};

use crate::{
    backoff::FibonacciBackoff,
    error::{DatagramError, DatagramResult},
    net::{resolve, unspecified_for},
    options::{ConnectorOptions, MaxReconnects},
};

/// Socket plus everything touched during one exchange, guarded together.
struct ConnectorState {
    socket: Option<UdpSocket>,
    backoff: FibonacciBackoff,
    recv_buf: Vec<u8>,
}

/// Tears the socket down when dropped while armed.
///
/// Armed from before the command is written until its reply is read, so an
/// exchange that fails or whose future is dropped mid-flight never leaves a
/// late reply queued for the next command.
struct InFlight<'a> {
    connector: &'a Connector,
    state: &'a mut ConnectorState,
    armed: bool,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.connector
                .teardown(self.state);
        }
    }
}

/// One logical connection to the OpenSIPS mi_datagram socket.
///
/// `send` holds the connector's lock for the whole write-then-read cycle, so
/// concurrent callers of the same connector queue up. After a socket error the
/// connector is disconnected and the next `send` redials with Fibonacci
/// backoff.
pub struct Connector {
    remote: String,
    options: ConnectorOptions,
    state: Mutex<ConnectorState>,
    /// Mirrors `state.socket.is_some()` for lock-free checks.
    connected: AtomicBool,
}

impl std::fmt::Debug for Connector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connector")
            .field("remote", &self.remote)
            .field("connected", &self.is_connected())
            .finish()
    }
}

/// Resolve `remote` and open a socket connected to it.
///
/// UDP connect is local bookkeeping only: this succeeds whether or not
/// anything listens on the remote side.
async fn dial(remote: &str) -> DatagramResult<UdpSocket> {
    let addr = resolve(remote).await?;
    let socket = UdpSocket::bind(unspecified_for(&addr)).await?;
    socket
        .connect(addr)
        .await?;
    debug!(
        "[CONNECT] Socket {} connected to {}",
        socket.local_addr()?,
        addr
    );
    Ok(socket)
}

/// Call `dial` until it succeeds or `max` attempts failed, sleeping for the
/// next backoff delay between attempts. Resets `backoff` on success.
async fn retry_dial<T, F, Fut>(
    max: MaxReconnects,
    backoff: &mut FibonacciBackoff,
    mut dial: F,
) -> DatagramResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = DatagramResult<T>>,
{
    let mut attempts = 0;
    while !max.exhausted(attempts) {
        attempts += 1;
        match dial().await {
            Ok(conn) => {
                backoff.reset();
                info!("[CONNECT] Reconnected after {} attempt(s)", attempts);
                return Ok(conn);
            }
            Err(e) => {
                warn!("[CONNECT] Dial attempt {} failed: {}", attempts, e);
                if max.exhausted(attempts) {
                    break;
                }
                let delay = backoff.next_delay();
                debug!("[CONNECT] Next dial attempt in {:?}", delay);
                sleep(delay).await;
            }
        }
    }
    warn!("[CONNECT] Giving up after {} attempt(s)", attempts);
    Err(DatagramError::NotConnected { attempts })
}

impl Connector {
    /// Dial `remote` (e.g. `"127.0.0.1:8020"`) with default options and the
    /// given reconnect budget.
    ///
    /// Fails if the address does not resolve or no local socket can be
    /// opened; an unreachable peer is only noticed on the first `send`.
    pub async fn connect(
        remote: &str,
        max_reconnects: impl Into<MaxReconnects>,
    ) -> DatagramResult<Self> {
        Self::connect_with_options(remote, ConnectorOptions::with_max_reconnects(max_reconnects))
            .await
    }

    /// Dial `remote` with custom options.
    pub async fn connect_with_options(
        remote: &str,
        options: ConnectorOptions,
    ) -> DatagramResult<Self> {
        let socket = dial(remote).await?;
        let state = ConnectorState {
            socket: Some(socket),
            backoff: FibonacciBackoff::new(options.backoff_unit),
            recv_buf: vec![0u8; options.recv_buffer_size.max(1)],
        };

        Ok(Self {
            remote: remote.to_string(),
            options,
            state: Mutex::new(state),
            connected: AtomicBool::new(true),
        })
    }

    /// Send `command` as one datagram and wait for the reply datagram.
    ///
    /// Redials first if the connector is disconnected. Any socket error, or an
    /// elapsed [`reply_timeout`](ConnectorOptions::reply_timeout), closes the
    /// socket and is returned as is; the command is not retried.
    ///
    /// Without a reply timeout this waits until a datagram or a socket error
    /// arrives. Wrap the call in [`tokio::time::timeout`] to bound it; a call
    /// dropped after its command was written closes the socket, so the next
    /// `send` redials instead of reading the stale reply.
    pub async fn send(&self, command: &[u8]) -> DatagramResult<Vec<u8>> {
        let mut state = self
            .state
            .lock()
            .await;
        self.ensure_connected(&mut state)
            .await?;

        let result = self
            .exchange(&mut state, command)
            .await;
        if let Err(e) = &result {
            warn!("[SEND] Exchange with {} failed: {}", self.remote, e);
        }
        result
    }

    async fn ensure_connected(&self, state: &mut ConnectorState) -> DatagramResult<()> {
        if state
            .socket
            .is_some()
        {
            return Ok(());
        }

        debug!("[CONNECT] Reconnecting to {}", self.remote);
        let remote = self
            .remote
            .as_str();
        let socket = retry_dial(self.options.max_reconnects, &mut state.backoff, || {
            dial(remote)
        })
        .await?;
        state.socket = Some(socket);
        self.connected
            .store(true, Ordering::Release);
        Ok(())
    }

    async fn exchange(
        &self,
        state: &mut ConnectorState,
        command: &[u8],
    ) -> DatagramResult<Vec<u8>> {
        let mut in_flight = InFlight {
            connector: self,
            state,
            armed: true,
        };
        let ConnectorState {
            socket, recv_buf, ..
        } = &mut *in_flight.state;
        let socket = socket
            .as_ref()
            .ok_or(DatagramError::NotConnected { attempts: 0 })?;

        socket
            .send(command)
            .await?;
        trace!("[SEND] {} bytes to {}", command.len(), self.remote);

        let n = match self.options.reply_timeout {
            Some(limit) => timeout(limit, socket.recv(recv_buf))
                .await
                .map_err(|_| DatagramError::Timeout {
                    timeout_ms: u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
                })??,
            None => {
                socket
                    .recv(recv_buf)
                    .await?
            }
        };
        trace!("[RECV] {} byte reply from {}", n, self.remote);
        let reply = recv_buf[..n].to_vec();
        in_flight.armed = false;
        Ok(reply)
    }

    fn teardown(&self, state: &mut ConnectorState) {
        if state
            .socket
            .take()
            .is_some()
        {
            debug!("[CONNECT] Closed socket to {}", self.remote);
        }
        self.connected
            .store(false, Ordering::Release);
    }

    /// Close the socket. The next `send` redials.
    pub async fn disconnect(&self) {
        let mut state = self
            .state
            .lock()
            .await;
        self.teardown(&mut state);
    }

    /// Whether the connector currently holds a socket.
    pub fn is_connected(&self) -> bool {
        self.connected
            .load(Ordering::Acquire)
    }

    /// Local address of the socket, `None` while disconnected.
    ///
    /// Waits for an exchange in progress to finish.
    pub async fn local_addr(&self) -> Option<SocketAddr> {
        let state = self
            .state
            .lock()
            .await;
        state
            .socket
            .as_ref()?
            .local_addr()
            .ok()
    }

    /// Remote address as given at construction.
    pub fn remote(&self) -> &str {
        &self.remote
    }
}
