//! Bounded pool of mi_datagram connectors

use std::ops::Deref;
use std::sync::{Arc, PoisonError};

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, trace};

use crate::{
    connector::Connector,
    error::{DatagramError, DatagramResult},
    net::resolve,
    options::{ConnectorOptions, MaxReconnects, PoolOptions},
};

struct PoolInner {
    remote: String,
    options: PoolOptions,
    /// One permit per slot; a borrower holds one until release.
    permits: Arc<Semaphore>,
    /// Idle, connected connectors. A permit without an idle connector is an
    /// empty slot that gets a freshly dialed connector on borrow.
    idle: std::sync::Mutex<Vec<Connector>>,
}

impl PoolInner {
    fn pop_idle(&self) -> Option<Connector> {
        self.idle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop()
    }

    fn give_back(&self, connector: Connector) {
        if connector.is_connected() {
            self.idle
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(connector);
            trace!("[POOL] Connector returned to {}", self.remote);
        } else {
            debug!(
                "[POOL] Discarding disconnected connector to {}, slot stays open",
                self.remote
            );
        }
    }
}

/// Fixed-capacity pool of [`Connector`]s to one mi_datagram address.
///
/// At most `capacity` connectors exist at once and each is lent to one
/// borrower at a time; borrowers beyond capacity wait for a release. Slots
/// start empty and are dialed on first borrow. A connector that comes back
/// disconnected is dropped and its slot is dialed again by a later borrow, so
/// failures never shrink the pool.
///
/// Cloning is cheap; clones share the same slots.
#[derive(Clone, Default)]
pub struct ConnectionPool {
    inner: Option<Arc<PoolInner>>,
}

impl std::fmt::Debug for ConnectionPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.inner {
            Some(inner) => f
                .debug_struct("ConnectionPool")
                .field("remote", &inner.remote)
                .field("capacity", &inner.options.capacity)
                .field("available", &self.available())
                .finish(),
            None => f.write_str("ConnectionPool(unconfigured)"),
        }
    }
}

impl ConnectionPool {
    /// Pool of `capacity` connectors to `remote`, each with `max_reconnects`.
    pub async fn new(
        remote: &str,
        max_reconnects: impl Into<MaxReconnects>,
        capacity: usize,
    ) -> DatagramResult<Self> {
        Self::with_options(
            remote,
            PoolOptions {
                capacity,
                connector: ConnectorOptions::with_max_reconnects(max_reconnects),
            },
        )
        .await
    }

    /// Pool with custom options.
    ///
    /// The address is resolved once up front so a typo fails here rather than
    /// on the first command. Zero capacity is rejected.
    pub async fn with_options(remote: &str, options: PoolOptions) -> DatagramResult<Self> {
        if options.capacity == 0 {
            return Err(DatagramError::UnconfiguredPool);
        }
        resolve(remote).await?;
        debug!(
            "[POOL] {} slot(s) for {}",
            options.capacity, remote
        );

        Ok(Self {
            inner: Some(Arc::new(PoolInner {
                remote: remote.to_string(),
                permits: Arc::new(Semaphore::new(options.capacity)),
                idle: std::sync::Mutex::new(Vec::with_capacity(options.capacity)),
                options,
            })),
        })
    }

    /// A pool with no remote. Every operation fails with
    /// [`DatagramError::UnconfiguredPool`].
    pub fn unconfigured() -> Self {
        Self::default()
    }

    fn inner(&self) -> DatagramResult<&Arc<PoolInner>> {
        self.inner
            .as_ref()
            .ok_or(DatagramError::UnconfiguredPool)
    }

    /// Take a connector, waiting while all slots are lent out.
    ///
    /// An empty slot is filled by dialing a new connector; if that fails the
    /// slot is released again and the error returned.
    pub async fn borrow(&self) -> DatagramResult<PooledConnector> {
        let inner = self.inner()?;
        let permit = Arc::clone(&inner.permits)
            .acquire_owned()
            .await
            .map_err(|_| DatagramError::UnconfiguredPool)?;

        let connector = match inner.pop_idle() {
            Some(connector) => connector,
            None => {
                debug!("[POOL] Filling empty slot for {}", inner.remote);
                Connector::connect_with_options(&inner.remote, inner.options.connector.clone())
                    .await?
            }
        };

        Ok(PooledConnector {
            connector: Some(connector),
            pool: Arc::clone(inner),
            _permit: permit,
        })
    }

    /// Return a borrowed connector. Same as dropping it.
    pub fn release(&self, connector: PooledConnector) {
        drop(connector);
    }

    /// Send `command` on a pooled connector and return the reply datagram.
    ///
    /// The connector goes back to the pool whether or not the exchange
    /// succeeded; a failed one is replaced on a later borrow.
    pub async fn send(&self, command: &[u8]) -> DatagramResult<Vec<u8>> {
        let connector = self
            .borrow()
            .await?;
        let result = connector
            .send(command)
            .await;
        self.release(connector);
        result
    }

    /// Configured number of slots, 0 when unconfigured.
    pub fn capacity(&self) -> usize {
        self.inner
            .as_ref()
            .map_or(0, |i| i.options.capacity)
    }

    /// Slots not lent out right now.
    pub fn available(&self) -> usize {
        self.inner
            .as_ref()
            .map_or(0, |i| {
                i.permits
                    .available_permits()
            })
    }

    /// Connected connectors waiting in the pool.
    pub fn idle_connectors(&self) -> usize {
        self.inner
            .as_ref()
            .map_or(0, |i| {
                i.idle
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .len()
            })
    }
}

/// A connector lent out by a [`ConnectionPool`].
///
/// Dereferences to [`Connector`]. Dropping it returns the connector to the
/// pool if still connected and frees the slot either way.
pub struct PooledConnector {
    connector: Option<Connector>,
    pool: Arc<PoolInner>,
    // Dropped after `Drop::drop` has put the connector back.
    _permit: OwnedSemaphorePermit,
}

impl std::fmt::Debug for PooledConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("PooledConnector")
            .field(&self.connector)
            .finish()
    }
}

impl Deref for PooledConnector {
    type Target = Connector;

    fn deref(&self) -> &Connector {
        // Only `Drop` takes the connector out.
        self.connector
            .as_ref()
            .expect("pooled connector used after release")
    }
}

impl Drop for PooledConnector {
    fn drop(&mut self) {
        if let Some(connector) = self
            .connector
            .take()
        {
            self.pool
                .give_back(connector);
        }
    }
}
