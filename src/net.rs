//! Address resolution shared by the server and the connectors

use crate::error::{DatagramError, DatagramResult};
use std::net::SocketAddr;
use tokio::net::lookup_host;

/// Resolve `host:port` to one socket address, preferring IPv4 the way the
/// OpenSIPS datagram sockets are usually bound.
pub(crate) async fn resolve(address: &str) -> DatagramResult<SocketAddr> {
    let addrs: Vec<SocketAddr> = lookup_host(address)
        .await
        .map_err(|e| DatagramError::resolution(address, e))?
        .collect();

    addrs
        .iter()
        .find(|a| a.is_ipv4())
        .or_else(|| addrs.first())
        .copied()
        .ok_or_else(|| DatagramError::resolution(address, "no addresses returned"))
}

/// Wildcard local address of the same family as `remote`.
pub(crate) fn unspecified_for(remote: &SocketAddr) -> SocketAddr {
    match remote {
        SocketAddr::V4(_) => SocketAddr::from(([0, 0, 0, 0], 0)),
        SocketAddr::V6(_) => SocketAddr::from(([0u16; 8], 0)),
    }
}
