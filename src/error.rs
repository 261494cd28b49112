//! Error types for the datagram event server and command connectors

use thiserror::Error;

/// Errors produced by the event server, connectors and the connection pool.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DatagramError {
    /// The address is malformed or did not resolve to any socket address.
    #[error("cannot resolve address '{address}': {reason}")]
    AddressResolution {
        /// Address as given by the caller.
        address: String,
        /// Resolver failure, or a note that no address was returned.
        reason: String,
    },

    /// Bind, dial, read or write failure on a UDP socket.
    #[error("socket error: {0}")]
    Io(#[from] std::io::Error),

    /// A name or option value could not be parsed.
    #[error("parse error: {message}")]
    Parse {
        /// What went wrong.
        message: String,
    },

    /// The connector gave up after exhausting its reconnect budget.
    #[error("not connected after {attempts} reconnect attempt(s)")]
    NotConnected {
        /// Dial attempts made before giving up.
        attempts: u32,
    },

    /// The pool has no remote address or zero capacity.
    #[error("connection pool is not configured")]
    UnconfiguredPool,

    /// No reply arrived within the configured reply timeout.
    #[error("no reply within {timeout_ms}ms")]
    Timeout {
        /// Configured timeout.
        timeout_ms: u64,
    },
}

impl DatagramError {
    pub(crate) fn parse_error(message: impl Into<String>) -> Self {
        DatagramError::Parse {
            message: message.into(),
        }
    }

    pub(crate) fn resolution(address: impl Into<String>, reason: impl ToString) -> Self {
        DatagramError::AddressResolution {
            address: address.into(),
            reason: reason.to_string(),
        }
    }

    /// `true` for failures the next [`Connector::send`](crate::Connector::send)
    /// can recover from by reconnecting.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            DatagramError::Io(_) | DatagramError::Timeout { .. } | DatagramError::NotConnected { .. }
        )
    }
}

/// Result alias used throughout the crate.
pub type DatagramResult<T> = Result<T, DatagramError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages() {
        let err = DatagramError::resolution("nohost:99999", "invalid port value");
        assert_eq!(
            err.to_string(),
            "cannot resolve address 'nohost:99999': invalid port value"
        );
        assert_eq!(
            DatagramError::NotConnected { attempts: 3 }.to_string(),
            "not connected after 3 reconnect attempt(s)"
        );
        assert_eq!(
            DatagramError::UnconfiguredPool.to_string(),
            "connection pool is not configured"
        );
    }

    #[test]
    fn io_converts_and_is_transport() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let err: DatagramError = io.into();
        assert!(matches!(err, DatagramError::Io(_)));
        assert!(err.is_transport());
        assert!(!DatagramError::UnconfiguredPool.is_transport());
        assert!(!DatagramError::parse_error("x").is_transport());
    }
}
