//! Transport error types.
//!
//! Fatal-at-startup conditions (socket creation, bind, group join) surface
//! here. Steady-state receive timeouts and per-round recovery failures are
//! not errors: the receiver reports an empty batch and the rerequester
//! degrades to a partial result, both by contract.

use std::net::SocketAddr;
use thiserror::Error;

/// Main transport error type.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Socket-level I/O failure during setup
    #[error("I/O error: {message}: {source}")]
    Io {
        message: String,
        #[source]
        source: std::io::Error,
    },

    /// Multicast group membership failure
    #[error("Multicast join failed for group {group} on interface {interface}: {source}")]
    Join {
        group: std::net::Ipv4Addr,
        interface: std::net::Ipv4Addr,
        #[source]
        source: std::io::Error,
    },

    /// Endpoint configuration is unusable
    #[error("Configuration error: {message} (endpoint: {endpoint:?})")]
    Configuration {
        message: String,
        endpoint: Option<SocketAddr>,
    },
}

/// Result type alias for transport operations.
pub type Result<T> = std::result::Result<T, TransportError>;

impl TransportError {
    pub fn io(message: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            message: message.into(),
            source,
        }
    }

    pub fn configuration(message: impl Into<String>, endpoint: Option<SocketAddr>) -> Self {
        Self::Configuration {
            message: message.into(),
            endpoint,
        }
    }
}
