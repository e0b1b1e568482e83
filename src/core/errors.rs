/*!
 * Error Types
 * Centralized error handling with thiserror, miette, and serde support
 */

use crate::core::types::SockFd;
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Boundary operation errors with rich context
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Diagnostic)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
#[non_exhaustive]
pub enum NetError {
    /// Invalid argument provided to a boundary operation
    #[error("Invalid argument: {0}")]
    #[diagnostic(
        code(net::invalid_argument),
        help("Check descriptor counts, buffer ranges, and flag buffer sizes.")
    )]
    InvalidArgument(String),

    /// Descriptor does not name an open socket
    #[error("Bad socket descriptor: {0}")]
    #[diagnostic(
        code(net::bad_descriptor),
        help("The socket may have been closed or never opened.")
    )]
    BadDescriptor(SockFd),

    /// Remote endpoint refused the connection
    #[error("Connection refused: {0}")]
    #[diagnostic(
        code(net::connection_refused),
        help("No listener is bound at the destination port.")
    )]
    ConnectionRefused(String),

    /// Operation requires a connected socket
    #[error("Socket {0} is not connected")]
    #[diagnostic(
        code(net::not_connected),
        help("Connect the socket before streaming data on it.")
    )]
    NotConnected(SockFd),

    /// Local address is already bound
    #[error("Address already in use: {0}")]
    #[diagnostic(
        code(net::addr_in_use),
        help("Another socket is bound to this port. Close it or pick another port.")
    )]
    AddrInUse(String),

    /// Operation exceeded its deadline
    #[error("Operation timed out after {0}ms")]
    #[diagnostic(
        code(net::timed_out),
        help("The peer did not respond within the allowed time.")
    )]
    TimedOut(u64),

    /// Non-blocking operation found no data or space
    #[error("Operation would block")]
    #[diagnostic(
        code(net::would_block),
        help("Retry after select reports the descriptor ready.")
    )]
    WouldBlock,

    /// Operation is not valid for this socket type
    #[error("Unsupported operation: {0}")]
    #[diagnostic(
        code(net::unsupported),
        help("Stream and datagram sockets accept different operations.")
    )]
    Unsupported(String),

    /// Underlying I/O failure
    #[error("I/O error: {0}")]
    #[diagnostic(code(net::io), help("See the wrapped message for the OS-level cause."))]
    Io(String),
}

impl NetError {
    /// Create an invalid argument error
    #[inline]
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Create a connection refused error
    #[inline]
    pub fn connection_refused(msg: impl Into<String>) -> Self {
        Self::ConnectionRefused(msg.into())
    }

    /// Create an address-in-use error
    #[inline]
    pub fn addr_in_use(msg: impl Into<String>) -> Self {
        Self::AddrInUse(msg.into())
    }

    /// Create an unsupported operation error
    #[inline]
    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported(msg.into())
    }

    /// Create an I/O error
    #[inline]
    pub fn io(msg: impl Into<String>) -> Self {
        Self::Io(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        assert_eq!(
            NetError::invalid_argument("negative count").to_string(),
            "Invalid argument: negative count"
        );
        assert_eq!(
            NetError::BadDescriptor(1007).to_string(),
            "Bad socket descriptor: 1007"
        );
        assert_eq!(NetError::WouldBlock.to_string(), "Operation would block");
    }

    #[test]
    fn test_serde_tagging() {
        let err = NetError::connection_refused("10.0.0.1:443");
        let json = serde_json::to_string(&err).unwrap();
        assert!(json.contains("\"error_type\":\"connection_refused\""));
        let back: NetError = serde_json::from_str(&json).unwrap();
        assert_eq!(back, err);
    }
}
