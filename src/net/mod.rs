/*!
 * Network Module
 * Addresses, peer metadata, the transport capability, and the instrumented boundary
 */

pub mod addr;
pub mod boundary;
pub mod loopback;
pub mod peer;
pub mod transport;

// Re-export for convenience
pub use addr::RemoteAddr;
pub use boundary::NetBoundary;
pub use loopback::{LoopbackStats, LoopbackTransport};
pub use peer::{PeerInfo, PeerTable, UNKNOWN_HOST};
pub use transport::{SockOpt, Transport, SELECT_READABLE, SELECT_WRITABLE};
