/*!
 * Transport Capability
 * The socket primitives the boundary layer delegates to
 */

use crate::core::types::{NetResult, Port, SockFd};
use crate::net::addr::RemoteAddr;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::time::Duration;

/// Readiness bit set for a descriptor in the read set.
pub const SELECT_READABLE: i32 = 1;
/// Readiness bit set for a descriptor in the write set.
pub const SELECT_WRITABLE: i32 = 2;

/// Socket option keys.
///
/// A typed subset of the classic integer option constants; transports map
/// them onto whatever the OS expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SockOpt {
    ReuseAddr,
    KeepAlive,
    TcpNoDelay,
    Broadcast,
    SendBufferSize,
    RecvBufferSize,
    Linger,
    RecvTimeoutMs,
}

/// The underlying socket primitives.
///
/// One method per native primitive, with OS-socket-call semantics: blocking
/// unless stated otherwise, [`crate::NetError`] on OS-level failure. The
/// boundary layer forwards to this trait and never reinterprets its errors.
pub trait Transport: Send + Sync {
    /// Allocate a descriptor for a stream (`true`) or datagram (`false`) socket.
    fn open_socket(&self, stream: bool) -> NetResult<SockFd>;

    /// Bind a socket to a local port. Port 0 requests an ephemeral port.
    fn bind(&self, fd: SockFd, addr: &RemoteAddr, port: Port) -> NetResult<()>;

    /// Mark a bound stream socket as accepting connections.
    fn listen(&self, fd: SockFd, backlog: u32) -> NetResult<()>;

    /// Accept one pending connection. `WouldBlock` when none is queued.
    fn accept(&self, fd: SockFd) -> NetResult<(SockFd, RemoteAddr)>;

    /// Blocking connect. `Duration::ZERO` means no timeout.
    fn connect(&self, fd: SockFd, addr: &RemoteAddr, port: Port, timeout: Duration)
        -> NetResult<()>;

    /// Begin a connect without blocking. Returns `true` when the connection
    /// completed immediately, `false` when it is still pending.
    fn connect_nonblocking(&self, fd: SockFd, addr: &RemoteAddr, port: Port) -> NetResult<bool>;

    /// Probe whether a pending connect has completed.
    fn is_connected(&self, fd: SockFd, timeout: Duration) -> NetResult<bool>;

    /// Dissolve a datagram socket's default peer.
    fn disconnect_datagram(&self, fd: SockFd) -> NetResult<()>;

    /// Read stream bytes into `buf`, returning the count read.
    fn read(&self, fd: SockFd, buf: &mut [u8]) -> NetResult<usize>;

    /// Receive a datagram into `buf`, returning the count and sender.
    /// `peek` leaves the datagram queued; `connected` restricts to the
    /// default peer.
    fn recv_from(
        &self,
        fd: SockFd,
        buf: &mut [u8],
        peek: bool,
        connected: bool,
    ) -> NetResult<(usize, Option<RemoteAddr>)>;

    /// Send a datagram to a destination, returning the byte count sent.
    fn send_to(&self, fd: SockFd, data: &[u8], port: Port, addr: &RemoteAddr) -> NetResult<usize>;

    /// Out-of-band single-byte send. Fire-and-forget by contract.
    fn send_urgent(&self, fd: SockFd, value: u8);

    /// Write stream bytes, returning the count written.
    fn write(&self, fd: SockFd, data: &[u8]) -> NetResult<usize>;

    /// Wait for readiness on the given descriptor sets, writing
    /// [`SELECT_READABLE`]/[`SELECT_WRITABLE`] bits into `flags` (read set
    /// first, then write set). `None` timeout blocks indefinitely. Returns
    /// whether any descriptor is ready.
    fn select(
        &self,
        read_fds: &[SockFd],
        write_fds: &[SockFd],
        timeout: Option<Duration>,
        flags: &mut [i32],
    ) -> NetResult<bool>;

    /// Shut down the read half of a socket.
    fn shutdown_input(&self, fd: SockFd) -> NetResult<()>;

    /// Shut down the write half of a socket.
    fn shutdown_output(&self, fd: SockFd) -> NetResult<()>;

    /// Close a socket and release its descriptor.
    fn close(&self, fd: SockFd) -> NetResult<()>;

    /// Read a socket option.
    fn get_option(&self, fd: SockFd, opt: SockOpt) -> NetResult<i32>;

    /// Set a socket option.
    fn set_option(&self, fd: SockFd, opt: SockOpt, value: i32) -> NetResult<()>;

    /// Local address the socket is bound to, if any.
    fn local_ip(&self, fd: SockFd) -> NetResult<Option<IpAddr>>;

    /// Local port the socket is bound to; 0 when unbound.
    fn local_port(&self, fd: SockFd) -> NetResult<Port>;
}
