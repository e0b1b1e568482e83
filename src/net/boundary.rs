/*!
 * Instrumented Boundary
 * Socket façade that tags and audits data crossing the network boundary
 */

use crate::audit::{AuditSink, BoundaryEvent, LeakSink, TransportKind};
use crate::core::encoding::{flatten_lines, to_hex};
use crate::core::errors::NetError;
use crate::core::types::{NetResult, Port, SockFd};
use crate::net::addr::RemoteAddr;
use crate::net::peer::PeerTable;
use crate::net::transport::{SockOpt, Transport};
use crate::taint::{Tag, TagResolver};
use log::trace;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

/// Instrumented socket façade.
///
/// Wraps each data-crossing transport call with provenance-tag resolution and
/// audit emission, then forwards to the transport unchanged: callers observe
/// the exact success/error behavior of the unwrapped call, plus a side-channel
/// audit stream. Events are emitted before delegation, so a failed connect or
/// send still leaves a record of the attempt.
pub struct NetBoundary {
    transport: Arc<dyn Transport>,
    tags: Arc<dyn TagResolver>,
    sink: Arc<dyn AuditSink>,
    peers: PeerTable,
}

impl NetBoundary {
    #[must_use]
    pub fn new(
        transport: Arc<dyn Transport>,
        tags: Arc<dyn TagResolver>,
        sink: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            transport,
            tags,
            sink,
            peers: PeerTable::new(),
        }
    }

    /// The per-descriptor destination table.
    #[must_use]
    pub fn peers(&self) -> &PeerTable {
        &self.peers
    }

    /// Emit the single record for an outbound payload: a leak when tagged,
    /// a plain send otherwise.
    ///
    /// The tagged path decodes the payload to text and flattens line breaks
    /// before hex encoding; the clear path hex-encodes the raw bytes as-is,
    /// so the record reproduces the exact bytes sent.
    fn emit_outbound(
        &self,
        host: &str,
        port: Port,
        payload: &[u8],
        tag: Tag,
        transport: Option<TransportKind>,
        urgent: bool,
    ) {
        let event = if !tag.is_clear() {
            let flattened = flatten_lines(&String::from_utf8_lossy(payload));
            BoundaryEvent::DataLeaked {
                sink: LeakSink::Network,
                host: host.to_string(),
                port,
                tag: tag.to_hex(),
                data: to_hex(flattened.as_bytes()),
            }
        } else if urgent {
            BoundaryEvent::UrgentDataSent {
                host: host.to_string(),
                port,
                data: to_hex(payload),
            }
        } else {
            BoundaryEvent::DataSent {
                host: host.to_string(),
                port,
                data: to_hex(payload),
                transport,
            }
        };
        self.sink.emit(event);
    }

    // ========================================================================
    // Instrumented operations
    // ========================================================================

    /// Blocking connect. `Duration::ZERO` means no timeout.
    ///
    /// When the destination carries a resolvable host name, the descriptor's
    /// peer metadata is updated and a connection record emitted before the
    /// delegate runs; the record describes the attempt, not a confirmed
    /// connection.
    pub fn connect(
        &self,
        fd: SockFd,
        addr: &RemoteAddr,
        port: Port,
        timeout: Duration,
    ) -> NetResult<()> {
        if let Some(host) = addr.hostname() {
            self.peers.record(fd, host, port);
            self.sink.emit(BoundaryEvent::ConnectionOpened {
                host: host.to_string(),
                port,
                socket: fd,
            });
        }
        self.transport.connect(fd, addr, port, timeout)
    }

    /// Non-blocking connect; returns `true` when the connection completed
    /// immediately. Records the textual address rather than a resolved name.
    pub fn connect_nonblocking(
        &self,
        fd: SockFd,
        addr: &RemoteAddr,
        port: Port,
    ) -> NetResult<bool> {
        let host = addr.ip().to_string();
        self.peers.record(fd, &host, port);
        self.sink.emit(BoundaryEvent::ConnectionOpened {
            host,
            port,
            socket: fd,
        });
        self.transport.connect_nonblocking(fd, addr, port)
    }

    /// Datagram send of `data[offset..offset + length]`.
    ///
    /// Overwrites the descriptor's peer metadata with the destination, then
    /// emits exactly one record: a leak when the buffer's tag is set, a plain
    /// datagram send otherwise.
    pub fn send_to(
        &self,
        fd: SockFd,
        data: &[u8],
        offset: usize,
        length: usize,
        port: Port,
        addr: &RemoteAddr,
    ) -> NetResult<usize> {
        let slice = checked_slice(data, offset, length)?;
        let host = addr.display_host();
        self.peers.record(fd, &host, port);

        let tag = self.tags.tag_of(data);
        self.emit_outbound(
            &host,
            port,
            slice,
            tag,
            Some(TransportKind::Datagram),
            false,
        );
        self.transport.send_to(fd, slice, port, addr)
    }

    /// Out-of-band single-byte send. Never fails: the destination falls back
    /// to the unknown placeholder when the descriptor has no recorded peer,
    /// and the delegate has no failure mode.
    pub fn send_urgent(&self, fd: SockFd, value: u8) {
        let peer = self.peers.lookup(fd);
        let payload = value.to_string();
        let tag = self.tags.tag_of_byte(value);
        self.emit_outbound(&peer.host, peer.port, payload.as_bytes(), tag, None, true);
        self.transport.send_urgent(fd, value);
    }

    /// Stream write of `data[offset..offset + count]`.
    ///
    /// The destination comes only from the descriptor's recorded peer
    /// metadata (unknown placeholder when absent); the plain-send record
    /// carries no transport field.
    pub fn write(
        &self,
        fd: SockFd,
        data: &[u8],
        offset: usize,
        count: usize,
    ) -> NetResult<usize> {
        let slice = checked_slice(data, offset, count)?;
        let peer = self.peers.lookup(fd);

        let tag = self.tags.tag_of(data);
        self.emit_outbound(&peer.host, peer.port, slice, tag, None, false);
        self.transport.write(fd, slice)
    }

    /// Wait for readiness on the first `num_readable` read descriptors and
    /// `num_writable` write descriptors.
    ///
    /// Negative counts fail fast with no delegate call and no record. When
    /// both counts are zero there is nothing to wait on and the call succeeds
    /// immediately without delegating. `None` blocks indefinitely, per the
    /// underlying primitive's convention.
    pub fn select(
        &self,
        read_fds: &[SockFd],
        write_fds: &[SockFd],
        num_readable: i32,
        num_writable: i32,
        timeout: Option<Duration>,
        flags: &mut [i32],
    ) -> NetResult<bool> {
        if num_readable < 0 || num_writable < 0 {
            return Err(NetError::invalid_argument("negative descriptor count"));
        }
        let readable = num_readable as usize;
        let writable = num_writable as usize;
        if readable + writable == 0 {
            trace!("select with empty descriptor sets, nothing to wait on");
            return Ok(true);
        }

        let reads = read_fds
            .get(..readable)
            .ok_or_else(|| NetError::invalid_argument("read set shorter than count"))?;
        let writes = write_fds
            .get(..writable)
            .ok_or_else(|| NetError::invalid_argument("write set shorter than count"))?;
        if flags.len() < readable + writable {
            return Err(NetError::invalid_argument(
                "flags buffer shorter than descriptor count",
            ));
        }
        self.transport.select(reads, writes, timeout, flags)
    }

    // ========================================================================
    // Pass-through operations
    // ========================================================================

    /// Allocate a stream (`true`) or datagram (`false`) socket.
    pub fn open_socket(&self, stream: bool) -> NetResult<SockFd> {
        self.transport.open_socket(stream)
    }

    pub fn bind(&self, fd: SockFd, addr: &RemoteAddr, port: Port) -> NetResult<()> {
        self.transport.bind(fd, addr, port)
    }

    pub fn listen(&self, fd: SockFd, backlog: u32) -> NetResult<()> {
        self.transport.listen(fd, backlog)
    }

    pub fn accept(&self, fd: SockFd) -> NetResult<(SockFd, RemoteAddr)> {
        self.transport.accept(fd)
    }

    pub fn is_connected(&self, fd: SockFd, timeout: Duration) -> NetResult<bool> {
        self.transport.is_connected(fd, timeout)
    }

    pub fn disconnect_datagram(&self, fd: SockFd) -> NetResult<()> {
        self.transport.disconnect_datagram(fd)
    }

    /// Read into `buf[offset..offset + count]`, returning the count read.
    pub fn read(
        &self,
        fd: SockFd,
        buf: &mut [u8],
        offset: usize,
        count: usize,
    ) -> NetResult<usize> {
        let slice = checked_slice_mut(buf, offset, count)?;
        self.transport.read(fd, slice)
    }

    /// Receive a datagram into `buf[offset..offset + length]`.
    pub fn recv_from(
        &self,
        fd: SockFd,
        buf: &mut [u8],
        offset: usize,
        length: usize,
        peek: bool,
        connected: bool,
    ) -> NetResult<(usize, Option<RemoteAddr>)> {
        let slice = checked_slice_mut(buf, offset, length)?;
        self.transport.recv_from(fd, slice, peek, connected)
    }

    pub fn shutdown_input(&self, fd: SockFd) -> NetResult<()> {
        self.transport.shutdown_input(fd)
    }

    pub fn shutdown_output(&self, fd: SockFd) -> NetResult<()> {
        self.transport.shutdown_output(fd)
    }

    /// Close the socket and drop its peer metadata, so a recycled descriptor
    /// does not inherit a stale destination.
    pub fn close(&self, fd: SockFd) -> NetResult<()> {
        self.peers.forget(fd);
        self.transport.close(fd)
    }

    pub fn get_option(&self, fd: SockFd, opt: SockOpt) -> NetResult<i32> {
        self.transport.get_option(fd, opt)
    }

    pub fn set_option(&self, fd: SockFd, opt: SockOpt, value: i32) -> NetResult<()> {
        self.transport.set_option(fd, opt, value)
    }

    pub fn local_ip(&self, fd: SockFd) -> NetResult<Option<IpAddr>> {
        self.transport.local_ip(fd)
    }

    pub fn local_port(&self, fd: SockFd) -> NetResult<Port> {
        self.transport.local_port(fd)
    }
}

/// Validate `data[offset..offset + length]`, failing before any side effect.
fn checked_slice(data: &[u8], offset: usize, length: usize) -> NetResult<&[u8]> {
    offset
        .checked_add(length)
        .and_then(|end| data.get(offset..end))
        .ok_or_else(|| range_error(data.len(), offset, length))
}

fn checked_slice_mut(data: &mut [u8], offset: usize, length: usize) -> NetResult<&mut [u8]> {
    let len = data.len();
    offset
        .checked_add(length)
        .and_then(move |end| data.get_mut(offset..end))
        .ok_or_else(|| range_error(len, offset, length))
}

fn range_error(len: usize, offset: usize, length: usize) -> NetError {
    NetError::invalid_argument(format!(
        "range {}..+{} outside buffer of {} bytes",
        offset, length, len
    ))
}
