/*!
 * Loopback Transport
 * In-memory transport implementation for tests and demos
 */

use crate::core::errors::NetError;
use crate::core::limits::{
    DEFAULT_LISTEN_BACKLOG, FIRST_EPHEMERAL_PORT, FIRST_SOCKET_FD, MAX_DATAGRAM_MAILBOX,
};
use crate::core::types::{NetResult, Port, SockFd};
use crate::net::addr::RemoteAddr;
use crate::net::transport::{SockOpt, Transport, SELECT_READABLE, SELECT_WRITABLE};
use ahash::RandomState;
use crossbeam_queue::SegQueue;
use dashmap::DashMap;
use log::{info, trace};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::net::IpAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Shared FIFO byte queue between two stream endpoints.
type ByteQueue = Arc<Mutex<VecDeque<u8>>>;

/// Inbound datagram mailbox.
type Mailbox = Arc<Mutex<VecDeque<Datagram>>>;

#[derive(Debug, Clone)]
struct Datagram {
    from_port: Port,
    data: Vec<u8>,
}

/// Half-open connection parked on a listener until accepted.
struct Pending {
    client_to_server: ByteQueue,
    server_to_client: ByteQueue,
    client_port: Port,
}

/// Per-descriptor endpoint state.
struct Endpoint {
    stream: bool,
    local_port: Option<Port>,
    listening: bool,
    /// Accept-queue capacity (listeners only).
    backlog: usize,
    /// Stream inbound bytes.
    rx: ByteQueue,
    /// Peer's inbound queue once connected.
    tx: Option<ByteQueue>,
    /// Default destination (stream peer or connected-datagram peer).
    peer: Option<(RemoteAddr, Port)>,
    /// Datagram inbound.
    mailbox: Mailbox,
    /// Connections waiting for accept (listeners only).
    pending: Arc<SegQueue<Pending>>,
    input_shutdown: bool,
    output_shutdown: bool,
    options: HashMap<SockOpt, i32>,
}

impl Endpoint {
    fn new(stream: bool) -> Self {
        Self {
            stream,
            local_port: None,
            listening: false,
            backlog: 0,
            rx: Arc::new(Mutex::new(VecDeque::new())),
            tx: None,
            peer: None,
            mailbox: Arc::new(Mutex::new(VecDeque::new())),
            pending: Arc::new(SegQueue::new()),
            input_shutdown: false,
            output_shutdown: false,
            options: HashMap::new(),
        }
    }

    fn type_name(&self) -> &'static str {
        if self.listening {
            "listener"
        } else if self.stream {
            "stream"
        } else {
            "datagram"
        }
    }
}

/// In-memory transport: descriptors, port registries, and byte queues with
/// no OS sockets underneath.
///
/// # Design
/// - **Unified storage**: one concurrent map for every endpoint kind
/// - **Lock-free FD recycling**: a queue prevents descriptor exhaustion
/// - **Non-blocking by nature**: calls that would block in an OS transport
///   return `WouldBlock` instead, keeping tests deterministic
///
/// Guards on the endpoint map are never held across a second map lookup;
/// shared queues are cloned out of the guard before locking.
pub struct LoopbackTransport {
    next_fd: Arc<AtomicU32>,
    next_ephemeral: Arc<AtomicU32>,
    /// Unified endpoint storage
    endpoints: Arc<DashMap<SockFd, Endpoint, RandomState>>,
    /// Port registries per socket family
    stream_ports: Arc<DashMap<Port, SockFd, RandomState>>,
    dgram_ports: Arc<DashMap<Port, SockFd, RandomState>>,
    /// Lock-free queue for FD recycling
    free_fds: Arc<SegQueue<SockFd>>,
}

impl LoopbackTransport {
    #[must_use]
    pub fn new() -> Self {
        info!("Loopback transport initialized with unified storage and lock-free FD recycling");
        Self {
            next_fd: Arc::new(AtomicU32::new(FIRST_SOCKET_FD)),
            next_ephemeral: Arc::new(AtomicU32::new(u32::from(FIRST_EPHEMERAL_PORT))),
            endpoints: Arc::new(DashMap::with_hasher(RandomState::new())),
            stream_ports: Arc::new(DashMap::with_hasher(RandomState::new())),
            dgram_ports: Arc::new(DashMap::with_hasher(RandomState::new())),
            free_fds: Arc::new(SegQueue::new()),
        }
    }

    /// Allocate a descriptor (recycle or create new, lock-free).
    fn allocate_fd(&self) -> SockFd {
        if let Some(recycled) = self.free_fds.pop() {
            trace!("Recycled FD {} for socket", recycled);
            recycled
        } else {
            let fd = self.next_fd.fetch_add(1, Ordering::SeqCst);
            trace!("Allocated new FD {} for socket", fd);
            fd
        }
    }

    fn allocate_ephemeral_port(&self, stream: bool) -> Port {
        let registry = if stream {
            &self.stream_ports
        } else {
            &self.dgram_ports
        };
        loop {
            let raw = self.next_ephemeral.fetch_add(1, Ordering::SeqCst);
            let port = (raw % u32::from(u16::MAX)) as Port;
            if port >= FIRST_EPHEMERAL_PORT && !registry.contains_key(&port) {
                return port;
            }
        }
    }

    /// Ensure a datagram socket has a local port, auto-binding like UDP does
    /// on first send.
    fn autobind_dgram(&self, fd: SockFd) -> NetResult<Port> {
        if let Some(endpoint) = self.endpoints.get(&fd) {
            if let Some(port) = endpoint.local_port {
                return Ok(port);
            }
        } else {
            return Err(NetError::BadDescriptor(fd));
        }
        let port = self.allocate_ephemeral_port(false);
        if let Some(mut endpoint) = self.endpoints.get_mut(&fd) {
            endpoint.local_port = Some(port);
        }
        self.dgram_ports.insert(port, fd);
        Ok(port)
    }

    /// Deliver a datagram into the mailbox bound at `port`, dropping the
    /// oldest entry when the mailbox is full. Silently discards when no
    /// receiver is bound, matching UDP loss semantics.
    fn deliver_datagram(&self, from_port: Port, port: Port, data: &[u8]) {
        let mailbox = match self
            .dgram_ports
            .get(&port)
            .and_then(|fd| self.endpoints.get(&*fd).map(|e| e.mailbox.clone()))
        {
            Some(mailbox) => mailbox,
            None => {
                trace!("No datagram receiver on port {}, dropping", port);
                return;
            }
        };
        let mut queue = mailbox.lock();
        if queue.len() >= MAX_DATAGRAM_MAILBOX {
            queue.pop_front();
        }
        queue.push_back(Datagram {
            from_port,
            data: data.to_vec(),
        });
    }

    /// Get transport statistics.
    #[must_use]
    pub fn stats(&self) -> LoopbackStats {
        let mut listeners = 0;
        let mut streams = 0;
        let mut datagrams = 0;
        for entry in self.endpoints.iter() {
            if entry.listening {
                listeners += 1;
            } else if entry.stream {
                streams += 1;
            } else {
                datagrams += 1;
            }
        }
        LoopbackStats {
            listeners,
            streams,
            datagrams,
            recycled_fds_available: self.free_fds.len(),
        }
    }
}

impl Default for LoopbackTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for LoopbackTransport {
    fn clone(&self) -> Self {
        Self {
            next_fd: Arc::clone(&self.next_fd),
            next_ephemeral: Arc::clone(&self.next_ephemeral),
            endpoints: Arc::clone(&self.endpoints),
            stream_ports: Arc::clone(&self.stream_ports),
            dgram_ports: Arc::clone(&self.dgram_ports),
            free_fds: Arc::clone(&self.free_fds),
        }
    }
}

/// Loopback transport statistics
#[derive(Debug, Clone)]
pub struct LoopbackStats {
    pub listeners: usize,
    pub streams: usize,
    pub datagrams: usize,
    pub recycled_fds_available: usize,
}

impl Transport for LoopbackTransport {
    fn open_socket(&self, stream: bool) -> NetResult<SockFd> {
        let fd = self.allocate_fd();
        self.endpoints.insert(fd, Endpoint::new(stream));
        trace!(
            "Opened {} socket FD {}",
            if stream { "stream" } else { "datagram" },
            fd
        );
        Ok(fd)
    }

    fn bind(&self, fd: SockFd, _addr: &RemoteAddr, port: Port) -> NetResult<()> {
        let stream = self
            .endpoints
            .get(&fd)
            .map(|e| e.stream)
            .ok_or(NetError::BadDescriptor(fd))?;

        let port = if port == 0 {
            self.allocate_ephemeral_port(stream)
        } else {
            port
        };

        let registry = if stream {
            &self.stream_ports
        } else {
            &self.dgram_ports
        };
        match registry.entry(port) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                return Err(NetError::addr_in_use(format!("port {}", port)));
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(fd);
            }
        }

        if let Some(mut endpoint) = self.endpoints.get_mut(&fd) {
            endpoint.local_port = Some(port);
        }
        info!("Bound socket {} to port {}", fd, port);
        Ok(())
    }

    fn listen(&self, fd: SockFd, backlog: u32) -> NetResult<()> {
        let mut endpoint = self
            .endpoints
            .get_mut(&fd)
            .ok_or(NetError::BadDescriptor(fd))?;
        if !endpoint.stream {
            return Err(NetError::unsupported("listen on datagram socket"));
        }
        if endpoint.local_port.is_none() {
            return Err(NetError::invalid_argument("listen on unbound socket"));
        }
        endpoint.listening = true;
        endpoint.backlog = if backlog == 0 {
            DEFAULT_LISTEN_BACKLOG as usize
        } else {
            backlog as usize
        };
        Ok(())
    }

    fn accept(&self, fd: SockFd) -> NetResult<(SockFd, RemoteAddr)> {
        let pending = {
            let endpoint = self
                .endpoints
                .get(&fd)
                .ok_or(NetError::BadDescriptor(fd))?;
            if !endpoint.listening {
                return Err(NetError::invalid_argument("accept on non-listening socket"));
            }
            endpoint.pending.clone()
        };

        let handshake = pending.pop().ok_or(NetError::WouldBlock)?;

        let peer_fd = self.allocate_fd();
        let mut endpoint = Endpoint::new(true);
        endpoint.rx = handshake.client_to_server;
        endpoint.tx = Some(handshake.server_to_client);
        endpoint.peer = Some((RemoteAddr::loopback(), handshake.client_port));
        self.endpoints.insert(peer_fd, endpoint);

        trace!("Accepted connection on socket {}, peer FD {}", fd, peer_fd);
        Ok((peer_fd, RemoteAddr::loopback()))
    }

    fn connect(
        &self,
        fd: SockFd,
        addr: &RemoteAddr,
        port: Port,
        _timeout: Duration,
    ) -> NetResult<()> {
        let (stream, client_port) = self
            .endpoints
            .get(&fd)
            .map(|e| (e.stream, e.local_port.unwrap_or(0)))
            .ok_or(NetError::BadDescriptor(fd))?;

        if !stream {
            // Datagram connect just records the default peer.
            if let Some(mut endpoint) = self.endpoints.get_mut(&fd) {
                endpoint.peer = Some((addr.clone(), port));
            }
            return Ok(());
        }

        let (pending, backlog) = self
            .stream_ports
            .get(&port)
            .map(|listener| *listener)
            .and_then(|listener| self.endpoints.get(&listener))
            .filter(|listener| listener.listening)
            .map(|listener| (listener.pending.clone(), listener.backlog))
            .ok_or_else(|| NetError::connection_refused(format!("{}:{}", addr, port)))?;

        if pending.len() >= backlog {
            return Err(NetError::connection_refused(format!(
                "{}:{} backlog full",
                addr, port
            )));
        }

        let client_to_server: ByteQueue = Arc::new(Mutex::new(VecDeque::new()));
        let server_to_client: ByteQueue = Arc::new(Mutex::new(VecDeque::new()));

        {
            let mut endpoint = self
                .endpoints
                .get_mut(&fd)
                .ok_or(NetError::BadDescriptor(fd))?;
            endpoint.rx = server_to_client.clone();
            endpoint.tx = Some(client_to_server.clone());
            endpoint.peer = Some((addr.clone(), port));
        }

        pending.push(Pending {
            client_to_server,
            server_to_client,
            client_port,
        });
        info!("Connected socket {} to {}:{}", fd, addr, port);
        Ok(())
    }

    fn connect_nonblocking(&self, fd: SockFd, addr: &RemoteAddr, port: Port) -> NetResult<bool> {
        // In-memory connects always complete immediately.
        self.connect(fd, addr, port, Duration::ZERO)?;
        Ok(true)
    }

    fn is_connected(&self, fd: SockFd, _timeout: Duration) -> NetResult<bool> {
        let endpoint = self
            .endpoints
            .get(&fd)
            .ok_or(NetError::BadDescriptor(fd))?;
        Ok(if endpoint.stream {
            endpoint.tx.is_some()
        } else {
            endpoint.peer.is_some()
        })
    }

    fn disconnect_datagram(&self, fd: SockFd) -> NetResult<()> {
        let mut endpoint = self
            .endpoints
            .get_mut(&fd)
            .ok_or(NetError::BadDescriptor(fd))?;
        if endpoint.stream {
            return Err(NetError::unsupported("disconnect on stream socket"));
        }
        endpoint.peer = None;
        Ok(())
    }

    fn read(&self, fd: SockFd, buf: &mut [u8]) -> NetResult<usize> {
        let rx = {
            let endpoint = self
                .endpoints
                .get(&fd)
                .ok_or(NetError::BadDescriptor(fd))?;
            if endpoint.input_shutdown {
                return Ok(0);
            }
            endpoint.rx.clone()
        };

        let mut queue = rx.lock();
        if queue.is_empty() {
            return Err(NetError::WouldBlock);
        }
        let count = buf.len().min(queue.len());
        for slot in buf.iter_mut().take(count) {
            // Length checked above, so the queue cannot run dry mid-drain.
            *slot = queue.pop_front().unwrap_or_default();
        }
        Ok(count)
    }

    fn recv_from(
        &self,
        fd: SockFd,
        buf: &mut [u8],
        peek: bool,
        connected: bool,
    ) -> NetResult<(usize, Option<RemoteAddr>)> {
        let (stream, mailbox, peer) = {
            let endpoint = self
                .endpoints
                .get(&fd)
                .ok_or(NetError::BadDescriptor(fd))?;
            (endpoint.stream, endpoint.mailbox.clone(), endpoint.peer.clone())
        };

        if stream {
            // Stream receive degenerates to a read with no sender address.
            let count = self.read(fd, buf)?;
            return Ok((count, None));
        }

        let mut queue = mailbox.lock();
        let datagram = loop {
            let front = queue.front().cloned().ok_or(NetError::WouldBlock)?;
            if connected {
                // Restrict to the default peer, dropping strays.
                match &peer {
                    Some((_, peer_port)) if *peer_port == front.from_port => {}
                    Some(_) => {
                        queue.pop_front();
                        continue;
                    }
                    None => return Err(NetError::NotConnected(fd)),
                }
            }
            if !peek {
                queue.pop_front();
            }
            break front;
        };

        let count = buf.len().min(datagram.data.len());
        buf[..count].copy_from_slice(&datagram.data[..count]);
        Ok((count, Some(RemoteAddr::loopback())))
    }

    fn send_to(&self, fd: SockFd, data: &[u8], port: Port, _addr: &RemoteAddr) -> NetResult<usize> {
        let stream = self
            .endpoints
            .get(&fd)
            .map(|e| e.stream)
            .ok_or(NetError::BadDescriptor(fd))?;
        if stream {
            return Err(NetError::unsupported("sendto on stream socket"));
        }
        let from_port = self.autobind_dgram(fd)?;
        self.deliver_datagram(from_port, port, data);
        Ok(data.len())
    }

    fn send_urgent(&self, fd: SockFd, value: u8) {
        // Fire-and-forget: urgent bytes are delivered inline when a peer
        // exists and dropped otherwise.
        let tx = self
            .endpoints
            .get(&fd)
            .and_then(|endpoint| endpoint.tx.clone());
        match tx {
            Some(queue) => queue.lock().push_back(value),
            None => trace!("Urgent byte on unconnected socket {} dropped", fd),
        }
    }

    fn write(&self, fd: SockFd, data: &[u8]) -> NetResult<usize> {
        let (stream, tx, peer, output_shutdown) = {
            let endpoint = self
                .endpoints
                .get(&fd)
                .ok_or(NetError::BadDescriptor(fd))?;
            (
                endpoint.stream,
                endpoint.tx.clone(),
                endpoint.peer.clone(),
                endpoint.output_shutdown,
            )
        };

        if output_shutdown {
            return Err(NetError::io("write after output shutdown"));
        }

        if stream {
            let queue = tx.ok_or(NetError::NotConnected(fd))?;
            queue.lock().extend(data.iter().copied());
            return Ok(data.len());
        }

        // Connected-datagram write goes to the default peer.
        let (_, port) = peer.ok_or(NetError::NotConnected(fd))?;
        let from_port = self.autobind_dgram(fd)?;
        self.deliver_datagram(from_port, port, data);
        Ok(data.len())
    }

    fn select(
        &self,
        read_fds: &[SockFd],
        write_fds: &[SockFd],
        _timeout: Option<Duration>,
        flags: &mut [i32],
    ) -> NetResult<bool> {
        let mut any_ready = false;

        for (index, fd) in read_fds.iter().enumerate() {
            let readable = self
                .endpoints
                .get(fd)
                .map(|endpoint| {
                    if endpoint.listening {
                        !endpoint.pending.is_empty()
                    } else if endpoint.stream {
                        !endpoint.rx.lock().is_empty()
                    } else {
                        !endpoint.mailbox.lock().is_empty()
                    }
                })
                .unwrap_or(false);
            if let Some(slot) = flags.get_mut(index) {
                *slot = if readable { SELECT_READABLE } else { 0 };
            }
            any_ready |= readable;
        }

        for (index, fd) in write_fds.iter().enumerate() {
            let writable = self
                .endpoints
                .get(fd)
                .map(|endpoint| {
                    if endpoint.stream {
                        endpoint.tx.is_some() && !endpoint.output_shutdown
                    } else {
                        true
                    }
                })
                .unwrap_or(false);
            if let Some(slot) = flags.get_mut(read_fds.len() + index) {
                *slot = if writable { SELECT_WRITABLE } else { 0 };
            }
            any_ready |= writable;
        }

        Ok(any_ready)
    }

    fn shutdown_input(&self, fd: SockFd) -> NetResult<()> {
        let mut endpoint = self
            .endpoints
            .get_mut(&fd)
            .ok_or(NetError::BadDescriptor(fd))?;
        endpoint.input_shutdown = true;
        Ok(())
    }

    fn shutdown_output(&self, fd: SockFd) -> NetResult<()> {
        let mut endpoint = self
            .endpoints
            .get_mut(&fd)
            .ok_or(NetError::BadDescriptor(fd))?;
        endpoint.output_shutdown = true;
        Ok(())
    }

    fn close(&self, fd: SockFd) -> NetResult<()> {
        let (_, endpoint) = self
            .endpoints
            .remove(&fd)
            .ok_or(NetError::BadDescriptor(fd))?;

        if let Some(port) = endpoint.local_port {
            let registry = if endpoint.stream {
                &self.stream_ports
            } else {
                &self.dgram_ports
            };
            registry.remove_if(&port, |_, owner| *owner == fd);
        }
        self.free_fds.push(fd);

        info!("Closed {} socket {} (recycled FD)", endpoint.type_name(), fd);
        Ok(())
    }

    fn get_option(&self, fd: SockFd, opt: SockOpt) -> NetResult<i32> {
        let endpoint = self
            .endpoints
            .get(&fd)
            .ok_or(NetError::BadDescriptor(fd))?;
        Ok(endpoint.options.get(&opt).copied().unwrap_or(0))
    }

    fn set_option(&self, fd: SockFd, opt: SockOpt, value: i32) -> NetResult<()> {
        let mut endpoint = self
            .endpoints
            .get_mut(&fd)
            .ok_or(NetError::BadDescriptor(fd))?;
        endpoint.options.insert(opt, value);
        Ok(())
    }

    fn local_ip(&self, fd: SockFd) -> NetResult<Option<IpAddr>> {
        let endpoint = self
            .endpoints
            .get(&fd)
            .ok_or(NetError::BadDescriptor(fd))?;
        Ok(endpoint.local_port.map(|_| RemoteAddr::loopback().ip()))
    }

    fn local_port(&self, fd: SockFd) -> NetResult<Port> {
        let endpoint = self
            .endpoints
            .get(&fd)
            .ok_or(NetError::BadDescriptor(fd))?;
        Ok(endpoint.local_port.unwrap_or(0))
    }
}
