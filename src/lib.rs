/*!
 * netsentry Library
 * Network I/O boundary instrumentation: an instrumented socket façade with
 * provenance tagging and structured audit emission
 */

pub mod audit;
pub mod core;
pub mod net;
pub mod taint;

// Re-exports
pub use audit::{
    AuditLog, AuditRecord, AuditSink, AuditStats, BoundaryEvent, FanoutSink, LeakSink, LogSink,
    TransportKind,
};
pub use crate::core::errors::NetError;
pub use crate::core::types::{NetResult, Port, SockFd};
pub use net::{
    LoopbackTransport, NetBoundary, PeerInfo, PeerTable, RemoteAddr, SockOpt, Transport,
    SELECT_READABLE, SELECT_WRITABLE,
};
pub use taint::{ClearResolver, PatternResolver, Tag, TagResolver};
