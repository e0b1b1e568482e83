/*!
 * Boundary Audit Trail
 * Structured records for data crossing the network boundary
 */

use crate::core::limits::{MAX_AUDIT_EVENTS, MAX_AUDIT_EVENTS_PER_HOST};
use crate::core::types::{Port, SockFd};
use ahash::RandomState;
use dashmap::DashMap;
use log::{info, warn};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, TimestampSeconds};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::SystemTime;

/// Destination class of leaked data.
///
/// Single variant today; the taxonomy keeps serialized records stable if
/// file or IPC boundaries grow their own instrumentation later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeakSink {
    Network,
}

/// Transport flavor recorded on datagram send records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportKind {
    Datagram,
}

/// One structured record per boundary-crossing operation.
///
/// Payload fields (`data`) are hex-encoded before construction; `tag` is the
/// provenance marker rendered as `0x…`. Records are immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum BoundaryEvent {
    /// A connection attempt was made to a named destination.
    ConnectionOpened {
        host: String,
        port: Port,
        socket: SockFd,
    },
    /// Untagged data left through the boundary.
    DataSent {
        host: String,
        port: Port,
        data: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        transport: Option<TransportKind>,
    },
    /// Tagged data reached the boundary.
    DataLeaked {
        sink: LeakSink,
        host: String,
        port: Port,
        tag: String,
        data: String,
    },
    /// An untagged out-of-band byte left through the boundary.
    UrgentDataSent {
        host: String,
        port: Port,
        data: String,
    },
}

impl BoundaryEvent {
    /// Whether this record describes tagged data reaching the boundary.
    #[inline]
    #[must_use]
    pub const fn is_leak(&self) -> bool {
        matches!(self, Self::DataLeaked { .. })
    }

    /// Destination host recorded on the event.
    #[must_use]
    pub fn host(&self) -> &str {
        match self {
            Self::ConnectionOpened { host, .. }
            | Self::DataSent { host, .. }
            | Self::DataLeaked { host, .. }
            | Self::UrgentDataSent { host, .. } => host,
        }
    }

    /// Destination port recorded on the event.
    #[must_use]
    pub const fn port(&self) -> Port {
        match self {
            Self::ConnectionOpened { port, .. }
            | Self::DataSent { port, .. }
            | Self::DataLeaked { port, .. }
            | Self::UrgentDataSent { port, .. } => *port,
        }
    }
}

/// Accepts structured boundary records.
///
/// Emission is best-effort relative to the I/O path: implementations must not
/// panic and must tolerate concurrent emission from multiple threads. Order is
/// guaranteed only per thread, atomicity per record.
pub trait AuditSink: Send + Sync {
    fn emit(&self, event: BoundaryEvent);
}

/// Ring-buffer entry: the event plus when the sink received it.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    #[serde(flatten)]
    pub event: BoundaryEvent,
    #[serde_as(as = "TimestampSeconds<i64>")]
    pub logged_at: SystemTime,
}

/// Bounded in-memory audit log.
///
/// Keeps a global ring buffer plus per-destination-host history and leak
/// counters so an operator can answer "what left for this host" without
/// scanning the full ring.
pub struct AuditLog {
    /// Global event log (ring buffer)
    events: RwLock<VecDeque<AuditRecord>>,
    /// Per-host event logs
    host_events: Arc<DashMap<String, VecDeque<AuditRecord>, RandomState>>,
    /// Leak counters for monitoring
    leak_counts: Arc<DashMap<String, u64, RandomState>>,
}

impl AuditLog {
    #[must_use]
    pub fn new() -> Self {
        Self {
            events: RwLock::new(VecDeque::with_capacity(MAX_AUDIT_EVENTS)),
            host_events: Arc::new(DashMap::with_hasher(RandomState::new())),
            leak_counts: Arc::new(DashMap::with_hasher(RandomState::new())),
        }
    }

    /// Get recent records, newest first.
    #[must_use]
    pub fn recent(&self, limit: usize) -> Vec<AuditRecord> {
        let events = self.events.read();
        events.iter().rev().take(limit).cloned().collect()
    }

    /// Get records for a specific destination host, newest first.
    #[must_use]
    pub fn for_host(&self, host: &str, limit: usize) -> Vec<AuditRecord> {
        if let Some(entry) = self.host_events.get(host) {
            entry.iter().rev().take(limit).cloned().collect()
        } else {
            Vec::new()
        }
    }

    /// Leak count for a destination host.
    #[must_use]
    pub fn leak_count(&self, host: &str) -> u64 {
        self.leak_counts.get(host).map(|e| *e).unwrap_or(0)
    }

    /// All destination hosts that received tagged data.
    #[must_use]
    pub fn hosts_with_leaks(&self) -> Vec<(String, u64)> {
        self.leak_counts
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect()
    }

    /// Clear records for one destination host.
    pub fn clear_host(&self, host: &str) {
        self.host_events.remove(host);
        self.leak_counts.remove(host);
    }

    /// Clear all records.
    pub fn clear_all(&self) {
        self.events.write().clear();
        self.host_events.clear();
        self.leak_counts.clear();
    }

    /// Get statistics.
    #[must_use]
    pub fn stats(&self) -> AuditStats {
        let total_events = self.events.read().len();
        let total_leaks: u64 = self.leak_counts.iter().map(|e| *e.value()).sum();
        let hosts_tracked = self.host_events.len();

        AuditStats {
            total_events,
            total_leaks,
            hosts_tracked,
        }
    }
}

impl AuditSink for AuditLog {
    fn emit(&self, event: BoundaryEvent) {
        let host = event.host().to_string();
        let is_leak = event.is_leak();
        let record = AuditRecord {
            event,
            logged_at: SystemTime::now(),
        };

        // Add to global ring
        {
            let mut events = self.events.write();
            if events.len() >= MAX_AUDIT_EVENTS {
                events.pop_front();
            }
            events.push_back(record.clone());
        }

        // Add to host-specific log
        {
            let mut entry = self
                .host_events
                .entry(host.clone())
                .or_insert_with(|| VecDeque::with_capacity(MAX_AUDIT_EVENTS_PER_HOST));
            if entry.len() >= MAX_AUDIT_EVENTS_PER_HOST {
                entry.pop_front();
            }
            entry.push_back(record);
        }

        // Track leaks
        if is_leak {
            self.leak_counts
                .entry(host)
                .and_modify(|count| *count += 1)
                .or_insert(1);
        }
    }
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::new()
    }
}

/// Audit statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditStats {
    pub total_events: usize,
    pub total_leaks: u64,
    pub hosts_tracked: usize,
}

/// Sink that serializes each record as one JSON line through the `log` facade.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl AuditSink for LogSink {
    fn emit(&self, event: BoundaryEvent) {
        match serde_json::to_string(&event) {
            Ok(line) => info!(target: "netsentry::audit", "{}", line),
            Err(e) => warn!("Failed to serialize audit event: {}", e),
        }
    }
}

/// Composite sink that fans each record out to every child sink.
pub struct FanoutSink {
    sinks: Vec<Arc<dyn AuditSink>>,
}

impl FanoutSink {
    #[must_use]
    pub fn new(sinks: Vec<Arc<dyn AuditSink>>) -> Self {
        Self { sinks }
    }
}

impl AuditSink for FanoutSink {
    fn emit(&self, event: BoundaryEvent) {
        for sink in &self.sinks {
            sink.emit(event.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sent(host: &str, port: Port) -> BoundaryEvent {
        BoundaryEvent::DataSent {
            host: host.to_string(),
            port,
            data: "68656c6c6f".to_string(),
            transport: Some(TransportKind::Datagram),
        }
    }

    fn leaked(host: &str, port: Port) -> BoundaryEvent {
        BoundaryEvent::DataLeaked {
            sink: LeakSink::Network,
            host: host.to_string(),
            port,
            tag: "0x400".to_string(),
            data: "68656c6c6f".to_string(),
        }
    }

    #[test]
    fn test_audit_logging() {
        let log = AuditLog::new();
        log.emit(sent("example.test", 9999));
        log.emit(leaked("example.test", 9999));

        let recent = log.recent(10);
        assert_eq!(recent.len(), 2);

        let for_host = log.for_host("example.test", 10);
        assert_eq!(for_host.len(), 2);

        assert_eq!(log.leak_count("example.test"), 1);
        assert_eq!(log.leak_count("other.test"), 0);
    }

    #[test]
    fn test_audit_stats() {
        let log = AuditLog::new();
        for i in 0..5 {
            if i % 2 == 0 {
                log.emit(leaked("leaky.test", 443));
            } else {
                log.emit(sent("clean.test", 80));
            }
        }

        let stats = log.stats();
        assert_eq!(stats.total_events, 5);
        assert_eq!(stats.total_leaks, 3); // 0, 2, 4
        assert_eq!(stats.hosts_tracked, 2);
        assert_eq!(
            log.hosts_with_leaks(),
            vec![("leaky.test".to_string(), 3)]
        );
    }

    #[test]
    fn test_ring_buffer() {
        let log = AuditLog::new();

        // Add more than MAX_AUDIT_EVENTS
        for _ in 0..(MAX_AUDIT_EVENTS + 100) {
            log.emit(sent("example.test", 1));
        }

        let stats = log.stats();
        assert_eq!(stats.total_events, MAX_AUDIT_EVENTS);
    }

    #[test]
    fn test_per_host_cap() {
        let log = AuditLog::new();
        for _ in 0..(MAX_AUDIT_EVENTS_PER_HOST + 10) {
            log.emit(sent("example.test", 1));
        }
        assert_eq!(
            log.for_host("example.test", MAX_AUDIT_EVENTS_PER_HOST * 2).len(),
            MAX_AUDIT_EVENTS_PER_HOST
        );
    }

    #[test]
    fn test_clear_host() {
        let log = AuditLog::new();
        log.emit(leaked("a.test", 1));
        log.emit(leaked("b.test", 2));
        log.clear_host("a.test");

        assert!(log.for_host("a.test", 10).is_empty());
        assert_eq!(log.leak_count("a.test"), 0);
        assert_eq!(log.leak_count("b.test"), 1);
    }

    #[test]
    fn test_event_kind_serialization() {
        let json = serde_json::to_string(&leaked("example.test", 443)).unwrap();
        assert!(json.contains("\"kind\":\"data_leaked\""));
        assert!(json.contains("\"sink\":\"network\""));
        assert!(json.contains("\"tag\":\"0x400\""));
    }

    #[test]
    fn test_transport_field_omitted_for_streams() {
        let event = BoundaryEvent::DataSent {
            host: "example.test".to_string(),
            port: 443,
            data: String::new(),
            transport: None,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(!json.contains("transport"));

        let json = serde_json::to_string(&sent("example.test", 443)).unwrap();
        assert!(json.contains("\"transport\":\"datagram\""));
    }

    #[test]
    fn test_fanout_reaches_every_sink() {
        let a = Arc::new(AuditLog::new());
        let b = Arc::new(AuditLog::new());
        let sinks: Vec<Arc<dyn AuditSink>> = vec![a.clone(), b.clone()];
        let fanout = FanoutSink::new(sinks);
        fanout.emit(sent("example.test", 80));

        assert_eq!(a.stats().total_events, 1);
        assert_eq!(b.stats().total_events, 1);
    }

    #[test]
    fn test_record_round_trips_through_json() {
        let record = AuditRecord {
            event: leaked("example.test", 443),
            logged_at: SystemTime::UNIX_EPOCH,
        };
        let json = serde_json::to_string(&record).unwrap();
        let back: AuditRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }
}
