/*!
 * Boundary Integration Tests
 * End-to-end façade behavior over the loopback transport
 */

use netsentry::core::encoding::from_hex;
use netsentry::{
    AuditLog, BoundaryEvent, LoopbackTransport, NetBoundary, NetError, PatternResolver,
    RemoteAddr, Tag, TransportKind, SELECT_READABLE,
};
use std::sync::Arc;
use std::time::Duration;

const SECRET_TAG: Tag = Tag::new(0x400);

fn instrumented() -> (NetBoundary, Arc<AuditLog>) {
    let transport = Arc::new(LoopbackTransport::new());
    let log = Arc::new(AuditLog::new());
    let resolver = PatternResolver::new().with_pattern(b"hunter2".to_vec(), SECRET_TAG);
    let boundary = NetBoundary::new(transport, Arc::new(resolver), log.clone());
    (boundary, log)
}

fn serve(boundary: &NetBoundary, port: u16) -> u32 {
    let listener = boundary.open_socket(true).unwrap();
    boundary
        .bind(listener, &RemoteAddr::loopback(), port)
        .unwrap();
    boundary.listen(listener, 16).unwrap();
    listener
}

#[test]
fn test_clean_session_leaves_only_send_records() {
    let (boundary, log) = instrumented();
    let listener = serve(&boundary, 4455);

    let client = boundary.open_socket(true).unwrap();
    let dest = RemoteAddr::with_hostname(RemoteAddr::loopback().ip(), "backend.internal");
    boundary.connect(client, &dest, 4455, Duration::ZERO).unwrap();
    let (server, _) = boundary.accept(listener).unwrap();

    let payload = b"GET / HTTP/1.0";
    boundary.write(client, payload, 0, payload.len()).unwrap();

    let mut buf = [0u8; 32];
    let buf_len = buf.len();
    let received = boundary.read(server, &mut buf, 0, buf_len).unwrap();
    assert_eq!(&buf[..received], payload);

    let stats = log.stats();
    assert_eq!(stats.total_events, 2); // connection + send
    assert_eq!(stats.total_leaks, 0);

    // Oldest first
    let records: Vec<BoundaryEvent> = log
        .recent(10)
        .into_iter()
        .rev()
        .map(|record| record.event)
        .collect();
    assert!(matches!(
        records[0],
        BoundaryEvent::ConnectionOpened { ref host, port: 4455, .. } if host == "backend.internal"
    ));
    match &records[1] {
        BoundaryEvent::DataSent {
            host,
            port,
            data,
            transport,
        } => {
            assert_eq!(host, "backend.internal");
            assert_eq!(*port, 4455);
            assert_eq!(from_hex(data).unwrap(), payload);
            assert_eq!(*transport, None); // stream write
        }
        other => panic!("expected DataSent, got {:?}", other),
    }
}

#[test]
fn test_metadata_persists_across_calls_on_one_handle() {
    let (boundary, log) = instrumented();
    let _listener = serve(&boundary, 4460);

    let client = boundary.open_socket(true).unwrap();
    let dest = RemoteAddr::with_hostname(RemoteAddr::loopback().ip(), "api.internal");
    boundary.connect(client, &dest, 443, Duration::ZERO).unwrap();

    boundary.write(client, b"one", 0, 3).unwrap();
    boundary.write(client, b"two", 0, 3).unwrap();

    for record in log.recent(2) {
        assert_eq!(record.event.host(), "api.internal");
        assert_eq!(record.event.port(), 443);
    }
}

#[test]
fn test_tainted_write_is_recorded_as_leak() {
    let (boundary, log) = instrumented();
    let listener = serve(&boundary, 4470);

    let client = boundary.open_socket(true).unwrap();
    let dest = RemoteAddr::with_hostname(RemoteAddr::loopback().ip(), "exfil.test");
    boundary.connect(client, &dest, 4470, Duration::ZERO).unwrap();

    let payload = b"user=admin\npass=hunter2\r\n";
    boundary.write(client, payload, 0, payload.len()).unwrap();

    assert_eq!(log.leak_count("exfil.test"), 1);
    let record = &log.recent(1)[0];
    match &record.event {
        BoundaryEvent::DataLeaked { tag, data, .. } => {
            assert_eq!(tag, "0x400");
            // Sanitized before hex encoding, lossless afterwards
            assert_eq!(from_hex(data).unwrap(), b"user=admin pass=hunter2  ");
        }
        other => panic!("expected DataLeaked, got {:?}", other),
    }

    // The bytes still reached the peer untouched.
    let (server, _) = boundary.accept(listener).unwrap();
    let mut buf = [0u8; 32];
    let buf_len = buf.len();
    let received = boundary.read(server, &mut buf, 0, buf_len).unwrap();
    assert_eq!(&buf[..received], payload);
}

#[test]
fn test_datagram_send_records_transport_kind() {
    let (boundary, log) = instrumented();

    let receiver = boundary.open_socket(false).unwrap();
    boundary
        .bind(receiver, &RemoteAddr::loopback(), 5353)
        .unwrap();

    let sender = boundary.open_socket(false).unwrap();
    let dest = RemoteAddr::with_hostname(RemoteAddr::loopback().ip(), "resolver.test");
    let sent = boundary
        .send_to(sender, b"query", 0, 5, 5353, &dest)
        .unwrap();
    assert_eq!(sent, 5);

    match &log.recent(1)[0].event {
        BoundaryEvent::DataSent { transport, .. } => {
            assert_eq!(*transport, Some(TransportKind::Datagram));
        }
        other => panic!("expected DataSent, got {:?}", other),
    }

    // Delivery happened despite the instrumentation
    let mut buf = [0u8; 16];
    let buf_len = buf.len();
    let (count, _) = boundary
        .recv_from(receiver, &mut buf, 0, buf_len, false, false)
        .unwrap();
    assert_eq!(&buf[..count], b"query");
}

#[test]
fn test_urgent_data_on_fresh_handle_uses_unknown() {
    let (boundary, log) = instrumented();

    let fd = boundary.open_socket(true).unwrap();
    boundary.send_urgent(fd, 33);

    match &log.recent(1)[0].event {
        BoundaryEvent::UrgentDataSent { host, port, data } => {
            assert_eq!(host, "unknown");
            assert_eq!(*port, 0);
            assert_eq!(from_hex(data).unwrap(), b"33");
        }
        other => panic!("expected UrgentDataSent, got {:?}", other),
    }
}

#[test]
fn test_failed_connect_still_audited() {
    let (boundary, log) = instrumented();

    let fd = boundary.open_socket(true).unwrap();
    let dest = RemoteAddr::with_hostname(RemoteAddr::loopback().ip(), "nobody.test");
    let err = boundary
        .connect(fd, &dest, 4444, Duration::ZERO)
        .unwrap_err();

    assert!(matches!(err, NetError::ConnectionRefused(_)));
    assert_eq!(log.stats().total_events, 1);
    assert!(matches!(
        log.recent(1)[0].event,
        BoundaryEvent::ConnectionOpened { .. }
    ));
}

#[test]
fn test_select_through_facade() {
    let (boundary, _log) = instrumented();
    let listener = serve(&boundary, 4480);

    let client = boundary.open_socket(true).unwrap();
    let dest = RemoteAddr::with_hostname(RemoteAddr::loopback().ip(), "select.test");
    boundary.connect(client, &dest, 4480, Duration::ZERO).unwrap();
    let (server, _) = boundary.accept(listener).unwrap();

    // Nothing queued: server read set not ready
    let mut flags = [0i32; 1];
    let ready = boundary
        .select(&[server], &[], 1, 0, Some(Duration::from_millis(1)), &mut flags)
        .unwrap();
    assert!(!ready);
    assert_eq!(flags[0], 0);

    boundary.write(client, b"ping", 0, 4).unwrap();
    let ready = boundary
        .select(&[server], &[], 1, 0, Some(Duration::from_millis(1)), &mut flags)
        .unwrap();
    assert!(ready);
    assert_eq!(flags[0], SELECT_READABLE);
}

#[test]
fn test_select_edge_cases() {
    let (boundary, _log) = instrumented();
    let mut flags = [0i32; 2];

    // Negative counts fail fast
    assert!(boundary
        .select(&[1000], &[], -1, 0, None, &mut flags)
        .is_err());

    // Empty sets succeed immediately
    assert!(boundary.select(&[], &[], 0, 0, None, &mut flags).unwrap());
}

#[test]
fn test_recycled_descriptor_does_not_inherit_destination() {
    let (boundary, log) = instrumented();
    let _listener = serve(&boundary, 4490);

    let first = boundary.open_socket(true).unwrap();
    let dest = RemoteAddr::with_hostname(RemoteAddr::loopback().ip(), "old.test");
    boundary.connect(first, &dest, 4490, Duration::ZERO).unwrap();
    boundary.close(first).unwrap();

    // The loopback transport recycles the descriptor
    let second = boundary.open_socket(true).unwrap();
    assert_eq!(second, first);

    boundary.send_urgent(second, 1);
    match &log.recent(1)[0].event {
        BoundaryEvent::UrgentDataSent { host, port, .. } => {
            assert_eq!(host, "unknown");
            assert_eq!(*port, 0);
        }
        other => panic!("expected UrgentDataSent, got {:?}", other),
    }
}
