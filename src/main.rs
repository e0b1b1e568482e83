/*!
 * netsentry - Demo Entry Point
 *
 * Wires the instrumented boundary over the in-memory loopback transport:
 * - pattern-based provenance tagging
 * - retained audit log plus JSON lines through the logger
 * - a short bind/connect/write session with one tainted payload
 */

use log::info;
use netsentry::core::limits::STANDARD_NETWORK_TIMEOUT;
use netsentry::{
    AuditLog, AuditSink, FanoutSink, LogSink, LoopbackTransport, NetBoundary, PatternResolver,
    RemoteAddr, Tag,
};
use std::error::Error;
use std::sync::Arc;

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    info!("netsentry demo starting...");

    let transport = Arc::new(LoopbackTransport::new());
    let retained = Arc::new(AuditLog::new());
    let sinks: Vec<Arc<dyn AuditSink>> = vec![retained.clone(), Arc::new(LogSink)];
    let resolver = PatternResolver::new().with_pattern(b"hunter2".to_vec(), Tag::new(0x400));

    let boundary = NetBoundary::new(
        transport,
        Arc::new(resolver),
        Arc::new(FanoutSink::new(sinks)),
    );

    // Server side
    let listener = boundary.open_socket(true)?;
    let local = RemoteAddr::loopback();
    boundary.bind(listener, &local, 4455)?;
    boundary.listen(listener, 16)?;

    // Client side
    let client = boundary.open_socket(true)?;
    let dest = RemoteAddr::with_hostname(local.ip(), "demo.internal");
    boundary.connect(client, &dest, 4455, STANDARD_NETWORK_TIMEOUT)?;
    let (server, remote) = boundary.accept(listener)?;
    info!("Accepted connection from {}", remote);

    let greeting = b"hello over loopback";
    boundary.write(client, greeting, 0, greeting.len())?;

    // This payload trips the pattern resolver and is recorded as a leak.
    let credentials = b"password=hunter2\n";
    boundary.write(client, credentials, 0, credentials.len())?;

    let mut buf = [0u8; 64];
    let buf_len = buf.len();
    let received = boundary.read(server, &mut buf, 0, buf_len)?;
    info!("Server received {} bytes", received);

    boundary.send_urgent(client, b'!');

    boundary.close(client)?;
    boundary.close(server)?;
    boundary.close(listener)?;

    let stats = retained.stats();
    info!(
        "Audit log holds {} events, {} leaks across {} hosts",
        stats.total_events, stats.total_leaks, stats.hosts_tracked
    );

    println!("Captured audit trail:");
    for record in retained.recent(16).iter().rev() {
        println!("{}", serde_json::to_string(record)?);
    }

    Ok(())
}
