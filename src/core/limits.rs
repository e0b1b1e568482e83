/*!
 * System Limits and Constants
 *
 * Centralized location for boundary-layer limits, thresholds, and magic numbers.
 * Organized by domain for maintainability and discoverability.
 *
 * ## Design Philosophy
 * - All values include rationale comments explaining WHY they exist
 * - Values are grouped by domain (audit, network, timeouts)
 * - Security-critical constants are marked with [SECURITY]
 * - Linux-compatible values are marked with [LINUX-COMPAT]
 */

use std::time::Duration;

// =============================================================================
// AUDIT LIMITS
// =============================================================================

/// Maximum audit events stored globally (10,000 events)
/// [SECURITY] Prevents the audit log from consuming excessive memory
pub const MAX_AUDIT_EVENTS: usize = 10_000;

/// Maximum audit events retained per destination host (100 events)
/// [SECURITY] Per-host limit for fine-grained leak investigation
pub const MAX_AUDIT_EVENTS_PER_HOST: usize = 100;

// =============================================================================
// NETWORK LIMITS
// =============================================================================

/// First descriptor value handed out by the loopback transport
/// Starts high so loopback descriptors never collide with OS file descriptors
/// in mixed-transport test setups
pub const FIRST_SOCKET_FD: u32 = 1000;

/// First ephemeral port assigned when binding to port 0
/// [LINUX-COMPAT] Matches the lower edge of the Linux ephemeral range
pub const FIRST_EPHEMERAL_PORT: u16 = 49152;

/// Default listen backlog when a caller passes 0
pub const DEFAULT_LISTEN_BACKLOG: u32 = 128;

/// Maximum datagrams queued per socket mailbox (64 datagrams)
/// Oldest datagrams are dropped first, matching UDP loss semantics
pub const MAX_DATAGRAM_MAILBOX: usize = 64;

// =============================================================================
// TIMEOUTS
// =============================================================================

/// Standard network timeout (60 seconds)
pub const STANDARD_NETWORK_TIMEOUT: Duration = Duration::from_secs(60);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audit_hierarchy() {
        // Per-host retention must never exceed the global ring
        assert!(MAX_AUDIT_EVENTS_PER_HOST < MAX_AUDIT_EVENTS);
    }

    #[test]
    fn test_port_ranges() {
        // Ephemeral range must sit above the well-known/registered split
        assert!(FIRST_EPHEMERAL_PORT > 1024);
    }
}
