/*!
 * System Limits and Constants
 *
 * Centralized location for broker-wide defaults and hard bounds.
 * Organized by domain for maintainability and discoverability.
 */

use std::time::Duration;

// =============================================================================
// TOPIC LIMITS
// =============================================================================

/// Default per-topic buffer capacity
/// Messages accepted without a waiting consumer before producers suspend
pub const DEFAULT_TOPIC_CAPACITY: usize = 2;

/// Default maximum number of distinct topics
pub const DEFAULT_MAX_TOPICS: usize = 2;

/// Hard upper bound for a single topic buffer
/// [SECURITY] Keeps one misconfigured topic from reserving unbounded memory
pub const MAX_TOPIC_CAPACITY: usize = 1_000_000;

// =============================================================================
// TRANSPORT LIMITS
// =============================================================================

/// Default listen address for the line protocol server
pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8080";

/// Server-wide upper bound on how long a single request may wait
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(1);

/// Concurrent client connections accepted before new ones queue up
pub const DEFAULT_MAX_CONNECTIONS: usize = 1024;

/// Longest request line accepted from a client (64KB)
/// [SECURITY] Bounds per-connection read buffering
pub const MAX_REQUEST_LINE_BYTES: usize = 64 * 1024;
