//! Scheduler constants for the sync engine's long-lived tasks.

/// Fallback drain cadence for pending events, in seconds.
pub const PERIODIC_PUSH_INTERVAL_SECS: u64 = 5;

/// Socket heartbeat cadence in seconds.
pub const HEARTBEAT_INTERVAL_SECS: u64 = 30;

/// Fallback pull cadence in seconds, covering socket frames lost in transit.
pub const FALLBACK_PULL_INTERVAL_SECS: u64 = 45;

/// Consecutive heartbeat failures before the socket is force-reconnected.
pub const MAX_CONSECUTIVE_HEARTBEAT_FAILURES: u32 = 3;

/// Reconnect attempts before the engine gives up and goes disconnected.
pub const MAX_RECONNECT_ATTEMPTS: u32 = 10;

/// Page size for cursor-paginated pulls.
pub const PULL_PAGE_LIMIT: i64 = 1000;
