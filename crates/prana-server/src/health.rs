//! Liveness reporting for load balancers and the admin dashboard.

use serde::Serialize;
use std::time::Instant;

/// What `GET /health` returns. The channel count doubles as a cheap
/// operator view of how many storefront sessions are currently attached.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// `"ok"` whenever the process can answer at all.
    pub status: String,
    /// Whole seconds of process uptime.
    pub uptime_secs: u64,
    /// Channels currently registered with the hub.
    pub connections: usize,
}

/// Snapshot the current liveness counters.
pub fn health_check(start_time: Instant, connections: usize) -> HealthResponse {
    HealthResponse {
        status: "ok".into(),
        uptime_secs: start_time.elapsed().as_secs(),
        connections,
    }
}
