//! Process uptime for the health endpoint

use std::sync::OnceLock;
use std::time::Instant;

static STARTED_AT: OnceLock<Instant> = OnceLock::new();

/// Record when the server came up. Later calls keep the first instant.
pub fn mark_started() {
    STARTED_AT.get_or_init(Instant::now);
}

/// Whole seconds since `mark_started`, or zero if it never ran
pub fn uptime_secs() -> u64 {
    STARTED_AT
        .get()
        .map_or(0, |started| started.elapsed().as_secs())
}
