//! Injectable wall clock for session-id derivation.
//!
//! Session ids default to the recording date, so every batch of one night's
//! recording lands in the same session files. The clock is a trait so that
//! the derivation is explicit per request and testable, never read from
//! process-global state.

use chrono::{DateTime, Utc};

/// Source of the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// System UTC clock used in production.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Derive the default session id for a request received at `now`.
pub fn session_id_for(now: DateTime<Utc>) -> String {
    now.format("%Y%m%d").to_string()
}
