//! Injected clock, so tests get deterministic creation times.
use std::time::{SystemTime, UNIX_EPOCH};

/// Source of "now", in seconds since the unix epoch.
pub trait Clock {
    fn now(&self) -> i64;
}

/// The system clock.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0)
    }
}

/// A clock frozen at a fixed time.
#[derive(Clone, Copy, Debug, Default)]
pub struct FixedClock(pub i64);

impl Clock for FixedClock {
    fn now(&self) -> i64 {
        self.0
    }
}
