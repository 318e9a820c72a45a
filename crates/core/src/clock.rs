//! A single injectable time source. All "now" reads in invariants go
//! through this trait so stale-sweep and consecutive-failure logic can be
//! tested deterministically (SPEC_FULL.md §9, "Time source").

use chrono::{DateTime, Utc};

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Production clock: wall-clock UTC time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
