use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use edgarq_core::Clock;

/// A clock that only moves when told to. Lets stale-sweep and
/// consecutive-failure windowing tests assert exact before/after behavior
/// around a threshold instead of racing wall-clock time.
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn at(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn epoch() -> Self {
        Self::at(DateTime::UNIX_EPOCH)
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().expect("ManualClock mutex poisoned");
        *now += by;
    }

    pub fn set(&self, to: DateTime<Utc>) {
        *self.now.lock().expect("ManualClock mutex poisoned") = to;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().expect("ManualClock mutex poisoned")
    }
}
