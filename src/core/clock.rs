use chrono::{DateTime, Duration, SubsecRound, Utc};
use std::sync::Mutex;

/// Source of the authoritative instant for every lifecycle operation.
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock that never goes backwards within one process. Instants are
/// truncated to microseconds, the precision the stores keep.
#[derive(Debug)]
pub struct SystemClock {
    last: Mutex<DateTime<Utc>>,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            last: Mutex::new(DateTime::<Utc>::MIN_UTC),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        let mut last = self.last.lock().unwrap_or_else(|p| p.into_inner());
        let now = Utc::now().trunc_subsecs(6).max(*last);
        *last = now;
        now
    }
}

/// Settable clock for tests and demos.
#[derive(Debug)]
pub struct ManualClock {
    current: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            current: Mutex::new(start),
        }
    }

    pub fn set(&self, to: DateTime<Utc>) {
        *self.current.lock().unwrap_or_else(|p| p.into_inner()) = to;
    }

    pub fn advance(&self, by: Duration) {
        let mut cur = self.current.lock().unwrap_or_else(|p| p.into_inner());
        *cur += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.current.lock().unwrap_or_else(|p| p.into_inner())
    }
}
