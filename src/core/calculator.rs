//! Duration arithmetic shared by the engine, the stats and the timer.
//!
//! All stored durations are whole minutes, rounded down per interval.

use chrono::{DateTime, Utc};

use crate::models::BreakRecord;
use crate::utils::time::{floor_minutes, signed_floor_minutes};

/// Net work of a closed interval after breaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetWork {
    /// Value to store; never negative.
    pub minutes: i64,
    /// Value before clamping.
    pub raw: i64,
}

impl NetWork {
    pub fn clamped(&self) -> bool {
        self.raw < 0
    }
}

/// `max(0, floor((out - in) / 60s) - break_minutes)`
pub fn net_work_minutes(
    clock_in: DateTime<Utc>,
    clock_out: DateTime<Utc>,
    break_minutes: i64,
) -> NetWork {
    let raw = signed_floor_minutes(clock_in, clock_out) - break_minutes;
    NetWork {
        minutes: raw.max(0),
        raw,
    }
}

/// Minutes credited for one break ending at `end`.
pub fn break_minutes(start: DateTime<Utc>, end: DateTime<Utc>) -> i64 {
    floor_minutes(start, end)
}

/// Sum of floored minutes of every finished break.
pub fn accumulated_break_minutes(breaks: &[BreakRecord]) -> i64 {
    breaks
        .iter()
        .filter_map(|b| b.break_end.map(|end| break_minutes(b.break_start, end)))
        .sum()
}
