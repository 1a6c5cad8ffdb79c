//! Presentation timer.
//!
//! Display values are pure functions of `(now, anchor, mode)`. A `TickGuard`
//! re-evaluates one of them on a fixed interval until it is cancelled or
//! dropped; once `cancel` returns (or the guard is gone) no further tick is
//! delivered.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::clock::Clock;
use crate::models::{BreakRecord, WorkSession};
use crate::utils::format_hms;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerMode {
    Work,
    Break,
}

/// Local copy of the instants a display is derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerAnchor {
    pub clock_in: DateTime<Utc>,
    pub total_break_minutes: i64,
    pub break_start: Option<DateTime<Utc>>,
}

impl TimerAnchor {
    /// `None` unless the session is open.
    pub fn from_state(session: &WorkSession, active_break: Option<&BreakRecord>) -> Option<Self> {
        if !session.is_open() {
            return None;
        }
        Some(Self {
            clock_in: session.clock_in,
            total_break_minutes: session.total_break_minutes,
            break_start: active_break
                .filter(|b| b.session_id == session.id && b.is_active())
                .map(|b| b.break_start),
        })
    }

    /// The timer that moves; the other one is frozen.
    pub fn live_mode(&self) -> TimerMode {
        if self.break_start.is_some() {
            TimerMode::Break
        } else {
            TimerMode::Work
        }
    }

    /// Net work seconds. Frozen at `break_start` while a break runs.
    pub fn work_seconds(&self, now: DateTime<Utc>) -> i64 {
        let until = self.break_start.unwrap_or(now);
        ((until - self.clock_in).num_seconds() - self.total_break_minutes * 60).max(0)
    }

    /// Seconds into the running break, zero when there is none.
    pub fn break_seconds(&self, now: DateTime<Utc>) -> i64 {
        self.break_start
            .map(|start| (now - start).num_seconds().max(0))
            .unwrap_or(0)
    }

    pub fn seconds(&self, now: DateTime<Utc>, mode: TimerMode) -> i64 {
        match mode {
            TimerMode::Work => self.work_seconds(now),
            TimerMode::Break => self.break_seconds(now),
        }
    }
}

/// `HH:MM:SS` for `mode`; all zeros without an anchor.
pub fn render(now: DateTime<Utc>, anchor: Option<&TimerAnchor>, mode: TimerMode) -> String {
    format_hms(anchor.map(|a| a.seconds(now, mode)).unwrap_or(0))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Tick {
    pub mode: TimerMode,
    pub seq: u64,
    pub seconds: i64,
    pub display: String,
}

/// Owner of one running tick task.
pub struct TickGuard {
    mode: TimerMode,
    token: CancellationToken,
    // held while a tick is delivered; taken by cancellation
    gate: Arc<Mutex<()>>,
    handle: Option<JoinHandle<()>>,
}

impl TickGuard {
    /// Start ticking `mode` every `interval`. The first tick fires
    /// immediately.
    pub fn spawn<F>(
        anchor: TimerAnchor,
        mode: TimerMode,
        clock: Arc<dyn Clock>,
        interval: Duration,
        mut on_tick: F,
    ) -> Self
    where
        F: FnMut(Tick) + Send + 'static,
    {
        let token = CancellationToken::new();
        let gate = Arc::new(Mutex::new(()));

        let task_token = token.clone();
        let task_gate = Arc::clone(&gate);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            let mut seq = 0u64;

            loop {
                tokio::select! {
                    biased;
                    _ = task_token.cancelled() => break,
                    _ = ticker.tick() => {
                        let _delivering = task_gate.lock().unwrap_or_else(|p| p.into_inner());
                        if task_token.is_cancelled() {
                            break;
                        }
                        seq += 1;
                        let seconds = anchor.seconds(clock.now(), mode);
                        on_tick(Tick {
                            mode,
                            seq,
                            seconds,
                            display: format_hms(seconds),
                        });
                    }
                }
            }
            tracing::trace!(?mode, ticks = seq, "tick task finished");
        });

        Self {
            mode,
            token,
            gate,
            handle: Some(handle),
        }
    }

    pub fn mode(&self) -> TimerMode {
        self.mode
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Stop ticking and wait for the task to finish.
    pub async fn cancel(mut self) {
        self.stop();
        if let Some(handle) = self.handle.take()
            && let Err(e) = handle.await
            && e.is_panic()
        {
            tracing::warn!("tick task panicked: {}", e);
        }
    }

    fn stop(&self) {
        self.token.cancel();
        // wait out a tick being delivered right now
        drop(self.gate.lock().unwrap_or_else(|p| p.into_inner()));
    }
}

impl Drop for TickGuard {
    fn drop(&mut self) {
        self.stop();
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{SessionId, UserId};
    use chrono::TimeZone;

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, h, m, s).unwrap()
    }

    fn anchor(break_start: Option<DateTime<Utc>>) -> TimerAnchor {
        TimerAnchor {
            clock_in: at(9, 0, 0),
            total_break_minutes: 15,
            break_start,
        }
    }

    #[test]
    fn work_runs_net_of_finished_breaks() {
        let a = anchor(None);
        assert_eq!(a.live_mode(), TimerMode::Work);
        assert_eq!(render(at(10, 0, 5), Some(&a), TimerMode::Work), "00:45:05");
        assert_eq!(render(at(10, 0, 5), Some(&a), TimerMode::Break), "00:00:00");
    }

    #[test]
    fn work_freezes_while_break_runs() {
        let a = anchor(Some(at(12, 0, 0)));
        assert_eq!(a.live_mode(), TimerMode::Break);
        assert_eq!(a.work_seconds(at(12, 0, 0)), a.work_seconds(at(12, 30, 0)));
        assert_eq!(render(at(12, 10, 30), Some(&a), TimerMode::Break), "00:10:30");
    }

    #[test]
    fn no_anchor_renders_zero() {
        assert_eq!(render(at(12, 0, 0), None, TimerMode::Work), "00:00:00");
    }

    #[test]
    fn closed_session_has_no_anchor() {
        let mut s = WorkSession::open(UserId::from("ana"), at(9, 0, 0));
        assert!(TimerAnchor::from_state(&s, None).is_some());
        s.status = crate::models::SessionStatus::Closed;
        assert!(TimerAnchor::from_state(&s, None).is_none());

        let foreign = BreakRecord::start(SessionId::new(), at(10, 0, 0));
        let open = WorkSession::open(UserId::from("ana"), at(9, 0, 0));
        let a = TimerAnchor::from_state(&open, Some(&foreign)).unwrap();
        assert_eq!(a.break_start, None);
    }
}
