use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use super::engine::{ClockOutOutcome, EndBreakOutcome, LifecycleEngine};
use super::timer::{Tick, TickGuard, TimerAnchor, TimerMode, render};
use crate::errors::{EngineError, EngineResult};
use crate::models::{BreakRecord, SessionId, UserId, WorkSession};

/// Client-side holder of one user's session view.
///
/// Issues intents to the engine and, whatever their outcome, re-reads the
/// engine's state and re-anchors the timers from it. Ticks from the live
/// timer are sent on the channel returned by `new`.
pub struct SessionController {
    engine: Arc<LifecycleEngine>,
    user: UserId,
    interval: Duration,
    session: Option<WorkSession>,
    active_break: Option<BreakRecord>,
    anchor: Option<TimerAnchor>,
    work_guard: Option<TickGuard>,
    break_guard: Option<TickGuard>,
    ticks: mpsc::UnboundedSender<Tick>,
}

impl SessionController {
    pub fn new(
        engine: Arc<LifecycleEngine>,
        user: UserId,
        interval: Duration,
    ) -> (Self, mpsc::UnboundedReceiver<Tick>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let controller = Self {
            engine,
            user,
            interval,
            session: None,
            active_break: None,
            anchor: None,
            work_guard: None,
            break_guard: None,
            ticks: tx,
        };
        (controller, rx)
    }

    pub fn session(&self) -> Option<&WorkSession> {
        self.session.as_ref()
    }

    pub fn active_break(&self) -> Option<&BreakRecord> {
        self.active_break.as_ref()
    }

    pub fn anchor(&self) -> Option<&TimerAnchor> {
        self.anchor.as_ref()
    }

    /// Mode of the running tick task, if any.
    pub fn live_mode(&self) -> Option<TimerMode> {
        self.work_guard
            .as_ref()
            .or(self.break_guard.as_ref())
            .map(|g| g.mode())
    }

    /// `(work, break)` displays at the current instant.
    pub fn display(&self) -> (String, String) {
        let now = self.engine.now();
        (
            render(now, self.anchor.as_ref(), TimerMode::Work),
            render(now, self.anchor.as_ref(), TimerMode::Break),
        )
    }

    /// Re-read the open session and its active break, then re-anchor.
    pub async fn refresh(&mut self) -> EngineResult<()> {
        self.stop_timers().await;
        self.anchor = None;

        let session = self.engine.get_open_session(&self.user).await?;
        let active_break = match &session {
            Some(s) => self.engine.get_active_break(s.id).await?,
            None => None,
        };

        self.anchor = session
            .as_ref()
            .and_then(|s| TimerAnchor::from_state(s, active_break.as_ref()));
        self.session = session;
        self.active_break = active_break;

        if let Some(anchor) = self.anchor {
            let mode = anchor.live_mode();
            let tx = self.ticks.clone();
            let guard = TickGuard::spawn(
                anchor,
                mode,
                Arc::clone(self.engine.clock()),
                self.interval,
                move |tick| {
                    // receiver gone means nobody is watching
                    let _ = tx.send(tick);
                },
            );
            match mode {
                TimerMode::Work => self.work_guard = Some(guard),
                TimerMode::Break => self.break_guard = Some(guard),
            }
        }
        Ok(())
    }

    pub async fn clock_in(&mut self) -> EngineResult<WorkSession> {
        let res = self.engine.clock_in(&self.user).await;
        self.settle(res).await
    }

    pub async fn clock_out(&mut self) -> EngineResult<ClockOutOutcome> {
        let res = self.engine.clock_out(&self.user).await;
        self.settle(res).await
    }

    pub async fn start_break(&mut self) -> EngineResult<BreakRecord> {
        let res = match self.current_session_id().await? {
            Some(id) => self.engine.start_break(id).await,
            None => Err(EngineError::NotClockedIn(self.user.to_string())),
        };
        self.settle(res).await
    }

    pub async fn end_break(&mut self) -> EngineResult<EndBreakOutcome> {
        let res = match self.current_session_id().await? {
            Some(id) => self.engine.end_break(id).await,
            None => Err(EngineError::NotClockedIn(self.user.to_string())),
        };
        self.settle(res).await
    }

    /// Cancel both timers and wait for their tasks.
    pub async fn shutdown(mut self) {
        self.stop_timers().await;
    }

    async fn current_session_id(&mut self) -> EngineResult<Option<SessionId>> {
        if self.session.is_none() {
            self.refresh().await?;
        }
        Ok(self.session.as_ref().map(|s| s.id))
    }

    /// Re-anchor after an intent. The intent's own error wins over a
    /// failure to refresh.
    async fn settle<T>(&mut self, res: EngineResult<T>) -> EngineResult<T> {
        let refreshed = self.refresh().await;
        if let Err(e) = &refreshed {
            tracing::warn!(user = %self.user, "re-anchoring failed: {}", e);
        }
        let value = res?;
        refreshed?;
        Ok(value)
    }

    async fn stop_timers(&mut self) {
        if let Some(g) = self.work_guard.take() {
            g.cancel().await;
        }
        if let Some(g) = self.break_guard.take() {
            g.cancel().await;
        }
    }
}
