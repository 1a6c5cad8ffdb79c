//! Work-session and break lifecycle.
//!
//! Every write is a single `transact` batch guarded by the session row's
//! `version`. When the guard fails the operation re-reads, re-checks its
//! preconditions and tries again, `conflict_retries` times at most.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use super::calculator::{break_minutes, net_work_minutes};
use super::clock::Clock;
use crate::config::Config;
use crate::errors::{EngineError, EngineResult, EngineWarning, StoreError, Table};
use crate::models::{
    BreakRecord, CorrectionApplied, SessionId, SessionStatus, UserId, WorkSession,
};
use crate::store::{BreakFilter, SessionFilter, SessionGuard, SessionPatch, Store, WriteOp};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineSettings {
    pub store_timeout: Duration,
    pub conflict_retries: u32,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            store_timeout: Duration::from_secs(5),
            conflict_retries: 3,
        }
    }
}

impl From<&Config> for EngineSettings {
    fn from(cfg: &Config) -> Self {
        Self {
            store_timeout: cfg.store_timeout(),
            conflict_retries: cfg.conflict_retries,
        }
    }
}

/// Result of closing a session, by hand or by the stale-session sweep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClockOutOutcome {
    pub session: WorkSession,
    /// Break that was still running and got closed with the session.
    pub closed_break: Option<BreakRecord>,
    pub warnings: Vec<EngineWarning>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EndBreakOutcome {
    pub record: BreakRecord,
    /// Minutes credited to the session for this break.
    pub minutes: i64,
    pub session: WorkSession,
}

/// Result of applying an approved correction to its session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CorrectionOutcome {
    pub session: WorkSession,
    pub warnings: Vec<EngineWarning>,
}

/// What a guarded batch did.
enum Attempt<T> {
    Done(T),
    /// The session row moved under us; re-read and try again.
    Retry,
}

pub struct LifecycleEngine {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    settings: EngineSettings,
}

impl LifecycleEngine {
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>, settings: EngineSettings) -> Self {
        Self {
            store,
            clock,
            settings,
        }
    }

    pub fn from_config(store: Arc<dyn Store>, clock: Arc<dyn Clock>, cfg: &Config) -> Self {
        Self::new(store, clock, EngineSettings::from(cfg))
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    fn attempts(&self) -> u32 {
        self.settings.conflict_retries + 1
    }

    /// Bound a store call by the configured timeout.
    ///
    /// The outer error is the timeout; the inner result is the store's own
    /// answer, left for the caller to classify.
    pub(crate) async fn bounded<T, F>(
        &self,
        what: &str,
        fut: F,
    ) -> EngineResult<Result<T, StoreError>>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        match tokio::time::timeout(self.settings.store_timeout, fut).await {
            Ok(res) => Ok(res),
            Err(_) => {
                tracing::warn!(
                    what,
                    timeout_ms = self.settings.store_timeout.as_millis() as u64,
                    "store call timed out"
                );
                Err(EngineError::StoreUnavailable(format!(
                    "{} timed out after {} ms",
                    what,
                    self.settings.store_timeout.as_millis()
                )))
            }
        }
    }

    /// Bounded read; any store failure is infrastructure.
    pub(crate) async fn read<T, F>(&self, what: &str, fut: F) -> EngineResult<T>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        Ok(self.bounded(what, fut).await??)
    }

    pub(crate) async fn commit(&self, ops: Vec<WriteOp>) -> EngineResult<Result<(), StoreError>> {
        tracing::debug!(ops = ops.len(), "transact");
        self.bounded("transact", self.store.transact(ops)).await
    }

    async fn load_session(&self, id: SessionId) -> EngineResult<Option<WorkSession>> {
        self.read("find_session", self.store.find_session(SessionFilter::by_id(id)))
            .await
    }

    // ── Intents ─────────────────────────────────────────────────────────

    pub async fn clock_in(&self, user: &UserId) -> EngineResult<WorkSession> {
        let session = WorkSession::open(user.clone(), self.clock.now());

        match self
            .commit(vec![WriteOp::InsertSession(session.clone())])
            .await?
        {
            Ok(()) => {
                tracing::info!(user = %user, session = %session.id, "clocked in");
                Ok(session)
            }
            Err(StoreError::Conflict {
                table: Table::WorkSessions,
                ..
            }) => Err(EngineError::AlreadyClockedIn(user.to_string())),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn clock_out(&self, user: &UserId) -> EngineResult<ClockOutOutcome> {
        let attempts = self.attempts();
        let mut last_seen = SessionId::default();
        for attempt in 1..=attempts {
            let session = self
                .read("find_session", self.store.find_session(SessionFilter::open_for(user)))
                .await?
                .ok_or_else(|| EngineError::NotClockedIn(user.to_string()))?;
            last_seen = session.id;

            match self.try_close(session, SessionStatus::Closed).await? {
                Attempt::Done(outcome) => {
                    tracing::info!(
                        user = %user,
                        session = %outcome.session.id,
                        work = outcome.session.total_work_minutes.unwrap_or(0),
                        "clocked out"
                    );
                    return Ok(outcome);
                }
                Attempt::Retry => {
                    tracing::debug!(user = %user, attempt, "clock-out raced, retrying")
                }
            }
        }

        Err(EngineError::ConcurrentModification {
            session: last_seen,
            attempts,
        })
    }

    pub async fn start_break(&self, session_id: SessionId) -> EngineResult<BreakRecord> {
        let attempts = self.attempts();
        for attempt in 1..=attempts {
            let session = self
                .load_session(session_id)
                .await?
                .ok_or(EngineError::SessionNotFound(session_id))?;
            if !session.is_open() {
                return Err(EngineError::NoActiveSession(session_id));
            }
            if self.get_active_break(session_id).await?.is_some() {
                return Err(EngineError::BreakAlreadyActive(session_id));
            }

            let record = BreakRecord::start(session_id, self.clock.now());
            let ops = vec![
                WriteOp::InsertBreak(record.clone()),
                // bump the version so a concurrent clock-out sees us
                WriteOp::UpdateSession {
                    id: session_id,
                    guard: SessionGuard::open_at(session.version),
                    patch: SessionPatch::default(),
                },
            ];

            match self.commit(ops).await? {
                Ok(()) => {
                    tracing::info!(session = %session_id, "break started");
                    return Ok(record);
                }
                Err(StoreError::Conflict {
                    table: Table::Breaks,
                    ..
                }) => return Err(EngineError::BreakAlreadyActive(session_id)),
                Err(e) if is_session_race(&e) => {
                    tracing::debug!(session = %session_id, attempt, "start-break raced, retrying")
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(EngineError::ConcurrentModification {
            session: session_id,
            attempts,
        })
    }

    pub async fn end_break(&self, session_id: SessionId) -> EngineResult<EndBreakOutcome> {
        let attempts = self.attempts();
        for attempt in 1..=attempts {
            let session = self
                .load_session(session_id)
                .await?
                .ok_or(EngineError::SessionNotFound(session_id))?;
            let active = self
                .get_active_break(session_id)
                .await?
                .ok_or(EngineError::NoActiveBreak(session_id))?;

            let now = self.clock.now();
            let minutes = break_minutes(active.break_start, now);
            let patch = SessionPatch {
                total_break_minutes: Some(session.total_break_minutes + minutes),
                ..SessionPatch::default()
            };
            let ops = vec![
                WriteOp::CloseBreak {
                    id: active.id,
                    break_end: now,
                },
                WriteOp::UpdateSession {
                    id: session_id,
                    guard: SessionGuard::open_at(session.version),
                    patch: patch.clone(),
                },
            ];

            match self.commit(ops).await? {
                Ok(()) => {
                    let mut session = session;
                    patch.apply_to(&mut session);
                    let record = BreakRecord {
                        break_end: Some(now),
                        ..active
                    };
                    tracing::info!(session = %session_id, minutes, "break ended");
                    return Ok(EndBreakOutcome {
                        record,
                        minutes,
                        session,
                    });
                }
                Err(e) if is_session_race(&e) => {
                    tracing::debug!(session = %session_id, attempt, "end-break raced, retrying")
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(EngineError::ConcurrentModification {
            session: session_id,
            attempts,
        })
    }

    /// Close every session open for longer than `max_open` as `auto_closed`.
    pub async fn auto_close_stale(
        &self,
        max_open: chrono::Duration,
    ) -> EngineResult<Vec<ClockOutOutcome>> {
        let now = self.clock.now();
        let cutoff = now.checked_sub_signed(max_open).ok_or_else(|| {
            EngineError::InvalidProposal(format!(
                "auto-close threshold of {} h reaches before the earliest instant",
                max_open.num_hours()
            ))
        })?;
        let filter = SessionFilter {
            clock_in_before: Some(cutoff),
            ..SessionFilter::default()
        }
        .with_status(SessionStatus::Open);
        let stale = self
            .read("find_sessions", self.store.find_sessions(filter, None))
            .await?;

        let mut closed = Vec::new();
        for candidate in stale {
            if let Some(outcome) = self.auto_close_one(candidate.id).await? {
                tracing::info!(
                    user = %outcome.session.user_id,
                    session = %outcome.session.id,
                    "auto-closed stale session"
                );
                closed.push(outcome);
            }
        }
        Ok(closed)
    }

    async fn auto_close_one(&self, id: SessionId) -> EngineResult<Option<ClockOutOutcome>> {
        let attempts = self.attempts();
        for _ in 0..attempts {
            let Some(session) = self.load_session(id).await?.filter(|s| s.is_open()) else {
                // closed by its owner in the meantime
                return Ok(None);
            };
            if let Attempt::Done(outcome) =
                self.try_close(session, SessionStatus::AutoClosed).await?
            {
                return Ok(Some(outcome));
            }
        }
        Err(EngineError::ConcurrentModification {
            session: id,
            attempts,
        })
    }

    /// One guarded attempt at closing `session` with `status`.
    async fn try_close(
        &self,
        session: WorkSession,
        status: SessionStatus,
    ) -> EngineResult<Attempt<ClockOutOutcome>> {
        let active = self.get_active_break(session.id).await?;
        let now = self.clock.now();

        let mut ops = Vec::with_capacity(2);
        let mut total_break = session.total_break_minutes;
        let closed_break = active.map(|b| {
            total_break += break_minutes(b.break_start, now);
            ops.push(WriteOp::CloseBreak {
                id: b.id,
                break_end: now,
            });
            BreakRecord {
                break_end: Some(now),
                ..b
            }
        });

        let net = net_work_minutes(session.clock_in, now, total_break);
        let patch = SessionPatch {
            clock_out: Some(now),
            status: Some(status),
            total_break_minutes: Some(total_break),
            total_work_minutes: Some(net.minutes),
            ..SessionPatch::default()
        };
        ops.push(WriteOp::UpdateSession {
            id: session.id,
            guard: SessionGuard::open_at(session.version),
            patch: patch.clone(),
        });

        match self.commit(ops).await? {
            Ok(()) => {
                let warnings = clamp_warnings(session.id, net.raw);
                let mut session = session;
                patch.apply_to(&mut session);
                Ok(Attempt::Done(ClockOutOutcome {
                    session,
                    closed_break,
                    warnings,
                }))
            }
            Err(e) if is_session_race(&e) => Ok(Attempt::Retry),
            Err(e) => Err(e.into()),
        }
    }

    /// Overwrite the target session with the corrected times.
    ///
    /// `prefix` ops (the correction's own status change) are committed in
    /// the same batch. Races on the session row are retried; a failure of
    /// a `prefix` op is handed back untouched as the inner error.
    pub(crate) async fn apply_correction(
        &self,
        effect: &CorrectionApplied,
        prefix: Vec<WriteOp>,
    ) -> EngineResult<Result<CorrectionOutcome, StoreError>> {
        let attempts = self.attempts();
        for attempt in 1..=attempts {
            let session = self
                .load_session(effect.session_id)
                .await?
                .ok_or(EngineError::SessionNotFound(effect.session_id))?;
            let active = self.get_active_break(session.id).await?;

            let mut ops = prefix.clone();
            let mut total_break = session.total_break_minutes;
            if let Some(b) = active {
                let now = self.clock.now();
                total_break += break_minutes(b.break_start, now);
                ops.push(WriteOp::CloseBreak {
                    id: b.id,
                    break_end: now,
                });
            }

            let net = net_work_minutes(effect.clock_in, effect.clock_out, total_break);
            let patch = SessionPatch {
                clock_in: Some(effect.clock_in),
                clock_out: Some(effect.clock_out),
                status: Some(SessionStatus::Corrected),
                total_break_minutes: Some(total_break),
                total_work_minutes: Some(net.minutes),
            };
            ops.push(WriteOp::UpdateSession {
                id: session.id,
                guard: SessionGuard::at(session.version),
                patch: patch.clone(),
            });

            match self.commit(ops).await? {
                Ok(()) => {
                    let warnings = clamp_warnings(session.id, net.raw);
                    let mut session = session;
                    patch.apply_to(&mut session);
                    tracing::info!(
                        session = %session.id,
                        correction = %effect.correction_id,
                        "correction applied"
                    );
                    return Ok(Ok(CorrectionOutcome { session, warnings }));
                }
                Err(e) if is_session_race(&e) => {
                    tracing::debug!(
                        session = %effect.session_id,
                        attempt,
                        "correction raced, retrying"
                    )
                }
                Err(e) => return Ok(Err(e)),
            }
        }

        Err(EngineError::ConcurrentModification {
            session: effect.session_id,
            attempts,
        })
    }

    // ── Reads ───────────────────────────────────────────────────────────

    pub async fn get_open_session(&self, user: &UserId) -> EngineResult<Option<WorkSession>> {
        self.read("find_session", self.store.find_session(SessionFilter::open_for(user)))
            .await
    }

    pub async fn get_session(&self, id: SessionId) -> EngineResult<WorkSession> {
        self.load_session(id)
            .await?
            .ok_or(EngineError::SessionNotFound(id))
    }

    pub async fn get_active_break(
        &self,
        session_id: SessionId,
    ) -> EngineResult<Option<BreakRecord>> {
        self.read("find_break", self.store.find_break(BreakFilter::active_in(session_id)))
            .await
    }

    /// Most recent first.
    pub async fn list_session_history(
        &self,
        user: &UserId,
        limit: usize,
    ) -> EngineResult<Vec<WorkSession>> {
        self.read(
            "find_sessions",
            self.store
                .find_sessions(SessionFilter::for_user(user), Some(limit)),
        )
        .await
    }

    /// Oldest first.
    pub async fn list_session_breaks(
        &self,
        session_id: SessionId,
    ) -> EngineResult<Vec<BreakRecord>> {
        self.read(
            "find_breaks",
            self.store.find_breaks(BreakFilter::of_session(session_id), None),
        )
        .await
    }

    /// Sessions of `user` whose `clock_in` falls in `[from, before)`.
    pub async fn sessions_between(
        &self,
        user: &UserId,
        from: DateTime<Utc>,
        before: DateTime<Utc>,
    ) -> EngineResult<Vec<WorkSession>> {
        self.read(
            "find_sessions",
            self.store.find_sessions(
                SessionFilter::for_user(user).clock_in_between(from, before),
                None,
            ),
        )
        .await
    }
}

/// The session row changed (or its active break was closed) between our
/// read and our write.
fn is_session_race(err: &StoreError) -> bool {
    matches!(
        err,
        StoreError::PreconditionFailed {
            table: Table::WorkSessions | Table::Breaks,
            ..
        }
    )
}

fn clamp_warnings(session: SessionId, raw_minutes: i64) -> Vec<EngineWarning> {
    if raw_minutes >= 0 {
        return Vec::new();
    }
    let warning = EngineWarning::NegativeDurationClamped {
        session,
        raw_minutes,
    };
    tracing::warn!("{}", warning);
    vec![warning]
}
