//! Storage contract consumed by the lifecycle engine and the correction
//! workflow.
//!
//! The contract:
//!
//! - `transact(ops)` applies a batch of inserts and guarded updates
//!   atomically. Either every op commits or none does, and the first failing
//!   op is reported (`Conflict`, `PreconditionFailed`, `NotFound`).
//! - `find_*` return one record or many, in the canonical order of the table:
//!   sessions by `clock_in` descending, breaks by `break_start` ascending,
//!   corrections by `created_at` descending.
//!
//! Uniqueness invariants live in the store, not in callers:
//!
//! - at most one `open` session per user,
//! - at most one break without `break_end` per session,
//! - a break can only be inserted while its session is open.
//!
//! Every successful `UpdateSession` bumps the row's `version`; passing the
//! version read earlier in a `SessionGuard` turns the update into a
//! compare-and-set, which is how concurrent writers against one session row
//! are serialized.

pub mod memory;
pub mod migrate;
pub mod sqlite;

mod log;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::config::{Config, StoreBackend};
use crate::errors::{AppResult, StoreError};
use crate::models::{
    BreakId, BreakRecord, CorrectionId, CorrectionRequest, CorrectionStatus, SessionId,
    SessionStatus, UserId, WorkSession,
};

pub use log::{AuditEntry, describe};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

// ── Filters ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionFilter {
    pub id: Option<SessionId>,
    pub user_id: Option<UserId>,
    pub status: Option<SessionStatus>,
    /// Inclusive lower bound on `clock_in`.
    pub clock_in_from: Option<DateTime<Utc>>,
    /// Exclusive upper bound on `clock_in`.
    pub clock_in_before: Option<DateTime<Utc>>,
}

impl SessionFilter {
    pub fn by_id(id: SessionId) -> Self {
        Self {
            id: Some(id),
            ..Self::default()
        }
    }

    pub fn for_user(user: &UserId) -> Self {
        Self {
            user_id: Some(user.clone()),
            ..Self::default()
        }
    }

    pub fn open_for(user: &UserId) -> Self {
        Self {
            user_id: Some(user.clone()),
            status: Some(SessionStatus::Open),
            ..Self::default()
        }
    }

    pub fn with_status(mut self, status: SessionStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn clock_in_between(mut self, from: DateTime<Utc>, before: DateTime<Utc>) -> Self {
        self.clock_in_from = Some(from);
        self.clock_in_before = Some(before);
        self
    }

    pub fn matches(&self, s: &WorkSession) -> bool {
        self.id.is_none_or(|id| s.id == id)
            && self.user_id.as_ref().is_none_or(|u| &s.user_id == u)
            && self.status.is_none_or(|st| s.status == st)
            && self.clock_in_from.is_none_or(|from| s.clock_in >= from)
            && self.clock_in_before.is_none_or(|before| s.clock_in < before)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BreakFilter {
    pub id: Option<BreakId>,
    pub session_id: Option<SessionId>,
    /// `Some(true)` → only breaks without `break_end`.
    pub active: Option<bool>,
}

impl BreakFilter {
    pub fn of_session(session_id: SessionId) -> Self {
        Self {
            session_id: Some(session_id),
            ..Self::default()
        }
    }

    pub fn active_in(session_id: SessionId) -> Self {
        Self {
            session_id: Some(session_id),
            active: Some(true),
            ..Self::default()
        }
    }

    pub fn matches(&self, b: &BreakRecord) -> bool {
        self.id.is_none_or(|id| b.id == id)
            && self.session_id.is_none_or(|sid| b.session_id == sid)
            && self.active.is_none_or(|active| b.is_active() == active)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CorrectionFilter {
    pub id: Option<CorrectionId>,
    pub session_id: Option<SessionId>,
    pub requested_by: Option<UserId>,
    pub status: Option<CorrectionStatus>,
}

impl CorrectionFilter {
    pub fn by_id(id: CorrectionId) -> Self {
        Self {
            id: Some(id),
            ..Self::default()
        }
    }

    pub fn matches(&self, c: &CorrectionRequest) -> bool {
        self.id.is_none_or(|id| c.id == id)
            && self.session_id.is_none_or(|sid| c.session_id == sid)
            && self.requested_by.as_ref().is_none_or(|u| &c.requested_by == u)
            && self.status.is_none_or(|st| c.status == st)
    }
}

// ── Guarded writes ──────────────────────────────────────────────────────

/// Predicate an `UpdateSession` must satisfy to apply.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionGuard {
    pub status: Option<SessionStatus>,
    pub version: Option<i64>,
}

impl SessionGuard {
    /// Row must still be open and unchanged since `version` was read.
    pub fn open_at(version: i64) -> Self {
        Self {
            status: Some(SessionStatus::Open),
            version: Some(version),
        }
    }

    /// Row must be unchanged since `version` was read, whatever its status.
    pub fn at(version: i64) -> Self {
        Self {
            status: None,
            version: Some(version),
        }
    }

    pub fn holds(&self, s: &WorkSession) -> bool {
        self.status.is_none_or(|st| s.status == st) && self.version.is_none_or(|v| s.version == v)
    }
}

/// Columns an `UpdateSession` overwrites. `None` leaves the column as is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionPatch {
    pub clock_in: Option<DateTime<Utc>>,
    pub clock_out: Option<DateTime<Utc>>,
    pub status: Option<SessionStatus>,
    pub total_break_minutes: Option<i64>,
    pub total_work_minutes: Option<i64>,
}

impl SessionPatch {
    pub fn apply_to(&self, s: &mut WorkSession) {
        if let Some(v) = self.clock_in {
            s.clock_in = v;
        }
        if let Some(v) = self.clock_out {
            s.clock_out = Some(v);
        }
        if let Some(v) = self.status {
            s.status = v;
        }
        if let Some(v) = self.total_break_minutes {
            s.total_break_minutes = v;
        }
        if let Some(v) = self.total_work_minutes {
            s.total_work_minutes = Some(v);
        }
        s.version += 1;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorrectionPatch {
    pub status: CorrectionStatus,
    pub reviewed_by: UserId,
    pub reviewed_at: DateTime<Utc>,
    pub reviewer_comment: Option<String>,
}

impl CorrectionPatch {
    pub fn apply_to(&self, c: &mut CorrectionRequest) {
        c.status = self.status;
        c.reviewed_by = Some(self.reviewed_by.clone());
        c.reviewed_at = Some(self.reviewed_at);
        c.reviewer_comment = self.reviewer_comment.clone();
    }
}

/// One step of a `transact` batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOp {
    InsertSession(WorkSession),
    /// Fails with `PreconditionFailed` on `work_sessions` unless the owning
    /// session is open.
    InsertBreak(BreakRecord),
    InsertCorrection(CorrectionRequest),
    UpdateSession {
        id: SessionId,
        guard: SessionGuard,
        patch: SessionPatch,
    },
    /// Sets `break_end`; only applies to a break that is still active.
    CloseBreak { id: BreakId, break_end: DateTime<Utc> },
    /// Only applies while the request is still in `expect`.
    UpdateCorrection {
        id: CorrectionId,
        expect: CorrectionStatus,
        patch: CorrectionPatch,
    },
}

impl WriteOp {
    /// Short operation name, used by the audit log.
    pub fn name(&self) -> &'static str {
        match self {
            WriteOp::InsertSession(_) => "insert_session",
            WriteOp::InsertBreak(_) => "insert_break",
            WriteOp::InsertCorrection(_) => "insert_correction",
            WriteOp::UpdateSession { .. } => "update_session",
            WriteOp::CloseBreak { .. } => "close_break",
            WriteOp::UpdateCorrection { .. } => "update_correction",
        }
    }

    /// Primary key of the row the op touches.
    pub fn target(&self) -> String {
        match self {
            WriteOp::InsertSession(s) => s.id.to_db_string(),
            WriteOp::InsertBreak(b) => b.id.to_db_string(),
            WriteOp::InsertCorrection(c) => c.id.to_db_string(),
            WriteOp::UpdateSession { id, .. } => id.to_db_string(),
            WriteOp::CloseBreak { id, .. } => id.to_db_string(),
            WriteOp::UpdateCorrection { id, .. } => id.to_db_string(),
        }
    }
}

// ── Contract ────────────────────────────────────────────────────────────

/// Durable, transactional record keeper.
///
/// Implementations must be `Send + Sync + 'static` so one instance can be
/// shared behind an `Arc` by every concurrent unit of work.
#[async_trait]
pub trait Store: Send + Sync + 'static {
    /// Human-readable backend name ("sqlite", "memory").
    fn backend(&self) -> &'static str;

    /// Apply `ops` as one atomic unit.
    async fn transact(&self, ops: Vec<WriteOp>) -> Result<(), StoreError>;

    async fn find_session(&self, filter: SessionFilter) -> Result<Option<WorkSession>, StoreError>;

    async fn find_sessions(
        &self,
        filter: SessionFilter,
        limit: Option<usize>,
    ) -> Result<Vec<WorkSession>, StoreError>;

    async fn find_break(&self, filter: BreakFilter) -> Result<Option<BreakRecord>, StoreError>;

    async fn find_breaks(
        &self,
        filter: BreakFilter,
        limit: Option<usize>,
    ) -> Result<Vec<BreakRecord>, StoreError>;

    async fn find_correction(
        &self,
        filter: CorrectionFilter,
    ) -> Result<Option<CorrectionRequest>, StoreError>;

    async fn find_corrections(
        &self,
        filter: CorrectionFilter,
        limit: Option<usize>,
    ) -> Result<Vec<CorrectionRequest>, StoreError>;

    /// Most recent audit entries, newest first.
    async fn audit_log(&self, limit: usize) -> Result<Vec<AuditEntry>, StoreError>;

    /// Single-op convenience over `transact`.
    async fn apply(&self, op: WriteOp) -> Result<(), StoreError> {
        self.transact(vec![op]).await
    }
}

/// Open the store selected by the configuration.
pub fn open_store(cfg: &Config) -> AppResult<Arc<dyn Store>> {
    match cfg.store {
        StoreBackend::Memory => {
            tracing::info!("using in-memory store; nothing will be persisted");
            Ok(Arc::new(MemoryStore::new()))
        }
        StoreBackend::Sqlite => {
            let store = SqliteStore::open(&cfg.database)?;
            Ok(Arc::new(store))
        }
    }
}
