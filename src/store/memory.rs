//! In-memory `Store`, used for demo/offline operation and in tests.
//!
//! State lives behind a single mutex; `transact` applies the batch to a
//! scratch copy and swaps it in only when every op succeeded, so a failing
//! batch leaves nothing behind.

use async_trait::async_trait;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use super::{AuditEntry, BreakFilter, CorrectionFilter, SessionFilter, Store, WriteOp};
use crate::errors::{StoreError, Table};
use crate::models::{BreakRecord, CorrectionRequest, SessionStatus, WorkSession};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    sessions: Vec<WorkSession>,
    breaks: Vec<BreakRecord>,
    corrections: Vec<CorrectionRequest>,
    log: Vec<AuditEntry>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
    /// Artificial delay before every call; lets tests exercise timeouts.
    latency: Option<Duration>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_latency(latency: Duration) -> Self {
        Self {
            state: Mutex::default(),
            latency: Some(latency),
        }
    }

    /// Drop every record.
    pub fn reset(&self) -> Result<(), StoreError> {
        *self.lock()? = MemoryState::default();
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>, StoreError> {
        self.state
            .lock()
            .map_err(|_| StoreError::Backend("memory store lock poisoned".into()))
    }

    async fn delay(&self) {
        if let Some(d) = self.latency {
            tokio::time::sleep(d).await;
        }
    }
}

fn not_found(table: Table, id: String) -> StoreError {
    StoreError::NotFound { table, id }
}

fn precondition(table: Table, id: String) -> StoreError {
    StoreError::PreconditionFailed { table, id }
}

fn apply_op(state: &mut MemoryState, op: WriteOp) -> Result<(), StoreError> {
    match op {
        WriteOp::InsertSession(session) => {
            if state.sessions.iter().any(|s| s.id == session.id) {
                return Err(StoreError::Conflict {
                    table: Table::WorkSessions,
                    constraint: "primary key".into(),
                });
            }
            if session.status == SessionStatus::Open
                && state
                    .sessions
                    .iter()
                    .any(|s| s.user_id == session.user_id && s.status == SessionStatus::Open)
            {
                return Err(StoreError::Conflict {
                    table: Table::WorkSessions,
                    constraint: "one open session per user".into(),
                });
            }
            state.sessions.push(session);
        }

        WriteOp::InsertBreak(record) => {
            let owner_open = state
                .sessions
                .iter()
                .any(|s| s.id == record.session_id && s.status == SessionStatus::Open);
            if !owner_open {
                return Err(precondition(
                    Table::WorkSessions,
                    record.session_id.to_db_string(),
                ));
            }
            if state.breaks.iter().any(|b| b.id == record.id) {
                return Err(StoreError::Conflict {
                    table: Table::Breaks,
                    constraint: "primary key".into(),
                });
            }
            if record.is_active()
                && state
                    .breaks
                    .iter()
                    .any(|b| b.session_id == record.session_id && b.is_active())
            {
                return Err(StoreError::Conflict {
                    table: Table::Breaks,
                    constraint: "one active break per session".into(),
                });
            }
            state.breaks.push(record);
        }

        WriteOp::InsertCorrection(request) => {
            if state.corrections.iter().any(|c| c.id == request.id) {
                return Err(StoreError::Conflict {
                    table: Table::CorrectionRequests,
                    constraint: "primary key".into(),
                });
            }
            if !state.sessions.iter().any(|s| s.id == request.session_id) {
                return Err(not_found(
                    Table::WorkSessions,
                    request.session_id.to_db_string(),
                ));
            }
            state.corrections.push(request);
        }

        WriteOp::UpdateSession { id, guard, patch } => {
            let session = state
                .sessions
                .iter_mut()
                .find(|s| s.id == id)
                .ok_or_else(|| not_found(Table::WorkSessions, id.to_db_string()))?;
            if !guard.holds(session) {
                return Err(precondition(Table::WorkSessions, id.to_db_string()));
            }
            patch.apply_to(session);
        }

        WriteOp::CloseBreak { id, break_end } => {
            let record = state
                .breaks
                .iter_mut()
                .find(|b| b.id == id)
                .ok_or_else(|| not_found(Table::Breaks, id.to_db_string()))?;
            if !record.is_active() {
                return Err(precondition(Table::Breaks, id.to_db_string()));
            }
            record.break_end = Some(break_end);
        }

        WriteOp::UpdateCorrection { id, expect, patch } => {
            let request = state
                .corrections
                .iter_mut()
                .find(|c| c.id == id)
                .ok_or_else(|| not_found(Table::CorrectionRequests, id.to_db_string()))?;
            if request.status != expect {
                return Err(precondition(Table::CorrectionRequests, id.to_db_string()));
            }
            patch.apply_to(request);
        }
    }
    Ok(())
}

fn take<T>(mut items: Vec<T>, limit: Option<usize>) -> Vec<T> {
    if let Some(n) = limit {
        items.truncate(n);
    }
    items
}

#[async_trait]
impl Store for MemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn transact(&self, ops: Vec<WriteOp>) -> Result<(), StoreError> {
        self.delay().await;
        let mut guard = self.lock()?;
        let mut scratch = guard.clone();
        let entries: Vec<AuditEntry> = ops.iter().map(AuditEntry::for_op).collect();

        for op in ops {
            apply_op(&mut scratch, op)?;
        }

        scratch.log.extend(entries);
        *guard = scratch;
        Ok(())
    }

    async fn find_session(&self, filter: SessionFilter) -> Result<Option<WorkSession>, StoreError> {
        Ok(self.find_sessions(filter, Some(1)).await?.into_iter().next())
    }

    async fn find_sessions(
        &self,
        filter: SessionFilter,
        limit: Option<usize>,
    ) -> Result<Vec<WorkSession>, StoreError> {
        self.delay().await;
        let state = self.lock()?;
        let mut out: Vec<WorkSession> = state
            .sessions
            .iter()
            .filter(|s| filter.matches(s))
            .cloned()
            .collect();
        out.sort_by(|a, b| b.clock_in.cmp(&a.clock_in));
        Ok(take(out, limit))
    }

    async fn find_break(&self, filter: BreakFilter) -> Result<Option<BreakRecord>, StoreError> {
        Ok(self.find_breaks(filter, Some(1)).await?.into_iter().next())
    }

    async fn find_breaks(
        &self,
        filter: BreakFilter,
        limit: Option<usize>,
    ) -> Result<Vec<BreakRecord>, StoreError> {
        self.delay().await;
        let state = self.lock()?;
        let mut out: Vec<BreakRecord> = state
            .breaks
            .iter()
            .filter(|b| filter.matches(b))
            .cloned()
            .collect();
        out.sort_by_key(|b| b.break_start);
        Ok(take(out, limit))
    }

    async fn find_correction(
        &self,
        filter: CorrectionFilter,
    ) -> Result<Option<CorrectionRequest>, StoreError> {
        Ok(self
            .find_corrections(filter, Some(1))
            .await?
            .into_iter()
            .next())
    }

    async fn find_corrections(
        &self,
        filter: CorrectionFilter,
        limit: Option<usize>,
    ) -> Result<Vec<CorrectionRequest>, StoreError> {
        self.delay().await;
        let state = self.lock()?;
        let mut out: Vec<CorrectionRequest> = state
            .corrections
            .iter()
            .filter(|c| filter.matches(c))
            .cloned()
            .collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(take(out, limit))
    }

    async fn audit_log(&self, limit: usize) -> Result<Vec<AuditEntry>, StoreError> {
        let state = self.lock()?;
        Ok(state.log.iter().rev().take(limit).cloned().collect())
    }
}
