//! SQLite-backed `Store`.
//!
//! One connection guarded by a mutex; every call runs on the blocking pool.
//! Batches run inside an `IMMEDIATE` transaction so a second process using
//! the same file waits instead of interleaving. The uniqueness rules are enforced by
//! partial unique indexes (see `migrate.rs`).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::types::{Type, Value};
use rusqlite::{
    Connection, ErrorCode, OptionalExtension, Row, Transaction, TransactionBehavior, params,
};
use std::path::Path;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::log::{load_log, ttlog};
use super::migrate::run_pending_migrations;
use super::{
    AuditEntry, BreakFilter, CorrectionFilter, SessionFilter, SessionPatch, Store, WriteOp,
};
use crate::errors::{AppError, AppResult, StoreError, Table};
use crate::models::{
    BreakRecord, CorrectionRequest, CorrectionStatus, SessionStatus, UserId, WorkSession,
};
use crate::utils::time::{from_db_ts, to_db_ts};

pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
    path: String,
}

impl SqliteStore {
    /// Open (or create) the database at `path` and bring the schema up to date.
    pub fn open(path: &str) -> AppResult<Self> {
        if let Some(dir) = Path::new(path).parent()
            && !dir.as_os_str().is_empty()
        {
            std::fs::create_dir_all(dir)?;
        }
        let conn = Connection::open(path)?;
        Self::prepare(conn, path)
    }

    /// Private, throw-away database; used by tests.
    pub fn open_in_memory() -> AppResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::prepare(conn, ":memory:")
    }

    fn prepare(conn: Connection, path: &str) -> AppResult<Self> {
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        if path != ":memory:" {
            // journal_mode returns a row, pragma_update_and_check swallows it
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |_| Ok(()))?;
        }
        let applied =
            run_pending_migrations(&conn).map_err(|e| AppError::Migration(e.to_string()))?;
        tracing::debug!(path, applied, "sqlite store ready");

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: path.to_string(),
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Run `f` against the connection on the blocking pool.
    async fn run<F, T>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut Connection) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn
                .lock()
                .map_err(|_| StoreError::Backend("sqlite connection lock poisoned".into()))?;
            f(&mut guard)
        })
        .await
        .map_err(|e| StoreError::Backend(format!("sqlite worker failed: {e}")))?
    }
}

// ── Row mapping ─────────────────────────────────────────────────────────

fn conversion_error(col: &str, value: &str) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        0,
        Type::Text,
        Box::new(AppError::Other(format!("bad value in column {col}: {value}"))),
    )
}

fn ts_col(row: &Row, col: &str) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(col)?;
    from_db_ts(&raw).ok_or_else(|| conversion_error(col, &raw))
}

fn opt_ts_col(row: &Row, col: &str) -> rusqlite::Result<Option<DateTime<Utc>>> {
    match row.get::<_, Option<String>>(col)? {
        Some(raw) => from_db_ts(&raw)
            .map(Some)
            .ok_or_else(|| conversion_error(col, &raw)),
        None => Ok(None),
    }
}

fn id_col<T: FromStr>(row: &Row, col: &str) -> rusqlite::Result<T> {
    let raw: String = row.get(col)?;
    raw.parse().map_err(|_| conversion_error(col, &raw))
}

fn map_session(row: &Row) -> rusqlite::Result<WorkSession> {
    let status_str: String = row.get("status")?;
    let status = SessionStatus::from_db_str(&status_str)
        .ok_or_else(|| conversion_error("status", &status_str))?;

    Ok(WorkSession {
        id: id_col(row, "id")?,
        user_id: UserId::new(row.get::<_, String>("user_id")?),
        clock_in: ts_col(row, "clock_in")?,
        clock_out: opt_ts_col(row, "clock_out")?,
        status,
        total_break_minutes: row.get("total_break_minutes")?,
        total_work_minutes: row.get("total_work_minutes")?,
        version: row.get("version")?,
        created_at: ts_col(row, "created_at")?,
    })
}

fn map_break(row: &Row) -> rusqlite::Result<BreakRecord> {
    Ok(BreakRecord {
        id: id_col(row, "id")?,
        session_id: id_col(row, "session_id")?,
        break_start: ts_col(row, "break_start")?,
        break_end: opt_ts_col(row, "break_end")?,
    })
}

fn map_correction(row: &Row) -> rusqlite::Result<CorrectionRequest> {
    let status_str: String = row.get("status")?;
    let status = CorrectionStatus::from_db_str(&status_str)
        .ok_or_else(|| conversion_error("status", &status_str))?;

    Ok(CorrectionRequest {
        id: id_col(row, "id")?,
        session_id: id_col(row, "session_id")?,
        requested_by: UserId::new(row.get::<_, String>("requested_by")?),
        proposed_clock_in: ts_col(row, "proposed_clock_in")?,
        proposed_clock_out: ts_col(row, "proposed_clock_out")?,
        original_clock_in: ts_col(row, "original_clock_in")?,
        original_clock_out: opt_ts_col(row, "original_clock_out")?,
        reason: row.get("reason")?,
        status,
        reviewed_by: row.get::<_, Option<String>>("reviewed_by")?.map(UserId::new),
        reviewed_at: opt_ts_col(row, "reviewed_at")?,
        reviewer_comment: row.get("reviewer_comment")?,
        created_at: ts_col(row, "created_at")?,
    })
}

// ── Dynamic WHERE clauses ───────────────────────────────────────────────

#[derive(Default)]
struct Where {
    clauses: Vec<String>,
    params: Vec<String>,
}

impl Where {
    fn cmp(&mut self, col: &str, op: &str, value: String) {
        self.params.push(value);
        self.clauses
            .push(format!("{} {} ?{}", col, op, self.params.len()));
    }

    fn eq(&mut self, col: &str, value: String) {
        self.cmp(col, "=", value);
    }

    fn raw(&mut self, clause: &str) {
        self.clauses.push(clause.to_string());
    }

    fn sql(&self) -> String {
        if self.clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", self.clauses.join(" AND "))
        }
    }
}

fn limit_sql(limit: Option<usize>) -> String {
    match limit {
        Some(n) => format!("LIMIT {}", n),
        None => String::new(),
    }
}

fn session_where(f: &SessionFilter) -> Where {
    let mut w = Where::default();
    if let Some(id) = f.id {
        w.eq("id", id.to_db_string());
    }
    if let Some(user) = &f.user_id {
        w.eq("user_id", user.as_str().to_string());
    }
    if let Some(status) = f.status {
        w.eq("status", status.to_db_str().to_string());
    }
    if let Some(from) = f.clock_in_from {
        w.cmp("clock_in", ">=", to_db_ts(&from));
    }
    if let Some(before) = f.clock_in_before {
        w.cmp("clock_in", "<", to_db_ts(&before));
    }
    w
}

fn break_where(f: &BreakFilter) -> Where {
    let mut w = Where::default();
    if let Some(id) = f.id {
        w.eq("id", id.to_db_string());
    }
    if let Some(sid) = f.session_id {
        w.eq("session_id", sid.to_db_string());
    }
    match f.active {
        Some(true) => w.raw("break_end IS NULL"),
        Some(false) => w.raw("break_end IS NOT NULL"),
        None => {}
    }
    w
}

fn correction_where(f: &CorrectionFilter) -> Where {
    let mut w = Where::default();
    if let Some(id) = f.id {
        w.eq("id", id.to_db_string());
    }
    if let Some(sid) = f.session_id {
        w.eq("session_id", sid.to_db_string());
    }
    if let Some(user) = &f.requested_by {
        w.eq("requested_by", user.as_str().to_string());
    }
    if let Some(status) = f.status {
        w.eq("status", status.to_db_str().to_string());
    }
    w
}

fn query_rows<T>(
    conn: &Connection,
    sql: &str,
    params: &[String],
    map: fn(&Row) -> rusqlite::Result<T>,
) -> Result<Vec<T>, StoreError> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(rusqlite::params_from_iter(params.iter()), map)?;

    let mut out = Vec::new();
    for r in rows {
        out.push(r?);
    }
    Ok(out)
}

// ── Writes ──────────────────────────────────────────────────────────────

/// Translate a failed INSERT into `Conflict` when a constraint fired.
fn insert_error(table: Table, err: rusqlite::Error) -> StoreError {
    match &err {
        rusqlite::Error::SqliteFailure(e, msg) if e.code == ErrorCode::ConstraintViolation => {
            StoreError::Conflict {
                table,
                constraint: msg.clone().unwrap_or_else(|| e.to_string()),
            }
        }
        _ => StoreError::from(err),
    }
}

/// Distinguish a missing row from a guard that did not hold.
fn zero_rows(tx: &Transaction, table: Table, id: String) -> StoreError {
    let sql = format!("SELECT 1 FROM {} WHERE id = ?1", table.as_str());
    match tx.query_row(&sql, [&id], |_| Ok(())).optional() {
        Ok(Some(())) => StoreError::PreconditionFailed { table, id },
        Ok(None) => StoreError::NotFound { table, id },
        Err(e) => StoreError::from(e),
    }
}

fn update_session(
    tx: &Transaction,
    id: String,
    guard: &super::SessionGuard,
    patch: &SessionPatch,
) -> Result<(), StoreError> {
    let mut sets: Vec<String> = vec!["version = version + 1".into()];
    let mut values: Vec<Value> = Vec::new();
    let mut set = |col: &str, v: Value| {
        values.push(v);
        sets.push(format!("{} = ?{}", col, values.len()));
    };

    if let Some(v) = patch.clock_in {
        set("clock_in", Value::Text(to_db_ts(&v)));
    }
    if let Some(v) = patch.clock_out {
        set("clock_out", Value::Text(to_db_ts(&v)));
    }
    if let Some(v) = patch.status {
        set("status", Value::Text(v.to_db_str().to_string()));
    }
    if let Some(v) = patch.total_break_minutes {
        set("total_break_minutes", Value::Integer(v));
    }
    if let Some(v) = patch.total_work_minutes {
        set("total_work_minutes", Value::Integer(v));
    }

    values.push(Value::Text(id.clone()));
    let mut sql = format!(
        "UPDATE work_sessions SET {} WHERE id = ?{}",
        sets.join(", "),
        values.len()
    );
    if let Some(status) = guard.status {
        values.push(Value::Text(status.to_db_str().to_string()));
        sql.push_str(&format!(" AND status = ?{}", values.len()));
    }
    if let Some(version) = guard.version {
        values.push(Value::Integer(version));
        sql.push_str(&format!(" AND version = ?{}", values.len()));
    }

    let changed = tx.execute(&sql, rusqlite::params_from_iter(values.iter()))?;
    if changed == 0 {
        return Err(zero_rows(tx, Table::WorkSessions, id));
    }
    Ok(())
}

fn apply_op(tx: &Transaction, op: &WriteOp) -> Result<(), StoreError> {
    match op {
        WriteOp::InsertSession(s) => {
            tx.execute(
                "INSERT INTO work_sessions
                    (id, user_id, clock_in, clock_out, status, total_break_minutes,
                     total_work_minutes, version, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    s.id.to_db_string(),
                    s.user_id.as_str(),
                    to_db_ts(&s.clock_in),
                    s.clock_out.as_ref().map(to_db_ts),
                    s.status.to_db_str(),
                    s.total_break_minutes,
                    s.total_work_minutes,
                    s.version,
                    to_db_ts(&s.created_at),
                ],
            )
            .map_err(|e| insert_error(Table::WorkSessions, e))?;
        }

        WriteOp::InsertBreak(b) => {
            let owner_status: Option<String> = tx
                .query_row(
                    "SELECT status FROM work_sessions WHERE id = ?1",
                    [b.session_id.to_db_string()],
                    |row| row.get(0),
                )
                .optional()?;
            if owner_status.as_deref() != Some(SessionStatus::Open.to_db_str()) {
                return Err(StoreError::PreconditionFailed {
                    table: Table::WorkSessions,
                    id: b.session_id.to_db_string(),
                });
            }

            tx.execute(
                "INSERT INTO breaks (id, session_id, break_start, break_end)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    b.id.to_db_string(),
                    b.session_id.to_db_string(),
                    to_db_ts(&b.break_start),
                    b.break_end.as_ref().map(to_db_ts),
                ],
            )
            .map_err(|e| insert_error(Table::Breaks, e))?;
        }

        WriteOp::InsertCorrection(c) => {
            let exists = tx
                .query_row(
                    "SELECT 1 FROM work_sessions WHERE id = ?1",
                    [c.session_id.to_db_string()],
                    |_| Ok(()),
                )
                .optional()?;
            if exists.is_none() {
                return Err(StoreError::NotFound {
                    table: Table::WorkSessions,
                    id: c.session_id.to_db_string(),
                });
            }

            tx.execute(
                "INSERT INTO correction_requests
                    (id, session_id, requested_by, proposed_clock_in, proposed_clock_out,
                     original_clock_in, original_clock_out, reason, status,
                     reviewed_by, reviewed_at, reviewer_comment, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
                params![
                    c.id.to_db_string(),
                    c.session_id.to_db_string(),
                    c.requested_by.as_str(),
                    to_db_ts(&c.proposed_clock_in),
                    to_db_ts(&c.proposed_clock_out),
                    to_db_ts(&c.original_clock_in),
                    c.original_clock_out.as_ref().map(to_db_ts),
                    c.reason,
                    c.status.to_db_str(),
                    c.reviewed_by.as_ref().map(|u| u.as_str().to_string()),
                    c.reviewed_at.as_ref().map(to_db_ts),
                    c.reviewer_comment,
                    to_db_ts(&c.created_at),
                ],
            )
            .map_err(|e| insert_error(Table::CorrectionRequests, e))?;
        }

        WriteOp::UpdateSession { id, guard, patch } => {
            update_session(tx, id.to_db_string(), guard, patch)?;
        }

        WriteOp::CloseBreak { id, break_end } => {
            let changed = tx.execute(
                "UPDATE breaks SET break_end = ?1 WHERE id = ?2 AND break_end IS NULL",
                params![to_db_ts(break_end), id.to_db_string()],
            )?;
            if changed == 0 {
                return Err(zero_rows(tx, Table::Breaks, id.to_db_string()));
            }
        }

        WriteOp::UpdateCorrection { id, expect, patch } => {
            let changed = tx.execute(
                "UPDATE correction_requests
                 SET status = ?1, reviewed_by = ?2, reviewed_at = ?3, reviewer_comment = ?4
                 WHERE id = ?5 AND status = ?6",
                params![
                    patch.status.to_db_str(),
                    patch.reviewed_by.as_str(),
                    to_db_ts(&patch.reviewed_at),
                    patch.reviewer_comment,
                    id.to_db_string(),
                    expect.to_db_str(),
                ],
            )?;
            if changed == 0 {
                return Err(zero_rows(tx, Table::CorrectionRequests, id.to_db_string()));
            }
        }
    }
    Ok(())
}

#[async_trait]
impl Store for SqliteStore {
    fn backend(&self) -> &'static str {
        "sqlite"
    }

    async fn transact(&self, ops: Vec<WriteOp>) -> Result<(), StoreError> {
        self.run(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            for op in &ops {
                apply_op(&tx, op)?;
                ttlog(&tx, &AuditEntry::for_op(op))?;
            }
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn find_session(&self, filter: SessionFilter) -> Result<Option<WorkSession>, StoreError> {
        Ok(self.find_sessions(filter, Some(1)).await?.into_iter().next())
    }

    async fn find_sessions(
        &self,
        filter: SessionFilter,
        limit: Option<usize>,
    ) -> Result<Vec<WorkSession>, StoreError> {
        self.run(move |conn| {
            let w = session_where(&filter);
            let sql = format!(
                "SELECT * FROM work_sessions {} ORDER BY clock_in DESC {}",
                w.sql(),
                limit_sql(limit)
            );
            query_rows(conn, &sql, &w.params, map_session)
        })
        .await
    }

    async fn find_break(&self, filter: BreakFilter) -> Result<Option<BreakRecord>, StoreError> {
        Ok(self.find_breaks(filter, Some(1)).await?.into_iter().next())
    }

    async fn find_breaks(
        &self,
        filter: BreakFilter,
        limit: Option<usize>,
    ) -> Result<Vec<BreakRecord>, StoreError> {
        self.run(move |conn| {
            let w = break_where(&filter);
            let sql = format!(
                "SELECT * FROM breaks {} ORDER BY break_start ASC {}",
                w.sql(),
                limit_sql(limit)
            );
            query_rows(conn, &sql, &w.params, map_break)
        })
        .await
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
        self.run(move |conn| {
            let w = correction_where(&filter);
            let sql = format!(
                "SELECT * FROM correction_requests {} ORDER BY created_at DESC {}",
                w.sql(),
                limit_sql(limit)
            );
            query_rows(conn, &sql, &w.params, map_correction)
        })
        .await
    }

    async fn audit_log(&self, limit: usize) -> Result<Vec<AuditEntry>, StoreError> {
        self.run(move |conn| Ok(load_log(conn, limit)?)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BreakRecord, SessionId};
    use crate::store::SessionGuard;
    use chrono::TimeZone;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, h, m, 0).unwrap()
    }

    #[tokio::test]
    async fn session_round_trips_through_sqlite() {
        let store = SqliteStore::open_in_memory().unwrap();
        let session = WorkSession::open(UserId::from("ana"), at(9, 0));
        store.apply(WriteOp::InsertSession(session.clone())).await.unwrap();

        let found = store
            .find_session(SessionFilter::open_for(&UserId::from("ana")))
            .await
            .unwrap();
        assert_eq!(found, Some(session));
    }

    #[tokio::test]
    async fn unique_indexes_surface_as_conflicts() {
        let store = SqliteStore::open_in_memory().unwrap();
        let user = UserId::from("ana");
        let session = WorkSession::open(user.clone(), at(9, 0));
        let sid = session.id;
        store.apply(WriteOp::InsertSession(session)).await.unwrap();

        let err = store
            .apply(WriteOp::InsertSession(WorkSession::open(user, at(9, 1))))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict { table: Table::WorkSessions, .. }));

        store
            .apply(WriteOp::InsertBreak(BreakRecord::start(sid, at(12, 0))))
            .await
            .unwrap();
        let err = store
            .apply(WriteOp::InsertBreak(BreakRecord::start(sid, at(12, 1))))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict { table: Table::Breaks, .. }));
    }

    #[tokio::test]
    async fn guarded_update_reports_precondition_or_missing_row() {
        let store = SqliteStore::open_in_memory().unwrap();
        let session = WorkSession::open(UserId::from("ana"), at(9, 0));
        let sid = session.id;
        store.apply(WriteOp::InsertSession(session)).await.unwrap();

        let close = |id, version| WriteOp::UpdateSession {
            id,
            guard: SessionGuard::open_at(version),
            patch: SessionPatch {
                clock_out: Some(at(17, 0)),
                status: Some(SessionStatus::Closed),
                total_work_minutes: Some(480),
                ..SessionPatch::default()
            },
        };

        assert!(matches!(
            store.apply(close(sid, 7)).await.unwrap_err(),
            StoreError::PreconditionFailed { .. }
        ));
        assert!(matches!(
            store.apply(close(SessionId::new(), 0)).await.unwrap_err(),
            StoreError::NotFound { .. }
        ));
        store.apply(close(sid, 0)).await.unwrap();

        let stored = store.find_session(SessionFilter::by_id(sid)).await.unwrap().unwrap();
        assert_eq!(stored.status, SessionStatus::Closed);
        assert_eq!(stored.total_work_minutes, Some(480));
        assert_eq!(stored.version, 1);
    }

    #[tokio::test]
    async fn aborted_batch_rolls_back_and_is_not_audited() {
        let store = SqliteStore::open_in_memory().unwrap();
        let session = WorkSession::open(UserId::from("ana"), at(9, 0));
        let sid = session.id;
        let before = store.audit_log(100).await.unwrap().len();

        let err = store
            .transact(vec![
                WriteOp::InsertSession(session),
                WriteOp::InsertBreak(BreakRecord::start(SessionId::new(), at(10, 0))),
            ])
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::PreconditionFailed { .. }));
        assert!(store.find_session(SessionFilter::by_id(sid)).await.unwrap().is_none());
        assert_eq!(store.audit_log(100).await.unwrap().len(), before);
    }
}
