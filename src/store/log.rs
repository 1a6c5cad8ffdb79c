use chrono::Utc;
use rusqlite::{Connection, params};
use serde::Serialize;

use super::WriteOp;

/// One row of the internal `log` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditEntry {
    pub date: String,
    pub operation: String,
    pub target: String,
    pub message: String,
}

impl AuditEntry {
    pub fn now(operation: &str, target: &str, message: &str) -> Self {
        Self {
            date: Utc::now().to_rfc3339(),
            operation: operation.to_string(),
            target: target.to_string(),
            message: message.to_string(),
        }
    }

    pub fn for_op(op: &WriteOp) -> Self {
        Self::now(op.name(), &op.target(), &describe(op))
    }
}

/// One-line human description of a write.
pub fn describe(op: &WriteOp) -> String {
    match op {
        WriteOp::InsertSession(s) => format!("{} clocked in at {}", s.user_id, s.clock_in),
        WriteOp::InsertBreak(b) => {
            format!("break started at {} in {}", b.break_start, b.session_id)
        }
        WriteOp::InsertCorrection(c) => format!(
            "{} requested {} → {} for {}",
            c.requested_by, c.proposed_clock_in, c.proposed_clock_out, c.session_id
        ),
        WriteOp::UpdateSession { patch, .. } => match (patch.status, patch.clock_out) {
            (Some(status), Some(out)) => format!("status → {} (out {})", status, out),
            (Some(status), None) => format!("status → {}", status),
            _ => match patch.total_break_minutes {
                Some(total) => format!("break total → {}", total),
                None => "version bump".to_string(),
            },
        },
        WriteOp::CloseBreak { break_end, .. } => format!("break ended at {}", break_end),
        WriteOp::UpdateCorrection { patch, .. } => {
            format!("{} by {}", patch.status, patch.reviewed_by)
        }
    }
}

/// Write an internal log line into the `log` table.
pub(crate) fn ttlog(conn: &Connection, entry: &AuditEntry) -> rusqlite::Result<()> {
    let mut stmt = conn.prepare_cached(
        "INSERT INTO log (date, operation, target, message)
         VALUES (?1, ?2, ?3, ?4)",
    )?;

    stmt.execute(params![
        entry.date,
        entry.operation,
        entry.target,
        entry.message
    ])?;

    Ok(())
}

pub(crate) fn load_log(conn: &Connection, limit: usize) -> rusqlite::Result<Vec<AuditEntry>> {
    let mut stmt = conn.prepare(
        "SELECT date, operation, target, message FROM log
         ORDER BY id DESC
         LIMIT ?1",
    )?;

    let rows = stmt.query_map([limit as i64], |row| {
        Ok(AuditEntry {
            date: row.get(0)?,
            operation: row.get(1)?,
            target: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
            message: row.get(3)?,
        })
    })?;

    let mut out = Vec::new();
    for r in rows {
        out.push(r?);
    }
    Ok(out)
}
