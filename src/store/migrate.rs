use rusqlite::{Connection, OptionalExtension, Result};

/// Ensure that the `log` table exists. Applied migrations are recorded there.
fn ensure_log_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS log (
            id        INTEGER PRIMARY KEY AUTOINCREMENT,
            date      TEXT NOT NULL,
            operation TEXT NOT NULL,
            target    TEXT DEFAULT '',
            message   TEXT NOT NULL
        );
        "#,
    )?;
    Ok(())
}

fn is_applied(conn: &Connection, version: &str) -> Result<bool> {
    let mut chk = conn.prepare(
        "SELECT 1 FROM log
         WHERE operation = 'migration_applied' AND target = ?1
         LIMIT 1",
    )?;
    Ok(chk.query_row([version], |_| Ok(())).optional()?.is_some())
}

/// Run `sql` once, in its own transaction, and mark `version` as applied.
fn apply_migration(conn: &Connection, version: &str, sql: &str, message: &str) -> Result<bool> {
    if is_applied(conn, version)? {
        return Ok(false);
    }

    conn.execute_batch(&format!(
        "BEGIN;
         {sql}
         INSERT INTO log (date, operation, target, message)
         VALUES (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'), 'migration_applied', '{version}', '{message}');
         COMMIT;"
    ))?;

    tracing::info!(version, "migration applied: {}", message);
    Ok(true)
}

/// One open session per user: partial unique index `ux_work_sessions_one_open`.
const CREATE_WORK_SESSIONS: &str = r#"
    CREATE TABLE IF NOT EXISTS work_sessions (
        id                  TEXT PRIMARY KEY,
        user_id             TEXT NOT NULL,
        clock_in            TEXT NOT NULL,
        clock_out           TEXT,
        status              TEXT NOT NULL DEFAULT 'open'
                            CHECK(status IN ('open','closed','auto_closed','corrected')),
        total_break_minutes INTEGER NOT NULL DEFAULT 0 CHECK(total_break_minutes >= 0),
        total_work_minutes  INTEGER CHECK(total_work_minutes IS NULL OR total_work_minutes >= 0),
        version             INTEGER NOT NULL DEFAULT 0,
        created_at          TEXT NOT NULL
    );

    CREATE UNIQUE INDEX IF NOT EXISTS ux_work_sessions_one_open
        ON work_sessions(user_id) WHERE status = 'open';
    CREATE INDEX IF NOT EXISTS idx_work_sessions_user_clock_in
        ON work_sessions(user_id, clock_in);
"#;

/// One active break per session: partial unique index `ux_breaks_one_active`.
const CREATE_BREAKS: &str = r#"
    CREATE TABLE IF NOT EXISTS breaks (
        id          TEXT PRIMARY KEY,
        session_id  TEXT NOT NULL REFERENCES work_sessions(id) ON DELETE CASCADE,
        break_start TEXT NOT NULL,
        break_end   TEXT
    );

    CREATE UNIQUE INDEX IF NOT EXISTS ux_breaks_one_active
        ON breaks(session_id) WHERE break_end IS NULL;
    CREATE INDEX IF NOT EXISTS idx_breaks_session_start
        ON breaks(session_id, break_start);
"#;

const CREATE_CORRECTION_REQUESTS: &str = r#"
    CREATE TABLE IF NOT EXISTS correction_requests (
        id                 TEXT PRIMARY KEY,
        session_id         TEXT NOT NULL REFERENCES work_sessions(id) ON DELETE CASCADE,
        requested_by       TEXT NOT NULL,
        proposed_clock_in  TEXT NOT NULL,
        proposed_clock_out TEXT NOT NULL,
        original_clock_in  TEXT NOT NULL,
        original_clock_out TEXT,
        reason             TEXT NOT NULL CHECK(length(trim(reason)) > 0),
        status             TEXT NOT NULL DEFAULT 'pending'
                           CHECK(status IN ('pending','approved','rejected')),
        reviewed_by        TEXT,
        reviewed_at        TEXT,
        reviewer_comment   TEXT,
        created_at         TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_corrections_status_created
        ON correction_requests(status, created_at);
    CREATE INDEX IF NOT EXISTS idx_corrections_requester
        ON correction_requests(requested_by, created_at);
"#;

/// Public entry point: run all pending migrations.
///
/// Invoked by `SqliteStore::open()`. Returns how many were applied.
pub fn run_pending_migrations(conn: &Connection) -> Result<usize> {
    ensure_log_table(conn)?;

    let steps: [(&str, &str, &str); 3] = [
        (
            "20261001_0001_create_work_sessions",
            CREATE_WORK_SESSIONS,
            "Created work_sessions with one-open-session-per-user index",
        ),
        (
            "20261001_0002_create_breaks",
            CREATE_BREAKS,
            "Created breaks with one-active-break-per-session index",
        ),
        (
            "20261001_0003_create_correction_requests",
            CREATE_CORRECTION_REQUESTS,
            "Created correction_requests",
        ),
    ];

    let mut applied = 0;
    for (version, sql, message) in steps {
        if apply_migration(conn, version, sql, message)? {
            applied += 1;
        }
    }

    Ok(applied)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_are_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        assert_eq!(run_pending_migrations(&conn).unwrap(), 3);
        assert_eq!(run_pending_migrations(&conn).unwrap(), 0);
    }

    #[test]
    fn open_session_index_rejects_second_open_row() {
        let conn = Connection::open_in_memory().unwrap();
        run_pending_migrations(&conn).unwrap();

        let insert = "INSERT INTO work_sessions (id, user_id, clock_in, status, created_at)
                      VALUES (?1, 'ana', '2026-03-02T09:00:00.000000Z', ?2, '2026-03-02T09:00:00.000000Z')";
        conn.execute(insert, ["a", "open"]).unwrap();
        conn.execute(insert, ["b", "closed"]).unwrap();
        assert!(conn.execute(insert, ["c", "open"]).is_err());
    }
}
