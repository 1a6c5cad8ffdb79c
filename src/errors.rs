//! Unified error types.
//! `AppError` is what the binary and the CLI handlers return; the engine,
//! the correction workflow and the stores speak `EngineError` and
//! `StoreError` so callers can match on the precise failure.

use std::io;
use thiserror::Error;

use crate::models::{CorrectionId, SessionId};

/// Logical table touched by a store operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Table {
    WorkSessions,
    Breaks,
    CorrectionRequests,
}

impl Table {
    pub fn as_str(&self) -> &'static str {
        match self {
            Table::WorkSessions => "work_sessions",
            Table::Breaks => "breaks",
            Table::CorrectionRequests => "correction_requests",
        }
    }
}

impl std::fmt::Display for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors returned by a `Store` implementation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// A uniqueness constraint rejected an insert (open session, active break, primary key).
    #[error("conflict on {table}: {constraint}")]
    Conflict { table: Table, constraint: String },

    /// A guarded update found the row in a different state than expected.
    #[error("precondition failed on {table} row {id}")]
    PreconditionFailed { table: Table, id: String },

    /// A guarded update targeted a row that does not exist.
    #[error("{table} row {id} not found")]
    NotFound { table: Table, id: String },

    /// The backend itself failed (I/O, SQL, poisoned lock, decoding).
    #[error("storage backend error: {0}")]
    Backend(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::Backend(err.to_string())
    }
}

/// Engine and correction-workflow failures.
///
/// Precondition violations are recoverable and never retried by the engine;
/// `StoreUnavailable` and `ConcurrentModification` are infrastructure
/// failures the caller may retry with backoff.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    // ---------------------------
    // Lifecycle preconditions
    // ---------------------------
    #[error("user {0} is already clocked in")]
    AlreadyClockedIn(String),

    #[error("user {0} is not clocked in")]
    NotClockedIn(String),

    #[error("session {0} is not open")]
    NoActiveSession(SessionId),

    #[error("session {0} already has an active break")]
    BreakAlreadyActive(SessionId),

    #[error("session {0} has no active break")]
    NoActiveBreak(SessionId),

    // ---------------------------
    // Correction preconditions
    // ---------------------------
    #[error("a correction request needs a non-empty reason")]
    EmptyReason,

    #[error("correction {id} is already {status}")]
    InvalidStateTransition { id: CorrectionId, status: String },

    #[error("correction {0} cannot be reviewed by its own requester")]
    SelfReview(CorrectionId),

    #[error("invalid proposal: {0}")]
    InvalidProposal(String),

    #[error("session {0} not found")]
    SessionNotFound(SessionId),

    #[error("correction {0} not found")]
    CorrectionNotFound(CorrectionId),

    // ---------------------------
    // Infrastructure
    // ---------------------------
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("gave up after {attempts} attempts: session {session} kept changing")]
    ConcurrentModification { session: SessionId, attempts: u32 },
}

impl EngineError {
    /// True for errors the caller caused and should not blindly retry.
    pub fn is_precondition(&self) -> bool {
        !matches!(
            self,
            EngineError::StoreUnavailable(_) | EngineError::ConcurrentModification { .. }
        )
    }
}

impl From<StoreError> for EngineError {
    fn from(err: StoreError) -> Self {
        EngineError::StoreUnavailable(err.to_string())
    }
}

/// Data-integrity anomalies: logged, the value is repaired and the
/// operation still succeeds.
#[derive(Error, Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EngineWarning {
    #[error("session {session}: net work was {raw_minutes} min, clamped to 0")]
    NegativeDurationClamped { session: SessionId, raw_minutes: i64 },
}

#[derive(Error, Debug)]
pub enum AppError {
    // ---------------------------
    // IO
    // ---------------------------
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    // ---------------------------
    // Storage
    // ---------------------------
    #[error("Database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Database migration error: {0}")]
    Migration(String),

    // ---------------------------
    // Domain
    // ---------------------------
    #[error("{0}")]
    Engine(#[from] EngineError),

    // ---------------------------
    // Parsing errors
    // ---------------------------
    #[error("Invalid date format: {0}")]
    InvalidDate(String),

    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("Invalid identifier: {0}")]
    InvalidId(String),

    // ---------------------------
    // Config errors
    // ---------------------------
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to parse configuration: {0}")]
    ConfigParse(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // ---------------------------
    // Generic fallback
    // ---------------------------
    #[error("Internal error: {0}")]
    Other(String),
}

pub type AppResult<T> = Result<T, AppError>;
pub type EngineResult<T> = Result<T, EngineError>;
