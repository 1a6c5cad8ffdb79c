use super::ids::{SessionId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Open,
    Closed,
    AutoClosed,
    Corrected,
}

impl SessionStatus {
    /// Convert enum → DB string
    pub fn to_db_str(&self) -> &'static str {
        match self {
            SessionStatus::Open => "open",
            SessionStatus::Closed => "closed",
            SessionStatus::AutoClosed => "auto_closed",
            SessionStatus::Corrected => "corrected",
        }
    }

    /// Convert DB string → enum
    pub fn from_db_str(s: &str) -> Option<Self> {
        match s {
            "open" => Some(SessionStatus::Open),
            "closed" => Some(SessionStatus::Closed),
            "auto_closed" => Some(SessionStatus::AutoClosed),
            "corrected" => Some(SessionStatus::Corrected),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SessionStatus::Open => "Open",
            SessionStatus::Closed => "Closed",
            SessionStatus::AutoClosed => "Auto-closed",
            SessionStatus::Corrected => "Corrected",
        }
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.to_db_str())
    }
}

/// One continuous work period of one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkSession {
    pub id: SessionId,
    pub user_id: UserId,
    pub clock_in: DateTime<Utc>,
    pub clock_out: Option<DateTime<Utc>>,
    pub status: SessionStatus,
    pub total_break_minutes: i64,
    /// Net worked minutes; only meaningful once the session is closed.
    pub total_work_minutes: Option<i64>,
    /// Bumped by the store on every write; update guards compare against it.
    pub version: i64,
    pub created_at: DateTime<Utc>,
}

impl WorkSession {
    /// A freshly clocked-in session anchored at `now`.
    pub fn open(user_id: UserId, now: DateTime<Utc>) -> Self {
        Self {
            id: SessionId::new(),
            user_id,
            clock_in: now,
            clock_out: None,
            status: SessionStatus::Open,
            total_break_minutes: 0,
            total_work_minutes: None,
            version: 0,
            created_at: now,
        }
    }

    pub fn is_open(&self) -> bool {
        self.status == SessionStatus::Open
    }
}
