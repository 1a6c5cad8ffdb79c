use super::ids::{BreakId, SessionId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One pause within a work session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakRecord {
    pub id: BreakId,
    pub session_id: SessionId,
    pub break_start: DateTime<Utc>,
    pub break_end: Option<DateTime<Utc>>,
}

impl BreakRecord {
    pub fn start(session_id: SessionId, now: DateTime<Utc>) -> Self {
        Self {
            id: BreakId::new(),
            session_id,
            break_start: now,
            break_end: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.break_end.is_none()
    }
}
