use super::ids::{CorrectionId, SessionId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CorrectionStatus {
    Pending,
    Approved,
    Rejected,
}

impl CorrectionStatus {
    pub fn to_db_str(&self) -> &'static str {
        match self {
            CorrectionStatus::Pending => "pending",
            CorrectionStatus::Approved => "approved",
            CorrectionStatus::Rejected => "rejected",
        }
    }

    pub fn from_db_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(CorrectionStatus::Pending),
            "approved" => Some(CorrectionStatus::Approved),
            "rejected" => Some(CorrectionStatus::Rejected),
            _ => None,
        }
    }

    /// Helper: parse user input (any case)
    pub fn from_code(code: &str) -> Option<Self> {
        Self::from_db_str(&code.trim().to_lowercase())
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, CorrectionStatus::Pending)
    }
}

impl std::fmt::Display for CorrectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.to_db_str())
    }
}

/// A proposed amendment of a session's recorded in/out times.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrectionRequest {
    pub id: CorrectionId,
    pub session_id: SessionId,
    pub requested_by: UserId,
    pub proposed_clock_in: DateTime<Utc>,
    pub proposed_clock_out: DateTime<Utc>,
    /// Snapshot taken at submission time.
    pub original_clock_in: DateTime<Utc>,
    pub original_clock_out: Option<DateTime<Utc>>,
    pub reason: String,
    pub status: CorrectionStatus,
    pub reviewed_by: Option<UserId>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub reviewer_comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Effect emitted by an approval: overwrite the target session's times with
/// the proposed ones and mark it corrected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrectionApplied {
    pub correction_id: CorrectionId,
    pub session_id: SessionId,
    pub clock_in: DateTime<Utc>,
    pub clock_out: DateTime<Utc>,
}

impl CorrectionRequest {
    pub fn effect(&self) -> CorrectionApplied {
        CorrectionApplied {
            correction_id: self.id,
            session_id: self.session_id,
            clock_in: self.proposed_clock_in,
            clock_out: self.proposed_clock_out,
        }
    }
}
