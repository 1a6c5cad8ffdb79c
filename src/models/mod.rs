pub mod break_record;
pub mod correction;
pub mod ids;
pub mod session;

pub use break_record::BreakRecord;
pub use correction::{CorrectionApplied, CorrectionRequest, CorrectionStatus};
pub use ids::{BreakId, CorrectionId, SessionId, UserId};
pub use session::{SessionStatus, WorkSession};
