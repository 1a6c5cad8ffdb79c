pub mod calculator;
pub mod clock;
pub mod controller;
pub mod corrections;
pub mod engine;
pub mod stats;
pub mod timer;

pub use clock::{Clock, ManualClock, SystemClock};
pub use controller::SessionController;
pub use corrections::{ApprovalOutcome, CorrectionWorkflow, ReviewScope};
pub use engine::{
    ClockOutOutcome, CorrectionOutcome, EndBreakOutcome, EngineSettings, LifecycleEngine,
};
pub use timer::{Tick, TickGuard, TimerAnchor, TimerMode};
