mod progress;
mod queries;
mod service;
mod ticker;
mod workflow;

// Public API of the session subsystem.
pub use crate::error::TrackerError;
pub use progress::SessionProgress;
pub use queries::{Loaded, Notice};
pub use service::{PendingAck, PendingReset, WorkoutSession};
pub use ticker::{SessionTicker, Tick};
pub use workflow::{CompletionReport, ResetMode, ResetReport, TrackerLoopService};
