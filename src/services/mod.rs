pub mod controller;
pub mod reporter;
pub mod session;

pub use controller::SessionController;
pub use reporter::{LogReporter, Reporter};
pub use session::{
    RecordingSession, SessionConfig, SessionOutcome, SessionStatus, SessionSummary, StopSignal,
};
