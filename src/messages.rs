use crate::services::session::{SessionOutcome, StopSignal};
use std::fmt;
use std::path::PathBuf;

/// Monotonic id assigned by the controller to each accepted start request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Commands for the capture worker
pub enum WorkerCommand {
    Record {
        id: SessionId,
        destination: PathBuf,
        stop: StopSignal,
    },
}

/// Events posted by the capture worker to the reporting context
#[derive(Debug)]
pub enum SessionEvent {
    Started { id: SessionId, destination: PathBuf },
    Finished { id: SessionId, outcome: SessionOutcome },
}

impl SessionEvent {
    pub fn id(&self) -> SessionId {
        match self {
            Self::Started { id, .. } | Self::Finished { id, .. } => *id,
        }
    }
}

/// Controller state as seen from the reporting context
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ControllerState {
    Idle,
    Recording,
    Stopping,
}

/// Result of `toggle_recording`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Toggle {
    Started { id: SessionId, destination: PathBuf },
    StopRequested(SessionId),
    /// A stop is already in flight; the toggle was ignored
    Busy,
}
