//! Microphone capture to raw PCM files.
//!
//! One recording session at a time runs on a dedicated capture worker; the
//! reporting context issues start/stop requests and receives outcomes.

pub mod audio;
pub mod config;
pub mod error;
pub mod messages;
pub mod services;

pub use audio::{AudioFormat, AudioSink, CaptureBackend, CaptureDevice, SinkFactory};
pub use config::Config;
pub use error::{
    ControlError, DeviceError, FailureReason, PolicyRejection, SessionError, StorageError,
};
pub use messages::{ControllerState, SessionEvent, SessionId, Toggle};
pub use services::{
    LogReporter, RecordingSession, Reporter, SessionConfig, SessionController, SessionOutcome,
    SessionStatus, SessionSummary, StopSignal,
};
