use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Failures of the capture device: unavailable, failed to open, or unusable mid-session.
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("no input audio device available")]
    Unavailable,

    #[error("failed to open capture device: {0}")]
    Open(String),

    #[error("capture device read failed: {0}")]
    Read(String),

    /// The device returned no data; the capture source is treated as unusable
    #[error("capture device returned no frames")]
    NoFrames,
}

/// Failures of the file-backed sink
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to create recordings directory {path:?}: {source}")]
    CreateDir { path: PathBuf, source: io::Error },

    #[error("failed to create recording file {path:?}: {source}")]
    Create { path: PathBuf, source: io::Error },

    #[error("failed to append to recording: {0}")]
    Write(#[source] io::Error),

    #[error("failed to close recording: {0}")]
    Close(#[source] io::Error),
}

/// Outcomes that are not I/O failures but are still reported as unsuccessful
#[derive(Debug, Error)]
pub enum PolicyRejection {
    #[error("recording too short: {elapsed:?} < {minimum:?}")]
    TooShort { elapsed: Duration, minimum: Duration },

    #[error("a recording session is already active")]
    AlreadyActive,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Device(#[from] DeviceError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Rejected(#[from] PolicyRejection),

    /// A backend or sink panicked on the capture worker
    #[error("recording session panicked: {0}")]
    Panicked(String),
}

/// Why the controller refused a control request
#[derive(Debug, Error)]
pub enum ControlError {
    #[error(transparent)]
    Rejected(#[from] PolicyRejection),

    #[error("capture worker is not running")]
    WorkerStopped,
}

/// Coarse failure tag handed to the reporting context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    Device,
    Storage,
    TooShort,
    AlreadyActive,
    Internal,
}

impl FailureReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Device => "device",
            Self::Storage => "storage",
            Self::TooShort => "too-short",
            Self::AlreadyActive => "already-active",
            Self::Internal => "internal",
        }
    }
}

impl PolicyRejection {
    pub fn reason(&self) -> FailureReason {
        match self {
            Self::TooShort { .. } => FailureReason::TooShort,
            Self::AlreadyActive => FailureReason::AlreadyActive,
        }
    }
}

impl SessionError {
    pub fn reason(&self) -> FailureReason {
        match self {
            Self::Device(_) => FailureReason::Device,
            Self::Storage(_) => FailureReason::Storage,
            Self::Rejected(rejection) => rejection.reason(),
            Self::Panicked(_) => FailureReason::Internal,
        }
    }

    /// True for device and storage failures
    pub fn is_io(&self) -> bool {
        matches!(self, Self::Device(_) | Self::Storage(_))
    }
}
