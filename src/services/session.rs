use crate::audio::{AudioFormat, AudioSink, CaptureBackend, CaptureDevice, SinkFactory};
use crate::error::{DeviceError, PolicyRejection, SessionError, StorageError};
use chrono::{DateTime, Local};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Size of the reusable capture buffer, in bytes
pub const DEFAULT_BUFFER_SIZE: usize = 2048;

/// Recordings shorter than this are rejected even when no I/O error occurred
pub const DEFAULT_MIN_DURATION: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    pub format: AudioFormat,
    pub buffer_size: usize,
    pub min_duration: Duration,
}

impl SessionConfig {
    /// Whether a recording of `elapsed` satisfies the minimum duration
    pub fn meets_minimum(&self, elapsed: Duration) -> bool {
        elapsed >= self.min_duration
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            format: AudioFormat::default(),
            buffer_size: DEFAULT_BUFFER_SIZE,
            min_duration: DEFAULT_MIN_DURATION,
        }
    }
}

/// Cooperative stop request for one session.
///
/// Raised from the control context, observed by the capture worker once per
/// loop iteration.
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Lifecycle of a session. Variants are ordered; transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SessionStatus {
    Idle,
    Recording,
    Stopping,
    Completed,
    Failed,
}

impl SessionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// What a finished session recorded
#[derive(Debug, Clone)]
pub struct SessionSummary {
    pub destination: PathBuf,
    pub bytes_written: u64,
    /// Wall-clock time the capture started
    pub recorded_at: DateTime<Local>,
    pub started_at: Instant,
    pub stopped_at: Instant,
    pub elapsed: Duration,
}

#[derive(Debug)]
pub enum SessionOutcome {
    Completed(SessionSummary),
    Failed {
        error: SessionError,
        /// Absent when the session never got past `start`
        summary: Option<SessionSummary>,
    },
}

impl SessionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Completed(_))
    }

    pub fn summary(&self) -> Option<&SessionSummary> {
        match self {
            Self::Completed(summary) => Some(summary),
            Self::Failed { summary, .. } => summary.as_ref(),
        }
    }

    pub fn error(&self) -> Option<&SessionError> {
        match self {
            Self::Completed(_) => None,
            Self::Failed { error, .. } => Some(error),
        }
    }
}

/// One recording attempt: start → capture loop → finalize.
///
/// Owned by the capture worker for its whole life. Device and sink are
/// released in `finalize`, or on drop if the session is abandoned.
pub struct RecordingSession {
    config: SessionConfig,
    destination: PathBuf,
    status: SessionStatus,
    buffer: Vec<u8>,
    device: Option<Box<dyn CaptureDevice>>,
    sink: Option<Box<dyn AudioSink>>,
    recorded_at: Option<DateTime<Local>>,
    started_at: Option<Instant>,
    bytes_written: u64,
}

impl RecordingSession {
    pub fn new(destination: impl Into<PathBuf>, config: SessionConfig) -> Self {
        Self {
            config,
            destination: destination.into(),
            status: SessionStatus::Idle,
            buffer: vec![0; config.buffer_size],
            device: None,
            sink: None,
            recorded_at: None,
            started_at: None,
            bytes_written: 0,
        }
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// Run the whole lifecycle and return its outcome
    pub fn run(
        mut self,
        backend: &dyn CaptureBackend,
        sinks: &dyn SinkFactory,
        stop: &StopSignal,
    ) -> SessionOutcome {
        let result = match self.start(backend, sinks) {
            Ok(()) => self.run_loop(stop),
            Err(e) => Err(e),
        };
        self.finalize(result)
    }

    /// Create the destination file, then open the capture device.
    pub fn start(
        &mut self,
        backend: &dyn CaptureBackend,
        sinks: &dyn SinkFactory,
    ) -> Result<(), SessionError> {
        if self.status != SessionStatus::Idle {
            return Err(PolicyRejection::AlreadyActive.into());
        }

        let sink = match self.create_sink(sinks) {
            Ok(sink) => sink,
            Err(e) => {
                self.transition(SessionStatus::Failed);
                return Err(e.into());
            }
        };

        let device = match backend.open(self.config.format, self.config.buffer_size) {
            Ok(device) => device,
            Err(e) => {
                // Nothing was captured; don't leave an empty file behind.
                if let Err(close) = sink.close() {
                    tracing::warn!("Failed to close unused recording file: {}", close);
                }
                if let Err(rm) = fs::remove_file(&self.destination) {
                    tracing::warn!("Failed to remove {:?}: {}", self.destination, rm);
                }
                self.transition(SessionStatus::Failed);
                return Err(e.into());
            }
        };

        self.sink = Some(sink);
        self.device = Some(device);
        self.recorded_at = Some(Local::now());
        self.started_at = Some(Instant::now());
        self.transition(SessionStatus::Recording);

        tracing::info!("Recording started: {:?}", self.destination);
        Ok(())
    }

    fn create_sink(&self, sinks: &dyn SinkFactory) -> Result<Box<dyn AudioSink>, StorageError> {
        let parent = self.destination.parent().filter(|p| !p.as_os_str().is_empty());
        if let Some(parent) = parent {
            fs::create_dir_all(parent).map_err(|source| StorageError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        sinks.create(&self.destination)
    }

    /// Shuttle buffers from device to sink until `stop` is raised.
    ///
    /// A zero-length read, a read error or a write error ends the loop and
    /// fails the session; nothing is retried.
    pub fn run_loop(&mut self, stop: &StopSignal) -> Result<(), SessionError> {
        let (Some(device), Some(sink)) = (self.device.as_mut(), self.sink.as_mut()) else {
            return Ok(());
        };

        let result: Result<(), SessionError> = loop {
            if stop.is_raised() {
                break Ok(());
            }

            let n = match device.read(&mut self.buffer) {
                Ok(0) => break Err(DeviceError::NoFrames.into()),
                Ok(n) => n,
                Err(e) => break Err(e.into()),
            };

            if let Err(e) = sink.append(&self.buffer[..n]) {
                break Err(e.into());
            }
            self.bytes_written += n as u64;
            tracing::trace!(bytes = n, total = self.bytes_written, "Captured buffer");
        };

        match &result {
            Ok(()) => self.transition(SessionStatus::Stopping),
            Err(e) => {
                tracing::error!("Capture loop failed: {}", e);
                self.transition(SessionStatus::Failed);
            }
        }
        result
    }

    /// Release device and sink, then apply the minimum-duration policy.
    pub fn finalize(mut self, loop_result: Result<(), SessionError>) -> SessionOutcome {
        self.release_device();
        let close_result = self.close_sink();
        let stopped_at = Instant::now();

        let result = match (loop_result, close_result) {
            (Err(e), Err(close)) => {
                tracing::warn!("Failed to close recording after error: {}", close);
                Err(e)
            }
            (Err(e), Ok(())) => Err(e),
            (Ok(()), Err(close)) => Err(close.into()),
            (Ok(()), Ok(())) => Ok(()),
        };

        let summary = match (self.started_at, self.recorded_at) {
            (Some(started_at), Some(recorded_at)) => Some(SessionSummary {
                destination: self.destination.clone(),
                bytes_written: self.bytes_written,
                recorded_at,
                started_at,
                stopped_at,
                elapsed: stopped_at.duration_since(started_at),
            }),
            _ => None,
        };

        let outcome = match (result, summary) {
            (Err(error), summary) => SessionOutcome::Failed { error, summary },
            (Ok(()), Some(summary)) if !self.config.meets_minimum(summary.elapsed) => {
                SessionOutcome::Failed {
                    error: PolicyRejection::TooShort {
                        elapsed: summary.elapsed,
                        minimum: self.config.min_duration,
                    }
                    .into(),
                    summary: Some(summary),
                }
            }
            (Ok(()), Some(summary)) => SessionOutcome::Completed(summary),
            (Ok(()), None) => SessionOutcome::Failed {
                error: PolicyRejection::TooShort {
                    elapsed: Duration::ZERO,
                    minimum: self.config.min_duration,
                }
                .into(),
                summary: None,
            },
        };

        match &outcome {
            SessionOutcome::Completed(summary) => {
                self.transition(SessionStatus::Completed);
                tracing::info!(
                    "Recording completed: {:?} ({:.1}s, {} bytes)",
                    summary.destination,
                    summary.elapsed.as_secs_f64(),
                    summary.bytes_written
                );
            }
            SessionOutcome::Failed { error, .. } => {
                self.transition(SessionStatus::Failed);
                tracing::info!("Recording failed: {}", error);
            }
        }

        outcome
    }

    fn release_device(&mut self) {
        if let Some(mut device) = self.device.take() {
            device.stop();
            drop(device);
            tracing::debug!("Capture device released");
        }
    }

    fn close_sink(&mut self) -> Result<(), StorageError> {
        match self.sink.take() {
            Some(sink) => sink.close(),
            None => Ok(()),
        }
    }

    fn transition(&mut self, next: SessionStatus) {
        if self.status.is_terminal() || next <= self.status {
            tracing::warn!("Ignoring status change {:?} -> {:?}", self.status, next);
            return;
        }
        tracing::debug!("Session status {:?} -> {:?}", self.status, next);
        self.status = next;
    }
}

impl Drop for RecordingSession {
    fn drop(&mut self) {
        if self.device.is_some() || self.sink.is_some() {
            tracing::warn!("Session {:?} dropped before finalize", self.destination);
            self.release_device();
            // The sink flushes on its own drop.
            self.sink.take();
        }
    }
}
