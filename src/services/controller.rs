use crate::audio::{CaptureBackend, SinkFactory, recording_path};
use crate::error::{ControlError, PolicyRejection, SessionError};
use crate::messages::{ControllerState, SessionEvent, SessionId, Toggle, WorkerCommand};
use crate::services::reporter::Reporter;
use crate::services::session::{RecordingSession, SessionConfig, SessionOutcome, StopSignal};
use anyhow::{Context, Result, anyhow};
use chrono::Local;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::JoinHandle;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

/// Runs recording sessions on a single dedicated thread
///
/// The worker:
/// - Receives one session at a time from a mailbox of size 1
/// - Runs start, capture loop and finalize back to back
/// - Posts `Started` / `Finished` events for the reporting context
///
/// The capture device API is not safe for concurrent use and may be `!Send`
/// (cpal::Stream), so devices are opened, read and dropped on this thread only.
struct CaptureWorker<B, S> {
    config: SessionConfig,
    backend: B,
    sinks: S,
    cmd_rx: mpsc::Receiver<WorkerCommand>,
    event_tx: mpsc::UnboundedSender<SessionEvent>,
    active: Arc<AtomicUsize>,
}

impl<B: CaptureBackend, S: SinkFactory> CaptureWorker<B, S> {
    fn run(mut self) {
        tracing::debug!("Capture worker started");
        while let Some(cmd) = self.cmd_rx.blocking_recv() {
            self.handle_command(cmd);
        }
        tracing::debug!("Capture worker exiting");
    }

    fn handle_command(&mut self, cmd: WorkerCommand) {
        match cmd {
            WorkerCommand::Record {
                id,
                destination,
                stop,
            } => {
                let outcome = self.record(id, destination, &stop);
                self.post(SessionEvent::Finished { id, outcome });
            }
        }
    }

    fn record(
        &self,
        id: SessionId,
        destination: PathBuf,
        stop: &StopSignal,
    ) -> SessionOutcome {
        tracing::info!("Session {} starting", id);

        // Panics in a backend or sink still end in a Finished event.
        let mut holding = false;
        let recorded = panic::catch_unwind(AssertUnwindSafe(|| {
            let mut session = RecordingSession::new(destination.clone(), self.config);
            let result = match session.start(&self.backend, &self.sinks) {
                Ok(()) => {
                    holding = true;
                    self.active.fetch_add(1, Ordering::SeqCst);
                    self.post(SessionEvent::Started { id, destination });
                    session.run_loop(stop)
                }
                Err(e) => Err(e),
            };
            session.finalize(result)
        }));

        if holding {
            self.active.fetch_sub(1, Ordering::SeqCst);
        }

        let outcome = recorded.unwrap_or_else(|payload| {
            let message = panic_message(payload.as_ref());
            tracing::error!("Session {} panicked: {}", id, message);
            SessionOutcome::Failed {
                error: SessionError::Panicked(message),
                summary: None,
            }
        });

        tracing::info!("Session {} finished (success: {})", id, outcome.is_success());
        outcome
    }

    fn post(&self, event: SessionEvent) {
        let id = event.id();
        if self.event_tx.send(event).is_err() {
            tracing::warn!("Reporting context gone, dropping event of {}", id);
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

struct ActiveSession {
    id: SessionId,
    stop: StopSignal,
    state: ControllerState,
}

/// Serializes recording sessions onto one capture worker
///
/// Lives on the reporting context. Request methods never block: starting
/// enqueues a session, stopping only raises its stop signal. Outcomes come
/// back through `next_event` and are delivered with `dispatch`.
pub struct SessionController {
    cmd_tx: Option<mpsc::Sender<WorkerCommand>>,
    event_rx: mpsc::UnboundedReceiver<SessionEvent>,
    worker: Option<JoinHandle<()>>,
    active: Option<ActiveSession>,
    active_gauge: Arc<AtomicUsize>,
    recordings_dir: PathBuf,
    next_id: u64,
}

impl SessionController {
    pub fn spawn(
        config: SessionConfig,
        recordings_dir: impl Into<PathBuf>,
        backend: impl CaptureBackend,
        sinks: impl SinkFactory,
    ) -> Result<Self> {
        let (cmd_tx, cmd_rx) = mpsc::channel(1);
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let active_gauge = Arc::new(AtomicUsize::new(0));

        let worker = CaptureWorker {
            config,
            backend,
            sinks,
            cmd_rx,
            event_tx,
            active: active_gauge.clone(),
        };

        let handle = std::thread::Builder::new()
            .name("capture-worker".into())
            .spawn(move || worker.run())
            .context("Failed to spawn capture worker")?;

        Ok(Self {
            cmd_tx: Some(cmd_tx),
            event_rx,
            worker: Some(handle),
            active: None,
            active_gauge,
            recordings_dir: recordings_dir.into(),
            next_id: 0,
        })
    }

    pub fn state(&self) -> ControllerState {
        self.active
            .as_ref()
            .map_or(ControllerState::Idle, |active| active.state)
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    /// Sessions currently holding a device and sink on the worker (0 or 1)
    pub fn active_sessions(&self) -> usize {
        self.active_gauge.load(Ordering::SeqCst)
    }

    /// Enqueue a new session. Rejected while another one is recording or stopping.
    pub fn request_start(
        &mut self,
        destination: impl Into<PathBuf>,
    ) -> Result<SessionId, ControlError> {
        if let Some(active) = &self.active {
            tracing::debug!("Session {} still active, rejecting start", active.id);
            return Err(PolicyRejection::AlreadyActive.into());
        }

        let cmd_tx = self.cmd_tx.as_ref().ok_or(ControlError::WorkerStopped)?;

        self.next_id += 1;
        let id = SessionId(self.next_id);
        let stop = StopSignal::new();

        cmd_tx
            .try_send(WorkerCommand::Record {
                id,
                destination: destination.into(),
                stop: stop.clone(),
            })
            .map_err(|e| match e {
                TrySendError::Full(_) => ControlError::Rejected(PolicyRejection::AlreadyActive),
                TrySendError::Closed(_) => ControlError::WorkerStopped,
            })?;

        self.active = Some(ActiveSession {
            id,
            stop,
            state: ControllerState::Recording,
        });
        tracing::debug!("Session {} submitted", id);
        Ok(id)
    }

    /// Ask the active session to stop. Returns false when there is nothing to stop.
    pub fn request_stop(&mut self) -> bool {
        match self.active.as_mut() {
            Some(active) if active.state == ControllerState::Recording => {
                active.stop.raise();
                active.state = ControllerState::Stopping;
                tracing::debug!("Stop requested for session {}", active.id);
                true
            }
            _ => false,
        }
    }

    /// Start if idle, stop if recording
    pub fn toggle_recording(&mut self) -> Result<Toggle, ControlError> {
        match self.state() {
            ControllerState::Idle => {
                let destination = recording_path(&self.recordings_dir, Local::now());
                let id = self.request_start(destination.clone())?;
                Ok(Toggle::Started { id, destination })
            }
            ControllerState::Recording => {
                let id = self.active.as_ref().map(|active| active.id);
                self.request_stop();
                Ok(id.map_or(Toggle::Busy, Toggle::StopRequested))
            }
            ControllerState::Stopping => {
                tracing::debug!("Already stopping, ignoring toggle");
                Ok(Toggle::Busy)
            }
        }
    }

    /// Wait for the next event from the capture worker
    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        self.event_rx.recv().await
    }

    /// Deliver an event to the reporter. Call from the reporting context.
    pub async fn dispatch(&mut self, event: SessionEvent, reporter: &mut dyn Reporter) {
        match event {
            SessionEvent::Started { destination, .. } => {
                reporter.on_started(&destination).await;
            }
            SessionEvent::Finished { id, outcome } => {
                if self.active.as_ref().is_some_and(|active| active.id == id) {
                    self.active = None;
                }
                match outcome {
                    SessionOutcome::Completed(summary) => {
                        reporter.on_success(summary.elapsed).await;
                    }
                    SessionOutcome::Failed { error, .. } => {
                        reporter.on_failure(error.reason()).await;
                    }
                }
            }
        }
    }

    /// Cancel any in-flight session, wait for the worker to release its
    /// resources, and deliver the remaining events.
    pub async fn shutdown(mut self, reporter: &mut dyn Reporter) -> Result<()> {
        if let Some(active) = &self.active {
            tracing::info!("Cancelling session {}", active.id);
            active.stop.raise();
        }

        // Closing the mailbox lets the worker exit once the current session is finalized.
        self.cmd_tx.take();

        if let Some(worker) = self.worker.take() {
            tokio::task::spawn_blocking(move || worker.join())
                .await
                .context("Failed to join capture worker")?
                .map_err(|_| anyhow!("Capture worker panicked"))?;
        }

        while let Ok(event) = self.event_rx.try_recv() {
            self.dispatch(event, reporter).await;
        }

        tracing::info!("Session controller shut down");
        Ok(())
    }
}

/// Cancels the in-flight session and waits for the worker to release it.
///
/// Blocks for at most one device read plus finalize.
impl Drop for SessionController {
    fn drop(&mut self) {
        if let Some(active) = &self.active {
            active.stop.raise();
        }
        self.cmd_tx.take();

        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                tracing::error!("Capture worker panicked");
            }
        }
    }
}
