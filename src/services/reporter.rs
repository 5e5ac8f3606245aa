use crate::error::FailureReason;
use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;

/// Receives session outcomes on the reporting context.
///
/// Never called from the capture worker.
#[async_trait]
pub trait Reporter: Send {
    async fn on_started(&mut self, _destination: &Path) {}

    async fn on_success(&mut self, elapsed: Duration);

    async fn on_failure(&mut self, reason: FailureReason);
}

/// Reporter that writes status lines to the log
#[derive(Debug, Default)]
pub struct LogReporter;

#[async_trait]
impl Reporter for LogReporter {
    async fn on_started(&mut self, destination: &Path) {
        tracing::info!("Recording to {}", destination.display());
    }

    async fn on_success(&mut self, elapsed: Duration) {
        tracing::info!("Recording saved ({}s)", elapsed.as_secs());
    }

    async fn on_failure(&mut self, reason: FailureReason) {
        match reason {
            FailureReason::TooShort => tracing::warn!("Recording failed: too short"),
            FailureReason::AlreadyActive => {
                tracing::warn!("Recording failed: a recording is already running")
            }
            reason => tracing::error!("Recording failed ({})", reason.as_str()),
        }
    }
}
