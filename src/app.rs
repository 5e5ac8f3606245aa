use crate::input::{self, InputCommand};

use anyhow::Result;
use pcm_recorder::audio::{MicrophoneBackend, PcmFileFactory};
use pcm_recorder::{Config, ControlError, LogReporter, Reporter, SessionController, Toggle};
use tokio::sync::mpsc;

pub struct App {
    controller: SessionController,
    reporter: LogReporter,
    input_rx: mpsc::Receiver<InputCommand>,
}

impl App {
    pub fn new(config: Config) -> Result<Self> {
        let controller = Self::setup_controller(&config)?;
        let input_rx = Self::setup_input()?;

        tracing::info!(
            "Ready! Press Enter to start/stop recording, q to quit. Saving to {:?}",
            config.recordings_dir
        );

        Ok(Self {
            controller,
            reporter: LogReporter,
            input_rx,
        })
    }

    pub async fn run(mut self) -> Result<()> {
        loop {
            tracing::debug!("Main loop: waiting for event");
            tokio::select! {
                cmd = self.input_rx.recv() => match cmd {
                    Some(InputCommand::Toggle) => self.handle_toggle().await,
                    Some(InputCommand::Quit) | None => {
                        tracing::info!("Quit requested, shutting down");
                        break;
                    }
                },

                // Outcomes are delivered here, never on the capture worker
                Some(event) = self.controller.next_event() => {
                    tracing::debug!("Main loop: session event {:?}", event.id());
                    self.controller.dispatch(event, &mut self.reporter).await;
                }

                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Received Ctrl+C, shutting down");
                    break;
                }
            }
        }

        self.controller.shutdown(&mut self.reporter).await?;
        tracing::info!("Recorder shutdown complete");
        Ok(())
    }

    async fn handle_toggle(&mut self) {
        tracing::debug!("handle_toggle: current state = {:?}", self.controller.state());

        match self.controller.toggle_recording() {
            Ok(Toggle::Started { id, destination }) => {
                tracing::info!("Starting recording {} -> {:?}", id, destination);
            }
            Ok(Toggle::StopRequested(id)) => tracing::info!("Stopping recording {}", id),
            Ok(Toggle::Busy) => tracing::debug!("Already stopping, ignoring toggle"),
            Err(ControlError::Rejected(rejection)) => {
                self.reporter.on_failure(rejection.reason()).await;
            }
            Err(e) => tracing::error!("Error handling toggle: {}", e),
        }
    }

    fn setup_controller(config: &Config) -> Result<SessionController> {
        SessionController::spawn(
            config.session_config(),
            config.recordings_dir.clone(),
            MicrophoneBackend::new(config.read_timeout()),
            PcmFileFactory,
        )
    }

    fn setup_input() -> Result<mpsc::Receiver<InputCommand>> {
        let (input_tx, input_rx) = mpsc::channel(10);
        input::spawn_stdin_monitor(input_tx)?;
        Ok(input_rx)
    }
}
