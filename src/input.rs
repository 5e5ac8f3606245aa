use anyhow::{Context, Result};
use std::io::BufRead;
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputCommand {
    Toggle,
    Quit,
}

pub fn parse_command(line: &str) -> Option<InputCommand> {
    match line.trim() {
        "" | "t" | "toggle" => Some(InputCommand::Toggle),
        "q" | "quit" | "exit" => Some(InputCommand::Quit),
        _ => None,
    }
}

/// Read control commands from stdin on a dedicated thread.
///
/// An empty line (Enter) toggles recording, `q` quits. End of input is
/// treated as quit. A plain thread is used so a pending read never holds up
/// runtime shutdown.
pub fn spawn_stdin_monitor(tx: mpsc::Sender<InputCommand>) -> Result<()> {
    std::thread::Builder::new()
        .name("stdin-input".into())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                let line = match line {
                    Ok(line) => line,
                    Err(e) => {
                        tracing::error!("Failed to read stdin: {}", e);
                        break;
                    }
                };

                match parse_command(&line) {
                    Some(cmd) => {
                        tracing::debug!("Input command: {:?}", cmd);
                        if tx.blocking_send(cmd).is_err() {
                            return;
                        }
                    }
                    None => {
                        tracing::warn!("Unknown command {:?} (Enter toggles, q quits)", line.trim())
                    }
                }
            }

            let _ = tx.blocking_send(InputCommand::Quit);
        })
        .context("Failed to spawn stdin monitor")?;

    Ok(())
}
