//! Console presentation of the status item.
//!
//! Stands in for a native status-bar widget: renders the status label on
//! every state change and turns typed commands into the same gestures a
//! slider or preset button would produce.

use std::io::BufRead;

use anyhow::{Context, Result};
use deskbar_core::{DeskState, HeightRange, HeightTracker, StatusView, UiGesture};
use deskbar_scheduler::SerializerHandle;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::PresetsConfig;

const HELP: &str = "commands: sit | stand | move <cm> | refresh | status | help | quit";

/// Read stdin lines on a dedicated thread.
///
/// Blocking reads stay off the runtime so a silent terminal never holds up
/// shutdown.
pub fn spawn_stdin_reader() -> Result<mpsc::UnboundedReceiver<String>> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::Builder::new()
        .name("deskbar-stdin".to_string())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if tx.send(line).is_err() {
                    break;
                }
            }
            debug!("Stdin closed");
        })
        .context("Failed to spawn stdin reader thread")?;
    Ok(rx)
}

/// Console stand-in for the status-bar item and its popover.
pub struct ConsolePresenter {
    serializer: SerializerHandle,
    tracker: HeightTracker,
    presets: PresetsConfig,
    range: HeightRange,
    shutdown: CancellationToken,
}

impl ConsolePresenter {
    #[must_use]
    pub fn new(
        serializer: SerializerHandle,
        tracker: HeightTracker,
        presets: PresetsConfig,
        range: HeightRange,
        shutdown: CancellationToken,
    ) -> Self {
        Self { serializer, tracker, presets, range, shutdown }
    }

    /// Forward a gesture to the serializer.
    pub fn dispatch(&self, gesture: UiGesture) {
        debug!(?gesture, "Gesture");
        match gesture {
            UiGesture::SliderReleased(requested) => {
                let target = self.range.clamp(requested);
                if target != requested {
                    info!(%requested, %target, "Requested height clamped to range");
                }
                self.serializer.submit(target);
            }
            UiGesture::Preset(preset) => self.serializer.submit(self.presets.height(preset)),
            UiGesture::Refresh => self.serializer.submit_query(),
            UiGesture::Quit => {
                info!("Quit requested");
                self.shutdown.cancel();
            }
        }
    }

    /// Render state changes and handle input lines until shutdown.
    ///
    /// Closing the input only stops command handling; rendering continues.
    ///
    /// # Errors
    /// Returns an error if writing to `output` fails.
    pub async fn run<W>(self, mut input: mpsc::UnboundedReceiver<String>, output: &mut W) -> Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        // Tracker callbacks run on the serializer's context; hop onto ours.
        let (state_tx, mut state_rx) = mpsc::unbounded_channel::<DeskState>();
        let _subscription = self.tracker.subscribe(move |state| {
            let _ = state_tx.send(state.clone());
        });

        let mut last_view = StatusView::from_state(&self.tracker.snapshot());
        write_view(output, &last_view).await?;

        let mut input_open = true;
        loop {
            tokio::select! {
                biased;

                () = self.shutdown.cancelled() => break,

                Some(state) = state_rx.recv() => {
                    let view = StatusView::from_state(&state);
                    if view != last_view {
                        write_view(output, &view).await?;
                        last_view = view;
                    }
                }

                line = input.recv(), if input_open => match line {
                    Some(line) => self.handle_line(line.trim(), output).await?,
                    None => input_open = false,
                },
            }
        }

        Ok(())
    }

    async fn handle_line<W>(&self, line: &str, output: &mut W) -> Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        match line {
            "" => Ok(()),
            "help" => write_line(output, HELP).await,
            "status" => {
                let json = serde_json::to_string_pretty(&*self.tracker.snapshot())?;
                write_line(output, &json).await
            }
            _ => match line.parse::<UiGesture>() {
                Ok(gesture) => {
                    self.dispatch(gesture);
                    Ok(())
                }
                Err(e) => write_line(output, &format!("{e} ({HELP})")).await,
            },
        }
    }
}

async fn write_view<W: AsyncWrite + Unpin>(output: &mut W, view: &StatusView) -> Result<()> {
    write_line(output, &format!("[{}] {}", view.label, view.detail)).await
}

async fn write_line<W: AsyncWrite + Unpin>(output: &mut W, line: &str) -> Result<()> {
    output.write_all(line.as_bytes()).await?;
    output.write_all(b"\n").await?;
    output.flush().await?;
    Ok(())
}
