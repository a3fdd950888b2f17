//! Signal handling for shutdown and configuration reload.

use anyhow::Result;
use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::mpsc;
use tracing::info;

/// A process signal the daemon reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalEvent {
    /// SIGTERM or SIGINT
    Shutdown,
    /// SIGHUP
    Reload,
}

/// Set up signal handlers.
///
/// Returns a receiver that gets [`SignalEvent::Shutdown`] on SIGTERM/SIGINT
/// and [`SignalEvent::Reload`] on SIGHUP.
pub fn setup_signal_handlers() -> Result<mpsc::Receiver<SignalEvent>> {
    let (tx, rx) = mpsc::channel(4);

    // Handle SIGTERM
    let mut terminate = signal(SignalKind::terminate())?;
    let tx_term = tx.clone();
    tokio::spawn(async move {
        if terminate.recv().await.is_some() {
            info!("Received SIGTERM");
            let _ = tx_term.send(SignalEvent::Shutdown).await;
        }
    });

    // Handle SIGINT (Ctrl+C)
    let tx_int = tx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received SIGINT");
            let _ = tx_int.send(SignalEvent::Shutdown).await;
        }
    });

    // Handle SIGHUP, repeatedly
    let mut hangup = signal(SignalKind::hangup())?;
    tokio::spawn(async move {
        while hangup.recv().await.is_some() {
            info!("Received SIGHUP");
            if tx.send(SignalEvent::Reload).await.is_err() {
                break;
            }
        }
    });

    Ok(rx)
}
