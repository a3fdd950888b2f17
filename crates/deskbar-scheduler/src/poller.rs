//! Periodic height refresh.

use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

use crate::serializer::SerializerHandle;

/// Handle to a running status poller.
#[derive(Debug)]
pub struct PollerHandle {
    paused: watch::Sender<bool>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl PollerHandle {
    /// Stop issuing queries until [`resume`](Self::resume) is called.
    pub fn pause(&self) {
        self.paused.send_replace(true);
    }

    /// Resume issuing queries; the next one follows a full interval.
    pub fn resume(&self) {
        self.paused.send_replace(false);
    }

    #[must_use]
    pub fn is_paused(&self) -> bool {
        *self.paused.borrow()
    }

    /// Cancel the poller and wait for its task to end.
    pub async fn stop(self) {
        self.cancel.cancel();
        let _ = self.task.await;
    }
}

/// Spawn a poller that calls [`SerializerHandle::submit_query`] every
/// `interval`, first firing one interval from now.
///
/// Ticks that fall behind are skipped rather than bursted. Overlap with a
/// slow command is handled by the serializer dropping queries while busy.
/// The poller ends when `shutdown` is cancelled or [`PollerHandle::stop`]
/// is called.
#[must_use]
pub fn spawn_poller(
    serializer: SerializerHandle,
    interval: Duration,
    shutdown: &CancellationToken,
) -> PollerHandle {
    let (paused, paused_rx) = watch::channel(false);
    let cancel = shutdown.child_token();
    let task = tokio::spawn(run_poller(serializer, interval, cancel.clone(), paused_rx));
    PollerHandle { paused, cancel, task }
}

async fn run_poller(
    serializer: SerializerHandle,
    interval: Duration,
    cancel: CancellationToken,
    mut paused: watch::Receiver<bool>,
) {
    info!(?interval, "Status poller started");

    let mut ticker = interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;

            () = cancel.cancelled() => break,

            changed = paused.changed() => {
                if changed.is_err() {
                    break;
                }
                if *paused.borrow_and_update() {
                    debug!("Status poller paused");
                } else {
                    debug!("Status poller resumed");
                    ticker.reset();
                }
            }

            _ = ticker.tick() => {
                if *paused.borrow() {
                    continue;
                }
                trace!("Poll tick");
                serializer.submit_query();
            }
        }
    }

    info!("Status poller stopped");
}
