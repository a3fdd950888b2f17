//! Command serialization and debouncing.
//!
//! A single actor task owns every controller invocation. It guarantees that
//! at most one command is in flight, coalesces bursts of move requests into
//! the last one, and remembers at most one superseding target while a command
//! executes:
//!
//! ```text
//! Idle --submit--> PendingMove --debounce elapsed--> Executing --done--> Idle
//! Idle --query---------------------------------> Executing
//! Executing --submit--> (superseder recorded) --done--> Executing(superseder)
//! Executing --NOT_FOUND--> Halted --resume--> Idle
//! ```

use std::sync::Arc;
use std::time::Duration;

use deskbar_core::{CommandKind, CommandResult, ErrorKind, Height, HeightTracker};
use deskbar_runner::{CommandRunner, ControllerArgs};
use tokio::sync::{mpsc, watch};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Timing and argument settings for the serializer.
#[derive(Debug, Clone)]
pub struct SerializerSettings {
    /// Quiet period a move request must survive before it is sent
    pub debounce: Duration,
    /// Upper bound on a single controller invocation
    pub command_timeout: Duration,
    /// Controller argument templates
    pub args: ControllerArgs,
}

impl Default for SerializerSettings {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(400),
            command_timeout: Duration::from_secs(15),
            args: ControllerArgs::default(),
        }
    }
}

/// Externally visible state of the serializer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Nothing pending or running
    Idle,
    /// A move is waiting out the debounce window
    PendingMove,
    /// A controller invocation is in flight
    Executing,
    /// The controller is missing; submissions are dropped until resumed
    Halted,
}

/// One dispatched controller invocation.
#[derive(Debug, Clone)]
pub struct CommandRequest {
    /// Monotonically increasing dispatch number
    pub seq: u64,
    pub kind: CommandKind,
    /// Cancelled to abandon the invocation and kill the child
    pub cancel: CancellationToken,
}

#[derive(Debug)]
enum Submission {
    Move(Height),
    Query,
    Resume,
}

/// Cheap, cloneable entry point for submitting commands.
///
/// All methods return immediately and may be called from any thread,
/// including a UI thread that is not running inside the tokio runtime.
#[derive(Debug, Clone)]
pub struct SerializerHandle {
    tx: mpsc::UnboundedSender<Submission>,
    phase_rx: watch::Receiver<Phase>,
}

impl SerializerHandle {
    /// Request a move to `target`. Only the latest request is ever honoured.
    pub fn submit(&self, target: Height) {
        self.send(Submission::Move(target));
    }

    /// Request a height refresh. Dropped if a command is already pending or running.
    pub fn submit_query(&self) {
        self.send(Submission::Query);
    }

    /// Leave the halted phase after the controller configuration changed.
    pub fn resume(&self) {
        self.send(Submission::Resume);
    }

    /// Current phase of the serializer.
    #[must_use]
    pub fn phase(&self) -> Phase {
        *self.phase_rx.borrow()
    }

    /// Receiver notified on every phase change.
    #[must_use]
    pub fn watch_phase(&self) -> watch::Receiver<Phase> {
        self.phase_rx.clone()
    }

    fn send(&self, submission: Submission) {
        if let Err(e) = self.tx.send(submission) {
            debug!(submission = ?e.0, "Serializer stopped, submission dropped");
        }
    }
}

/// Spawn the serializer actor on the current runtime.
///
/// The actor stops when `shutdown` is cancelled or every handle is dropped.
/// On stop it abandons any pending debounce and cancels the in-flight
/// invocation.
pub fn spawn_serializer(
    runner: Arc<dyn CommandRunner>,
    tracker: HeightTracker,
    settings: SerializerSettings,
    shutdown: CancellationToken,
) -> (SerializerHandle, JoinHandle<()>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let (phase_tx, phase_rx) = watch::channel(Phase::Idle);

    let serializer = Serializer {
        runner,
        tracker,
        settings,
        shutdown,
        pending: None,
        in_flight: None,
        halted: false,
        next_seq: 0,
        phase_tx,
    };
    let task = tokio::spawn(serializer.run(rx));

    (SerializerHandle { tx, phase_rx }, task)
}

struct PendingMove {
    target: Height,
    deadline: Instant,
}

struct InFlight {
    request: CommandRequest,
    task: JoinHandle<Option<CommandResult>>,
    superseder: Option<Height>,
}

struct Serializer {
    runner: Arc<dyn CommandRunner>,
    tracker: HeightTracker,
    settings: SerializerSettings,
    shutdown: CancellationToken,
    pending: Option<PendingMove>,
    in_flight: Option<InFlight>,
    halted: bool,
    next_seq: u64,
    phase_tx: watch::Sender<Phase>,
}

impl Serializer {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Submission>) {
        debug!(debounce = ?self.settings.debounce, timeout = ?self.settings.command_timeout, "Serializer started");

        loop {
            let deadline = self.pending.as_ref().map(|pending| pending.deadline);

            tokio::select! {
                biased;

                () = self.shutdown.cancelled() => break,

                joined = wait_in_flight(&mut self.in_flight) => self.on_completed(joined),

                submission = rx.recv() => match submission {
                    Some(submission) => self.on_submission(submission),
                    None => break,
                },

                () = wait_deadline(deadline) => self.on_debounce_elapsed(),
            }

            self.publish_phase();
        }

        self.stop().await;
    }

    fn on_submission(&mut self, submission: Submission) {
        match submission {
            Submission::Resume => {
                if self.halted {
                    self.halted = false;
                    info!("Serializer resumed");
                }
            }

            submission if self.halted => {
                warn!(?submission, "Controller unavailable, submission dropped");
            }

            Submission::Move(target) => {
                if let Some(in_flight) = &mut self.in_flight {
                    match in_flight.superseder.replace(target) {
                        Some(previous) => debug!(%previous, %target, "Superseding target replaced"),
                        None => debug!(%target, seq = in_flight.request.seq, "Superseding target recorded"),
                    }
                    return;
                }

                let deadline = Instant::now() + self.settings.debounce;
                if let Some(previous) = self.pending.replace(PendingMove { target, deadline }) {
                    debug!(previous = %previous.target, %target, "Pending move replaced");
                } else {
                    debug!(%target, "Move pending");
                }
            }

            Submission::Query => {
                if self.in_flight.is_some() || self.pending.is_some() {
                    debug!("Query dropped, a command is already pending or running");
                } else {
                    self.dispatch(CommandKind::QueryHeight);
                }
            }
        }
    }

    fn on_debounce_elapsed(&mut self) {
        if let Some(pending) = self.pending.take() {
            self.dispatch(CommandKind::Move(pending.target));
        }
    }

    fn on_completed(&mut self, joined: Result<Option<CommandResult>, JoinError>) {
        let Some(InFlight { request, superseder, .. }) = self.in_flight.take() else {
            return;
        };

        let result = match joined {
            Ok(Some(result)) => result,
            Ok(None) => {
                debug!(seq = request.seq, command = %request.kind, "Command cancelled");
                if request.kind.is_move() {
                    self.tracker.abandon_move();
                }
                return;
            }
            Err(e) => {
                error!(seq = request.seq, error = %e, "Command task failed");
                CommandResult::failed(ErrorKind::ExecutionFailed, e.to_string(), Duration::ZERO)
            }
        };

        debug!(
            seq = request.seq,
            command = %request.kind,
            outcome = result.outcome(),
            "Command completed"
        );
        self.tracker.apply_result(&result, &request.kind);

        if result.error_kind.is_some_and(ErrorKind::is_fatal) {
            self.halted = true;
            error!(
                discarded = ?superseder,
                "Desk controller not found, no further commands until the configuration changes"
            );
            return;
        }

        if let Some(target) = superseder {
            self.dispatch(CommandKind::Move(target));
        }
    }

    fn dispatch(&mut self, kind: CommandKind) {
        self.next_seq += 1;
        let request =
            CommandRequest { seq: self.next_seq, kind, cancel: self.shutdown.child_token() };

        if let CommandKind::Move(target) = kind {
            self.tracker.begin_move(target);
        }

        let runner = Arc::clone(&self.runner);
        let args = self.settings.args.for_kind(&kind);
        let timeout = self.settings.command_timeout;
        let cancel = request.cancel.clone();
        let task = tokio::spawn(async move {
            let command = args.join(" ");
            let started = Instant::now();
            tokio::select! {
                result = runner.execute(args, timeout) => Some(result),
                () = cancel.cancelled() => {
                    // The runner's own record is lost with its future.
                    let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
                    info!(command = %command, duration_ms, outcome = "cancelled", "Controller invoked");
                    None
                }
            }
        });

        debug!(seq = request.seq, command = %kind, "Command dispatched");
        self.in_flight = Some(InFlight { request, task, superseder: None });
    }

    async fn stop(&mut self) {
        if let Some(pending) = self.pending.take() {
            debug!(target = %pending.target, "Pending move abandoned");
        }

        if let Some(in_flight) = self.in_flight.take() {
            in_flight.request.cancel.cancel();
            if let Err(e) = in_flight.task.await {
                warn!(error = %e, "Command task failed during shutdown");
            }
            if in_flight.request.kind.is_move() {
                self.tracker.abandon_move();
            }
        }

        self.publish_phase();
        info!("Serializer stopped");
    }

    fn phase(&self) -> Phase {
        if self.halted {
            Phase::Halted
        } else if self.in_flight.is_some() {
            Phase::Executing
        } else if self.pending.is_some() {
            Phase::PendingMove
        } else {
            Phase::Idle
        }
    }

    fn publish_phase(&self) {
        let phase = self.phase();
        self.phase_tx.send_if_modified(|current| {
            if *current == phase {
                false
            } else {
                *current = phase;
                true
            }
        });
    }
}

async fn wait_in_flight(
    in_flight: &mut Option<InFlight>,
) -> Result<Option<CommandResult>, JoinError> {
    match in_flight {
        Some(in_flight) => (&mut in_flight.task).await,
        None => std::future::pending().await,
    }
}

async fn wait_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
