//! Height state tracking and change notification.
//!
//! [`HeightTracker`] is the single writer of [`DeskState`]. Readers take
//! lock-free snapshots or subscribe to be called after every mutation.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::SystemTime;

use arc_swap::ArcSwap;
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::command::{CommandKind, CommandResult};
use crate::error::ErrorKind;
use crate::height::Height;
use crate::state::DeskState;

type Callback = Arc<dyn Fn(&DeskState) + Send + Sync>;

/// Thread-safe owner of the desk state.
#[derive(Clone)]
pub struct HeightTracker {
    inner: Arc<TrackerInner>,
}

struct TrackerInner {
    state: ArcSwap<DeskState>,
    subscribers: Mutex<Vec<(u64, Callback)>>,
    next_subscriber_id: AtomicU64,
}

impl Default for HeightTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for HeightTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HeightTracker").field("state", &self.inner.state.load()).finish_non_exhaustive()
    }
}

impl HeightTracker {
    /// Create a tracker with no known height.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(TrackerInner {
                state: ArcSwap::from_pointee(DeskState::default()),
                subscribers: Mutex::new(Vec::new()),
                next_subscriber_id: AtomicU64::new(1),
            }),
        }
    }

    /// Current state.
    #[must_use]
    pub fn snapshot(&self) -> Arc<DeskState> {
        self.inner.state.load_full()
    }

    /// Register a callback invoked after every state change.
    ///
    /// The callback runs synchronously on whichever thread performed the
    /// mutation, usually a runtime worker. Presentation code should forward
    /// the state to its own context rather than render from inside it.
    /// Dropping the returned [`Subscription`] unregisters the callback.
    #[must_use = "dropping the subscription unsubscribes immediately"]
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&DeskState) + Send + Sync + 'static,
    {
        let id = self.inner.next_subscriber_id.fetch_add(1, Ordering::Relaxed);
        self.inner.subscribers.lock().push((id, Arc::new(callback)));
        debug!(id, "State subscriber registered");
        Subscription { tracker: Arc::downgrade(&self.inner), id }
    }

    /// Mark a move as dispatched to the controller.
    pub fn begin_move(&self, target: Height) {
        self.update(|state| {
            state.is_moving = true;
            state.target = Some(target);
        });
    }

    /// Record the outcome of a controller invocation.
    ///
    /// A success updates the height and clears the error. A failure records
    /// the error kind and keeps the last known height. Any move result ends
    /// the moving phase.
    pub fn apply_result(&self, result: &CommandResult, kind: &CommandKind) {
        self.update(|state| {
            match (result.error_kind, result.parsed_height) {
                (None, Some(height)) => {
                    state.current_height = Some(height);
                    state.last_error = None;
                }
                (Some(error), _) => state.last_error = Some(error),
                (None, None) => state.last_error = Some(ErrorKind::ParseFailed),
            }
            if kind.is_move() {
                state.is_moving = false;
                state.target = None;
            }
        });

        if let Some(error) = result.error_kind {
            warn!(command = %kind, error = %error, "Command failed, keeping last known height");
        } else {
            debug!(command = %kind, height = ?result.parsed_height, "Height updated");
        }
    }

    /// End a move that was cancelled before it produced a result.
    pub fn abandon_move(&self) {
        if !self.inner.state.load().is_moving {
            return;
        }
        self.update(|state| {
            state.is_moving = false;
            state.target = None;
        });
        debug!("Move abandoned");
    }

    fn update(&self, mutate: impl FnOnce(&mut DeskState)) {
        let mut state: DeskState = (**self.inner.state.load()).clone();
        mutate(&mut state);
        state.last_updated = SystemTime::now();
        self.inner.state.store(Arc::new(state.clone()));

        // Call outside the lock so callbacks may subscribe or unsubscribe.
        let callbacks: Vec<Callback> =
            self.inner.subscribers.lock().iter().map(|(_, cb)| Arc::clone(cb)).collect();
        for callback in callbacks {
            callback(&state);
        }
    }
}

/// Registration handle returned by [`HeightTracker::subscribe`].
#[derive(Debug)]
pub struct Subscription {
    tracker: Weak<TrackerInner>,
    id: u64,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(inner) = self.tracker.upgrade() {
            inner.subscribers.lock().retain(|(id, _)| *id != self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    fn ok(cm: u32) -> CommandResult {
        CommandResult::succeeded(Height::from_cm(cm), format!("{cm}cm"), Duration::ZERO)
    }

    fn failed(kind: ErrorKind) -> CommandResult {
        CommandResult::failed(kind, "", Duration::ZERO)
    }

    #[test]
    fn test_success_sets_height_and_clears_error() {
        let tracker = HeightTracker::new();
        tracker.apply_result(&failed(ErrorKind::Timeout), &CommandKind::QueryHeight);
        tracker.apply_result(&ok(100), &CommandKind::QueryHeight);

        let state = tracker.snapshot();
        assert_eq!(state.current_height, Some(Height::from_cm(100)));
        assert_eq!(state.last_error, None);
    }

    #[test]
    fn test_failure_preserves_last_known_height() {
        let tracker = HeightTracker::new();
        tracker.apply_result(&ok(92), &CommandKind::QueryHeight);
        tracker.apply_result(&failed(ErrorKind::ExecutionFailed), &CommandKind::QueryHeight);

        let state = tracker.snapshot();
        assert_eq!(state.current_height, Some(Height::from_cm(92)));
        assert_eq!(state.last_error, Some(ErrorKind::ExecutionFailed));
    }

    #[test]
    fn test_move_lifecycle_toggles_moving() {
        let tracker = HeightTracker::new();
        let target = Height::from_cm(120);
        tracker.begin_move(target);
        assert!(tracker.snapshot().is_moving);
        assert_eq!(tracker.snapshot().target, Some(target));

        tracker.apply_result(&failed(ErrorKind::Timeout), &CommandKind::Move(target));
        let state = tracker.snapshot();
        assert!(!state.is_moving);
        assert_eq!(state.target, None);
        assert_eq!(state.last_error, Some(ErrorKind::Timeout));
    }

    #[test]
    fn test_query_result_does_not_end_move() {
        let tracker = HeightTracker::new();
        tracker.begin_move(Height::from_cm(100));
        tracker.apply_result(&ok(80), &CommandKind::QueryHeight);
        assert!(tracker.snapshot().is_moving);
    }

    #[test]
    fn test_abandon_move_keeps_error() {
        let tracker = HeightTracker::new();
        tracker.apply_result(&failed(ErrorKind::ParseFailed), &CommandKind::QueryHeight);
        tracker.begin_move(Height::from_cm(100));
        tracker.abandon_move();

        let state = tracker.snapshot();
        assert!(!state.is_moving);
        assert_eq!(state.last_error, Some(ErrorKind::ParseFailed));
    }

    #[test]
    fn test_subscribers_see_every_mutation_in_order() {
        let tracker = HeightTracker::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let _subscription = tracker.subscribe(move |state| sink.lock().push(state.current_height));

        tracker.apply_result(&ok(75), &CommandKind::QueryHeight);
        tracker.apply_result(&ok(120), &CommandKind::QueryHeight);

        assert_eq!(*seen.lock(), vec![Some(Height::from_cm(75)), Some(Height::from_cm(120))]);
    }

    #[test]
    fn test_dropping_subscription_stops_notifications() {
        let tracker = HeightTracker::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let subscription = tracker.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        tracker.begin_move(Height::from_cm(100));
        drop(subscription);
        tracker.abandon_move();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_notifications_cross_threads() {
        let tracker = HeightTracker::new();
        let (tx, rx) = std::sync::mpsc::channel();
        let _subscription = tracker.subscribe(move |state| {
            let _ = tx.send(state.current_height);
        });

        let writer = tracker.clone();
        std::thread::spawn(move || writer.apply_result(&ok(101), &CommandKind::QueryHeight))
            .join()
            .unwrap();

        assert_eq!(rx.recv().unwrap(), Some(Height::from_cm(101)));
    }
}
