//! Scripted controller used by the scheduler tests.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use deskbar_core::{CommandKind, CommandResult, ErrorKind, Height};
use deskbar_runner::{CommandRunner, ControllerArgs};
use parking_lot::Mutex;
use tokio::time::sleep;

pub fn move_args(cm: u32) -> Vec<String> {
    ControllerArgs::default().for_kind(&CommandKind::Move(Height::from_cm(cm)))
}

pub fn query_args() -> Vec<String> {
    ControllerArgs::default().for_kind(&CommandKind::QueryHeight)
}

/// Fake controller that records calls and answers after a virtual delay.
///
/// Moves report the requested height; queries report a fixed height. A delay
/// longer than the timeout yields `Timeout`.
pub struct FakeRunner {
    calls: Mutex<Vec<Vec<String>>>,
    failures: Mutex<VecDeque<ErrorKind>>,
    move_delay: Duration,
    query_delay: Duration,
    query_height: Height,
}

impl FakeRunner {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            failures: Mutex::new(VecDeque::new()),
            move_delay: Duration::from_millis(100),
            query_delay: Duration::from_millis(10),
            query_height: Height::from_cm(90),
        }
    }

    pub fn with_move_delay(mut self, delay: Duration) -> Self {
        self.move_delay = delay;
        self
    }

    pub fn with_query_delay(mut self, delay: Duration) -> Self {
        self.query_delay = delay;
        self
    }

    pub fn with_query_height(mut self, height: Height) -> Self {
        self.query_height = height;
        self
    }

    /// Make the next invocation fail with `kind`.
    pub fn fail_next(&self, kind: ErrorKind) {
        self.failures.lock().push_back(kind);
    }

    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl CommandRunner for FakeRunner {
    async fn execute(&self, args: Vec<String>, timeout: Duration) -> CommandResult {
        self.calls.lock().push(args.clone());

        let target = match args.as_slice() {
            [flag, value] if flag == "--move-to" => value.parse::<Height>().ok(),
            _ => None,
        };
        let delay = if target.is_some() { self.move_delay } else { self.query_delay };

        if delay > timeout {
            sleep(timeout).await;
            return CommandResult::failed(ErrorKind::Timeout, "", timeout);
        }
        sleep(delay).await;

        if let Some(kind) = self.failures.lock().pop_front() {
            return CommandResult::failed(kind, "", delay);
        }
        let height = target.unwrap_or(self.query_height);
        CommandResult::succeeded(height, height.to_string(), delay)
    }
}
