//! Controller process invocation.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use deskbar_core::{CommandResult, ErrorKind, Height};
use parking_lot::RwLock;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{RunnerError, RunnerResult};

/// How long to wait for output pipes to drain once the child has exited.
const OUTPUT_DRAIN_GRACE: Duration = Duration::from_millis(250);

/// Capability to invoke the desk controller.
///
/// Implementations never fail at the Rust level: every outcome, including
/// timeouts and a missing executable, is reported inside the
/// [`CommandResult`].
#[cfg_attr(any(test, feature = "mock"), mockall::automock)]
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run the controller with `args`, killing it if it outlives `timeout`.
    async fn execute(&self, args: Vec<String>, timeout: Duration) -> CommandResult;
}

/// Runs the controller as a child process.
#[derive(Debug)]
pub struct ProcessRunner {
    executable: RwLock<PathBuf>,
}

impl ProcessRunner {
    /// Create a runner for the given executable.
    #[must_use]
    pub fn new(executable: impl Into<PathBuf>) -> Self {
        Self { executable: RwLock::new(executable.into()) }
    }

    /// Currently configured executable.
    #[must_use]
    pub fn executable(&self) -> PathBuf {
        self.executable.read().clone()
    }

    /// Point the runner at a different executable, e.g. after a config reload.
    pub fn set_executable(&self, executable: impl Into<PathBuf>) {
        let executable = executable.into();
        info!(executable = %executable.display(), "Controller executable updated");
        *self.executable.write() = executable;
    }

    /// Check that the configured executable exists.
    ///
    /// # Errors
    /// Returns [`RunnerError::ExecutableNotFound`] if the path does not exist.
    pub fn check_executable(&self) -> RunnerResult<()> {
        let executable = self.executable();
        if executable.exists() {
            Ok(())
        } else {
            Err(RunnerError::ExecutableNotFound(executable.display().to_string()))
        }
    }
}

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn execute(&self, args: Vec<String>, timeout: Duration) -> CommandResult {
        let executable = self.executable();
        let started = Instant::now();
        let result = run_controller(&executable, &args, timeout, started).await;

        let command = format!("{} {}", executable.display(), args.join(" "));
        let duration_ms = u64::try_from(result.duration.as_millis()).unwrap_or(u64::MAX);
        match result.error_kind {
            None => info!(
                command = %command,
                duration_ms,
                outcome = result.outcome(),
                height = ?result.parsed_height,
                "Controller invoked"
            ),
            Some(_) => warn!(
                command = %command,
                duration_ms,
                outcome = result.outcome(),
                output = %result.raw_output,
                "Controller invoked"
            ),
        }
        result
    }
}

async fn run_controller(
    executable: &Path,
    args: &[String],
    timeout: Duration,
    started: Instant,
) -> CommandResult {
    if !executable.exists() {
        return CommandResult::failed(ErrorKind::NotFound, "", started.elapsed());
    }

    let spawned = Command::new(executable)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn();
    let mut child = match spawned {
        Ok(child) => child,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return CommandResult::failed(ErrorKind::NotFound, e.to_string(), started.elapsed());
        }
        Err(e) => {
            return CommandResult::failed(ErrorKind::ExecutionFailed, e.to_string(), started.elapsed());
        }
    };

    let stdout_task = tokio::spawn(read_pipe(child.stdout.take()));
    let stderr_task = tokio::spawn(read_pipe(child.stderr.take()));

    let status = match tokio::time::timeout(timeout, child.wait()).await {
        Ok(Ok(status)) => status,
        Ok(Err(e)) => {
            stdout_task.abort();
            stderr_task.abort();
            return CommandResult::failed(ErrorKind::ExecutionFailed, e.to_string(), started.elapsed());
        }
        Err(_) => {
            if let Err(e) = child.kill().await {
                warn!(error = %e, "Failed to kill timed out controller");
            }
            let (stdout, stderr) = tokio::join!(drain(stdout_task), drain(stderr_task));
            return CommandResult::failed(
                ErrorKind::Timeout,
                combine(&stdout, &stderr),
                started.elapsed(),
            );
        }
    };

    let (stdout, stderr) = tokio::join!(drain(stdout_task), drain(stderr_task));

    if !status.success() {
        let mut output = combine(&stdout, &stderr);
        if output.is_empty() {
            output = format!("controller exited with {status}");
        }
        return CommandResult::failed(ErrorKind::ExecutionFailed, output, started.elapsed());
    }

    match Height::parse_reading(&stdout) {
        Some(height) => CommandResult::succeeded(height, stdout, started.elapsed()),
        None => CommandResult::failed(ErrorKind::ParseFailed, stdout, started.elapsed()),
    }
}

async fn read_pipe<R: AsyncRead + Unpin>(pipe: Option<R>) -> Vec<u8> {
    let mut buffer = Vec::new();
    if let Some(mut pipe) = pipe {
        if let Err(e) = pipe.read_to_end(&mut buffer).await {
            debug!(error = %e, read = buffer.len(), "Failed to read controller output");
        }
    }
    buffer
}

/// Collect a pipe reader, giving up if a stray grandchild keeps it open.
async fn drain(mut task: JoinHandle<Vec<u8>>) -> String {
    match tokio::time::timeout(OUTPUT_DRAIN_GRACE, &mut task).await {
        Ok(Ok(bytes)) => String::from_utf8_lossy(&bytes).trim().to_string(),
        Ok(Err(_)) => String::new(),
        Err(_) => {
            task.abort();
            String::new()
        }
    }
}

fn combine(stdout: &str, stderr: &str) -> String {
    match (stdout.is_empty(), stderr.is_empty()) {
        (_, true) => stdout.to_string(),
        (true, false) => stderr.to_string(),
        (false, false) => format!("{stdout}\n{stderr}"),
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    const SHELL: &str = "/bin/sh";
    const TIMEOUT: Duration = Duration::from_secs(5);

    fn script(body: &str) -> Vec<String> {
        vec!["-c".to_string(), body.to_string()]
    }

    /// Yields one chunk, then fails like a pipe torn down mid-read.
    struct BrokenPipe {
        sent: bool,
    }

    impl AsyncRead for BrokenPipe {
        fn poll_read(
            mut self: std::pin::Pin<&mut Self>,
            _cx: &mut std::task::Context<'_>,
            buf: &mut tokio::io::ReadBuf<'_>,
        ) -> std::task::Poll<std::io::Result<()>> {
            if self.sent {
                return std::task::Poll::Ready(Err(std::io::Error::other("pipe closed")));
            }
            self.sent = true;
            buf.put_slice(b"Height: 120cm");
            std::task::Poll::Ready(Ok(()))
        }
    }

    #[tokio::test]
    async fn test_pipe_read_error_keeps_partial_output() {
        let bytes = read_pipe(Some(BrokenPipe { sent: false })).await;
        assert_eq!(bytes, b"Height: 120cm");
        assert!(read_pipe(None::<BrokenPipe>).await.is_empty());
    }

    #[tokio::test]
    async fn test_success_parses_height() {
        let runner = ProcessRunner::new(SHELL);
        let result = runner.execute(script("echo 'Height: 100cm'"), TIMEOUT).await;

        assert!(result.success);
        assert_eq!(result.parsed_height, Some(Height::from_cm(100)));
        assert_eq!(result.raw_output, "Height: 100cm");
    }

    #[tokio::test]
    async fn test_non_zero_exit_is_execution_failed() {
        let runner = ProcessRunner::new(SHELL);
        let result = runner.execute(script("echo 'desk not connected' >&2; exit 3"), TIMEOUT).await;

        assert!(!result.success);
        assert_eq!(result.error_kind, Some(ErrorKind::ExecutionFailed));
        assert_eq!(result.raw_output, "desk not connected");
    }

    #[tokio::test]
    async fn test_unreadable_output_is_parse_failed_with_raw_output() {
        let runner = ProcessRunner::new(SHELL);
        let result = runner.execute(script("echo 'ready'"), TIMEOUT).await;

        assert_eq!(result.error_kind, Some(ErrorKind::ParseFailed));
        assert_eq!(result.parsed_height, None);
        assert_eq!(result.raw_output, "ready");
    }

    #[tokio::test]
    async fn test_missing_executable_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let runner = ProcessRunner::new(dir.path().join("desk-controller"));

        let result = runner.execute(vec!["--height".into()], TIMEOUT).await;
        assert_eq!(result.error_kind, Some(ErrorKind::NotFound));
        assert_matches!(runner.check_executable(), Err(RunnerError::ExecutableNotFound(_)));
    }

    #[tokio::test]
    async fn test_set_executable_recovers_from_missing_path() {
        let runner = ProcessRunner::new("/nonexistent/desk-controller");
        runner.set_executable(SHELL);

        assert!(runner.check_executable().is_ok());
        let result = runner.execute(script("echo 75"), TIMEOUT).await;
        assert_eq!(result.parsed_height, Some(Height::from_cm(75)));
    }

    #[tokio::test]
    async fn test_timeout_kills_child_within_bound() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("finished");
        let body = format!("echo 'moving'; sleep 1 && touch '{}'", marker.display());
        let runner = ProcessRunner::new(SHELL);

        let started = Instant::now();
        let result = runner.execute(script(&body), Duration::from_millis(200)).await;
        let elapsed = started.elapsed();

        assert_eq!(result.error_kind, Some(ErrorKind::Timeout));
        assert!(elapsed < Duration::from_secs(1), "took {elapsed:?}");

        // The shell was killed, so it never reaches the touch.
        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert!(!marker.exists());
    }

    #[test]
    fn test_combine_output() {
        assert_eq!(combine("out", ""), "out");
        assert_eq!(combine("", "err"), "err");
        assert_eq!(combine("out", "err"), "out\nerr");
    }
}
