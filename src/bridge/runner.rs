//! Launching the helper process.
//!
//! [`ProcessRunner`] is the seam between the bridge and the operating
//! system. The production [`ChildProcessRunner`] spawns the helper with
//! stdin closed and both output pipes captured, then waits at most the
//! configured timeout. On timeout the child is killed and reaped before
//! returning, so no zombie outlives the call.
//!
//! Output pipes are drained on their own threads while we wait: a helper
//! that writes more than a pipe buffer's worth would otherwise block on a
//! full pipe and look like a hang.
//!
//! The timeout is one wall-clock deadline for the whole call. A helper that
//! exits but leaves a descendant holding its stdout or stderr open still
//! times out at that deadline; the reader threads are then detached and
//! finish whenever the descendant lets go of the pipe.

use super::error::BridgeError;
use std::io::Read;
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use wait_timeout::ChildExt;

/// Runs one helper invocation to completion.
pub trait ProcessRunner: Send + Sync {
    /// Execute `program operation payload` and return its stdout.
    ///
    /// Exit status zero is the only success. Failures map onto
    /// [`BridgeError::ProcessFailure`], [`BridgeError::Timeout`] or
    /// [`BridgeError::Invocation`].
    fn run(
        &self,
        program: &Path,
        operation: &str,
        payload: &str,
        timeout: Duration,
    ) -> Result<String, BridgeError>;
}

/// Runs the helper as a real child process.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChildProcessRunner;

impl ChildProcessRunner {
    pub fn new() -> Self {
        Self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stream {
    Stdout,
    Stderr,
}

type Drained = (Stream, std::io::Result<Vec<u8>>);

fn drain<R: Read + Send + 'static>(mut pipe: R, stream: Stream, tx: Sender<Drained>) {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let read = pipe.read_to_end(&mut buf).map(|_| buf);
        // The receiver is gone once the call has timed out.
        let _ = tx.send((stream, read));
    });
}

/// Captured output of a finished child.
#[derive(Default)]
struct Captured {
    stdout: Vec<u8>,
    stderr: Vec<u8>,
}

/// Wait for `pending` pipes to reach end-of-file, but not past `deadline`.
fn collect(
    rx: &Receiver<Drained>,
    mut pending: usize,
    deadline: Instant,
    timeout: Duration,
) -> Result<Captured, BridgeError> {
    let mut captured = Captured::default();
    while pending > 0 {
        let remaining = deadline.saturating_duration_since(Instant::now());
        let (stream, read) = match rx.recv_timeout(remaining) {
            Ok(drained) => drained,
            Err(RecvTimeoutError::Timeout) => {
                warn!("Helper exited but its output stayed open past the timeout");
                return Err(BridgeError::Timeout(timeout));
            }
            Err(RecvTimeoutError::Disconnected) => {
                return Err(BridgeError::Invocation("output reader panicked".into()));
            }
        };
        let bytes = read
            .map_err(|e| BridgeError::Invocation(format!("failed to read helper output: {e}")))?;
        match stream {
            Stream::Stdout => captured.stdout = bytes,
            Stream::Stderr => captured.stderr = bytes,
        }
        pending -= 1;
    }
    Ok(captured)
}

fn kill_and_reap(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

impl ProcessRunner for ChildProcessRunner {
    fn run(
        &self,
        program: &Path,
        operation: &str,
        payload: &str,
        timeout: Duration,
    ) -> Result<String, BridgeError> {
        let deadline = Instant::now() + timeout;
        let mut child = Command::new(program)
            .arg(operation)
            .arg(payload)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                BridgeError::Invocation(format!("failed to launch {}: {e}", program.display()))
            })?;
        debug!("Spawned helper (pid {}) for {}", child.id(), operation);

        let (tx, rx) = mpsc::channel();
        let mut pending = 0;
        if let Some(pipe) = child.stdout.take() {
            drain(pipe, Stream::Stdout, tx.clone());
            pending += 1;
        }
        if let Some(pipe) = child.stderr.take() {
            drain(pipe, Stream::Stderr, tx.clone());
            pending += 1;
        }
        drop(tx);

        let status = match child.wait_timeout(deadline.saturating_duration_since(Instant::now())) {
            Ok(Some(status)) => status,
            Ok(None) => {
                kill_and_reap(&mut child);
                return Err(BridgeError::Timeout(timeout));
            }
            Err(e) => {
                kill_and_reap(&mut child);
                return Err(BridgeError::Invocation(format!(
                    "failed waiting for helper: {e}"
                )));
            }
        };

        let Captured { stdout, stderr } = collect(&rx, pending, deadline, timeout)?;

        if !status.success() {
            return Err(BridgeError::ProcessFailure {
                code: status.code(),
                stderr: String::from_utf8_lossy(&stderr).trim().to_string(),
            });
        }

        String::from_utf8(stdout)
            .map_err(|e| BridgeError::InvalidResponse(format!("helper output is not UTF-8: {e}")))
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::Mutex;

    /// One recorded call to a [`ScriptedRunner`].
    #[derive(Debug, Clone, PartialEq)]
    pub struct Invocation {
        pub program: PathBuf,
        pub operation: String,
        pub payload: String,
    }

    type Handler = dyn Fn(&str, &str) -> Result<String, BridgeError> + Send + Sync;

    /// Runner double that answers from a closure and records every call.
    pub struct ScriptedRunner {
        handler: Box<Handler>,
        invocations: Mutex<Vec<Invocation>>,
    }

    impl ScriptedRunner {
        /// Answer with `handler(operation, payload)`.
        pub fn new(
            handler: impl Fn(&str, &str) -> Result<String, BridgeError> + Send + Sync + 'static,
        ) -> Self {
            Self {
                handler: Box::new(handler),
                invocations: Mutex::new(Vec::new()),
            }
        }

        /// Always print `stdout` and exit zero.
        pub fn replying(stdout: &str) -> Self {
            let stdout = stdout.to_string();
            Self::new(move |_, _| Ok(stdout.clone()))
        }

        /// Always fail with `err`.
        pub fn failing(err: BridgeError) -> Self {
            Self::new(move |_, _| Err(err.clone()))
        }

        pub fn invocations(&self) -> Vec<Invocation> {
            self.invocations.lock().unwrap().clone()
        }

        pub fn count(&self) -> usize {
            self.invocations.lock().unwrap().len()
        }
    }

    impl ProcessRunner for ScriptedRunner {
        fn run(
            &self,
            program: &Path,
            operation: &str,
            payload: &str,
            _timeout: Duration,
        ) -> Result<String, BridgeError> {
            self.invocations.lock().unwrap().push(Invocation {
                program: program.to_path_buf(),
                operation: operation.to_string(),
                payload: payload.to_string(),
            });
            (self.handler)(operation, payload)
        }
    }

    #[test]
    fn scripted_runner_records_calls() {
        let runner = ScriptedRunner::replying("{}");
        let out = runner
            .run(
                Path::new("/bin/helper"),
                "batch-crop",
                "{\"Images\":[]}",
                Duration::from_secs(1),
            )
            .unwrap();
        assert_eq!(out, "{}");
        assert_eq!(
            runner.invocations(),
            vec![Invocation {
                program: "/bin/helper".into(),
                operation: "batch-crop".into(),
                payload: "{\"Images\":[]}".into(),
            }]
        );
    }

    #[cfg(unix)]
    #[test]
    fn child_runner_passes_arguments_and_returns_stdout() {
        let tmp = tempfile::TempDir::new().unwrap();
        let helper = crate::test_helpers::write_script_helper(tmp.path(), r#"printf '%s|%s' "$1" "$2""#);
        let out = ChildProcessRunner::new()
            .run(&helper, "batch-resize", r#"{"Images":[]}"#, Duration::from_secs(10))
            .unwrap();
        assert_eq!(out, r#"batch-resize|{"Images":[]}"#);
    }

    #[test]
    fn collect_gives_up_at_deadline() {
        let (tx, rx) = mpsc::channel::<Drained>();
        tx.send((Stream::Stdout, Ok(b"out".to_vec()))).unwrap();
        let started = Instant::now();
        let err = collect(
            &rx,
            2,
            started + Duration::from_millis(100),
            Duration::from_millis(100),
        )
        .err()
        .unwrap();
        assert_eq!(err, BridgeError::Timeout(Duration::from_millis(100)));
        assert!(started.elapsed() < Duration::from_secs(2));
        drop(tx);
    }

    #[test]
    fn collect_keeps_streams_apart() {
        let (tx, rx) = mpsc::channel::<Drained>();
        tx.send((Stream::Stderr, Ok(b"err".to_vec()))).unwrap();
        tx.send((Stream::Stdout, Ok(b"out".to_vec()))).unwrap();
        let captured = collect(
            &rx,
            2,
            Instant::now() + Duration::from_secs(5),
            Duration::from_secs(5),
        )
        .ok()
        .unwrap();
        assert_eq!(captured.stdout, b"out");
        assert_eq!(captured.stderr, b"err");
    }

    #[test]
    fn missing_executable_is_invocation_error() {
        let tmp = tempfile::TempDir::new().unwrap();
        let err = ChildProcessRunner::new()
            .run(
                &tmp.path().join("no-such-helper"),
                "apply-filters",
                "{}",
                Duration::from_secs(5),
            )
            .unwrap_err();
        assert!(matches!(err, BridgeError::Invocation(msg) if msg.contains("no-such-helper")));
    }
}
