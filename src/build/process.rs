//! Build subprocess execution
//!
//! Each step runs with piped output that is forwarded to the debug log
//! line by line. The tail of that output is kept for error messages.

use crate::error::{NodeserveError, NodeserveResult};
use std::collections::VecDeque;
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Max number of output lines to include in build error messages.
const OUTPUT_TAIL_LINES: usize = 50;

/// How long a cancelled step gets to exit after SIGTERM
const TERMINATE_GRACE: Duration = Duration::from_secs(5);

/// One subprocess of the build, as a typed argument list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepCommand {
    /// Executable to run
    pub program: PathBuf,
    /// Arguments, each passed to the process verbatim
    pub args: Vec<OsString>,
    /// Working directory
    pub current_dir: PathBuf,
    /// Directory prepended to `PATH`
    pub path_prefix: Option<PathBuf>,
}

impl StepCommand {
    /// Run `program` in `current_dir` with no arguments
    pub fn new(program: impl Into<PathBuf>, current_dir: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            current_dir: current_dir.into(),
            path_prefix: None,
        }
    }

    /// Append one argument
    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Look up executables in `dir` before the inherited `PATH`
    pub fn path_prefix(mut self, dir: impl Into<PathBuf>) -> Self {
        self.path_prefix = Some(dir.into());
        self
    }

    /// Short human-readable form, e.g. `npm install`
    pub fn label(&self) -> String {
        let program = self
            .program
            .file_stem()
            .unwrap_or(self.program.as_os_str())
            .to_string_lossy();
        std::iter::once(program.into_owned())
            .chain(self.args.iter().map(|a| a.to_string_lossy().into_owned()))
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn search_path(&self) -> NodeserveResult<Option<OsString>> {
        let Some(prefix) = &self.path_prefix else {
            return Ok(None);
        };
        let inherited = std::env::var_os("PATH").unwrap_or_default();
        let paths = std::iter::once(prefix.clone()).chain(std::env::split_paths(&inherited));
        std::env::join_paths(paths)
            .map(Some)
            .map_err(|e| NodeserveError::Internal(format!("building PATH: {}", e)))
    }
}

/// Run a step to completion.
///
/// A non-zero exit becomes [`NodeserveError::BuildStep`]. Cancellation
/// terminates the step's process group.
pub async fn run_step(step: &StepCommand, cancel: &CancellationToken) -> NodeserveResult<()> {
    let label = step.label();
    if cancel.is_cancelled() {
        return Err(NodeserveError::Cancelled);
    }
    debug!("Running {} in {}", label, step.current_dir.display());

    let mut command = Command::new(&step.program);
    command
        .args(&step.args)
        .current_dir(&step.current_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(path) = step.search_path()? {
        command.env("PATH", path);
    }
    #[cfg(unix)]
    command.process_group(0);

    let mut child = command
        .spawn()
        .map_err(|e| NodeserveError::command_failed(&label, e))?;

    let on_output = |line: String| debug!("\t{}", line);
    let finished = tokio::select! {
        result = async {
            let tail = stream_child_output(&mut child, &on_output).await;
            (tail, child.wait().await)
        } => Some(result),
        () = cancel.cancelled() => None,
    };

    let Some((tail, status)) = finished else {
        warn!("Cancelling {}", label);
        terminate(&mut child).await;
        return Err(NodeserveError::Cancelled);
    };

    let status = status.map_err(|e| NodeserveError::command_failed(&label, e))?;
    if status.success() {
        debug!("{} finished", label);
        Ok(())
    } else {
        Err(NodeserveError::BuildStep {
            command: label,
            code: status.code().unwrap_or(-1),
            output: build_error_output(&tail),
        })
    }
}

/// Stop a child and everything it spawned
async fn terminate(child: &mut Child) {
    #[cfg(unix)]
    if let Some(pid) = child.id() {
        // Negative pid addresses the whole process group
        // SAFETY: kill(2) has no memory-safety preconditions
        let rc = unsafe { libc::kill(-(pid as libc::pid_t), libc::SIGTERM) };
        if rc == 0 {
            if let Ok(Ok(_)) = tokio::time::timeout(TERMINATE_GRACE, child.wait()).await {
                return;
            }
        }
    }

    if let Err(e) = child.kill().await {
        debug!("Failed to kill build step: {}", e);
    }
}

/// Join the kept output lines for an error message
fn build_error_output(tail: &VecDeque<String>) -> String {
    tail.iter().map(String::as_str).collect::<Vec<_>>().join("\n")
}

/// One output pipe of a child, split into lines.
///
/// Lines are raw bytes decoded lossily, so non-UTF-8 output never stops
/// the pipe from being drained.
struct OutputLines<R> {
    reader: BufReader<R>,
    pending: Vec<u8>,
    done: bool,
}

impl<R: AsyncRead + Unpin> OutputLines<R> {
    fn new(inner: R) -> Self {
        Self {
            reader: BufReader::new(inner),
            pending: Vec::new(),
            done: false,
        }
    }

    /// Next line, or `None` once the pipe is closed and drained.
    ///
    /// Cancel safe: bytes of an unfinished line stay in `pending`.
    async fn next_line(&mut self) -> Option<String> {
        match self.reader.read_until(b'\n', &mut self.pending).await {
            Ok(n) if n > 0 => {}
            Ok(_) => self.done = true,
            Err(e) => {
                debug!("Stopped reading build output: {}", e);
                self.done = true;
            }
        }
        if self.pending.is_empty() {
            return None;
        }

        let mut line = std::mem::take(&mut self.pending);
        if line.last() == Some(&b'\n') {
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
        }
        Some(String::from_utf8_lossy(&line).into_owned())
    }
}

/// Stream stdout+stderr from a child process, calling `on_output` for each line.
///
/// Returns the last `OUTPUT_TAIL_LINES` lines for error reporting.
async fn stream_child_output(
    child: &mut Child,
    on_output: &(dyn Fn(String) + Send + Sync),
) -> VecDeque<String> {
    let mut tail = VecDeque::with_capacity(OUTPUT_TAIL_LINES);
    let (Some(stdout), Some(stderr)) = (child.stdout.take(), child.stderr.take()) else {
        return tail;
    };

    let mut stderr = OutputLines::new(stderr);
    let mut stdout = OutputLines::new(stdout);

    while !stderr.done || !stdout.done {
        let line = tokio::select! {
            line = stderr.next_line(), if !stderr.done => line,
            line = stdout.next_line(), if !stdout.done => line,
        };

        if let Some(line) = line {
            on_output(line.clone());
            if tail.len() == OUTPUT_TAIL_LINES {
                tail.pop_front();
            }
            tail.push_back(line);
        }
    }

    tail
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_uses_program_stem() {
        let step = StepCommand::new("/cache/node/bin/npm", "/src").arg("install");
        assert_eq!(step.label(), "npm install");
    }

    #[test]
    fn args_stay_discrete() {
        let step = StepCommand::new("npx", "/src").args(["--yes", "VITE_VIAM_API_KEY=a b"]);
        assert_eq!(step.args.len(), 2);
        assert_eq!(step.args[1], OsString::from("VITE_VIAM_API_KEY=a b"));
    }

    #[test]
    fn search_path_prepends_prefix() {
        let step = StepCommand::new("npm", "/src").path_prefix("/cache/node/bin");
        let path = step.search_path().unwrap().unwrap();
        let first = std::env::split_paths(&path).next().unwrap();
        assert_eq!(first, PathBuf::from("/cache/node/bin"));
    }

    #[test]
    fn error_output_joins_lines() {
        let tail: VecDeque<String> = ["a", "b"].iter().map(|s| s.to_string()).collect();
        assert_eq!(build_error_output(&tail), "a\nb");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn successful_step() {
        let temp = tempfile::TempDir::new().unwrap();
        let step = StepCommand::new("/bin/sh", temp.path()).args(["-c", "echo ok > marker"]);

        run_step(&step, &CancellationToken::new()).await.unwrap();
        assert!(temp.path().join("marker").is_file());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failing_step_reports_code_and_output() {
        let temp = tempfile::TempDir::new().unwrap();
        let step =
            StepCommand::new("/bin/sh", temp.path()).args(["-c", "echo boom >&2; exit 3"]);

        let err = run_step(&step, &CancellationToken::new()).await.unwrap_err();
        match err {
            NodeserveError::BuildStep { code, output, .. } => {
                assert_eq!(code, 3);
                assert!(output.contains("boom"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn output_tail_is_bounded() {
        let temp = tempfile::TempDir::new().unwrap();
        let step = StepCommand::new("/bin/sh", temp.path())
            .args(["-c", "i=0; while [ $i -lt 200 ]; do echo line$i; i=$((i+1)); done; exit 1"]);

        let err = run_step(&step, &CancellationToken::new()).await.unwrap_err();
        let NodeserveError::BuildStep { output, .. } = err else {
            panic!("expected a build step error");
        };
        assert_eq!(output.lines().count(), OUTPUT_TAIL_LINES);
        assert!(output.ends_with("line199"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn cancellation_stops_step() {
        let temp = tempfile::TempDir::new().unwrap();
        let step = StepCommand::new("/bin/sh", temp.path()).args(["-c", "sleep 30"]);
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            trigger.cancel();
        });

        let started = std::time::Instant::now();
        let err = run_step(&step, &cancel).await.unwrap_err();
        assert!(matches!(err, NodeserveError::Cancelled));
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn non_utf8_output_keeps_draining() {
        let temp = tempfile::TempDir::new().unwrap();
        // Far more than a pipe buffer after the undecodable line
        let step = StepCommand::new("/bin/sh", temp.path()).args([
            "-c",
            "printf '\\377\\n'; i=0; while [ $i -lt 20000 ]; do echo filler line $i; i=$((i+1)); done",
        ]);

        let result =
            tokio::time::timeout(Duration::from_secs(60), run_step(&step, &CancellationToken::new()))
                .await
                .expect("step must not stall on a full pipe");
        result.unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn non_utf8_output_is_decoded_lossily() {
        let temp = tempfile::TempDir::new().unwrap();
        let step = StepCommand::new("/bin/sh", temp.path())
            .args(["-c", "printf 'bad \\377 byte\\r\\n' >&2; printf 'no newline'; exit 2"]);

        let err = run_step(&step, &CancellationToken::new()).await.unwrap_err();
        let NodeserveError::BuildStep { code, output, .. } = err else {
            panic!("expected a build step error");
        };
        assert_eq!(code, 2);
        assert!(output.contains("bad \u{FFFD} byte"));
        assert!(output.contains("no newline"));
        assert!(!output.contains('\r'));
    }

    #[tokio::test]
    async fn missing_program_fails_to_launch() {
        let temp = tempfile::TempDir::new().unwrap();
        let step = StepCommand::new(temp.path().join("npm"), temp.path()).arg("install");

        let err = run_step(&step, &CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, NodeserveError::CommandFailed { .. }));
    }
}
