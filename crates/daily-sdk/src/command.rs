// Command-execution seam.
// Every external program the job touches (git, ssh-agent, docker) is described
// by a `CommandSpec` and executed through a `CommandRunner`.

use crate::trace::TraceWriter;
use anyhow::{Context, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Error type for non-zero process exit codes.
#[derive(Debug, thiserror::Error)]
#[error("Exit code {exit_code} returned from process: '{command}'.")]
pub struct ProcessExitCodeError {
    pub exit_code: i32,
    pub command: String,
}

/// Where one output stream of a child process goes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum OutputTarget {
    /// Each line is reported through the runner's trace writer.
    #[default]
    Trace,
    /// Each line is appended to the given file, created if missing.
    AppendFile(PathBuf),
    /// Lines are kept in memory and returned in `CommandOutput`.
    Capture,
    Discard,
}

/// A fully described external command.
#[derive(Debug, Clone, Default)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub working_directory: Option<PathBuf>,
    pub environment: HashMap<String, String>,
    pub stdout: OutputTarget,
    pub stderr: OutputTarget,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Self::default()
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_directory = Some(dir.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.environment.insert(key.into(), value.into());
        self
    }

    pub fn stdout(mut self, target: OutputTarget) -> Self {
        self.stdout = target;
        self
    }

    pub fn stderr(mut self, target: OutputTarget) -> Self {
        self.stderr = target;
        self
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            if arg.is_empty() || arg.contains(char::is_whitespace) {
                write!(f, " \"{arg}\"")?;
            } else {
                write!(f, " {arg}")?;
            }
        }
        Ok(())
    }
}

/// Result of a child process that ran to completion.
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub exit_code: i32,
    /// Captured stdout lines; empty unless the stdout target was `Capture`.
    pub stdout: Vec<String>,
    /// Captured stderr lines; empty unless the stderr target was `Capture`.
    pub stderr: Vec<String>,
    pub elapsed: Duration,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Turn a non-zero exit code into a `ProcessExitCodeError`.
    pub fn check(&self, spec: &CommandSpec) -> std::result::Result<(), ProcessExitCodeError> {
        if self.success() {
            Ok(())
        } else {
            Err(ProcessExitCodeError {
                exit_code: self.exit_code,
                command: spec.to_string(),
            })
        }
    }
}

/// Runs external commands.
///
/// `Err` means the process could not be started, could not be awaited, or was
/// cancelled. A process that ran and exited non-zero is `Ok` with its exit
/// code; callers decide whether that is a failure.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, spec: CommandSpec, cancel: CancellationToken) -> Result<CommandOutput>;
}

// ---------------------------------------------------------------------------
// Output sinks
// ---------------------------------------------------------------------------

enum SinkKind {
    Trace(Arc<dyn TraceWriter>, String),
    File(File),
    Capture,
    Discard,
}

/// Receives the lines of one child stream according to its `OutputTarget`.
pub(crate) struct LineSink {
    kind: SinkKind,
    captured: Vec<String>,
}

impl LineSink {
    pub(crate) fn open(
        target: &OutputTarget,
        trace: Arc<dyn TraceWriter>,
        label: String,
    ) -> Result<Self> {
        let kind = match target {
            OutputTarget::Trace => SinkKind::Trace(trace, label),
            OutputTarget::AppendFile(path) => {
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent).with_context(|| {
                        format!("Failed to create directory '{}'", parent.display())
                    })?;
                }
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .with_context(|| format!("Failed to open '{}' for append", path.display()))?;
                SinkKind::File(file)
            }
            OutputTarget::Capture => SinkKind::Capture,
            OutputTarget::Discard => SinkKind::Discard,
        };
        Ok(Self {
            kind,
            captured: Vec::new(),
        })
    }

    pub(crate) fn write_line(&mut self, line: &str) {
        match &mut self.kind {
            SinkKind::Trace(trace, label) => trace.info(&format!("{label}: {line}")),
            SinkKind::File(file) => {
                // A full disk must not kill the child; the line is dropped.
                let _ = writeln!(file, "{line}");
            }
            SinkKind::Capture => self.captured.push(line.to_string()),
            SinkKind::Discard => {}
        }
    }

    pub(crate) fn finish(mut self) -> Vec<String> {
        if let SinkKind::File(ref mut file) = self.kind {
            let _ = file.flush();
        }
        self.captured
    }
}

// ---------------------------------------------------------------------------
// Recording runner (tests)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct ScriptedResponse {
    prefix: String,
    exit_code: i32,
    stdout: Vec<String>,
}

/// A `CommandRunner` that never spawns anything.
///
/// Every invocation is recorded. Responses are scripted by command-line
/// prefix (the first matching script wins); unscripted commands exit 0 with no
/// output. Scripted stdout lines are delivered to the spec's stdout target, so
/// file and capture targets behave as they would with a real process.
pub struct RecordingCommandRunner {
    trace: Arc<dyn TraceWriter>,
    invocations: Mutex<Vec<CommandSpec>>,
    responses: Mutex<Vec<ScriptedResponse>>,
}

impl RecordingCommandRunner {
    pub fn new() -> Self {
        Self {
            trace: Arc::new(crate::trace::NullTraceWriter),
            invocations: Mutex::new(Vec::new()),
            responses: Mutex::new(Vec::new()),
        }
    }

    /// Script the result for commands whose display form starts with `prefix`.
    pub fn respond(&self, prefix: &str, exit_code: i32, stdout: &[&str]) {
        self.responses.lock().push(ScriptedResponse {
            prefix: prefix.to_string(),
            exit_code,
            stdout: stdout.iter().map(|s| s.to_string()).collect(),
        });
    }

    /// Shorthand for a failing command with no output.
    pub fn fail(&self, prefix: &str, exit_code: i32) {
        self.respond(prefix, exit_code, &[]);
    }

    pub fn invocations(&self) -> Vec<CommandSpec> {
        self.invocations.lock().clone()
    }

    /// Display forms of every recorded invocation, in order.
    pub fn command_lines(&self) -> Vec<String> {
        self.invocations
            .lock()
            .iter()
            .map(|spec| spec.to_string())
            .collect()
    }
}

impl Default for RecordingCommandRunner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CommandRunner for RecordingCommandRunner {
    async fn run(&self, spec: CommandSpec, cancel: CancellationToken) -> Result<CommandOutput> {
        if cancel.is_cancelled() {
            anyhow::bail!("Process was cancelled");
        }

        let line = spec.to_string();
        let response = self
            .responses
            .lock()
            .iter()
            .find(|r| line.starts_with(&r.prefix))
            .cloned();
        self.invocations.lock().push(spec.clone());

        let (exit_code, lines) = match response {
            Some(r) => (r.exit_code, r.stdout),
            None => (0, Vec::new()),
        };

        let mut stdout = LineSink::open(&spec.stdout, self.trace.clone(), spec.program.clone())?;
        for l in &lines {
            stdout.write_line(l);
        }
        let stderr = LineSink::open(&spec.stderr, self.trace.clone(), spec.program.clone())?;

        Ok(CommandOutput {
            exit_code,
            stdout: stdout.finish(),
            stderr: stderr.finish(),
            elapsed: Duration::ZERO,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_quotes_arguments_with_spaces() {
        let spec = CommandSpec::new("git")
            .arg("commit")
            .arg("-m")
            .arg("Daily update 2024-01-01");
        assert_eq!(spec.to_string(), "git commit -m \"Daily update 2024-01-01\"");
    }

    #[test]
    fn check_maps_non_zero_exit_to_error() {
        let spec = CommandSpec::new("git").arg("push");
        let output = CommandOutput {
            exit_code: 128,
            ..CommandOutput::default()
        };
        let err = output.check(&spec).unwrap_err();
        assert_eq!(err.exit_code, 128);
        assert!(err.to_string().contains("git push"));
    }

    #[tokio::test]
    async fn recording_runner_scripts_by_prefix() {
        let runner = RecordingCommandRunner::new();
        runner.respond("ssh-agent", 0, &["SSH_AUTH_SOCK=/tmp/a; export SSH_AUTH_SOCK;"]);
        runner.fail("git push", 1);

        let agent = runner
            .run(
                CommandSpec::new("ssh-agent").arg("-s").stdout(OutputTarget::Capture),
                CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(agent.stdout.len(), 1);

        let push = runner
            .run(CommandSpec::new("git").arg("push"), CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(push.exit_code, 1);

        let pull = runner
            .run(CommandSpec::new("git").arg("pull"), CancellationToken::new())
            .await
            .unwrap();
        assert!(pull.success());

        assert_eq!(
            runner.command_lines(),
            vec!["ssh-agent -s", "git push", "git pull"]
        );
    }

    #[tokio::test]
    async fn recording_runner_appends_scripted_stdout_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("out.log");
        let runner = RecordingCommandRunner::new();
        runner.respond("docker run", 0, &["first", "second"]);

        for _ in 0..2 {
            runner
                .run(
                    CommandSpec::new("docker")
                        .arg("run")
                        .stdout(OutputTarget::AppendFile(path.clone())),
                    CancellationToken::new(),
                )
                .await
                .unwrap();
        }

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "first\nsecond\nfirst\nsecond\n");
    }

    #[tokio::test]
    async fn recording_runner_honours_cancellation() {
        let runner = RecordingCommandRunner::new();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = runner.run(CommandSpec::new("git"), cancel).await;
        assert!(result.is_err());
        assert!(runner.invocations().is_empty());
    }
}
