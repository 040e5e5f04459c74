use crate::command::{CommandOutput, CommandRunner, CommandSpec, LineSink};
use crate::trace::TraceWriter;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

/// The duration to wait after sending SIGINT before escalating to SIGTERM.
const SIGINT_TIMEOUT: Duration = Duration::from_millis(7500);
/// The duration to wait after sending SIGTERM before escalating to SIGKILL.
const SIGTERM_TIMEOUT: Duration = Duration::from_millis(2500);

/// Spawns a child process, reads stdout/stderr on separate tasks, routes each
/// line to the stream's `OutputTarget`, and supports graceful cancellation
/// (SIGINT → SIGTERM → SIGKILL).
pub struct ProcessInvoker {
    trace: Arc<dyn TraceWriter>,
}

impl ProcessInvoker {
    /// Create a new `ProcessInvoker` with the given trace writer.
    pub fn new(trace: Arc<dyn TraceWriter>) -> Self {
        Self { trace }
    }

    /// Execute `spec` and wait for it to exit or for `cancellation_token`.
    pub async fn execute(
        &self,
        spec: &CommandSpec,
        cancellation_token: CancellationToken,
    ) -> Result<CommandOutput> {
        if spec.program.is_empty() {
            anyhow::bail!("program must not be empty");
        }

        self.trace.info(&format!("Starting process: {spec}"));
        if let Some(ref dir) = spec.working_directory {
            self.trace
                .verbose(&format!("  Working directory: '{}'", dir.display()));
        }

        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args);
        if let Some(ref dir) = spec.working_directory {
            cmd.current_dir(dir);
        }
        for (key, value) in &spec.environment {
            cmd.env(key, value);
        }
        cmd.stdout(std::process::Stdio::piped());
        cmd.stderr(std::process::Stdio::piped());
        cmd.stdin(std::process::Stdio::null());
        cmd.kill_on_drop(true);

        // Open sinks before spawning so a bad log path fails fast.
        let stdout_sink = LineSink::open(&spec.stdout, self.trace.clone(), spec.program.clone())?;
        let stderr_sink = LineSink::open(&spec.stderr, self.trace.clone(), spec.program.clone())?;

        let start = std::time::Instant::now();
        let mut child = cmd
            .spawn()
            .with_context(|| format!("Failed to start process '{spec}'"))?;

        let pid = child.id().unwrap_or(0);
        self.trace
            .verbose(&format!("Process started with process id {pid}, waiting for process exit."));

        let stdout_task = tokio::spawn(pump_lines(child.stdout.take(), stdout_sink));
        let stderr_task = tokio::spawn(pump_lines(child.stderr.take(), stderr_sink));

        let exit_code: i32;
        let was_cancelled;

        tokio::select! {
            status = child.wait() => {
                was_cancelled = false;
                let status = status.context("Failed to wait for process")?;
                exit_code = status.code().unwrap_or(-1);
            }
            _ = cancellation_token.cancelled() => {
                was_cancelled = true;
                self.trace.info("Cancellation requested.");
                exit_code = self.cancel_and_kill_process(&mut child).await;
            }
        }

        let stdout = stdout_task.await.unwrap_or_default();
        let stderr = stderr_task.await.unwrap_or_default();

        let elapsed = start.elapsed();
        self.trace.info(&format!(
            "Finished process {pid} with exit code {exit_code}, and elapsed time {elapsed:.2?}."
        ));

        if was_cancelled {
            anyhow::bail!("Process was cancelled: {spec}");
        }

        Ok(CommandOutput {
            exit_code,
            stdout,
            stderr,
            elapsed,
        })
    }

    async fn cancel_and_kill_process(&self, child: &mut tokio::process::Child) -> i32 {
        if self.send_signal_and_wait(child, Signal::Int, SIGINT_TIMEOUT).await {
            self.trace.info("Process cancelled successfully through SIGINT.");
            return exit_code_of(child).await;
        }

        if self.send_signal_and_wait(child, Signal::Term, SIGTERM_TIMEOUT).await {
            self.trace.info("Process terminated successfully through SIGTERM.");
            return exit_code_of(child).await;
        }

        self.trace
            .info("Killing process since both cancel and terminate signals have been ignored.");
        let _ = child.kill().await;
        exit_code_of(child).await
    }

    /// Send a signal to the child process and wait up to `timeout` for it to exit.
    /// Returns `true` if the process exited within the timeout.
    #[cfg(unix)]
    async fn send_signal_and_wait(
        &self,
        child: &mut tokio::process::Child,
        signal: Signal,
        timeout: Duration,
    ) -> bool {
        let pid = match child.id() {
            Some(id) => id,
            None => return true,
        };

        let sig = match signal {
            Signal::Int => nix::sys::signal::Signal::SIGINT,
            Signal::Term => nix::sys::signal::Signal::SIGTERM,
        };

        self.trace.info(&format!("Sending {sig:?} to process {pid}."));

        if nix::sys::signal::kill(nix::unistd::Pid::from_raw(pid as i32), sig).is_err() {
            self.trace
                .info(&format!("{sig:?} signal failed to send to process {pid}."));
            return false;
        }

        tokio::select! {
            result = child.wait() => result.is_ok(),
            _ = tokio::time::sleep(timeout) => {
                self.trace.info(&format!(
                    "Process did not honor {sig:?} within {:.1}s.",
                    timeout.as_secs_f64()
                ));
                false
            }
        }
    }

    #[cfg(not(unix))]
    async fn send_signal_and_wait(
        &self,
        child: &mut tokio::process::Child,
        _signal: Signal,
        timeout: Duration,
    ) -> bool {
        tokio::select! {
            result = child.wait() => result.is_ok(),
            _ = tokio::time::sleep(timeout) => false,
        }
    }
}

#[async_trait]
impl CommandRunner for ProcessInvoker {
    async fn run(&self, spec: CommandSpec, cancel: CancellationToken) -> Result<CommandOutput> {
        self.execute(&spec, cancel).await
    }
}

#[derive(Debug, Clone, Copy)]
enum Signal {
    Int,
    Term,
}

async fn exit_code_of(child: &mut tokio::process::Child) -> i32 {
    child
        .wait()
        .await
        .map(|s| s.code().unwrap_or(-1))
        .unwrap_or(-1)
}

async fn pump_lines<R>(stream: Option<R>, mut sink: LineSink) -> Vec<String>
where
    R: AsyncRead + Unpin,
{
    if let Some(stream) = stream {
        let mut lines = BufReader::new(stream).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            sink.write_line(&line);
        }
    }
    sink.finish()
}
