// SSH agent step: reuse or start an agent, then register the deploy key.

use anyhow::{Context, Result};
use async_trait::async_trait;
use daily_common::constants::{tools, variables};
use daily_sdk::{CommandSpec, OutputTarget};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::execution_context::ExecutionContext;
use crate::steps_runner::Step;

/// Matches `SSH_AUTH_SOCK=/tmp/ssh-XXXX/agent.123; export SSH_AUTH_SOCK;`
/// as printed by `ssh-agent -s`.
static AGENT_VARIABLE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"\b({}|{})=([^;\s]+)",
        variables::SSH_AUTH_SOCK,
        variables::SSH_AGENT_PID
    ))
    .expect("Invalid agent variable regex")
});

/// Extract the agent variables from `ssh-agent -s` output.
pub fn parse_agent_output(lines: &[String]) -> HashMap<String, String> {
    let mut found = HashMap::new();
    for line in lines {
        for captures in AGENT_VARIABLE_REGEX.captures_iter(line) {
            found.insert(captures[1].to_string(), captures[2].to_string());
        }
    }
    found
}

#[cfg(unix)]
fn is_socket(path: &Path) -> bool {
    use std::os::unix::fs::FileTypeExt;
    std::fs::metadata(path)
        .map(|meta| meta.file_type().is_socket())
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_socket(path: &Path) -> bool {
    path.exists()
}

/// Stop the agent this run started, if any.
///
/// Only a started agent has its `SSH_AGENT_PID` exported; a reused agent
/// belongs to the caller and is left running.
pub async fn stop_started_agent(context: &ExecutionContext) -> Result<()> {
    let environment = context.host_context().process_environment();
    let Some(pid) = environment.get(variables::SSH_AGENT_PID) else {
        return Ok(());
    };
    context
        .run_checked(
            CommandSpec::new(tools::SSH_AGENT)
                .arg("-k")
                .env(variables::SSH_AGENT_PID, pid.as_str()),
        )
        .await
        .with_context(|| format!("Failed to stop ssh-agent {pid}"))?;
    Ok(())
}

pub struct SshAgentStep {
    /// `SSH_AUTH_SOCK` inherited by this process, if any.
    inherited_socket: Option<PathBuf>,
}

impl SshAgentStep {
    pub fn new() -> Self {
        Self::with_inherited_socket(std::env::var_os(variables::SSH_AUTH_SOCK).map(PathBuf::from))
    }

    pub fn with_inherited_socket(inherited_socket: Option<PathBuf>) -> Self {
        Self { inherited_socket }
    }

    async fn start_agent(&self, context: &ExecutionContext) -> Result<()> {
        let output = context
            .run_checked(
                CommandSpec::new(tools::SSH_AGENT)
                    .arg("-s")
                    .stdout(OutputTarget::Capture),
            )
            .await
            .context("Failed to start ssh-agent")?;

        let agent_variables = parse_agent_output(&output.stdout);
        if !agent_variables.contains_key(variables::SSH_AUTH_SOCK) {
            anyhow::bail!("ssh-agent did not report {}", variables::SSH_AUTH_SOCK);
        }
        for (key, value) in agent_variables {
            context.debug(&format!("{key}={value}"));
            context.host_context().set_process_env(key, value);
        }
        Ok(())
    }
}

impl Default for SshAgentStep {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Step for SshAgentStep {
    fn name(&self) -> &str {
        "ssh"
    }

    async fn run(&self, context: &ExecutionContext) -> Result<()> {
        match self.inherited_socket.as_deref() {
            Some(socket) if is_socket(socket) => {
                context.info(&format!("Reusing ssh-agent at {}", socket.display()));
            }
            _ => self.start_agent(context).await?,
        }

        let key = context.host_context().ssh_key_path();
        context
            .run_checked(CommandSpec::new(tools::SSH_ADD).arg(key.to_string_lossy()))
            .await
            .with_context(|| format!("Failed to add key '{}'", key.display()))?;
        Ok(())
    }
}
