//! Implementation-agent abstraction.
//!
//! The [`ImplementationAgent`] trait decouples the execution runner from the
//! agent backend (a configured command). What the agent writes is opaque to the
//! pipeline; only success or failure matters. Tests use scripted agents that
//! write predetermined files without spawning processes.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, info, instrument, warn};

use crate::core::types::AgentContext;
use crate::io::process::{CommandOutput, run_command_with_timeout};

/// Parameters for one agent invocation.
#[derive(Debug, Clone)]
pub struct AgentRequest {
    /// Private repository working tree, checked out on the item's branch.
    pub workdir: PathBuf,
    pub context: AgentContext,
    /// Where the agent's captured stdout/stderr is written.
    pub log_path: PathBuf,
    pub timeout: Duration,
    pub output_limit_bytes: usize,
}

/// Something that produces artifacts for a work item.
pub trait ImplementationAgent {
    /// Run the agent to completion. Any error means the item was not implemented.
    fn run(&self, request: &AgentRequest) -> Result<()>;
}

/// Agent that spawns a configured command (`program arg...`) in the working tree.
#[derive(Debug, Clone)]
pub struct CommandAgent {
    command: Vec<String>,
}

impl CommandAgent {
    pub fn new(command: Vec<String>) -> Self {
        Self { command }
    }
}

impl ImplementationAgent for CommandAgent {
    #[instrument(skip_all, fields(public_issue = request.context.public_issue, timeout_secs = request.timeout.as_secs()))]
    fn run(&self, request: &AgentRequest) -> Result<()> {
        let (program, base_args) = self
            .command
            .split_first()
            .ok_or_else(|| anyhow!("agent command is empty"))?;
        info!(program = %program, workdir = %request.workdir.display(), "starting agent");

        let mut cmd = Command::new(program);
        cmd.args(base_args)
            .args(request.context.args())
            .envs(request.context.env_vars())
            .current_dir(&request.workdir);

        let output = run_command_with_timeout(cmd, request.timeout, request.output_limit_bytes)
            .with_context(|| format!("run agent {program}"))?;
        write_agent_log(&request.log_path, &output)?;

        if !output.succeeded() {
            warn!(exit_code = ?output.status.code(), timed_out = output.timed_out, "agent failed");
            return Err(anyhow!("agent {program} failed: {}", output.failure_reason()));
        }
        debug!("agent completed successfully");
        Ok(())
    }
}

fn write_agent_log(path: &Path, output: &CommandOutput) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create log dir {}", parent.display()))?;
    }
    fs::write(path, output.render_log("agent"))
        .with_context(|| format!("write agent log {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ready_item;

    fn request(workdir: &Path) -> AgentRequest {
        AgentRequest {
            workdir: workdir.to_path_buf(),
            context: AgentContext::from_item(&ready_item("paid/42", 7), Some("acme/private")),
            log_path: workdir.join("logs").join("agent.log"),
            timeout: Duration::from_secs(10),
            output_limit_bytes: 4096,
        }
    }

    fn sh(script: &str) -> CommandAgent {
        CommandAgent::new(vec!["sh".into(), "-c".into(), script.into(), "agent".into()])
    }

    #[test]
    fn passes_context_as_env_and_args() {
        let temp = tempfile::tempdir().expect("tempdir");
        let agent = sh(r#"printf '%s|%s|%s' "$PUBLIC_ISSUE" "$PRIVATE_REPO" "$*" > seen.txt"#);
        agent.run(&request(temp.path())).expect("run");

        let seen = fs::read_to_string(temp.path().join("seen.txt")).expect("read");
        assert_eq!(
            seen,
            "7|acme/private|--issue 3 --public-issue 7 --public-repo acme/widgets --invoice-id inv_7"
        );
        assert!(temp.path().join("logs/agent.log").exists());
    }

    #[test]
    fn nonzero_exit_is_failure_and_still_logged() {
        let temp = tempfile::tempdir().expect("tempdir");
        let err = sh("echo boom >&2; exit 2")
            .run(&request(temp.path()))
            .unwrap_err();
        assert!(err.to_string().contains("exit code 2: boom"), "{err}");

        let log = fs::read_to_string(temp.path().join("logs/agent.log")).expect("log");
        assert!(log.contains("boom"));
    }

    #[test]
    fn empty_command_is_rejected() {
        let temp = tempfile::tempdir().expect("tempdir");
        let err = CommandAgent::new(Vec::new())
            .run(&request(temp.path()))
            .unwrap_err();
        assert!(err.to_string().contains("empty"));
    }
}
