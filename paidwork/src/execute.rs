//! Execution runner: drive the implementation agent for one work item.
//!
//! Stages run in order (checkout, prepare, agent, persist, commit, push) and
//! the first failure ends the run. The status transition only becomes durable
//! with the commit: if committing fails, the marker file is put back as it was.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, anyhow};
use chrono::Utc;
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::core::types::{AgentContext, ExecutionStage};
use crate::core::work_item::{WorkItem, WorkStatus};
use crate::io::agent::{AgentRequest, ImplementationAgent};
use crate::io::config::{PipelineConfig, state_dir};
use crate::io::git::Git;
use crate::io::store::MarkerStore;
use crate::io::templates::MessageTemplates;

/// Directories ensured before the agent runs.
pub const ARTIFACT_DIRS: [&str; 5] = ["specs", "tests", "src", "reviews", "logs"];

/// Agent log location relative to the repository root, committed with the artifacts.
pub const AGENT_LOG: &str = "logs/agent.log";

/// Where the agent's output is captured during a run. Outside the working tree,
/// so a failed run leaves the log for inspection without dirtying the tree.
pub fn agent_run_log(repo_root: &Path) -> PathBuf {
    state_dir(repo_root).join("agent.log")
}

#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("work item on {branch} is not ready for execution (status {status})")]
    NotReady { branch: String, status: WorkStatus },
    #[error("agent failed: {cause:#}")]
    AgentFailed { cause: anyhow::Error },
    #[error("{stage} stage failed: {cause:#}")]
    Stage {
        stage: ExecutionStage,
        cause: anyhow::Error,
    },
}

impl ExecutionError {
    /// Stage the run stopped at, if it got past the readiness check.
    pub fn stage(&self) -> Option<ExecutionStage> {
        match self {
            Self::NotReady { .. } => None,
            Self::AgentFailed { .. } => Some(ExecutionStage::Agent),
            Self::Stage { stage, .. } => Some(*stage),
        }
    }

    fn stage_failed(stage: ExecutionStage) -> impl FnOnce(anyhow::Error) -> Self {
        move |cause| Self::Stage { stage, cause }
    }
}

/// Settings the runner needs from the pipeline config.
#[derive(Debug, Clone)]
pub struct ExecuteOptions {
    pub remote: String,
    pub private_repo: Option<String>,
    pub agent_timeout: Duration,
    pub agent_output_limit_bytes: usize,
    pub network_timeout: Duration,
}

impl ExecuteOptions {
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            remote: config.remote.clone(),
            private_repo: config.private_repo.clone(),
            agent_timeout: config.agent_timeout(),
            agent_output_limit_bytes: config.agent.output_limit_bytes,
            network_timeout: config.network_timeout(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionReport {
    /// The item as persisted: status `executed` with its timestamp.
    pub item: WorkItem,
}

/// Run one ready work item end to end on its private branch.
///
/// Leaves the item's branch checked out; callers scope that with a
/// [`crate::io::git::CheckoutGuard`].
#[instrument(skip_all, fields(branch = item.branch(), public_issue = item.public_issue()))]
pub fn execute(
    git: &Git,
    item: &WorkItem,
    agent: &dyn ImplementationAgent,
    templates: &MessageTemplates,
    options: &ExecuteOptions,
) -> Result<ExecutionReport, ExecutionError> {
    if !item.is_ready() {
        return Err(not_ready(item));
    }
    let branch = item.branch();
    let root = git.workdir();
    let store = MarkerStore::new(root);

    git.ensure_clean()
        .and_then(|()| git.checkout_remote_branch(&options.remote, branch))
        .map_err(ExecutionError::stage_failed(ExecutionStage::Checkout))?;
    // The branch may have moved since it was scanned.
    let mut current = store
        .load(branch)
        .context("reload marker")
        .map_err(ExecutionError::stage_failed(ExecutionStage::Checkout))?;
    if !current.is_ready() {
        return Err(not_ready(&current));
    }
    info!("checked out work item");

    for dir in ARTIFACT_DIRS {
        let path = root.join(dir);
        fs::create_dir_all(&path)
            .with_context(|| format!("create {}", path.display()))
            .map_err(ExecutionError::stage_failed(ExecutionStage::Prepare))?;
    }

    let run_log = agent_run_log(root);
    remove_stale_log(&run_log).map_err(ExecutionError::stage_failed(ExecutionStage::Prepare))?;

    let context = AgentContext::from_item(&current, options.private_repo.as_deref());
    let request = AgentRequest {
        workdir: root.to_path_buf(),
        context: context.clone(),
        log_path: run_log.clone(),
        timeout: options.agent_timeout,
        output_limit_bytes: options.agent_output_limit_bytes,
    };
    if let Err(cause) = agent.run(&request) {
        if run_log.exists() {
            warn!(log = %run_log.display(), "agent log kept");
        }
        return Err(ExecutionError::AgentFailed { cause });
    }
    info!("agent finished");
    if run_log.exists() {
        let dest = root.join(AGENT_LOG);
        fs::copy(&run_log, &dest)
            .with_context(|| format!("copy agent log to {}", dest.display()))
            .map_err(ExecutionError::stage_failed(ExecutionStage::Persist))?;
    }

    let previous = store
        .read_raw()
        .context("snapshot marker")
        .map_err(ExecutionError::stage_failed(ExecutionStage::Persist))?
        .ok_or_else(|| anyhow!("marker disappeared during agent run"))
        .map_err(ExecutionError::stage_failed(ExecutionStage::Persist))?;
    current
        .mark_executed(Utc::now())
        .map_err(anyhow::Error::from)
        .map_err(ExecutionError::stage_failed(ExecutionStage::Persist))?;
    store
        .save(&current)
        .context("save marker")
        .map_err(ExecutionError::stage_failed(ExecutionStage::Persist))?;

    if let Err(cause) = commit_all(git, templates, &context) {
        restore_marker(git, &store, &previous);
        return Err(ExecutionError::Stage {
            stage: ExecutionStage::Commit,
            cause,
        });
    }

    git.push(&options.remote, branch, options.network_timeout)
        .map_err(ExecutionError::stage_failed(ExecutionStage::Push))?;
    info!(executed_at = ?current.record().executed_at, "work item executed");

    Ok(ExecutionReport { item: current })
}

fn commit_all(git: &Git, templates: &MessageTemplates, context: &AgentContext) -> anyhow::Result<()> {
    let message = templates
        .execution_commit(context)
        .context("render commit message")?;
    git.add_all()?;
    if !git.commit_staged(&message)? {
        return Err(anyhow!("nothing staged after marker update"));
    }
    Ok(())
}

fn restore_marker(git: &Git, store: &MarkerStore, previous: &str) {
    if let Err(err) = git.reset_index() {
        warn!(err = %format!("{err:#}"), "failed to unstage changes after commit failure");
    }
    if let Err(err) = store.write_raw(previous) {
        warn!(err = %err, "failed to restore marker after commit failure");
    }
}

fn remove_stale_log(path: &Path) -> anyhow::Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err).with_context(|| format!("remove stale {}", path.display())),
    }
}

fn not_ready(item: &WorkItem) -> ExecutionError {
    ExecutionError::NotReady {
        branch: item.branch().to_string(),
        status: item.status(),
    }
}
