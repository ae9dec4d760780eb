//! Shared deterministic types for pipeline logic.
//!
//! These types define stable contracts between the scanner, runner and
//! publisher. They hold no I/O handles.

use std::fmt;

use serde::Serialize;

use super::work_item::WorkItem;

/// Stage of [`crate::execute::execute`] at which a failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStage {
    Checkout,
    Prepare,
    Agent,
    Persist,
    Commit,
    Push,
}

impl ExecutionStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Checkout => "checkout",
            Self::Prepare => "prepare",
            Self::Agent => "agent",
            Self::Persist => "persist",
            Self::Commit => "commit",
            Self::Push => "push",
        }
    }
}

impl fmt::Display for ExecutionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stage of [`crate::publish::publish`] at which a hard failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PublishStage {
    Checkout,
    Clone,
    Branch,
    Copy,
    Stage,
    Commit,
    Push,
}

impl PublishStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Checkout => "checkout",
            Self::Clone => "clone",
            Self::Branch => "branch",
            Self::Copy => "copy",
            Self::Stage => "stage",
            Self::Commit => "commit",
            Self::Push => "push",
        }
    }
}

impl fmt::Display for PublishStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything the implementation agent is told about the work item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgentContext {
    pub public_repo: String,
    pub public_issue: u64,
    pub private_repo: Option<String>,
    pub private_issue: u64,
    pub invoice_id: String,
    pub branch: String,
}

impl AgentContext {
    /// Build the context for `item`; `fallback_private_repo` fills in a
    /// marker that does not name its private repository.
    pub fn from_item(item: &WorkItem, fallback_private_repo: Option<&str>) -> Self {
        let record = item.record();
        Self {
            public_repo: record.public_repo.clone(),
            public_issue: record.public_issue,
            private_repo: record
                .private_repo
                .clone()
                .or_else(|| fallback_private_repo.map(str::to_string)),
            private_issue: record.private_issue,
            invoice_id: record.invoice_id.clone(),
            branch: item.branch().to_string(),
        }
    }

    /// Environment variables handed to the agent process.
    pub fn env_vars(&self) -> Vec<(&'static str, String)> {
        vec![
            ("PUBLIC_ISSUE", self.public_issue.to_string()),
            ("PRIVATE_ISSUE", self.private_issue.to_string()),
            ("INVOICE_ID", self.invoice_id.clone()),
            ("PUBLIC_REPO", self.public_repo.clone()),
            ("PRIVATE_REPO", self.private_repo.clone().unwrap_or_default()),
            ("EXECUTION_BRANCH", self.branch.clone()),
        ]
    }

    /// Command-line arguments appended to the configured agent command.
    pub fn args(&self) -> Vec<String> {
        vec![
            "--issue".to_string(),
            self.private_issue.to_string(),
            "--public-issue".to_string(),
            self.public_issue.to_string(),
            "--public-repo".to_string(),
            self.public_repo.clone(),
            "--invoice-id".to_string(),
            self.invoice_id.clone(),
        ]
    }
}

/// A pull request opened on the public repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PullRequestRef {
    pub number: u64,
    pub url: String,
}

/// Successful publish results. Hard failures are `PublishError`s instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    /// Filtered artifacts were pushed and a draft pull request opened.
    Published {
        branch: String,
        pull_request: PullRequestRef,
    },
    /// Artifacts were pushed but the pull request could not be created.
    PushedWithoutPullRequest { branch: String, warning: String },
    /// The public repository already matches the filtered artifacts.
    NoChanges,
}
