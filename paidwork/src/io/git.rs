//! Git adapter for the pipeline.
//!
//! The working tree is the one shared mutable resource a run owns: checkouts
//! move its global position. [`Git`] is the handle passed through the pipeline
//! and [`CheckoutGuard`] scopes any excursion to another branch.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, instrument, warn};

use super::process::run_command_with_timeout;

/// Bytes of git output kept for error messages on network operations.
const NETWORK_OUTPUT_LIMIT_BYTES: usize = 64 * 1024;

/// Parsed `git status --porcelain` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusEntry {
    /// 2-letter XY code, or "??" for untracked.
    pub code: String,
    /// Path for the changed file.
    pub path: String,
}

/// Wrapper for executing git commands in a working directory.
#[derive(Debug, Clone)]
pub struct Git {
    workdir: PathBuf,
}

impl Git {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
        }
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    /// Clone `url` into `dest` and return a handle on the clone.
    ///
    /// The error message carries git's stderr, which may echo `url`; callers
    /// holding credentials in the URL must scrub it.
    #[instrument(skip_all, fields(dest = %dest.display()))]
    pub fn clone_into(url: &str, dest: &Path, timeout: Duration) -> Result<Self> {
        let mut cmd = Command::new("git");
        cmd.arg("clone").arg(url).arg(dest);
        let output = run_command_with_timeout(cmd, timeout, NETWORK_OUTPUT_LIMIT_BYTES)
            .context("spawn git clone")?;
        if !output.succeeded() {
            return Err(anyhow!("git clone failed: {}", output.failure_reason()));
        }
        debug!("clone complete");
        Ok(Self::new(dest))
    }

    /// Return the current branch name, or `None` on a detached HEAD.
    #[instrument(skip_all)]
    pub fn current_branch(&self) -> Result<Option<String>> {
        let out = self.run_capture(&["rev-parse", "--abbrev-ref", "HEAD"])?;
        let name = out.trim().to_string();
        if name.is_empty() || name == "HEAD" {
            warn!("detached HEAD detected");
            return Ok(None);
        }
        debug!(branch = %name, "current branch");
        Ok(Some(name))
    }

    /// Branch names under `refs/remotes/<remote>/`, without the remote prefix,
    /// in git's enumeration order. The symbolic `HEAD` entry is dropped.
    pub fn remote_branches(&self, remote: &str) -> Result<Vec<String>> {
        let prefix = format!("refs/remotes/{remote}/");
        let out = self.run_capture(&["for-each-ref", "--format=%(refname)", &prefix])?;
        let branches = out
            .lines()
            .filter_map(|line| line.trim().strip_prefix(&prefix))
            .filter(|name| !name.is_empty() && *name != "HEAD")
            .map(str::to_string)
            .collect();
        Ok(branches)
    }

    /// Update remote-tracking refs (pruning deleted branches).
    #[instrument(skip_all, fields(remote))]
    pub fn fetch(&self, remote: &str, timeout: Duration) -> Result<()> {
        self.run_network(&["fetch", "--prune", remote], timeout)
    }

    /// Push `branch` to `remote`.
    #[instrument(skip_all, fields(remote, branch))]
    pub fn push(&self, remote: &str, branch: &str, timeout: Duration) -> Result<()> {
        debug!(remote, branch, "pushing branch");
        self.run_network(&["push", remote, branch], timeout)
    }

    /// Get status entries (including untracked) in porcelain format.
    pub fn status_porcelain(&self) -> Result<Vec<StatusEntry>> {
        let out = self.run_capture(&["status", "--porcelain=v1", "-uall"])?;
        let mut entries = Vec::new();
        for line in out.lines() {
            if line.trim().is_empty() {
                continue;
            }
            entries.push(parse_status_line(line)?);
        }
        Ok(entries)
    }

    /// Ensure the worktree is fully clean (including untracked files).
    #[instrument(skip_all)]
    pub fn ensure_clean(&self) -> Result<()> {
        let entries = self.status_porcelain()?;
        if entries.is_empty() {
            debug!("worktree is clean");
            return Ok(());
        }
        warn!(changed = entries.len(), "worktree not clean");
        let mut msg = String::from("working tree not clean:\n");
        for entry in entries {
            msg.push_str(&format!("{} {}\n", entry.code, entry.path));
        }
        Err(anyhow!(msg.trim_end().to_string()))
    }

    /// Create and checkout a new branch at current HEAD.
    #[instrument(skip_all, fields(branch))]
    pub fn checkout_new_branch(&self, branch: &str) -> Result<()> {
        debug!(branch, "creating and checking out new branch");
        self.run_checked(&["checkout", "-b", branch])?;
        Ok(())
    }

    /// Checkout an existing branch (a local tracking branch is created from
    /// the remote when only the remote one exists).
    #[instrument(skip_all, fields(branch))]
    pub fn checkout_branch(&self, branch: &str) -> Result<()> {
        debug!(branch, "checking out branch");
        self.run_checked(&["checkout", branch])?;
        Ok(())
    }

    /// True if `refs/heads/<branch>` exists.
    pub fn has_local_branch(&self, branch: &str) -> Result<bool> {
        let output = self.run(&[
            "rev-parse",
            "--verify",
            "--quiet",
            &format!("refs/heads/{branch}"),
        ])?;
        Ok(output.status.success())
    }

    /// Checkout `branch`, creating a local branch tracking `<remote>/<branch>`
    /// when none exists yet.
    ///
    /// An existing local branch is fast-forwarded to `<remote>/<branch>`. If it
    /// has diverged, the local copy is used as is and a warning is logged;
    /// unpushed local commits are never discarded.
    pub fn checkout_remote_branch(&self, remote: &str, branch: &str) -> Result<()> {
        let upstream = format!("{remote}/{branch}");
        if self.has_local_branch(branch)? {
            self.checkout_branch(branch)?;
            let output = self.run(&["merge", "--ff-only", "--quiet", &upstream])?;
            if !output.status.success() {
                warn!(
                    branch,
                    upstream = %upstream,
                    stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                    "local branch not fast-forwarded"
                );
            }
            return Ok(());
        }
        debug!(remote, branch, "creating tracking branch");
        self.run_checked(&["checkout", "-b", branch, "--track", &upstream])?;
        Ok(())
    }

    /// Unstage everything, leaving the working tree untouched.
    pub fn reset_index(&self) -> Result<()> {
        self.run_checked(&["reset", "--quiet"])?;
        Ok(())
    }

    /// Set the commit identity for this repository only.
    pub fn set_identity(&self, name: &str, email: &str) -> Result<()> {
        self.run_checked(&["config", "user.name", name])?;
        self.run_checked(&["config", "user.email", email])?;
        Ok(())
    }

    /// Stage all changes (respects .gitignore).
    pub fn add_all(&self) -> Result<()> {
        self.run_checked(&["add", "-A"])?;
        Ok(())
    }

    /// True if there is anything staged for commit.
    pub fn has_staged_changes(&self) -> Result<bool> {
        let out = self.run(&["diff", "--cached", "--name-only"])?;
        Ok(!String::from_utf8_lossy(&out.stdout).trim().is_empty())
    }

    /// Commit staged changes with a message.
    ///
    /// If there are no staged changes, this returns Ok(false) and does nothing.
    #[instrument(skip_all)]
    pub fn commit_staged(&self, message: &str) -> Result<bool> {
        if !self.has_staged_changes()? {
            debug!("no staged changes, skipping commit");
            return Ok(false);
        }
        debug!("committing staged changes");
        self.run_checked(&["commit", "-m", message])?;
        Ok(true)
    }

    fn run_network(&self, args: &[&str], timeout: Duration) -> Result<()> {
        let mut cmd = Command::new("git");
        cmd.args(args).current_dir(&self.workdir);
        let output = run_command_with_timeout(cmd, timeout, NETWORK_OUTPUT_LIMIT_BYTES)
            .with_context(|| format!("spawn git {}", args.join(" ")))?;
        if !output.succeeded() {
            return Err(anyhow!(
                "git {} failed: {}",
                args.join(" "),
                output.failure_reason()
            ));
        }
        Ok(())
    }

    fn run_capture(&self, args: &[&str]) -> Result<String> {
        let output = self.run_checked(args)?;
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    fn run_checked(&self, args: &[&str]) -> Result<Output> {
        let output = self.run(args)?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("git {} failed: {}", args.join(" "), stderr.trim()));
        }
        Ok(output)
    }

    fn run(&self, args: &[&str]) -> Result<Output> {
        Command::new("git")
            .args(args)
            .current_dir(&self.workdir)
            .output()
            .with_context(|| format!("spawn git {}", args.join(" ")))
    }
}

/// Restores the branch that was checked out when the guard was created.
///
/// Restoration runs on drop, so it covers early returns and `?` exits. If the
/// original branch cannot be determined (detached or unreadable HEAD) nothing
/// is restored; that is logged, not raised.
#[derive(Debug)]
pub struct CheckoutGuard<'a> {
    git: &'a Git,
    original: Option<String>,
}

impl<'a> CheckoutGuard<'a> {
    pub fn new(git: &'a Git) -> Self {
        let original = match git.current_branch() {
            Ok(branch) => branch,
            Err(err) => {
                warn!(err = %format!("{err:#}"), "cannot determine current branch");
                None
            }
        };
        if original.is_none() {
            warn!("no original branch recorded; it will not be restored");
        }
        Self { git, original }
    }

    pub fn original(&self) -> Option<&str> {
        self.original.as_deref()
    }
}

impl Drop for CheckoutGuard<'_> {
    fn drop(&mut self) {
        let Some(branch) = self.original.as_deref() else {
            return;
        };
        match self.git.current_branch() {
            Ok(Some(current)) if current == branch => return,
            _ => {}
        }
        if let Err(err) = self.git.checkout_branch(branch) {
            warn!(branch, err = %format!("{err:#}"), "failed to restore original branch");
        } else {
            debug!(branch, "restored original branch");
        }
    }
}

fn parse_status_line(line: &str) -> Result<StatusEntry> {
    if let Some(path) = line.strip_prefix("?? ") {
        return Ok(StatusEntry {
            code: "??".to_string(),
            path: path.trim().to_string(),
        });
    }
    if line.len() < 4 {
        return Err(anyhow!("unexpected porcelain line: '{line}'"));
    }
    let code = line[..2].to_string();
    let mut path = line[3..].trim().to_string();
    if let Some((_, new)) = path.split_once("->") {
        path = new.trim().to_string();
    }
    Ok(StatusEntry { code, path })
}
