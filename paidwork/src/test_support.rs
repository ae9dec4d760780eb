//! Test-only helpers: work-item builders, throwaway git repositories with bare
//! remotes, and deterministic agent/code-host fakes.

use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result, anyhow};
use tempfile::TempDir;

use crate::core::feature::IssueDetails;
use crate::core::types::{AgentContext, PullRequestRef};
use crate::core::work_item::{MARKER_FILE, MarkerRecord, WorkItem, WorkStatus};
use crate::io::agent::{AgentRequest, ImplementationAgent};
use crate::io::git::Git;
use crate::io::github::{CodeHost, PullRequestRequest};

/// Marker record for `acme/widgets#<public_issue>`, private issue 3.
pub fn record(public_issue: u64) -> MarkerRecord {
    MarkerRecord {
        public_repo: "acme/widgets".to_string(),
        public_issue,
        private_issue: 3,
        invoice_id: format!("inv_{public_issue}"),
        private_repo: None,
        status: WorkStatus::ReadyForExecution,
        executed_at: None,
    }
}

/// Ready work item on `branch`.
pub fn ready_item(branch: &str, public_issue: u64) -> WorkItem {
    WorkItem::new(branch, record(public_issue)).expect("valid work branch")
}

/// Executed work item on `branch`, stamped at a fixed time.
pub fn executed_item(branch: &str, public_issue: u64) -> WorkItem {
    let mut item = ready_item(branch, public_issue);
    let at = chrono::DateTime::parse_from_rfc3339("2026-01-02T03:04:05Z")
        .expect("timestamp")
        .with_timezone(&chrono::Utc);
    item.mark_executed(at).expect("transition");
    item
}

/// Pretty marker JSON as the payment step writes it.
pub fn marker_json(record: &MarkerRecord) -> String {
    let mut buf = serde_json::to_string_pretty(record).expect("serialize marker");
    buf.push('\n');
    buf
}

/// Run git in `dir`, returning trimmed stdout.
pub fn git_in(dir: &Path, args: &[&str]) -> Result<String> {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .with_context(|| format!("spawn git {}", args.join(" ")))?;
    if !output.status.success() {
        return Err(anyhow!(
            "git {} failed: {}",
            args.join(" "),
            String::from_utf8_lossy(&output.stderr).trim()
        ));
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

fn configure_identity(dir: &Path) -> Result<()> {
    git_in(dir, &["config", "user.name", "Test"])?;
    git_in(dir, &["config", "user.email", "test@example.com"])?;
    git_in(dir, &["config", "commit.gpgsign", "false"])?;
    Ok(())
}

/// A bare repository with a `main` branch holding one README commit.
#[derive(Debug)]
pub struct BareRemote {
    path: PathBuf,
}

impl BareRemote {
    pub fn create(path: &Path) -> Result<Self> {
        fs::create_dir_all(path).with_context(|| format!("create {}", path.display()))?;
        git_in(path, &["init", "--bare", "--quiet"])?;
        git_in(path, &["symbolic-ref", "HEAD", "refs/heads/main"])?;

        let seed = TempDir::new().context("seed tempdir")?;
        git_in(seed.path(), &["init", "--quiet"])?;
        configure_identity(seed.path())?;
        git_in(seed.path(), &["checkout", "-q", "-b", "main"])?;
        fs::write(seed.path().join("README.md"), "# repo\n").context("write README")?;
        git_in(seed.path(), &["add", "-A"])?;
        git_in(seed.path(), &["commit", "-q", "-m", "init"])?;
        let remote = path.to_string_lossy().to_string();
        git_in(seed.path(), &["push", "-q", &remote, "main"])?;
        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Contents of `file` on `branch`, or `None` if either is missing.
    pub fn file(&self, branch: &str, file: &str) -> Option<String> {
        git_in(&self.path, &["show", &format!("{branch}:{file}")]).ok()
    }

    /// Branch names, sorted.
    pub fn branches(&self) -> Result<Vec<String>> {
        let out = git_in(
            &self.path,
            &["for-each-ref", "--format=%(refname:short)", "refs/heads/"],
        )?;
        let mut names: Vec<String> = out.lines().map(str::to_string).collect();
        names.sort();
        Ok(names)
    }

    /// Paths tracked on `branch`, sorted.
    pub fn tree(&self, branch: &str) -> Result<Vec<String>> {
        let out = git_in(&self.path, &["ls-tree", "-r", "--name-only", branch])?;
        let mut paths: Vec<String> = out.lines().map(str::to_string).collect();
        paths.sort();
        Ok(paths)
    }

    /// Number of commits reachable from `branch`.
    pub fn commit_count(&self, branch: &str) -> Result<usize> {
        let out = git_in(&self.path, &["rev-list", "--count", branch])?;
        out.parse::<usize>().context("parse commit count")
    }
}

/// Private working clone on `main` with a bare `origin`, both in one tempdir.
#[derive(Debug)]
pub struct TestRepo {
    _temp: TempDir,
    work: PathBuf,
    origin: BareRemote,
}

impl TestRepo {
    pub fn new() -> Result<Self> {
        let temp = TempDir::new().context("tempdir")?;
        let origin = BareRemote::create(&temp.path().join("origin.git"))?;
        let work = temp.path().join("work");
        let origin_url = origin.path().to_string_lossy().to_string();
        let work_arg = work.to_string_lossy().to_string();
        git_in(temp.path(), &["clone", "-q", &origin_url, &work_arg])?;
        configure_identity(&work)?;
        Ok(Self {
            _temp: temp,
            work,
            origin,
        })
    }

    pub fn path(&self) -> &Path {
        &self.work
    }

    pub fn git(&self) -> Git {
        Git::new(&self.work)
    }

    pub fn origin(&self) -> &BareRemote {
        &self.origin
    }

    /// Push a branch off `main` carrying `files`, leaving no local copy behind.
    pub fn push_branch_with_files(&self, branch: &str, files: &[(&str, &str)]) -> Result<()> {
        let original = git_in(&self.work, &["rev-parse", "--abbrev-ref", "HEAD"])?;
        git_in(&self.work, &["checkout", "-q", "-b", branch, "origin/main"])?;
        for (path, contents) in files {
            let full = self.work.join(path);
            if let Some(parent) = full.parent() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("create {}", parent.display()))?;
            }
            fs::write(&full, contents).with_context(|| format!("write {}", full.display()))?;
        }
        git_in(&self.work, &["add", "-A"])?;
        git_in(&self.work, &["commit", "-q", "-m", &format!("seed {branch}")])?;
        git_in(&self.work, &["push", "-q", "origin", branch])?;
        git_in(&self.work, &["checkout", "-q", &original])?;
        git_in(&self.work, &["branch", "-q", "-D", branch])?;
        Ok(())
    }

    pub fn push_branch_with_file(&self, branch: &str, path: &str, contents: &str) -> Result<()> {
        self.push_branch_with_files(branch, &[(path, contents)])
    }

    /// Push a `paid/*` branch whose marker holds `record`, plus extra files.
    pub fn push_work_item(
        &self,
        branch: &str,
        record: &MarkerRecord,
        files: &[(&str, &str)],
    ) -> Result<()> {
        let marker = marker_json(record);
        let mut all = vec![(MARKER_FILE, marker.as_str())];
        all.extend_from_slice(files);
        self.push_branch_with_files(branch, &all)
    }

    /// Commit `contents` to `path` on the remote `branch` from a separate clone,
    /// leaving this working clone untouched.
    pub fn push_remote_update(&self, branch: &str, path: &str, contents: &str) -> Result<()> {
        let other = TempDir::new().context("tempdir")?;
        let dest = other.path().join("other");
        let origin_url = self.origin.path().to_string_lossy().to_string();
        let dest_arg = dest.to_string_lossy().to_string();
        git_in(
            other.path(),
            &["clone", "-q", "--branch", branch, &origin_url, &dest_arg],
        )?;
        configure_identity(&dest)?;
        let full = dest.join(path);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
        }
        fs::write(&full, contents).with_context(|| format!("write {}", full.display()))?;
        git_in(&dest, &["add", "-A"])?;
        git_in(&dest, &["commit", "-q", "-m", &format!("update {path}")])?;
        git_in(&dest, &["push", "-q", "origin", branch])?;
        Ok(())
    }

    pub fn current_branch(&self) -> Result<String> {
        git_in(&self.work, &["rev-parse", "--abbrev-ref", "HEAD"])
    }
}

/// Agent that writes fixed files (or fails) and records each context it saw.
#[derive(Debug, Default)]
pub struct ScriptedAgent {
    files: Vec<(String, String)>,
    failure: Option<String>,
    calls: RefCell<Vec<AgentContext>>,
}

impl ScriptedAgent {
    pub fn writing(files: &[(&str, &str)]) -> Self {
        Self {
            files: files
                .iter()
                .map(|(path, contents)| (path.to_string(), contents.to_string()))
                .collect(),
            ..Self::default()
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            failure: Some(message.to_string()),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<AgentContext> {
        self.calls.borrow().clone()
    }
}

impl ImplementationAgent for ScriptedAgent {
    fn run(&self, request: &AgentRequest) -> Result<()> {
        self.calls.borrow_mut().push(request.context.clone());
        if let Some(message) = &self.failure {
            return Err(anyhow!("{message}"));
        }
        for (path, contents) in &self.files {
            let full = request.workdir.join(path);
            if let Some(parent) = full.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&full, contents)?;
        }
        Ok(())
    }
}

/// Code host that accepts every pull request and records it.
#[derive(Debug, Default)]
pub struct RecordingHost {
    requests: RefCell<Vec<PullRequestRequest>>,
}

impl RecordingHost {
    pub fn requests(&self) -> Vec<PullRequestRequest> {
        self.requests.borrow().clone()
    }
}

impl CodeHost for RecordingHost {
    fn create_draft_pull_request(&self, request: &PullRequestRequest) -> Result<PullRequestRef> {
        let mut requests = self.requests.borrow_mut();
        requests.push(request.clone());
        let number = requests.len() as u64;
        Ok(PullRequestRef {
            number,
            url: format!("https://github.com/{}/pull/{number}", request.repo),
        })
    }

    fn fetch_issue(&self, repo: &str, number: u64) -> Result<IssueDetails> {
        Ok(IssueDetails {
            title: format!("Issue {number}"),
            body: None,
            labels: Vec::new(),
            url: format!("https://github.com/{repo}/issues/{number}"),
            created_at: "2026-01-02T03:04:05Z".to_string(),
        })
    }
}

/// Code host whose every call fails with `message`.
#[derive(Debug)]
pub struct FailingHost {
    pub message: String,
}

impl CodeHost for FailingHost {
    fn create_draft_pull_request(&self, _request: &PullRequestRequest) -> Result<PullRequestRef> {
        Err(anyhow!("{}", self.message))
    }

    fn fetch_issue(&self, _repo: &str, _number: u64) -> Result<IssueDetails> {
        Err(anyhow!("{}", self.message))
    }
}
