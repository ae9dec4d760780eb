//! Publisher: export filtered artifacts to the public repository.
//!
//! Only regular files under the private `src/` and `tests/` directories cross
//! the boundary, and every one passes through the [`ContentFilter`] first.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, anyhow};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::core::filter::{ContentFilter, scrub_secret};
use crate::core::naming::{feature_branch_name, render_clone_url};
use crate::core::types::{AgentContext, PublishOutcome, PublishStage, PullRequestRef};
use crate::core::work_item::WorkItem;
use crate::io::config::PipelineConfig;
use crate::io::credentials::PUBLIC_TOKEN_VAR;
use crate::io::git::Git;
use crate::io::github::{CodeHost, PullRequestRequest};
use crate::io::templates::MessageTemplates;

/// Private directories exported to the public repository.
pub const EXPORTED_DIRS: [&str; 2] = ["src", "tests"];

/// Remote name of the public clone.
const PUBLIC_REMOTE: &str = "origin";

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("no public repository credential; set {}", PUBLIC_TOKEN_VAR)]
    MissingCredential,
    #[error("{stage} stage failed: {cause:#}")]
    Stage {
        stage: PublishStage,
        cause: anyhow::Error,
    },
}

impl PublishError {
    fn stage_failed(stage: PublishStage) -> impl FnOnce(anyhow::Error) -> Self {
        move |cause| Self::Stage { stage, cause }
    }
}

/// Settings the publisher needs from the pipeline config.
#[derive(Debug, Clone)]
pub struct PublishOptions {
    pub clone_url: String,
    pub base_branch: String,
    pub scratch_dir: PathBuf,
    pub git_user_name: String,
    pub git_user_email: String,
    pub network_timeout: Duration,
    pub private_repo: Option<String>,
}

impl PublishOptions {
    pub fn from_config(config: &PipelineConfig, repo_root: &Path) -> Self {
        Self {
            clone_url: config.publish.clone_url.clone(),
            base_branch: config.publish.base_branch.clone(),
            scratch_dir: config.scratch_dir(repo_root),
            git_user_name: config.publish.git_user_name.clone(),
            git_user_email: config.publish.git_user_email.clone(),
            network_timeout: config.network_timeout(),
            private_repo: config.private_repo.clone(),
        }
    }
}

/// Services the publisher talks to.
pub struct Publisher<'a> {
    pub host: &'a dyn CodeHost,
    pub filter: &'a ContentFilter,
    pub templates: &'a MessageTemplates,
    /// Public write credential, if one was found.
    pub token: Option<&'a str>,
}

/// Export the artifacts of `item` from the working tree at `private_root`,
/// which must have the item's branch checked out.
///
/// `unix_secs` names the feature branch. The scratch clone embeds the token
/// in its remote URL and is removed again before returning.
#[instrument(skip_all, fields(branch = item.branch(), public_issue = item.public_issue()))]
pub fn publish(
    private_root: &Path,
    item: &WorkItem,
    publisher: &Publisher<'_>,
    options: &PublishOptions,
    unix_secs: i64,
) -> Result<PublishOutcome, PublishError> {
    let token = publisher
        .token
        .filter(|token| !token.trim().is_empty())
        .ok_or(PublishError::MissingCredential)?;
    let context = AgentContext::from_item(item, options.private_repo.as_deref());
    let public_repo = context.public_repo.as_str();

    let scratch = ScratchDir::prepare(&options.scratch_dir)
        .map_err(PublishError::stage_failed(PublishStage::Clone))?;
    let url = render_clone_url(&options.clone_url, public_repo, token);
    let clone = Git::clone_into(&url, scratch.path(), options.network_timeout)
        .map_err(|err| scrubbed(err, token))
        .map_err(PublishError::stage_failed(PublishStage::Clone))?;
    info!(public_repo, "public repository cloned");

    let feature_branch = feature_branch_name(item.public_issue(), unix_secs);
    clone
        .checkout_new_branch(&feature_branch)
        .and_then(|()| clone.set_identity(&options.git_user_name, &options.git_user_email))
        .map_err(PublishError::stage_failed(PublishStage::Branch))?;

    let mut copied = 0usize;
    for dir in EXPORTED_DIRS {
        copied += copy_filtered(
            &private_root.join(dir),
            &clone.workdir().join(dir),
            publisher.filter,
        )
        .map_err(PublishError::stage_failed(PublishStage::Copy))?;
    }
    debug!(copied, "artifacts copied");

    clone
        .add_all()
        .map_err(PublishError::stage_failed(PublishStage::Stage))?;
    let has_changes = clone
        .has_staged_changes()
        .map_err(PublishError::stage_failed(PublishStage::Stage))?;
    if !has_changes {
        info!(public_repo, "public repository already up to date; nothing to publish");
        return Ok(PublishOutcome::NoChanges);
    }

    let message = publisher
        .templates
        .publish_commit(&context)
        .context("render commit message")
        .map_err(PublishError::stage_failed(PublishStage::Commit))?;
    clone
        .commit_staged(&message)
        .map_err(PublishError::stage_failed(PublishStage::Commit))?;
    clone
        .push(PUBLIC_REMOTE, &feature_branch, options.network_timeout)
        .map_err(|err| scrubbed(err, token))
        .map_err(PublishError::stage_failed(PublishStage::Push))?;
    info!(feature_branch = %feature_branch, "feature branch pushed");

    match open_pull_request(publisher, &context, &feature_branch, &options.base_branch) {
        Ok(pull_request) => Ok(PublishOutcome::Published {
            branch: feature_branch,
            pull_request,
        }),
        Err(err) => {
            let warning = scrub_secret(&format!("{err:#}"), token);
            warn!(feature_branch = %feature_branch, warning = %warning, "pull request not created");
            Ok(PublishOutcome::PushedWithoutPullRequest {
                branch: feature_branch,
                warning,
            })
        }
    }
}

fn open_pull_request(
    publisher: &Publisher<'_>,
    context: &AgentContext,
    feature_branch: &str,
    base_branch: &str,
) -> anyhow::Result<PullRequestRef> {
    let request = PullRequestRequest {
        repo: context.public_repo.clone(),
        title: publisher.templates.pr_title(context).context("render pr title")?,
        body: publisher.templates.pr_body(context).context("render pr body")?,
        base_branch: base_branch.to_string(),
        head_branch: feature_branch.to_string(),
    };
    publisher.host.create_draft_pull_request(&request)
}

/// Copy regular files under `src` to the same relative paths under `dest`,
/// filtering their text. Returns the number of files written.
///
/// A missing `src` copies nothing. Symlinks are not followed and files that
/// are not UTF-8 are skipped.
fn copy_filtered(src: &Path, dest: &Path, filter: &ContentFilter) -> anyhow::Result<usize> {
    let metadata = match fs::symlink_metadata(src) {
        Ok(metadata) => metadata,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(err) => return Err(err).with_context(|| format!("stat {}", src.display())),
    };
    if !metadata.is_dir() {
        warn!(path = %src.display(), "not a directory; skipping");
        return Ok(0);
    }

    let mut entries = fs::read_dir(src)
        .with_context(|| format!("read dir {}", src.display()))?
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("read dir {}", src.display()))?;
    entries.sort_by_key(|entry| entry.file_name());

    let mut copied = 0;
    for entry in entries {
        let path = entry.path();
        let target = dest.join(entry.file_name());
        let file_type = entry
            .file_type()
            .with_context(|| format!("stat {}", path.display()))?;
        if file_type.is_symlink() {
            warn!(path = %path.display(), "symlink not exported");
        } else if file_type.is_dir() {
            copied += copy_filtered(&path, &target, filter)?;
        } else if file_type.is_file() {
            let bytes = fs::read(&path).with_context(|| format!("read {}", path.display()))?;
            let Ok(text) = String::from_utf8(bytes) else {
                warn!(path = %path.display(), "not UTF-8; cannot filter, skipping");
                continue;
            };
            fs::create_dir_all(dest).with_context(|| format!("create {}", dest.display()))?;
            fs::write(&target, filter.filter(&text))
                .with_context(|| format!("write {}", target.display()))?;
            copied += 1;
        }
    }
    Ok(copied)
}

fn scrubbed(err: anyhow::Error, token: &str) -> anyhow::Error {
    anyhow!(scrub_secret(&format!("{err:#}"), token))
}

/// Scratch clone location, emptied on creation and removed on drop.
struct ScratchDir {
    path: PathBuf,
}

impl ScratchDir {
    fn prepare(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            fs::remove_dir_all(path)
                .with_context(|| format!("remove stale scratch dir {}", path.display()))?;
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create {}", parent.display()))?;
        }
        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        if self.path.exists()
            && let Err(err) = fs::remove_dir_all(&self.path)
        {
            warn!(path = %self.path.display(), err = %err, "failed to remove scratch dir");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::filter::FilterSettings;

    #[test]
    fn copies_nested_files_filtered_and_skips_binary() {
        let temp = tempfile::tempdir().expect("tempdir");
        let src = temp.path().join("src");
        fs::create_dir_all(src.join("nested")).expect("mkdir");
        fs::write(src.join("a.js"), "const api_key = \"xyz\";\nok();\n").expect("write");
        fs::write(src.join("nested/b.txt"), "from /covid-gleaned/x").expect("write");
        fs::write(src.join("blob.bin"), b"\xff\xfe\x00").expect("write");

        let filter = ContentFilter::new(&FilterSettings::default()).expect("filter");
        let dest = temp.path().join("out");
        let copied = copy_filtered(&src, &dest, &filter).expect("copy");

        assert_eq!(copied, 2);
        assert_eq!(
            fs::read_to_string(dest.join("a.js")).expect("read"),
            "const [FILTERED];\nok();\n"
        );
        assert_eq!(
            fs::read_to_string(dest.join("nested/b.txt")).expect("read"),
            "from [FILTERED]x"
        );
        assert!(!dest.join("blob.bin").exists());
    }

    #[test]
    fn missing_source_dir_copies_nothing() {
        let temp = tempfile::tempdir().expect("tempdir");
        let filter = ContentFilter::new(&FilterSettings::default()).expect("filter");
        let copied = copy_filtered(&temp.path().join("nope"), &temp.path().join("out"), &filter)
            .expect("copy");
        assert_eq!(copied, 0);
        assert!(!temp.path().join("out").exists());
    }

    #[cfg(unix)]
    #[test]
    fn symlinks_are_not_followed() {
        let temp = tempfile::tempdir().expect("tempdir");
        let src = temp.path().join("src");
        fs::create_dir_all(&src).expect("mkdir");
        fs::write(temp.path().join("secret.txt"), "outside").expect("write");
        std::os::unix::fs::symlink(temp.path().join("secret.txt"), src.join("link.txt"))
            .expect("symlink");

        let filter = ContentFilter::new(&FilterSettings::default()).expect("filter");
        let dest = temp.path().join("out");
        assert_eq!(copy_filtered(&src, &dest, &filter).expect("copy"), 0);
        assert!(!dest.join("link.txt").exists());
    }

    #[test]
    fn scratch_dir_is_reset_and_removed() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("git/paidwork/public-repo");
        fs::create_dir_all(&path).expect("mkdir");
        fs::write(path.join("stale"), "x").expect("write");

        let scratch = ScratchDir::prepare(&path).expect("prepare");
        assert!(!path.exists());
        fs::create_dir_all(scratch.path()).expect("mkdir");
        drop(scratch);
        assert!(!path.exists());
    }
}
