//! Branch scanner: discover `paid/*` work items on the remote.

use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, info, instrument, warn};

use crate::core::selector::sort_work_items;
use crate::core::work_item::{WorkItem, is_work_branch};
use crate::io::git::{CheckoutGuard, Git};
use crate::io::store::MarkerStore;

/// Load every work item reachable through `remote`, in canonical order.
///
/// Each candidate branch is checked out in turn to read its marker; the branch
/// checked out on entry is restored before returning. Branches whose checkout
/// or marker load fails are logged and skipped. A failed fetch is logged and
/// the last known remote refs are used.
#[instrument(skip_all, fields(remote))]
pub fn scan_work_items(git: &Git, remote: &str, network_timeout: Duration) -> Result<Vec<WorkItem>> {
    if let Err(err) = git.fetch(remote, network_timeout) {
        warn!(err = %format!("{err:#}"), "fetch failed; using cached remote refs");
    }

    let candidates: Vec<String> = git
        .remote_branches(remote)
        .with_context(|| format!("list branches of remote {remote}"))?
        .into_iter()
        .filter(|branch| is_work_branch(branch))
        .collect();
    debug!(candidates = candidates.len(), "work-item branches found");

    let store = MarkerStore::new(git.workdir());
    let mut items = Vec::with_capacity(candidates.len());
    {
        let _guard = CheckoutGuard::new(git);
        for branch in &candidates {
            if let Err(err) = git.checkout_remote_branch(remote, branch) {
                warn!(branch = %branch, err = %format!("{err:#}"), "skipping branch: checkout failed");
                continue;
            }
            match store.load(branch) {
                Ok(item) => items.push(item),
                Err(err) => warn!(branch = %branch, err = %err, "skipping branch: marker not loaded"),
            }
        }
    }

    sort_work_items(&mut items);
    info!(loaded = items.len(), skipped = candidates.len() - items.len(), "scan complete");
    Ok(items)
}
