//! Branch scanning against a real git remote.

use std::time::Duration;

use paidwork::core::work_item::{MARKER_FILE, WorkStatus};
use paidwork::scan::scan_work_items;
use paidwork::test_support::{TestRepo, executed_item, git_in, marker_json, record};

const TIMEOUT: Duration = Duration::from_secs(60);

#[test]
fn scan_skips_malformed_marker_and_restores_branch() {
    let repo = TestRepo::new().expect("repo");
    repo.push_work_item("paid/b", &record(9), &[]).expect("push b");
    repo.push_work_item("paid/a", &record(4), &[]).expect("push a");
    repo.push_branch_with_file("paid/broken", MARKER_FILE, "{ not json")
        .expect("push broken");
    repo.push_branch_with_file("paid/empty", "notes.txt", "no marker here")
        .expect("push empty");

    let items = scan_work_items(&repo.git(), "origin", TIMEOUT).expect("scan");

    let found: Vec<(u64, &str)> = items
        .iter()
        .map(|item| (item.public_issue(), item.branch()))
        .collect();
    assert_eq!(found, vec![(4, "paid/a"), (9, "paid/b")]);
    assert!(items.iter().all(|item| item.status() == WorkStatus::ReadyForExecution));
    assert_eq!(repo.current_branch().expect("branch"), "main");
}

#[test]
fn scan_ignores_branches_without_prefix() {
    let repo = TestRepo::new().expect("repo");
    repo.push_work_item("feature/7", &record(7), &[]).expect("push feature");
    repo.push_work_item("paid/8", &record(8), &[]).expect("push paid");

    let items = scan_work_items(&repo.git(), "origin", TIMEOUT).expect("scan");

    assert_eq!(items.len(), 1);
    assert_eq!(items[0].branch(), "paid/8");
    // Only the paid branch was ever checked out locally.
    assert!(!repo.git().has_local_branch("feature/7").expect("lookup"));
    assert_eq!(repo.current_branch().expect("branch"), "main");
}

#[test]
fn scan_with_no_work_branches_is_empty() {
    let repo = TestRepo::new().expect("repo");
    let items = scan_work_items(&repo.git(), "origin", TIMEOUT).expect("scan");
    assert!(items.is_empty());
}

#[test]
fn scan_fails_for_unknown_repository() {
    let temp = tempfile::tempdir().expect("tempdir");
    let git = paidwork::io::git::Git::new(temp.path());
    assert!(scan_work_items(&git, "origin", TIMEOUT).is_err());
}

#[test]
fn scan_from_detached_head_skips_restore() {
    let repo = TestRepo::new().expect("repo");
    repo.push_work_item("paid/a", &record(4), &[]).expect("push");
    git_in(repo.path(), &["checkout", "-q", "--detach"]).expect("detach");

    let items = scan_work_items(&repo.git(), "origin", TIMEOUT).expect("scan");

    assert_eq!(items.len(), 1);
    assert_eq!(items[0].public_issue(), 4);
    // Nothing to go back to: the last scanned branch stays checked out.
    assert_eq!(repo.current_branch().expect("branch"), "paid/a");
}

#[test]
fn rescan_sees_remote_updates_to_known_branch() {
    let repo = TestRepo::new().expect("repo");
    repo.push_work_item("paid/a", &record(4), &[]).expect("push");
    let first = scan_work_items(&repo.git(), "origin", TIMEOUT).expect("scan");
    assert_eq!(first[0].status(), WorkStatus::ReadyForExecution);
    assert!(repo.git().has_local_branch("paid/a").expect("lookup"));

    let executed = executed_item("paid/a", 4);
    repo.push_remote_update("paid/a", MARKER_FILE, &marker_json(executed.record()))
        .expect("remote update");

    let second = scan_work_items(&repo.git(), "origin", TIMEOUT).expect("rescan");
    assert_eq!(second.len(), 1);
    assert_eq!(second[0].status(), WorkStatus::Executed);
    assert_eq!(repo.current_branch().expect("branch"), "main");
}
