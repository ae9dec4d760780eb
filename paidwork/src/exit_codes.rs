//! Stable exit codes for the `paidwork` CLI.

/// Command succeeded, including "nothing ready" for `--next` and a pushed
/// branch whose pull request could not be opened.
pub const OK: i32 = 0;
/// Invalid usage, config or environment (repository, remote, credentials).
pub const INVALID: i32 = 1;
/// Requested issue has no matching work item in the required state.
pub const NOT_FOUND: i32 = 2;
/// Execution failed at some stage.
pub const EXECUTION_FAILED: i32 = 3;
/// Publishing failed at some stage.
pub const PUBLISH_FAILED: i32 = 4;
