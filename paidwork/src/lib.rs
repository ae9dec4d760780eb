//! Paid-issue execution and publish pipeline.
//!
//! Work items live on `paid/*` branches of a private repository, each carrying
//! an `.execution-ready.json` marker. The pipeline finds them, runs an
//! implementation agent for one, records the result on its branch, then
//! exports filtered sources and tests to the public repository as a draft pull
//! request. The code is split the same way throughout:
//!
//! - **[`core`]**: Pure, deterministic logic (work-item lifecycle, content
//!   filter, selection, naming). No I/O, fully testable in isolation.
//! - **[`io`]**: Side-effecting operations (git, child processes, marker
//!   store, agent, `gh`, configuration).
//!
//! Orchestration modules ([`scan`], [`execute`], [`publish`], [`pipeline`])
//! coordinate core logic with I/O to implement the CLI commands.

pub mod core;
pub mod execute;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod pipeline;
pub mod publish;
pub mod scan;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
