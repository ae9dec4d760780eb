//! I/O adapters for the pipeline.

pub mod agent;
pub mod config;
pub mod credentials;
pub mod git;
pub mod github;
pub mod process;
pub mod store;
pub mod templates;
