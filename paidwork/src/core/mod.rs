//! Deterministic, pure logic shared by the pipeline.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data structures and return deterministic outputs suitable for tests.

pub mod feature;
pub mod filter;
pub mod invariants;
pub mod naming;
pub mod selector;
pub mod types;
pub mod work_item;
