//! Shared helpers for reframe integration tests.
//!
//! - `TestHarness` wires a full orchestrator into a temp directory
//! - builders for synthetic JPEGs, processing options and remote doubles

pub mod builders;
pub mod harness;

pub use builders::*;
pub use harness::TestHarness;
