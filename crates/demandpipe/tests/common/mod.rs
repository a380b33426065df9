//! Shared utilities for demandpipe integration tests.
//!
//! - `TestHarness` owns a temp directory, a file-backed database and the
//!   pipeline config pointing at it
//! - `builders` creates PDFs and letter metadata programmatically

pub mod builders;
pub mod harness;

pub use builders::*;
pub use harness::TestHarness;
