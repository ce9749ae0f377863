//! Shared test utilities for taxonomist integration tests.
//!
//! This module provides:
//! - `TestHarness` for tests that need config and taxonomy files on disk
//! - Builders for stub stages, config JSON and scripted collaborator responses

pub mod builders;
pub mod harness;

pub use builders::*;
pub use harness::TestHarness;
