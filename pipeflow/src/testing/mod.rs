//! Testing utilities for pipeflow pipelines.
//!
//! This module provides:
//! - Mock pipes that record, fail, recover or stall
//! - Assertions over traversal outcomes
//! - Fixtures for pipelines on small execution services

mod assertions;
mod fixtures;
mod mocks;

pub use assertions::{assert_abandoned, assert_completed, assert_dropped, assert_outcome_kind};
pub use fixtures::{int_pipeline, pipeline_on, test_executor, WAIT};
pub use mocks::{FailingPipe, FlakyPipe, RecordingPipe, SlowPipe};
