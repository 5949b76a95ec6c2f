//! Pipeline building and execution.
//!
//! This module provides:
//! - The immutable [`Pipeline`] value and its stage builders
//! - Type-erased [`Branch`] children for fork and switch
//! - Synchronous and asynchronous traversal
//! - The chain runner submitted to the execution service

mod branch;
mod builder;
mod chain;
mod execution;
mod runner;

#[cfg(test)]
mod integration_tests;

pub use branch::Branch;
pub use builder::Pipeline;
pub use execution::Submission;
