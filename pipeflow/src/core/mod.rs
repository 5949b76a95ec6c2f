//! Core domain model types for pipeflow.
//!
//! This module contains the fundamental types used throughout the engine:
//! - The [`Item`] bound for values flowing through a pipeline
//! - Pipeline identity
//! - Traversal outcomes

mod identity;
mod outcome;

pub use identity::PipelineId;
pub use outcome::{Outcome, OutcomeKind};

use std::fmt::Debug;

/// Values that can flow through a pipeline.
///
/// Fork and switch copy values into branches, and the default exception
/// policy logs the input that made a stage fail.
pub trait Item: Clone + Debug + Send + Sync + 'static {}

impl<T> Item for T where T: Clone + Debug + Send + Sync + 'static {}
