//! # Pipeflow
//!
//! A chain-of-processors dataflow engine.
//!
//! Pipeflow composes ordered chains of stages ("pipes") and runs them either
//! on the calling thread or on a worker pool, with support for:
//!
//! - **Immutable chains**: every builder call returns a new pipeline, so any
//!   intermediate pipeline can be reused as a branch point
//! - **Drop signal**: a stage can stop an item without failing
//! - **Fan-out and routing**: `fork` copies items into child pipelines,
//!   `switch_if` routes matching items to an alternate one
//! - **Exception policies**: failing stages are logged and optionally retried once
//! - **Completion handles**: asynchronous runs report through a set of
//!   single-assignment handles, one per reachable pipeline
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pipeflow::prelude::*;
//!
//! let doubled = Pipeline::<i32, i32>::start("numbers")
//!     .filter(|x| *x > 0)
//!     .map(|x| x * 2);
//!
//! assert_eq!(doubled.process(3), Some(6));
//! assert_eq!(doubled.process(-1), None);
//!
//! let run = doubled.process_parallel(21)?;
//! Pipeline::wait_for_all(run.handles());
//! assert_eq!(run.wait().into_value(), Some(42));
//! # Ok::<(), pipeflow::errors::PipeflowError>(())
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, missing_docs, rust_2018_idioms)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod completion;
pub mod core;
pub mod errors;
pub mod executor;
pub mod observability;
pub mod pipeline;
pub mod policy;
pub mod stages;
pub mod testing;

pub use completion::{wait_for_all, wait_for_one};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::completion::{Completion, CompletionHandle, HandleSet};
    pub use crate::core::{Item, Outcome, OutcomeKind, PipelineId};
    pub use crate::errors::{PipeflowError, StageFailure};
    pub use crate::executor::{ExecutionService, ExecutorConfig, TokioExecutor};
    pub use crate::observability::{init_tracing, LogFormat};
    pub use crate::pipeline::{Branch, Pipeline, Submission};
    pub use crate::policy::{
        ExceptionPolicy, LoggingPolicy, PipeFailure, RecordingPolicy, RetryOncePolicy,
    };
    pub use crate::stages::{Collector, FnPipe, Pipe, PipeContext, PipeResult};
}
