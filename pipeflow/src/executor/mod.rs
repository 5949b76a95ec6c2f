//! Execution services that run chain runners off the calling thread.
//!
//! The engine only needs to hand a unit of work to something that runs it
//! on another thread. [`TokioExecutor`] is the default; any
//! `tokio::runtime::Handle` can be used as well.

mod config;
mod runtime;

pub use config::ExecutorConfig;
pub use runtime::TokioExecutor;

use crate::errors::PipeflowError;

/// A unit of work submitted to an execution service.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Accepts units of work and runs them on independent threads.
pub trait ExecutionService: Send + Sync {
    /// Submits a task. The task eventually runs to completion.
    ///
    /// # Errors
    ///
    /// Returns an error if the service cannot accept work.
    fn submit(&self, task: Task) -> Result<(), PipeflowError>;
}

impl ExecutionService for tokio::runtime::Handle {
    fn submit(&self, task: Task) -> Result<(), PipeflowError> {
        self.spawn_blocking(task);
        Ok(())
    }
}
