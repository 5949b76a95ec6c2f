//! Tokio-backed execution service.

use super::{ExecutionService, ExecutorConfig, Task};
use crate::errors::PipeflowError;
use parking_lot::Mutex;
use tokio::runtime::{Builder, Runtime};
use tracing::debug;

enum RuntimeState {
    Idle,
    Running(Runtime),
    Shutdown,
}

/// A worker pool backed by a multi-threaded tokio runtime.
///
/// Tasks run on the runtime's blocking pool, so a stage may block on a
/// nested run without stalling the async workers.
///
/// The runtime is built on the first submission, so pipelines that only run
/// synchronously never start threads. Dropping the executor shuts the
/// runtime down in the background.
pub struct TokioExecutor {
    config: ExecutorConfig,
    state: Mutex<RuntimeState>,
}

impl TokioExecutor {
    /// Creates an executor sized to the available cores.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(ExecutorConfig::default())
    }

    /// Creates an executor with the given configuration.
    #[must_use]
    pub fn with_config(config: ExecutorConfig) -> Self {
        Self {
            config,
            state: Mutex::new(RuntimeState::Idle),
        }
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Returns true once the runtime has been built.
    #[must_use]
    pub fn is_started(&self) -> bool {
        matches!(*self.state.lock(), RuntimeState::Running(_))
    }

    /// Stops accepting work and shuts the runtime down without waiting for
    /// running tasks.
    pub fn shutdown(&self) {
        let previous = std::mem::replace(&mut *self.state.lock(), RuntimeState::Shutdown);
        if let RuntimeState::Running(runtime) = previous {
            debug!(thread_name = %self.config.thread_name, "Shutting down execution service");
            runtime.shutdown_background();
        }
    }

    fn build_runtime(&self) -> Result<Runtime, PipeflowError> {
        let mut builder = Builder::new_multi_thread();
        builder
            .worker_threads(self.config.worker_threads.max(1))
            .max_blocking_threads(self.config.max_blocking_threads.max(1))
            .thread_name(self.config.thread_name.clone())
            .enable_all();
        if let Some(bytes) = self.config.thread_stack_size {
            builder.thread_stack_size(bytes);
        }

        let runtime = builder.build()?;
        debug!(
            worker_threads = self.config.worker_threads,
            thread_name = %self.config.thread_name,
            "Started execution service"
        );
        Ok(runtime)
    }
}

impl Default for TokioExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl ExecutionService for TokioExecutor {
    fn submit(&self, task: Task) -> Result<(), PipeflowError> {
        let mut state = self.state.lock();
        if matches!(*state, RuntimeState::Idle) {
            *state = RuntimeState::Running(self.build_runtime()?);
        }

        match &*state {
            RuntimeState::Running(runtime) => {
                // Stages may block, so runners stay off the async workers.
                runtime.spawn_blocking(task);
                Ok(())
            }
            _ => Err(PipeflowError::ExecutorShutdown),
        }
    }
}

impl Drop for TokioExecutor {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for TokioExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokioExecutor")
            .field("config", &self.config)
            .field("started", &self.is_started())
            .finish()
    }
}
