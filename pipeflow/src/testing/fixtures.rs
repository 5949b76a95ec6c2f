//! Test fixtures for pipeline testing.

use crate::executor::{ExecutionService, ExecutorConfig, TokioExecutor};
use crate::pipeline::Pipeline;
use std::sync::Arc;
use std::time::Duration;

/// How long tests wait on handles before failing.
pub const WAIT: Duration = Duration::from_secs(5);

/// Returns a small execution service for tests.
#[must_use]
pub fn test_executor() -> Arc<dyn ExecutionService> {
    Arc::new(TokioExecutor::with_config(
        ExecutorConfig::new()
            .with_worker_threads(2)
            .with_thread_name("pipeflow-test"),
    ))
}

/// Starts an empty `i32` pipeline on a test execution service.
#[must_use]
pub fn int_pipeline(name: &str) -> Pipeline<i32, i32> {
    Pipeline::start_with(name, test_executor())
}

/// Starts an empty pipeline of any item type on the given service.
#[must_use]
pub fn pipeline_on<T: crate::core::Item>(
    name: &str,
    executor: &Arc<dyn ExecutionService>,
) -> Pipeline<T, T> {
    Pipeline::start_with(name, Arc::clone(executor))
}
