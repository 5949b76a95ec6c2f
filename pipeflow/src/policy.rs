//! Exception policies.
//!
//! A policy is consulted every time a stage fails. Returning `true` asks
//! for one more attempt with the same input; `false` abandons the item.
//! A second approval after a failed retry is never honored.

use crate::core::PipelineId;
use crate::errors::StageFailure;
use parking_lot::Mutex;
use std::fmt::Debug;
use tracing::{error, warn, Level};

/// Context handed to an [`ExceptionPolicy`] when a stage fails.
#[derive(Debug)]
pub struct PipeFailure<'a> {
    /// Name of the failing stage.
    pub stage: &'a str,
    /// Name of the pipeline running the stage.
    pub pipeline: &'a str,
    /// Id of the pipeline running the stage.
    pub pipeline_id: PipelineId,
    /// Whether the traversal runs on the execution service.
    pub parallel: bool,
    /// The input the stage failed on.
    pub input: &'a dyn Debug,
    /// The error raised by the stage.
    pub error: &'a anyhow::Error,
    /// 1 for the first attempt, 2 for the retry.
    pub attempt: u32,
}

impl PipeFailure<'_> {
    /// Returns true if this failure came from the retry attempt.
    #[must_use]
    pub const fn is_retry(&self) -> bool {
        self.attempt > 1
    }

    /// Converts to an owned failure record.
    #[must_use]
    pub fn to_record(&self) -> StageFailure {
        StageFailure {
            stage: self.stage.to_string(),
            pipeline: self.pipeline.to_string(),
            pipeline_id: self.pipeline_id,
            parallel: self.parallel,
            error: format!("{:#}", self.error),
            attempts: self.attempt,
        }
    }
}

/// Strategy invoked when a stage fails.
///
/// Policies are shared by every traversal of a pipeline, including
/// concurrent ones, and must be safe for concurrent invocation.
pub trait ExceptionPolicy: Send + Sync {
    /// Decides whether the failing stage is retried once.
    fn on_failure(&self, failure: &PipeFailure<'_>) -> bool;
}

impl<F> ExceptionPolicy for F
where
    F: Fn(&PipeFailure<'_>) -> bool + Send + Sync,
{
    fn on_failure(&self, failure: &PipeFailure<'_>) -> bool {
        self(failure)
    }
}

/// The default policy: logs the failure and never retries.
#[derive(Debug, Clone)]
pub struct LoggingPolicy {
    level: Level,
}

impl Default for LoggingPolicy {
    fn default() -> Self {
        Self { level: Level::ERROR }
    }
}

impl LoggingPolicy {
    /// Creates a logging policy at the given level.
    #[must_use]
    pub const fn new(level: Level) -> Self {
        Self { level }
    }

    /// Creates a warn-level logging policy.
    #[must_use]
    pub const fn warn() -> Self {
        Self::new(Level::WARN)
    }

    pub(crate) fn log(&self, failure: &PipeFailure<'_>) {
        match self.level {
            Level::ERROR => {
                error!(
                    stage = failure.stage,
                    pipeline = failure.pipeline,
                    pipeline_id = %failure.pipeline_id,
                    parallel = failure.parallel,
                    attempt = failure.attempt,
                    input = ?failure.input,
                    error = ?failure.error,
                    "Stage failed"
                );
            }
            _ => {
                warn!(
                    stage = failure.stage,
                    pipeline = failure.pipeline,
                    pipeline_id = %failure.pipeline_id,
                    parallel = failure.parallel,
                    attempt = failure.attempt,
                    input = ?failure.input,
                    error = ?failure.error,
                    "Stage failed"
                );
            }
        }
    }
}

impl ExceptionPolicy for LoggingPolicy {
    fn on_failure(&self, failure: &PipeFailure<'_>) -> bool {
        self.log(failure);
        false
    }
}

/// Logs the failure and asks for the single retry.
#[derive(Debug, Clone)]
pub struct RetryOncePolicy {
    logger: LoggingPolicy,
}

impl RetryOncePolicy {
    /// Creates a retry-once policy logging at warn level.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            logger: LoggingPolicy::warn(),
        }
    }
}

impl Default for RetryOncePolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl ExceptionPolicy for RetryOncePolicy {
    fn on_failure(&self, failure: &PipeFailure<'_>) -> bool {
        self.logger.log(failure);
        true
    }
}

/// Records every failure it is consulted on.
///
/// Useful for telling abandoned items apart from dropped ones after a
/// synchronous run.
#[derive(Debug, Default)]
pub struct RecordingPolicy {
    retry: bool,
    failures: Mutex<Vec<StageFailure>>,
}

impl RecordingPolicy {
    /// Creates a recording policy that never retries.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a recording policy that always asks for the retry.
    #[must_use]
    pub fn retrying() -> Self {
        Self {
            retry: true,
            failures: Mutex::new(Vec::new()),
        }
    }

    /// Returns the recorded failures.
    #[must_use]
    pub fn failures(&self) -> Vec<StageFailure> {
        self.failures.lock().clone()
    }

    /// Returns the number of recorded failures.
    #[must_use]
    pub fn len(&self) -> usize {
        self.failures.lock().len()
    }

    /// Returns true if nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.failures.lock().is_empty()
    }

    /// Clears the recorded failures.
    pub fn clear(&self) {
        self.failures.lock().clear();
    }
}

impl ExceptionPolicy for RecordingPolicy {
    fn on_failure(&self, failure: &PipeFailure<'_>) -> bool {
        self.failures.lock().push(failure.to_record());
        self.retry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    fn consult(policy: &dyn ExceptionPolicy, attempt: u32) -> bool {
        let error = anyhow!("disk full").context("writing batch");
        let input = 17_u32;
        let failure = PipeFailure {
            stage: "map",
            pipeline: "ingest",
            pipeline_id: PipelineId::new(),
            parallel: false,
            input: &input,
            error: &error,
            attempt,
        };
        policy.on_failure(&failure)
    }

    #[test]
    fn test_logging_policy_never_retries() {
        assert!(!consult(&LoggingPolicy::default(), 1));
        assert!(!consult(&LoggingPolicy::warn(), 1));
    }

    #[test]
    fn test_retry_once_policy_approves() {
        assert!(consult(&RetryOncePolicy::new(), 1));
    }

    fn first_attempt_only(failure: &PipeFailure<'_>) -> bool {
        !failure.is_retry()
    }

    #[test]
    fn test_function_policy() {
        assert!(consult(&first_attempt_only, 1));
        assert!(!consult(&first_attempt_only, 2));
    }

    #[test]
    fn test_recording_policy_keeps_context_chain() {
        let policy = RecordingPolicy::new();
        assert!(!consult(&policy, 1));

        let failures = policy.failures();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].stage, "map");
        assert_eq!(failures[0].pipeline, "ingest");
        assert_eq!(failures[0].error, "writing batch: disk full");
    }

    #[test]
    fn test_recording_policy_retrying() {
        let policy = RecordingPolicy::retrying();
        assert!(consult(&policy, 1));
        policy.clear();
        assert!(policy.is_empty());
    }
}
