//! Error types for the pipeflow engine.
//!
//! Stage failures never escape a pipeline: they are absorbed by the
//! exception policy and surface as [`StageFailure`] records inside an
//! [`Outcome`](crate::core::Outcome). [`PipeflowError`] covers the
//! library's own failure modes (executor and waiting).

use crate::core::PipelineId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

/// The main error type for pipeflow operations.
#[derive(Debug, Error)]
pub enum PipeflowError {
    /// The execution service could not accept a task.
    #[error("Execution service error: {0}")]
    Executor(String),

    /// The execution service has been shut down.
    #[error("Execution service has been shut down")]
    ExecutorShutdown,

    /// A timed wait on a completion handle elapsed.
    #[error("Timed out after {timeout:?} waiting for pipeline '{pipeline}'")]
    WaitTimeout {
        /// The identifier of the pipeline being waited on.
        pipeline: String,
        /// The timeout that elapsed.
        timeout: Duration,
    },

    /// A global tracing subscriber could not be installed.
    #[error("Tracing setup error: {0}")]
    Tracing(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipeflowError {
    /// Creates an executor error.
    #[must_use]
    pub fn executor(message: impl Into<String>) -> Self {
        Self::Executor(message.into())
    }

    /// Creates a wait timeout error.
    #[must_use]
    pub fn wait_timeout(pipeline: impl Into<String>, timeout: Duration) -> Self {
        Self::WaitTimeout {
            pipeline: pipeline.into(),
            timeout,
        }
    }

    /// Returns true if this error is a wait timeout.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::WaitTimeout { .. })
    }
}

/// Record of a stage that failed and whose item was abandoned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageFailure {
    /// Name of the failing stage.
    pub stage: String,
    /// Name of the pipeline that ran the stage.
    pub pipeline: String,
    /// Id of the pipeline that ran the stage.
    pub pipeline_id: PipelineId,
    /// Whether the traversal was running on the execution service.
    pub parallel: bool,
    /// The last error message, including its context chain.
    pub error: String,
    /// How many times the stage was invoked for this item.
    pub attempts: u32,
}

impl StageFailure {
    /// Converts to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert("stage".to_string(), serde_json::json!(self.stage));
        map.insert("pipeline".to_string(), serde_json::json!(self.pipeline));
        map.insert(
            "pipeline_id".to_string(),
            serde_json::json!(self.pipeline_id.to_string()),
        );
        map.insert("parallel".to_string(), serde_json::json!(self.parallel));
        map.insert("error".to_string(), serde_json::json!(self.error));
        map.insert("attempts".to_string(), serde_json::json!(self.attempts));
        map
    }
}

impl std::fmt::Display for StageFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "stage '{}' in pipeline '{}' failed after {} attempt(s): {}",
            self.stage, self.pipeline, self.attempts, self.error
        )
    }
}
