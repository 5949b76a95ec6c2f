//! Observability utilities.
//!
//! Every traversal runs inside a `pipeline_run` span carrying the pipeline
//! name, id and execution mode, so stage events logged by the engine and by
//! user stages are attributed to the run that produced them.

use crate::core::PipelineId;
use crate::errors::PipeflowError;
use tracing::Span;
use tracing_subscriber::EnvFilter;

/// The filter used when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "pipeflow=info";

/// Output format of the subscriber installed by [`init_tracing`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Pretty,
    /// One JSON object per event.
    Json,
}

/// Installs a global fmt subscriber filtered by `RUST_LOG`, falling back to
/// `default_filter`.
///
/// # Errors
///
/// Returns [`PipeflowError::Tracing`] if the filter does not parse or a
/// global subscriber is already installed.
pub fn init_tracing(default_filter: &str, format: LogFormat) -> Result<(), PipeflowError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(default_filter)
            .map_err(|e| PipeflowError::Tracing(e.to_string()))?,
    };
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_thread_names(true);

    let installed = match format {
        LogFormat::Pretty => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    installed.map_err(|e| PipeflowError::Tracing(e.to_string()))
}

/// Returns the span a traversal of the given pipeline runs in.
#[must_use]
pub fn pipeline_span(pipeline: &str, pipeline_id: PipelineId, parallel: bool) -> Span {
    tracing::debug_span!(
        "pipeline_run",
        pipeline,
        pipeline_id = %pipeline_id,
        parallel
    )
}
