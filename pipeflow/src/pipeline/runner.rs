//! The unit of work behind one asynchronous traversal.

use super::Pipeline;
use crate::completion::HandleSet;
use crate::core::Item;
use crate::observability::pipeline_span;
use crate::stages::PipeContext;
use std::sync::Arc;
use tracing::debug;

/// Walks one pipeline for one input on an execution-service thread and
/// publishes the outcome to the handle matching the pipeline's id.
///
/// `run` consumes the runner, so the terminal state is reached once.
pub(crate) struct ChainRunner<I, O> {
    pipeline: Pipeline<I, O>,
    input: I,
    handles: Arc<HandleSet>,
}

impl<I: Item, O: Item> ChainRunner<I, O> {
    pub(crate) fn new(pipeline: Pipeline<I, O>, input: I, handles: Arc<HandleSet>) -> Self {
        Self {
            pipeline,
            input,
            handles,
        }
    }

    pub(crate) fn run(self) {
        let Self {
            pipeline,
            input,
            handles,
        } = self;
        let _span = pipeline_span(&pipeline.name, pipeline.id, true).entered();
        debug!(stages = pipeline.len(), "Chain runner started");

        let ctx = PipeContext::new(
            &pipeline.name,
            pipeline.id,
            true,
            &handles,
            pipeline.policy.as_ref(),
        );
        let outcome = pipeline.chain.walk(input, &ctx);
        let kind = outcome.kind();
        let published = handles.complete(pipeline.id, outcome);

        debug!(outcome = %kind, published, "Chain runner finished");
    }
}
