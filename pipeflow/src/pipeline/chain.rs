//! The linked stage chain behind every pipeline.
//!
//! A pipeline value is the last link of a chain that ends at a [`Source`].
//! Links are immutable and shared, so extending a pipeline never changes
//! the pipelines it was built from.

use crate::completion::HandleSet;
use crate::core::{Item, Outcome};
use crate::errors::StageFailure;
use crate::policy::PipeFailure;
use crate::stages::{Pipe, PipeContext, PipeResult};
use anyhow::anyhow;
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, trace};

pub(crate) trait Chain<I, O>: Send + Sync {
    /// Runs every stage from the source to this link.
    fn walk(&self, input: I, ctx: &PipeContext<'_>) -> Outcome<O>;

    /// Adds the handles of every nested pipeline along the chain.
    fn register_handles(&self, handles: &mut HandleSet);

    /// Releases the handles of every nested pipeline along the chain.
    fn release_handles(&self, handles: &HandleSet);

    /// Number of stages.
    fn len(&self) -> usize;

    /// Appends stage names in execution order.
    fn stage_names(&self, names: &mut Vec<String>);
}

/// The identity start of a chain.
pub(crate) struct Source;

impl<T: Item> Chain<T, T> for Source {
    fn walk(&self, input: T, _ctx: &PipeContext<'_>) -> Outcome<T> {
        Outcome::Completed(input)
    }

    fn register_handles(&self, _handles: &mut HandleSet) {}

    fn release_handles(&self, _handles: &HandleSet) {}

    fn len(&self) -> usize {
        0
    }

    fn stage_names(&self, _names: &mut Vec<String>) {}
}

/// One stage appended to an upstream chain.
pub(crate) struct Link<I, M, O> {
    upstream: Arc<dyn Chain<I, M>>,
    pipe: Arc<dyn Pipe<M, O>>,
    len: usize,
}

impl<I, M, O> Link<I, M, O> {
    pub(crate) fn new(upstream: Arc<dyn Chain<I, M>>, pipe: Arc<dyn Pipe<M, O>>) -> Self {
        let len = upstream.len() + 1;
        Self {
            upstream,
            pipe,
            len,
        }
    }
}

impl<I: Item, M: Item, O: Item> Link<I, M, O> {
    fn attempt(&self, input: &M, ctx: &PipeContext<'_>) -> PipeResult<O> {
        match catch_unwind(AssertUnwindSafe(|| self.pipe.process(input, ctx))) {
            Ok(result) => result,
            Err(payload) => Err(anyhow!("stage panicked: {}", panic_message(payload.as_ref()))),
        }
    }

    fn apply(&self, input: &M, ctx: &PipeContext<'_>) -> Outcome<O> {
        trace!(stage = self.pipe.name(), pipeline = ctx.pipeline_name(), "Running stage");
        let first = match self.attempt(input, ctx) {
            Ok(Some(value)) => return Outcome::Completed(value),
            Ok(None) => return Outcome::Dropped,
            Err(e) => e,
        };

        let (error, attempts) = if ctx.policy().on_failure(&self.failure(input, &first, 1, ctx)) {
            match self.attempt(input, ctx) {
                Ok(Some(value)) => return Outcome::Completed(value),
                Ok(None) => return Outcome::Dropped,
                Err(second) => {
                    // Consulted for its side effects only; there is no third attempt.
                    let _ = ctx.policy().on_failure(&self.failure(input, &second, 2, ctx));
                    (second, 2)
                }
            }
        } else {
            (first, 1)
        };

        self.skip(ctx);
        debug!(
            stage = self.pipe.name(),
            pipeline = ctx.pipeline_name(),
            pipeline_id = %ctx.pipeline_id(),
            attempts,
            "Abandoned item after stage failure"
        );
        Outcome::Abandoned(StageFailure {
            stage: self.pipe.name().to_string(),
            pipeline: ctx.pipeline_name().to_string(),
            pipeline_id: ctx.pipeline_id(),
            parallel: ctx.is_parallel(),
            error: format!("{error:#}"),
            attempts,
        })
    }

    fn failure<'a>(
        &'a self,
        input: &'a M,
        error: &'a anyhow::Error,
        attempt: u32,
        ctx: &'a PipeContext<'_>,
    ) -> PipeFailure<'a> {
        PipeFailure {
            stage: self.pipe.name(),
            pipeline: ctx.pipeline_name(),
            pipeline_id: ctx.pipeline_id(),
            parallel: ctx.is_parallel(),
            input,
            error,
            attempt,
        }
    }

    /// Releases this stage's nested handles when the item will not reach
    /// them during an asynchronous run.
    fn skip(&self, ctx: &PipeContext<'_>) {
        if ctx.is_parallel() {
            self.pipe.release_handles(ctx.handles());
        }
    }
}

impl<I: Item, M: Item, O: Item> Chain<I, O> for Link<I, M, O> {
    fn walk(&self, input: I, ctx: &PipeContext<'_>) -> Outcome<O> {
        match self.upstream.walk(input, ctx) {
            Outcome::Completed(value) => self.apply(&value, ctx),
            Outcome::Dropped => {
                self.skip(ctx);
                Outcome::Dropped
            }
            Outcome::Abandoned(failure) => {
                self.skip(ctx);
                Outcome::Abandoned(failure)
            }
        }
    }

    fn register_handles(&self, handles: &mut HandleSet) {
        self.upstream.register_handles(handles);
        self.pipe.register_handles(handles);
    }

    fn release_handles(&self, handles: &HandleSet) {
        self.upstream.release_handles(handles);
        self.pipe.release_handles(handles);
    }

    fn len(&self) -> usize {
        self.len
    }

    fn stage_names(&self, names: &mut Vec<String>) {
        self.upstream.stage_names(names);
        names.push(self.pipe.name().to_string());
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
