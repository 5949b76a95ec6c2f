//! The pipe contract and the built-in stage library.
//!
//! A pipe is one stage of a pipeline: it reads an input and either produces
//! an output, drops the item, or fails. Failures are handed to the
//! pipeline's exception policy by the chain that runs the pipe.

mod branching;
mod collect;
mod collector;
mod distinct;
mod filter;
mod peek;
mod transform;

pub use branching::{ForkPipe, SwitchPipe};
pub use collect::CollectPipe;
pub use collector::Collector;
pub use distinct::{DistinctPipe, Occurrence};
pub use filter::{Bound, BoundPipe, FilterPipe};
pub use peek::PeekPipe;
pub use transform::{MapPipe, TryMapPipe};

use crate::completion::HandleSet;
use crate::core::PipelineId;
use crate::policy::ExceptionPolicy;
use std::fmt;
use std::sync::Arc;

/// Result of running a pipe on one input.
///
/// `Ok(None)` is the drop signal: the item stops here and later stages are
/// not run.
pub type PipeResult<O> = anyhow::Result<Option<O>>;

/// One stage of a pipeline.
///
/// Pipes are shared by every traversal of their pipeline, including
/// concurrent ones, so `process` takes `&self`.
pub trait Pipe<I, O>: Send + Sync {
    /// Runs the stage on one input.
    fn process(&self, input: &I, ctx: &PipeContext<'_>) -> PipeResult<O>;

    /// Returns the stage name used in logs and failure records.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Adds the completion handles of nested pipelines to the set.
    fn register_handles(&self, _handles: &mut HandleSet) {}

    /// Releases the handles of nested pipelines the traversal will not reach.
    fn release_handles(&self, _handles: &HandleSet) {}
}

/// What a pipe can see of the traversal running it.
pub struct PipeContext<'a> {
    pipeline: &'a str,
    pipeline_id: PipelineId,
    parallel: bool,
    handles: &'a Arc<HandleSet>,
    policy: &'a dyn ExceptionPolicy,
}

impl<'a> PipeContext<'a> {
    /// Creates a context for one traversal.
    #[must_use]
    pub fn new(
        pipeline: &'a str,
        pipeline_id: PipelineId,
        parallel: bool,
        handles: &'a Arc<HandleSet>,
        policy: &'a dyn ExceptionPolicy,
    ) -> Self {
        Self {
            pipeline,
            pipeline_id,
            parallel,
            handles,
            policy,
        }
    }

    /// Returns the name of the pipeline being traversed.
    #[must_use]
    pub const fn pipeline_name(&self) -> &str {
        self.pipeline
    }

    /// Returns the id of the pipeline being traversed.
    #[must_use]
    pub const fn pipeline_id(&self) -> PipelineId {
        self.pipeline_id
    }

    /// Returns true if the traversal runs on the execution service.
    #[must_use]
    pub const fn is_parallel(&self) -> bool {
        self.parallel
    }

    /// Returns the handle set of the current asynchronous run.
    ///
    /// Empty for synchronous traversals.
    #[must_use]
    pub fn handles(&self) -> &HandleSet {
        self.handles
    }

    /// Returns the shared handle set, for handing on to branch runners.
    #[must_use]
    pub const fn shared_handles(&self) -> &'a Arc<HandleSet> {
        self.handles
    }

    pub(crate) fn policy(&self) -> &'a dyn ExceptionPolicy {
        self.policy
    }
}

impl fmt::Debug for PipeContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipeContext")
            .field("pipeline", &self.pipeline)
            .field("pipeline_id", &self.pipeline_id)
            .field("parallel", &self.parallel)
            .field("handles", &self.handles.len())
            .finish()
    }
}

/// A pipe built from a named closure.
pub struct FnPipe<F> {
    name: String,
    func: F,
}

impl<F> FnPipe<F> {
    /// Creates a new function-based pipe.
    pub fn new<I, O>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&I, &PipeContext<'_>) -> PipeResult<O> + Send + Sync,
    {
        Self {
            name: name.into(),
            func,
        }
    }
}

impl<F> fmt::Debug for FnPipe<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnPipe").field("name", &self.name).finish()
    }
}

impl<I, O, F> Pipe<I, O> for FnPipe<F>
where
    F: Fn(&I, &PipeContext<'_>) -> PipeResult<O> + Send + Sync,
{
    fn process(&self, input: &I, ctx: &PipeContext<'_>) -> PipeResult<O> {
        (self.func)(input, ctx)
    }

    fn name(&self) -> &str {
        &self.name
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::with_ctx;
    use super::*;

    #[test]
    fn test_fn_pipe_uses_given_name() {
        let pipe = FnPipe::new("double", |x: &i32, _: &PipeContext<'_>| Ok(Some(x * 2)));
        assert_eq!(Pipe::<i32, i32>::name(&pipe), "double");
        assert_eq!(with_ctx(|ctx| pipe.process(&4, ctx)).unwrap(), Some(8));
    }

    #[test]
    fn test_fn_pipe_sees_context() {
        let pipe = FnPipe::new("ctx", |_: &i32, ctx: &PipeContext<'_>| {
            Ok(Some(ctx.pipeline_name().to_string()))
        });
        let out = with_ctx(|ctx| pipe.process(&1, ctx)).unwrap();
        assert_eq!(out.as_deref(), Some("test"));
    }

    #[test]
    fn test_context_is_sequential_without_handles() {
        with_ctx(|ctx| {
            assert!(!ctx.is_parallel());
            assert!(ctx.handles().is_empty());
        });
    }
}
