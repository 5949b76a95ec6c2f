//! Fan-out and conditional routing into child pipelines.

use super::{Pipe, PipeContext, PipeResult};
use crate::completion::HandleSet;
use crate::pipeline::Branch;
use std::sync::Arc;
use tracing::warn;

/// Sends a copy of every input into each child pipeline and then drops it.
///
/// Children run on the execution service during asynchronous traversals
/// and inline otherwise. A fork is terminal for the pipeline it ends.
pub struct ForkPipe<T> {
    children: Vec<Branch<T>>,
}

impl<T> ForkPipe<T> {
    /// Creates a fork over the given children.
    #[must_use]
    pub fn new(children: Vec<Branch<T>>) -> Self {
        Self { children }
    }

    /// Returns the children in fan-out order.
    #[must_use]
    pub fn children(&self) -> &[Branch<T>] {
        &self.children
    }
}

impl<T: Clone + Send + Sync> Pipe<T, T> for ForkPipe<T> {
    fn process(&self, input: &T, ctx: &PipeContext<'_>) -> PipeResult<T> {
        for child in &self.children {
            dispatch(child, input, ctx);
        }
        Ok(None)
    }

    fn name(&self) -> &str {
        "fork"
    }

    fn register_handles(&self, handles: &mut HandleSet) {
        for child in &self.children {
            child.register_handles(handles);
        }
    }

    fn release_handles(&self, handles: &HandleSet) {
        for child in &self.children {
            child.release_handles(handles);
        }
    }
}

/// Routes a copy of matching inputs into an alternate pipeline and forwards
/// every input unchanged.
pub struct SwitchPipe<T, P> {
    predicate: P,
    alternate: Branch<T>,
}

impl<T, P> SwitchPipe<T, P> {
    /// Creates a switch routing inputs matching `predicate` to `alternate`.
    pub const fn new(predicate: P, alternate: Branch<T>) -> Self {
        Self {
            predicate,
            alternate,
        }
    }
}

impl<T, P> Pipe<T, T> for SwitchPipe<T, P>
where
    T: Clone + Send + Sync,
    P: Fn(&T) -> bool + Send + Sync,
{
    fn process(&self, input: &T, ctx: &PipeContext<'_>) -> PipeResult<T> {
        if (self.predicate)(input) {
            dispatch(&self.alternate, input, ctx);
        } else if ctx.is_parallel() {
            // The alternate will never see this item; its waiters must not hang.
            self.alternate.release_handles(ctx.handles());
        }
        Ok(Some(input.clone()))
    }

    fn name(&self) -> &str {
        "switch"
    }

    fn register_handles(&self, handles: &mut HandleSet) {
        self.alternate.register_handles(handles);
    }

    fn release_handles(&self, handles: &HandleSet) {
        self.alternate.release_handles(handles);
    }
}

fn dispatch<T: Clone>(branch: &Branch<T>, input: &T, ctx: &PipeContext<'_>) {
    if !ctx.is_parallel() {
        branch.run_sync(input.clone());
        return;
    }

    if let Err(e) = branch.submit(input.clone(), Arc::clone(ctx.shared_handles())) {
        warn!(
            pipeline = ctx.pipeline_name(),
            branch = branch.name(),
            branch_id = %branch.id(),
            error = %e,
            "Could not submit branch"
        );
        branch.release_handles(ctx.handles());
    }
}
