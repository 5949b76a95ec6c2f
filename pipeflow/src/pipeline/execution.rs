//! Synchronous and asynchronous traversal entry points.

use super::runner::ChainRunner;
use super::Pipeline;
use crate::completion::{self, Completion, CompletionHandle, HandleSet};
use crate::core::{Item, Outcome};
use crate::errors::PipeflowError;
use crate::observability::pipeline_span;
use crate::stages::PipeContext;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// The handles of one asynchronous run.
///
/// The root handle resolves with the root pipeline's outcome; the handle
/// set additionally holds one handle per pipeline reachable through fork
/// and switch stages.
#[derive(Debug, Clone)]
pub struct Submission<O> {
    handle: CompletionHandle<O>,
    handles: Arc<HandleSet>,
}

impl<O: Item> Submission<O> {
    /// Returns the root pipeline's handle.
    #[must_use]
    pub const fn handle(&self) -> &CompletionHandle<O> {
        &self.handle
    }

    /// Returns every handle of the run, the root's first.
    #[must_use]
    pub fn handles(&self) -> &HandleSet {
        &self.handles
    }

    /// Blocks until the root pipeline's traversal finishes.
    pub fn wait(&self) -> Outcome<O> {
        self.handle.wait()
    }

    /// Blocks until the root traversal finishes or the timeout elapses.
    ///
    /// # Errors
    ///
    /// Returns [`PipeflowError::WaitTimeout`] on timeout.
    pub fn wait_timeout(&self, timeout: Duration) -> Result<Outcome<O>, PipeflowError> {
        self.handle.get_timeout(timeout)
    }

    /// Blocks until every handle of the run is done and returns the root
    /// outcome.
    pub fn wait_for_all(&self) -> Outcome<O> {
        self.handles.wait_for_all();
        self.handle.wait()
    }

    /// Waits asynchronously until every handle of the run is done and
    /// returns the root outcome.
    pub async fn all_completed(&self) -> Outcome<O> {
        self.handles.all_completed().await;
        self.handle.completed().await
    }

    /// Splits into the root handle and the shared handle set.
    #[must_use]
    pub fn into_parts(self) -> (CompletionHandle<O>, Arc<HandleSet>) {
        (self.handle, self.handles)
    }
}

impl<I: Item, O: Item> Pipeline<I, O> {
    /// Traverses the pipeline on the calling thread.
    ///
    /// Returns `None` if a stage dropped the item or the item was abandoned
    /// after a failure; use [`process_outcome`](Self::process_outcome) to
    /// tell the two apart. Fork and switch children run inline.
    pub fn process(&self, input: I) -> Option<O> {
        self.process_outcome(input).into_value()
    }

    /// Traverses the pipeline on the calling thread and returns the full
    /// outcome.
    pub fn process_outcome(&self, input: I) -> Outcome<O> {
        let _span = pipeline_span(&self.name, self.id, false).entered();
        let handles = Arc::new(HandleSet::new());
        let ctx = PipeContext::new(&self.name, self.id, false, &handles, self.policy.as_ref());
        self.chain.walk(input, &ctx)
    }

    /// Schedules a traversal on the execution service and returns at once.
    ///
    /// The returned handle set holds a handle for this pipeline and one for
    /// every pipeline reachable through fork and switch stages. Handles of
    /// branches the item never reaches resolve as dropped.
    ///
    /// # Errors
    ///
    /// Returns an error if the execution service rejects the task.
    pub fn process_parallel(&self, input: I) -> Result<Submission<O>, PipeflowError> {
        let handle = CompletionHandle::new(self.id, self.name.as_ref());
        let mut handles = HandleSet::new();
        handles.insert(Arc::new(handle.clone()));
        self.chain.register_handles(&mut handles);

        let handles = Arc::new(handles);
        debug!(
            pipeline = %self.name,
            pipeline_id = %self.id,
            handles = handles.len(),
            "Submitting parallel run"
        );
        self.submit_runner(input, Arc::clone(&handles))?;
        Ok(Submission { handle, handles })
    }

    pub(crate) fn submit_runner(
        &self,
        input: I,
        handles: Arc<HandleSet>,
    ) -> Result<(), PipeflowError> {
        let runner = ChainRunner::new(self.clone(), input, handles);
        self.executor.submit(Box::new(move || runner.run()))
    }
}

/// Waits over handle sets, callable as `Pipeline::wait_for_all(..)` without
/// naming item types.
impl Pipeline<(), ()> {
    /// Blocks until every handle in the set is done.
    pub fn wait_for_all(handles: &HandleSet) {
        completion::wait_for_all(handles);
    }

    /// Blocks until every handle in the set is done or the timeout elapses.
    ///
    /// Returns true if every handle finished in time.
    pub fn wait_for_all_timeout(handles: &HandleSet, timeout: Duration) -> bool {
        handles.wait_for_all_timeout(timeout)
    }

    /// Blocks until any handle in the set is done and returns it.
    ///
    /// Returns `None` for an empty set.
    pub fn wait_for_one(handles: &HandleSet) -> Option<Arc<dyn Completion>> {
        completion::wait_for_one(handles)
    }
}
