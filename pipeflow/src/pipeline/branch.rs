//! Type-erased child pipelines for fork and switch.

use crate::completion::HandleSet;
use crate::core::PipelineId;
use crate::errors::PipeflowError;
use std::fmt;
use std::sync::Arc;

/// What a fork or switch needs from a child pipeline, independent of the
/// child's output type.
pub(crate) trait BranchTarget<T>: Send + Sync {
    fn id(&self) -> PipelineId;

    fn name(&self) -> &str;

    /// Traverses the child inline, absorbing its outcome.
    fn run_sync(&self, input: T);

    /// Schedules a traversal of the child on its own execution service.
    fn submit(&self, input: T, handles: Arc<HandleSet>) -> Result<(), PipeflowError>;

    /// Adds the child's handle and the handles nested below it.
    fn register_handles(&self, handles: &mut HandleSet);

    /// Releases the child's handle and the handles nested below it.
    fn release_handles(&self, handles: &HandleSet);
}

/// A child pipeline accepting `T`, whatever it produces.
///
/// Built from a [`Pipeline`](super::Pipeline) with `into()`.
pub struct Branch<T> {
    target: Arc<dyn BranchTarget<T>>,
}

impl<T> Clone for Branch<T> {
    fn clone(&self) -> Self {
        Self {
            target: Arc::clone(&self.target),
        }
    }
}

impl<T> Branch<T> {
    pub(crate) fn new(target: Arc<dyn BranchTarget<T>>) -> Self {
        Self { target }
    }

    /// Returns the id of the child pipeline.
    #[must_use]
    pub fn id(&self) -> PipelineId {
        self.target.id()
    }

    /// Returns the name of the child pipeline.
    #[must_use]
    pub fn name(&self) -> &str {
        self.target.name()
    }

    pub(crate) fn run_sync(&self, input: T) {
        self.target.run_sync(input);
    }

    pub(crate) fn submit(&self, input: T, handles: Arc<HandleSet>) -> Result<(), PipeflowError> {
        self.target.submit(input, handles)
    }

    pub(crate) fn register_handles(&self, handles: &mut HandleSet) {
        self.target.register_handles(handles);
    }

    pub(crate) fn release_handles(&self, handles: &HandleSet) {
        self.target.release_handles(handles);
    }
}

impl<T> fmt::Debug for Branch<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Branch")
            .field("name", &self.name())
            .field("id", &self.id())
            .finish()
    }
}
