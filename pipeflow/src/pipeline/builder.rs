//! The pipeline value and its fluent stage builders.

use super::branch::{Branch, BranchTarget};
use super::chain::{Chain, Link, Source};
use crate::completion::{CompletionHandle, HandleSet};
use crate::core::{Item, PipelineId};
use crate::errors::PipeflowError;
use crate::executor::{ExecutionService, TokioExecutor};
use crate::policy::{ExceptionPolicy, LoggingPolicy};
use crate::stages::{
    Bound, BoundPipe, CollectPipe, Collector, DistinctPipe, FilterPipe, ForkPipe, MapPipe,
    Occurrence, PeekPipe, Pipe, SwitchPipe, TryMapPipe,
};
use std::cmp::Ordering;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;
use tracing::debug;

/// An immutable chain of stages turning `I` into `O`.
///
/// Every builder call returns a new pipeline with a fresh [`PipelineId`];
/// the receiver is left untouched and can be extended again. Pipelines
/// built from one another share their upstream stages, including the
/// state of stateful stages such as `distinct`.
///
/// Cloning keeps the id, so a clone is the same pipeline.
pub struct Pipeline<I, O> {
    pub(crate) name: Arc<str>,
    pub(crate) id: PipelineId,
    pub(crate) chain: Arc<dyn Chain<I, O>>,
    pub(crate) executor: Arc<dyn ExecutionService>,
    pub(crate) policy: Arc<dyn ExceptionPolicy>,
}

impl<I, O> Clone for Pipeline<I, O> {
    fn clone(&self) -> Self {
        Self {
            name: Arc::clone(&self.name),
            id: self.id,
            chain: Arc::clone(&self.chain),
            executor: Arc::clone(&self.executor),
            policy: Arc::clone(&self.policy),
        }
    }
}

impl<T: Item> Pipeline<T, T> {
    /// Starts an empty pipeline with its own execution service.
    ///
    /// The service's worker threads are only started on the first
    /// asynchronous run.
    #[must_use]
    pub fn start(name: impl Into<String>) -> Self {
        Self::start_with(name, Arc::new(TokioExecutor::new()))
    }

    /// Starts an empty pipeline running asynchronous traversals on the
    /// given execution service.
    #[must_use]
    pub fn start_with(name: impl Into<String>, executor: Arc<dyn ExecutionService>) -> Self {
        let name: String = name.into();
        let pipeline = Self {
            name: Arc::from(name),
            id: PipelineId::new(),
            chain: Arc::new(Source),
            executor,
            policy: Arc::new(LoggingPolicy::default()),
        };
        debug!(pipeline = %pipeline.name, pipeline_id = %pipeline.id, "Started pipeline");
        pipeline
    }
}

impl<I: Item, O: Item> Pipeline<I, O> {
    /// Returns the pipeline name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the pipeline id.
    #[must_use]
    pub const fn id(&self) -> PipelineId {
        self.id
    }

    /// Returns the number of stages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.chain.len()
    }

    /// Returns true if the pipeline has no stages.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the stage names in execution order.
    #[must_use]
    pub fn stage_names(&self) -> Vec<String> {
        let mut names = Vec::with_capacity(self.len());
        self.chain.stage_names(&mut names);
        names
    }

    /// Returns the execution service used for asynchronous runs.
    #[must_use]
    pub fn executor(&self) -> &Arc<dyn ExecutionService> {
        &self.executor
    }

    /// Returns the exception policy consulted when a stage fails.
    #[must_use]
    pub fn exception_policy(&self) -> &Arc<dyn ExceptionPolicy> {
        &self.policy
    }

    /// Replaces the exception policy.
    ///
    /// Takes effect for traversals started afterwards.
    pub fn set_exception_policy(&mut self, policy: impl ExceptionPolicy + 'static) {
        self.policy = Arc::new(policy);
    }

    /// Returns the pipeline with the given exception policy.
    #[must_use]
    pub fn with_exception_policy(mut self, policy: impl ExceptionPolicy + 'static) -> Self {
        self.set_exception_policy(policy);
        self
    }

    /// Returns the pipeline with an already shared exception policy.
    #[must_use]
    pub fn with_shared_policy(mut self, policy: Arc<dyn ExceptionPolicy>) -> Self {
        self.policy = policy;
        self
    }

    /// Appends a custom stage.
    #[must_use]
    pub fn connect<U, P>(&self, pipe: P) -> Pipeline<I, U>
    where
        U: Item,
        P: Pipe<O, U> + 'static,
    {
        self.append(Arc::new(pipe))
    }

    /// Appends an already shared stage.
    #[must_use]
    pub fn connect_shared<U: Item>(&self, pipe: Arc<dyn Pipe<O, U>>) -> Pipeline<I, U> {
        self.append(pipe)
    }

    /// Appends a stage applying `f` to every value.
    #[must_use]
    pub fn map<U, F>(&self, f: F) -> Pipeline<I, U>
    where
        U: Item,
        F: Fn(&O) -> U + Send + Sync + 'static,
    {
        self.connect(MapPipe::new(f))
    }

    /// Same as [`map`](Self::map).
    #[must_use]
    pub fn action<U, F>(&self, f: F) -> Pipeline<I, U>
    where
        U: Item,
        F: Fn(&O) -> U + Send + Sync + 'static,
    {
        self.map(f)
    }

    /// Appends a stage applying a fallible `f`; errors go to the
    /// exception policy.
    #[must_use]
    pub fn try_map<U, F>(&self, f: F) -> Pipeline<I, U>
    where
        U: Item,
        F: Fn(&O) -> anyhow::Result<U> + Send + Sync + 'static,
    {
        self.connect(TryMapPipe::new(f))
    }

    /// Appends a stage dropping values that do not match `predicate`.
    #[must_use]
    pub fn filter<P>(&self, predicate: P) -> Self
    where
        P: Fn(&O) -> bool + Send + Sync + 'static,
    {
        self.connect(FilterPipe::new(predicate))
    }

    /// Appends a stage dropping values below `bound`.
    #[must_use]
    pub fn min(&self, bound: O) -> Self
    where
        O: Ord,
    {
        self.connect(BoundPipe::min(bound))
    }

    /// Appends a stage dropping values below `bound` under `compare`.
    #[must_use]
    pub fn min_by<C>(&self, bound: O, compare: C) -> Self
    where
        C: Fn(&O, &O) -> Ordering + Send + Sync + 'static,
    {
        self.connect(BoundPipe::new(Bound::Min, bound, compare))
    }

    /// Appends a stage dropping values above `bound`.
    #[must_use]
    pub fn max(&self, bound: O) -> Self
    where
        O: Ord,
    {
        self.connect(BoundPipe::max(bound))
    }

    /// Appends a stage dropping values above `bound` under `compare`.
    #[must_use]
    pub fn max_by<C>(&self, bound: O, compare: C) -> Self
    where
        C: Fn(&O, &O) -> Ordering + Send + Sync + 'static,
    {
        self.connect(BoundPipe::new(Bound::Max, bound, compare))
    }

    /// Appends a stage forwarding only the first occurrence of each value.
    #[must_use]
    pub fn distinct(&self) -> Self
    where
        O: Eq + Hash,
    {
        self.distinct_by(O::clone)
    }

    /// Appends a stage forwarding only the first value for each key.
    #[must_use]
    pub fn distinct_by<K, F>(&self, key: F) -> Self
    where
        K: Eq + Hash + Send + Sync + 'static,
        F: Fn(&O) -> K + Send + Sync + 'static,
    {
        self.connect(DistinctPipe::new(Occurrence::First, key))
    }

    /// Appends a stage forwarding every occurrence of a value after the first.
    #[must_use]
    pub fn duplicates(&self) -> Self
    where
        O: Eq + Hash,
    {
        self.duplicates_by(O::clone)
    }

    /// Appends a stage forwarding every value whose key was already seen.
    #[must_use]
    pub fn duplicates_by<K, F>(&self, key: F) -> Self
    where
        K: Eq + Hash + Send + Sync + 'static,
        F: Fn(&O) -> K + Send + Sync + 'static,
    {
        self.connect(DistinctPipe::new(Occurrence::Repeat, key))
    }

    /// Appends a stage calling `f` on every value.
    #[must_use]
    pub fn peek<F>(&self, f: F) -> Self
    where
        F: Fn(&O) + Send + Sync + 'static,
    {
        self.connect(PeekPipe::new(f))
    }

    /// Appends a stage accumulating every value into `collector`.
    #[must_use]
    pub fn collect<A, R>(&self, collector: &Collector<O, A, R>) -> Self
    where
        A: Send + 'static,
        R: 'static,
    {
        self.connect(CollectPipe::new(collector))
    }

    /// Appends a terminal stage copying every value into each child.
    #[must_use]
    pub fn fork<B>(&self, children: impl IntoIterator<Item = B>) -> Self
    where
        B: Into<Branch<O>>,
    {
        self.connect(ForkPipe::new(children.into_iter().map(Into::into).collect()))
    }

    /// Appends a stage copying values matching `predicate` into `alternate`;
    /// every value continues down this pipeline.
    #[must_use]
    pub fn switch_if<P, B>(&self, predicate: P, alternate: B) -> Self
    where
        P: Fn(&O) -> bool + Send + Sync + 'static,
        B: Into<Branch<O>>,
    {
        self.connect(SwitchPipe::new(predicate, alternate.into()))
    }

    /// Wraps this pipeline as a child for [`fork`](Self::fork) or
    /// [`switch_if`](Self::switch_if).
    #[must_use]
    pub fn as_branch(&self) -> Branch<I> {
        Branch::new(Arc::new(self.clone()))
    }

    fn append<U: Item>(&self, pipe: Arc<dyn Pipe<O, U>>) -> Pipeline<I, U> {
        Pipeline {
            name: Arc::clone(&self.name),
            id: PipelineId::new(),
            chain: Arc::new(Link::new(Arc::clone(&self.chain), pipe)),
            executor: Arc::clone(&self.executor),
            policy: Arc::clone(&self.policy),
        }
    }
}

impl<I: Item, O: Item> BranchTarget<I> for Pipeline<I, O> {
    fn id(&self) -> PipelineId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn run_sync(&self, input: I) {
        let outcome = self.process_outcome(input);
        debug!(branch = %self.name, branch_id = %self.id, outcome = %outcome.kind(), "Branch finished");
    }

    fn submit(&self, input: I, handles: Arc<HandleSet>) -> Result<(), PipeflowError> {
        self.submit_runner(input, handles)
    }

    fn register_handles(&self, handles: &mut HandleSet) {
        let handle = CompletionHandle::<O>::new(self.id, self.name.as_ref());
        if handles.insert(Arc::new(handle)) {
            self.chain.register_handles(handles);
        }
    }

    fn release_handles(&self, handles: &HandleSet) {
        handles.release(self.id);
        self.chain.release_handles(handles);
    }
}

impl<I: Item, O: Item> From<Pipeline<I, O>> for Branch<I> {
    fn from(pipeline: Pipeline<I, O>) -> Self {
        Self::new(Arc::new(pipeline))
    }
}

impl<I: Item, O: Item> From<&Pipeline<I, O>> for Branch<I> {
    fn from(pipeline: &Pipeline<I, O>) -> Self {
        pipeline.as_branch()
    }
}

impl<I, O> fmt::Debug for Pipeline<I, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("name", &self.name)
            .field("id", &self.id)
            .field("stages", &self.chain.len())
            .finish_non_exhaustive()
    }
}
