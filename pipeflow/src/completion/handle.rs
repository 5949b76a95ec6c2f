//! Single-assignment completion handles.

use crate::core::{Item, Outcome, OutcomeKind, PipelineId};
use crate::errors::PipeflowError;
use futures::future::BoxFuture;
use parking_lot::{Condvar, Mutex};
use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Notify};

/// Type-erased view of a completion handle.
///
/// A handle set mixes handles of every pipeline reachable from a root,
/// each with its own output type; this trait is what they share.
pub trait Completion: Send + Sync + fmt::Debug {
    /// Returns the id of the pipeline whose traversal this handle tracks.
    fn pipeline_id(&self) -> PipelineId;

    /// Returns the pipeline name the handle was tagged with.
    fn identifier(&self) -> &str;

    /// Returns true once the slot has been written.
    fn is_done(&self) -> bool;

    /// Returns the kind of the stored outcome, if any.
    fn kind(&self) -> Option<OutcomeKind>;

    /// Blocks until the slot has been written.
    fn wait_done(&self);

    /// Blocks until the slot has been written or the timeout elapses.
    ///
    /// Returns true if the handle is done.
    fn wait_done_timeout(&self, timeout: Duration) -> bool;

    /// Resolves once the slot has been written.
    fn done(&self) -> BoxFuture<'_, ()>;

    /// Completes the handle with [`Outcome::Dropped`].
    ///
    /// Returns false if the handle was already complete.
    fn release(&self) -> bool;

    /// Registers a fan-in subscriber that receives the pipeline id once
    /// the handle completes (immediately if it already has).
    fn subscribe(&self, subscriber: mpsc::UnboundedSender<PipelineId>);

    /// Cancellation is not supported; always returns false.
    fn cancel(&self) -> bool {
        false
    }

    /// Returns self as `Any` for typed lookup.
    fn as_any(&self) -> &dyn Any;
}

struct SlotState<T> {
    outcome: Option<Outcome<T>>,
    subscribers: Vec<mpsc::UnboundedSender<PipelineId>>,
}

struct Slot<T> {
    pipeline_id: PipelineId,
    identifier: String,
    done: AtomicBool,
    state: Mutex<SlotState<T>>,
    ready: Condvar,
    notify: Notify,
}

/// A thread-safe, single-assignment slot holding the outcome of one
/// traversal of a pipeline.
///
/// Clones share the same slot.
pub struct CompletionHandle<T> {
    slot: Arc<Slot<T>>,
}

impl<T> Clone for CompletionHandle<T> {
    fn clone(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
        }
    }
}

impl<T: Item> CompletionHandle<T> {
    /// Creates an empty handle for the given pipeline.
    #[must_use]
    pub fn new(pipeline_id: PipelineId, identifier: impl Into<String>) -> Self {
        Self {
            slot: Arc::new(Slot {
                pipeline_id,
                identifier: identifier.into(),
                done: AtomicBool::new(false),
                state: Mutex::new(SlotState {
                    outcome: None,
                    subscribers: Vec::new(),
                }),
                ready: Condvar::new(),
                notify: Notify::new(),
            }),
        }
    }

    /// Returns the id of the tracked pipeline.
    #[must_use]
    pub fn pipeline_id(&self) -> PipelineId {
        self.slot.pipeline_id
    }

    /// Returns the identifier (pipeline name) of this handle.
    #[must_use]
    pub fn identifier(&self) -> &str {
        &self.slot.identifier
    }

    /// Returns true once the outcome has been set.
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.slot.done.load(Ordering::Acquire)
    }

    /// Returns false; cancellation is never honored.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        false
    }

    /// Cancellation is not supported. Use [`get_timeout`](Self::get_timeout)
    /// for bounded waiting.
    pub const fn cancel(&self) -> bool {
        false
    }

    /// Writes the outcome and wakes every waiter.
    ///
    /// The first write wins; returns false if the slot was already set.
    pub fn complete(&self, outcome: Outcome<T>) -> bool {
        let subscribers = {
            let mut state = self.slot.state.lock();
            if state.outcome.is_some() {
                return false;
            }
            state.outcome = Some(outcome);
            self.slot.done.store(true, Ordering::Release);
            std::mem::take(&mut state.subscribers)
        };

        self.slot.ready.notify_all();
        self.slot.notify.notify_waiters();
        for subscriber in subscribers {
            let _ = subscriber.send(self.slot.pipeline_id);
        }
        true
    }

    /// Returns the outcome without blocking, if it has been set.
    #[must_use]
    pub fn get(&self) -> Option<Outcome<T>> {
        self.slot.state.lock().outcome.clone()
    }

    /// Blocks until the outcome is set.
    ///
    /// Must not be called from inside an async task; use
    /// [`completed`](Self::completed) there.
    pub fn wait(&self) -> Outcome<T> {
        let mut state = self.slot.state.lock();
        loop {
            if let Some(outcome) = state.outcome.as_ref() {
                return outcome.clone();
            }
            self.slot.ready.wait(&mut state);
        }
    }

    /// Blocks until the outcome is set or the timeout elapses.
    ///
    /// # Errors
    ///
    /// Returns [`PipeflowError::WaitTimeout`] if no outcome arrived in time.
    pub fn get_timeout(&self, timeout: Duration) -> Result<Outcome<T>, PipeflowError> {
        // A deadline past the clock's range never elapses.
        let Some(deadline) = Instant::now().checked_add(timeout) else {
            return Ok(self.wait());
        };
        let mut state = self.slot.state.lock();
        loop {
            if let Some(outcome) = state.outcome.as_ref() {
                return Ok(outcome.clone());
            }
            if self.slot.ready.wait_until(&mut state, deadline).timed_out() {
                return state
                    .outcome
                    .clone()
                    .ok_or_else(|| PipeflowError::wait_timeout(&self.slot.identifier, timeout));
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn subscriber_count(&self) -> usize {
        self.slot.state.lock().subscribers.len()
    }

    /// Waits asynchronously for the outcome.
    pub async fn completed(&self) -> Outcome<T> {
        loop {
            let notified = self.slot.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(outcome) = self.get() {
                return outcome;
            }
            notified.await;
        }
    }
}

impl<T: Item> Completion for CompletionHandle<T> {
    fn pipeline_id(&self) -> PipelineId {
        self.slot.pipeline_id
    }

    fn identifier(&self) -> &str {
        &self.slot.identifier
    }

    fn is_done(&self) -> bool {
        Self::is_done(self)
    }

    fn kind(&self) -> Option<OutcomeKind> {
        self.slot.state.lock().outcome.as_ref().map(Outcome::kind)
    }

    fn wait_done(&self) {
        let _ = self.wait();
    }

    fn wait_done_timeout(&self, timeout: Duration) -> bool {
        self.get_timeout(timeout).is_ok()
    }

    fn done(&self) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            let _ = self.completed().await;
        })
    }

    fn release(&self) -> bool {
        self.complete(Outcome::Dropped)
    }

    fn subscribe(&self, subscriber: mpsc::UnboundedSender<PipelineId>) {
        let mut state = self.slot.state.lock();
        if state.outcome.is_some() {
            let _ = subscriber.send(self.slot.pipeline_id);
        } else {
            state.subscribers.retain(|s| !s.is_closed());
            state.subscribers.push(subscriber);
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl<T> fmt::Debug for CompletionHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompletionHandle")
            .field("pipeline_id", &self.slot.pipeline_id)
            .field("identifier", &self.slot.identifier)
            .field("done", &self.slot.done.load(Ordering::Acquire))
            .finish()
    }
}
