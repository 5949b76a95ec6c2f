//! Handle sets and the waits over them.

use super::{Completion, CompletionHandle};
use crate::core::{Item, Outcome, PipelineId};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::warn;

/// The completion handles of every pipeline reachable from one
/// asynchronous run, deduplicated by pipeline id.
#[derive(Debug, Clone, Default)]
pub struct HandleSet {
    handles: Vec<Arc<dyn Completion>>,
}

impl HandleSet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a handle unless one for the same pipeline id is already present.
    ///
    /// Returns true if the handle was added.
    pub fn insert(&mut self, handle: Arc<dyn Completion>) -> bool {
        if self.contains(handle.pipeline_id()) {
            return false;
        }
        self.handles.push(handle);
        true
    }

    /// Returns the number of handles.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// Returns true if the set holds no handles.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Iterates over the handles in discovery order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Completion>> {
        self.handles.iter()
    }

    /// Returns true if a handle for the pipeline id is present.
    #[must_use]
    pub fn contains(&self, id: PipelineId) -> bool {
        self.handles.iter().any(|h| h.pipeline_id() == id)
    }

    /// Returns the handle tracking the given pipeline id.
    #[must_use]
    pub fn get(&self, id: PipelineId) -> Option<&Arc<dyn Completion>> {
        self.handles.iter().find(|h| h.pipeline_id() == id)
    }

    /// Returns the typed handle tracking the given pipeline id.
    ///
    /// Returns `None` if no handle matches or its output type is not `T`.
    #[must_use]
    pub fn handle<T: Item>(&self, id: PipelineId) -> Option<CompletionHandle<T>> {
        self.get(id)
            .and_then(|h| h.as_any().downcast_ref::<CompletionHandle<T>>())
            .cloned()
    }

    /// Returns every handle tagged with the given pipeline name.
    ///
    /// Names are not unique, so this may return several handles.
    #[must_use]
    pub fn by_identifier(&self, identifier: &str) -> Vec<Arc<dyn Completion>> {
        self.handles
            .iter()
            .filter(|h| h.identifier() == identifier)
            .cloned()
            .collect()
    }

    /// Completes the handle tracking `id` with the traversal outcome.
    ///
    /// Returns true if a pending handle was written.
    pub fn complete<T: Item>(&self, id: PipelineId, outcome: Outcome<T>) -> bool {
        match self.get(id) {
            Some(handle) => match handle.as_any().downcast_ref::<CompletionHandle<T>>() {
                Some(typed) => typed.complete(outcome),
                None => {
                    warn!(
                        pipeline_id = %id,
                        identifier = handle.identifier(),
                        "Completion handle has a different output type"
                    );
                    false
                }
            },
            None => false,
        }
    }

    /// Marks the handle tracking `id` as done with no value.
    ///
    /// Returns true if a pending handle was released.
    pub fn release(&self, id: PipelineId) -> bool {
        self.get(id).is_some_and(|h| h.release())
    }

    /// Returns true if every handle is done.
    #[must_use]
    pub fn is_all_done(&self) -> bool {
        self.handles.iter().all(|h| h.is_done())
    }

    /// Returns the number of handles not yet done.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.handles.iter().filter(|h| !h.is_done()).count()
    }

    /// Blocks until every handle is done.
    pub fn wait_for_all(&self) {
        for handle in &self.handles {
            handle.wait_done();
        }
    }

    /// Blocks until every handle is done or the timeout elapses.
    ///
    /// Returns true if every handle finished in time.
    pub fn wait_for_all_timeout(&self, timeout: Duration) -> bool {
        let Some(deadline) = Instant::now().checked_add(timeout) else {
            self.wait_for_all();
            return true;
        };
        self.handles.iter().all(|handle| {
            let remaining = deadline.saturating_duration_since(Instant::now());
            handle.wait_done_timeout(remaining)
        })
    }

    /// Blocks until any handle is done and returns it.
    ///
    /// Every handle publishes its completion to one fan-in channel, so the
    /// first finisher is found without polling. Returns `None` for an empty
    /// set. Must not be called from inside an async task; use
    /// [`first_completed`](Self::first_completed) there.
    pub fn wait_for_one(&self) -> Option<Arc<dyn Completion>> {
        let mut receiver = self.fan_in()?;
        let id = receiver.blocking_recv()?;
        self.get(id).cloned()
    }

    /// Waits asynchronously until every handle is done.
    pub async fn all_completed(&self) {
        futures::future::join_all(self.handles.iter().map(|h| h.done())).await;
    }

    /// Waits asynchronously until any handle is done and returns it.
    pub async fn first_completed(&self) -> Option<Arc<dyn Completion>> {
        let mut receiver = self.fan_in()?;
        let id = receiver.recv().await?;
        self.get(id).cloned()
    }

    fn fan_in(&self) -> Option<mpsc::UnboundedReceiver<PipelineId>> {
        if self.handles.is_empty() {
            return None;
        }
        let (sender, receiver) = mpsc::unbounded_channel();
        for handle in &self.handles {
            handle.subscribe(sender.clone());
        }
        Some(receiver)
    }
}

impl<'a> IntoIterator for &'a HandleSet {
    type Item = &'a Arc<dyn Completion>;
    type IntoIter = std::slice::Iter<'a, Arc<dyn Completion>>;

    fn into_iter(self) -> Self::IntoIter {
        self.handles.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::OutcomeKind;
    use std::thread;

    fn typed(name: &str) -> CompletionHandle<i32> {
        CompletionHandle::new(PipelineId::new(), name)
    }

    fn set_of(handles: &[&CompletionHandle<i32>]) -> HandleSet {
        let mut set = HandleSet::new();
        for h in handles {
            set.insert(Arc::new((*h).clone()));
        }
        set
    }

    #[test]
    fn test_insert_dedupes_by_id() {
        let a = typed("a");
        let mut set = HandleSet::new();
        assert!(set.insert(Arc::new(a.clone())));
        assert!(!set.insert(Arc::new(a.clone())));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_same_name_different_ids_both_kept() {
        let a = typed("same");
        let b = typed("same");
        let set = set_of(&[&a, &b]);

        assert_eq!(set.len(), 2);
        assert_eq!(set.by_identifier("same").len(), 2);
        assert!(set.by_identifier("other").is_empty());
    }

    #[test]
    fn test_complete_by_id_only_touches_match() {
        let a = typed("same");
        let b = typed("same");
        let set = set_of(&[&a, &b]);

        assert!(set.complete(a.pipeline_id(), Outcome::Completed(1)));
        assert!(a.is_done());
        assert!(!b.is_done());
        assert_eq!(set.pending(), 1);
    }

    #[test]
    fn test_complete_wrong_type_is_ignored() {
        let a = typed("a");
        let set = set_of(&[&a]);

        assert!(!set.complete(a.pipeline_id(), Outcome::Completed("text".to_string())));
        assert!(!a.is_done());
    }

    #[test]
    fn test_typed_lookup() {
        let a = typed("a");
        let set = set_of(&[&a]);

        assert!(set.handle::<i32>(a.pipeline_id()).is_some());
        assert!(set.handle::<String>(a.pipeline_id()).is_none());
        assert!(set.handle::<i32>(PipelineId::new()).is_none());
    }

    #[test]
    fn test_release_marks_dropped() {
        let a = typed("a");
        let set = set_of(&[&a]);

        assert!(set.release(a.pipeline_id()));
        assert_eq!(Completion::kind(&a), Some(OutcomeKind::Dropped));
        assert!(set.is_all_done());
    }

    #[test]
    fn test_wait_for_all_timeout() {
        let a = typed("a");
        let b = typed("b");
        let set = set_of(&[&a, &b]);
        a.complete(Outcome::Completed(1));

        assert!(!set.wait_for_all_timeout(Duration::from_millis(20)));
        b.complete(Outcome::Dropped);
        assert!(set.wait_for_all_timeout(Duration::from_millis(20)));
    }

    #[test]
    fn test_wait_for_all_timeout_with_unbounded_duration() {
        let a = typed("a");
        let set = set_of(&[&a]);
        let writer = a.clone();
        let join = thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            writer.complete(Outcome::Completed(1));
        });

        assert!(set.wait_for_all_timeout(Duration::MAX));
        join.join().unwrap();
    }

    #[test]
    fn test_repeated_wait_for_one_keeps_pending_handles_lean() {
        let pending = typed("pending");
        let done = typed("done");
        done.complete(Outcome::Dropped);
        let set = set_of(&[&pending, &done]);

        for _ in 0..10 {
            assert_eq!(set.wait_for_one().unwrap().pipeline_id(), done.pipeline_id());
        }
        assert!(pending.subscriber_count() <= 1);
    }

    #[test]
    fn test_wait_for_all_across_threads() {
        let a = typed("a");
        let b = typed("b");
        let set = set_of(&[&a, &b]);

        let (wa, wb) = (a.clone(), b.clone());
        let join = thread::spawn(move || {
            wb.complete(Outcome::Completed(2));
            thread::sleep(Duration::from_millis(10));
            wa.complete(Outcome::Completed(1));
        });

        set.wait_for_all();
        assert!(set.is_all_done());
        join.join().unwrap();
    }

    #[test]
    fn test_wait_for_one_returns_first_finisher() {
        let slow = typed("slow");
        let fast = typed("fast");
        let set = set_of(&[&slow, &fast]);

        let writer = fast.clone();
        let join = thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            writer.complete(Outcome::Completed(9));
        });

        let first = set.wait_for_one().unwrap();
        assert_eq!(first.pipeline_id(), fast.pipeline_id());
        assert!(!slow.is_done());
        join.join().unwrap();
    }

    #[test]
    fn test_wait_for_one_on_empty_set() {
        assert!(HandleSet::new().wait_for_one().is_none());
    }

    #[tokio::test]
    async fn test_async_waits() {
        let a = typed("a");
        let b = typed("b");
        let set = set_of(&[&a, &b]);

        let (wa, wb) = (a.clone(), b.clone());
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            wb.complete(Outcome::Completed(2));
            tokio::time::sleep(Duration::from_millis(5)).await;
            wa.complete(Outcome::Completed(1));
        });

        let first = set.first_completed().await.unwrap();
        assert_eq!(first.pipeline_id(), b.pipeline_id());

        set.all_completed().await;
        assert!(set.is_all_done());
    }
}
