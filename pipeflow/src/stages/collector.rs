//! Shared accumulators fed by collect stages.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

type Supplier<A> = Box<dyn Fn() -> A + Send + Sync>;
type Accumulator<T, A> = Box<dyn Fn(&mut A, &T) + Send + Sync>;
type Finisher<A, R> = Box<dyn Fn(&A) -> R + Send + Sync>;

struct CollectorState<T, A, R> {
    supplier: Supplier<A>,
    accumulator: Accumulator<T, A>,
    finisher: Finisher<A, R>,
    container: Mutex<A>,
}

/// A thread-safe accumulator shared between a collect stage and the caller.
///
/// Clones share the same container. Accumulation is serialized, so the
/// container never sees a lost update, but the order in which concurrent
/// traversals accumulate is unspecified.
pub struct Collector<T, A, R> {
    state: Arc<CollectorState<T, A, R>>,
}

impl<T, A, R> Clone for Collector<T, A, R> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl<T, A, R> Collector<T, A, R> {
    /// Creates a collector from a supplier of empty containers, an
    /// accumulation step, and a finishing step.
    pub fn new<S, F, G>(supplier: S, accumulator: F, finisher: G) -> Self
    where
        S: Fn() -> A + Send + Sync + 'static,
        F: Fn(&mut A, &T) + Send + Sync + 'static,
        G: Fn(&A) -> R + Send + Sync + 'static,
    {
        let container = Mutex::new(supplier());
        Self {
            state: Arc::new(CollectorState {
                supplier: Box::new(supplier),
                accumulator: Box::new(accumulator),
                finisher: Box::new(finisher),
                container,
            }),
        }
    }

    /// Adds one item to the container.
    pub fn accumulate(&self, item: &T) {
        let mut container = self.state.container.lock();
        (self.state.accumulator)(&mut container, item);
    }

    /// Finishes the current container without resetting it.
    #[must_use]
    pub fn result(&self) -> R {
        let container = self.state.container.lock();
        (self.state.finisher)(&container)
    }

    /// Finishes the current container and replaces it with a fresh one.
    pub fn take(&self) -> R {
        let fresh = (self.state.supplier)();
        let previous = std::mem::replace(&mut *self.state.container.lock(), fresh);
        (self.state.finisher)(&previous)
    }
}

impl<T: Clone + 'static> Collector<T, Vec<T>, Vec<T>> {
    /// Collects items into a vector.
    #[must_use]
    pub fn to_vec() -> Self {
        Self::new(Vec::new, |v: &mut Vec<T>, item: &T| v.push(item.clone()), Clone::clone)
    }
}

impl<T: 'static> Collector<T, usize, usize> {
    /// Counts items.
    #[must_use]
    pub fn counting() -> Self {
        Self::new(|| 0, |n: &mut usize, _: &T| *n += 1, |n: &usize| *n)
    }
}

impl<T: fmt::Display + 'static> Collector<T, Vec<String>, String> {
    /// Joins the display form of items with a separator.
    #[must_use]
    pub fn joining(separator: impl Into<String>) -> Self {
        let separator = separator.into();
        Self::new(
            Vec::new,
            |parts: &mut Vec<String>, item: &T| parts.push(item.to_string()),
            move |parts: &Vec<String>| parts.join(&separator),
        )
    }
}

impl<T, K> Collector<T, HashMap<K, Vec<T>>, HashMap<K, Vec<T>>>
where
    T: Clone + 'static,
    K: Eq + Hash + Clone + 'static,
{
    /// Groups items by a key.
    #[must_use]
    pub fn grouping_by<F>(key: F) -> Self
    where
        F: Fn(&T) -> K + Send + Sync + 'static,
    {
        Self::new(
            HashMap::new,
            move |groups: &mut HashMap<K, Vec<T>>, item: &T| {
                groups.entry(key(item)).or_default().push(item.clone());
            },
            Clone::clone,
        )
    }
}

impl<T: 'static> Collector<T, i64, i64> {
    /// Sums a numeric projection of items, saturating at the `i64` bounds.
    #[must_use]
    pub fn summing<F>(value: F) -> Self
    where
        F: Fn(&T) -> i64 + Send + Sync + 'static,
    {
        Self::new(
            || 0,
            move |sum: &mut i64, item: &T| *sum = sum.saturating_add(value(item)),
            |sum: &i64| *sum,
        )
    }
}

impl<T, A, R> fmt::Debug for Collector<T, A, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collector")
            .field("shared", &Arc::strong_count(&self.state))
            .finish_non_exhaustive()
    }
}
