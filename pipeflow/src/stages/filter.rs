//! Predicate and bound filters.

use super::{Pipe, PipeContext, PipeResult};
use std::cmp::Ordering;

/// Forwards inputs matching a predicate and drops the rest.
pub struct FilterPipe<P> {
    predicate: P,
}

impl<P> FilterPipe<P> {
    /// Creates a filter stage.
    pub const fn new(predicate: P) -> Self {
        Self { predicate }
    }
}

impl<T, P> Pipe<T, T> for FilterPipe<P>
where
    T: Clone,
    P: Fn(&T) -> bool + Send + Sync,
{
    fn process(&self, input: &T, _ctx: &PipeContext<'_>) -> PipeResult<T> {
        Ok((self.predicate)(input).then(|| input.clone()))
    }

    fn name(&self) -> &str {
        "filter"
    }
}

/// Which side of a bound is kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bound {
    /// Keep inputs at or above the bound.
    Min,
    /// Keep inputs at or below the bound.
    Max,
}

/// Forwards inputs on the kept side of an inclusive bound.
pub struct BoundPipe<T, C> {
    bound: T,
    compare: C,
    kind: Bound,
}

impl<T, C> BoundPipe<T, C>
where
    C: Fn(&T, &T) -> Ordering,
{
    /// Creates a bound stage with a custom comparator.
    pub const fn new(kind: Bound, bound: T, compare: C) -> Self {
        Self {
            bound,
            compare,
            kind,
        }
    }
}

impl<T: Ord> BoundPipe<T, fn(&T, &T) -> Ordering> {
    /// Keeps inputs `>= bound` in natural order.
    pub fn min(bound: T) -> Self {
        Self::new(Bound::Min, bound, Ord::cmp)
    }

    /// Keeps inputs `<= bound` in natural order.
    pub fn max(bound: T) -> Self {
        Self::new(Bound::Max, bound, Ord::cmp)
    }
}

impl<T, C> Pipe<T, T> for BoundPipe<T, C>
where
    T: Clone + Send + Sync,
    C: Fn(&T, &T) -> Ordering + Send + Sync,
{
    fn process(&self, input: &T, _ctx: &PipeContext<'_>) -> PipeResult<T> {
        let ordering = (self.compare)(input, &self.bound);
        let keep = match self.kind {
            Bound::Min => ordering != Ordering::Less,
            Bound::Max => ordering != Ordering::Greater,
        };
        Ok(keep.then(|| input.clone()))
    }

    fn name(&self) -> &str {
        match self.kind {
            Bound::Min => "min",
            Bound::Max => "max",
        }
    }
}
