//! Key-based deduplication.

use super::{Pipe, PipeContext, PipeResult};
use dashmap::DashSet;
use std::hash::Hash;

/// Which occurrence of a key is forwarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Occurrence {
    /// Forward the first occurrence of each key.
    First,
    /// Forward every occurrence after the first.
    Repeat,
}

/// Tracks the keys it has seen and forwards inputs by occurrence.
///
/// The seen set belongs to the stage and lives as long as the pipeline,
/// across every traversal. Concurrent traversals with the same key see
/// exactly one of them as first.
pub struct DistinctPipe<K, F>
where
    K: Eq + Hash,
{
    key: F,
    seen: DashSet<K>,
    occurrence: Occurrence,
}

impl<K, F> DistinctPipe<K, F>
where
    K: Eq + Hash,
{
    /// Creates a deduplicating stage keyed by `key`.
    pub fn new(occurrence: Occurrence, key: F) -> Self {
        Self {
            key,
            seen: DashSet::new(),
            occurrence,
        }
    }

    /// Returns the number of distinct keys seen so far.
    pub fn seen(&self) -> usize {
        self.seen.len()
    }
}

impl<T, K, F> Pipe<T, T> for DistinctPipe<K, F>
where
    T: Clone,
    K: Eq + Hash + Send + Sync,
    F: Fn(&T) -> K + Send + Sync,
{
    fn process(&self, input: &T, _ctx: &PipeContext<'_>) -> PipeResult<T> {
        let first = self.seen.insert((self.key)(input));
        let keep = match self.occurrence {
            Occurrence::First => first,
            Occurrence::Repeat => !first,
        };
        Ok(keep.then(|| input.clone()))
    }

    fn name(&self) -> &str {
        match self.occurrence {
            Occurrence::First => "distinct",
            Occurrence::Repeat => "duplicates",
        }
    }
}
