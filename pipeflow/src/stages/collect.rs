//! Feeding a shared collector.

use super::{Collector, Pipe, PipeContext, PipeResult};

/// Accumulates every input into a [`Collector`] and forwards it.
pub struct CollectPipe<T, A, R> {
    collector: Collector<T, A, R>,
}

impl<T, A, R> CollectPipe<T, A, R> {
    /// Creates a collect stage sharing the given collector's container.
    #[must_use]
    pub fn new(collector: &Collector<T, A, R>) -> Self {
        Self {
            collector: collector.clone(),
        }
    }
}

impl<T, A, R> Pipe<T, T> for CollectPipe<T, A, R>
where
    T: Clone,
    A: Send,
{
    fn process(&self, input: &T, _ctx: &PipeContext<'_>) -> PipeResult<T> {
        self.collector.accumulate(input);
        Ok(Some(input.clone()))
    }

    fn name(&self) -> &str {
        "collect"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::test_support::with_ctx;

    #[test]
    fn test_collect_forwards_and_accumulates() {
        let collector = Collector::to_vec();
        let pipe = CollectPipe::new(&collector);

        assert_eq!(with_ctx(|ctx| pipe.process(&"a", ctx)).unwrap(), Some("a"));
        assert_eq!(with_ctx(|ctx| pipe.process(&"b", ctx)).unwrap(), Some("b"));
        assert_eq!(collector.result(), vec!["a", "b"]);
    }
}
