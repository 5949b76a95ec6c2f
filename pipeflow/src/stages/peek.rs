//! Side-effect observation.

use super::{Pipe, PipeContext, PipeResult};

/// Calls a function on every input and forwards the input unchanged.
pub struct PeekPipe<F> {
    func: F,
}

impl<F> PeekPipe<F> {
    /// Creates a peek stage.
    pub const fn new(func: F) -> Self {
        Self { func }
    }
}

impl<T, F> Pipe<T, T> for PeekPipe<F>
where
    T: Clone,
    F: Fn(&T) + Send + Sync,
{
    fn process(&self, input: &T, _ctx: &PipeContext<'_>) -> PipeResult<T> {
        (self.func)(input);
        Ok(Some(input.clone()))
    }

    fn name(&self) -> &str {
        "peek"
    }
}
