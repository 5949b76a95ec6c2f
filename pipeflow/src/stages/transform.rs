//! Value transforms.

use super::{Pipe, PipeContext, PipeResult};

/// Applies a function to every input.
pub struct MapPipe<F> {
    func: F,
}

impl<F> MapPipe<F> {
    /// Creates a map stage.
    pub const fn new(func: F) -> Self {
        Self { func }
    }
}

impl<I, O, F> Pipe<I, O> for MapPipe<F>
where
    F: Fn(&I) -> O + Send + Sync,
{
    fn process(&self, input: &I, _ctx: &PipeContext<'_>) -> PipeResult<O> {
        Ok(Some((self.func)(input)))
    }

    fn name(&self) -> &str {
        "map"
    }
}

/// Applies a fallible function to every input.
///
/// An `Err` is a stage failure and goes to the exception policy.
pub struct TryMapPipe<F> {
    func: F,
}

impl<F> TryMapPipe<F> {
    /// Creates a fallible map stage.
    pub const fn new(func: F) -> Self {
        Self { func }
    }
}

impl<I, O, F> Pipe<I, O> for TryMapPipe<F>
where
    F: Fn(&I) -> anyhow::Result<O> + Send + Sync,
{
    fn process(&self, input: &I, _ctx: &PipeContext<'_>) -> PipeResult<O> {
        (self.func)(input).map(Some)
    }

    fn name(&self) -> &str {
        "try_map"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::test_support::with_ctx;
    use anyhow::bail;

    #[test]
    fn test_map_applies_function() {
        let pipe = MapPipe::new(|s: &String| s.len());
        let out = with_ctx(|ctx| pipe.process(&"four".to_string(), ctx)).unwrap();
        assert_eq!(out, Some(4));
    }

    #[test]
    fn test_try_map_propagates_error() {
        let pipe = TryMapPipe::new(|x: &i32| {
            if *x < 0 {
                bail!("negative input {x}");
            }
            Ok(x * 10)
        });

        assert_eq!(with_ctx(|ctx| pipe.process(&2, ctx)).unwrap(), Some(20));
        let err = with_ctx(|ctx| pipe.process(&-1, ctx)).unwrap_err();
        assert_eq!(err.to_string(), "negative input -1");
    }

    #[test]
    fn test_names() {
        assert_eq!(Pipe::<i32, i32>::name(&MapPipe::new(|x: &i32| *x)), "map");
        assert_eq!(
            Pipe::<i32, i32>::name(&TryMapPipe::new(|x: &i32| Ok(*x))),
            "try_map"
        );
    }
}
