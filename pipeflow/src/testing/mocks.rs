//! Mock pipes for testing.
//!
//! Each mock shares its counters between clones, so a test can keep one
//! clone and connect the other.

use crate::stages::{Pipe, PipeContext, PipeResult};
use anyhow::anyhow;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Forwards every input unchanged and records it.
#[derive(Debug)]
pub struct RecordingPipe<T> {
    inputs: Arc<Mutex<Vec<T>>>,
}

impl<T> Clone for RecordingPipe<T> {
    fn clone(&self) -> Self {
        Self {
            inputs: Arc::clone(&self.inputs),
        }
    }
}

impl<T> Default for RecordingPipe<T> {
    fn default() -> Self {
        Self {
            inputs: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl<T: Clone> RecordingPipe<T> {
    /// Creates a new recording pipe.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the recorded inputs.
    #[must_use]
    pub fn inputs(&self) -> Vec<T> {
        self.inputs.lock().clone()
    }

    /// Returns the number of calls.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.inputs.lock().len()
    }

    /// Clears recorded inputs.
    pub fn clear(&self) {
        self.inputs.lock().clear();
    }
}

impl<T: Clone + Send> Pipe<T, T> for RecordingPipe<T> {
    fn process(&self, input: &T, _ctx: &PipeContext<'_>) -> PipeResult<T> {
        self.inputs.lock().push(input.clone());
        Ok(Some(input.clone()))
    }

    fn name(&self) -> &str {
        "recording"
    }
}

/// Fails on every call.
#[derive(Debug, Clone)]
pub struct FailingPipe {
    error: String,
    calls: Arc<AtomicUsize>,
}

impl FailingPipe {
    /// Creates a pipe failing with the given message.
    #[must_use]
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Returns the number of calls.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl<T> Pipe<T, T> for FailingPipe {
    fn process(&self, _input: &T, _ctx: &PipeContext<'_>) -> PipeResult<T> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(anyhow!("{}", self.error))
    }

    fn name(&self) -> &str {
        "failing"
    }
}

/// Fails a fixed number of times, then forwards inputs unchanged.
#[derive(Debug, Clone)]
pub struct FlakyPipe {
    failures: usize,
    calls: Arc<AtomicUsize>,
}

impl FlakyPipe {
    /// Creates a pipe failing its first `failures` calls.
    #[must_use]
    pub fn new(failures: usize) -> Self {
        Self {
            failures,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Returns the number of calls.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl<T: Clone> Pipe<T, T> for FlakyPipe {
    fn process(&self, input: &T, _ctx: &PipeContext<'_>) -> PipeResult<T> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures {
            return Err(anyhow!("transient failure {}", call + 1));
        }
        Ok(Some(input.clone()))
    }

    fn name(&self) -> &str {
        "flaky"
    }
}

/// Sleeps before forwarding inputs unchanged.
#[derive(Debug, Clone)]
pub struct SlowPipe {
    delay: Duration,
}

impl SlowPipe {
    /// Creates a new slow pipe.
    #[must_use]
    pub const fn new(delay: Duration) -> Self {
        Self { delay }
    }

    /// Creates a slow pipe with delay in milliseconds.
    #[must_use]
    pub const fn with_delay_ms(ms: u64) -> Self {
        Self::new(Duration::from_millis(ms))
    }
}

impl<T: Clone> Pipe<T, T> for SlowPipe {
    fn process(&self, input: &T, _ctx: &PipeContext<'_>) -> PipeResult<T> {
        std::thread::sleep(self.delay);
        Ok(Some(input.clone()))
    }

    fn name(&self) -> &str {
        "slow"
    }
}
