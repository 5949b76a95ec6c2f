//! Execution service configuration.

use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use tracing::warn;

/// Environment variable overriding the worker thread count.
pub const WORKER_THREADS_ENV: &str = "PIPEFLOW_WORKER_THREADS";

/// Environment variable overriding the worker thread name.
pub const THREAD_NAME_ENV: &str = "PIPEFLOW_THREAD_NAME";

/// Configuration for the default execution service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Number of worker threads.
    #[serde(default = "default_worker_threads")]
    pub worker_threads: usize,
    /// Name given to worker threads.
    #[serde(default = "default_thread_name")]
    pub thread_name: String,
    /// Stack size of worker threads in bytes.
    #[serde(default)]
    pub thread_stack_size: Option<usize>,
    /// Upper bound on threads running chain runners at once.
    #[serde(default = "default_max_blocking_threads")]
    pub max_blocking_threads: usize,
}

const fn default_max_blocking_threads() -> usize {
    512
}

fn default_worker_threads() -> usize {
    std::thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1)
}

fn default_thread_name() -> String {
    "pipeflow-worker".to_string()
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            worker_threads: default_worker_threads(),
            thread_name: default_thread_name(),
            thread_stack_size: None,
            max_blocking_threads: default_max_blocking_threads(),
        }
    }
}

impl ExecutorConfig {
    /// Creates a configuration sized to the available cores.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a configuration from the defaults overridden by
    /// `PIPEFLOW_WORKER_THREADS` and `PIPEFLOW_THREAD_NAME`.
    #[must_use]
    pub fn from_env() -> Self {
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    /// Applies overrides looked up by environment variable name.
    ///
    /// Unparseable or zero thread counts are ignored.
    #[must_use]
    pub fn with_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(WORKER_THREADS_ENV) {
            match raw.trim().parse::<usize>() {
                Ok(threads) if threads > 0 => self.worker_threads = threads,
                _ => warn!(
                    variable = WORKER_THREADS_ENV,
                    value = %raw,
                    "Ignoring invalid worker thread count"
                ),
            }
        }
        if let Some(name) = lookup(THREAD_NAME_ENV) {
            if !name.trim().is_empty() {
                self.thread_name = name;
            }
        }
        self
    }

    /// Sets the worker thread count.
    #[must_use]
    pub fn with_worker_threads(mut self, threads: usize) -> Self {
        self.worker_threads = threads.max(1);
        self
    }

    /// Sets the worker thread name.
    #[must_use]
    pub fn with_thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }

    /// Sets the bound on concurrently running chain runners.
    #[must_use]
    pub fn with_max_blocking_threads(mut self, threads: usize) -> Self {
        self.max_blocking_threads = threads.max(1);
        self
    }

    /// Sets the worker thread stack size.
    #[must_use]
    pub fn with_thread_stack_size(mut self, bytes: usize) -> Self {
        self.thread_stack_size = Some(bytes);
        self
    }
}
