//! Completion handles for asynchronous pipeline runs.
//!
//! Each asynchronous run produces a [`HandleSet`] with one
//! [`CompletionHandle`] per pipeline reachable from the root, including
//! pipelines nested inside fork and switch stages.

mod handle;
mod set;

pub use handle::{Completion, CompletionHandle};
pub use set::HandleSet;

use std::sync::Arc;

/// Blocks until every handle in the set is done.
pub fn wait_for_all(handles: &HandleSet) {
    handles.wait_for_all();
}

/// Blocks until any handle in the set is done and returns it.
///
/// Returns `None` if the set is empty.
pub fn wait_for_one(handles: &HandleSet) -> Option<Arc<dyn Completion>> {
    handles.wait_for_one()
}
