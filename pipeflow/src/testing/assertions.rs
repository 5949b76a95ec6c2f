//! Test assertions for traversal outcomes.

use crate::core::{Outcome, OutcomeKind};
use crate::errors::StageFailure;
use std::fmt::Debug;

/// Asserts that the outcome completed with `expected`.
pub fn assert_completed<T: PartialEq + Debug>(outcome: &Outcome<T>, expected: &T) {
    assert_eq!(
        outcome.value(),
        Some(expected),
        "Expected completed({expected:?}), got {outcome:?}"
    );
}

/// Asserts that a stage dropped the item.
pub fn assert_dropped<T: Debug>(outcome: &Outcome<T>) {
    assert!(outcome.is_dropped(), "Expected dropped, got {outcome:?}");
}

/// Asserts that the item was abandoned and returns the failure record.
pub fn assert_abandoned<T: Debug>(outcome: &Outcome<T>) -> &StageFailure {
    match outcome.failure() {
        Some(failure) => failure,
        None => panic!("Expected abandoned, got {outcome:?}"),
    }
}

/// Asserts that the outcome has the expected kind.
pub fn assert_outcome_kind<T: Debug>(outcome: &Outcome<T>, expected: OutcomeKind) {
    assert_eq!(
        outcome.kind(),
        expected,
        "Expected {expected}, got {outcome:?}"
    );
}
