//! Traversal outcomes.

use crate::errors::StageFailure;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The kind of outcome a traversal reached, without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    /// The last stage produced a value.
    Completed,
    /// A stage returned the drop signal.
    Dropped,
    /// A stage failed and the exception policy gave up.
    Abandoned,
}

impl fmt::Display for OutcomeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed => write!(f, "completed"),
            Self::Dropped => write!(f, "dropped"),
            Self::Abandoned => write!(f, "abandoned"),
        }
    }
}

/// The result of one traversal of a pipeline.
///
/// `Dropped` and `Abandoned` both mean "no value"; they are kept apart so
/// callers can tell a filtered item from a failed one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T> {
    /// Every stage ran and the last one produced this value.
    Completed(T),
    /// A stage dropped the item.
    Dropped,
    /// A stage failed and the item was abandoned.
    Abandoned(StageFailure),
}

impl<T> Outcome<T> {
    /// Returns the kind of this outcome.
    #[must_use]
    pub const fn kind(&self) -> OutcomeKind {
        match self {
            Self::Completed(_) => OutcomeKind::Completed,
            Self::Dropped => OutcomeKind::Dropped,
            Self::Abandoned(_) => OutcomeKind::Abandoned,
        }
    }

    /// Returns true if a value was produced.
    #[must_use]
    pub const fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }

    /// Returns true if a stage dropped the item.
    #[must_use]
    pub const fn is_dropped(&self) -> bool {
        matches!(self, Self::Dropped)
    }

    /// Returns true if the item was abandoned after a failure.
    #[must_use]
    pub const fn is_abandoned(&self) -> bool {
        matches!(self, Self::Abandoned(_))
    }

    /// Returns the produced value, if any.
    #[must_use]
    pub const fn value(&self) -> Option<&T> {
        match self {
            Self::Completed(value) => Some(value),
            _ => None,
        }
    }

    /// Returns the failure record, if the item was abandoned.
    #[must_use]
    pub const fn failure(&self) -> Option<&StageFailure> {
        match self {
            Self::Abandoned(failure) => Some(failure),
            _ => None,
        }
    }

    /// Collapses the outcome to "value or no value".
    #[must_use]
    pub fn into_value(self) -> Option<T> {
        match self {
            Self::Completed(value) => Some(value),
            _ => None,
        }
    }

    /// Maps the produced value.
    #[must_use]
    pub fn map<U, F>(self, f: F) -> Outcome<U>
    where
        F: FnOnce(T) -> U,
    {
        match self {
            Self::Completed(value) => Outcome::Completed(f(value)),
            Self::Dropped => Outcome::Dropped,
            Self::Abandoned(failure) => Outcome::Abandoned(failure),
        }
    }
}

impl<T> From<Outcome<T>> for Option<T> {
    fn from(outcome: Outcome<T>) -> Self {
        outcome.into_value()
    }
}
