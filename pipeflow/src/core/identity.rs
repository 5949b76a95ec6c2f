//! Pipeline identity.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Process-unique identifier of a pipeline value.
///
/// Every stage-adding call produces a pipeline with a fresh id, so two
/// continuations derived from the same prefix never share one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PipelineId(Uuid);

impl PipelineId {
    /// Generates a new random id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for PipelineId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for PipelineId {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

impl fmt::Display for PipelineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_unique() {
        let a = PipelineId::new();
        let b = PipelineId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn test_id_is_uuid_v4() {
        let id = PipelineId::new();
        assert_eq!(id.as_uuid().get_version_num(), 4);
    }

    #[test]
    fn test_display_matches_uuid() {
        let uuid = Uuid::new_v4();
        let id = PipelineId::from(uuid);
        assert_eq!(id.to_string(), uuid.to_string());
    }
}
