//! Entity kinds: the controlled vocabulary used to classify entities.

use crate::models::activation::Activatable;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Store-assigned identifier of an [`EntityKind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityKindId(i64);

impl EntityKindId {
    /// Wraps a raw store identifier.
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// Returns the raw store identifier.
    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for EntityKindId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for EntityKindId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// A named category of entities, such as `user` or `team`.
///
/// Kinds are retired by deactivation. Physical deletion is refused by the
/// store while any entity still references the kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityKind {
    /// Store-assigned identifier.
    pub id: EntityKindId,
    /// Unique identification string.
    pub name: String,
    /// Human-readable label.
    pub display_name: String,
    /// Whether the kind is active.
    pub is_active: bool,
}

impl Activatable for EntityKind {
    fn is_active(&self) -> bool {
        self.is_active
    }

    fn set_active(&mut self, active: bool) {
        self.is_active = active;
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name)
    }
}

/// Values for a kind that has not been stored yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewEntityKind {
    /// Unique identification string.
    pub name: String,
    /// Human-readable label.
    pub display_name: String,
    /// Whether the kind starts out active.
    pub is_active: bool,
}

impl NewEntityKind {
    /// Creates an active kind with the given name and label.
    #[must_use]
    pub fn new(name: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            display_name: display_name.into(),
            is_active: true,
        }
    }

    /// Sets the initial activation flag.
    #[must_use]
    pub const fn with_active(mut self, is_active: bool) -> Self {
        self.is_active = is_active;
        self
    }

    /// Builds the stored kind once the store has assigned an id.
    #[must_use]
    pub fn into_kind(self, id: EntityKindId) -> EntityKind {
        EntityKind {
            id,
            name: self.name,
            display_name: self.display_name,
            is_active: self.is_active,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_uses_display_name() {
        let kind = NewEntityKind::new("team", "Team").into_kind(EntityKindId::new(3));
        assert_eq!(kind.to_string(), "Team");
        assert_eq!(kind.id.get(), 3);
        assert!(kind.is_active());
    }

    #[test]
    fn test_with_active() {
        let kind = NewEntityKind::new("legacy", "Legacy").with_active(false);
        assert!(!kind.is_active);
    }
}
