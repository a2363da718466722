//! Directed super/sub edges between entities.

use crate::models::entity::EntityId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Store-assigned identifier of an [`EntityRelationship`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RelationshipId(i64);

impl RelationshipId {
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

impl fmt::Display for RelationshipId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// `sub_entity` is subordinate to `super_entity`.
///
/// Edges carry no attributes and no activation flag. The same pair may be
/// linked more than once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityRelationship {
    /// Store-assigned identifier.
    pub id: RelationshipId,
    /// The entity below.
    pub sub_entity: EntityId,
    /// The entity above.
    pub super_entity: EntityId,
}

impl EntityRelationship {
    /// Returns true if the edge touches the entity at either end.
    #[must_use]
    pub fn touches(&self, entity: EntityId) -> bool {
        self.sub_entity == entity || self.super_entity == entity
    }
}

impl fmt::Display for EntityRelationship {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.sub_entity, self.super_entity)
    }
}
