//! Entity records: the graph-side wrapper of a domain object.

use crate::models::activation::Activatable;
use crate::models::kind::EntityKindId;
use crate::models::reference::EntityRef;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Store-assigned identifier of an [`Entity`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(i64);

impl EntityId {
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

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for EntityId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// A domain object registered into the entity graph.
///
/// Identity is the `(entity_ref, entity_kind)` pair: two values with the same
/// pair compare equal even if their display names, metadata or activation
/// differ. The store enforces the same pair as a uniqueness constraint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    /// Store-assigned identifier.
    pub id: EntityId,
    /// Human-readable name.
    pub display_name: String,
    /// The wrapped domain object.
    pub entity_ref: EntityRef,
    /// Kind of the entity.
    pub entity_kind: EntityKindId,
    /// Free-form metadata.
    pub entity_meta: Option<serde_json::Value>,
    /// Whether the entity is active.
    pub is_active: bool,
}

impl PartialEq for Entity {
    fn eq(&self, other: &Self) -> bool {
        self.entity_ref == other.entity_ref && self.entity_kind == other.entity_kind
    }
}

impl Eq for Entity {}

impl Hash for Entity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.entity_ref.hash(state);
        self.entity_kind.hash(state);
    }
}

impl Activatable for Entity {
    fn is_active(&self) -> bool {
        self.is_active
    }

    fn set_active(&mut self, active: bool) {
        self.is_active = active;
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name)
    }
}

/// Values for an entity that has not been stored yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewEntity {
    /// Human-readable name.
    pub display_name: String,
    /// The wrapped domain object.
    pub entity_ref: EntityRef,
    /// Kind of the entity.
    pub entity_kind: EntityKindId,
    /// Free-form metadata.
    pub entity_meta: Option<serde_json::Value>,
    /// Whether the entity starts out active.
    pub is_active: bool,
}

impl NewEntity {
    /// Creates an active entity for the reference with no metadata.
    #[must_use]
    pub fn new(entity_ref: EntityRef, entity_kind: EntityKindId) -> Self {
        Self {
            display_name: String::new(),
            entity_ref,
            entity_kind,
            entity_meta: None,
            is_active: true,
        }
    }

    /// Sets the display name.
    #[must_use]
    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = display_name.into();
        self
    }

    /// Sets the metadata.
    #[must_use]
    pub fn with_meta(mut self, meta: serde_json::Value) -> Self {
        self.entity_meta = Some(meta);
        self
    }

    /// Sets the initial activation flag.
    #[must_use]
    pub const fn with_active(mut self, is_active: bool) -> Self {
        self.is_active = is_active;
        self
    }

    /// Builds the stored entity once the store has assigned an id.
    #[must_use]
    pub fn into_entity(self, id: EntityId) -> Entity {
        Entity {
            id,
            display_name: self.display_name,
            entity_ref: self.entity_ref,
            entity_kind: self.entity_kind,
            entity_meta: self.entity_meta,
            is_active: self.is_active,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashSet;

    fn entity(id: i64, ref_id: i64, kind: i64) -> Entity {
        NewEntity::new(EntityRef::new("user", ref_id), EntityKindId::new(kind))
            .with_display_name(format!("user {ref_id}"))
            .into_entity(EntityId::new(id))
    }

    #[test]
    fn test_equality_ignores_non_identity_fields() {
        let a = entity(1, 7, 1);
        let mut b = entity(2, 7, 1);
        b.display_name = "renamed".to_string();
        b.entity_meta = Some(json!({"x": 1}));
        b.deactivate();
        assert_eq!(a, b);

        let mut set = HashSet::new();
        set.insert(a);
        assert!(!set.insert(b));
    }

    #[test]
    fn test_equality_distinguishes_kind_and_reference() {
        assert_ne!(entity(1, 7, 1), entity(1, 7, 2));
        assert_ne!(entity(1, 7, 1), entity(1, 8, 1));
    }

    #[test]
    fn test_builder_and_display() {
        let e = NewEntity::new(EntityRef::new("team", 2), EntityKindId::new(4))
            .with_display_name("Backend")
            .with_meta(json!({"size": 5}))
            .with_active(false)
            .into_entity(EntityId::new(9));
        assert_eq!(e.to_string(), "Backend");
        assert_eq!(e.entity_meta, Some(json!({"size": 5})));
        assert!(!e.is_active());
    }
}
