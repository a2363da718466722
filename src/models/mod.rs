//! Data models for the entity graph.

pub mod activation;
mod entity;
mod kind;
pub mod reference;
mod relationship;

pub use activation::{Activatable, Scope};
pub use entity::{Entity, EntityId, NewEntity};
pub use kind::{EntityKind, EntityKindId, NewEntityKind};
pub use reference::{EntityRef, ReferenceRegistry, ReferenceResolver, Referenceable, TypeTag};
pub use relationship::{EntityRelationship, RelationshipId};
