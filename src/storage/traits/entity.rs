//! Entity store trait: the relational collaborator behind the query engine.
//!
//! # Available Implementations
//!
//! | Backend | Use Case | Features |
//! |---------|----------|----------|
//! | `SqliteEntityStore` | Default; embedded | SQL translation, FK cascades, transactions |
//! | `InMemoryEntityStore` | Testing | Direct evaluation, round-trip counting |
//!
//! # Contract
//!
//! - Entity reads driven by an [`EntityQuery`] honor its scope, filters and
//!   limit, and return rows ordered by ascending id.
//! - Relationship filters consider edges regardless of the activation of the
//!   entity at the far end.
//! - [`EntityStore::super_entities`] / [`EntityStore::sub_entities`] return
//!   neighbors in edge order with no activation filter, one per edge.
//! - [`EntityStore::prefetch_relationships`] returns exactly what per-entity
//!   traversal would.
//! - Constraint failures surface as [`crate::Error::IntegrityViolation`].
//!   Nothing is retried.

use crate::Result;
use crate::models::{
    Entity, EntityId, EntityKind, EntityKindId, EntityRelationship, NewEntity, NewEntityKind,
    RelationshipId, Scope,
};
use crate::query::{CacheSpec, EntityQuery, RelationshipCache};
use serde::Serialize;
use std::collections::BTreeMap;

/// Trait for entity store backends.
///
/// # Implementor Notes
///
/// - Methods use `&self` to enable sharing via `Arc<dyn EntityStore>`
/// - Use interior mutability (e.g., `Mutex<Connection>`) for mutable state
/// - Hard deletion of entities must remove incident edges atomically
pub trait EntityStore: Send + Sync {
    // ========================================================================
    // Entity Kind Operations
    // ========================================================================

    /// Stores a new kind.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::IntegrityViolation`] if the name is taken.
    fn insert_kind(&self, kind: &NewEntityKind) -> Result<EntityKind>;

    /// Updates the name, label and activation of an existing kind.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::NotFound`] if the kind does not exist and
    /// [`crate::Error::IntegrityViolation`] if the new name is taken.
    fn update_kind(&self, kind: &EntityKind) -> Result<()>;

    /// Retrieves a kind by id regardless of activation.
    ///
    /// # Errors
    ///
    /// Returns an error if the lookup fails.
    fn get_kind(&self, id: EntityKindId) -> Result<Option<EntityKind>>;

    /// Retrieves a kind by name within a scope.
    ///
    /// # Errors
    ///
    /// Returns an error if the lookup fails.
    fn find_kind(&self, name: &str, scope: Scope) -> Result<Option<EntityKind>>;

    /// Lists kinds within a scope, ordered by name.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn list_kinds(&self, scope: Scope) -> Result<Vec<EntityKind>>;

    /// Physically deletes a kind.
    ///
    /// Returns `false` if the kind did not exist.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::IntegrityViolation`] while any entity, active
    /// or not, references the kind.
    fn delete_kind(&self, id: EntityKindId) -> Result<bool>;

    // ========================================================================
    // Entity Operations
    // ========================================================================

    /// Stores a new entity.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::IntegrityViolation`] if an entity already wraps
    /// the same reference under the same kind, or the kind does not exist.
    fn insert_entity(&self, entity: &NewEntity) -> Result<Entity>;

    /// Saves every field of an existing entity.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::NotFound`] if the entity does not exist and
    /// [`crate::Error::IntegrityViolation`] if the save breaks uniqueness.
    fn update_entity(&self, entity: &Entity) -> Result<()>;

    /// Retrieves an entity by id regardless of activation.
    ///
    /// # Errors
    ///
    /// Returns an error if the lookup fails.
    fn get_entity(&self, id: EntityId) -> Result<Option<Entity>>;

    /// Returns the entities described by the query.
    ///
    /// The query's prefetch request is ignored here; see
    /// [`EntityStore::prefetch_relationships`].
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn fetch(&self, query: &EntityQuery) -> Result<Vec<Entity>>;

    /// Counts the entities described by the query.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn count(&self, query: &EntityQuery) -> Result<usize>;

    /// Sets `is_active` on every entity described by the query.
    ///
    /// Returns the number of entities matched.
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails.
    fn set_active(&self, query: &EntityQuery, active: bool) -> Result<usize>;

    /// Physically deletes every entity described by the query, together with
    /// every edge touching them, in one transaction.
    ///
    /// Returns the number of entities deleted.
    ///
    /// # Errors
    ///
    /// Returns an error if the deletion fails; nothing is deleted then.
    fn delete(&self, query: &EntityQuery) -> Result<usize>;

    // ========================================================================
    // Relationship Operations
    // ========================================================================

    /// Stores a new edge: `sub` is subordinate to `sup`.
    ///
    /// Duplicate edges are allowed.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::IntegrityViolation`] if either endpoint does
    /// not exist.
    fn insert_relationship(&self, sub: EntityId, sup: EntityId) -> Result<EntityRelationship>;

    /// Deletes one edge. Returns `false` if it did not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the deletion fails.
    fn delete_relationship(&self, id: RelationshipId) -> Result<bool>;

    /// Deletes every edge from `sub` to `sup`. Returns the number deleted.
    ///
    /// # Errors
    ///
    /// Returns an error if the deletion fails.
    fn delete_relationships_between(&self, sub: EntityId, sup: EntityId) -> Result<usize>;

    /// Lists every edge touching the entity, in either direction, by edge id.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn relationships_of(&self, entity: EntityId) -> Result<Vec<EntityRelationship>>;

    /// Returns the entities directly above `entity`, one per edge.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn super_entities(&self, entity: EntityId) -> Result<Vec<Entity>>;

    /// Returns the entities directly below `entity`, one per edge.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn sub_entities(&self, entity: EntityId) -> Result<Vec<Entity>>;

    /// Loads the requested neighbor lists for every id in bulk.
    ///
    /// An empty `spec` or id list yields an empty cache without touching the
    /// store.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn prefetch_relationships(&self, ids: &[EntityId], spec: CacheSpec)
    -> Result<RelationshipCache>;

    // ========================================================================
    // Utility Operations
    // ========================================================================

    /// Returns statistics about the stored graph.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn stats(&self) -> Result<GraphStats>;
}

/// Statistics about the stored graph.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GraphStats {
    /// Total number of kinds.
    pub kind_count: usize,
    /// Number of active kinds.
    pub active_kind_count: usize,
    /// Total number of entities.
    pub entity_count: usize,
    /// Number of active entities.
    pub active_entity_count: usize,
    /// Total number of edges, duplicates included.
    pub relationship_count: usize,
    /// Number of entities (active or not) per kind name.
    pub entities_by_kind: BTreeMap<String, usize>,
}
