//! Entity service: the caller-facing entry point to the entity graph.
//!
//! # Example
//!
//! ```rust
//! use entitygraph::models::{EntityRef, NewEntity, NewEntityKind};
//! use entitygraph::services::EntityService;
//! use entitygraph::storage::InMemoryEntityStore;
//!
//! # fn main() -> entitygraph::Result<()> {
//! let service = EntityService::new(InMemoryEntityStore::new());
//! let org = service.create_kind(NewEntityKind::new("org", "Organization"))?;
//! let acme = service.create_entity(NewEntity::new(EntityRef::new("org", 1), org.id))?;
//!
//! service.objects().with_ids(&[acme.id]).deactivate()?;
//! assert_eq!(service.objects().count()?, 0);
//! assert_eq!(service.all_objects().count()?, 1);
//! # Ok(())
//! # }
//! ```

use crate::models::{
    Activatable, Entity, EntityId, EntityKind, EntityKindId, EntityRelationship, NewEntity,
    NewEntityKind, ReferenceRegistry, RelationshipId, Scope,
};
use crate::query::EntityQuery;
use crate::services::EntitySet;
use crate::storage::{EntityStore, GraphStats};
use crate::{Error, Result};
use std::sync::Arc;
use tracing::instrument;

/// High-level service over an [`EntityStore`].
///
/// Wraps a store and provides:
/// - Scoped entity sets (`objects` / `all_objects`)
/// - Kind registry management
/// - Entity and edge mutation
/// - Direct neighbor traversal
///
/// # Thread Safety
///
/// The service is thread-safe when the underlying store is thread-safe.
/// Both [`SqliteEntityStore`](crate::storage::SqliteEntityStore) and
/// [`InMemoryEntityStore`](crate::storage::InMemoryEntityStore) are.
pub struct EntityService<B: EntityStore> {
    backend: Arc<B>,
    registry: Option<ReferenceRegistry>,
}

impl<B: EntityStore> EntityService<B> {
    /// Creates a new entity service with the given store.
    pub fn new(backend: B) -> Self {
        Self {
            backend: Arc::new(backend),
            registry: None,
        }
    }

    /// Creates a new entity service with a shared store.
    #[must_use]
    pub const fn with_shared_backend(backend: Arc<B>) -> Self {
        Self {
            backend,
            registry: None,
        }
    }

    /// Attaches a reference registry used by [`EntityService::resolve`].
    #[must_use]
    pub fn with_registry(mut self, registry: ReferenceRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Returns a reference to the underlying store.
    #[must_use]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Returns the attached reference registry, if any.
    #[must_use]
    pub const fn registry(&self) -> Option<&ReferenceRegistry> {
        self.registry.as_ref()
    }

    // =========================================================================
    // Entity Sets
    // =========================================================================

    /// Returns the set of active entities.
    #[must_use]
    pub fn objects(&self) -> EntitySet<'_, B> {
        EntitySet::new(&self.backend, EntityQuery::new(Scope::Active))
    }

    /// Returns the set of all entities, active or not.
    #[must_use]
    pub fn all_objects(&self) -> EntitySet<'_, B> {
        EntitySet::new(&self.backend, EntityQuery::new(Scope::All))
    }

    /// Returns the active entities directly below `entity`, as a set.
    #[must_use]
    pub fn sub_entities_of(&self, entity: &Entity) -> EntitySet<'_, B> {
        self.objects().is_sub_to_any(&[entity.id])
    }

    /// Returns the active entities directly above `entity`, as a set.
    #[must_use]
    pub fn super_entities_of(&self, entity: &Entity) -> EntitySet<'_, B> {
        self.objects().is_super_to_any(&[entity.id])
    }

    // =========================================================================
    // Kind Operations
    // =========================================================================

    /// Registers a new entity kind.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for a blank name and
    /// [`Error::IntegrityViolation`] if the name is taken.
    #[instrument(skip(self, kind), fields(name = %kind.name))]
    pub fn create_kind(&self, kind: NewEntityKind) -> Result<EntityKind> {
        if kind.name.trim().is_empty() {
            return Err(Error::InvalidInput(
                "entity kind name must not be empty".to_string(),
            ));
        }
        self.backend.insert_kind(&kind)
    }

    /// Looks up an active kind by name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if no active kind has the name.
    pub fn kind_by_name(&self, name: &str) -> Result<EntityKind> {
        self.backend
            .find_kind(name, Scope::Active)?
            .ok_or_else(|| Error::not_found(format!("entity kind '{name}'")))
    }

    /// Looks up a kind by name, active or not.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if no kind has the name.
    pub fn any_kind_by_name(&self, name: &str) -> Result<EntityKind> {
        self.backend
            .find_kind(name, Scope::All)?
            .ok_or_else(|| Error::not_found(format!("entity kind '{name}'")))
    }

    /// Lists active kinds by name.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub fn kinds(&self) -> Result<Vec<EntityKind>> {
        self.backend.list_kinds(Scope::Active)
    }

    /// Lists all kinds by name.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub fn all_kinds(&self) -> Result<Vec<EntityKind>> {
        self.backend.list_kinds(Scope::All)
    }

    /// Marks a kind active.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the kind does not exist.
    pub fn activate_kind(&self, id: EntityKindId) -> Result<EntityKind> {
        self.set_kind_active(id, true)
    }

    /// Marks a kind inactive. Entities of the kind are untouched.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the kind does not exist.
    pub fn deactivate_kind(&self, id: EntityKindId) -> Result<EntityKind> {
        self.set_kind_active(id, false)
    }

    fn set_kind_active(&self, id: EntityKindId, active: bool) -> Result<EntityKind> {
        let mut kind = self
            .backend
            .get_kind(id)?
            .ok_or_else(|| Error::not_found(format!("entity kind {id}")))?;
        kind.set_active(active);
        self.backend.update_kind(&kind)?;
        Ok(kind)
    }

    /// Physically deletes a kind.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IntegrityViolation`] while entities reference the kind
    /// and [`Error::NotFound`] if it does not exist.
    #[instrument(skip(self))]
    pub fn delete_kind(&self, id: EntityKindId) -> Result<()> {
        if self.backend.delete_kind(id)? {
            Ok(())
        } else {
            Err(Error::not_found(format!("entity kind {id}")))
        }
    }

    // =========================================================================
    // Entity Operations
    // =========================================================================

    /// Wraps a domain reference in a new entity.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IntegrityViolation`] if the reference is already
    /// wrapped under the same kind or the kind does not exist.
    #[instrument(skip(self, entity), fields(entity_ref = %entity.entity_ref))]
    pub fn create_entity(&self, entity: NewEntity) -> Result<Entity> {
        self.backend.insert_entity(&entity)
    }

    /// Saves every field of an existing entity.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the entity does not exist.
    pub fn save_entity(&self, entity: &Entity) -> Result<()> {
        self.backend.update_entity(entity)
    }

    /// Loads an entity by id, active or not.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the entity does not exist.
    pub fn get_entity(&self, id: EntityId) -> Result<Entity> {
        self.backend
            .get_entity(id)?
            .ok_or_else(|| Error::not_found(format!("entity {id}")))
    }

    /// Resolves the domain object an entity wraps.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if no registry is attached or the
    /// reference type is unregistered, and [`Error::NotFound`] if the object
    /// is gone.
    pub fn resolve(&self, entity: &Entity) -> Result<serde_json::Value> {
        self.registry
            .as_ref()
            .ok_or_else(|| Error::InvalidInput("no reference registry attached".to_string()))?
            .resolve(&entity.entity_ref)
    }

    // =========================================================================
    // Relationship Operations
    // =========================================================================

    /// Makes `sub` subordinate to `sup`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IntegrityViolation`] if either entity does not exist.
    #[instrument(skip(self))]
    pub fn add_relationship(&self, sub: &EntityId, sup: &EntityId) -> Result<EntityRelationship> {
        self.backend.insert_relationship(*sub, *sup)
    }

    /// Removes one edge.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub fn remove_relationship(&self, id: RelationshipId) -> Result<bool> {
        self.backend.delete_relationship(id)
    }

    /// Removes every edge from `sub` to `sup`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub fn remove_relationships_between(&self, sub: &EntityId, sup: &EntityId) -> Result<usize> {
        self.backend.delete_relationships_between(*sub, *sup)
    }

    /// Lists every edge touching the entity.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub fn relationships_of(&self, id: &EntityId) -> Result<Vec<EntityRelationship>> {
        self.backend.relationships_of(*id)
    }

    // =========================================================================
    // Traversal
    // =========================================================================

    /// Returns the entities directly above `entity`, in edge order.
    ///
    /// No activation or kind filter applies; a duplicate edge yields a
    /// duplicate neighbor.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub fn get_super_entities(&self, entity: &Entity) -> Result<Vec<Entity>> {
        self.backend.super_entities(entity.id)
    }

    /// Returns the entities directly below `entity`, in edge order.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub fn get_sub_entities(&self, entity: &Entity) -> Result<Vec<Entity>> {
        self.backend.sub_entities(entity.id)
    }

    // =========================================================================
    // Utility
    // =========================================================================

    /// Returns graph statistics.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub fn stats(&self) -> Result<GraphStats> {
        self.backend.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EntityRef, Referenceable, TypeTag};
    use crate::storage::InMemoryEntityStore;
    use serde_json::json;

    struct Team {
        id: i64,
    }

    impl Referenceable for Team {
        fn type_tag() -> TypeTag {
            TypeTag::new("team")
        }

        fn reference_id(&self) -> i64 {
            self.id
        }
    }

    struct Fixture {
        service: EntityService<InMemoryEntityStore>,
        team_kind: EntityKind,
        user_kind: EntityKind,
    }

    impl Fixture {
        fn new() -> Self {
            let service = EntityService::new(InMemoryEntityStore::new());
            let team_kind = service
                .create_kind(NewEntityKind::new("team", "Team"))
                .unwrap();
            let user_kind = service
                .create_kind(NewEntityKind::new("user", "User"))
                .unwrap();
            Self {
                service,
                team_kind,
                user_kind,
            }
        }

        fn team(&self, id: i64) -> Entity {
            self.service
                .create_entity(NewEntity::new(EntityRef::new("team", id), self.team_kind.id))
                .unwrap()
        }

        fn user(&self, id: i64) -> Entity {
            self.service
                .create_entity(NewEntity::new(EntityRef::new("user", id), self.user_kind.id))
                .unwrap()
        }
    }

    #[test]
    fn test_create_kind_rejects_blank_name() {
        let f = Fixture::new();
        let err = f
            .service
            .create_kind(NewEntityKind::new("  ", "Blank"))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn test_kind_lookup_respects_scope() {
        let f = Fixture::new();
        f.service.deactivate_kind(f.team_kind.id).unwrap();

        assert!(matches!(
            f.service.kind_by_name("team"),
            Err(Error::NotFound { .. })
        ));
        assert!(!f.service.any_kind_by_name("team").unwrap().is_active);
        assert_eq!(f.service.kinds().unwrap(), vec![f.user_kind.clone()]);
        assert_eq!(f.service.all_kinds().unwrap().len(), 2);

        let reactivated = f.service.activate_kind(f.team_kind.id).unwrap();
        assert!(reactivated.is_active);
    }

    #[test]
    fn test_get_for_and_delete_for_referenceable() {
        let f = Fixture::new();
        let t = f.team(4);

        assert_eq!(f.service.objects().get_for(&Team { id: 4 }).unwrap(), t);
        assert!(matches!(
            f.service.objects().get_for(&Team { id: 5 }),
            Err(Error::NotFound { .. })
        ));

        assert_eq!(f.service.objects().delete_for(&Team { id: 4 }, false).unwrap(), 1);
        assert!(f.service.objects().get_for(&Team { id: 4 }).is_err());
        assert_eq!(f.service.all_objects().get_for(&Team { id: 4 }).unwrap(), t);
    }

    #[test]
    fn test_get_for_reference_reports_multiple_kinds() {
        let f = Fixture::new();
        f.team(1);
        f.service
            .create_entity(NewEntity::new(EntityRef::new("team", 1), f.user_kind.id))
            .unwrap();

        let err = f
            .service
            .objects()
            .get_for_reference(&EntityRef::new("team", 1))
            .unwrap_err();
        assert!(matches!(err, Error::MultipleFound { count: 2, .. }));
    }

    #[test]
    fn test_neighborhood_sets() {
        let f = Fixture::new();
        let t = f.team(1);
        let a = f.user(1);
        let b = f.user(2);
        f.service.add_relationship(&a.id, &t.id).unwrap();
        f.service.add_relationship(&b.id, &t.id).unwrap();
        f.service.objects().with_ids(&[b.id]).deactivate().unwrap();

        assert_eq!(f.service.sub_entities_of(&t).entities().unwrap(), vec![a.clone()]);
        assert_eq!(f.service.super_entities_of(&a).entities().unwrap(), vec![t.clone()]);
        // Raw traversal ignores activation.
        assert_eq!(f.service.get_sub_entities(&t).unwrap().len(), 2);
    }

    #[test]
    fn test_resolve_through_registry() {
        let f = Fixture::new();
        let t = f.team(3);
        assert!(matches!(f.service.resolve(&t), Err(Error::InvalidInput(_))));

        let mut registry = ReferenceRegistry::new();
        registry.register("team", |id: i64| -> Result<Option<serde_json::Value>> {
            Ok((id == 3).then(|| json!({"id": id, "name": "Core"})))
        });
        let service = EntityService::with_shared_backend(Arc::clone(&f.service.backend))
            .with_registry(registry);

        assert_eq!(service.resolve(&t).unwrap()["name"], "Core");
    }

    #[test]
    fn test_remove_relationships_between() {
        let f = Fixture::new();
        let t = f.team(1);
        let u = f.user(1);
        f.service.add_relationship(&u.id, &t.id).unwrap();
        f.service.add_relationship(&u.id, &t.id).unwrap();
        let other = f.service.add_relationship(&t.id, &u.id).unwrap();

        assert_eq!(f.service.remove_relationships_between(&u.id, &t.id).unwrap(), 2);
        assert_eq!(f.service.relationships_of(&u.id).unwrap(), vec![other]);
        assert!(f.service.remove_relationship(other.id).unwrap());
        assert!(!f.service.remove_relationship(other.id).unwrap());
    }
}
