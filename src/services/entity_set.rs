//! Chainable entity sets and their materialized rows.

use crate::models::{Entity, EntityId, EntityKindId, EntityRef, Referenceable};
use crate::query::{EntityQuery, RelationshipCache};
use crate::storage::EntityStore;
use crate::{Error, Result};
use tracing::instrument;

/// A lazily evaluated set of entities bound to a store.
///
/// Filter methods consume the set and return a narrower one; nothing touches
/// the store until a terminal method (`fetch`, `entities`, `count`, ...) runs.
/// The default scope comes from how the set was obtained:
/// [`EntityService::objects`](crate::services::EntityService::objects) sees
/// active entities only, [`EntityService::all_objects`](crate::services::EntityService::all_objects)
/// sees everything.
pub struct EntitySet<'a, B: EntityStore> {
    backend: &'a B,
    query: EntityQuery,
}

impl<B: EntityStore> Clone for EntitySet<'_, B> {
    fn clone(&self) -> Self {
        Self {
            backend: self.backend,
            query: self.query.clone(),
        }
    }
}

impl<B: EntityStore> std::fmt::Debug for EntitySet<'_, B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntitySet")
            .field("query", &self.query)
            .finish_non_exhaustive()
    }
}

impl<'a, B: EntityStore> EntitySet<'a, B> {
    pub(crate) const fn new(backend: &'a B, query: EntityQuery) -> Self {
        Self { backend, query }
    }

    fn map(self, f: impl FnOnce(EntityQuery) -> EntityQuery) -> Self {
        Self {
            backend: self.backend,
            query: f(self.query),
        }
    }

    /// Returns the query this set will run.
    #[must_use]
    pub const fn query(&self) -> &EntityQuery {
        &self.query
    }

    // =========================================================================
    // Filters
    // =========================================================================

    /// Narrows to active entities.
    #[must_use]
    pub fn active(self) -> Self {
        self.map(EntityQuery::active)
    }

    /// Narrows to inactive entities.
    #[must_use]
    pub fn inactive(self) -> Self {
        self.map(EntityQuery::inactive)
    }

    /// Narrows to the given ids. Empty is a no-op.
    #[must_use]
    pub fn with_ids(self, ids: &[EntityId]) -> Self {
        self.map(|q| q.with_ids(ids))
    }

    /// Narrows to entities of any of the kinds. Empty is a no-op.
    #[must_use]
    pub fn is_any_kind(self, kinds: &[EntityKindId]) -> Self {
        self.map(|q| q.is_any_kind(kinds))
    }

    /// Narrows to entities of none of the kinds. Empty is a no-op.
    #[must_use]
    pub fn is_not_any_kind(self, kinds: &[EntityKindId]) -> Self {
        self.map(|q| q.is_not_any_kind(kinds))
    }

    /// Narrows to entities sub to at least one of the supers. Empty is a no-op.
    #[must_use]
    pub fn is_sub_to_any(self, supers: &[EntityId]) -> Self {
        self.map(|q| q.is_sub_to_any(supers))
    }

    /// Narrows to entities sub to every one of the supers. Empty is a no-op.
    #[must_use]
    pub fn is_sub_to_all(self, supers: &[EntityId]) -> Self {
        self.map(|q| q.is_sub_to_all(supers))
    }

    /// Narrows to entities with a super entity of any of the kinds.
    #[must_use]
    pub fn is_sub_to_any_kind(self, kinds: &[EntityKindId]) -> Self {
        self.map(|q| q.is_sub_to_any_kind(kinds))
    }

    /// Narrows to entities whose super entities span every one of the kinds.
    #[must_use]
    pub fn is_sub_to_all_kinds(self, kinds: &[EntityKindId]) -> Self {
        self.map(|q| q.is_sub_to_all_kinds(kinds))
    }

    /// Narrows to entities super to at least one of the subs. Empty is a no-op.
    #[must_use]
    pub fn is_super_to_any(self, subs: &[EntityId]) -> Self {
        self.map(|q| q.is_super_to_any(subs))
    }

    /// Requests bulk prefetch of neighbors when the set is fetched.
    ///
    /// Repeated calls accumulate. Membership and order are unaffected.
    #[must_use]
    pub fn cache_relationships(self, include_super: bool, include_sub: bool) -> Self {
        self.map(|q| q.cache_relationships(include_super, include_sub))
    }

    /// Caps the number of rows returned.
    #[must_use]
    pub fn limit(self, limit: usize) -> Self {
        self.map(|q| q.with_limit(limit))
    }

    // =========================================================================
    // Terminal reads
    // =========================================================================

    /// Materializes the set, prefetching relationships if requested.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    #[instrument(skip(self), fields(filters = self.query.filters().len()))]
    pub fn fetch(self) -> Result<EntityRows<'a, B>> {
        let entities = self.backend.fetch(&self.query)?;
        metrics::counter!("entity_query_fetch_total").increment(1);

        let spec = self.query.cache();
        let cache = if spec.is_empty() {
            None
        } else {
            let ids: Vec<EntityId> = entities.iter().map(|e| e.id).collect();
            metrics::counter!("entity_prefetch_total").increment(1);
            Some(self.backend.prefetch_relationships(&ids, spec)?)
        };
        tracing::debug!(rows = entities.len(), cached = cache.is_some(), "Fetched entity set");

        Ok(EntityRows {
            backend: self.backend,
            entities,
            cache,
        })
    }

    /// Returns the entities in the set, ordered by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub fn entities(self) -> Result<Vec<Entity>> {
        metrics::counter!("entity_query_fetch_total").increment(1);
        self.backend.fetch(&self.query)
    }

    /// Returns the ids of the entities in the set.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub fn ids(self) -> Result<Vec<EntityId>> {
        Ok(self.entities()?.into_iter().map(|e| e.id).collect())
    }

    /// Counts the entities in the set.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub fn count(&self) -> Result<usize> {
        self.backend.count(&self.query)
    }

    /// Returns the entity with the lowest id, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub fn first(self) -> Result<Option<Entity>> {
        let limit = self.query.limit().map_or(1, |limit| limit.min(1));
        Ok(self.limit(limit).entities()?.into_iter().next())
    }

    /// Returns true if the set is non-empty.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub fn exists(&self) -> Result<bool> {
        Ok(self.clone().first()?.is_some())
    }

    /// Returns the unique entity wrapping `reference`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if no entity in the set wraps the
    /// reference, and [`Error::MultipleFound`] if several do (one per kind).
    pub fn get_for_reference(self, reference: &EntityRef) -> Result<Entity> {
        let mut matches = self
            .map(|q| q.with_reference(reference).without_limit())
            .entities()?;
        match matches.len() {
            0 => Err(Error::not_found(format!("entity for {reference}"))),
            1 => Ok(matches.remove(0)),
            count => Err(Error::MultipleFound {
                what: format!("entity for {reference}"),
                count,
            }),
        }
    }

    /// Returns the unique entity wrapping the domain object.
    ///
    /// # Errors
    ///
    /// See [`EntitySet::get_for_reference`].
    pub fn get_for<T: Referenceable>(self, object: &T) -> Result<Entity> {
        self.get_for_reference(&object.entity_ref())
    }

    // =========================================================================
    // Bulk writes
    // =========================================================================

    /// Marks every entity in the set active. Returns how many matched.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub fn activate(self) -> Result<usize> {
        self.backend.set_active(&self.query, true)
    }

    /// Marks every entity in the set inactive. Returns how many matched.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub fn deactivate(self) -> Result<usize> {
        self.backend.set_active(&self.query, false)
    }

    /// Deletes the set.
    ///
    /// With `force` the entities and all their edges are removed; without it
    /// they are only deactivated. Returns how many entities were affected.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    #[instrument(skip(self), fields(filters = self.query.filters().len()))]
    pub fn delete(self, force: bool) -> Result<usize> {
        if force {
            self.backend.delete(&self.query)
        } else {
            self.deactivate()
        }
    }

    /// Deletes the entities in the set wrapping `reference`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub fn delete_for_reference(self, reference: &EntityRef, force: bool) -> Result<usize> {
        self.map(|q| q.with_reference(reference)).delete(force)
    }

    /// Deletes the entities in the set wrapping the domain object.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub fn delete_for<T: Referenceable>(self, object: &T, force: bool) -> Result<usize> {
        self.delete_for_reference(&object.entity_ref(), force)
    }
}

/// A materialized entity set with its optional relationship cache.
pub struct EntityRows<'a, B: EntityStore> {
    backend: &'a B,
    entities: Vec<Entity>,
    cache: Option<RelationshipCache>,
}

impl<B: EntityStore> std::fmt::Debug for EntityRows<'_, B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityRows")
            .field("entities", &self.entities)
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

impl<B: EntityStore> EntityRows<'_, B> {
    /// Iterates the rows in id order.
    pub fn iter(&self) -> std::slice::Iter<'_, Entity> {
        self.entities.iter()
    }

    /// Returns the number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Returns true if there are no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Returns the rows.
    #[must_use]
    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    /// Consumes the rows, dropping the cache.
    #[must_use]
    pub fn into_entities(self) -> Vec<Entity> {
        self.entities
    }

    /// Returns the prefetched relationships, if any were requested.
    #[must_use]
    pub const fn cache(&self) -> Option<&RelationshipCache> {
        self.cache.as_ref()
    }

    /// Returns the entities directly above `entity`.
    ///
    /// Served from the cache when super relationships were prefetched for it,
    /// otherwise read from the store. Both paths return the same list.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub fn get_super_entities(&self, entity: &Entity) -> Result<Vec<Entity>> {
        match self.cache.as_ref().and_then(|c| c.super_entities(&entity.id)) {
            Some(cached) => Ok(cached.to_vec()),
            None => self.backend.super_entities(entity.id),
        }
    }

    /// Returns the entities directly below `entity`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub fn get_sub_entities(&self, entity: &Entity) -> Result<Vec<Entity>> {
        match self.cache.as_ref().and_then(|c| c.sub_entities(&entity.id)) {
            Some(cached) => Ok(cached.to_vec()),
            None => self.backend.sub_entities(entity.id),
        }
    }
}

impl<'r, B: EntityStore> IntoIterator for &'r EntityRows<'_, B> {
    type Item = &'r Entity;
    type IntoIter = std::slice::Iter<'r, Entity>;

    fn into_iter(self) -> Self::IntoIter {
        self.entities.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewEntity, NewEntityKind, TypeTag};
    use crate::services::EntityService;
    use crate::storage::InMemoryEntityStore;

    struct User(i64);

    impl Referenceable for User {
        fn type_tag() -> TypeTag {
            TypeTag::new("user")
        }

        fn reference_id(&self) -> i64 {
            self.0
        }
    }

    /// One user wrapped as both a member and an admin.
    fn setup() -> (EntityService<InMemoryEntityStore>, Entity, Entity) {
        let service = EntityService::new(InMemoryEntityStore::new());
        let member = service
            .create_kind(NewEntityKind::new("member", "Member"))
            .unwrap();
        let admin = service
            .create_kind(NewEntityKind::new("admin", "Admin"))
            .unwrap();
        let as_member = service
            .create_entity(NewEntity::new(EntityRef::new("user", 1), member.id))
            .unwrap();
        let as_admin = service
            .create_entity(NewEntity::new(EntityRef::new("user", 1), admin.id))
            .unwrap();
        (service, as_member, as_admin)
    }

    #[test]
    fn test_get_for_reference_ambiguous_across_kinds() {
        let (service, as_member, _) = setup();

        let err = service.objects().get_for(&User(1)).unwrap_err();
        assert!(matches!(err, Error::MultipleFound { count: 2, .. }));

        let found = service
            .objects()
            .is_any_kind(&[as_member.entity_kind])
            .get_for(&User(1))
            .unwrap();
        assert_eq!(found, as_member);
    }

    #[test]
    fn test_get_for_reference_missing() {
        let (service, ..) = setup();
        assert!(matches!(
            service.objects().get_for(&User(2)),
            Err(Error::NotFound { .. })
        ));
    }

    #[test]
    fn test_soft_delete_for_reference_keeps_rows() {
        let (service, as_member, as_admin) = setup();

        assert_eq!(service.objects().delete_for(&User(1), false).unwrap(), 2);
        assert!(!service.objects().exists().unwrap());
        assert_eq!(
            service.all_objects().inactive().entities().unwrap(),
            vec![as_member, as_admin]
        );
        // Nothing left to delete in the active view.
        assert_eq!(service.objects().delete_for(&User(1), false).unwrap(), 0);
    }

    #[test]
    fn test_rows_without_cache_read_through() {
        let (service, as_member, as_admin) = setup();
        service
            .add_relationship(&as_member.id, &as_admin.id)
            .unwrap();

        let rows = service.objects().fetch().unwrap();
        assert!(rows.cache().is_none());
        assert_eq!(rows.len(), 2);
        assert_eq!(
            rows.get_super_entities(&as_member).unwrap(),
            vec![as_admin.clone()]
        );
        assert_eq!(rows.get_sub_entities(&as_admin).unwrap(), vec![as_member]);
    }

    #[test]
    fn test_first_keeps_smaller_limit() {
        let (service, ..) = setup();
        assert_eq!(service.objects().limit(0).first().unwrap(), None);
    }

    #[test]
    fn test_get_for_reference_ignores_limit() {
        let (service, ..) = setup();
        let err = service.objects().limit(1).get_for(&User(1)).unwrap_err();
        assert!(matches!(err, Error::MultipleFound { count: 2, .. }));
    }

    #[test]
    fn test_limit_and_first() {
        let (service, as_member, _) = setup();
        assert_eq!(service.objects().limit(1).ids().unwrap(), vec![as_member.id]);
        assert_eq!(service.objects().first().unwrap(), Some(as_member));
        assert_eq!(service.objects().limit(1).count().unwrap(), 1);
    }
}
