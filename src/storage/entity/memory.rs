//! In-memory entity store for testing.
//!
//! Evaluates [`EntityQuery`] filters directly over maps instead of
//! translating them, so it doubles as an executable statement of the filter
//! semantics the `SQLite` store must agree with.

// Allow collapsible_if for clearer nested conditional logic in filter matching.
#![allow(clippy::collapsible_if)]

use crate::models::{
    Entity, EntityId, EntityKind, EntityKindId, EntityRelationship, NewEntity, NewEntityKind,
    RelationshipId, Scope,
};
use crate::query::{CacheSpec, EntityFilter, EntityQuery, RelationshipCache};
use crate::storage::metrics::record_operation_metrics;
use crate::storage::traits::{EntityStore, GraphStats};
use crate::{Error, Result};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Instant;

const BACKEND: &str = "memory";

#[derive(Debug, Default)]
struct MemoryState {
    kinds: BTreeMap<EntityKindId, EntityKind>,
    entities: BTreeMap<EntityId, Entity>,
    relationships: BTreeMap<RelationshipId, EntityRelationship>,
    next_kind_id: i64,
    next_entity_id: i64,
    next_relationship_id: i64,
}

impl MemoryState {
    fn supers_of(&self, entity: EntityId) -> impl Iterator<Item = EntityId> + '_ {
        self.relationships
            .values()
            .filter(move |r| r.sub_entity == entity)
            .map(|r| r.super_entity)
    }

    fn subs_of(&self, entity: EntityId) -> impl Iterator<Item = EntityId> + '_ {
        self.relationships
            .values()
            .filter(move |r| r.super_entity == entity)
            .map(|r| r.sub_entity)
    }

    fn super_kinds_of(&self, entity: EntityId) -> impl Iterator<Item = EntityKindId> + '_ {
        self.supers_of(entity)
            .filter_map(|id| self.entities.get(&id).map(|e| e.entity_kind))
    }

    fn matches(&self, entity: &Entity, filter: &EntityFilter) -> bool {
        match filter {
            EntityFilter::Activation(active) => entity.is_active == *active,
            EntityFilter::IdIn(ids) => ids.contains(&entity.id),
            EntityFilter::Reference(reference) => entity.entity_ref == *reference,
            EntityFilter::KindIn(kinds) => kinds.contains(&entity.entity_kind),
            EntityFilter::KindNotIn(kinds) => !kinds.contains(&entity.entity_kind),
            EntityFilter::SubToAny(supers) => {
                self.supers_of(entity.id).any(|id| supers.contains(&id))
            },
            EntityFilter::SubToAll(supers) => {
                let present: BTreeSet<EntityId> = self.supers_of(entity.id).collect();
                supers.is_subset(&present)
            },
            EntityFilter::SubToAnyKind(kinds) => {
                self.super_kinds_of(entity.id).any(|k| kinds.contains(&k))
            },
            EntityFilter::SubToAllKinds(kinds) => {
                let present: BTreeSet<EntityKindId> = self.super_kinds_of(entity.id).collect();
                kinds.is_subset(&present)
            },
            EntityFilter::SuperToAny(subs) => self.subs_of(entity.id).any(|id| subs.contains(&id)),
        }
    }

    fn select<'a>(&'a self, query: &'a EntityQuery) -> impl Iterator<Item = &'a Entity> + 'a {
        self.entities
            .values()
            .filter(move |e| query.scope().admits(e.is_active))
            .filter(move |e| query.filters().iter().all(|f| self.matches(e, f)))
            .take(query.limit().unwrap_or(usize::MAX))
    }

    fn selected_ids(&self, query: &EntityQuery) -> Vec<EntityId> {
        self.select(query).map(|e| e.id).collect()
    }

    fn resolve(&self, ids: impl Iterator<Item = EntityId>) -> Vec<Entity> {
        ids.filter_map(|id| self.entities.get(&id).cloned()).collect()
    }

    fn ensure_unique_kind_name(&self, name: &str, except: Option<EntityKindId>) -> Result<()> {
        if self
            .kinds
            .values()
            .any(|k| k.name == name && Some(k.id) != except)
        {
            return Err(Error::IntegrityViolation(format!(
                "entity kind name '{name}' already exists"
            )));
        }
        Ok(())
    }

    fn ensure_unique_entity(&self, candidate: &Entity) -> Result<()> {
        if self
            .entities
            .values()
            .any(|e| e.id != candidate.id && e == candidate)
        {
            return Err(Error::IntegrityViolation(format!(
                "entity for {} with kind {} already exists",
                candidate.entity_ref, candidate.entity_kind
            )));
        }
        if !self.kinds.contains_key(&candidate.entity_kind) {
            return Err(Error::IntegrityViolation(format!(
                "entity kind {} does not exist",
                candidate.entity_kind
            )));
        }
        Ok(())
    }
}

/// In-memory entity store for testing.
///
/// Uses a single `RwLock` so multi-map writes (deleting entities and their
/// edges) are atomic. Every read operation increments a round-trip counter,
/// which lets tests observe how many store reads a caller issued.
#[derive(Debug, Default)]
pub struct InMemoryEntityStore {
    state: RwLock<MemoryState>,
    read_round_trips: AtomicUsize,
}

impl InMemoryEntityStore {
    /// Creates a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns how many read operations have been served so far.
    #[must_use]
    pub fn read_round_trips(&self) -> usize {
        self.read_round_trips.load(Ordering::Relaxed)
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, MemoryState>> {
        self.read_round_trips.fetch_add(1, Ordering::Relaxed);
        self.state
            .read()
            .map_err(|_| Error::operation_failed("memory_store_read", "lock poisoned"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, MemoryState>> {
        self.state
            .write()
            .map_err(|_| Error::operation_failed("memory_store_write", "lock poisoned"))
    }

    fn timed<T>(operation: &'static str, f: impl FnOnce() -> Result<T>) -> Result<T> {
        let start = Instant::now();
        let result = f();
        record_operation_metrics(BACKEND, operation, start, &result);
        result
    }
}

impl EntityStore for InMemoryEntityStore {
    fn insert_kind(&self, kind: &NewEntityKind) -> Result<EntityKind> {
        Self::timed("insert_kind", || {
            let mut state = self.write()?;
            state.ensure_unique_kind_name(&kind.name, None)?;
            state.next_kind_id += 1;
            let created = kind.clone().into_kind(EntityKindId::new(state.next_kind_id));
            state.kinds.insert(created.id, created.clone());
            Ok(created)
        })
    }

    fn update_kind(&self, kind: &EntityKind) -> Result<()> {
        Self::timed("update_kind", || {
            let mut state = self.write()?;
            if !state.kinds.contains_key(&kind.id) {
                return Err(Error::not_found(format!("entity kind {}", kind.id)));
            }
            state.ensure_unique_kind_name(&kind.name, Some(kind.id))?;
            state.kinds.insert(kind.id, kind.clone());
            Ok(())
        })
    }

    fn get_kind(&self, id: EntityKindId) -> Result<Option<EntityKind>> {
        Self::timed("get_kind", || Ok(self.read()?.kinds.get(&id).cloned()))
    }

    fn find_kind(&self, name: &str, scope: Scope) -> Result<Option<EntityKind>> {
        Self::timed("find_kind", || {
            Ok(self
                .read()?
                .kinds
                .values()
                .find(|k| k.name == name && scope.admits(k.is_active))
                .cloned())
        })
    }

    fn list_kinds(&self, scope: Scope) -> Result<Vec<EntityKind>> {
        Self::timed("list_kinds", || {
            let state = self.read()?;
            let mut kinds: Vec<EntityKind> = state
                .kinds
                .values()
                .filter(|k| scope.admits(k.is_active))
                .cloned()
                .collect();
            kinds.sort_by(|a, b| a.name.cmp(&b.name));
            Ok(kinds)
        })
    }

    fn delete_kind(&self, id: EntityKindId) -> Result<bool> {
        Self::timed("delete_kind", || {
            let mut state = self.write()?;
            let referencing = state
                .entities
                .values()
                .filter(|e| e.entity_kind == id)
                .count();
            if referencing > 0 {
                return Err(Error::IntegrityViolation(format!(
                    "entity kind {id} is still referenced by {referencing} entities"
                )));
            }
            Ok(state.kinds.remove(&id).is_some())
        })
    }

    fn insert_entity(&self, entity: &NewEntity) -> Result<Entity> {
        Self::timed("insert_entity", || {
            let mut state = self.write()?;
            let created = entity
                .clone()
                .into_entity(EntityId::new(state.next_entity_id + 1));
            state.ensure_unique_entity(&created)?;
            state.next_entity_id += 1;
            state.entities.insert(created.id, created.clone());
            Ok(created)
        })
    }

    fn update_entity(&self, entity: &Entity) -> Result<()> {
        Self::timed("update_entity", || {
            let mut state = self.write()?;
            if !state.entities.contains_key(&entity.id) {
                return Err(Error::not_found(format!("entity {}", entity.id)));
            }
            state.ensure_unique_entity(entity)?;
            state.entities.insert(entity.id, entity.clone());
            Ok(())
        })
    }

    fn get_entity(&self, id: EntityId) -> Result<Option<Entity>> {
        Self::timed("get_entity", || Ok(self.read()?.entities.get(&id).cloned()))
    }

    fn fetch(&self, query: &EntityQuery) -> Result<Vec<Entity>> {
        Self::timed("fetch", || {
            Ok(self.read()?.select(query).cloned().collect())
        })
    }

    fn count(&self, query: &EntityQuery) -> Result<usize> {
        Self::timed("count", || Ok(self.read()?.select(query).count()))
    }

    fn set_active(&self, query: &EntityQuery, active: bool) -> Result<usize> {
        Self::timed("set_active", || {
            let mut state = self.write()?;
            let ids = state.selected_ids(query);
            for id in &ids {
                if let Some(entity) = state.entities.get_mut(id) {
                    entity.is_active = active;
                }
            }
            Ok(ids.len())
        })
    }

    fn delete(&self, query: &EntityQuery) -> Result<usize> {
        Self::timed("delete", || {
            let mut state = self.write()?;
            let ids: BTreeSet<EntityId> = state.selected_ids(query).into_iter().collect();
            state
                .relationships
                .retain(|_, r| !ids.contains(&r.sub_entity) && !ids.contains(&r.super_entity));
            state.entities.retain(|id, _| !ids.contains(id));
            Ok(ids.len())
        })
    }

    fn insert_relationship(&self, sub: EntityId, sup: EntityId) -> Result<EntityRelationship> {
        Self::timed("insert_relationship", || {
            let mut state = self.write()?;
            for endpoint in [sub, sup] {
                if !state.entities.contains_key(&endpoint) {
                    return Err(Error::IntegrityViolation(format!(
                        "relationship endpoint {endpoint} does not exist"
                    )));
                }
            }
            state.next_relationship_id += 1;
            let edge = EntityRelationship {
                id: RelationshipId::new(state.next_relationship_id),
                sub_entity: sub,
                super_entity: sup,
            };
            state.relationships.insert(edge.id, edge);
            Ok(edge)
        })
    }

    fn delete_relationship(&self, id: RelationshipId) -> Result<bool> {
        Self::timed("delete_relationship", || {
            Ok(self.write()?.relationships.remove(&id).is_some())
        })
    }

    fn delete_relationships_between(&self, sub: EntityId, sup: EntityId) -> Result<usize> {
        Self::timed("delete_relationships_between", || {
            let mut state = self.write()?;
            let before = state.relationships.len();
            state
                .relationships
                .retain(|_, r| !(r.sub_entity == sub && r.super_entity == sup));
            Ok(before - state.relationships.len())
        })
    }

    fn relationships_of(&self, entity: EntityId) -> Result<Vec<EntityRelationship>> {
        Self::timed("relationships_of", || {
            Ok(self
                .read()?
                .relationships
                .values()
                .filter(|r| r.touches(entity))
                .copied()
                .collect())
        })
    }

    fn super_entities(&self, entity: EntityId) -> Result<Vec<Entity>> {
        Self::timed("super_entities", || {
            let state = self.read()?;
            Ok(state.resolve(state.supers_of(entity)))
        })
    }

    fn sub_entities(&self, entity: EntityId) -> Result<Vec<Entity>> {
        Self::timed("sub_entities", || {
            let state = self.read()?;
            Ok(state.resolve(state.subs_of(entity)))
        })
    }

    fn prefetch_relationships(
        &self,
        ids: &[EntityId],
        spec: CacheSpec,
    ) -> Result<RelationshipCache> {
        let mut cache = RelationshipCache::primed(spec, ids);
        if spec.is_empty() || ids.is_empty() {
            return Ok(cache);
        }
        Self::timed("prefetch_relationships", || {
            let state = self.read()?;
            for edge in state.relationships.values() {
                if spec.include_super {
                    if let Some(sup) = state.entities.get(&edge.super_entity) {
                        cache.push_super(edge.sub_entity, sup.clone());
                    }
                }
                if spec.include_sub {
                    if let Some(sub) = state.entities.get(&edge.sub_entity) {
                        cache.push_sub(edge.super_entity, sub.clone());
                    }
                }
            }
            Ok(())
        })?;
        Ok(cache)
    }

    fn stats(&self) -> Result<GraphStats> {
        Self::timed("stats", || {
            let state = self.read()?;
            let entities_by_kind = state
                .kinds
                .values()
                .map(|k| {
                    let count = state
                        .entities
                        .values()
                        .filter(|e| e.entity_kind == k.id)
                        .count();
                    (k.name.clone(), count)
                })
                .collect();
            Ok(GraphStats {
                kind_count: state.kinds.len(),
                active_kind_count: state.kinds.values().filter(|k| k.is_active).count(),
                entity_count: state.entities.len(),
                active_entity_count: state.entities.values().filter(|e| e.is_active).count(),
                relationship_count: state.relationships.len(),
                entities_by_kind,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EntityRef;

    fn setup() -> (InMemoryEntityStore, EntityKind, EntityKind) {
        let store = InMemoryEntityStore::new();
        let team = store.insert_kind(&NewEntityKind::new("team", "Team")).unwrap();
        let user = store.insert_kind(&NewEntityKind::new("user", "User")).unwrap();
        (store, team, user)
    }

    fn entity(store: &InMemoryEntityStore, kind: &EntityKind, ref_id: i64) -> Entity {
        store
            .insert_entity(&NewEntity::new(EntityRef::new(kind.name.as_str(), ref_id), kind.id))
            .unwrap()
    }

    #[test]
    fn test_duplicate_kind_name_rejected() {
        let (store, _, _) = setup();
        let err = store
            .insert_kind(&NewEntityKind::new("team", "Other"))
            .unwrap_err();
        assert!(matches!(err, Error::IntegrityViolation(_)));
    }

    #[test]
    fn test_failed_insert_does_not_consume_id() {
        let (store, team, _) = setup();
        let first = entity(&store, &team, 1);
        assert!(
            store
                .insert_entity(&NewEntity::new(EntityRef::new("team", 1), team.id))
                .is_err()
        );
        let second = entity(&store, &team, 2);
        assert_eq!(second.id.get(), first.id.get() + 1);
    }

    #[test]
    fn test_sub_to_all_counts_duplicate_edges_once() {
        let (store, team, user) = setup();
        let t1 = entity(&store, &team, 1);
        let t2 = entity(&store, &team, 2);
        let u = entity(&store, &user, 1);
        store.insert_relationship(u.id, t1.id).unwrap();
        store.insert_relationship(u.id, t1.id).unwrap();

        let query = EntityQuery::active_scope().is_sub_to_all(&[t1.id, t2.id]);
        assert!(store.fetch(&query).unwrap().is_empty());

        store.insert_relationship(u.id, t2.id).unwrap();
        assert_eq!(store.fetch(&query).unwrap(), vec![u]);
    }

    #[test]
    fn test_read_round_trips_counted() {
        let (store, team, _) = setup();
        let t = entity(&store, &team, 1);
        let before = store.read_round_trips();

        store.super_entities(t.id).unwrap();
        store.fetch(&EntityQuery::active_scope()).unwrap();
        assert_eq!(store.read_round_trips(), before + 2);

        // Writes do not count.
        store
            .set_active(&EntityQuery::all().with_ids(&[t.id]), false)
            .unwrap();
        assert_eq!(store.read_round_trips(), before + 2);
    }

    #[test]
    fn test_prefetch_skips_store_when_nothing_requested() {
        let (store, team, _) = setup();
        let t = entity(&store, &team, 1);
        let before = store.read_round_trips();
        let cache = store
            .prefetch_relationships(&[t.id], CacheSpec::default())
            .unwrap();
        assert!(cache.spec().is_empty());
        assert_eq!(store.read_round_trips(), before);
    }
}
