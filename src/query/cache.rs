//! Request-scoped relationship prefetch results.

use crate::models::{Entity, EntityId};
use crate::query::CacheSpec;
use std::collections::HashMap;

/// Neighbors prefetched in bulk for a materialized entity set.
///
/// A direction that was not requested is absent, and lookups for it return
/// `None` so callers fall back to the store. A requested direction holds an
/// entry for every prefetched entity, empty when it has no edges. The
/// per-entity lists are in edge order and keep duplicates, matching what an
/// uncached traversal returns.
#[derive(Debug, Clone, Default)]
pub struct RelationshipCache {
    supers: Option<HashMap<EntityId, Vec<Entity>>>,
    subs: Option<HashMap<EntityId, Vec<Entity>>>,
}

impl RelationshipCache {
    /// Creates a cache with the requested directions primed for `ids`.
    #[must_use]
    pub fn primed(spec: CacheSpec, ids: &[EntityId]) -> Self {
        let prime = |enabled: bool| {
            enabled.then(|| ids.iter().map(|id| (*id, Vec::new())).collect())
        };
        Self {
            supers: prime(spec.include_super),
            subs: prime(spec.include_sub),
        }
    }

    /// Records that `super_entity` is above `sub`.
    ///
    /// Ignored when super prefetch was not requested or `sub` was not primed.
    pub fn push_super(&mut self, sub: EntityId, super_entity: Entity) {
        if let Some(list) = self.supers.as_mut().and_then(|m| m.get_mut(&sub)) {
            list.push(super_entity);
        }
    }

    /// Records that `sub_entity` is below `sup`.
    ///
    /// Ignored when sub prefetch was not requested or `sup` was not primed.
    pub fn push_sub(&mut self, sup: EntityId, sub_entity: Entity) {
        if let Some(list) = self.subs.as_mut().and_then(|m| m.get_mut(&sup)) {
            list.push(sub_entity);
        }
    }

    /// Returns the cached super entities of `id`, if cached.
    #[must_use]
    pub fn super_entities(&self, id: &EntityId) -> Option<&[Entity]> {
        self.supers.as_ref()?.get(id).map(Vec::as_slice)
    }

    /// Returns the cached sub entities of `id`, if cached.
    #[must_use]
    pub fn sub_entities(&self, id: &EntityId) -> Option<&[Entity]> {
        self.subs.as_ref()?.get(id).map(Vec::as_slice)
    }

    /// Returns which directions this cache holds.
    #[must_use]
    pub const fn spec(&self) -> CacheSpec {
        CacheSpec {
            include_super: self.supers.is_some(),
            include_sub: self.subs.is_some(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EntityKindId, EntityRef, NewEntity};

    fn entity(id: i64) -> Entity {
        NewEntity::new(EntityRef::new("user", id), EntityKindId::new(1))
            .into_entity(EntityId::new(id))
    }

    #[test]
    fn test_unrequested_direction_is_absent() {
        let spec = CacheSpec {
            include_super: true,
            include_sub: false,
        };
        let mut cache = RelationshipCache::primed(spec, &[EntityId::new(1)]);
        cache.push_sub(EntityId::new(1), entity(2));

        assert_eq!(cache.super_entities(&EntityId::new(1)), Some(&[][..]));
        assert!(cache.sub_entities(&EntityId::new(1)).is_none());
        assert_eq!(cache.spec(), spec);
    }

    #[test]
    fn test_unprimed_entity_is_absent() {
        let spec = CacheSpec {
            include_super: true,
            include_sub: true,
        };
        let mut cache = RelationshipCache::primed(spec, &[EntityId::new(1)]);
        cache.push_super(EntityId::new(5), entity(2));
        assert!(cache.super_entities(&EntityId::new(5)).is_none());
    }

    #[test]
    fn test_duplicates_are_kept_in_order() {
        let spec = CacheSpec {
            include_super: true,
            include_sub: false,
        };
        let mut cache = RelationshipCache::primed(spec, &[EntityId::new(1)]);
        cache.push_super(EntityId::new(1), entity(3));
        cache.push_super(EntityId::new(1), entity(2));
        cache.push_super(EntityId::new(1), entity(3));

        let ids: Vec<i64> = cache
            .super_entities(&EntityId::new(1))
            .unwrap()
            .iter()
            .map(|e| e.id.get())
            .collect();
        assert_eq!(ids, vec![3, 2, 3]);
    }
}
