//! The relationship query engine's pure query description.
//!
//! An [`EntityQuery`] records a default [`Scope`] and a conjunction of
//! [`EntityFilter`]s. Building one never touches a store; stores translate
//! it into SQL (see [`crate::storage::sqlite::build_entity_where_clause`]) or
//! evaluate it directly (see [`crate::storage::InMemoryEntityStore`]).
//!
//! # Filter semantics
//!
//! | Filter | Keeps an entity when |
//! |--------|----------------------|
//! | `Activation(b)` | `is_active == b` |
//! | `KindIn(ks)` | its kind is in `ks` |
//! | `KindNotIn(ks)` | its kind is not in `ks` |
//! | `SubToAny(es)` | at least one of its super entities is in `es` |
//! | `SubToAll(es)` | its distinct super entities include every member of `es` |
//! | `SubToAnyKind(ks)` | at least one super entity has a kind in `ks` |
//! | `SubToAllKinds(ks)` | the distinct kinds of its super entities include every member of `ks` |
//! | `SuperToAny(es)` | at least one of its sub entities is in `es` |
//!
//! Filters are a conjunction, so they commute and never widen the candidate
//! set. Relationship filters look at edges only: the activation of the entity
//! at the far end of an edge does not matter.
//!
//! An empty argument list means "no filter requested". The builder methods
//! drop such filters instead of recording a filter that would match nothing.

mod cache;

pub use cache::RelationshipCache;

use crate::models::{EntityId, EntityKindId, EntityRef, Scope};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// One predicate over candidate entities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "filter", content = "args")]
pub enum EntityFilter {
    /// `is_active` equals the flag.
    Activation(bool),
    /// Entity id is one of the set.
    IdIn(BTreeSet<EntityId>),
    /// Entity wraps the given domain reference.
    Reference(EntityRef),
    /// Entity kind is one of the set.
    KindIn(BTreeSet<EntityKindId>),
    /// Entity kind is none of the set.
    KindNotIn(BTreeSet<EntityKindId>),
    /// Some super edge lands on a member of the set.
    SubToAny(BTreeSet<EntityId>),
    /// Super edges cover every member of the set.
    SubToAll(BTreeSet<EntityId>),
    /// Some super entity has a kind in the set.
    SubToAnyKind(BTreeSet<EntityKindId>),
    /// Kinds of the super entities cover every member of the set.
    SubToAllKinds(BTreeSet<EntityKindId>),
    /// Some sub edge lands on a member of the set.
    SuperToAny(BTreeSet<EntityId>),
}

/// Which relationship directions to prefetch for materialized entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CacheSpec {
    /// Prefetch super edges and the entities above.
    pub include_super: bool,
    /// Prefetch sub edges and the entities below.
    pub include_sub: bool,
}

impl CacheSpec {
    /// Returns true when nothing is requested.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        !self.include_super && !self.include_sub
    }

    /// Combines two requests.
    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self {
            include_super: self.include_super || other.include_super,
            include_sub: self.include_sub || other.include_sub,
        }
    }
}

/// A composable, side-effect-free description of an entity set.
///
/// # Example
///
/// ```rust
/// use entitygraph::models::{EntityId, EntityKindId};
/// use entitygraph::query::{EntityFilter, EntityQuery};
///
/// let query = EntityQuery::active_scope()
///     .is_any_kind(&[EntityKindId::new(1)])
///     .is_sub_to_all(&[EntityId::new(10), EntityId::new(11)])
///     .is_sub_to_any(&[]);
///
/// // The empty `is_sub_to_any` is a no-op.
/// assert_eq!(query.filters().len(), 2);
/// assert!(matches!(query.filters()[1], EntityFilter::SubToAll(ref s) if s.len() == 2));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EntityQuery {
    scope: Scope,
    filters: Vec<EntityFilter>,
    cache: CacheSpec,
    limit: Option<usize>,
}

impl EntityQuery {
    /// Creates an unfiltered query with the given default scope.
    #[must_use]
    pub const fn new(scope: Scope) -> Self {
        Self {
            scope,
            filters: Vec::new(),
            cache: CacheSpec {
                include_super: false,
                include_sub: false,
            },
            limit: None,
        }
    }

    /// Creates an unfiltered query over active entities.
    #[must_use]
    pub const fn active_scope() -> Self {
        Self::new(Scope::Active)
    }

    /// Creates an unfiltered query over all entities.
    #[must_use]
    pub const fn all() -> Self {
        Self::new(Scope::All)
    }

    /// Returns the default scope.
    #[must_use]
    pub const fn scope(&self) -> Scope {
        self.scope
    }

    /// Returns the recorded filters in application order.
    #[must_use]
    pub fn filters(&self) -> &[EntityFilter] {
        &self.filters
    }

    /// Returns the prefetch request.
    #[must_use]
    pub const fn cache(&self) -> CacheSpec {
        self.cache
    }

    /// Returns the row limit, if any.
    #[must_use]
    pub const fn limit(&self) -> Option<usize> {
        self.limit
    }

    fn push(mut self, filter: EntityFilter) -> Self {
        self.filters.push(filter);
        self
    }

    fn push_set<T: Ord + Copy>(
        self,
        values: &[T],
        build: impl FnOnce(BTreeSet<T>) -> EntityFilter,
    ) -> Self {
        if values.is_empty() {
            return self;
        }
        self.push(build(values.iter().copied().collect()))
    }

    /// Narrows to active entities.
    #[must_use]
    pub fn active(self) -> Self {
        self.push(EntityFilter::Activation(true))
    }

    /// Narrows to inactive entities.
    ///
    /// Under the active default scope this always yields an empty set.
    #[must_use]
    pub fn inactive(self) -> Self {
        self.push(EntityFilter::Activation(false))
    }

    /// Narrows to the given entity ids. Empty is a no-op.
    #[must_use]
    pub fn with_ids(self, ids: &[EntityId]) -> Self {
        self.push_set(ids, EntityFilter::IdIn)
    }

    /// Narrows to entities wrapping the reference.
    #[must_use]
    pub fn with_reference(self, reference: &EntityRef) -> Self {
        self.push(EntityFilter::Reference(reference.clone()))
    }

    /// Narrows to entities of any of the kinds. Empty is a no-op.
    #[must_use]
    pub fn is_any_kind(self, kinds: &[EntityKindId]) -> Self {
        self.push_set(kinds, EntityFilter::KindIn)
    }

    /// Narrows to entities of none of the kinds. Empty is a no-op.
    #[must_use]
    pub fn is_not_any_kind(self, kinds: &[EntityKindId]) -> Self {
        self.push_set(kinds, EntityFilter::KindNotIn)
    }

    /// Narrows to entities sub to at least one of the supers. Empty is a no-op.
    #[must_use]
    pub fn is_sub_to_any(self, supers: &[EntityId]) -> Self {
        self.push_set(supers, EntityFilter::SubToAny)
    }

    /// Narrows to entities sub to every one of the supers. Empty is a no-op.
    ///
    /// Duplicate arguments count once.
    #[must_use]
    pub fn is_sub_to_all(self, supers: &[EntityId]) -> Self {
        self.push_set(supers, EntityFilter::SubToAll)
    }

    /// Narrows to entities with a super entity of any of the kinds. Empty is a
    /// no-op.
    #[must_use]
    pub fn is_sub_to_any_kind(self, kinds: &[EntityKindId]) -> Self {
        self.push_set(kinds, EntityFilter::SubToAnyKind)
    }

    /// Narrows to entities whose super entities together have every one of the
    /// kinds. Empty is a no-op.
    #[must_use]
    pub fn is_sub_to_all_kinds(self, kinds: &[EntityKindId]) -> Self {
        self.push_set(kinds, EntityFilter::SubToAllKinds)
    }

    /// Narrows to entities super to at least one of the subs. Empty is a no-op.
    #[must_use]
    pub fn is_super_to_any(self, subs: &[EntityId]) -> Self {
        self.push_set(subs, EntityFilter::SuperToAny)
    }

    /// Requests relationship prefetch for materialized entities.
    ///
    /// Repeated requests accumulate. Requesting neither direction is a no-op.
    #[must_use]
    pub fn cache_relationships(mut self, include_super: bool, include_sub: bool) -> Self {
        self.cache = self.cache.union(CacheSpec {
            include_super,
            include_sub,
        });
        self
    }

    /// Caps the number of rows a fetch returns.
    #[must_use]
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Removes any row cap.
    #[must_use]
    pub fn without_limit(mut self) -> Self {
        self.limit = None;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(raw: &[i64]) -> Vec<EntityId> {
        raw.iter().copied().map(EntityId::new).collect()
    }

    fn kinds(raw: &[i64]) -> Vec<EntityKindId> {
        raw.iter().copied().map(EntityKindId::new).collect()
    }

    #[test]
    fn test_empty_arguments_are_noops() {
        let base = EntityQuery::active_scope();
        let query = base
            .clone()
            .is_any_kind(&[])
            .is_not_any_kind(&[])
            .is_sub_to_any(&[])
            .is_sub_to_all(&[])
            .is_sub_to_any_kind(&[])
            .is_sub_to_all_kinds(&[])
            .is_super_to_any(&[])
            .with_ids(&[]);
        assert_eq!(query, base);
    }

    #[test]
    fn test_duplicate_arguments_collapse() {
        let query = EntityQuery::all().is_sub_to_all(&ids(&[3, 3, 4]));
        assert_eq!(
            query.filters(),
            &[EntityFilter::SubToAll(ids(&[3, 4]).into_iter().collect())]
        );

        let query = EntityQuery::all().is_sub_to_all_kinds(&kinds(&[1, 1]));
        assert_eq!(
            query.filters(),
            &[EntityFilter::SubToAllKinds(kinds(&[1]).into_iter().collect())]
        );
    }

    #[test]
    fn test_cache_relationships_accumulates() {
        let query = EntityQuery::active_scope().cache_relationships(false, false);
        assert!(query.cache().is_empty());

        let query = query
            .cache_relationships(true, false)
            .cache_relationships(false, true);
        assert_eq!(
            query.cache(),
            CacheSpec {
                include_super: true,
                include_sub: true
            }
        );
    }

    #[test]
    fn test_scope_constructors() {
        assert_eq!(EntityQuery::active_scope().scope(), Scope::Active);
        assert_eq!(EntityQuery::all().scope(), Scope::All);
        assert_eq!(EntityQuery::all().with_limit(3).limit(), Some(3));
    }
}
