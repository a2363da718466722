//! Translation of [`EntityQuery`] into `SQLite` SQL.
//!
//! Every filter becomes one condition over the `entity e` alias, so the
//! WHERE clause is a plain conjunction and filter order never changes the
//! result. Relationship filters are `e.id IN (<subquery>)` conditions over
//! `entity_relationship`:
//!
//! - "any" filters collect `sub_entity_id`s whose far end matches
//! - "all" filters group by `sub_entity_id` and keep groups whose
//!   `COUNT(DISTINCT …)` of matching supers (or super kinds) equals the size
//!   of the requested set, so duplicate edges count once
//!
//! Parameters use anonymous `?` placeholders and are returned in the order
//! they appear in the SQL text. A set argument binds as a single JSON array
//! expanded with `json_each`, so its size is not bounded by `SQLite`'s
//! host parameter limit.

use crate::models::{EntityId, EntityKindId, Scope};
use crate::query::{EntityFilter, EntityQuery};
use rusqlite::types::Value;
use std::collections::BTreeSet;

/// Columns selected for an entity row, qualified by the `e` alias.
pub const ENTITY_COLUMNS: &str = "e.id, e.display_name, e.entity_ref_type, e.entity_ref_id, \
     e.entity_kind_id, e.meta_json, e.is_active";

/// Returns `n` comma-separated `?` placeholders.
#[must_use]
pub fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

/// Subquery yielding the members of a set bound as one JSON array parameter.
const SET_MEMBERS: &str = "SELECT value FROM json_each(?)";

/// A bound set: the JSON array parameter and its number of distinct members.
struct BoundSet {
    param: Value,
    len: usize,
}

impl BoundSet {
    fn of(values: impl ExactSizeIterator<Item = i64>) -> Self {
        let len = values.len();
        let array = serde_json::Value::from(values.collect::<Vec<i64>>());
        Self {
            param: Value::Text(array.to_string()),
            len,
        }
    }
}

fn entity_set(ids: &BTreeSet<EntityId>) -> BoundSet {
    BoundSet::of(ids.iter().map(|id| id.get()))
}

fn kind_set(kinds: &BTreeSet<EntityKindId>) -> BoundSet {
    BoundSet::of(kinds.iter().map(|k| k.get()))
}

/// Which column of the joined super entity a relationship filter matches on.
#[derive(Clone, Copy)]
enum SuperMatch {
    /// `r.super_entity_id`
    Identity,
    /// `s.entity_kind_id` of the joined super entity `s`
    Kind,
}

impl SuperMatch {
    const fn column(self) -> &'static str {
        match self {
            Self::Identity => "r.super_entity_id",
            Self::Kind => "s.entity_kind_id",
        }
    }

    const fn from_clause(self) -> &'static str {
        match self {
            Self::Identity => "entity_relationship r",
            Self::Kind => "entity_relationship r JOIN entity s ON s.id = r.super_entity_id",
        }
    }
}

/// Sub ids with at least one super matching any member of `set`.
fn membership_subquery(matching: SuperMatch, set: BoundSet) -> (String, Vec<Value>) {
    let sql = format!(
        "SELECT r.sub_entity_id FROM {} WHERE {} IN ({SET_MEMBERS})",
        matching.from_clause(),
        matching.column(),
    );
    (sql, vec![set.param])
}

/// Sub ids whose distinct matching supers cover every member of `set`.
///
/// The members must already be distinct. A single required value takes the
/// direct membership path: "covers {v}" and "has some super matching v" are
/// the same set, with or without duplicate edges.
fn coverage_subquery(matching: SuperMatch, set: BoundSet) -> (String, Vec<Value>) {
    if set.len == 1 {
        return membership_subquery(matching, set);
    }
    let sql = format!(
        "SELECT r.sub_entity_id FROM {} WHERE {column} IN ({SET_MEMBERS}) \
         GROUP BY r.sub_entity_id HAVING COUNT(DISTINCT {column}) = {required}",
        matching.from_clause(),
        column = matching.column(),
        required = set.len,
    );
    (sql, vec![set.param])
}

/// Builds the condition and parameters for one filter.
fn filter_condition(filter: &EntityFilter) -> (String, Vec<Value>) {
    match filter {
        EntityFilter::Activation(active) => (
            "e.is_active = ?".to_string(),
            vec![Value::Integer(i64::from(*active))],
        ),
        EntityFilter::IdIn(ids) => (
            format!("e.id IN ({SET_MEMBERS})"),
            vec![entity_set(ids).param],
        ),
        EntityFilter::Reference(reference) => (
            "e.entity_ref_type = ? AND e.entity_ref_id = ?".to_string(),
            vec![
                Value::Text(reference.ref_type.as_str().to_string()),
                Value::Integer(reference.ref_id),
            ],
        ),
        EntityFilter::KindIn(kinds) => (
            format!("e.entity_kind_id IN ({SET_MEMBERS})"),
            vec![kind_set(kinds).param],
        ),
        EntityFilter::KindNotIn(kinds) => (
            format!("e.entity_kind_id NOT IN ({SET_MEMBERS})"),
            vec![kind_set(kinds).param],
        ),
        EntityFilter::SubToAny(supers) => {
            wrap_in_id(membership_subquery(SuperMatch::Identity, entity_set(supers)))
        },
        EntityFilter::SubToAll(supers) => {
            wrap_in_id(coverage_subquery(SuperMatch::Identity, entity_set(supers)))
        },
        EntityFilter::SubToAnyKind(kinds) => {
            wrap_in_id(membership_subquery(SuperMatch::Kind, kind_set(kinds)))
        },
        EntityFilter::SubToAllKinds(kinds) => {
            wrap_in_id(coverage_subquery(SuperMatch::Kind, kind_set(kinds)))
        },
        EntityFilter::SuperToAny(subs) => (
            format!(
                "e.id IN (SELECT r.super_entity_id FROM entity_relationship r \
                 WHERE r.sub_entity_id IN ({SET_MEMBERS}))"
            ),
            vec![entity_set(subs).param],
        ),
    }
}

fn wrap_in_id((subquery, params): (String, Vec<Value>)) -> (String, Vec<Value>) {
    (format!("e.id IN ({subquery})"), params)
}

/// Builds the WHERE clause (including the keyword) for a query.
///
/// Returns an empty string when the query has no conditions at all.
#[must_use]
pub fn build_entity_where_clause(query: &EntityQuery) -> (String, Vec<Value>) {
    let mut conditions = Vec::new();
    let mut params = Vec::new();

    if query.scope() == Scope::Active {
        conditions.push("e.is_active = 1".to_string());
    }

    for filter in query.filters() {
        let (condition, values) = filter_condition(filter);
        conditions.push(condition);
        params.extend(values);
    }

    let where_clause = if conditions.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    };

    (where_clause, params)
}

/// Builds a complete ordered SELECT over `entity e` for the given columns.
#[must_use]
pub fn build_select_sql(query: &EntityQuery, columns: &str) -> (String, Vec<Value>) {
    let (where_clause, params) = build_entity_where_clause(query);
    let mut sql = format!("SELECT {columns} FROM entity e");
    if !where_clause.is_empty() {
        sql.push(' ');
        sql.push_str(&where_clause);
    }
    sql.push_str(" ORDER BY e.id");
    if let Some(limit) = query.limit() {
        // SQLite reads LIMIT as a signed 64-bit integer.
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        sql.push_str(&format!(" LIMIT {limit}"));
    }
    (sql, params)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EntityRef;

    fn ids(raw: &[i64]) -> Vec<EntityId> {
        raw.iter().copied().map(EntityId::new).collect()
    }

    #[test]
    fn test_placeholders() {
        assert_eq!(placeholders(0), "");
        assert_eq!(placeholders(1), "?");
        assert_eq!(placeholders(3), "?, ?, ?");
    }

    #[test]
    fn test_active_scope_adds_condition() {
        let (clause, params) = build_entity_where_clause(&EntityQuery::active_scope());
        assert_eq!(clause, "WHERE e.is_active = 1");
        assert!(params.is_empty());

        let (clause, params) = build_entity_where_clause(&EntityQuery::all());
        assert_eq!(clause, "");
        assert!(params.is_empty());
    }

    #[test]
    fn test_coverage_counts_distinct_supers() {
        let query = EntityQuery::all().is_sub_to_all(&ids(&[4, 2, 4]));
        let (clause, params) = build_entity_where_clause(&query);
        assert!(clause.contains("GROUP BY r.sub_entity_id"));
        assert!(clause.contains("HAVING COUNT(DISTINCT r.super_entity_id) = 2"));
        assert_eq!(params, vec![Value::Text("[2,4]".to_string())]);
    }

    #[test]
    fn test_single_coverage_takes_membership_path() {
        let query = EntityQuery::all().is_sub_to_all(&ids(&[4]));
        let (clause, params) = build_entity_where_clause(&query);
        assert!(!clause.contains("GROUP BY"));
        assert!(clause.contains("r.super_entity_id IN (SELECT value FROM json_each(?))"));
        assert_eq!(params, vec![Value::Text("[4]".to_string())]);
    }

    #[test]
    fn test_kind_coverage_joins_super_entity() {
        let kinds = [EntityKindId::new(1), EntityKindId::new(2)];
        let query = EntityQuery::all().is_sub_to_all_kinds(&kinds);
        let (clause, _) = build_entity_where_clause(&query);
        assert!(clause.contains("JOIN entity s ON s.id = r.super_entity_id"));
        assert!(clause.contains("HAVING COUNT(DISTINCT s.entity_kind_id) = 2"));
    }

    #[test]
    fn test_params_follow_condition_order() {
        let query = EntityQuery::active_scope()
            .with_reference(&EntityRef::new("user", 7))
            .is_not_any_kind(&[EntityKindId::new(9)])
            .inactive();
        let (clause, params) = build_entity_where_clause(&query);
        assert_eq!(
            clause,
            "WHERE e.is_active = 1 AND e.entity_ref_type = ? AND e.entity_ref_id = ? \
             AND e.entity_kind_id NOT IN (SELECT value FROM json_each(?)) AND e.is_active = ?"
        );
        assert_eq!(
            params,
            vec![
                Value::Text("user".to_string()),
                Value::Integer(7),
                Value::Text("[9]".to_string()),
                Value::Integer(0),
            ]
        );
    }

    #[test]
    fn test_select_sql_orders_and_limits() {
        let (sql, _) = build_select_sql(&EntityQuery::all().with_limit(2), "e.id");
        assert_eq!(sql, "SELECT e.id FROM entity e ORDER BY e.id LIMIT 2");
    }

    #[test]
    fn test_select_sql_clamps_huge_limit() {
        let (sql, _) = build_select_sql(&EntityQuery::all().with_limit(usize::MAX), "e.id");
        assert!(sql.ends_with(&format!("LIMIT {}", i64::MAX)));
    }

    #[test]
    fn test_large_sets_bind_one_parameter() {
        let many: Vec<EntityId> = (1..=40_000).map(EntityId::new).collect();
        let query = EntityQuery::all().with_ids(&many).is_sub_to_all(&many);
        let (clause, params) = build_entity_where_clause(&query);
        assert_eq!(params.len(), 2);
        assert_eq!(clause.matches('?').count(), 2);
        assert!(clause.contains("= 40000"));
    }
}
