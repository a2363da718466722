//! Benchmarks for relationship filters and prefetching.
//!
//! Benchmark targets:
//! - `is_sub_to_all` over 1k members: <5ms on `SQLite`
//! - Prefetched traversal of a fetched set: one read per direction
//!
//! The graph is a set of teams, each with a slice of users below it, and a
//! handful of groups that overlap the teams.

// Criterion macros generate items without docs - this is expected for benchmarks
// Benchmarks use expect/unwrap for simplicity - panics are acceptable in benchmarks
#![allow(missing_docs)]
#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::cast_possible_wrap,
    clippy::doc_markdown
)]

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use std::hint::black_box;
use std::time::Duration;

use entitygraph::models::{EntityRef, NewEntity, NewEntityKind};
use entitygraph::services::EntityService;
use entitygraph::storage::{EntityStore, InMemoryEntityStore, SqliteEntityStore};
use entitygraph::{EntityId, EntityKindId};

const TEAMS: usize = 10;
const GROUPS: usize = 4;

struct Fixture<B: EntityStore> {
    service: EntityService<B>,
    user_kind: EntityKindId,
    team_kind: EntityKindId,
    group_kind: EntityKindId,
    teams: Vec<EntityId>,
    groups: Vec<EntityId>,
}

fn build<B: EntityStore>(store: B, users: usize) -> Fixture<B> {
    let service = EntityService::new(store);
    let kind = |name: &str| {
        service
            .create_kind(NewEntityKind::new(name, name))
            .unwrap()
            .id
    };
    let (user_kind, team_kind, group_kind) = (kind("user"), kind("team"), kind("group"));

    let make = |tag: &str, kind: EntityKindId, n: usize| -> Vec<EntityId> {
        (0..n)
            .map(|i| {
                service
                    .create_entity(NewEntity::new(EntityRef::new(tag, i as i64), kind))
                    .unwrap()
                    .id
            })
            .collect()
    };
    let teams = make("team", team_kind, TEAMS);
    let groups = make("group", group_kind, GROUPS);
    let members = make("user", user_kind, users);

    for (i, user) in members.iter().enumerate() {
        service.add_relationship(user, &teams[i % TEAMS]).unwrap();
        if i % 3 == 0 {
            service.add_relationship(user, &groups[i % GROUPS]).unwrap();
        }
    }

    Fixture {
        service,
        user_kind,
        team_kind,
        group_kind,
        teams,
        groups,
    }
}

// ============================================================================
// Filter Benchmarks
// ============================================================================

/// Benchmarks the relationship filters at several graph sizes.
fn bench_filters(c: &mut Criterion) {
    let mut group = c.benchmark_group("relationship_filters");
    group.measurement_time(Duration::from_secs(3));

    for users in [100_usize, 1_000] {
        let sqlite = build(SqliteEntityStore::in_memory().unwrap(), users);
        let memory = build(InMemoryEntityStore::new(), users);
        group.throughput(Throughput::Elements(users as u64));

        group.bench_with_input(BenchmarkId::new("sqlite_sub_to_any", users), &users, |b, _| {
            b.iter(|| {
                black_box(
                    sqlite
                        .service
                        .objects()
                        .is_sub_to_any(&sqlite.teams[..3])
                        .ids()
                        .unwrap(),
                )
            });
        });

        group.bench_with_input(BenchmarkId::new("sqlite_sub_to_all", users), &users, |b, _| {
            let supers = [sqlite.teams[0], sqlite.groups[0]];
            b.iter(|| {
                black_box(
                    sqlite
                        .service
                        .objects()
                        .is_sub_to_all(&supers)
                        .ids()
                        .unwrap(),
                )
            });
        });

        group.bench_with_input(
            BenchmarkId::new("sqlite_sub_to_all_kinds", users),
            &users,
            |b, _| {
                let kinds = [sqlite.team_kind, sqlite.group_kind];
                b.iter(|| {
                    black_box(
                        sqlite
                            .service
                            .objects()
                            .is_any_kind(&[sqlite.user_kind])
                            .is_sub_to_all_kinds(&kinds)
                            .count()
                            .unwrap(),
                    )
                });
            },
        );

        group.bench_with_input(
            BenchmarkId::new("memory_sub_to_all_kinds", users),
            &users,
            |b, _| {
                let kinds = [memory.team_kind, memory.group_kind];
                b.iter(|| {
                    black_box(
                        memory
                            .service
                            .objects()
                            .is_any_kind(&[memory.user_kind])
                            .is_sub_to_all_kinds(&kinds)
                            .count()
                            .unwrap(),
                    )
                });
            },
        );
    }

    group.finish();
}

// ============================================================================
// Prefetch Benchmarks
// ============================================================================

/// Compares per-entity traversal with a prefetched cache.
fn bench_prefetch(c: &mut Criterion) {
    let mut group = c.benchmark_group("relationship_prefetch");
    group.measurement_time(Duration::from_secs(3));

    let fixture = build(SqliteEntityStore::in_memory().unwrap(), 500);
    let users = || fixture.service.objects().is_any_kind(&[fixture.user_kind]);

    group.bench_function("uncached_supers", |b| {
        b.iter(|| {
            let rows = users().fetch().unwrap();
            for entity in &rows {
                black_box(rows.get_super_entities(entity).unwrap());
            }
        });
    });

    group.bench_function("cached_supers", |b| {
        b.iter(|| {
            let rows = users().cache_relationships(true, false).fetch().unwrap();
            for entity in &rows {
                black_box(rows.get_super_entities(entity).unwrap());
            }
        });
    });

    group.finish();
}

// ============================================================================
// Criterion Configuration
// ============================================================================

criterion_group!(benches, bench_filters, bench_prefetch);

criterion_main!(benches);
